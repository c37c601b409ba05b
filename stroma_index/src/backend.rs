// Copyright 2026 the Stroma Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend trait for spatial indexing implementations.

use kurbo::{Point, Rect};

/// Spatial backend abstraction used by [`crate::SpatialIndex`].
///
/// Backends track one axis-aligned box per slot. Slots are dense `usize`
/// indices handed out by the index; the backend never sees application keys.
pub trait Backend: core::fmt::Debug {
    /// Insert a new slot into the spatial structure.
    fn insert(&mut self, slot: usize, aabb: Rect);

    /// Update an existing slot's AABB.
    fn update(&mut self, slot: usize, aabb: Rect);

    /// Remove a slot from the spatial structure.
    fn remove(&mut self, slot: usize);

    /// Clear all spatial structures.
    fn clear(&mut self);

    /// Visit slots whose AABB contains the point.
    fn visit_point<F: FnMut(usize)>(&self, pt: Point, f: F);

    /// Visit slots whose AABB intersects the rectangle.
    fn visit_rect<F: FnMut(usize)>(&self, rect: Rect, f: F);
}

/// Closed-edge overlap test that treats zero-area boxes as real.
///
/// Point annotations index a zero-size box, so the usual
/// `!intersect().is_empty()` test would never report them; sharing an edge
/// or a corner counts as overlapping here.
#[inline]
#[must_use]
pub fn rects_overlap(a: &Rect, b: &Rect) -> bool {
    a.x0 <= b.x1 && a.x1 >= b.x0 && a.y0 <= b.y1 && a.y1 >= b.y0
}

/// Closed-edge point containment matching [`rects_overlap`] conventions.
#[inline]
#[must_use]
pub fn rect_contains(a: &Rect, pt: Point) -> bool {
    a.x0 <= pt.x && pt.x <= a.x1 && a.y0 <= pt.y && pt.y <= a.y1
}
