// Copyright 2026 the Stroma Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stroma View: the overlay transform shared by every rendering surface.
//!
//! Annotation vertices are stored in image pixels of the full-resolution
//! source; the deep-zoom viewer continuously pans, zooms, rotates, and
//! sometimes flips that image. [`ViewState`] captures one frame of the
//! viewer's state and derives the single affine that maps image coordinates
//! onto the overlay canvas:
//!
//! ```text
//! scale = zoom · container_width / content_factor
//! M     = translate(−viewport.min · scale) · scale(±scale, scale) · rotate(θ)
//! ```
//!
//! Both the GPU stage and the handle overlay derive their transforms from
//! the same [`ViewState::overlay_transform`], which is what keeps drag
//! handles coregistered with filled shapes to sub-pixel precision at any
//! zoom, rotation, or flip.
//!
//! The inverse mapping ([`ViewState::screen_to_image`]) turns pointer
//! positions back into image coordinates, and
//! [`ViewState::screen_tolerance_to_image`] scales "about five screen
//! pixels" into the image-pixel tolerances hit tests expect.
//!
//! This crate is `no_std`.

#![no_std]

use kurbo::{Affine, Point, Rect, Size};

/// One frame of viewer state, sufficient to build the overlay transform.
///
/// All fields come straight from the viewer's viewport queries on each
/// animation/update/resize event; nothing here is accumulated across
/// frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewState {
    /// Viewer zoom factor (1.0 = the full image spans the container width).
    pub zoom: f64,
    /// Viewport rotation in radians.
    pub rotation: f64,
    /// Whether the viewer mirrors the image horizontally.
    pub flipped: bool,
    /// Overlay canvas size in screen pixels.
    pub container: Size,
    /// Ratio of full-resolution image width to viewport width units.
    pub content_factor: f64,
    /// Viewer bounds converted to image coordinates.
    pub viewport_bounds_in_image: Rect,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            rotation: 0.0,
            flipped: false,
            container: Size::new(0.0, 0.0),
            content_factor: 1.0,
            viewport_bounds_in_image: Rect::ZERO,
        }
    }
}

impl ViewState {
    /// Screen pixels per image pixel at the current zoom.
    #[must_use]
    pub fn scale(&self) -> f64 {
        self.zoom * self.container.width / self.content_factor
    }

    /// Image pixels per screen pixel at the current zoom.
    #[must_use]
    pub fn image_units_per_screen_px(&self) -> f64 {
        1.0 / self.scale()
    }

    /// Converts a tolerance in screen pixels into image pixels.
    #[must_use]
    pub fn screen_tolerance_to_image(&self, screen_px: f64) -> f64 {
        screen_px * self.image_units_per_screen_px()
    }

    /// The image→screen affine for this frame.
    ///
    /// Rotation applies first, then scale (negated on x when flipped), then
    /// the translation that pins the viewport's image-space origin to the
    /// canvas origin.
    #[must_use]
    pub fn overlay_transform(&self) -> Affine {
        let s = self.scale();
        let sx = if self.flipped { -s } else { s };
        let tx = -self.viewport_bounds_in_image.x0 * s;
        let ty = -self.viewport_bounds_in_image.y0 * s;
        Affine::translate((tx, ty))
            * Affine::scale_non_uniform(sx, s)
            * Affine::rotate(self.rotation)
    }

    /// Maps an image-space point onto the overlay canvas.
    #[must_use]
    pub fn image_to_screen(&self, p: Point) -> Point {
        self.overlay_transform() * p
    }

    /// Maps an overlay-canvas point back into image space.
    ///
    /// With a degenerate transform (zero-sized container) the input is
    /// returned unchanged rather than propagating NaNs.
    #[must_use]
    pub fn screen_to_image(&self, p: Point) -> Point {
        if self.scale() == 0.0 {
            return p;
        }
        self.overlay_transform().inverse() * p
    }

    /// The image-space AABB currently visible through the canvas.
    ///
    /// Computed by mapping the canvas corners through the inverse transform
    /// and taking their bounding box, so it stays conservative under
    /// rotation and flip.
    #[must_use]
    pub fn visible_image_rect(&self) -> Rect {
        if self.scale() == 0.0 {
            return self.viewport_bounds_in_image;
        }
        let inv = self.overlay_transform().inverse();
        let corners = [
            Point::new(0.0, 0.0),
            Point::new(self.container.width, 0.0),
            Point::new(0.0, self.container.height),
            Point::new(self.container.width, self.container.height),
        ];
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for c in corners {
            let q = inv * c;
            min_x = min_x.min(q.x);
            min_y = min_y.min(q.y);
            max_x = max_x.max(q.x);
            max_y = max_y.max(q.y);
        }
        Rect::new(min_x, min_y, max_x, max_y)
    }
}
