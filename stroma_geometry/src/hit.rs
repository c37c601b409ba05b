// Copyright 2026 the Stroma Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Precise, tolerance-based hit testing per shape variant.
//!
//! Broad-phase culling happens elsewhere (the spatial index fetches a small
//! candidate set by bounding box); these tests refine candidates with
//! per-variant geometry: center distance for points, edge-expanded
//! containment for rectangles, ray cast for polygon interiors, and segment
//! distance for outlines and open paths.
//!
//! Tolerances are expressed in image pixels. Callers that want "about five
//! screen pixels" divide by the current image-to-screen scale first.

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;
use kurbo::{Line, ParamCurveNearest, Point};

use crate::shape::{ring_contains, Shape};

/// Kind of hit produced by a precise test.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HitKind {
    /// Hit the interior of a shape.
    Fill,
    /// Hit the outline of a shape within the stroke tolerance.
    Stroke,
    /// Hit a control handle or other auxiliary affordance.
    Handle,
    /// Hit, but kind is unspecified/other.
    Other,
}

/// Parameters controlling precise hit tests.
///
/// Separate fill and stroke tolerances let engines widen outline pick
/// regions independently of interiors; [`HitParams::uniform`] covers the
/// common case of one pointer tolerance for both.
#[derive(Clone, Copy, Debug)]
pub struct HitParams {
    /// Tolerance in image pixels for hits against filled regions.
    pub fill_tolerance: f64,
    /// Tolerance in image pixels for hits against outlines and open paths.
    pub stroke_tolerance: f64,
}

impl HitParams {
    /// One tolerance for both fills and strokes.
    #[must_use]
    pub const fn uniform(tolerance: f64) -> Self {
        Self {
            fill_tolerance: tolerance,
            stroke_tolerance: tolerance,
        }
    }
}

impl Default for HitParams {
    fn default() -> Self {
        Self::uniform(0.0)
    }
}

/// Score returned from a precise hit.
///
/// Lower distance is a better (closer) hit; interiors score zero so they
/// always win ties against tolerant edge hits.
#[derive(Clone, Copy, Debug)]
pub struct HitScore {
    /// Geometric distance in image pixels.
    pub distance: f64,
    /// Classification of what was hit.
    pub kind: HitKind,
}

impl HitScore {
    /// Convenience constructor for an interior hit at distance 0.
    #[must_use]
    pub const fn filled() -> Self {
        Self {
            distance: 0.0,
            kind: HitKind::Fill,
        }
    }
}

/// Precise hit test against one shape.
///
/// Returns `Some(HitScore)` when `pt` hits `shape` within the tolerances.
#[must_use]
pub fn hit_shape(shape: &Shape, pt: Point, params: &HitParams) -> Option<HitScore> {
    match shape {
        Shape::Point(p) => {
            let dist = p.point.distance(pt);
            (dist <= params.fill_tolerance).then_some(HitScore {
                distance: dist,
                kind: HitKind::Fill,
            })
        }
        Shape::Rectangle(r) => {
            let rect = r.rect();
            let inflated = rect.inflate(params.fill_tolerance, params.fill_tolerance);
            if !inflated.contains(pt) {
                return None;
            }
            // Interior points score 0; tolerant edge hits score their
            // distance to the original rect.
            let dx = (rect.x0 - pt.x).max(pt.x - rect.x1).max(0.0);
            let dy = (rect.y0 - pt.y).max(pt.y - rect.y1).max(0.0);
            Some(HitScore {
                distance: (dx * dx + dy * dy).sqrt(),
                kind: HitKind::Fill,
            })
        }
        Shape::Polygon(poly) => hit_ring(&poly.points, true, pt, params),
        Shape::MultiPolygon(m) => m
            .polygons
            .iter()
            .filter_map(|ring| hit_ring(ring, true, pt, params))
            .min_by(|a, b| a.distance.total_cmp(&b.distance)),
        Shape::Freehand(f) => hit_ring(&f.points, f.closed, pt, params),
        Shape::Image(i) => i.rect().contains(pt).then_some(HitScore::filled()),
    }
}

/// Hit test against a vertex ring: interior (when closed) or outline.
fn hit_ring(ring: &[Point], closed: bool, pt: Point, params: &HitParams) -> Option<HitScore> {
    if closed && ring_contains(ring, pt) {
        return Some(HitScore::filled());
    }
    let dist = polyline_distance(ring, closed, pt)?;
    (dist <= params.stroke_tolerance).then_some(HitScore {
        distance: dist,
        kind: HitKind::Stroke,
    })
}

/// Distance from `pt` to the nearest segment of a polyline.
///
/// `closed` adds the wrap-around segment. Returns `None` for degenerate
/// inputs (fewer than two vertices).
#[must_use]
pub fn polyline_distance(points: &[Point], closed: bool, pt: Point) -> Option<f64> {
    if points.len() < 2 {
        return (points.len() == 1).then(|| points[0].distance(pt));
    }
    let mut best = f64::INFINITY;
    for w in points.windows(2) {
        let seg = Line::new(w[0], w[1]);
        best = best.min(seg.nearest(pt, 1e-9).distance_sq);
    }
    if closed {
        let seg = Line::new(points[points.len() - 1], points[0]);
        best = best.min(seg.nearest(pt, 1e-9).distance_sq);
    }
    Some(best.sqrt())
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use kurbo::Point;

    use super::*;
    use crate::shape::{FreehandShape, PointShape, PolygonShape, RectangleShape};

    #[test]
    fn point_hit_respects_tolerance() {
        let shape = Shape::Point(PointShape {
            point: Point::new(1000.0, 1000.0),
        });
        let params = HitParams::uniform(5.0);
        assert!(hit_shape(&shape, Point::new(1004.0, 1000.0), &params).is_some());
        assert!(hit_shape(&shape, Point::new(1010.0, 1000.0), &params).is_none());
    }

    #[test]
    fn rectangle_interior_beats_tolerant_edge() {
        let shape = Shape::Rectangle(RectangleShape::new(0.0, 0.0, 10.0, 10.0));
        let params = HitParams::uniform(2.0);

        let interior = hit_shape(&shape, Point::new(5.0, 5.0), &params).unwrap();
        assert_eq!(interior.distance, 0.0);

        let edge = hit_shape(&shape, Point::new(11.0, 5.0), &params).unwrap();
        assert!(edge.distance > 0.0);

        assert!(hit_shape(&shape, Point::new(13.0, 5.0), &params).is_none());
    }

    #[test]
    fn polygon_outline_hits_within_stroke_tolerance() {
        let shape = Shape::Polygon(PolygonShape::new(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ]));
        let params = HitParams::uniform(1.0);

        let inside = hit_shape(&shape, Point::new(5.0, 5.0), &params).unwrap();
        assert_eq!(inside.kind, HitKind::Fill);

        let near_edge = hit_shape(&shape, Point::new(10.5, 5.0), &params).unwrap();
        assert_eq!(near_edge.kind, HitKind::Stroke);

        assert!(hit_shape(&shape, Point::new(12.0, 5.0), &params).is_none());
    }

    #[test]
    fn open_freehand_uses_segment_distance() {
        let shape = Shape::Freehand(FreehandShape::new(
            vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)],
            false,
        ));
        let params = HitParams::uniform(1.0);
        assert!(hit_shape(&shape, Point::new(5.0, 0.5), &params).is_some());
        // The wrap-around segment does not exist for open paths.
        assert!(hit_shape(&shape, Point::new(5.0, 3.0), &params).is_none());
    }

    #[test]
    fn polyline_distance_closed_adds_wrap_segment() {
        let pts = vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0)];
        let open = polyline_distance(&pts, false, Point::new(0.0, 5.0)).unwrap();
        let closed = polyline_distance(&pts, true, Point::new(0.0, 5.0)).unwrap();
        assert!(closed < open);
    }
}
