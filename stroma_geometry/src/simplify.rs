// Copyright 2026 the Stroma Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Ramer–Douglas–Peucker polyline simplification.
//!
//! Freehand capture samples the pointer on every move event, which at high
//! zoom produces hundreds of near-collinear vertices per stroke. Simplifying
//! with a tolerance in image pixels keeps the stored shape small without
//! visibly changing it; higher tolerances keep fewer points.

use alloc::vec::Vec;

use kurbo::{Line, ParamCurveNearest, Point};

/// Simplifies `points` so that no removed vertex deviates from the
/// simplified polyline by more than `epsilon` image pixels.
///
/// Endpoints are always kept. Inputs with fewer than three vertices and
/// non-positive tolerances are returned unchanged.
#[must_use]
pub fn simplify(points: &[Point], epsilon: f64) -> Vec<Point> {
    if points.len() < 3 || epsilon <= 0.0 {
        return points.to_vec();
    }
    let mut keep = Vec::with_capacity(points.len());
    keep.push(points[0]);
    simplify_range(points, 0, points.len() - 1, epsilon * epsilon, &mut keep);
    keep.push(points[points.len() - 1]);
    keep
}

/// Recursively keeps the farthest vertex of `(first, last)` while it exceeds
/// the squared tolerance. Appends kept interior vertices in order.
fn simplify_range(
    points: &[Point],
    first: usize,
    last: usize,
    epsilon_sq: f64,
    keep: &mut Vec<Point>,
) {
    if last <= first + 1 {
        return;
    }
    let chord = Line::new(points[first], points[last]);
    let mut farthest = first;
    let mut max_dist_sq = 0.0;
    for i in (first + 1)..last {
        let dist_sq = if points[first] == points[last] {
            // Degenerate chord: fall back to point distance.
            points[i].distance_squared(points[first])
        } else {
            chord.nearest(points[i], 1e-9).distance_sq
        };
        if dist_sq > max_dist_sq {
            max_dist_sq = dist_sq;
            farthest = i;
        }
    }
    if max_dist_sq > epsilon_sq {
        simplify_range(points, first, farthest, epsilon_sq, keep);
        keep.push(points[farthest]);
        simplify_range(points, farthest, last, epsilon_sq, keep);
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use kurbo::Point;

    use super::simplify;

    #[test]
    fn collinear_points_collapse_to_endpoints() {
        let pts: Vec<Point> = (0..=10).map(|i| Point::new(f64::from(i), 0.0)).collect();
        let out = simplify(&pts, 0.5);
        assert_eq!(out, vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)]);
    }

    #[test]
    fn corners_survive_simplification() {
        let pts = vec![
            Point::new(0.0, 0.0),
            Point::new(5.0, 0.1),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
        ];
        let out = simplify(&pts, 2.0);
        assert!(out.contains(&Point::new(10.0, 0.0)));
        assert!(!out.contains(&Point::new(5.0, 0.1)));
    }

    #[test]
    fn higher_tolerance_keeps_fewer_points() {
        let pts: Vec<Point> = (0..100)
            .map(|i| {
                let t = f64::from(i) * 0.1;
                Point::new(t * 10.0, (t * 3.0).sin() * 4.0)
            })
            .collect();
        let coarse = simplify(&pts, 2.0);
        let fine = simplify(&pts, 0.1);
        assert!(coarse.len() < fine.len());
        assert!(fine.len() <= pts.len());
    }

    #[test]
    fn short_inputs_unchanged() {
        let pts = vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)];
        assert_eq!(simplify(&pts, 5.0), pts);
    }
}
