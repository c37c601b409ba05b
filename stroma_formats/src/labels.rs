// Copyright 2026 the Stroma Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Decoded label arrays to annotations.
//!
//! These functions sit behind the external container decoders: an HDF5 or
//! PNG reader produces a flat label array, and this module turns it into
//! annotation geometry — one centroid point per instance id, one point per
//! coordinate-table row, or polygon rings traced along label boundaries
//! with the Moore neighborhood. Only outer contours are traced; holes are
//! out of the shape model.

use std::collections::BTreeMap;

use kurbo::Point;
use stroma_geometry::{PointShape, PolygonShape, Shape};
use stroma_store::Annotation;

use crate::FormatError;

/// One centroid per distinct nonzero id in a 2-D instance mask.
///
/// `labels` is row-major `width × height`; id 0 is background. Results are
/// ordered by id.
pub fn centroid_points(
    labels: &[u32],
    width: usize,
    height: usize,
) -> Result<Vec<(u32, Point)>, FormatError> {
    if labels.len() != width * height {
        return Err(FormatError::BadArray(format!(
            "{} values for {width}x{height} mask",
            labels.len()
        )));
    }
    let mut sums: BTreeMap<u32, (f64, f64, f64)> = BTreeMap::new();
    for y in 0..height {
        for x in 0..width {
            let id = labels[y * width + x];
            if id == 0 {
                continue;
            }
            let entry = sums.entry(id).or_insert((0.0, 0.0, 0.0));
            entry.0 += x as f64;
            entry.1 += y as f64;
            entry.2 += 1.0;
        }
    }
    Ok(sums
        .into_iter()
        .map(|(id, (sx, sy, n))| (id, Point::new(sx / n, sy / n)))
        .collect())
}

/// Point annotations from an instance mask, ids formed as `{prefix}-{id}`.
pub fn centroid_annotations(
    labels: &[u32],
    width: usize,
    height: usize,
    prefix: &str,
) -> Result<Vec<Annotation>, FormatError> {
    Ok(centroid_points(labels, width, height)?
        .into_iter()
        .map(|(id, point)| {
            Annotation::new(format!("{prefix}-{id}"), Shape::Point(PointShape { point }))
        })
        .collect())
}

/// One point per row of a coordinate table with `columns ≥ 2` columns.
///
/// Extra columns (confidence scores, class ids) are ignored.
pub fn coordinate_points(values: &[f64], columns: usize) -> Result<Vec<Point>, FormatError> {
    if columns < 2 {
        return Err(FormatError::BadArray(format!(
            "coordinate table needs at least 2 columns, got {columns}"
        )));
    }
    if !values.len().is_multiple_of(columns) {
        return Err(FormatError::BadArray(format!(
            "{} values do not divide into rows of {columns}",
            values.len()
        )));
    }
    Ok(values
        .chunks_exact(columns)
        .map(|row| Point::new(row[0], row[1]))
        .collect())
}

/// Clockwise Moore neighborhood with y growing downward, starting west.
const NEIGHBORS: [(i64, i64); 8] = [
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
];

/// Outer contours of every distinct nonzero label in an 8-bit label image.
///
/// Returns `(label, ring)` pairs; rings are boundary pixel positions in
/// trace order. Blobs whose contour has fewer than three points are
/// dropped (they cannot form polygons).
pub fn label_contours(
    labels: &[u8],
    width: usize,
    height: usize,
) -> Result<Vec<(u8, Vec<Point>)>, FormatError> {
    if labels.len() != width * height {
        return Err(FormatError::BadArray(format!(
            "{} values for {width}x{height} image",
            labels.len()
        )));
    }
    let mut visited = vec![false; labels.len()];
    let mut out = Vec::new();
    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            let label = labels[idx];
            if label == 0 || visited[idx] {
                continue;
            }
            // Start pixels have background to their west in scan order.
            if x > 0 && labels[idx - 1] == label {
                continue;
            }
            let ring = trace_contour(labels, width, height, (x, y), label, &mut visited);
            if ring.len() >= 3 {
                out.push((label, ring));
            }
        }
    }
    Ok(out)
}

/// Polygon annotations from label contours, ids formed as
/// `{prefix}-{label}-{n}`.
pub fn contour_annotations(
    labels: &[u8],
    width: usize,
    height: usize,
    prefix: &str,
) -> Result<Vec<Annotation>, FormatError> {
    Ok(label_contours(labels, width, height)?
        .into_iter()
        .enumerate()
        .map(|(n, (label, ring))| {
            Annotation::new(
                format!("{prefix}-{label}-{n}"),
                Shape::Polygon(PolygonShape::new(ring)),
            )
        })
        .collect())
}

/// Moore-neighbor boundary trace from the blob's scan-order start pixel.
fn trace_contour(
    labels: &[u8],
    width: usize,
    height: usize,
    start: (usize, usize),
    label: u8,
    visited: &mut [bool],
) -> Vec<Point> {
    let fg = |x: i64, y: i64| -> bool {
        x >= 0
            && y >= 0
            && (x as usize) < width
            && (y as usize) < height
            && labels[y as usize * width + x as usize] == label
    };

    let mut ring = vec![Point::new(start.0 as f64, start.1 as f64)];
    visited[start.1 * width + start.0] = true;

    let mut p = (start.0 as i64, start.1 as i64);
    // The start pixel was entered from the west; search clockwise from NW.
    let mut search_from = 1_usize;
    let max_steps = 4 * labels.len();
    for _ in 0..max_steps {
        let mut advanced = false;
        for k in 0..8 {
            let d = (search_from + k) % 8;
            let q = (p.0 + NEIGHBORS[d].0, p.1 + NEIGHBORS[d].1);
            if !fg(q.0, q.1) {
                continue;
            }
            if (q.0 as usize, q.1 as usize) == start {
                // Closed the loop.
                return ring;
            }
            ring.push(Point::new(q.0 as f64, q.1 as f64));
            visited[q.1 as usize * width + q.0 as usize] = true;
            p = q;
            // Resume the clockwise search just past the backtrack
            // direction (the neighbor pointing at the previous pixel).
            search_from = (d + 5) % 8;
            advanced = true;
            break;
        }
        if !advanced {
            // Isolated pixel.
            break;
        }
    }
    ring
}
