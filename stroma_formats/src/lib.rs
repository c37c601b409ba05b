// Copyright 2026 the Stroma Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stroma Formats: pure codecs between bytes/arrays and annotations.
//!
//! Everything here is a pure function — no I/O, no engine state:
//!
//! - [`geojson`]: annotations to and from GeoJSON `FeatureCollection`s,
//!   with the geometry mapping points → `Point`, rectangles/polygons/closed
//!   freehand → `Polygon`, multipolygons → `MultiPolygon`, and open
//!   freehand → `LineString`.
//! - [`npy`]: NumPy `.npy` parsing for segmentation embedding tensors
//!   (little-endian `f32`, shape exactly `[1, 256, 64, 64]`).
//! - [`labels`]: decoded label arrays to annotations — instance-mask
//!   centroids, coordinate tables, and Moore-neighbor contour tracing for
//!   8-bit label images.
//!
//! Container parsing (HDF5, PNG) happens outside the engine; these
//! functions take the decoded arrays.

pub mod geojson;
pub mod labels;
pub mod npy;

/// Errors from annotation codecs.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// JSON (de)serialization failed.
    #[error("geojson: {0}")]
    Json(#[from] serde_json::Error),
    /// A geometry type or shape cannot be represented.
    #[error("unsupported geometry: {0}")]
    UnsupportedGeometry(String),
    /// The `.npy` header is malformed.
    #[error("npy header: {0}")]
    BadHeader(String),
    /// The tensor does not match the required dtype or shape.
    #[error("embedding must be little-endian f32 of shape {expected:?}, got {got}")]
    BadTensor {
        /// The required shape.
        expected: [usize; 4],
        /// Description of what was found.
        got: String,
    },
    /// An array's length is inconsistent with its declared dimensions.
    #[error("array shape mismatch: {0}")]
    BadArray(String),
}
