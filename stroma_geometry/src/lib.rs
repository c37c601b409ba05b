// Copyright 2026 the Stroma Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stroma Geometry: annotation shape primitives for gigapixel imagery.
//!
//! This crate defines the shape variants an annotation can carry — points,
//! rectangles, polygons, freehand paths, multipolygons, and raster patches —
//! together with the geometric operations the rest of the engine builds on:
//!
//! - Tight axis-aligned bounds for every variant ([`Shape::bounds`]).
//! - Rectangle normalization so widths and heights never go negative
//!   ([`RectangleShape::normalized`]).
//! - Vertex editing for polygons with the minimum-vertex rule
//!   ([`PolygonShape::delete_vertex`] refuses to drop below three).
//! - Ray-cast point-in-polygon and segment-distance tests ([`hit`]).
//! - Ramer–Douglas–Peucker polyline simplification ([`simplify`]).
//!
//! All coordinates are in image pixels of the full-resolution source image.
//! Shapes are plain data; nothing here knows about stores, layers, or
//! rendering. Variant-sensitive code elsewhere in the engine dispatches on
//! [`ShapeKind`] rather than matching shapes directly.
//!
//! ## Minimal example
//!
//! ```rust
//! use kurbo::Point;
//! use stroma_geometry::{PolygonShape, Shape};
//!
//! let poly = PolygonShape::new(vec![
//!     Point::new(0.0, 0.0),
//!     Point::new(10.0, 0.0),
//!     Point::new(10.0, 10.0),
//! ]);
//! let shape = Shape::Polygon(poly);
//! let bounds = shape.bounds();
//! assert_eq!(bounds.width(), 10.0);
//! assert!(shape.contains(Point::new(8.0, 1.0)));
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

pub mod hit;
pub mod simplify;

mod shape;

pub use shape::{
    FreehandShape, ImageShape, MultiPolygonShape, PointShape, PolygonShape, RasterPixels,
    RectangleShape, Shape, ShapeKind,
};
