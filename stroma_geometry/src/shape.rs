// Copyright 2026 the Stroma Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shape variants and their geometric operations.

use alloc::sync::Arc;
use alloc::vec::Vec;

use kurbo::{Point, Rect, Vec2};

/// Tag identifying a [`Shape`] variant.
///
/// Variant-sensitive code (per-shape editors, renderers, exporters) is
/// registered in dispatch tables keyed by this tag so that catalog-level code
/// never needs to match on shapes.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ShapeKind {
    /// A single point marker.
    Point,
    /// An axis-aligned rectangle.
    Rectangle,
    /// A closed polygon with at least three vertices.
    Polygon,
    /// An open or closed freehand polyline.
    Freehand,
    /// A list of polygonal rings.
    MultiPolygon,
    /// A raster patch (analysis output).
    Image,
}

/// A single point marker in image coordinates.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PointShape {
    /// Marker position.
    pub point: Point,
}

/// An axis-aligned rectangle stored as origin plus extent.
///
/// The extent is kept non-negative: any constructor or mutation that would
/// produce a negative width or height swaps the corresponding origin and
/// extent instead (see [`RectangleShape::normalized`]).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RectangleShape {
    /// Minimum x of the rectangle.
    pub x: f64,
    /// Minimum y of the rectangle.
    pub y: f64,
    /// Horizontal extent, non-negative.
    pub width: f64,
    /// Vertical extent, non-negative.
    pub height: f64,
}

impl RectangleShape {
    /// Creates a rectangle, normalizing negative extents.
    #[must_use]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
        .normalized()
    }

    /// Creates the rectangle spanned by two opposite corners.
    #[must_use]
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self::new(a.x, a.y, b.x - a.x, b.y - a.y)
    }

    /// Returns a copy with non-negative width and height.
    ///
    /// A negative extent is folded back into the origin: `{x: 10, width: -4}`
    /// becomes `{x: 6, width: 4}`.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.width < 0.0 {
            self.x += self.width;
            self.width = -self.width;
        }
        if self.height < 0.0 {
            self.y += self.height;
            self.height = -self.height;
        }
        self
    }

    /// The rectangle as a [`Rect`].
    #[must_use]
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }

    /// Area in square image pixels.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// A closed polygon. The last vertex connects implicitly back to the first.
#[derive(Clone, Debug, PartialEq)]
pub struct PolygonShape {
    /// Vertices in order; at least three for a well-formed polygon.
    pub points: Vec<Point>,
}

impl PolygonShape {
    /// Creates a polygon from its vertices.
    #[must_use]
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Inserts a vertex before index `i` (clamped to the vertex count).
    #[must_use]
    pub fn insert_vertex(&self, i: usize, p: Point) -> Self {
        let mut points = self.points.clone();
        let i = i.min(points.len());
        points.insert(i, p);
        Self { points }
    }

    /// Deletes the vertex at `i`, refusing to drop below three vertices.
    ///
    /// Returns `None` when the polygon has exactly three vertices (deletion
    /// would leave a degenerate shape) or when `i` is out of range.
    #[must_use]
    pub fn delete_vertex(&self, i: usize) -> Option<Self> {
        if self.points.len() <= 3 || i >= self.points.len() {
            return None;
        }
        let mut points = self.points.clone();
        points.remove(i);
        Some(Self { points })
    }

    /// Replaces the vertex at `i`. Out-of-range indices leave the polygon
    /// unchanged.
    #[must_use]
    pub fn move_vertex(&self, i: usize, p: Point) -> Self {
        let mut points = self.points.clone();
        if let Some(v) = points.get_mut(i) {
            *v = p;
        }
        Self { points }
    }

    /// Ray-cast containment test (even-odd rule).
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        ring_contains(&self.points, p)
    }
}

/// A freehand polyline, open or closed.
#[derive(Clone, Debug, PartialEq)]
pub struct FreehandShape {
    /// Sampled vertices in draw order.
    pub points: Vec<Point>,
    /// Whether the last vertex connects back to the first.
    pub closed: bool,
}

impl FreehandShape {
    /// Creates a freehand path from its vertices.
    #[must_use]
    pub fn new(points: Vec<Point>, closed: bool) -> Self {
        Self { points, closed }
    }
}

/// A list of polygonal rings.
#[derive(Clone, Debug, PartialEq)]
pub struct MultiPolygonShape {
    /// Rings, each with the same conventions as [`PolygonShape::points`].
    pub polygons: Vec<Vec<Point>>,
}

impl MultiPolygonShape {
    /// Creates a multipolygon from its rings.
    #[must_use]
    pub fn new(polygons: Vec<Vec<Point>>) -> Self {
        Self { polygons }
    }

    /// Containment test: inside any ring (even-odd per ring).
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        self.polygons.iter().any(|ring| ring_contains(ring, p))
    }
}

/// Decoded RGBA pixel data for an [`ImageShape`].
#[derive(Clone, Debug, PartialEq)]
pub struct RasterPixels {
    /// Pixel width of the raster.
    pub width: u32,
    /// Pixel height of the raster.
    pub height: u32,
    /// Tightly packed RGBA8 data, row-major.
    pub rgba: Vec<u8>,
}

/// A raster patch positioned in image coordinates (analysis outputs such as
/// probability maps or mask previews).
#[derive(Clone, Debug, PartialEq)]
pub struct ImageShape {
    /// Minimum x of the patch in image coordinates.
    pub x: f64,
    /// Minimum y of the patch in image coordinates.
    pub y: f64,
    /// Width of the patch in image coordinates.
    pub width: f64,
    /// Height of the patch in image coordinates.
    pub height: f64,
    /// Shared pixel data; patches are cheap to clone.
    pub pixels: Arc<RasterPixels>,
}

impl ImageShape {
    /// The patch footprint as a [`Rect`].
    #[must_use]
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }
}

/// A tagged annotation shape.
///
/// Every variant yields a tight axis-aligned bounding box via
/// [`Shape::bounds`]; catalog code treats that box as the variant-independent
/// footprint and leaves everything else to kind-keyed dispatch.
#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    /// A single point marker.
    Point(PointShape),
    /// An axis-aligned rectangle.
    Rectangle(RectangleShape),
    /// A closed polygon.
    Polygon(PolygonShape),
    /// An open or closed freehand path.
    Freehand(FreehandShape),
    /// A list of polygonal rings.
    MultiPolygon(MultiPolygonShape),
    /// A raster patch.
    Image(ImageShape),
}

impl Shape {
    /// The variant tag.
    #[must_use]
    pub fn kind(&self) -> ShapeKind {
        match self {
            Self::Point(_) => ShapeKind::Point,
            Self::Rectangle(_) => ShapeKind::Rectangle,
            Self::Polygon(_) => ShapeKind::Polygon,
            Self::Freehand(_) => ShapeKind::Freehand,
            Self::MultiPolygon(_) => ShapeKind::MultiPolygon,
            Self::Image(_) => ShapeKind::Image,
        }
    }

    /// The tight axis-aligned bounding box of the shape's vertices.
    ///
    /// Point shapes yield a zero-area rect at the point; empty vertex lists
    /// yield [`Rect::ZERO`].
    #[must_use]
    pub fn bounds(&self) -> Rect {
        match self {
            Self::Point(p) => Rect::from_origin_size(p.point, (0.0, 0.0)),
            Self::Rectangle(r) => r.rect(),
            Self::Polygon(p) => points_bounds(&p.points),
            Self::Freehand(f) => points_bounds(&f.points),
            Self::MultiPolygon(m) => {
                let mut it = m.polygons.iter().filter(|ring| !ring.is_empty());
                let Some(first) = it.next() else {
                    return Rect::ZERO;
                };
                it.fold(points_bounds(first), |acc, ring| {
                    acc.union(points_bounds(ring))
                })
            }
            Self::Image(i) => i.rect(),
        }
    }

    /// Interior containment in image coordinates.
    ///
    /// Open freehand paths and bare points have no interior and always
    /// return `false`; use [`crate::hit::hit_shape`] for tolerance-based
    /// proximity tests.
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        match self {
            Self::Point(_) => false,
            Self::Rectangle(r) => r.rect().contains(p),
            Self::Polygon(poly) => poly.contains(p),
            Self::Freehand(f) => f.closed && ring_contains(&f.points, p),
            Self::MultiPolygon(m) => m.contains(p),
            Self::Image(i) => i.rect().contains(p),
        }
    }

    /// Returns the shape translated by `delta`.
    #[must_use]
    pub fn translated(&self, delta: Vec2) -> Self {
        match self {
            Self::Point(p) => Self::Point(PointShape {
                point: p.point + delta,
            }),
            Self::Rectangle(r) => Self::Rectangle(RectangleShape {
                x: r.x + delta.x,
                y: r.y + delta.y,
                ..*r
            }),
            Self::Polygon(p) => Self::Polygon(PolygonShape {
                points: translate_points(&p.points, delta),
            }),
            Self::Freehand(f) => Self::Freehand(FreehandShape {
                points: translate_points(&f.points, delta),
                closed: f.closed,
            }),
            Self::MultiPolygon(m) => Self::MultiPolygon(MultiPolygonShape {
                polygons: m
                    .polygons
                    .iter()
                    .map(|ring| translate_points(ring, delta))
                    .collect(),
            }),
            Self::Image(i) => Self::Image(ImageShape {
                x: i.x + delta.x,
                y: i.y + delta.y,
                ..i.clone()
            }),
        }
    }
}

fn translate_points(points: &[Point], delta: Vec2) -> Vec<Point> {
    points.iter().map(|&p| p + delta).collect()
}

/// Tight bounds of a vertex list; [`Rect::ZERO`] when empty.
pub(crate) fn points_bounds(points: &[Point]) -> Rect {
    let Some(&first) = points.first() else {
        return Rect::ZERO;
    };
    points.iter().skip(1).fold(
        Rect::from_origin_size(first, (0.0, 0.0)),
        |acc, &p| Rect::new(acc.x0.min(p.x), acc.y0.min(p.y), acc.x1.max(p.x), acc.y1.max(p.y)),
    )
}

/// Even-odd ray cast over a closed ring.
pub(crate) fn ring_contains(ring: &[Point], p: Point) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[j];
        if ((a.y > p.y) != (b.y > p.y))
            && (p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x)
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}
