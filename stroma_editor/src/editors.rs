// Copyright 2026 the Stroma Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-shape editors: handle layout and pure edit functions.
//!
//! Each editor answers two questions for its shape kind: where are the
//! drag handles, and what shape results from dragging one of them by a
//! delta. Edits are pure — they take the gesture-start snapshot and the
//! *total* drag offset, so re-applying with a larger offset never
//! accumulates error.

use kurbo::{Point, Vec2};
use stroma_geometry::{
    FreehandShape, PointShape, PolygonShape, RectangleShape, Shape, ShapeKind,
};

/// Identity of one drag handle on a shape.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum HandleId {
    /// Whole-shape translation.
    Body,
    /// Rectangle corner, counterclockwise from the minimum corner:
    /// 0 = top-left, 1 = top-right, 2 = bottom-right, 3 = bottom-left.
    Corner(u8),
    /// Rectangle edge: 0 = top, 1 = right, 2 = bottom, 3 = left.
    Edge(u8),
    /// Vertex of a polygon or freehand path.
    Vertex(usize),
    /// Midpoint of the polygon edge from vertex `i` to `i + 1`; dragging
    /// inserts a new vertex there.
    Midpoint(usize),
}

/// A drag handle with its image-space anchor position.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Handle {
    /// Which handle this is.
    pub id: HandleId,
    /// Anchor position in image pixels.
    pub pos: Point,
}

/// Handle exposure level: object handles only, or full vertex editing.
///
/// Vertex mode is entered by double-clicking a polygon or freehand shape.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum EditMode {
    /// Body/corner/edge handles.
    #[default]
    Object,
    /// Per-vertex handles plus midpoint-insert handles.
    Vertices,
}

/// Editing behavior for one shape kind.
pub trait ShapeEditor {
    /// The drag handles for `shape` at the given exposure level.
    fn handles(&self, shape: &Shape, mode: EditMode) -> Vec<Handle>;

    /// The shape resulting from dragging `handle` by `delta` from the
    /// gesture-start `shape`. `None` when the handle does not apply.
    fn edit(&self, shape: &Shape, handle: HandleId, delta: Vec2) -> Option<Shape>;

    /// Deletes the vertex addressed by `handle`, refusing degenerate
    /// results. Default: vertex deletion is unsupported.
    fn delete_vertex(&self, shape: &Shape, handle: HandleId) -> Option<Shape> {
        let _ = (shape, handle);
        None
    }
}

/// Looks up the editor for a shape kind.
///
/// Raster patches and multipolygons have no interactive editor; they are
/// produced and replaced by analysis passes.
#[must_use]
pub fn editor_for(kind: ShapeKind) -> Option<&'static dyn ShapeEditor> {
    match kind {
        ShapeKind::Point => Some(&PointEditor),
        ShapeKind::Rectangle => Some(&RectangleEditor),
        ShapeKind::Polygon => Some(&PolygonEditor),
        ShapeKind::Freehand => Some(&FreehandEditor),
        ShapeKind::MultiPolygon | ShapeKind::Image => None,
    }
}

/// Editor for point markers: a single body handle.
#[derive(Debug)]
pub struct PointEditor;

impl ShapeEditor for PointEditor {
    fn handles(&self, shape: &Shape, _mode: EditMode) -> Vec<Handle> {
        match shape {
            Shape::Point(p) => vec![Handle {
                id: HandleId::Body,
                pos: p.point,
            }],
            _ => Vec::new(),
        }
    }

    fn edit(&self, shape: &Shape, handle: HandleId, delta: Vec2) -> Option<Shape> {
        let Shape::Point(p) = shape else { return None };
        match handle {
            HandleId::Body => Some(Shape::Point(PointShape {
                point: p.point + delta,
            })),
            _ => None,
        }
    }
}

/// Editor for rectangles: four corners, four edges, and the body.
#[derive(Debug)]
pub struct RectangleEditor;

impl RectangleEditor {
    fn corners(r: &RectangleShape) -> [Point; 4] {
        [
            Point::new(r.x, r.y),
            Point::new(r.x + r.width, r.y),
            Point::new(r.x + r.width, r.y + r.height),
            Point::new(r.x, r.y + r.height),
        ]
    }
}

impl ShapeEditor for RectangleEditor {
    fn handles(&self, shape: &Shape, _mode: EditMode) -> Vec<Handle> {
        let Shape::Rectangle(r) = shape else {
            return Vec::new();
        };
        let c = Self::corners(r);
        let mut out = Vec::with_capacity(9);
        for (i, &pos) in c.iter().enumerate() {
            out.push(Handle {
                id: HandleId::Corner(i as u8),
                pos,
            });
        }
        for i in 0..4_u8 {
            let a = c[usize::from(i)];
            let b = c[usize::from((i + 1) % 4)];
            out.push(Handle {
                id: HandleId::Edge(i),
                pos: a.midpoint(b),
            });
        }
        out.push(Handle {
            id: HandleId::Body,
            pos: r.rect().center(),
        });
        out
    }

    fn edit(&self, shape: &Shape, handle: HandleId, delta: Vec2) -> Option<Shape> {
        let Shape::Rectangle(r) = shape else { return None };
        let c = Self::corners(r);
        let next = match handle {
            HandleId::Body => RectangleShape {
                x: r.x + delta.x,
                y: r.y + delta.y,
                ..*r
            },
            // Corner drags keep the opposite corner fixed; crossing it
            // flips and normalizes.
            HandleId::Corner(i) if i < 4 => {
                let moved = c[usize::from(i)] + delta;
                let opposite = c[usize::from((i + 2) % 4)];
                RectangleShape::from_corners(opposite, moved)
            }
            HandleId::Edge(0) => {
                RectangleShape::new(r.x, r.y + delta.y, r.width, r.height - delta.y)
            }
            HandleId::Edge(1) => RectangleShape::new(r.x, r.y, r.width + delta.x, r.height),
            HandleId::Edge(2) => RectangleShape::new(r.x, r.y, r.width, r.height + delta.y),
            HandleId::Edge(3) => {
                RectangleShape::new(r.x + delta.x, r.y, r.width - delta.x, r.height)
            }
            _ => return None,
        };
        Some(Shape::Rectangle(next.normalized()))
    }
}

/// Editor for polygons: body in object mode; vertices plus midpoint-insert
/// handles in vertex mode.
#[derive(Debug)]
pub struct PolygonEditor;

impl ShapeEditor for PolygonEditor {
    fn handles(&self, shape: &Shape, mode: EditMode) -> Vec<Handle> {
        let Shape::Polygon(p) = shape else {
            return Vec::new();
        };
        match mode {
            EditMode::Object => vec![Handle {
                id: HandleId::Body,
                pos: shape.bounds().center(),
            }],
            EditMode::Vertices => {
                let n = p.points.len();
                let mut out = Vec::with_capacity(n * 2);
                for (i, &pos) in p.points.iter().enumerate() {
                    out.push(Handle {
                        id: HandleId::Vertex(i),
                        pos,
                    });
                }
                for i in 0..n {
                    let mid = p.points[i].midpoint(p.points[(i + 1) % n]);
                    out.push(Handle {
                        id: HandleId::Midpoint(i),
                        pos: mid,
                    });
                }
                out
            }
        }
    }

    fn edit(&self, shape: &Shape, handle: HandleId, delta: Vec2) -> Option<Shape> {
        let Shape::Polygon(p) = shape else { return None };
        match handle {
            HandleId::Body => Some(shape.translated(delta)),
            HandleId::Vertex(i) => {
                let pos = *p.points.get(i)? + delta;
                Some(Shape::Polygon(p.move_vertex(i, pos)))
            }
            // Dragging a midpoint inserts a vertex there and carries it
            // along; applied from the snapshot, so the insertion happens
            // once per gesture no matter how many drag events arrive.
            HandleId::Midpoint(i) if i < p.points.len() => {
                let n = p.points.len();
                let mid = p.points[i].midpoint(p.points[(i + 1) % n]);
                Some(Shape::Polygon(p.insert_vertex(i + 1, mid + delta)))
            }
            _ => None,
        }
    }

    fn delete_vertex(&self, shape: &Shape, handle: HandleId) -> Option<Shape> {
        let Shape::Polygon(p) = shape else { return None };
        let HandleId::Vertex(i) = handle else {
            return None;
        };
        p.delete_vertex(i).map(Shape::Polygon)
    }
}

/// Editor for freehand paths: body drag plus per-vertex handles.
#[derive(Debug)]
pub struct FreehandEditor;

impl ShapeEditor for FreehandEditor {
    fn handles(&self, shape: &Shape, mode: EditMode) -> Vec<Handle> {
        let Shape::Freehand(f) = shape else {
            return Vec::new();
        };
        let mut out = vec![Handle {
            id: HandleId::Body,
            pos: shape.bounds().center(),
        }];
        if mode == EditMode::Vertices {
            for (i, &pos) in f.points.iter().enumerate() {
                out.push(Handle {
                    id: HandleId::Vertex(i),
                    pos,
                });
            }
        }
        out
    }

    fn edit(&self, shape: &Shape, handle: HandleId, delta: Vec2) -> Option<Shape> {
        let Shape::Freehand(f) = shape else { return None };
        match handle {
            HandleId::Body => Some(shape.translated(delta)),
            HandleId::Vertex(i) => {
                let mut points = f.points.clone();
                let v = points.get_mut(i)?;
                *v += delta;
                Some(Shape::Freehand(FreehandShape::new(points, f.closed)))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use stroma_geometry::PolygonShape;

    use super::*;

    fn rect_shape() -> Shape {
        Shape::Rectangle(RectangleShape::new(10.0, 10.0, 40.0, 20.0))
    }

    #[test]
    fn rectangle_exposes_nine_handles() {
        let handles = RectangleEditor.handles(&rect_shape(), EditMode::Object);
        assert_eq!(handles.len(), 9);
        let corners = handles
            .iter()
            .filter(|h| matches!(h.id, HandleId::Corner(_)))
            .count();
        let edges = handles
            .iter()
            .filter(|h| matches!(h.id, HandleId::Edge(_)))
            .count();
        assert_eq!((corners, edges), (4, 4));
    }

    #[test]
    fn corner_drag_past_opposite_corner_flips() {
        // Drag the bottom-right corner far past the top-left.
        let edited = RectangleEditor
            .edit(&rect_shape(), HandleId::Corner(2), Vec2::new(-60.0, -40.0))
            .unwrap();
        let Shape::Rectangle(r) = edited else {
            panic!("rectangle edit yields a rectangle");
        };
        // The moved corner lands at (-10, -10); the opposite corner (10, 10)
        // stays fixed and the result normalizes.
        assert_eq!((r.x, r.y), (-10.0, -10.0));
        assert_eq!((r.width, r.height), (20.0, 20.0));
    }

    #[test]
    fn edge_drag_moves_one_side() {
        let edited = RectangleEditor
            .edit(&rect_shape(), HandleId::Edge(1), Vec2::new(15.0, 99.0))
            .unwrap();
        let Shape::Rectangle(r) = edited else {
            panic!("rectangle edit yields a rectangle");
        };
        assert_eq!((r.x, r.y, r.width, r.height), (10.0, 10.0, 55.0, 20.0));
    }

    #[test]
    fn midpoint_drag_inserts_exactly_one_vertex_per_gesture() {
        let square = Shape::Polygon(PolygonShape::new(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ]));
        // Two drag events of the same gesture, growing total offset.
        let first = PolygonEditor
            .edit(&square, HandleId::Midpoint(0), Vec2::new(0.0, -2.0))
            .unwrap();
        let second = PolygonEditor
            .edit(&square, HandleId::Midpoint(0), Vec2::new(0.0, -5.0))
            .unwrap();
        let (Shape::Polygon(a), Shape::Polygon(b)) = (&first, &second) else {
            panic!("polygon edits yield polygons");
        };
        assert_eq!(a.points.len(), 5);
        assert_eq!(b.points.len(), 5);
        assert_eq!(b.points[1], Point::new(5.0, -5.0));
    }

    #[test]
    fn vertex_deletion_respects_minimum() {
        let quad = Shape::Polygon(PolygonShape::new(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ]));
        let tri = PolygonEditor
            .delete_vertex(&quad, HandleId::Vertex(0))
            .unwrap();
        assert!(PolygonEditor
            .delete_vertex(&tri, HandleId::Vertex(0))
            .is_none());
    }

    #[test]
    fn registry_covers_editable_kinds() {
        assert!(editor_for(ShapeKind::Point).is_some());
        assert!(editor_for(ShapeKind::Rectangle).is_some());
        assert!(editor_for(ShapeKind::Polygon).is_some());
        assert!(editor_for(ShapeKind::Freehand).is_some());
        assert!(editor_for(ShapeKind::MultiPolygon).is_none());
        assert!(editor_for(ShapeKind::Image).is_none());
    }
}
