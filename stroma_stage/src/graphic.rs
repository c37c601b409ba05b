// Copyright 2026 the Stroma Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-annotation retained graphics and style resolution.

use std::rc::Rc;

use kurbo::{BezPath, Point, Rect};
use peniko::Color;
use stroma_geometry::{Shape, ShapeKind};
use stroma_layers::LayerId;
use stroma_store::Annotation;

/// Fully resolved drawing style for one annotation.
///
/// Widths and radii are in screen pixels; the stage converts to image units
/// per frame so strokes keep constant thickness at any zoom.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StageStyle {
    /// Interior color.
    pub fill: Color,
    /// Interior opacity in `[0, 1]`.
    pub fill_opacity: f32,
    /// Outline color.
    pub stroke: Color,
    /// Outline opacity in `[0, 1]`.
    pub stroke_opacity: f32,
    /// Outline width in screen pixels.
    pub stroke_width: f64,
    /// Point marker radius in screen pixels.
    pub point_radius: f64,
}

impl Default for StageStyle {
    fn default() -> Self {
        Self {
            fill: Color::from_rgba8(0x1e, 0x88, 0xe5, 0xff),
            fill_opacity: 0.25,
            stroke: Color::from_rgba8(0x1e, 0x88, 0xe5, 0xff),
            stroke_opacity: 1.0,
            stroke_width: 2.0,
            point_radius: 5.0,
        }
    }
}

/// Dynamic style expression evaluated per annotation.
pub type StyleExpr = Rc<dyn Fn(&Annotation) -> StageStyle>;

/// Display filter: annotations failing it are not drawn (they stay in the
/// catalog and keep responding to hit tests).
pub type DisplayFilter = Rc<dyn Fn(&Annotation) -> bool>;

/// Interaction state of a graphic, affecting its tint and stroke width.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum VisualState {
    Base,
    Hovered,
    Selected,
}

/// Mixes `c` toward white by `amount`.
pub(crate) fn brighten(c: Color, amount: f32) -> Color {
    let [r, g, b, a] = c.components;
    Color::new([
        r + (1.0 - r) * amount,
        g + (1.0 - g) * amount,
        b + (1.0 - b) * amount,
        a,
    ])
}

/// Contrasting tint for selected annotations.
pub(crate) const SELECTION_COLOR: Color = Color::from_rgba8(0xff, 0xb3, 0x00, 0xff);

/// Applies the visual state to a resolved style.
pub(crate) fn styled_for_state(style: StageStyle, state: VisualState) -> StageStyle {
    match state {
        VisualState::Base => style,
        VisualState::Hovered => StageStyle {
            fill: brighten(style.fill, 0.3),
            stroke: brighten(style.stroke, 0.3),
            stroke_width: style.stroke_width * 1.5,
            ..style
        },
        VisualState::Selected => StageStyle {
            fill: SELECTION_COLOR,
            stroke: SELECTION_COLOR,
            stroke_width: style.stroke_width * 1.5,
            ..style
        },
    }
}

/// One retained graphic, kept in sync with its annotation by the stage.
#[derive(Clone, Debug)]
pub(crate) struct Graphic {
    /// Catalog snapshot backing style/filter re-evaluation.
    pub(crate) annotation: Annotation,
    /// Pre-built outline path in image coordinates (empty for points).
    pub(crate) path: BezPath,
    pub(crate) bounds: Rect,
    pub(crate) kind: ShapeKind,
    /// Resolved layer membership, in composition order.
    pub(crate) layers: Vec<LayerId>,
}

impl Graphic {
    pub(crate) fn new(annotation: &Annotation, layers: Vec<LayerId>) -> Self {
        Self {
            annotation: annotation.clone(),
            path: build_path(annotation.shape()),
            bounds: annotation.bounds(),
            kind: annotation.shape().kind(),
            layers,
        }
    }

    /// The marker position for point shapes.
    pub(crate) fn point(&self) -> Option<Point> {
        match self.annotation.shape() {
            Shape::Point(p) => Some(p.point),
            _ => None,
        }
    }

    /// Whether the shape has an interior to fill.
    pub(crate) fn filled(&self) -> bool {
        match self.annotation.shape() {
            Shape::Rectangle(_) | Shape::Polygon(_) | Shape::MultiPolygon(_) => true,
            Shape::Freehand(f) => f.closed,
            Shape::Point(_) | Shape::Image(_) => false,
        }
    }
}

/// Builds the image-space outline path for a shape.
pub(crate) fn build_path(shape: &Shape) -> BezPath {
    let mut path = BezPath::new();
    match shape {
        Shape::Point(_) => {}
        Shape::Rectangle(r) => add_rect(&mut path, r.rect()),
        Shape::Image(i) => add_rect(&mut path, i.rect()),
        Shape::Polygon(p) => add_ring(&mut path, &p.points, true),
        Shape::Freehand(f) => add_ring(&mut path, &f.points, f.closed),
        Shape::MultiPolygon(m) => {
            for ring in &m.polygons {
                add_ring(&mut path, ring, true);
            }
        }
    }
    path
}

fn add_rect(path: &mut BezPath, rect: Rect) {
    path.move_to((rect.x0, rect.y0));
    path.line_to((rect.x1, rect.y0));
    path.line_to((rect.x1, rect.y1));
    path.line_to((rect.x0, rect.y1));
    path.close_path();
}

fn add_ring(path: &mut BezPath, points: &[Point], closed: bool) {
    let Some(&first) = points.first() else {
        return;
    };
    path.move_to(first);
    for &p in &points[1..] {
        path.line_to(p);
    }
    if closed {
        path.close_path();
    }
}

/// Resolves the effective style: expression (or base), then per-annotation
/// overrides.
pub(crate) fn resolve_style(
    base: StageStyle,
    expr: Option<&StyleExpr>,
    annotation: &Annotation,
) -> StageStyle {
    let mut style = match expr {
        Some(e) => e(annotation),
        None => base,
    };
    if let Some(o) = &annotation.style {
        if let Some(fill) = o.fill {
            style.fill = fill;
        }
        if let Some(v) = o.fill_opacity {
            style.fill_opacity = v;
        }
        if let Some(stroke) = o.stroke {
            style.stroke = stroke;
        }
        if let Some(v) = o.stroke_opacity {
            style.stroke_opacity = v;
        }
        if let Some(v) = o.stroke_width {
            style.stroke_width = v;
        }
        if let Some(v) = o.point_radius {
            style.point_radius = v;
        }
    }
    style
}
