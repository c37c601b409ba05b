// Copyright 2026 the Stroma Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Push tool: radial vertex sculpting over polygons.
//!
//! Pressing captures the original vertices of every polygon touching the
//! viewport. Each drag recomputes every polygon *from those originals* as a
//! pure function of the current cursor — vertices inside the brush radius
//! displace radially outward with linear falloff, vertices outside snap
//! back. Nothing accumulates, so dragging back undoes the push smoothly and
//! the final shapes depend only on where the cursor ends up. Release
//! commits every changed polygon as one batch undo step.

use kurbo::Point;
use log::warn;
use stroma_geometry::{PolygonShape, Shape};
use stroma_history::{BatchCommand, BoxedCommand, UpdateCommand};
use stroma_store::{Annotation, AnnotationId};

use crate::{PointerEvent, Tool, ToolCtx, ToolResponse};

/// Baseline displacement in image pixels at full strength and zero falloff.
const BASE_AMOUNT: f64 = 10.0;

/// Push tool configuration.
#[derive(Clone, Debug)]
pub struct PushToolOptions {
    /// Brush radius in image pixels.
    pub push_radius: f64,
    /// Displacement multiplier.
    pub push_strength: f64,
    /// Whether to expose the translucent cursor disc overlay.
    pub show_cursor: bool,
    /// Restrict sculpting to polygons routed to this layer id.
    pub layer: Option<String>,
}

impl Default for PushToolOptions {
    fn default() -> Self {
        Self {
            push_radius: 5.0,
            push_strength: 1.0,
            show_cursor: true,
            layer: None,
        }
    }
}

/// Deforms `original` as a pure function of the current cursor.
///
/// Vertices within `radius` of `cursor` move radially outward by
/// `(1 − d/radius) · strength · BASE_AMOUNT`; all others return to their
/// original positions. Calling this twice with the same arguments yields
/// the same polygon regardless of intervening calls.
#[must_use]
pub fn push_deform(
    original: &PolygonShape,
    cursor: Point,
    radius: f64,
    strength: f64,
) -> PolygonShape {
    let points = original
        .points
        .iter()
        .map(|&v| {
            let d = v.distance(cursor);
            if d >= radius || d <= f64::EPSILON {
                return v;
            }
            let falloff = 1.0 - d / radius;
            let dir = (v - cursor) / d;
            v + dir * (falloff * strength * BASE_AMOUNT)
        })
        .collect();
    PolygonShape::new(points)
}

#[derive(Debug)]
struct Session {
    /// Pre-gesture annotations, keyed by id.
    originals: Vec<(AnnotationId, Annotation)>,
}

/// Viewport-wide polygon sculpting.
#[derive(Debug, Default)]
pub struct PushTool {
    /// Tool configuration.
    pub options: PushToolOptions,
    session: Option<Session>,
    cursor: Option<Point>,
}

impl PushTool {
    /// Creates the tool with options.
    #[must_use]
    pub fn new(options: PushToolOptions) -> Self {
        Self {
            options,
            session: None,
            cursor: None,
        }
    }

    /// Cursor disc overlay: center in image pixels plus the brush radius in
    /// image pixels, or `None` when hidden.
    #[must_use]
    pub fn cursor(&self) -> Option<(Point, f64)> {
        if !self.options.show_cursor {
            return None;
        }
        self.cursor.map(|c| (c, self.options.push_radius))
    }

    fn eligible(&self, annotation: &Annotation) -> bool {
        if !matches!(annotation.shape(), Shape::Polygon(_)) {
            return false;
        }
        match &self.options.layer {
            Some(layer) => annotation.properties.layer.as_deref() == Some(layer.as_str()),
            None => true,
        }
    }

    fn apply_deformation(&self, cursor: Point, ctx: &mut ToolCtx<'_>) {
        let Some(session) = &self.session else { return };
        for (id, original) in &session.originals {
            let Shape::Polygon(base) = original.shape() else {
                continue;
            };
            let deformed = push_deform(
                base,
                cursor,
                self.options.push_radius,
                self.options.push_strength,
            );
            let changed = ctx
                .store
                .get(id)
                .is_some_and(|current| match current.shape() {
                    Shape::Polygon(p) => p.points != deformed.points,
                    _ => false,
                });
            if changed
                && let Err(e) = ctx
                    .store
                    .update(id, original.with_shape(Shape::Polygon(deformed)))
            {
                warn!("push tool: deform update failed: {e}");
            }
        }
    }
}

impl Tool for PushTool {
    fn id(&self) -> &'static str {
        "push"
    }

    fn on_press(&mut self, event: &PointerEvent, ctx: &mut ToolCtx<'_>) -> ToolResponse {
        let viewport = ctx.view.visible_image_rect();
        let originals: Vec<(AnnotationId, Annotation)> = ctx
            .store
            .search(viewport)
            .into_iter()
            .filter(|a| self.eligible(a))
            .map(|a| (a.id().clone(), a.clone()))
            .collect();

        // Pressing inside a polygon body, away from every vertex, yields to
        // selection instead of sculpting.
        let near_vertex = originals.iter().any(|(_, a)| match a.shape() {
            Shape::Polygon(p) => p
                .points
                .iter()
                .any(|v| v.distance(event.image) < self.options.push_radius),
            _ => false,
        });
        if !near_vertex {
            let inside_body = originals
                .iter()
                .any(|(_, a)| a.shape().contains(event.image));
            if inside_body {
                self.session = None;
                return ToolResponse::Pass;
            }
        }

        self.cursor = Some(event.image);
        self.session = Some(Session { originals });
        ToolResponse::Handled
    }

    fn on_drag(&mut self, event: &PointerEvent, ctx: &mut ToolCtx<'_>) -> ToolResponse {
        if self.session.is_none() {
            return ToolResponse::Pass;
        }
        self.cursor = Some(event.image);
        self.apply_deformation(event.image, ctx);
        ToolResponse::Handled
    }

    fn on_release(&mut self, _event: &PointerEvent, ctx: &mut ToolCtx<'_>) -> ToolResponse {
        let Some(session) = self.session.take() else {
            return ToolResponse::Pass;
        };
        let mut commands: Vec<BoxedCommand> = Vec::new();
        for (id, original) in session.originals {
            let Some(current) = ctx.store.get(&id) else {
                continue;
            };
            if current != &original {
                commands.push(Box::new(UpdateCommand::new(original, current.clone())));
            }
        }
        if !commands.is_empty() {
            // One batch step for the whole sculpt gesture.
            ctx.history
                .record(Box::new(BatchCommand::new(commands, "push vertices")));
        }
        ToolResponse::Handled
    }

    fn on_hover(&mut self, event: &PointerEvent, _ctx: &mut ToolCtx<'_>) -> ToolResponse {
        self.cursor = Some(event.image);
        ToolResponse::Pass
    }

    fn brush_cursor(&self) -> Option<(Point, f64)> {
        self.cursor()
    }

    fn on_escape(&mut self, ctx: &mut ToolCtx<'_>) {
        // Snap everything back to the captured originals.
        if let Some(session) = self.session.take() {
            for (id, original) in session.originals {
                if ctx.store.get(&id).is_some_and(|c| c != &original)
                    && let Err(e) = ctx.store.update(&id, original)
                {
                    warn!("push tool: restore failed: {e}");
                }
            }
        }
    }

    fn deactivate(&mut self, ctx: &mut ToolCtx<'_>) {
        self.on_escape(ctx);
        self.cursor = None;
    }
}
