// Copyright 2026 the Stroma Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Rectangle tool: press anchors a corner, drag spans, release commits.
//!
//! The in-progress rectangle is a real annotation flagged `drawing`, so it
//! renders live while the pointer moves. Intermediate states bypass the
//! history; the finished rectangle is recorded as one create step. Releases
//! spanning less than the minimum area abort the gesture.

use kurbo::Point;
use log::warn;
use stroma_geometry::{RectangleShape, Shape};
use stroma_history::CreateCommand;
use stroma_store::{Annotation, AnnotationId};

use crate::{fresh_id, AnnotationSeed, PointerEvent, Tool, ToolCtx, ToolResponse};

/// Rectangle tool configuration.
#[derive(Clone, Copy, Debug)]
pub struct RectangleToolOptions {
    /// Releases below this area (image px²) abort the gesture.
    pub min_area: f64,
}

impl Default for RectangleToolOptions {
    fn default() -> Self {
        Self { min_area: 4.0 }
    }
}

#[derive(Debug)]
struct Draft {
    id: AnnotationId,
    anchor: Point,
}

/// Press/drag/release rectangle drawing.
#[derive(Debug, Default)]
pub struct RectangleTool {
    /// Properties and style stamped onto created rectangles.
    pub seed: AnnotationSeed,
    /// Tool configuration.
    pub options: RectangleToolOptions,
    draft: Option<Draft>,
    counter: u64,
}

impl RectangleTool {
    /// Creates the tool with a property seed and options.
    #[must_use]
    pub fn new(seed: AnnotationSeed, options: RectangleToolOptions) -> Self {
        Self {
            seed,
            options,
            draft: None,
            counter: 0,
        }
    }

    fn cancel(&mut self, ctx: &mut ToolCtx<'_>) {
        if let Some(draft) = self.draft.take()
            && let Err(e) = ctx.store.delete(&draft.id)
        {
            warn!("rectangle tool: cancel failed: {e}");
        }
    }
}

impl Tool for RectangleTool {
    fn id(&self) -> &'static str {
        "rectangle"
    }

    fn on_press(&mut self, event: &PointerEvent, ctx: &mut ToolCtx<'_>) -> ToolResponse {
        self.cancel(ctx);
        let id = fresh_id(ctx.store, "rect", &mut self.counter);
        let mut annotation = self.seed.apply(Annotation::new(
            id.clone(),
            Shape::Rectangle(RectangleShape::new(event.image.x, event.image.y, 0.0, 0.0)),
        ));
        annotation.properties.drawing = true;
        if let Err(e) = ctx.store.add(annotation) {
            warn!("rectangle tool: draft add failed: {e}");
            return ToolResponse::Pass;
        }
        self.draft = Some(Draft {
            id,
            anchor: event.image,
        });
        ToolResponse::Handled
    }

    fn on_drag(&mut self, event: &PointerEvent, ctx: &mut ToolCtx<'_>) -> ToolResponse {
        let Some(draft) = &self.draft else {
            return ToolResponse::Pass;
        };
        if let Some(current) = ctx.store.get(&draft.id) {
            // from_corners normalizes drags crossing the anchor.
            let next =
                current.with_shape(Shape::Rectangle(RectangleShape::from_corners(
                    draft.anchor,
                    event.image,
                )));
            if let Err(e) = ctx.store.update(&draft.id, next) {
                warn!("rectangle tool: draft update failed: {e}");
            }
        }
        ToolResponse::Handled
    }

    fn on_release(&mut self, _event: &PointerEvent, ctx: &mut ToolCtx<'_>) -> ToolResponse {
        let Some(draft) = self.draft.take() else {
            return ToolResponse::Pass;
        };
        let Some(current) = ctx.store.get(&draft.id).cloned() else {
            return ToolResponse::Pass;
        };
        let too_small = match current.shape() {
            Shape::Rectangle(r) => r.area() < self.options.min_area,
            _ => true,
        };
        if too_small {
            if let Err(e) = ctx.store.delete(&draft.id) {
                warn!("rectangle tool: abort failed: {e}");
            }
            return ToolResponse::Handled;
        }
        let mut finished = current;
        finished.properties.drawing = false;
        if let Err(e) = ctx.store.update(&draft.id, finished.clone()) {
            warn!("rectangle tool: finalize failed: {e}");
        }
        // The whole gesture becomes a single undoable creation.
        ctx.history.record(Box::new(CreateCommand::new(finished)));
        ToolResponse::Handled
    }

    fn on_escape(&mut self, ctx: &mut ToolCtx<'_>) {
        self.cancel(ctx);
    }

    fn deactivate(&mut self, ctx: &mut ToolCtx<'_>) {
        self.cancel(ctx);
    }
}
