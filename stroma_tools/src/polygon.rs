// Copyright 2026 the Stroma Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Polygon tool: click vertices, close by proximity or double-click.
//!
//! The draft is a real annotation flagged `drawing` and shaped as an open
//! freehand path while vertices accumulate, so the partial outline renders
//! live; hovering extends it with a rubber-band edge to the cursor. Closing
//! converts the draft to a polygon and records one create step.

use kurbo::Point;
use log::warn;
use stroma_geometry::{FreehandShape, PolygonShape, Shape};
use stroma_history::CreateCommand;
use stroma_store::{Annotation, AnnotationId};

use crate::{fresh_id, AnnotationSeed, PointerEvent, Tool, ToolCtx, ToolResponse, CLICK_SLOP_PX};

#[derive(Debug)]
struct Draft {
    id: AnnotationId,
    /// Committed vertices (excludes the rubber-band cursor vertex).
    points: Vec<Point>,
}

/// Click-to-place polygon drawing.
#[derive(Debug, Default)]
pub struct PolygonTool {
    /// Properties and style stamped onto created polygons.
    pub seed: AnnotationSeed,
    draft: Option<Draft>,
    counter: u64,
}

impl PolygonTool {
    /// Creates the tool with a property seed.
    #[must_use]
    pub fn new(seed: AnnotationSeed) -> Self {
        Self {
            seed,
            draft: None,
            counter: 0,
        }
    }

    /// Whether a draft polygon is in progress.
    #[must_use]
    pub fn is_drawing(&self) -> bool {
        self.draft.is_some()
    }

    fn sync_draft(&self, ctx: &mut ToolCtx<'_>, cursor: Option<Point>) {
        let Some(draft) = &self.draft else { return };
        let Some(current) = ctx.store.get(&draft.id) else {
            return;
        };
        let mut points = draft.points.clone();
        if let Some(cursor) = cursor {
            points.push(cursor);
        }
        let next = current.with_shape(Shape::Freehand(FreehandShape::new(points, false)));
        if let Err(e) = ctx.store.update(&draft.id, next) {
            warn!("polygon tool: draft update failed: {e}");
        }
    }

    fn commit(&mut self, ctx: &mut ToolCtx<'_>) {
        let Some(draft) = self.draft.take() else { return };
        if draft.points.len() < 3 {
            self.delete_draft(ctx, &draft.id);
            return;
        }
        let Some(current) = ctx.store.get(&draft.id).cloned() else {
            return;
        };
        let mut finished =
            current.with_shape(Shape::Polygon(PolygonShape::new(draft.points)));
        finished.properties.drawing = false;
        if let Err(e) = ctx.store.update(&draft.id, finished.clone()) {
            warn!("polygon tool: finalize failed: {e}");
            return;
        }
        // The whole multi-click gesture is one undoable creation.
        ctx.history.record(Box::new(CreateCommand::new(finished)));
    }

    fn cancel(&mut self, ctx: &mut ToolCtx<'_>) {
        if let Some(draft) = self.draft.take() {
            self.delete_draft(ctx, &draft.id);
        }
    }

    fn delete_draft(&self, ctx: &mut ToolCtx<'_>, id: &AnnotationId) {
        if let Err(e) = ctx.store.delete(id) {
            warn!("polygon tool: cancel failed: {e}");
        }
    }
}

impl Tool for PolygonTool {
    fn id(&self) -> &'static str {
        "polygon"
    }

    fn on_press(&mut self, _event: &PointerEvent, _ctx: &mut ToolCtx<'_>) -> ToolResponse {
        // Consume presses while drawing so the viewer does not pan between
        // vertex clicks.
        if self.draft.is_some() {
            ToolResponse::Handled
        } else {
            ToolResponse::Pass
        }
    }

    fn on_click(&mut self, event: &PointerEvent, ctx: &mut ToolCtx<'_>) -> ToolResponse {
        let Some(draft) = &self.draft else {
            let id = fresh_id(ctx.store, "poly", &mut self.counter);
            let mut annotation = self.seed.apply(Annotation::new(
                id.clone(),
                Shape::Freehand(FreehandShape::new(vec![event.image], false)),
            ));
            annotation.properties.drawing = true;
            if let Err(e) = ctx.store.add(annotation) {
                warn!("polygon tool: draft add failed: {e}");
                return ToolResponse::Pass;
            }
            self.draft = Some(Draft {
                id,
                points: vec![event.image],
            });
            return ToolResponse::Handled;
        };

        // Clicking within ~5 screen px of the first vertex closes.
        let close_tol = ctx.view.screen_tolerance_to_image(CLICK_SLOP_PX);
        let closes =
            draft.points.len() >= 3 && draft.points[0].distance(event.image) <= close_tol;
        if closes {
            self.commit(ctx);
        } else {
            if let Some(draft) = &mut self.draft {
                draft.points.push(event.image);
            }
            self.sync_draft(ctx, None);
        }
        ToolResponse::Handled
    }

    fn on_double_click(&mut self, _event: &PointerEvent, ctx: &mut ToolCtx<'_>) -> ToolResponse {
        if self.draft.is_some() {
            self.commit(ctx);
            ToolResponse::Handled
        } else {
            ToolResponse::Pass
        }
    }

    fn on_hover(&mut self, event: &PointerEvent, ctx: &mut ToolCtx<'_>) -> ToolResponse {
        if self.draft.is_some() {
            // Rubber-band edge from the last vertex to the cursor.
            self.sync_draft(ctx, Some(event.image));
        }
        ToolResponse::Pass
    }

    fn on_escape(&mut self, ctx: &mut ToolCtx<'_>) {
        self.cancel(ctx);
    }

    fn deactivate(&mut self, ctx: &mut ToolCtx<'_>) {
        self.cancel(ctx);
    }
}
