// Copyright 2026 the Stroma Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Freehand/curve tool: sampled strokes simplified on release.
//!
//! Pressing starts recording the pointer on every move; the raw draft
//! renders live. Releasing runs Ramer–Douglas–Peucker simplification with
//! the configured tolerance and commits either a closed polygon or an open
//! freehand path, as one undoable creation.

use kurbo::Point;
use log::warn;
use stroma_geometry::simplify::simplify;
use stroma_geometry::{FreehandShape, PolygonShape, Shape};
use stroma_history::CreateCommand;
use stroma_store::{Annotation, AnnotationId};

use crate::{fresh_id, AnnotationSeed, PointerEvent, Tool, ToolCtx, ToolResponse};

/// Freehand tool configuration.
#[derive(Clone, Copy, Debug)]
pub struct FreehandToolOptions {
    /// RDP epsilon in image pixels; higher keeps fewer points.
    pub smoothing_tolerance: f64,
    /// Whether releases commit closed polygons (`true`) or open paths.
    pub closed: bool,
}

impl Default for FreehandToolOptions {
    fn default() -> Self {
        Self {
            smoothing_tolerance: 2.0,
            closed: true,
        }
    }
}

#[derive(Debug)]
struct Draft {
    id: AnnotationId,
    points: Vec<Point>,
}

/// Press-drag-release freehand drawing.
#[derive(Debug, Default)]
pub struct FreehandTool {
    /// Properties and style stamped onto created shapes.
    pub seed: AnnotationSeed,
    /// Tool configuration.
    pub options: FreehandToolOptions,
    draft: Option<Draft>,
    counter: u64,
}

impl FreehandTool {
    /// Creates the tool with a property seed and options.
    #[must_use]
    pub fn new(seed: AnnotationSeed, options: FreehandToolOptions) -> Self {
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
            warn!("freehand tool: cancel failed: {e}");
        }
    }
}

impl Tool for FreehandTool {
    fn id(&self) -> &'static str {
        "freehand"
    }

    fn on_press(&mut self, event: &PointerEvent, ctx: &mut ToolCtx<'_>) -> ToolResponse {
        self.cancel(ctx);
        let id = fresh_id(ctx.store, "curve", &mut self.counter);
        let mut annotation = self.seed.apply(Annotation::new(
            id.clone(),
            Shape::Freehand(FreehandShape::new(vec![event.image], false)),
        ));
        annotation.properties.drawing = true;
        if let Err(e) = ctx.store.add(annotation) {
            warn!("freehand tool: draft add failed: {e}");
            return ToolResponse::Pass;
        }
        self.draft = Some(Draft {
            id,
            points: vec![event.image],
        });
        ToolResponse::Handled
    }

    fn on_drag(&mut self, event: &PointerEvent, ctx: &mut ToolCtx<'_>) -> ToolResponse {
        let Some(draft) = &mut self.draft else {
            return ToolResponse::Pass;
        };
        draft.points.push(event.image);
        if let Some(current) = ctx.store.get(&draft.id) {
            let next = current
                .with_shape(Shape::Freehand(FreehandShape::new(draft.points.clone(), false)));
            if let Err(e) = ctx.store.update(&draft.id, next) {
                warn!("freehand tool: draft update failed: {e}");
            }
        }
        ToolResponse::Handled
    }

    fn on_release(&mut self, _event: &PointerEvent, ctx: &mut ToolCtx<'_>) -> ToolResponse {
        let Some(draft) = self.draft.take() else {
            return ToolResponse::Pass;
        };
        let simplified = simplify(&draft.points, self.options.smoothing_tolerance);
        let shape = if self.options.closed {
            (simplified.len() >= 3).then(|| Shape::Polygon(PolygonShape::new(simplified)))
        } else {
            (simplified.len() >= 2)
                .then(|| Shape::Freehand(FreehandShape::new(simplified, false)))
        };
        let Some(shape) = shape else {
            // Degenerate stroke: nothing to keep.
            if let Err(e) = ctx.store.delete(&draft.id) {
                warn!("freehand tool: abort failed: {e}");
            }
            return ToolResponse::Handled;
        };
        let Some(current) = ctx.store.get(&draft.id).cloned() else {
            return ToolResponse::Pass;
        };
        let mut finished = current.with_shape(shape);
        finished.properties.drawing = false;
        if let Err(e) = ctx.store.update(&draft.id, finished.clone()) {
            warn!("freehand tool: finalize failed: {e}");
        }
        // Exactly one undo step per stroke.
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

#[cfg(test)]
mod tests {
    use stroma_history::History;
    use stroma_store::AnnotationStore;
    use stroma_view::ViewState;

    use super::*;
    use crate::{Modifiers, PointerButton};

    fn event(x: f64, y: f64) -> PointerEvent {
        PointerEvent {
            image: Point::new(x, y),
            screen: Point::new(x, y),
            button: PointerButton::Primary,
            modifiers: Modifiers::default(),
            timestamp_ms: 0,
        }
    }

    fn ctx_parts() -> (AnnotationStore, History, ViewState) {
        (AnnotationStore::new(), History::new(), ViewState::default())
    }

    #[test]
    fn stroke_simplifies_into_closed_polygon() {
        let (mut store, mut history, view) = ctx_parts();
        let mut tool = FreehandTool::default();
        let mut ctx = ToolCtx {
            store: &mut store,
            history: &mut history,
            view: &view,
        };

        tool.on_press(&event(0.0, 0.0), &mut ctx);
        // A dense, noisy square outline.
        for i in 1..=40 {
            tool.on_drag(&event(f64::from(i) * 2.5, (f64::from(i) * 0.7).sin() * 0.5), &mut ctx);
        }
        for i in 1..=40 {
            tool.on_drag(&event(100.0, f64::from(i) * 2.5), &mut ctx);
        }
        let raw_len = 81;
        tool.on_release(&event(100.0, 100.0), &mut ctx);

        assert_eq!(store.len(), 1);
        let ann = store.all().next().unwrap();
        match ann.shape() {
            Shape::Polygon(p) => {
                assert!(p.points.len() >= 3);
                assert!(p.points.len() < raw_len, "simplification must drop points");
            }
            other => panic!("expected polygon, got {other:?}"),
        }
        assert_eq!(history.status().undo_size, 1);
    }

    #[test]
    fn open_configuration_commits_freehand_path() {
        let (mut store, mut history, view) = ctx_parts();
        let mut tool = FreehandTool::new(
            AnnotationSeed::default(),
            FreehandToolOptions {
                closed: false,
                ..FreehandToolOptions::default()
            },
        );
        let mut ctx = ToolCtx {
            store: &mut store,
            history: &mut history,
            view: &view,
        };

        tool.on_press(&event(0.0, 0.0), &mut ctx);
        for i in 1..=20 {
            tool.on_drag(&event(f64::from(i) * 5.0, f64::from(i % 3)), &mut ctx);
        }
        tool.on_release(&event(100.0, 0.0), &mut ctx);

        let ann = store.all().next().unwrap();
        match ann.shape() {
            Shape::Freehand(f) => assert!(!f.closed),
            other => panic!("expected freehand, got {other:?}"),
        }
    }

    #[test]
    fn higher_tolerance_keeps_fewer_points() {
        let stroke: Vec<(f64, f64)> = (0..100)
            .map(|i| {
                let t = f64::from(i) * 0.1;
                (t * 12.0, (t * 2.0).sin() * 8.0)
            })
            .collect();

        let count_with = |tolerance: f64| {
            let (mut store, mut history, view) = ctx_parts();
            let mut tool = FreehandTool::new(
                AnnotationSeed::default(),
                FreehandToolOptions {
                    smoothing_tolerance: tolerance,
                    closed: false,
                },
            );
            let mut ctx = ToolCtx {
                store: &mut store,
                history: &mut history,
                view: &view,
            };
            tool.on_press(&event(stroke[0].0, stroke[0].1), &mut ctx);
            for &(x, y) in &stroke[1..] {
                tool.on_drag(&event(x, y), &mut ctx);
            }
            tool.on_release(&event(120.0, 0.0), &mut ctx);
            match store.all().next().unwrap().shape() {
                Shape::Freehand(f) => f.points.len(),
                _ => unreachable!("open configuration commits freehand"),
            }
        };

        assert!(count_with(5.0) < count_with(0.5));
    }

    #[test]
    fn degenerate_stroke_aborts() {
        let (mut store, mut history, view) = ctx_parts();
        let mut tool = FreehandTool::default();
        let mut ctx = ToolCtx {
            store: &mut store,
            history: &mut history,
            view: &view,
        };

        tool.on_press(&event(5.0, 5.0), &mut ctx);
        tool.on_release(&event(5.0, 5.0), &mut ctx);
        assert!(store.is_empty());
        assert!(!history.can_undo());
    }
}
