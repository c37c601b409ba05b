// Copyright 2026 the Stroma Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Point marker tool: one press, one point annotation.

use log::warn;
use stroma_geometry::{PointShape, Shape};
use stroma_history::CreateCommand;
use stroma_store::Annotation;

use crate::{fresh_id, AnnotationSeed, PointerEvent, Tool, ToolCtx, ToolResponse};

/// Creates a point annotation at every press.
#[derive(Debug, Default)]
pub struct PointTool {
    /// Properties and style stamped onto created points.
    pub seed: AnnotationSeed,
    counter: u64,
}

impl PointTool {
    /// Creates the tool with a property seed.
    #[must_use]
    pub fn new(seed: AnnotationSeed) -> Self {
        Self { seed, counter: 0 }
    }
}

impl Tool for PointTool {
    fn id(&self) -> &'static str {
        "point"
    }

    fn on_press(&mut self, event: &PointerEvent, ctx: &mut ToolCtx<'_>) -> ToolResponse {
        let id = fresh_id(ctx.store, "point", &mut self.counter);
        let annotation = self.seed.apply(Annotation::new(
            id,
            Shape::Point(PointShape { point: event.image }),
        ));
        if let Err(e) = ctx
            .history
            .execute(ctx.store, Box::new(CreateCommand::new(annotation)))
        {
            warn!("point tool: create failed: {e}");
        }
        ToolResponse::Handled
    }
}

#[cfg(test)]
mod tests {
    use kurbo::Point;
    use stroma_history::History;
    use stroma_store::AnnotationStore;
    use stroma_view::ViewState;

    use super::*;
    use crate::{Modifiers, PointerButton};

    fn press(x: f64, y: f64) -> PointerEvent {
        PointerEvent {
            image: Point::new(x, y),
            screen: Point::new(x, y),
            button: PointerButton::Primary,
            modifiers: Modifiers::default(),
            timestamp_ms: 0,
        }
    }

    #[test]
    fn press_creates_undoable_point() {
        let mut store = AnnotationStore::new();
        let mut history = History::new();
        let view = ViewState::default();
        let mut tool = PointTool::default();
        let mut ctx = ToolCtx {
            store: &mut store,
            history: &mut history,
            view: &view,
        };

        let response = tool.on_press(&press(1234.0, 567.0), &mut ctx);
        assert_eq!(response, ToolResponse::Handled);
        assert_eq!(store.len(), 1);
        let ann = store.all().next().unwrap();
        assert_eq!(ann.bounds().x0, 1234.0);

        history.undo(&mut store).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn seeded_properties_land_on_created_points() {
        let mut store = AnnotationStore::new();
        let mut history = History::new();
        let view = ViewState::default();
        let mut tool = PointTool::new(AnnotationSeed {
            layer: Some("markers".to_owned()),
            ..AnnotationSeed::default()
        });
        let mut ctx = ToolCtx {
            store: &mut store,
            history: &mut history,
            view: &view,
        };

        tool.on_press(&press(0.0, 0.0), &mut ctx);
        let ann = store.all().next().unwrap();
        assert_eq!(ann.properties.layer.as_deref(), Some("markers"));
    }
}
