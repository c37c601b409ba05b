// Copyright 2026 the Stroma Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Assisted segmentation tool behind a mask-predictor capability.
//!
//! The tool never touches a model directly: it consumes a
//! [`MaskPredictor`] — set an embedding tensor, then predict a polygon from
//! prompt points in image pixels. Loading is asynchronous on the host side
//! and guarded by a generation token: [`SamTool::begin_load`] invalidates
//! the current embedding and hands out a token, and
//! [`SamTool::complete_load`] discards results whose token is stale (the
//! image changed mid-load). The tool stays disabled until a load completes,
//! so hover previews and clicks during loading are suppressed.
//!
//! With preview enabled, hover runs a throttled prediction at the cursor
//! and exposes the resulting polygon as a ghost; a click commits the
//! prediction as a real annotation through one create command.

use kurbo::Point;
use log::{debug, warn};
use stroma_geometry::{PolygonShape, Shape};
use stroma_history::CreateCommand;
use stroma_store::{Annotation, Polarity};

use crate::{fresh_id, AnnotationSeed, PointerEvent, Tool, ToolCtx, ToolResponse};

/// Errors surfaced by mask predictors.
#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    /// No embedding is loaded.
    #[error("no embedding loaded")]
    NotReady,
    /// The embedding tensor does not have the expected shape.
    #[error("embedding shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Shape the decoder requires.
        expected: [usize; 4],
        /// Shape that was supplied.
        got: [usize; 4],
    },
    /// The underlying decoder failed.
    #[error("mask decoder failed: {0}")]
    Inference(String),
}

/// One prompt point for the decoder, in image pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PromptPoint {
    /// Prompt position in image pixels.
    pub point: Point,
    /// Whether the point marks foreground or background.
    pub polarity: Polarity,
}

/// Narrow capability contract over an interactive segmentation decoder.
///
/// Implementations wrap an ONNX decoder, a native detector, or a test
/// stub; the tool only sees this trait.
pub trait MaskPredictor {
    /// Installs the precomputed image embedding for subsequent predictions.
    fn set_embedding(
        &mut self,
        tensor: &[f32],
        shape: [usize; 4],
        image_width: u32,
        image_height: u32,
    ) -> Result<(), PredictError>;

    /// Predicts a mask polygon from prompt points.
    fn predict(
        &mut self,
        points: &[PromptPoint],
        image_width: u32,
        image_height: u32,
    ) -> Result<Vec<Point>, PredictError>;
}

/// Token tying an in-flight embedding load to the image it was started for.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LoadToken(u64);

/// Assisted segmentation tool configuration.
#[derive(Clone, Debug)]
pub struct SamToolOptions {
    /// Where the host loads the mask decoder from. The engine never fetches
    /// it; the host's loader reads this, builds a [`MaskPredictor`], and
    /// installs it via [`SamTool::set_predictor`].
    pub decoder_model_url: Option<String>,
    /// Whether hovering produces a ghost preview.
    pub show_hover_preview: bool,
    /// Ghost preview opacity in `[0, 1]`.
    pub preview_opacity: f32,
    /// Minimum milliseconds between hover predictions.
    pub preview_throttle_ms: u64,
}

impl Default for SamToolOptions {
    fn default() -> Self {
        Self {
            decoder_model_url: None,
            show_hover_preview: true,
            preview_opacity: 0.4,
            preview_throttle_ms: 100,
        }
    }
}

/// Click-to-segment tool over a [`MaskPredictor`].
pub struct SamTool {
    /// Properties and style stamped onto committed masks.
    pub seed: AnnotationSeed,
    /// Tool configuration.
    pub options: SamToolOptions,
    predictor: Option<Box<dyn MaskPredictor>>,
    ready: bool,
    generation: u64,
    image_size: (u32, u32),
    preview: Option<Vec<Point>>,
    last_preview_ms: Option<u64>,
    counter: u64,
}

impl core::fmt::Debug for SamTool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SamTool")
            .field("ready", &self.ready)
            .field("generation", &self.generation)
            .field("preview", &self.preview.as_ref().map(Vec::len))
            .finish_non_exhaustive()
    }
}

impl SamTool {
    /// Creates the tool; it stays disabled until a predictor and embedding
    /// are supplied.
    #[must_use]
    pub fn new(seed: AnnotationSeed, options: SamToolOptions) -> Self {
        Self {
            seed,
            options,
            predictor: None,
            ready: false,
            generation: 0,
            image_size: (0, 0),
            preview: None,
            last_preview_ms: None,
            counter: 0,
        }
    }

    /// Installs the decoder capability.
    pub fn set_predictor(&mut self, predictor: Box<dyn MaskPredictor>) {
        self.predictor = Some(predictor);
    }

    /// Whether predictions are currently possible.
    #[must_use]
    pub fn ready(&self) -> bool {
        self.ready
    }

    /// Invalidates the current embedding (the image is changing) and
    /// returns the token the eventual load completion must present.
    pub fn begin_load(&mut self) -> LoadToken {
        self.generation += 1;
        self.ready = false;
        self.preview = None;
        LoadToken(self.generation)
    }

    /// Completes an embedding load.
    ///
    /// Returns `Ok(false)` when `token` is stale — the image changed after
    /// the load started and the result is discarded without touching state.
    pub fn complete_load(
        &mut self,
        token: LoadToken,
        tensor: &[f32],
        shape: [usize; 4],
        image_width: u32,
        image_height: u32,
    ) -> Result<bool, PredictError> {
        if token.0 != self.generation {
            warn!("discarding stale embedding load (token {token:?})");
            return Ok(false);
        }
        let predictor = self.predictor.as_mut().ok_or(PredictError::NotReady)?;
        predictor.set_embedding(tensor, shape, image_width, image_height)?;
        self.image_size = (image_width, image_height);
        self.ready = true;
        debug!("embedding loaded for {image_width}x{image_height}");
        Ok(true)
    }

    /// The current ghost preview polygon and its opacity.
    #[must_use]
    pub fn preview(&self) -> Option<(&[Point], f32)> {
        self.preview
            .as_deref()
            .map(|p| (p, self.options.preview_opacity))
    }

    fn predict_at(&mut self, cursor: Point) -> Option<Vec<Point>> {
        if !self.ready {
            return None;
        }
        let (w, h) = self.image_size;
        let predictor = self.predictor.as_mut()?;
        let prompt = [PromptPoint {
            point: cursor,
            polarity: Polarity::Positive,
        }];
        match predictor.predict(&prompt, w, h) {
            Ok(points) if points.len() >= 3 => Some(points),
            Ok(_) => None,
            Err(e) => {
                warn!("mask prediction failed: {e}");
                None
            }
        }
    }
}

impl Tool for SamTool {
    fn id(&self) -> &'static str {
        "sam"
    }

    fn enabled(&self) -> bool {
        self.ready
    }

    fn on_hover(&mut self, event: &PointerEvent, _ctx: &mut ToolCtx<'_>) -> ToolResponse {
        if !self.options.show_hover_preview || !self.ready {
            return ToolResponse::Pass;
        }
        let due = self
            .last_preview_ms
            .is_none_or(|last| event.timestamp_ms.saturating_sub(last) >= self.options.preview_throttle_ms);
        if due {
            self.last_preview_ms = Some(event.timestamp_ms);
            self.preview = self.predict_at(event.image);
        }
        ToolResponse::Pass
    }

    fn on_click(&mut self, event: &PointerEvent, ctx: &mut ToolCtx<'_>) -> ToolResponse {
        // Prefer the hovered prediction; fall back to predicting at the
        // click point when previews are off.
        let points = match self.preview.take() {
            Some(points) => Some(points),
            None => self.predict_at(event.image),
        };
        let Some(points) = points else {
            return ToolResponse::Pass;
        };
        let id = fresh_id(ctx.store, "mask", &mut self.counter);
        let mut annotation = self
            .seed
            .apply(Annotation::new(id, Shape::Polygon(PolygonShape::new(points))));
        if annotation.properties.classification.is_none() {
            annotation.properties.classification = Some(Polarity::Positive);
        }
        if let Err(e) = ctx
            .history
            .execute(ctx.store, Box::new(CreateCommand::new(annotation)))
        {
            warn!("sam tool: create failed: {e}");
        }
        ToolResponse::Handled
    }

    fn ghost_preview(&self) -> Option<(&[Point], f32)> {
        self.preview()
    }

    fn on_escape(&mut self, _ctx: &mut ToolCtx<'_>) {
        self.preview = None;
    }

    fn deactivate(&mut self, _ctx: &mut ToolCtx<'_>) {
        self.preview = None;
        self.last_preview_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use stroma_history::History;
    use stroma_store::AnnotationStore;
    use stroma_view::ViewState;

    use super::*;
    use crate::{Modifiers, PointerButton};

    /// Stub predictor: a fixed-size diamond around the prompt point.
    struct Diamond {
        embedded: bool,
        predictions: u32,
    }

    impl MaskPredictor for Diamond {
        fn set_embedding(
            &mut self,
            _tensor: &[f32],
            shape: [usize; 4],
            _w: u32,
            _h: u32,
        ) -> Result<(), PredictError> {
            if shape != [1, 256, 64, 64] {
                return Err(PredictError::ShapeMismatch {
                    expected: [1, 256, 64, 64],
                    got: shape,
                });
            }
            self.embedded = true;
            Ok(())
        }

        fn predict(
            &mut self,
            points: &[PromptPoint],
            _w: u32,
            _h: u32,
        ) -> Result<Vec<Point>, PredictError> {
            if !self.embedded {
                return Err(PredictError::NotReady);
            }
            self.predictions += 1;
            let c = points[0].point;
            Ok(vec![
                Point::new(c.x, c.y - 10.0),
                Point::new(c.x + 10.0, c.y),
                Point::new(c.x, c.y + 10.0),
                Point::new(c.x - 10.0, c.y),
            ])
        }
    }

    fn event(x: f64, y: f64, t: u64) -> PointerEvent {
        PointerEvent {
            image: Point::new(x, y),
            screen: Point::new(x, y),
            button: PointerButton::Primary,
            modifiers: Modifiers::default(),
            timestamp_ms: t,
        }
    }

    fn loaded_tool() -> SamTool {
        let mut tool = SamTool::new(AnnotationSeed::default(), SamToolOptions::default());
        tool.set_predictor(Box::new(Diamond {
            embedded: false,
            predictions: 0,
        }));
        let token = tool.begin_load();
        tool.complete_load(token, &[0.0; 4], [1, 256, 64, 64], 4096, 4096)
            .unwrap();
        tool
    }

    #[test]
    fn disabled_until_embedding_loads() {
        let mut tool = SamTool::new(AnnotationSeed::default(), SamToolOptions::default());
        assert!(!tool.enabled());
        tool.set_predictor(Box::new(Diamond {
            embedded: false,
            predictions: 0,
        }));
        assert!(!tool.enabled());
        let token = tool.begin_load();
        tool.complete_load(token, &[0.0; 4], [1, 256, 64, 64], 1024, 768)
            .unwrap();
        assert!(tool.enabled());
    }

    #[test]
    fn bad_tensor_shape_is_rejected() {
        let mut tool = SamTool::new(AnnotationSeed::default(), SamToolOptions::default());
        tool.set_predictor(Box::new(Diamond {
            embedded: false,
            predictions: 0,
        }));
        let token = tool.begin_load();
        let err = tool
            .complete_load(token, &[0.0; 4], [1, 256, 32, 32], 1024, 768)
            .unwrap_err();
        assert!(matches!(err, PredictError::ShapeMismatch { .. }));
        assert!(!tool.enabled());
    }

    #[test]
    fn stale_load_is_discarded() {
        let mut tool = SamTool::new(AnnotationSeed::default(), SamToolOptions::default());
        tool.set_predictor(Box::new(Diamond {
            embedded: false,
            predictions: 0,
        }));
        let stale = tool.begin_load();
        // The image changes before the first load completes.
        let fresh = tool.begin_load();

        let applied = tool
            .complete_load(stale, &[0.0; 4], [1, 256, 64, 64], 1024, 768)
            .unwrap();
        assert!(!applied);
        assert!(!tool.enabled());

        let applied = tool
            .complete_load(fresh, &[0.0; 4], [1, 256, 64, 64], 2048, 2048)
            .unwrap();
        assert!(applied);
        assert!(tool.enabled());
    }

    #[test]
    fn hover_preview_is_throttled() {
        let mut store = AnnotationStore::new();
        let mut history = History::new();
        let view = ViewState::default();
        let mut tool = loaded_tool();
        let mut ctx = ToolCtx {
            store: &mut store,
            history: &mut history,
            view: &view,
        };

        tool.on_hover(&event(100.0, 100.0, 0), &mut ctx);
        assert!(tool.preview().is_some());
        // Within the throttle window the preview does not recompute.
        tool.on_hover(&event(200.0, 200.0, 50), &mut ctx);
        let (points, _) = tool.preview().unwrap();
        assert_eq!(points[0], Point::new(100.0, 90.0));

        // Past the window it follows the cursor.
        tool.on_hover(&event(200.0, 200.0, 200), &mut ctx);
        let (points, _) = tool.preview().unwrap();
        assert_eq!(points[0], Point::new(200.0, 190.0));
    }

    #[test]
    fn click_commits_prediction_as_undoable_mask() {
        let mut store = AnnotationStore::new();
        let mut history = History::new();
        let view = ViewState::default();
        let mut tool = loaded_tool();
        let mut ctx = ToolCtx {
            store: &mut store,
            history: &mut history,
            view: &view,
        };

        tool.on_hover(&event(500.0, 500.0, 0), &mut ctx);
        let response = tool.on_click(&event(500.0, 500.0, 10), &mut ctx);
        assert_eq!(response, ToolResponse::Handled);

        assert_eq!(store.len(), 1);
        let ann = store.all().next().unwrap();
        assert_eq!(ann.properties.classification, Some(Polarity::Positive));
        match ann.shape() {
            Shape::Polygon(p) => assert_eq!(p.points.len(), 4),
            other => panic!("expected polygon, got {other:?}"),
        }

        history.undo(&mut store).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn preview_suppressed_while_loading() {
        let mut store = AnnotationStore::new();
        let mut history = History::new();
        let view = ViewState::default();
        let mut tool = loaded_tool();
        let mut ctx = ToolCtx {
            store: &mut store,
            history: &mut history,
            view: &view,
        };

        tool.on_hover(&event(100.0, 100.0, 0), &mut ctx);
        assert!(tool.preview().is_some());

        // Image change: preview clears and hover is inert until reload.
        let _token = tool.begin_load();
        assert!(tool.preview().is_none());
        tool.on_hover(&event(100.0, 100.0, 500), &mut ctx);
        assert!(tool.preview().is_none());
    }
}
