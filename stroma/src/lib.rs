// Copyright 2026 the Stroma Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stroma: an interactive annotation engine for gigapixel imagery.
//!
//! Stroma overlays vector annotations — points, rectangles, polygons,
//! freehand paths, multipolygons — on a deep-zoom image viewer, keeping
//! them pixel-accurate while the user pans, zooms, rotates, and flips, and
//! responsive with tens of thousands of shapes on images billions of
//! pixels wide.
//!
//! [`Annotator`] is the facade wiring the subsystems to a host [`Viewer`]:
//!
//! - the spatially indexed, observable annotation catalog
//!   (`stroma_store`),
//! - the retained Vello overlay stage with layer composition and culled
//!   redraw (`stroma_stage`),
//! - the pointer tool state machines (`stroma_tools`),
//! - the reversible command history (`stroma_history`),
//! - the drag-handle editing overlay (`stroma_editor`).
//!
//! The host forwards viewer events into the annotator: pointer input to
//! the `pointer_*` methods, keyboard to [`Annotator::key_pressed`],
//! viewport changes to [`Annotator::viewport_changed`], and each animation
//! frame asks [`Annotator::needs_render`] / [`Annotator::render`] for a
//! freshly encoded [`vello::Scene`]. All writes flow through the facade;
//! the stage and editor only ever see catalog state through change events.
//!
//! ```no_run
//! # use stroma::{Annotator, AnnotatorOptions, Viewer};
//! # fn demo(viewer: impl Viewer) -> Result<(), stroma::AnnotatorError> {
//! let mut annotator = Annotator::attach(viewer, AnnotatorOptions::default())?;
//! annotator.set_active_tool("rectangle");
//! // ... forward pointer/keyboard/viewport events from the host loop ...
//! # Ok(())
//! # }
//! ```

mod events;
mod options;
mod viewer;

use std::cell::RefCell;
use std::rc::Rc;

use kurbo::Point;
use log::info;
use stroma_editor::{EditMode, EditorOverlay, HandleId};
use stroma_history::{CreateCommand, DeleteCommand, History, UpdateCommand};
use stroma_layers::LayerManager;
use stroma_stage::Stage;
use stroma_store::{AnnotationStore, ChangeSet};
use stroma_tools::freehand::FreehandTool;
use stroma_tools::point::PointTool;
use stroma_tools::polygon::PolygonTool;
use stroma_tools::push::PushTool;
use stroma_tools::rectangle::RectangleTool;
use stroma_tools::{
    PointerEvent, Tool, ToolController, ToolCtx, ToolResponse, CLICK_SLOP_PX, DOUBLE_CLICK_MS,
};
use vello::Scene;

pub use events::{AnnotatorEvent, EventEmitter, EventKind, ListenerId};
pub use options::AnnotatorOptions;
pub use viewer::{view_state_of, Viewer};

// The working vocabulary, re-exported so hosts depend on this crate alone.
pub use stroma_geometry::{Shape, ShapeKind};
pub use stroma_history::{HistoryOptions, HistoryStatus};
pub use stroma_layers::{mask_polarity_filter, Layer, LayerError, LayerFilter, LayerId};
pub use stroma_stage::{BrushCursor, DisplayFilter, GhostPreview, StageStyle, StyleExpr};
pub use stroma_store::{Annotation, AnnotationId, Polarity, Properties, StoreError, Style};
pub use stroma_tools::sam::{MaskPredictor, PredictError, PromptPoint, SamTool};
pub use stroma_tools::{AnnotationSeed, Modifiers, PointerButton};
pub use stroma_view::ViewState;

/// Handle pick radius in screen pixels.
const HANDLE_PICK_PX: f64 = 6.0;

/// Hit-test tolerance in screen pixels for selection and hover.
const HIT_TOLERANCE_PX: f64 = 5.0;

/// Errors surfaced by the annotator facade.
#[derive(Debug, thiserror::Error)]
pub enum AnnotatorError {
    /// The viewer has not opened an image yet; wait for its open event.
    #[error("viewer is not ready; await its open event before attaching")]
    ViewerNotReady,
    /// A catalog operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A layer operation failed.
    #[error(transparent)]
    Layer(#[from] LayerError),
}

/// Keys the annotator reacts to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Key {
    /// Delete key.
    Delete,
    /// Backspace key.
    Backspace,
    /// Escape key.
    Escape,
    /// The `Z` key (undo/redo chords).
    KeyZ,
    /// The `A` key (select-all chord).
    KeyA,
}

#[derive(Copy, Clone, Debug)]
struct ClickProbe {
    screen: Point,
    moved: bool,
}

/// The annotation engine facade, wired to one viewer.
pub struct Annotator<V: Viewer> {
    viewer: V,
    store: AnnotationStore,
    layers: LayerManager,
    history: History,
    stage: Stage,
    tools: ToolController,
    editor: EditorOverlay,
    emitter: EventEmitter,
    selection: Vec<AnnotationId>,
    /// Store change events buffered by the observer, drained by `sync`.
    changes: Rc<RefCell<Vec<ChangeSet>>>,
    click: Option<ClickProbe>,
    last_click: Option<(Point, u64)>,
    press_handled: bool,
    editor_dragging: bool,
    nav_suspended: bool,
}

impl<V: Viewer> core::fmt::Debug for Annotator<V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Annotator")
            .field("annotations", &self.store.len())
            .field("selection", &self.selection.len())
            .field("active_tool", &self.tools.active_tool_id())
            .finish_non_exhaustive()
    }
}

impl<V: Viewer> Annotator<V> {
    /// Attaches the engine to an opened viewer.
    ///
    /// Fails with [`AnnotatorError::ViewerNotReady`] while the viewer has
    /// no canvas; callers wait for the viewer's open event first.
    pub fn attach(viewer: V, options: AnnotatorOptions) -> Result<Self, AnnotatorError> {
        if !viewer.is_open() {
            return Err(AnnotatorError::ViewerNotReady);
        }

        let mut store = AnnotationStore::new();
        let changes: Rc<RefCell<Vec<ChangeSet>>> = Rc::default();
        let buffer = changes.clone();
        store.observe(move |set| buffer.borrow_mut().push(set.clone()));

        let mut stage = Stage::new();
        stage.set_base_style(options.base_style);
        stage.set_view(view_state_of(&viewer));

        let layers = LayerManager::new();
        stage.sync_layers(&layers);

        let seed = options.annotation_seed;
        let mut tools = ToolController::new();
        tools.register(Box::new(PointTool::new(seed.clone())));
        tools.register(Box::new(RectangleTool::new(seed.clone(), options.rectangle)));
        tools.register(Box::new(PolygonTool::new(seed.clone())));
        tools.register(Box::new(FreehandTool::new(seed.clone(), options.freehand)));
        tools.register(Box::new(PushTool::new(options.push)));
        tools.register(Box::new(SamTool::new(seed, options.sam)));

        info!("annotator attached ({}x{} image)", viewer.image_size().0, viewer.image_size().1);
        Ok(Self {
            viewer,
            store,
            layers,
            history: History::with_options(options.history),
            stage,
            tools,
            editor: EditorOverlay::new(),
            emitter: EventEmitter::default(),
            selection: Vec::new(),
            changes,
            click: None,
            last_click: None,
            press_handled: false,
            editor_dragging: false,
            nav_suspended: false,
        })
    }

    // ── Catalog API ──────────────────────────────────────────────────

    /// Adds an annotation as one undoable step.
    pub fn add(&mut self, annotation: Annotation) -> Result<(), AnnotatorError> {
        self.history
            .execute(&mut self.store, Box::new(CreateCommand::new(annotation)))?;
        self.sync();
        Ok(())
    }

    /// Adds many annotations as one undoable step and one change event.
    pub fn bulk_add(&mut self, annotations: Vec<Annotation>) -> Result<(), AnnotatorError> {
        self.history.begin_batch("import annotations");
        self.store.begin_batch();
        let mut result = Ok(());
        for annotation in annotations {
            result = self
                .history
                .execute(&mut self.store, Box::new(CreateCommand::new(annotation)))
                .map_err(AnnotatorError::from);
            if result.is_err() {
                break;
            }
        }
        self.store.end_batch();
        self.history.end_batch();
        self.sync();
        result
    }

    /// Replaces an annotation as one undoable step.
    pub fn update(&mut self, annotation: Annotation) -> Result<(), AnnotatorError> {
        let old = self
            .store
            .get(annotation.id())
            .cloned()
            .ok_or_else(|| StoreError::UnknownId(annotation.id().clone()))?;
        self.history.seal();
        self.history
            .execute(&mut self.store, Box::new(UpdateCommand::new(old, annotation)))?;
        self.history.seal();
        self.sync();
        Ok(())
    }

    /// Deletes an annotation as one undoable step.
    pub fn delete(&mut self, id: &AnnotationId) -> Result<(), AnnotatorError> {
        let old = self
            .store
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::UnknownId(id.clone()))?;
        self.history
            .execute(&mut self.store, Box::new(DeleteCommand::new(old)))?;
        self.sync();
        Ok(())
    }

    /// Deletes every annotation as one undoable step.
    pub fn clear(&mut self) {
        let all: Vec<Annotation> = self.store.all().cloned().collect();
        if all.is_empty() {
            return;
        }
        self.history.begin_batch("clear annotations");
        self.store.begin_batch();
        for annotation in all {
            let _ = self
                .history
                .execute(&mut self.store, Box::new(DeleteCommand::new(annotation)));
        }
        self.store.end_batch();
        self.history.end_batch();
        self.sync();
    }

    /// Looks up an annotation by id.
    #[must_use]
    pub fn get(&self, id: &AnnotationId) -> Option<&Annotation> {
        self.store.get(id)
    }

    /// Iterates over all annotations in unspecified order.
    pub fn annotations(&self) -> impl Iterator<Item = &Annotation> {
        self.store.all()
    }

    // ── Selection ────────────────────────────────────────────────────

    /// The selected ids, in selection order.
    #[must_use]
    pub fn selected(&self) -> &[AnnotationId] {
        &self.selection
    }

    /// Replaces the selection (unknown ids are dropped).
    pub fn set_selected(&mut self, ids: Vec<AnnotationId>) {
        let ids: Vec<AnnotationId> = ids.into_iter().filter(|id| self.store.contains(id)).collect();
        self.apply_selection(ids);
    }

    /// Selects every annotation.
    pub fn select_all(&mut self) {
        let mut ids: Vec<AnnotationId> = self.store.all().map(|a| a.id().clone()).collect();
        ids.sort();
        self.apply_selection(ids);
    }

    /// Clears the selection.
    pub fn clear_selection(&mut self) {
        self.apply_selection(Vec::new());
    }

    // ── Layers ───────────────────────────────────────────────────────

    /// Creates a layer.
    pub fn create_layer(&mut self, layer: Layer) -> Result<(), AnnotatorError> {
        self.layers.create(layer)?;
        self.stage.sync_layers(&self.layers);
        Ok(())
    }

    /// Looks up a layer.
    #[must_use]
    pub fn get_layer(&self, id: &LayerId) -> Option<&Layer> {
        self.layers.get(id)
    }

    /// Iterates over all layers.
    pub fn all_layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.all()
    }

    /// Applies an arbitrary layer update.
    pub fn update_layer(
        &mut self,
        id: &LayerId,
        f: impl FnOnce(&mut Layer),
    ) -> Result<(), AnnotatorError> {
        self.layers.update(id, f)?;
        self.stage.sync_layers(&self.layers);
        Ok(())
    }

    /// Deletes a layer.
    pub fn delete_layer(&mut self, id: &LayerId) -> Result<(), AnnotatorError> {
        self.layers.delete(id)?;
        self.stage.sync_layers(&self.layers);
        Ok(())
    }

    /// Sets layer visibility.
    pub fn set_layer_visible(&mut self, id: &LayerId, visible: bool) -> Result<(), AnnotatorError> {
        self.update_layer(id, |l| l.visible = visible)
    }

    /// Sets the layer lock flag.
    pub fn set_layer_locked(&mut self, id: &LayerId, locked: bool) -> Result<(), AnnotatorError> {
        self.update_layer(id, |l| l.locked = locked)
    }

    /// Sets layer opacity.
    pub fn set_layer_opacity(&mut self, id: &LayerId, opacity: f32) -> Result<(), AnnotatorError> {
        self.update_layer(id, |l| l.opacity = opacity)
    }

    /// Sets the layer z-index.
    pub fn set_layer_z_index(&mut self, id: &LayerId, z_index: i32) -> Result<(), AnnotatorError> {
        self.update_layer(id, |l| l.z_index = z_index)
    }

    /// Replaces a layer's membership filter.
    pub fn set_layer_filter(
        &mut self,
        id: &LayerId,
        filter: Option<LayerFilter>,
    ) -> Result<(), AnnotatorError> {
        self.update_layer(id, |l| l.filter = filter)
    }

    // ── Appearance ───────────────────────────────────────────────────

    /// Installs a dynamic style expression (`None` reverts to base style).
    pub fn set_style(&mut self, expr: Option<StyleExpr>) {
        self.stage.set_style(expr);
    }

    /// Installs a display filter; failing annotations are not drawn.
    pub fn set_filter(&mut self, filter: Option<DisplayFilter>) {
        self.stage.set_filter(filter);
    }

    /// Shows or hides the whole overlay.
    pub fn set_visible(&mut self, visible: bool) {
        self.stage.set_visible(visible);
    }

    // ── History ──────────────────────────────────────────────────────

    /// Undoes the most recent step.
    pub fn undo(&mut self) -> Result<bool, AnnotatorError> {
        let undone = self.history.undo(&mut self.store)?;
        self.sync();
        Ok(undone)
    }

    /// Redoes the most recently undone step.
    pub fn redo(&mut self) -> Result<bool, AnnotatorError> {
        let redone = self.history.redo(&mut self.store)?;
        self.sync();
        Ok(redone)
    }

    /// Whether an undo step is available.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Whether a redo step is available.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Drops both history stacks.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    // ── Events ───────────────────────────────────────────────────────

    /// Subscribes to annotator events of `kind`.
    pub fn on(&mut self, kind: EventKind, f: impl FnMut(&AnnotatorEvent) + 'static) -> ListenerId {
        self.emitter.on(kind, f)
    }

    /// Unsubscribes a listener.
    pub fn off(&mut self, id: ListenerId) -> bool {
        self.emitter.off(id)
    }

    /// Delivers an event to subscribed listeners (UI-layer fan-out).
    pub fn emit(&mut self, event: &AnnotatorEvent) {
        self.emitter.emit(event);
    }

    // ── Tools ────────────────────────────────────────────────────────

    /// Activates the tool with `id` (deactivating any predecessor).
    pub fn set_active_tool(&mut self, id: &str) -> bool {
        let mut ctx = ToolCtx {
            store: &mut self.store,
            history: &mut self.history,
            view: self.stage.view(),
        };
        let ok = self.tools.activate(id, &mut ctx);
        self.after_tool_event();
        ok
    }

    /// Deactivates the active tool.
    pub fn deactivate_tool(&mut self) {
        let mut ctx = ToolCtx {
            store: &mut self.store,
            history: &mut self.history,
            view: self.stage.view(),
        };
        self.tools.deactivate(&mut ctx);
        self.after_tool_event();
    }

    /// The active tool's id, if any.
    #[must_use]
    pub fn active_tool_id(&self) -> Option<&'static str> {
        self.tools.active_tool_id()
    }

    /// Typed access to the assisted-segmentation tool, for predictor and
    /// embedding wiring.
    pub fn sam_tool_mut(&mut self) -> Option<&mut SamTool> {
        self.tools.tool_as_mut::<SamTool>("sam")
    }

    // ── Viewer protocol ──────────────────────────────────────────────

    /// The wrapped viewer.
    #[must_use]
    pub fn viewer(&self) -> &V {
        &self.viewer
    }

    /// Refreshes the overlay transform from the viewer.
    ///
    /// The host calls this on the viewer's animation, animation-start,
    /// update-viewport, and resize events.
    pub fn viewport_changed(&mut self) {
        self.stage.set_view(view_state_of(&self.viewer));
    }

    /// Handles the viewer's open event: a new image replaced the old one.
    ///
    /// The assisted-segmentation embedding becomes stale and its tool
    /// disabled until the host completes a new load via
    /// [`Annotator::sam_tool_mut`].
    pub fn image_opened(&mut self) {
        if let Some(sam) = self.sam_tool_mut() {
            let _ = sam.begin_load();
        }
        self.viewport_changed();
        self.stage.redraw();
    }

    /// Whether the stage needs a fresh encode this frame.
    ///
    /// Clears the coalesced dirty flag; any number of mutations between
    /// two frames yields one `true`.
    pub fn needs_render(&mut self) -> bool {
        self.stage.take_dirty()
    }

    /// Encodes the overlay into `scene` for this frame.
    pub fn render(&mut self, scene: &mut Scene) {
        self.stage.render(scene);
    }

    /// Tears down the engine, cancelling any in-progress gesture.
    pub fn destroy(&mut self) {
        self.deactivate_tool();
        self.stage.destroy();
        self.viewer.set_mouse_nav_enabled(true);
    }

    // ── Pointer protocol ─────────────────────────────────────────────

    /// Pointer press on the canvas, in screen pixels.
    pub fn pointer_pressed(
        &mut self,
        screen: Point,
        button: PointerButton,
        modifiers: Modifiers,
        timestamp_ms: u64,
    ) {
        let event = self.pointer_event(screen, button, modifiers, timestamp_ms);

        if button == PointerButton::Secondary {
            self.context_menu(&event);
            return;
        }

        // Handle drags beat tools: a press near a visible handle starts an
        // edit session and owns the pointer. Annotations on locked layers
        // do not accept edits.
        if let Some(handle) = self.pick_handle(screen)
            && !self.selection_locked()
            && self.editor.begin_drag(&self.store, handle, event.image)
        {
            self.editor_dragging = true;
            self.suspend_nav();
            return;
        }

        self.click = Some(ClickProbe {
            screen,
            moved: false,
        });

        let response = {
            let mut ctx = ToolCtx {
                store: &mut self.store,
                history: &mut self.history,
                view: self.stage.view(),
            };
            self.tools.on_press(&event, &mut ctx)
        };
        self.press_handled = response == ToolResponse::Handled;
        if response == ToolResponse::Handled {
            self.suspend_nav();
        }
        self.after_tool_event();
    }

    /// Pointer drag with a button held.
    pub fn pointer_dragged(
        &mut self,
        screen: Point,
        button: PointerButton,
        modifiers: Modifiers,
        timestamp_ms: u64,
    ) {
        let event = self.pointer_event(screen, button, modifiers, timestamp_ms);

        if self.editor_dragging {
            self.editor
                .drag(&mut self.store, &mut self.history, event.image);
            self.sync();
            return;
        }

        if let Some(probe) = &mut self.click
            && probe.screen.distance(screen) > CLICK_SLOP_PX
        {
            probe.moved = true;
        }

        let mut ctx = ToolCtx {
            store: &mut self.store,
            history: &mut self.history,
            view: self.stage.view(),
        };
        self.tools.on_drag(&event, &mut ctx);
        self.after_tool_event();
    }

    /// Pointer release.
    pub fn pointer_released(
        &mut self,
        screen: Point,
        button: PointerButton,
        modifiers: Modifiers,
        timestamp_ms: u64,
    ) {
        let event = self.pointer_event(screen, button, modifiers, timestamp_ms);

        if self.editor_dragging {
            self.editor.end_drag(&self.store, &mut self.history);
            self.editor_dragging = false;
            self.resume_nav();
            self.sync();
            return;
        }

        let response = {
            let mut ctx = ToolCtx {
                store: &mut self.store,
                history: &mut self.history,
                view: self.stage.view(),
            };
            self.tools.on_release(&event, &mut ctx)
        };
        self.resume_nav();

        let was_click = self
            .click
            .take()
            .is_some_and(|probe| !probe.moved && probe.screen.distance(screen) <= CLICK_SLOP_PX);
        let tool_owned_gesture = self.press_handled || response == ToolResponse::Handled;
        self.press_handled = false;
        if was_click && !tool_owned_gesture {
            self.selection_click(&event);
        }
        self.after_tool_event();
    }

    /// Pointer move without a button held (hover).
    pub fn pointer_moved(
        &mut self,
        screen: Point,
        modifiers: Modifiers,
        timestamp_ms: u64,
    ) {
        let event = self.pointer_event(screen, PointerButton::Primary, modifiers, timestamp_ms);

        {
            let mut ctx = ToolCtx {
                store: &mut self.store,
                history: &mut self.history,
                view: self.stage.view(),
            };
            self.tools.on_hover(&event, &mut ctx);
        }

        let tolerance = self.hit_tolerance();
        let hovered = self
            .store
            .get_at(event.image, None, tolerance)
            .map(|a| a.id().clone());
        self.stage.set_hovered(hovered);
        self.after_tool_event();
    }

    /// Keyboard input.
    pub fn key_pressed(&mut self, key: Key, modifiers: Modifiers) {
        match key {
            Key::Delete | Key::Backspace => {
                if self.editor.mode() == EditMode::Vertices
                    && self
                        .editor
                        .delete_active_vertex(&mut self.store, &mut self.history)
                {
                    // A vertex went; the selected annotation stays.
                } else {
                    self.delete_selected();
                }
            }
            Key::KeyZ if modifiers.toggles_selection() => {
                let result = if modifiers.contains(Modifiers::SHIFT) {
                    self.history.redo(&mut self.store)
                } else {
                    self.history.undo(&mut self.store)
                };
                let _ = result;
            }
            Key::KeyA if modifiers.toggles_selection() => {
                self.select_all();
            }
            Key::Escape => {
                let mut ctx = ToolCtx {
                    store: &mut self.store,
                    history: &mut self.history,
                    view: self.stage.view(),
                };
                self.tools.on_escape(&mut ctx);
                self.editor.leave_vertex_mode();
                self.clear_selection();
            }
            _ => {}
        }
        self.sync();
    }

    // ── Internals ────────────────────────────────────────────────────

    fn pointer_event(
        &self,
        screen: Point,
        button: PointerButton,
        modifiers: Modifiers,
        timestamp_ms: u64,
    ) -> PointerEvent {
        PointerEvent {
            image: self.stage.view().screen_to_image(screen),
            screen,
            button,
            modifiers,
            timestamp_ms,
        }
    }

    fn hit_tolerance(&self) -> f64 {
        self.stage.view().screen_tolerance_to_image(HIT_TOLERANCE_PX)
    }

    fn pick_handle(&self, screen: Point) -> Option<HandleId> {
        self.editor
            .screen_handles(&self.store, self.stage.view())
            .into_iter()
            .find(|(_, pos)| pos.distance(screen) <= HANDLE_PICK_PX)
            .map(|(id, _)| id)
    }

    /// Whether the annotation under the handle overlay sits on a locked
    /// layer.
    fn selection_locked(&self) -> bool {
        let Some(id) = self.editor.selected() else {
            return false;
        };
        let Some(annotation) = self.store.get(id) else {
            return false;
        };
        self.layers
            .resolve(annotation)
            .into_iter()
            .any(|layer_id| self.layers.get(layer_id).is_some_and(|l| l.locked))
    }

    fn context_menu(&mut self, event: &PointerEvent) {
        let tolerance = self.hit_tolerance();
        let hit = self
            .store
            .get_at(event.image, None, tolerance)
            .map(|a| a.id().clone());
        let menu = match hit {
            Some(id) => AnnotatorEvent::AnnotationMenu {
                id,
                screen: event.screen,
            },
            None => AnnotatorEvent::ViewerMenu {
                screen: event.screen,
            },
        };
        self.emitter.emit(&menu);
    }

    fn selection_click(&mut self, event: &PointerEvent) {
        let tolerance = self.hit_tolerance();
        let hit = self
            .store
            .get_at(event.image, None, tolerance)
            .map(|a| a.id().clone());

        let double = self.last_click.take().is_some_and(|(pos, t)| {
            event.timestamp_ms.saturating_sub(t) <= DOUBLE_CLICK_MS
                && pos.distance(event.screen) <= CLICK_SLOP_PX
        });
        if !double {
            self.last_click = Some((event.screen, event.timestamp_ms));
        }

        match hit {
            Some(id) if double && self.selection.contains(&id) => {
                // Double-click on the selected shape enters vertex editing.
                self.editor.enter_vertex_mode();
            }
            Some(id) if event.modifiers.toggles_selection() => {
                let mut next = self.selection.clone();
                match next.iter().position(|s| *s == id) {
                    Some(pos) => {
                        next.remove(pos);
                    }
                    None => next.push(id),
                }
                self.apply_selection(next);
            }
            Some(id) => self.apply_selection(vec![id]),
            None => self.apply_selection(Vec::new()),
        }
    }

    fn apply_selection(&mut self, ids: Vec<AnnotationId>) {
        if self.selection == ids {
            return;
        }
        self.selection = ids;
        self.stage.set_selected(self.selection.clone());
        // The handle overlay follows the primary (most recent) selection.
        self.editor.set_selected(self.selection.last().cloned());
        self.emitter
            .emit(&AnnotatorEvent::SelectionChanged(self.selection.clone()));
    }

    fn delete_selected(&mut self) {
        if self.selection.is_empty() {
            return;
        }
        // One batch undo step for the whole selection.
        self.history.begin_batch("delete selection");
        self.store.begin_batch();
        for id in self.selection.clone() {
            if let Some(annotation) = self.store.get(&id).cloned() {
                let _ = self
                    .history
                    .execute(&mut self.store, Box::new(DeleteCommand::new(annotation)));
            }
        }
        self.store.end_batch();
        self.history.end_batch();
        self.sync();
    }

    fn suspend_nav(&mut self) {
        if !self.nav_suspended {
            self.nav_suspended = true;
            self.viewer.set_mouse_nav_enabled(false);
        }
    }

    fn resume_nav(&mut self) {
        if self.nav_suspended {
            self.nav_suspended = false;
            self.viewer.set_mouse_nav_enabled(true);
        }
    }

    /// Copies the active tool's overlay feedback to the stage and drains
    /// store changes.
    fn after_tool_event(&mut self) {
        let scale = self.stage.view().scale();
        let (ghost, cursor) = match self.tools.active_tool() {
            Some(tool) => (
                tool.ghost_preview().map(|(points, opacity)| GhostPreview {
                    points: points.to_vec(),
                    opacity,
                }),
                tool.brush_cursor().map(|(center, radius)| BrushCursor {
                    center,
                    screen_radius: radius * scale,
                }),
            ),
            None => (None, None),
        };
        self.stage.set_ghost(ghost);
        self.stage.set_brush_cursor(cursor);
        self.sync();
    }

    /// Drains buffered store change events into the stage, editor,
    /// selection, and event emitter.
    fn sync(&mut self) {
        loop {
            let drained: Vec<ChangeSet> = self.changes.borrow_mut().drain(..).collect();
            if drained.is_empty() {
                break;
            }
            for set in drained {
                for annotation in &set.created {
                    self.stage.add_annotation(annotation, &self.layers);
                    self.emitter
                        .emit(&AnnotatorEvent::CreateAnnotation(annotation.clone()));
                }
                for (old, new) in &set.updated {
                    self.stage.update_annotation(new, &self.layers);
                    self.emitter.emit(&AnnotatorEvent::UpdateAnnotation {
                        old: old.clone(),
                        new: new.clone(),
                    });
                }
                let mut selection_changed = false;
                for annotation in &set.deleted {
                    self.stage.remove_annotation(annotation.id());
                    if let Some(pos) = self.selection.iter().position(|s| s == annotation.id()) {
                        self.selection.remove(pos);
                        selection_changed = true;
                    }
                    self.emitter
                        .emit(&AnnotatorEvent::DeleteAnnotation(annotation.clone()));
                }
                self.editor.observe_changes(&set);
                if selection_changed {
                    self.stage.set_selected(self.selection.clone());
                    self.editor.set_selected(self.selection.last().cloned());
                    self.emitter
                        .emit(&AnnotatorEvent::SelectionChanged(self.selection.clone()));
                }
            }
        }
    }
}
