// Copyright 2026 the Stroma Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stroma Editor: the drag-handle overlay for the selected annotation.
//!
//! The overlay renders handles for the primary selected annotation only and
//! lives in a separate surface from the GPU stage, but both derive their
//! transforms from the same [`ViewState`] affine — that is the contract
//! that keeps handles and filled shapes coregistered to sub-pixel precision
//! ([`EditorOverlay::screen_handles`] is just the image-space layout mapped
//! through [`ViewState::image_to_screen`]).
//!
//! Editing itself is delegated to per-shape [`editors`] registered in a
//! dispatch table keyed by [`stroma_geometry::ShapeKind`]; every edit is a
//! pure function of the gesture-start snapshot and the total drag offset.
//!
//! ## Drag lifecycle
//!
//! 1. Pointer-down on a handle: [`EditorOverlay::begin_drag`] snapshots the
//!    annotation and the image-space origin. The host captures the pointer
//!    and disables viewer panning.
//! 2. Pointer-move: [`EditorOverlay::drag`] computes the edited shape from
//!    the snapshot and routes it through the history, where consecutive
//!    updates merge into one undoable step.
//! 3. Pointer-up: [`EditorOverlay::end_drag`] seals the history step and
//!    retains the final shape until the store's change event confirms
//!    catch-up ([`EditorOverlay::observe_changes`]), avoiding a one-frame
//!    flicker for hosts that redraw from observer state.
//!
//! Annotations carrying the transient split-preview marker get no handles.

pub mod editors;

use kurbo::Point;
use log::warn;
use stroma_geometry::Shape;
use stroma_history::{History, UpdateCommand};
use stroma_store::{Annotation, AnnotationId, AnnotationStore, ChangeSet};
use stroma_view::ViewState;

pub use editors::{editor_for, EditMode, Handle, HandleId, ShapeEditor};

/// An in-progress handle drag.
#[derive(Debug)]
struct DragSession {
    id: AnnotationId,
    handle: HandleId,
    origin: Point,
    snapshot: Annotation,
}

/// Editing overlay state for the currently selected annotation.
#[derive(Debug, Default)]
pub struct EditorOverlay {
    selected: Option<AnnotationId>,
    mode: EditMode,
    session: Option<DragSession>,
    /// Shape retained after pointer-up until the store confirms catch-up.
    pending: Option<(AnnotationId, Shape)>,
    /// Vertex addressed by the last vertex-handle interaction; the target
    /// of Delete/Backspace in vertex mode.
    active_vertex: Option<usize>,
}

impl EditorOverlay {
    /// Creates an empty overlay.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the annotation whose handles are shown (object mode).
    pub fn set_selected(&mut self, id: Option<AnnotationId>) {
        if self.selected != id {
            self.selected = id;
            self.mode = EditMode::Object;
            self.session = None;
            self.active_vertex = None;
        }
    }

    /// The annotation currently being edited.
    #[must_use]
    pub fn selected(&self) -> Option<&AnnotationId> {
        self.selected.as_ref()
    }

    /// Current handle exposure level.
    #[must_use]
    pub fn mode(&self) -> EditMode {
        self.mode
    }

    /// Enters vertex mode (double-click on a polygon or freehand shape).
    pub fn enter_vertex_mode(&mut self) {
        self.mode = EditMode::Vertices;
    }

    /// Leaves vertex mode.
    pub fn leave_vertex_mode(&mut self) {
        self.mode = EditMode::Object;
        self.active_vertex = None;
    }

    /// Whether a drag is in progress (the host keeps viewer panning off).
    #[must_use]
    pub fn dragging(&self) -> bool {
        self.session.is_some()
    }

    /// The shape the overlay should display for `id`.
    ///
    /// After pointer-up this is the retained final shape until the store
    /// confirms catch-up; otherwise the store's current shape.
    #[must_use]
    pub fn display_shape<'a>(
        &'a self,
        store: &'a AnnotationStore,
        id: &AnnotationId,
    ) -> Option<&'a Shape> {
        if let Some((pending_id, shape)) = &self.pending
            && pending_id == id
        {
            return Some(shape);
        }
        store.get(id).map(Annotation::shape)
    }

    /// Image-space handle layout for the selected annotation.
    ///
    /// Empty when nothing is selected, the annotation is gone, it carries
    /// the split-preview marker, or its kind has no editor.
    #[must_use]
    pub fn handles(&self, store: &AnnotationStore) -> Vec<Handle> {
        let Some(id) = &self.selected else {
            return Vec::new();
        };
        let Some(annotation) = store.get(id) else {
            return Vec::new();
        };
        if annotation.properties.split_preview {
            return Vec::new();
        }
        let Some(shape) = self.display_shape(store, id) else {
            return Vec::new();
        };
        match editor_for(shape.kind()) {
            Some(editor) => editor.handles(shape, self.mode),
            None => Vec::new(),
        }
    }

    /// Screen-space handle layout, through the same affine as the stage.
    #[must_use]
    pub fn screen_handles(&self, store: &AnnotationStore, view: &ViewState) -> Vec<(HandleId, Point)> {
        self.handles(store)
            .into_iter()
            .map(|h| (h.id, view.image_to_screen(h.pos)))
            .collect()
    }

    /// Starts dragging `handle` from the image-space `origin`.
    ///
    /// Returns whether a drag started; the host disables viewer navigation
    /// while it runs.
    pub fn begin_drag(
        &mut self,
        store: &AnnotationStore,
        handle: HandleId,
        origin: Point,
    ) -> bool {
        let Some(id) = self.selected.clone() else {
            return false;
        };
        let Some(annotation) = store.get(&id) else {
            return false;
        };
        if annotation.properties.split_preview {
            return false;
        }
        if editor_for(annotation.shape().kind()).is_none() {
            return false;
        }
        if let HandleId::Vertex(i) = handle {
            self.active_vertex = Some(i);
        }
        self.pending = None;
        self.session = Some(DragSession {
            id,
            handle,
            origin,
            snapshot: annotation.clone(),
        });
        true
    }

    /// Applies the drag at the current image-space cursor.
    ///
    /// The edited shape is recomputed from the gesture snapshot and routed
    /// through the merging history, so the burst lands as one undo step.
    pub fn drag(
        &mut self,
        store: &mut AnnotationStore,
        history: &mut History,
        cursor: Point,
    ) {
        let Some(session) = &self.session else { return };
        let Some(editor) = editor_for(session.snapshot.shape().kind()) else {
            return;
        };
        let delta = cursor - session.origin;
        let Some(shape) = editor.edit(session.snapshot.shape(), session.handle, delta) else {
            return;
        };
        let Some(current) = store.get(&session.id).cloned() else {
            return;
        };
        if current.shape() == &shape {
            return;
        }
        let next = current.with_shape(shape);
        if let Err(e) = history.execute(
            store,
            Box::new(UpdateCommand::new(current, next)),
        ) {
            warn!("editor drag update failed: {e}");
        }
    }

    /// Finishes the drag: seals the merged history step and retains the
    /// final shape until the store confirms catch-up.
    pub fn end_drag(&mut self, store: &AnnotationStore, history: &mut History) {
        let Some(session) = self.session.take() else {
            return;
        };
        history.seal();
        if let Some(current) = store.get(&session.id) {
            self.pending = Some((session.id, current.shape().clone()));
        }
    }

    /// Deletes the most recently dragged/clicked vertex in vertex mode.
    ///
    /// Refused (returns `false`) below the polygon minimum or outside
    /// vertex mode; the deletion is one undoable step.
    pub fn delete_active_vertex(
        &mut self,
        store: &mut AnnotationStore,
        history: &mut History,
    ) -> bool {
        if self.mode != EditMode::Vertices {
            return false;
        }
        let (Some(id), Some(vertex)) = (self.selected.clone(), self.active_vertex) else {
            return false;
        };
        let Some(current) = store.get(&id).cloned() else {
            return false;
        };
        let Some(editor) = editor_for(current.shape().kind()) else {
            return false;
        };
        let Some(shape) = editor.delete_vertex(current.shape(), HandleId::Vertex(vertex)) else {
            return false;
        };
        let next = current.with_shape(shape);
        history.seal();
        if let Err(e) = history.execute(store, Box::new(UpdateCommand::new(current, next))) {
            warn!("vertex deletion failed: {e}");
            return false;
        }
        history.seal();
        self.active_vertex = None;
        true
    }

    /// Feeds store change events to release retained shapes and drop
    /// selection state for deleted annotations.
    pub fn observe_changes(&mut self, changes: &ChangeSet) {
        if let Some((id, shape)) = &self.pending {
            let caught_up = changes
                .updated
                .iter()
                .any(|(_, new)| new.id() == id && new.shape() == shape)
                || changes.created.iter().any(|a| a.id() == id);
            if caught_up {
                self.pending = None;
            }
        }
        if let Some(selected) = &self.selected
            && changes.deleted.iter().any(|a| a.id() == selected)
        {
            self.selected = None;
            self.session = None;
            self.pending = None;
            self.active_vertex = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use kurbo::{Rect, Size};
    use stroma_geometry::{PolygonShape, RectangleShape};

    use super::*;

    fn store_with_rect() -> AnnotationStore {
        let mut store = AnnotationStore::new();
        store
            .add(Annotation::new(
                "r",
                Shape::Rectangle(RectangleShape::new(10.0, 10.0, 40.0, 20.0)),
            ))
            .unwrap();
        store
    }

    fn store_with_square() -> AnnotationStore {
        let mut store = AnnotationStore::new();
        store
            .add(Annotation::new(
                "sq",
                Shape::Polygon(PolygonShape::new(vec![
                    Point::new(0.0, 0.0),
                    Point::new(10.0, 0.0),
                    Point::new(10.0, 10.0),
                    Point::new(0.0, 10.0),
                ])),
            ))
            .unwrap();
        store
    }

    #[test]
    fn handles_only_for_selection() {
        let store = store_with_rect();
        let mut overlay = EditorOverlay::new();
        assert!(overlay.handles(&store).is_empty());

        overlay.set_selected(Some("r".into()));
        assert_eq!(overlay.handles(&store).len(), 9);

        overlay.set_selected(None);
        assert!(overlay.handles(&store).is_empty());
    }

    #[test]
    fn split_preview_annotations_get_no_handles() {
        let mut store = AnnotationStore::new();
        let mut ann = Annotation::new(
            "s",
            Shape::Rectangle(RectangleShape::new(0.0, 0.0, 10.0, 10.0)),
        );
        ann.properties.split_preview = true;
        store.add(ann).unwrap();

        let mut overlay = EditorOverlay::new();
        overlay.set_selected(Some("s".into()));
        assert!(overlay.handles(&store).is_empty());
    }

    #[test]
    fn corner_drag_merges_to_one_undo_step() {
        let mut store = store_with_rect();
        let mut history = History::new();
        let mut overlay = EditorOverlay::new();
        overlay.set_selected(Some("r".into()));

        assert!(overlay.begin_drag(&store, HandleId::Corner(2), Point::new(50.0, 30.0)));
        for step in 1..=10 {
            let cursor = Point::new(50.0 + f64::from(step) * 2.0, 30.0 + f64::from(step));
            overlay.drag(&mut store, &mut history, cursor);
        }
        overlay.end_drag(&store, &mut history);

        let ann = store.get(&"r".into()).unwrap();
        assert_eq!(ann.bounds(), Rect::new(10.0, 10.0, 70.0, 40.0));
        assert_eq!(history.status().undo_size, 1);

        history.undo(&mut store).unwrap();
        assert_eq!(
            store.get(&"r".into()).unwrap().bounds(),
            Rect::new(10.0, 10.0, 50.0, 30.0)
        );
    }

    #[test]
    fn separate_drags_are_separate_undo_steps() {
        let mut store = store_with_rect();
        let mut history = History::new();
        let mut overlay = EditorOverlay::new();
        overlay.set_selected(Some("r".into()));

        overlay.begin_drag(&store, HandleId::Body, Point::new(30.0, 20.0));
        overlay.drag(&mut store, &mut history, Point::new(40.0, 20.0));
        overlay.end_drag(&store, &mut history);

        overlay.begin_drag(&store, HandleId::Body, Point::new(40.0, 20.0));
        overlay.drag(&mut store, &mut history, Point::new(40.0, 35.0));
        overlay.end_drag(&store, &mut history);

        assert_eq!(history.status().undo_size, 2);
    }

    #[test]
    fn vertex_mode_edits_and_deletes() {
        let mut store = store_with_square();
        let mut history = History::new();
        let mut overlay = EditorOverlay::new();
        overlay.set_selected(Some("sq".into()));
        overlay.enter_vertex_mode();

        // 4 vertices + 4 midpoints.
        assert_eq!(overlay.handles(&store).len(), 8);

        overlay.begin_drag(&store, HandleId::Vertex(1), Point::new(10.0, 0.0));
        overlay.drag(&mut store, &mut history, Point::new(14.0, -3.0));
        overlay.end_drag(&store, &mut history);
        let Shape::Polygon(p) = store.get(&"sq".into()).unwrap().shape() else {
            panic!("square stays a polygon");
        };
        assert_eq!(p.points[1], Point::new(14.0, -3.0));

        // Delete the vertex we just dragged.
        assert!(overlay.delete_active_vertex(&mut store, &mut history));
        let Shape::Polygon(p) = store.get(&"sq".into()).unwrap().shape() else {
            panic!("square stays a polygon");
        };
        assert_eq!(p.points.len(), 3);

        // A triangle refuses further deletion.
        overlay.begin_drag(&store, HandleId::Vertex(0), p.points[0]);
        overlay.end_drag(&store, &mut history);
        assert!(!overlay.delete_active_vertex(&mut store, &mut history));
    }

    #[test]
    fn midpoint_drag_inserts_vertex() {
        let mut store = store_with_square();
        let mut history = History::new();
        let mut overlay = EditorOverlay::new();
        overlay.set_selected(Some("sq".into()));
        overlay.enter_vertex_mode();

        overlay.begin_drag(&store, HandleId::Midpoint(0), Point::new(5.0, 0.0));
        overlay.drag(&mut store, &mut history, Point::new(5.0, -4.0));
        overlay.drag(&mut store, &mut history, Point::new(5.0, -6.0));
        overlay.end_drag(&store, &mut history);

        let Shape::Polygon(p) = store.get(&"sq".into()).unwrap().shape() else {
            panic!("square stays a polygon");
        };
        assert_eq!(p.points.len(), 5);
        assert_eq!(p.points[1], Point::new(5.0, -6.0));
        assert_eq!(history.status().undo_size, 1);
    }

    #[test]
    fn pending_shape_retained_until_catch_up() {
        let mut store = store_with_rect();
        let mut history = History::new();
        let mut overlay = EditorOverlay::new();
        overlay.set_selected(Some("r".into()));

        overlay.begin_drag(&store, HandleId::Body, Point::new(30.0, 20.0));
        overlay.drag(&mut store, &mut history, Point::new(42.0, 20.0));
        overlay.end_drag(&store, &mut history);

        let final_shape = store.get(&"r".into()).unwrap().shape().clone();
        assert_eq!(overlay.display_shape(&store, &"r".into()), Some(&final_shape));

        // The store's confirming event releases the retained shape.
        let mut changes = ChangeSet::default();
        let confirmed = store.get(&"r".into()).unwrap().clone();
        changes.updated.push((confirmed.clone(), confirmed));
        overlay.observe_changes(&changes);
        assert_eq!(overlay.display_shape(&store, &"r".into()), Some(&final_shape));
    }

    #[test]
    fn deletion_clears_selection_state() {
        let mut store = store_with_rect();
        let mut overlay = EditorOverlay::new();
        overlay.set_selected(Some("r".into()));

        let deleted = store.delete(&"r".into()).unwrap();
        let mut changes = ChangeSet::default();
        changes.deleted.push(deleted);
        overlay.observe_changes(&changes);
        assert!(overlay.selected().is_none());
    }

    #[test]
    fn screen_handles_use_the_stage_transform() {
        let store = store_with_rect();
        let mut overlay = EditorOverlay::new();
        overlay.set_selected(Some("r".into()));

        let view = ViewState {
            zoom: 2.0,
            rotation: 0.35,
            flipped: true,
            container: Size::new(800.0, 600.0),
            content_factor: 4000.0,
            viewport_bounds_in_image: Rect::new(-100.0, -100.0, 1900.0, 1400.0),
        };
        // Agreement within a screen pixel between the overlay layout and
        // the stage's affine, for every handle.
        let affine = view.overlay_transform();
        for (id, screen) in overlay.screen_handles(&store, &view) {
            let image = overlay
                .handles(&store)
                .into_iter()
                .find(|h| h.id == id)
                .unwrap()
                .pos;
            let expected = affine * image;
            assert!((expected - screen).hypot() < 1.0);
        }
    }
}
