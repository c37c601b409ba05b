// Copyright 2026 the Stroma Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stroma Stage: the GPU-backed annotation overlay.
//!
//! The stage is a retained scene keyed by annotation id, mounted conceptually
//! as a transparent canvas above the deep-zoom viewer. It rebuilds nothing
//! per frame: annotation mutations update one retained graphic each, and
//! the per-frame work is a single root transform plus a culled encode into a
//! [`vello::Scene`] which the host renders with Vello.
//!
//! ## Per-frame protocol
//!
//! On every viewer animation/update/resize event the host calls
//! [`Stage::set_view`] with the fresh [`ViewState`]; mutations and view
//! changes mark the stage dirty, and the host's frame callback asks
//! [`Stage::take_dirty`] whether an encode is needed, then calls
//! [`Stage::render`]. Many mutations between two frames produce exactly one
//! encode.
//!
//! ## Composition
//!
//! Graphics are grouped by resolved layer membership
//! ([`Stage::sync_layers`]): group opacity becomes a Vello blend layer,
//! group visibility and z-order come from the layer manager, and annotations
//! matching no layer draw first as the base group. Culling intersects each
//! graphic's bounds with the visible image rect; hovered and selected
//! annotations are always drawn.
//!
//! Tool feedback lives here too: a ghost polygon preview for assisted
//! segmentation and a translucent brush cursor disc for sculpting.

mod graphic;

use hashbrown::HashMap;
use kurbo::{Affine, Circle, Point, Rect, Stroke};
use log::debug;
use peniko::{BlendMode, Color, Fill, ImageBrush, ImageData};
use stroma_geometry::Shape;
use stroma_layers::{LayerId, LayerManager};
use stroma_store::{Annotation, AnnotationId};
use stroma_view::ViewState;
use vello::Scene;

pub use graphic::{DisplayFilter, StageStyle, StyleExpr};

use graphic::{build_path, resolve_style, styled_for_state, Graphic, VisualState};

/// Snapshot of one layer's composition attributes.
#[derive(Clone, Debug)]
struct LayerGroup {
    id: LayerId,
    visible: bool,
    opacity: f32,
}

/// Ghost polygon preview drawn above all layers (assisted segmentation).
#[derive(Clone, Debug)]
pub struct GhostPreview {
    /// Preview polygon vertices in image coordinates.
    pub points: Vec<Point>,
    /// Preview opacity in `[0, 1]`.
    pub opacity: f32,
}

/// Translucent cursor disc for the sculpting tool.
#[derive(Clone, Copy, Debug)]
pub struct BrushCursor {
    /// Disc center in image coordinates.
    pub center: Point,
    /// Disc radius in screen pixels.
    pub screen_radius: f64,
}

/// The retained annotation overlay.
pub struct Stage {
    graphics: HashMap<AnnotationId, Graphic>,
    groups: Vec<LayerGroup>,
    hovered: Option<AnnotationId>,
    selected: Vec<AnnotationId>,
    base_style: StageStyle,
    style_expr: Option<StyleExpr>,
    display_filter: Option<DisplayFilter>,
    visible: bool,
    view: ViewState,
    ghost: Option<GhostPreview>,
    brush_cursor: Option<BrushCursor>,
    dirty: bool,
}

impl core::fmt::Debug for Stage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Stage")
            .field("graphics", &self.graphics.len())
            .field("groups", &self.groups.len())
            .field("hovered", &self.hovered)
            .field("selected", &self.selected.len())
            .field("visible", &self.visible)
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}

impl Default for Stage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage {
    /// Creates an empty stage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graphics: HashMap::new(),
            groups: Vec::new(),
            hovered: None,
            selected: Vec::new(),
            base_style: StageStyle::default(),
            style_expr: None,
            display_filter: None,
            visible: true,
            view: ViewState::default(),
            ghost: None,
            brush_cursor: None,
            dirty: true,
        }
    }

    /// Number of retained graphics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graphics.len()
    }

    /// Whether the stage retains no graphics.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graphics.is_empty()
    }

    /// Whether a graphic exists for `id`.
    #[must_use]
    pub fn contains(&self, id: &AnnotationId) -> bool {
        self.graphics.contains_key(id)
    }

    /// Resolved layer membership of a graphic, in composition order.
    #[must_use]
    pub fn layers_of(&self, id: &AnnotationId) -> Option<&[LayerId]> {
        self.graphics.get(id).map(|g| g.layers.as_slice())
    }

    /// Creates the retained graphic for a new annotation.
    pub fn add_annotation(&mut self, annotation: &Annotation, layers: &LayerManager) {
        let membership = layers.resolve(annotation).into_iter().cloned().collect();
        self.graphics.insert(
            annotation.id().clone(),
            Graphic::new(annotation, membership),
        );
        self.dirty = true;
    }

    /// Rebuilds the retained graphic after an annotation update.
    pub fn update_annotation(&mut self, new: &Annotation, layers: &LayerManager) {
        self.add_annotation(new, layers);
    }

    /// Drops the retained graphic for a deleted annotation.
    pub fn remove_annotation(&mut self, id: &AnnotationId) {
        self.graphics.remove(id);
        if self.hovered.as_ref() == Some(id) {
            self.hovered = None;
        }
        self.selected.retain(|s| s != id);
        self.dirty = true;
    }

    /// Re-snapshots layer composition and re-parents every graphic.
    ///
    /// Call on any layer-manager event; filters may have changed, so each
    /// graphic's membership is resolved afresh.
    pub fn sync_layers(&mut self, layers: &LayerManager) {
        self.groups = layers
            .composition_order()
            .map(|l| LayerGroup {
                id: l.id.clone(),
                visible: l.visible,
                opacity: l.opacity,
            })
            .collect();
        for graphic in self.graphics.values_mut() {
            graphic.layers = layers
                .resolve(&graphic.annotation)
                .into_iter()
                .cloned()
                .collect();
        }
        debug!("layer sync: {} groups", self.groups.len());
        self.dirty = true;
    }

    /// Sets the hovered annotation (at most one).
    pub fn set_hovered(&mut self, id: Option<AnnotationId>) {
        if self.hovered != id {
            self.hovered = id;
            self.dirty = true;
        }
    }

    /// Replaces the selected set.
    pub fn set_selected(&mut self, ids: Vec<AnnotationId>) {
        if self.selected != ids {
            self.selected = ids;
            self.dirty = true;
        }
    }

    /// Sets the dynamic style expression (`None` reverts to the base style).
    pub fn set_style(&mut self, expr: Option<StyleExpr>) {
        self.style_expr = expr;
        self.dirty = true;
    }

    /// Sets the base style used when no expression is installed.
    pub fn set_base_style(&mut self, style: StageStyle) {
        self.base_style = style;
        self.dirty = true;
    }

    /// Sets the display filter; failing annotations are not drawn.
    pub fn set_filter(&mut self, filter: Option<DisplayFilter>) {
        self.display_filter = filter;
        self.dirty = true;
    }

    /// Shows or hides the whole overlay.
    pub fn set_visible(&mut self, visible: bool) {
        if self.visible != visible {
            self.visible = visible;
            self.dirty = true;
        }
    }

    /// Installs the fresh per-frame view state.
    pub fn set_view(&mut self, view: ViewState) {
        if self.view != view {
            self.view = view;
            self.dirty = true;
        }
    }

    /// Handles a canvas resize.
    pub fn resize(&mut self, size: kurbo::Size) {
        if self.view.container != size {
            self.view.container = size;
            self.dirty = true;
        }
    }

    /// Current view state.
    #[must_use]
    pub fn view(&self) -> &ViewState {
        &self.view
    }

    /// Sets the ghost polygon preview.
    pub fn set_ghost(&mut self, ghost: Option<GhostPreview>) {
        self.ghost = ghost;
        self.dirty = true;
    }

    /// Sets the sculpting brush cursor disc.
    pub fn set_brush_cursor(&mut self, cursor: Option<BrushCursor>) {
        self.brush_cursor = cursor;
        self.dirty = true;
    }

    /// Requests a redraw on the next frame.
    pub fn redraw(&mut self) {
        self.dirty = true;
    }

    /// Returns and clears the dirty flag; the host encodes when it was set.
    pub fn take_dirty(&mut self) -> bool {
        core::mem::take(&mut self.dirty)
    }

    /// Drops all retained state.
    pub fn destroy(&mut self) {
        self.graphics.clear();
        self.groups.clear();
        self.hovered = None;
        self.selected.clear();
        self.ghost = None;
        self.brush_cursor = None;
        self.dirty = true;
    }

    /// The ids that would be encoded this frame, in draw order.
    ///
    /// Unassigned graphics first, then each visible layer group ascending;
    /// within a group, culled by the visible image rect with hovered and
    /// selected graphics always included.
    #[must_use]
    pub fn draw_order(&self) -> Vec<AnnotationId> {
        let cull = self.view.visible_image_rect();
        let mut out = Vec::new();

        let mut unassigned: Vec<&Graphic> = self
            .graphics
            .values()
            .filter(|g| g.layers.is_empty())
            .collect();
        unassigned.sort_by(|a, b| a.annotation.id().cmp(b.annotation.id()));
        for g in unassigned {
            if self.should_draw(g, cull) {
                out.push(g.annotation.id().clone());
            }
        }

        for group in self.groups.iter().filter(|g| g.visible) {
            let mut members: Vec<&Graphic> = self
                .graphics
                .values()
                .filter(|g| g.layers.contains(&group.id))
                .collect();
            members.sort_by(|a, b| a.annotation.id().cmp(b.annotation.id()));
            for g in members {
                if self.should_draw(g, cull) {
                    out.push(g.annotation.id().clone());
                }
            }
        }
        out
    }

    /// Encodes the overlay into `scene`. One call per frame.
    pub fn render(&mut self, scene: &mut Scene) {
        self.dirty = false;
        if !self.visible || self.view.scale() <= 0.0 {
            return;
        }
        let transform = self.view.overlay_transform();
        let cull = self.view.visible_image_rect();
        let scale = self.view.scale();

        let unassigned: Vec<&Graphic> = self
            .graphics
            .values()
            .filter(|g| g.layers.is_empty())
            .collect();
        self.encode_group(scene, transform, cull, scale, &unassigned, 1.0);

        for group in self.groups.iter().filter(|g| g.visible) {
            let members: Vec<&Graphic> = self
                .graphics
                .values()
                .filter(|g| g.layers.contains(&group.id))
                .collect();
            self.encode_group(scene, transform, cull, scale, &members, group.opacity);
        }

        if let Some(ghost) = &self.ghost
            && ghost.points.len() >= 3
        {
            let path = build_path(&Shape::Polygon(stroma_geometry::PolygonShape::new(
                ghost.points.clone(),
            )));
            let color = self.base_style.fill.with_alpha(ghost.opacity);
            scene.fill(Fill::NonZero, transform, color, None, &path);
            let stroke = Stroke::new(self.base_style.stroke_width / scale);
            scene.stroke(&stroke, transform, self.base_style.stroke, None, &path);
        }

        if let Some(cursor) = &self.brush_cursor {
            let disc = Circle::new(cursor.center, cursor.screen_radius / scale);
            scene.fill(
                Fill::NonZero,
                transform,
                Color::from_rgba8(0xff, 0xff, 0xff, 0x40),
                None,
                &disc,
            );
            let stroke = Stroke::new(1.5 / scale);
            scene.stroke(
                &stroke,
                transform,
                Color::from_rgba8(0xff, 0xff, 0xff, 0xc0),
                None,
                &disc,
            );
        }
    }

    fn encode_group(
        &self,
        scene: &mut Scene,
        transform: Affine,
        cull: Rect,
        scale: f64,
        members: &[&Graphic],
        opacity: f32,
    ) {
        if members.is_empty() {
            return;
        }
        let grouped = opacity < 1.0;
        if grouped {
            scene.push_layer(BlendMode::default(), opacity, transform, &cull);
        }
        for graphic in members {
            if self.should_draw(graphic, cull) {
                self.encode_graphic(scene, transform, scale, graphic);
            }
        }
        if grouped {
            scene.pop_layer();
        }
    }

    fn should_draw(&self, graphic: &Graphic, cull: Rect) -> bool {
        let id = graphic.annotation.id();
        if let Some(filter) = &self.display_filter
            && !filter(&graphic.annotation)
        {
            return false;
        }
        if self.hovered.as_ref() == Some(id) || self.selected.contains(id) {
            return true;
        }
        rects_overlap(graphic.bounds, cull)
    }

    fn visual_state(&self, id: &AnnotationId) -> VisualState {
        if self.selected.contains(id) {
            VisualState::Selected
        } else if self.hovered.as_ref() == Some(id) {
            VisualState::Hovered
        } else {
            VisualState::Base
        }
    }

    fn encode_graphic(&self, scene: &mut Scene, transform: Affine, scale: f64, graphic: &Graphic) {
        let resolved = resolve_style(
            self.base_style,
            self.style_expr.as_ref(),
            &graphic.annotation,
        );
        let style = styled_for_state(resolved, self.visual_state(graphic.annotation.id()));
        let stroke = Stroke::new(style.stroke_width / scale);
        let stroke_color = style.stroke.with_alpha(style.stroke_opacity);
        let fill_color = style.fill.with_alpha(style.fill_opacity);

        if let Some(center) = graphic.point() {
            // Keep markers legible at any zoom: at least ~3 screen px.
            let radius = style.point_radius.max(3.0) / scale;
            let disc = Circle::new(center, radius);
            scene.fill(
                Fill::NonZero,
                transform,
                style.fill.with_alpha(style.stroke_opacity),
                None,
                &disc,
            );
            scene.stroke(&stroke, transform, stroke_color, None, &disc);
            return;
        }

        if let Shape::Image(patch) = graphic.annotation.shape() {
            self.encode_raster(scene, transform, patch);
            return;
        }

        if graphic.filled() {
            scene.fill(Fill::NonZero, transform, fill_color, None, &graphic.path);
        }
        scene.stroke(&stroke, transform, stroke_color, None, &graphic.path);
    }

    fn encode_raster(
        &self,
        scene: &mut Scene,
        transform: Affine,
        patch: &stroma_geometry::ImageShape,
    ) {
        if patch.pixels.width == 0 || patch.pixels.height == 0 {
            return;
        }
        let data = ImageData {
            data: peniko::Blob::from(patch.pixels.rgba.clone()),
            format: peniko::ImageFormat::Rgba8,
            alpha_type: peniko::ImageAlphaType::Alpha,
            width: patch.pixels.width,
            height: patch.pixels.height,
        };
        let brush = ImageBrush {
            image: &data,
            sampler: peniko::ImageSampler::default(),
        };
        // Map raster pixel space onto the patch footprint.
        let local = Affine::translate((patch.x, patch.y))
            * Affine::scale_non_uniform(
                patch.width / f64::from(patch.pixels.width),
                patch.height / f64::from(patch.pixels.height),
            );
        scene.push_clip_layer(transform, &patch.rect());
        scene.draw_image(brush, transform * local);
        scene.pop_layer();
    }
}

/// Closed-edge overlap test; zero-area bounds (points) still intersect.
fn rects_overlap(a: Rect, b: Rect) -> bool {
    a.x0 <= b.x1 && a.x1 >= b.x0 && a.y0 <= b.y1 && a.y1 >= b.y0
}
