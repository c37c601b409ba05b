// Copyright 2026 the Stroma Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stroma Tools: pointer-driven annotation state machines.
//!
//! A tool is a small state machine consuming canvas pointer events and
//! producing catalog mutations through the command history. At most one
//! tool is active at a time; activating another resets and detaches the
//! predecessor, whose teardown must leave the catalog consistent (no
//! half-committed draft shapes).
//!
//! The [`ToolController`] routes raw press/drag/release events to the
//! active tool and synthesizes clicks and double-clicks from press/release
//! pairs that stay within a small screen-space slop, the same recognition
//! rule selection uses. A handler returning [`ToolResponse::Handled`] asks
//! the host to suppress the viewer's own pan/zoom for that event; `Pass`
//! lets the viewer (or selection) have it.
//!
//! Tools that draw keep their in-progress shape as a *real* annotation in
//! the store, flagged with the transient `drawing` property so it renders
//! live; intermediate states apply directly to the store, and the finished
//! gesture is recorded as one history command on commit. See the individual
//! tool modules:
//!
//! - [`point::PointTool`] — one click, one point marker.
//! - [`rectangle::RectangleTool`] — press/drag/release with min-area abort.
//! - [`polygon::PolygonTool`] — click vertices, close by proximity or
//!   double-click, Escape cancels.
//! - [`freehand::FreehandTool`] — sampled strokes simplified on release.
//! - [`push::PushTool`] — radial vertex sculpting, accumulator-free.
//! - [`sam::SamTool`] — assisted segmentation behind a mask-predictor
//!   contract with readiness gating.

pub mod freehand;
pub mod point;
pub mod polygon;
pub mod push;
pub mod rectangle;
pub mod sam;

use core::fmt;

use bitflags::bitflags;
use kurbo::Point;
use log::debug;
use stroma_history::History;
use stroma_store::{Annotation, AnnotationId, AnnotationStore, Polarity, Style};
use stroma_view::ViewState;

/// Press/release pairs within this many screen pixels count as clicks.
pub const CLICK_SLOP_PX: f64 = 5.0;

/// Two clicks within this window and slop form a double-click.
pub const DOUBLE_CLICK_MS: u64 = 400;

bitflags! {
    /// Keyboard modifiers carried on pointer and key events.
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
    pub struct Modifiers: u8 {
        /// Shift key.
        const SHIFT = 1 << 0;
        /// Control key.
        const CTRL = 1 << 1;
        /// Alt/Option key.
        const ALT = 1 << 2;
        /// Meta/Command key.
        const META = 1 << 3;
    }
}

impl Modifiers {
    /// Whether the platform's toggle-selection modifier is held
    /// (Control, or Command on macOS).
    #[must_use]
    pub fn toggles_selection(self) -> bool {
        self.intersects(Self::CTRL | Self::META)
    }
}

/// Pointer button of an event.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum PointerButton {
    /// Left button / primary touch.
    #[default]
    Primary,
    /// Right button; opens context menus.
    Secondary,
    /// Middle button.
    Auxiliary,
}

/// One canvas pointer event, already converted to both coordinate frames.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PointerEvent {
    /// Position in image pixels.
    pub image: Point,
    /// Position in overlay-canvas (screen) pixels.
    pub screen: Point,
    /// Button held for press/drag/release; `Primary` for moves.
    pub button: PointerButton,
    /// Keyboard modifiers at event time.
    pub modifiers: Modifiers,
    /// Monotonic timestamp in milliseconds, supplied by the host.
    pub timestamp_ms: u64,
}

/// Whether a tool consumed an event.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ToolResponse {
    /// Consumed; the host suppresses viewer pan/zoom for this event.
    Handled,
    /// Not consumed; the viewer or selection may act on it.
    Pass,
}

/// Mutable engine access handed to tool handlers.
pub struct ToolCtx<'a> {
    /// The annotation catalog.
    pub store: &'a mut AnnotationStore,
    /// The command history.
    pub history: &'a mut History,
    /// This frame's view state (for screen-tolerance conversion).
    pub view: &'a ViewState,
}

impl fmt::Debug for ToolCtx<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolCtx").finish_non_exhaustive()
    }
}

/// A pointer-driven annotation tool.
///
/// All handlers default to [`ToolResponse::Pass`]; tools implement only the
/// events they care about. `deactivate` must leave the store consistent —
/// in-progress drafts are removed, not committed. The [`core::any::Any`]
/// supertrait lets hosts recover concrete tool types for configuration via
/// [`ToolController::tool_as_mut`].
pub trait Tool: core::any::Any {
    /// Opaque identifier, unique within a controller.
    fn id(&self) -> &'static str;

    /// Whether the tool currently accepts events (e.g. model readiness).
    fn enabled(&self) -> bool {
        true
    }

    /// Called when the tool becomes active.
    fn activate(&mut self) {}

    /// Called when the tool stops being active or the controller shuts
    /// down. Must cancel any in-progress gesture.
    fn deactivate(&mut self, ctx: &mut ToolCtx<'_>) {
        let _ = ctx;
    }

    /// Pointer press on the canvas.
    fn on_press(&mut self, event: &PointerEvent, ctx: &mut ToolCtx<'_>) -> ToolResponse {
        let _ = (event, ctx);
        ToolResponse::Pass
    }

    /// Pointer drag while pressed.
    fn on_drag(&mut self, event: &PointerEvent, ctx: &mut ToolCtx<'_>) -> ToolResponse {
        let _ = (event, ctx);
        ToolResponse::Pass
    }

    /// Pointer release.
    fn on_release(&mut self, event: &PointerEvent, ctx: &mut ToolCtx<'_>) -> ToolResponse {
        let _ = (event, ctx);
        ToolResponse::Pass
    }

    /// Synthesized click (press and release within the slop).
    fn on_click(&mut self, event: &PointerEvent, ctx: &mut ToolCtx<'_>) -> ToolResponse {
        let _ = (event, ctx);
        ToolResponse::Pass
    }

    /// Synthesized double-click.
    fn on_double_click(&mut self, event: &PointerEvent, ctx: &mut ToolCtx<'_>) -> ToolResponse {
        let _ = (event, ctx);
        ToolResponse::Pass
    }

    /// Pointer move without a press (hover).
    fn on_hover(&mut self, event: &PointerEvent, ctx: &mut ToolCtx<'_>) -> ToolResponse {
        let _ = (event, ctx);
        ToolResponse::Pass
    }

    /// Escape pressed; cancel any in-progress gesture.
    fn on_escape(&mut self, ctx: &mut ToolCtx<'_>) {
        let _ = ctx;
    }

    /// Brush cursor overlay as `(center, radius)`, both in image pixels.
    fn brush_cursor(&self) -> Option<(Point, f64)> {
        None
    }

    /// Ghost polygon preview as `(vertices, opacity)` in image pixels.
    fn ghost_preview(&self) -> Option<(&[Point], f32)> {
        None
    }
}

/// Default properties and style stamped onto annotations a tool creates.
#[derive(Clone, Debug, Default)]
pub struct AnnotationSeed {
    /// Target layer id.
    pub layer: Option<String>,
    /// Prompt polarity.
    pub category: Option<Polarity>,
    /// Tags applied to every created annotation.
    pub tags: Vec<String>,
    /// Style override applied to every created annotation.
    pub style: Option<Style>,
}

impl AnnotationSeed {
    /// Merges the seed into a freshly created annotation.
    #[must_use]
    pub fn apply(&self, mut annotation: Annotation) -> Annotation {
        if annotation.properties.layer.is_none() {
            annotation.properties.layer = self.layer.clone();
        }
        if annotation.properties.category.is_none() {
            annotation.properties.category = self.category;
        }
        annotation
            .properties
            .tags
            .extend(self.tags.iter().cloned());
        if annotation.style.is_none() {
            annotation.style = self.style;
        }
        annotation
    }
}

/// Allocates an id of the form `{prefix}-{n}` not present in `store`.
#[must_use]
pub fn fresh_id(store: &AnnotationStore, prefix: &str, counter: &mut u64) -> AnnotationId {
    loop {
        *counter += 1;
        let candidate: AnnotationId = format!("{prefix}-{counter}").into();
        if !store.contains(&candidate) {
            return candidate;
        }
    }
}

/// Routes pointer events to the single active tool and synthesizes
/// click/double-click gestures.
pub struct ToolController {
    tools: Vec<Box<dyn Tool>>,
    active: Option<usize>,
    press: Option<Point>,
    press_moved: bool,
    last_click: Option<(Point, u64)>,
}

impl fmt::Debug for ToolController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolController")
            .field("tools", &self.tools.len())
            .field("active", &self.active_tool_id())
            .finish_non_exhaustive()
    }
}

impl Default for ToolController {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolController {
    /// Creates a controller with no tools registered.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            active: None,
            press: None,
            press_moved: false,
            last_click: None,
        }
    }

    /// Registers a tool. The first registered tool does not auto-activate.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    /// The active tool's id, if any.
    #[must_use]
    pub fn active_tool_id(&self) -> Option<&'static str> {
        self.active.map(|i| self.tools[i].id())
    }

    /// Activates the tool with `id`, deactivating any predecessor.
    ///
    /// Returns whether a tool with that id exists.
    pub fn activate(&mut self, id: &str, ctx: &mut ToolCtx<'_>) -> bool {
        let Some(idx) = self.tools.iter().position(|t| t.id() == id) else {
            return false;
        };
        if self.active == Some(idx) {
            return true;
        }
        self.deactivate(ctx);
        debug!("activate tool {id}");
        self.tools[idx].activate();
        self.active = Some(idx);
        true
    }

    /// Deactivates the active tool, cancelling its in-progress gesture.
    pub fn deactivate(&mut self, ctx: &mut ToolCtx<'_>) {
        if let Some(idx) = self.active.take() {
            debug!("deactivate tool {}", self.tools[idx].id());
            self.tools[idx].deactivate(ctx);
        }
        self.press = None;
        self.press_moved = false;
    }

    /// Mutable access to a registered tool (for configuration).
    pub fn tool_mut(&mut self, id: &str) -> Option<&mut Box<dyn Tool>> {
        self.tools.iter_mut().find(|t| t.id() == id)
    }

    /// The active tool, for overlay queries.
    #[must_use]
    pub fn active_tool(&self) -> Option<&dyn Tool> {
        self.active.map(|i| &*self.tools[i])
    }

    /// Typed mutable access to a registered tool.
    pub fn tool_as_mut<T: Tool>(&mut self, id: &str) -> Option<&mut T> {
        let tool = self.tools.iter_mut().find(|t| t.id() == id)?;
        (&mut **tool as &mut dyn core::any::Any).downcast_mut::<T>()
    }

    /// Routes a press to the active tool.
    pub fn on_press(&mut self, event: &PointerEvent, ctx: &mut ToolCtx<'_>) -> ToolResponse {
        self.press = Some(event.screen);
        self.press_moved = false;
        self.with_active(|tool| tool.on_press(event, ctx))
    }

    /// Routes a drag to the active tool, tracking click slop.
    pub fn on_drag(&mut self, event: &PointerEvent, ctx: &mut ToolCtx<'_>) -> ToolResponse {
        if let Some(origin) = self.press
            && origin.distance(event.screen) > CLICK_SLOP_PX
        {
            self.press_moved = true;
        }
        self.with_active(|tool| tool.on_drag(event, ctx))
    }

    /// Routes a release, synthesizing click/double-click when the pointer
    /// stayed within the slop.
    pub fn on_release(&mut self, event: &PointerEvent, ctx: &mut ToolCtx<'_>) -> ToolResponse {
        let mut response = self.with_active(|tool| tool.on_release(event, ctx));
        let was_click = self
            .press
            .take()
            .is_some_and(|origin| !self.press_moved && origin.distance(event.screen) <= CLICK_SLOP_PX);
        self.press_moved = false;

        if was_click {
            let double = self.last_click.take().is_some_and(|(pos, t)| {
                event.timestamp_ms.saturating_sub(t) <= DOUBLE_CLICK_MS
                    && pos.distance(event.screen) <= CLICK_SLOP_PX
            });
            let click_response = if double {
                self.with_active(|tool| tool.on_double_click(event, ctx))
            } else {
                self.last_click = Some((event.screen, event.timestamp_ms));
                self.with_active(|tool| tool.on_click(event, ctx))
            };
            if click_response == ToolResponse::Handled {
                response = ToolResponse::Handled;
            }
        }
        response
    }

    /// Routes a hover move (no button held) to the active tool.
    pub fn on_hover(&mut self, event: &PointerEvent, ctx: &mut ToolCtx<'_>) -> ToolResponse {
        self.with_active(|tool| tool.on_hover(event, ctx))
    }

    /// Routes Escape to the active tool.
    pub fn on_escape(&mut self, ctx: &mut ToolCtx<'_>) {
        if let Some(idx) = self.active {
            self.tools[idx].on_escape(ctx);
        }
        self.press = None;
        self.press_moved = false;
    }

    fn with_active(
        &mut self,
        f: impl FnOnce(&mut Box<dyn Tool>) -> ToolResponse,
    ) -> ToolResponse {
        match self.active {
            Some(idx) if self.tools[idx].enabled() => f(&mut self.tools[idx]),
            _ => ToolResponse::Pass,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Probe {
        clicks: std::rc::Rc<std::cell::RefCell<Vec<&'static str>>>,
    }

    impl Tool for Probe {
        fn id(&self) -> &'static str {
            "probe"
        }

        fn on_click(&mut self, _: &PointerEvent, _: &mut ToolCtx<'_>) -> ToolResponse {
            self.clicks.borrow_mut().push("click");
            ToolResponse::Handled
        }

        fn on_double_click(&mut self, _: &PointerEvent, _: &mut ToolCtx<'_>) -> ToolResponse {
            self.clicks.borrow_mut().push("double");
            ToolResponse::Handled
        }
    }

    fn event(x: f64, t: u64) -> PointerEvent {
        PointerEvent {
            image: Point::new(x, 0.0),
            screen: Point::new(x, 0.0),
            button: PointerButton::Primary,
            modifiers: Modifiers::default(),
            timestamp_ms: t,
        }
    }

    #[test]
    fn press_release_within_slop_is_a_click() {
        let mut store = AnnotationStore::new();
        let mut history = History::new();
        let view = ViewState::default();
        let mut ctx = ToolCtx {
            store: &mut store,
            history: &mut history,
            view: &view,
        };

        let log = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut controller = ToolController::new();
        controller.register(Box::new(Probe { clicks: log.clone() }));
        controller.activate("probe", &mut ctx);

        controller.on_press(&event(0.0, 0), &mut ctx);
        controller.on_release(&event(2.0, 50), &mut ctx);
        assert_eq!(*log.borrow(), ["click"]);

        // Larger movement does not qualify.
        controller.on_press(&event(0.0, 1000), &mut ctx);
        controller.on_drag(&event(20.0, 1020), &mut ctx);
        controller.on_release(&event(20.0, 1050), &mut ctx);
        assert_eq!(*log.borrow(), ["click"]);
    }

    #[test]
    fn two_quick_clicks_form_a_double_click() {
        let mut store = AnnotationStore::new();
        let mut history = History::new();
        let view = ViewState::default();
        let mut ctx = ToolCtx {
            store: &mut store,
            history: &mut history,
            view: &view,
        };

        let log = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut controller = ToolController::new();
        controller.register(Box::new(Probe { clicks: log.clone() }));
        controller.activate("probe", &mut ctx);

        controller.on_press(&event(0.0, 0), &mut ctx);
        controller.on_release(&event(0.0, 20), &mut ctx);
        controller.on_press(&event(1.0, 200), &mut ctx);
        controller.on_release(&event(1.0, 220), &mut ctx);
        assert_eq!(*log.borrow(), ["click", "double"]);

        // A third click after the window starts a new sequence.
        controller.on_press(&event(1.0, 2000), &mut ctx);
        controller.on_release(&event(1.0, 2020), &mut ctx);
        assert_eq!(*log.borrow(), ["click", "double", "click"]);
    }

    #[test]
    fn seed_merges_without_clobbering() {
        let seed = AnnotationSeed {
            layer: Some("cells".to_owned()),
            category: Some(Polarity::Positive),
            tags: vec!["auto".to_owned()],
            style: None,
        };
        let ann = Annotation::new(
            "a",
            stroma_geometry::Shape::Point(stroma_geometry::PointShape {
                point: Point::new(0.0, 0.0),
            }),
        );
        let seeded = seed.apply(ann);
        assert_eq!(seeded.properties.layer.as_deref(), Some("cells"));
        assert_eq!(seeded.properties.category, Some(Polarity::Positive));
        assert_eq!(seeded.properties.tags, ["auto"]);
    }

    #[test]
    fn fresh_ids_skip_existing() {
        let mut store = AnnotationStore::new();
        store
            .add(Annotation::new(
                "rect-1",
                stroma_geometry::Shape::Point(stroma_geometry::PointShape {
                    point: Point::new(0.0, 0.0),
                }),
            ))
            .unwrap();
        let mut counter = 0;
        let id = fresh_id(&store, "rect", &mut counter);
        assert_eq!(id.as_str(), "rect-2");
    }
}
