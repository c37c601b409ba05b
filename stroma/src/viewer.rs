// Copyright 2026 the Stroma Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The deep-zoom viewer capability the annotator consumes.

use kurbo::{Rect, Size};
use stroma_view::ViewState;

/// Narrow capability contract over the host's deep-zoom tile viewer.
///
/// The annotator never drives the viewer; it only reads the viewport state
/// needed to build the overlay transform, toggles pointer navigation while
/// tools and handle drags own the pointer, and relies on the host to
/// forward viewer events (animation frames, resizes, pointer input) into
/// the [`crate::Annotator`] methods. Any tiled viewer — or a test stub —
/// can implement this.
pub trait Viewer {
    /// Whether the viewer has opened an image and its canvas exists.
    ///
    /// Annotator construction fails until this is `true`; callers wait for
    /// the viewer's open event.
    fn is_open(&self) -> bool;

    /// Current zoom factor (1.0 = image width fills the container).
    fn zoom(&self) -> f64;

    /// Current viewport rotation in radians.
    fn rotation(&self) -> f64;

    /// Whether the viewer mirrors the image horizontally.
    fn flipped(&self) -> bool;

    /// Canvas size in screen pixels.
    fn container_size(&self) -> Size;

    /// Ratio of full-resolution image width to viewport width units.
    fn content_factor(&self) -> f64;

    /// Viewer bounds converted to image coordinates.
    fn viewport_bounds_in_image(&self) -> Rect;

    /// Full-resolution image dimensions in pixels.
    fn image_size(&self) -> (u32, u32);

    /// Enables or disables the viewer's own pointer pan/zoom.
    fn set_mouse_nav_enabled(&mut self, enabled: bool);
}

/// Snapshots the viewer's viewport into a [`ViewState`].
#[must_use]
pub fn view_state_of(viewer: &dyn Viewer) -> ViewState {
    ViewState {
        zoom: viewer.zoom(),
        rotation: viewer.rotation(),
        flipped: viewer.flipped(),
        container: viewer.container_size(),
        content_factor: viewer.content_factor(),
        viewport_bounds_in_image: viewer.viewport_bounds_in_image(),
    }
}
