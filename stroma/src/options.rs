// Copyright 2026 the Stroma Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Annotator configuration.

use stroma_history::HistoryOptions;
use stroma_stage::StageStyle;
use stroma_tools::freehand::FreehandToolOptions;
use stroma_tools::push::PushToolOptions;
use stroma_tools::rectangle::RectangleToolOptions;
use stroma_tools::sam::SamToolOptions;
use stroma_tools::AnnotationSeed;

/// Top-level annotator configuration; every field has a sensible default.
#[derive(Clone, Debug, Default)]
pub struct AnnotatorOptions {
    /// Undo stack size and merging behavior.
    pub history: HistoryOptions,
    /// Base drawing style when no style expression is installed.
    pub base_style: StageStyle,
    /// Default properties and style stamped onto tool-created annotations.
    pub annotation_seed: AnnotationSeed,
    /// Rectangle tool configuration.
    pub rectangle: RectangleToolOptions,
    /// Freehand tool configuration.
    pub freehand: FreehandToolOptions,
    /// Push (sculpting) tool configuration.
    pub push: PushToolOptions,
    /// Assisted segmentation tool configuration.
    pub sam: SamToolOptions,
}
