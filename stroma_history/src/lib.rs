// Copyright 2026 the Stroma Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stroma History: reversible annotation mutations.
//!
//! Every undoable change to the annotation catalog is expressed as a
//! [`Command`]: an object that can apply itself to a store, revert itself,
//! and optionally merge a follow-up command into itself. Three primitives
//! cover catalog mutation — [`CreateCommand`], [`UpdateCommand`],
//! [`DeleteCommand`] — and [`BatchCommand`] groups several commands into one
//! undo step (its revert replays children in reverse).
//!
//! [`History`] owns the undo and redo stacks and applies the execution
//! rules:
//!
//! 1. While disabled, commands apply without being recorded (this is how
//!    undo itself avoids recording).
//! 2. Inside a history batch, applied commands append to the open batch;
//!    the batch lands on the undo stack as one step when it closes.
//! 3. Otherwise the new command is offered to the top of the undo stack for
//!    merging — consecutive updates to the same annotation collapse into
//!    one undoable step, which is what turns a burst of vertex drags into a
//!    single undo.
//! 4. Failing all that, the command is pushed; the redo stack clears and
//!    the oldest entry is dropped past the configured cap.
//!
//! Gestures that keep an in-progress annotation live in the store (rubber
//! band rectangles, polygon drafts) apply their intermediate states with
//! recording disabled and then [`History::record`] the finished command
//! without re-applying it, so one gesture is exactly one undo step.
//!
//! ```rust
//! use kurbo::Point;
//! use stroma_geometry::{PointShape, Shape};
//! use stroma_history::{CreateCommand, History};
//! use stroma_store::{Annotation, AnnotationStore};
//!
//! let mut store = AnnotationStore::new();
//! let mut history = History::new();
//!
//! let ann = Annotation::new("p", Shape::Point(PointShape { point: Point::new(4.0, 2.0) }));
//! history.execute(&mut store, Box::new(CreateCommand::new(ann))).unwrap();
//! assert_eq!(store.len(), 1);
//!
//! history.undo(&mut store).unwrap();
//! assert!(store.is_empty());
//! history.redo(&mut store).unwrap();
//! assert_eq!(store.len(), 1);
//! ```

use core::any::Any;
use core::fmt;

use log::{trace, warn};
use stroma_store::{Annotation, AnnotationId, AnnotationStore, StoreError};

/// A reversible catalog mutation.
pub trait Command: fmt::Debug {
    /// Applies the mutation to `store`.
    fn apply(&mut self, store: &mut AnnotationStore) -> Result<(), StoreError>;

    /// Reverts the mutation on `store`.
    fn revert(&mut self, store: &mut AnnotationStore) -> Result<(), StoreError>;

    /// Attempts to absorb `next` (already applied) into this command so the
    /// pair undoes as one step. Returns whether the merge happened.
    fn merge(&mut self, next: &dyn Command) -> bool {
        let _ = next;
        false
    }

    /// Human-readable description for history UIs.
    fn description(&self) -> &str;

    /// Downcast support for [`Command::merge`] implementations.
    fn as_any(&self) -> &dyn Any;
}

/// Owned command trait object.
pub type BoxedCommand = Box<dyn Command>;

/// Creates one annotation.
#[derive(Debug)]
pub struct CreateCommand {
    annotation: Annotation,
}

impl CreateCommand {
    /// Command that creates `annotation`.
    #[must_use]
    pub fn new(annotation: Annotation) -> Self {
        Self { annotation }
    }
}

impl Command for CreateCommand {
    fn apply(&mut self, store: &mut AnnotationStore) -> Result<(), StoreError> {
        store.add(self.annotation.clone())
    }

    fn revert(&mut self, store: &mut AnnotationStore) -> Result<(), StoreError> {
        store.delete(self.annotation.id()).map(|_| ())
    }

    fn description(&self) -> &str {
        "create annotation"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Replaces one annotation's contents.
#[derive(Debug)]
pub struct UpdateCommand {
    id: AnnotationId,
    old: Annotation,
    new: Annotation,
}

impl UpdateCommand {
    /// Command that replaces `old` with `new` (same id).
    #[must_use]
    pub fn new(old: Annotation, new: Annotation) -> Self {
        Self {
            id: old.id().clone(),
            old,
            new,
        }
    }
}

impl Command for UpdateCommand {
    fn apply(&mut self, store: &mut AnnotationStore) -> Result<(), StoreError> {
        store.update(&self.id, self.new.clone()).map(|_| ())
    }

    fn revert(&mut self, store: &mut AnnotationStore) -> Result<(), StoreError> {
        store.update(&self.id, self.old.clone()).map(|_| ())
    }

    fn merge(&mut self, next: &dyn Command) -> bool {
        if let Some(next) = next.as_any().downcast_ref::<Self>()
            && next.id == self.id
        {
            // Keep the earliest old state, adopt the latest new state.
            self.new = next.new.clone();
            return true;
        }
        false
    }

    fn description(&self) -> &str {
        "update annotation"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Deletes one annotation.
#[derive(Debug)]
pub struct DeleteCommand {
    annotation: Annotation,
}

impl DeleteCommand {
    /// Command that deletes `annotation`.
    #[must_use]
    pub fn new(annotation: Annotation) -> Self {
        Self { annotation }
    }
}

impl Command for DeleteCommand {
    fn apply(&mut self, store: &mut AnnotationStore) -> Result<(), StoreError> {
        store.delete(self.annotation.id()).map(|_| ())
    }

    fn revert(&mut self, store: &mut AnnotationStore) -> Result<(), StoreError> {
        store.add(self.annotation.clone())
    }

    fn description(&self) -> &str {
        "delete annotation"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Groups several commands into one undo step.
#[derive(Debug)]
pub struct BatchCommand {
    commands: Vec<BoxedCommand>,
    description: String,
}

impl BatchCommand {
    /// Command grouping `commands` under one description.
    #[must_use]
    pub fn new(commands: Vec<BoxedCommand>, description: impl Into<String>) -> Self {
        Self {
            commands,
            description: description.into(),
        }
    }

    /// Number of grouped commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the batch holds no commands.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl Command for BatchCommand {
    fn apply(&mut self, store: &mut AnnotationStore) -> Result<(), StoreError> {
        store.begin_batch();
        let result = self.commands.iter_mut().try_for_each(|c| c.apply(store));
        store.end_batch();
        result
    }

    fn revert(&mut self, store: &mut AnnotationStore) -> Result<(), StoreError> {
        store.begin_batch();
        let result = self
            .commands
            .iter_mut()
            .rev()
            .try_for_each(|c| c.revert(store));
        store.end_batch();
        result
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// History configuration.
#[derive(Clone, Copy, Debug)]
pub struct HistoryOptions {
    /// Undo stack cap; the oldest entry is dropped past it.
    pub max_history_size: usize,
    /// Whether consecutive updates to the same id merge into one step.
    pub enable_merging: bool,
}

impl Default for HistoryOptions {
    fn default() -> Self {
        Self {
            max_history_size: 100,
            enable_merging: true,
        }
    }
}

/// Snapshot delivered to history observers after every change.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HistoryStatus {
    /// Whether an undo step is available.
    pub can_undo: bool,
    /// Whether a redo step is available.
    pub can_redo: bool,
    /// Undo stack depth.
    pub undo_size: usize,
    /// Redo stack depth.
    pub redo_size: usize,
}

/// Handle returned from [`History::observe`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct HistoryObserverId(u64);

type HistoryObserverFn = Box<dyn FnMut(&HistoryStatus)>;

/// The undo/redo stack machine.
pub struct History {
    undo_stack: Vec<BoxedCommand>,
    redo_stack: Vec<BoxedCommand>,
    disabled: bool,
    batch: Option<BatchCommand>,
    options: HistoryOptions,
    observers: Vec<(HistoryObserverId, HistoryObserverFn)>,
    next_observer: u64,
    /// Whether the top of the undo stack stopped accepting merges.
    sealed: bool,
}

impl fmt::Debug for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("History")
            .field("undo", &self.undo_stack.len())
            .field("redo", &self.redo_stack.len())
            .field("disabled", &self.disabled)
            .field("batching", &self.batch.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    /// Creates a history with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(HistoryOptions::default())
    }

    /// Creates a history with explicit options.
    #[must_use]
    pub fn with_options(options: HistoryOptions) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            disabled: false,
            batch: None,
            options,
            observers: Vec::new(),
            next_observer: 0,
            sealed: false,
        }
    }

    /// Subscribes an observer; it receives a status after every change.
    pub fn observe(&mut self, f: impl FnMut(&HistoryStatus) + 'static) -> HistoryObserverId {
        let id = HistoryObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, Box::new(f)));
        id
    }

    /// Unsubscribes an observer. Returns whether it was subscribed.
    pub fn unobserve(&mut self, id: HistoryObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(oid, _)| *oid != id);
        self.observers.len() != before
    }

    /// Current status snapshot.
    #[must_use]
    pub fn status(&self) -> HistoryStatus {
        HistoryStatus {
            can_undo: !self.undo_stack.is_empty(),
            can_redo: !self.redo_stack.is_empty(),
            undo_size: self.undo_stack.len(),
            redo_size: self.redo_stack.len(),
        }
    }

    /// Whether an undo step is available.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Whether a redo step is available.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Applies `cmd` and records it per the execution rules.
    ///
    /// A failed apply records nothing and leaves the stacks untouched.
    pub fn execute(
        &mut self,
        store: &mut AnnotationStore,
        mut cmd: BoxedCommand,
    ) -> Result<(), StoreError> {
        cmd.apply(store)?;
        if self.disabled {
            return Ok(());
        }
        self.absorb(cmd);
        Ok(())
    }

    /// Records an already-applied command without re-applying it.
    ///
    /// This is the path for gestures that mutate the store live while
    /// drawing and only become undoable on commit.
    pub fn record(&mut self, cmd: BoxedCommand) {
        if self.disabled {
            return;
        }
        self.absorb(cmd);
    }

    /// Opens a history batch; applied commands append to it until
    /// [`History::end_batch`].
    pub fn begin_batch(&mut self, description: impl Into<String>) {
        if self.batch.is_some() {
            warn!("begin_batch while a batch is already open");
            return;
        }
        self.batch = Some(BatchCommand::new(Vec::new(), description));
    }

    /// Closes the open batch, pushing it as one undo step if non-empty.
    pub fn end_batch(&mut self) {
        let Some(batch) = self.batch.take() else {
            warn!("end_batch without matching begin_batch");
            return;
        };
        if batch.is_empty() {
            return;
        }
        self.push(Box::new(batch));
        self.notify();
    }

    /// Runs commands with recording disabled for the duration of `f`.
    pub fn while_disabled<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let was = self.disabled;
        self.disabled = true;
        let out = f(self);
        self.disabled = was;
        out
    }

    /// Undoes the most recent step. Returns whether a step was undone.
    pub fn undo(&mut self, store: &mut AnnotationStore) -> Result<bool, StoreError> {
        let Some(mut cmd) = self.undo_stack.pop() else {
            return Ok(false);
        };
        trace!("undo: {}", cmd.description());
        self.disabled = true;
        let result = cmd.revert(store);
        self.disabled = false;
        match result {
            Ok(()) => {
                self.redo_stack.push(cmd);
                self.notify();
                Ok(true)
            }
            Err(e) => {
                // Leave the step on the stack; the store was not changed.
                self.undo_stack.push(cmd);
                Err(e)
            }
        }
    }

    /// Redoes the most recently undone step. Returns whether a step was
    /// redone.
    pub fn redo(&mut self, store: &mut AnnotationStore) -> Result<bool, StoreError> {
        let Some(mut cmd) = self.redo_stack.pop() else {
            return Ok(false);
        };
        trace!("redo: {}", cmd.description());
        self.disabled = true;
        let result = cmd.apply(store);
        self.disabled = false;
        match result {
            Ok(()) => {
                self.undo_stack.push(cmd);
                self.notify();
                Ok(true)
            }
            Err(e) => {
                self.redo_stack.push(cmd);
                Err(e)
            }
        }
    }

    /// Drops both stacks.
    pub fn clear(&mut self) {
        if self.undo_stack.is_empty() && self.redo_stack.is_empty() {
            return;
        }
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.notify();
    }

    /// Stops the current top of the undo stack from accepting merges.
    ///
    /// Gesture boundaries call this so the next burst of updates becomes
    /// its own undo step instead of folding into the previous gesture.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Routes an applied command into the batch, a merge, or a push.
    fn absorb(&mut self, cmd: BoxedCommand) {
        if let Some(batch) = &mut self.batch {
            batch.commands.push(cmd);
            return;
        }
        if self.options.enable_merging
            && !self.sealed
            && let Some(last) = self.undo_stack.last_mut()
            && last.merge(&*cmd)
        {
            // Merged into the previous step; a merge still invalidates redo.
            self.redo_stack.clear();
            self.notify();
            return;
        }
        self.push(cmd);
        self.notify();
    }

    fn push(&mut self, cmd: BoxedCommand) {
        self.undo_stack.push(cmd);
        self.redo_stack.clear();
        self.sealed = false;
        if self.undo_stack.len() > self.options.max_history_size {
            self.undo_stack.remove(0);
        }
    }

    fn notify(&mut self) {
        let status = self.status();
        for (_, observer) in &mut self.observers {
            observer(&status);
        }
    }
}
