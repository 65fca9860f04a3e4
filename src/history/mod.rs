//! In-memory undo/redo for the live editing session.
//!
//! Operations are applied by the action handler *before* being pushed, so
//! the stack itself only moves operations between `past` and `future` and
//! invokes their undo/apply closures. Branching is not supported: pushing
//! after an undo discards the redo history.

mod category;

pub use category::Category;

use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{RevisionPayload, SessionState};

/// A synchronous mutation of the live session.
pub type SessionFn = Box<dyn Fn(&mut SessionState) + Send + Sync>;

/// One reversible edit.
///
/// `apply` and `undo` must be idempotent: applying twice leaves the session
/// as applying once does. `metadata` feeds revision derivation only and is
/// never consulted when undoing or redoing.
pub struct HistoryOperation {
    pub id: Uuid,
    pub label: String,
    pub category: Category,
    pub timestamp: DateTime<Utc>,
    pub metadata: Option<RevisionPayload>,
    apply: Option<SessionFn>,
    undo: Option<SessionFn>,
}

impl HistoryOperation {
    pub fn new(label: impl Into<String>, category: Category) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            category,
            timestamp: Utc::now(),
            metadata: None,
            apply: None,
            undo: None,
        }
    }

    /// An operation that sets one session field, remembering the old value.
    pub fn set<T, F>(
        label: impl Into<String>,
        category: Category,
        field: F,
        previous: T,
        next: T,
    ) -> Self
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&mut SessionState) -> &mut T + Send + Sync + Copy + 'static,
    {
        Self::new(label, category)
            .on_apply(move |session| *field(session) = next.clone())
            .on_undo(move |session| *field(session) = previous.clone())
    }

    pub fn on_apply(mut self, f: impl Fn(&mut SessionState) + Send + Sync + 'static) -> Self {
        self.apply = Some(Box::new(f));
        self
    }

    pub fn on_undo(mut self, f: impl Fn(&mut SessionState) + Send + Sync + 'static) -> Self {
        self.undo = Some(Box::new(f));
        self
    }

    pub fn with_metadata(mut self, metadata: RevisionPayload) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Whether both directions are present.
    pub fn is_well_formed(&self) -> bool {
        self.apply.is_some() && self.undo.is_some()
    }

    pub fn apply(&self, session: &mut SessionState) {
        if let Some(apply) = &self.apply {
            apply(session);
        }
    }

    pub fn revert(&self, session: &mut SessionState) {
        if let Some(undo) = &self.undo {
            undo(session);
        }
    }
}

impl fmt::Debug for HistoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryOperation")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("category", &self.category)
            .field("timestamp", &self.timestamp)
            .field("metadata", &self.metadata)
            .field("well_formed", &self.is_well_formed())
            .finish()
    }
}

/// Strict-LIFO undo/redo stack.
#[derive(Debug, Default)]
pub struct HistoryStack {
    past: Vec<HistoryOperation>,
    future: Vec<HistoryOperation>,
}

impl HistoryStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an operation the caller has already applied.
    ///
    /// Clears the redo history. A malformed operation is dropped and the
    /// stack is left untouched; returns whether the push happened.
    pub fn push(&mut self, op: HistoryOperation) -> bool {
        if !op.is_well_formed() {
            tracing::debug!("Ignoring malformed history operation {:?}", op.label);
            return false;
        }
        self.future.clear();
        self.past.push(op);
        true
    }

    /// Undo the most recent operation, returning it. `None` if there is nothing to undo.
    pub fn undo(&mut self, session: &mut SessionState) -> Option<&HistoryOperation> {
        let op = self.past.pop()?;
        op.revert(session);
        self.future.push(op);
        self.future.last()
    }

    /// Re-apply the most recently undone operation. `None` if there is nothing to redo.
    pub fn redo(&mut self, session: &mut SessionState) -> Option<&HistoryOperation> {
        let op = self.future.pop()?;
        op.apply(session);
        self.past.push(op);
        self.past.last()
    }

    /// Forget everything. The local project store is not touched.
    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
    }

    pub fn is_undo_available(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn is_redo_available(&self) -> bool {
        !self.future.is_empty()
    }

    /// Applied operations, oldest first.
    pub fn past(&self) -> &[HistoryOperation] {
        &self.past
    }

    /// Undone operations; the next one to redo is last.
    pub fn future(&self) -> &[HistoryOperation] {
        &self.future
    }
}
