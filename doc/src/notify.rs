//! Document change notifications.
//!
//! Every durable change to a document is announced exactly once, after it is
//! fully applied, through the document's [`NotificationBus`]:
//!
//! - [`DocEvent`] — what changed, in which document and sprite
//! - [`DocObserver`] — the single entry point observers implement
//! - [`EventMask`] — per-subscription filter
//!
//! Removals are bracketed: [`Change::BeforeRemove`] fires while the entity is
//! still in the graph, then the detach runs, then [`Change::AfterRemove`]
//! fires. The bus is borrowed mutably for the whole bracket, so no other
//! notification can land in between.

use std::fmt;

use bitflags::bitflags;

use crate::graph::{Field, ObjectGraph, ObjectId, ObjectKind};

/// Identifier of an open document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocId(u32);

impl DocId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc{}", self.0)
    }
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// An entity (and everything it owns) entered the graph.
    Added { id: ObjectId, kind: ObjectKind },
    /// An entity is about to leave the graph; it can still be looked up.
    BeforeRemove { id: ObjectId, kind: ObjectKind },
    /// An entity left the graph.
    AfterRemove { id: ObjectId, kind: ObjectKind },
    Modified { id: ObjectId, field: Field },
    LayerMoved { id: ObjectId },
    FrameMoved { id: ObjectId },
    PixelsModified { image: ObjectId },
    Committed { label: String },
    RolledBack { label: String },
    Undone { label: String },
    Redone { label: String },
    /// The document entered or left its saved state.
    SavedStateChanged { saved: bool },
    /// Current frame, current layer or selection changed.
    ViewChanged,
}

impl Change {
    /// The mask bit this change is filtered by.
    pub fn mask(&self) -> EventMask {
        match self {
            Self::Added { .. } => EventMask::ADDED,
            Self::BeforeRemove { .. } | Self::AfterRemove { .. } => EventMask::REMOVED,
            Self::Modified { .. } => EventMask::MODIFIED,
            Self::LayerMoved { .. } | Self::FrameMoved { .. } => EventMask::STRUCTURE,
            Self::PixelsModified { .. } => EventMask::PIXELS,
            Self::Committed { .. }
            | Self::RolledBack { .. }
            | Self::Undone { .. }
            | Self::Redone { .. } => EventMask::HISTORY,
            Self::SavedStateChanged { .. } => EventMask::SAVED_STATE,
            Self::ViewChanged => EventMask::VIEW,
        }
    }
}

bitflags! {
    /// Selects which [`Change`]s a subscription receives.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventMask: u32 {
        const ADDED = 1 << 0;
        /// Both halves of a removal bracket.
        const REMOVED = 1 << 1;
        const MODIFIED = 1 << 2;
        const STRUCTURE = 1 << 3;
        const PIXELS = 1 << 4;
        /// Commit, rollback, undo and redo.
        const HISTORY = 1 << 5;
        const SAVED_STATE = 1 << 6;
        const VIEW = 1 << 7;
    }
}

impl Default for EventMask {
    fn default() -> Self {
        Self::all()
    }
}

/// One notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocEvent {
    pub doc: DocId,
    pub sprite: ObjectId,
    pub change: Change,
}

/// Receives document notifications.
///
/// Called synchronously on the thread that holds the document's write lock,
/// with read access to the graph as it is right after the change (or, for
/// [`Change::BeforeRemove`], right before it).
pub trait DocObserver: Send {
    fn on_event(&mut self, graph: &ObjectGraph, event: &DocEvent);
}

/// Handle returned by [`NotificationBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u32);

struct Subscription {
    id: SubscriptionId,
    mask: EventMask,
    observer: Box<dyn DocObserver>,
}

/// Observer registry of one document.
pub struct NotificationBus {
    doc: DocId,
    subscriptions: Vec<Subscription>,
    next_id: u32,
}

impl NotificationBus {
    pub fn new(doc: DocId) -> Self {
        Self {
            doc,
            subscriptions: Vec::new(),
            next_id: 1,
        }
    }

    pub fn doc(&self) -> DocId {
        self.doc
    }

    /// Registers `observer` for the changes selected by `mask`. Observers are
    /// called in subscription order.
    pub fn subscribe(&mut self, mask: EventMask, observer: Box<dyn DocObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions.push(Subscription { id, mask, observer });
        id
    }

    /// Removes a subscription and hands its observer back.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> Option<Box<dyn DocObserver>> {
        let index = self.subscriptions.iter().position(|s| s.id == id)?;
        Some(self.subscriptions.remove(index).observer)
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Delivers `change` to every matching observer.
    pub fn notify(&mut self, graph: &ObjectGraph, change: Change) {
        let event = DocEvent {
            doc: self.doc,
            sprite: graph.sprite_id(),
            change,
        };
        let bit = event.change.mask();
        for subscription in &mut self.subscriptions {
            if subscription.mask.intersects(bit) {
                subscription.observer.on_event(graph, &event);
            }
        }
    }

    /// Runs `detach` between a [`Change::BeforeRemove`] and a
    /// [`Change::AfterRemove`] for `id`.
    ///
    /// `AfterRemove` only fires if `detach` succeeds.
    pub fn bracket_removal<T, E>(
        &mut self,
        graph: &mut ObjectGraph,
        id: ObjectId,
        kind: ObjectKind,
        detach: impl FnOnce(&mut ObjectGraph) -> Result<T, E>,
    ) -> Result<T, E> {
        self.notify(graph, Change::BeforeRemove { id, kind });
        let result = detach(graph)?;
        self.notify(graph, Change::AfterRemove { id, kind });
        Ok(result)
    }
}

impl fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationBus")
            .field("doc", &self.doc)
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}
