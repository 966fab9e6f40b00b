//! Object suspension.
//!
//! Entities removed from the live graph (by an undone add or an executed
//! remove) are kept as compact byte buffers instead of live objects:
//!
//! - [`SuspendedObjectStore`] — turns detached subtrees into
//!   [`SuspendedObject`]s and back, and tracks how much is suspended
//! - [`SuspendedObject`] — `(id, kind, bytes)` for one detached subtree
//! - [`SuspendError`] — a buffer that does not decode back to its entities
//!
//! A restored subtree carries the ids it had when it was suspended; nothing
//! mints new ids for it.

mod codec;
mod error;

pub use error::{SuspendError, SuspendResult};

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::graph::{IdRegistry, ObjectId, ObjectKind, Subtree};

#[derive(Debug, Default)]
struct StoreStats {
    buffers: AtomicUsize,
    bytes: AtomicUsize,
}

/// How much data a store currently holds in suspended form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreUsage {
    pub buffers: usize,
    pub bytes: usize,
}

/// Serialized form of one detached subtree.
///
/// Exists only while its entities are absent from the live graph. Dropping
/// it releases its bytes from the store's usage counters.
pub struct SuspendedObject {
    id: ObjectId,
    kind: ObjectKind,
    bytes: Vec<u8>,
    stats: Arc<StoreStats>,
}

impl SuspendedObject {
    /// Id of the subtree root.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[cfg(test)]
    pub(crate) fn bytes_mut(&mut self) -> &mut Vec<u8> {
        &mut self.bytes
    }
}

impl Drop for SuspendedObject {
    fn drop(&mut self) {
        self.stats.buffers.fetch_sub(1, Ordering::Relaxed);
        self.stats.bytes.fetch_sub(self.bytes.len(), Ordering::Relaxed);
    }
}

impl fmt::Debug for SuspendedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuspendedObject")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Suspends and restores detached subtrees for one document.
#[derive(Debug, Clone, Default)]
pub struct SuspendedObjectStore {
    stats: Arc<StoreStats>,
}

impl SuspendedObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes a detached subtree.
    ///
    /// The caller drops the live subtree once this succeeds; on failure it
    /// still has it and can put it back into the graph.
    pub fn suspend(&self, subtree: &Subtree) -> SuspendResult<SuspendedObject> {
        let id = subtree.root();
        let kind = subtree
            .root_object()
            .map(|o| o.kind())
            .ok_or(SuspendError::MissingObject(id))?;
        if kind == ObjectKind::Sprite {
            return Err(SuspendError::NotSuspendable(kind));
        }
        let bytes = codec::encode(subtree)?;
        log::trace!(
            "Suspended {kind:?} {id}: {} entit(ies) into {} bytes",
            subtree.len(),
            bytes.len()
        );

        self.stats.buffers.fetch_add(1, Ordering::Relaxed);
        self.stats.bytes.fetch_add(bytes.len(), Ordering::Relaxed);
        Ok(SuspendedObject {
            id,
            kind,
            bytes,
            stats: Arc::clone(&self.stats),
        })
    }

    /// Rebuilds the subtree held by `suspended`.
    ///
    /// Verifies that the buffer decodes back to the recorded root id and kind,
    /// that every decoded id was minted by `ids` and none of them is live.
    /// Every restored entity's version is one past the recorded one.
    pub fn restore(&self, suspended: &SuspendedObject, ids: &IdRegistry) -> SuspendResult<Subtree> {
        let mut objects = codec::decode(&suspended.bytes)?;

        let root = objects.first().ok_or(SuspendError::MissingObject(suspended.id))?;
        if root.id != suspended.id {
            return Err(SuspendError::IdMismatch {
                expected: suspended.id,
                decoded: root.id,
            });
        }
        if root.kind() != suspended.kind {
            return Err(SuspendError::KindMismatch {
                expected: suspended.kind,
                decoded: root.kind(),
            });
        }

        let mut seen = HashSet::with_capacity(objects.len());
        for object in &mut objects {
            if !ids.is_minted(object.id) {
                return Err(SuspendError::UnknownId(object.id));
            }
            if ids.is_live(object.id) {
                return Err(SuspendError::AlreadyLive(object.id));
            }
            if !seen.insert(object.id) {
                return Err(SuspendError::Duplicate(object.id));
            }
            object.bump();
        }

        log::trace!(
            "Restored {:?} {}: {} entit(ies) from {} bytes",
            suspended.kind,
            suspended.id,
            objects.len(),
            suspended.bytes.len()
        );
        Ok(Subtree::new(suspended.id, objects))
    }

    /// Buffers and bytes currently suspended through this store.
    pub fn usage(&self) -> StoreUsage {
        StoreUsage {
            buffers: self.stats.buffers.load(Ordering::Relaxed),
            bytes: self.stats.bytes.load(Ordering::Relaxed),
        }
    }
}
