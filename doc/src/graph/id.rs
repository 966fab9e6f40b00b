use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{GraphError, GraphResult};

/// Identifier of one entity in a document's object graph.
///
/// `0` is the null id. Ids are minted by the document's [`IdRegistry`] and
/// never reused within that document; a suspended entity keeps its id and
/// gets it back when restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(u32);

impl ObjectId {
    /// The null id; never refers to an entity.
    pub const NULL: ObjectId = ObjectId(0);

    pub(crate) const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw id value.
    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-entity modification counter, bumped (wrapping) on every mutation.
pub type Version = u32;

/// Entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Sprite,
    Layer,
    Cel,
    Image,
    Frame,
    Tag,
    Slice,
    Palette,
}

/// Mints ids for one document and tracks which of them are live.
///
/// An id is *live* while its entity is in the graph. Detached and suspended
/// entities keep their ids reserved: they are neither live nor mintable.
#[derive(Debug, Clone)]
pub struct IdRegistry {
    next: u32,
    live: HashSet<ObjectId>,
}

impl IdRegistry {
    pub fn new() -> Self {
        Self {
            next: 1,
            live: HashSet::new(),
        }
    }

    /// Registry whose ids `1..=count` are already handed out.
    pub(crate) fn with_minted(count: u32) -> Self {
        Self {
            next: count.saturating_add(1),
            live: HashSet::new(),
        }
    }

    /// Returns a fresh id. Ids are handed out monotonically and never wrap.
    pub fn mint(&mut self) -> GraphResult<ObjectId> {
        let next = self.next.checked_add(1).ok_or(GraphError::IdsExhausted)?;
        let id = ObjectId(self.next);
        self.next = next;
        Ok(id)
    }

    /// Returns `true` if `id` was handed out by [`mint`](Self::mint).
    pub fn is_minted(&self, id: ObjectId) -> bool {
        !id.is_null() && id.0 < self.next
    }

    /// Returns `true` if the entity `id` is currently in the graph.
    pub fn is_live(&self, id: ObjectId) -> bool {
        self.live.contains(&id)
    }

    /// Number of live ids.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub(crate) fn mark_live(&mut self, id: ObjectId) {
        self.live.insert(id);
    }

    pub(crate) fn mark_detached(&mut self, id: ObjectId) {
        self.live.remove(&id);
    }
}

impl Default for IdRegistry {
    fn default() -> Self {
        Self::new()
    }
}
