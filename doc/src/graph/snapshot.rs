use std::collections::BTreeMap;

use super::id::ObjectId;
use super::object::Object;

/// Cloned copy of every live entity of a graph.
///
/// Equality (`==`) compares versions too; [`same_content`](Self::same_content)
/// ignores them, which is what undo/redo round trips are checked against
/// since restoring an entity bumps its version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphSnapshot {
    sprite: ObjectId,
    objects: BTreeMap<ObjectId, Object>,
}

impl GraphSnapshot {
    /// An empty snapshot of the graph rooted at `sprite`, filled with
    /// [`insert`](Self::insert).
    pub fn new(sprite: ObjectId) -> Self {
        Self {
            sprite,
            objects: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, object: Object) {
        self.objects.insert(object.id, object);
    }

    pub fn sprite(&self) -> ObjectId {
        self.sprite
    }

    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(&id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Entities in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Object> {
        self.objects.values()
    }

    /// Compares ids and payloads, ignoring versions.
    pub fn same_content(&self, other: &GraphSnapshot) -> bool {
        self.sprite == other.sprite
            && self.objects.len() == other.objects.len()
            && self
                .objects
                .iter()
                .zip(other.objects.iter())
                .all(|((a_id, a), (b_id, b))| a_id == b_id && a.data == b.data)
    }

    /// Ids whose payload differs between the two snapshots, or that exist in
    /// only one of them. Handy in assertion messages.
    pub fn diff(&self, other: &GraphSnapshot) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self
            .objects
            .keys()
            .chain(other.objects.keys())
            .copied()
            .filter(|id| match (self.objects.get(id), other.objects.get(id)) {
                (Some(a), Some(b)) => a.data != b.data,
                _ => true,
            })
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}
