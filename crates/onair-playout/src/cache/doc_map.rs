//! Snapshot-diffing document containers.
//!
//! Both containers remember the state they were loaded with. At commit
//! time they emit only what actually changed: updated or inserted
//! documents as upserts, vanished ones as deletes. Iteration order is
//! deterministic (`BTreeMap` keyed by document id).

use std::collections::BTreeMap;

use crate::model::Document;
use crate::store::DocChanges;

/// An identity-keyed working set of one document collection.
#[derive(Debug, Clone)]
pub struct DocMap<D: Document> {
    docs: BTreeMap<D::Id, D>,
    snapshot: BTreeMap<D::Id, D>,
}

impl<D: Document> Default for DocMap<D> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<D: Document> DocMap<D> {
    /// Creates an empty map with an empty snapshot.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            docs: BTreeMap::new(),
            snapshot: BTreeMap::new(),
        }
    }

    /// Creates a map from loaded documents. The snapshot is the loaded
    /// state; the diff at commit time is relative to it.
    #[must_use]
    pub fn from_docs(docs: Vec<D>) -> Self {
        let docs: BTreeMap<D::Id, D> = docs.into_iter().map(|doc| (doc.doc_id(), doc)).collect();
        Self {
            snapshot: docs.clone(),
            docs,
        }
    }

    /// Looks up a document by id.
    #[must_use]
    pub fn get(&self, id: D::Id) -> Option<&D> {
        self.docs.get(&id)
    }

    /// Looks up a document for mutation.
    #[must_use]
    pub fn get_mut(&mut self, id: D::Id) -> Option<&mut D> {
        self.docs.get_mut(&id)
    }

    /// Returns true when a document with this id is present.
    #[must_use]
    pub fn contains(&self, id: D::Id) -> bool {
        self.docs.contains_key(&id)
    }

    /// Inserts or replaces a document.
    pub fn insert(&mut self, doc: D) {
        self.docs.insert(doc.doc_id(), doc);
    }

    /// Removes a document. Emitted as a delete at commit time when it
    /// existed in the snapshot.
    pub fn remove(&mut self, id: D::Id) -> Option<D> {
        self.docs.remove(&id)
    }

    /// Mutates a document in place. Returns false when absent.
    pub fn update<F>(&mut self, id: D::Id, f: F) -> bool
    where
        F: FnOnce(&mut D),
    {
        match self.docs.get_mut(&id) {
            Some(doc) => {
                f(doc);
                true
            }
            None => false,
        }
    }

    /// Iterates documents in id order.
    pub fn values(&self) -> impl Iterator<Item = &D> {
        self.docs.values()
    }

    /// Iterates documents mutably in id order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut D> {
        self.docs.values_mut()
    }

    /// Number of documents in the working set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Returns true when the working set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Returns true when the working set differs from its snapshot.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.docs != self.snapshot
    }

    /// Consumes the map into the changes to persist.
    #[must_use]
    pub fn into_changes(self) -> DocChanges<D> {
        let Self { docs, snapshot } = self;
        let mut changes = DocChanges::default();

        for id in snapshot.keys() {
            if !docs.contains_key(id) {
                changes.deletes.push(*id);
            }
        }
        for (id, doc) in docs {
            match snapshot.get(&id) {
                Some(before) if *before == doc => {}
                _ => changes.upserts.push(doc),
            }
        }

        changes
    }
}

/// A working copy of a single document, with the same diff semantics
/// as [`DocMap`].
#[derive(Debug, Clone)]
pub struct DocCell<D: Document> {
    doc: Option<D>,
    snapshot: Option<D>,
}

impl<D: Document> Default for DocCell<D> {
    fn default() -> Self {
        Self {
            doc: None,
            snapshot: None,
        }
    }
}

impl<D: Document> DocCell<D> {
    /// Creates a cell from the loaded document (or its absence).
    #[must_use]
    pub fn loaded(doc: Option<D>) -> Self {
        Self {
            snapshot: doc.clone(),
            doc,
        }
    }

    /// The current working copy.
    #[must_use]
    pub fn get(&self) -> Option<&D> {
        self.doc.as_ref()
    }

    /// The working copy for mutation.
    #[must_use]
    pub fn get_mut(&mut self) -> Option<&mut D> {
        self.doc.as_mut()
    }

    /// Replaces the working copy.
    pub fn set(&mut self, doc: D) {
        self.doc = Some(doc);
    }

    /// Clears the working copy. Emitted as a delete at commit time when
    /// the document existed in the snapshot.
    pub fn clear(&mut self) {
        self.doc = None;
    }

    /// Consumes the cell into the changes to persist.
    #[must_use]
    pub fn into_changes(self) -> DocChanges<D> {
        let mut changes = DocChanges::default();
        match (self.snapshot, self.doc) {
            (None, None) => {}
            (Some(before), Some(after)) if before == after => {}
            (_, Some(after)) => changes.upserts.push(after),
            (Some(before), None) => changes.deletes.push(before.doc_id()),
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Rundown, Timeline, TimelineVersions};
    use onair_core::id::{PlaylistId, RundownId, ShowStyleId, StudioId};

    fn rundown(playlist_id: PlaylistId) -> Rundown {
        Rundown::new(
            RundownId::generate(),
            playlist_id,
            ShowStyleId::generate(),
            "Rundown",
        )
    }

    #[test]
    fn unchanged_docs_produce_no_changes() {
        let playlist_id = PlaylistId::generate();
        let map = DocMap::from_docs(vec![rundown(playlist_id), rundown(playlist_id)]);

        assert!(!map.is_dirty());
        let changes = map.into_changes();
        assert!(changes.upserts.is_empty());
        assert!(changes.deletes.is_empty());
    }

    #[test]
    fn mutation_produces_one_upsert() {
        let playlist_id = PlaylistId::generate();
        let unchanged = rundown(playlist_id);
        let mutated = rundown(playlist_id);
        let mutated_id = mutated.id;
        let mut map = DocMap::from_docs(vec![unchanged, mutated]);

        assert!(map.update(mutated_id, |r| r.name = "Renamed".into()));
        assert!(map.is_dirty());

        let changes = map.into_changes();
        assert_eq!(changes.upserts.len(), 1);
        assert_eq!(changes.upserts[0].id, mutated_id);
        assert_eq!(changes.upserts[0].name, "Renamed");
        assert!(changes.deletes.is_empty());
    }

    #[test]
    fn insert_and_remove_produce_upsert_and_delete() {
        let playlist_id = PlaylistId::generate();
        let removed = rundown(playlist_id);
        let removed_id = removed.id;
        let mut map = DocMap::from_docs(vec![removed]);

        let inserted = rundown(playlist_id);
        let inserted_id = inserted.id;
        map.insert(inserted);
        map.remove(removed_id);

        let changes = map.into_changes();
        assert_eq!(changes.upserts.len(), 1);
        assert_eq!(changes.upserts[0].id, inserted_id);
        assert_eq!(changes.deletes, vec![removed_id]);
    }

    #[test]
    fn insert_then_remove_of_a_fresh_doc_is_a_no_op() {
        let playlist_id = PlaylistId::generate();
        let mut map: DocMap<Rundown> = DocMap::empty();

        let fresh = rundown(playlist_id);
        let fresh_id = fresh.id;
        map.insert(fresh);
        map.remove(fresh_id);

        let changes = map.into_changes();
        assert!(changes.upserts.is_empty());
        assert!(changes.deletes.is_empty());
    }

    #[test]
    fn cell_tracks_set_and_clear() {
        let studio_id = StudioId::generate();
        let versions = TimelineVersions {
            core: "0".into(),
            hook_id: None,
            hook_version: None,
            studio_config_hash: "h".into(),
        };

        let mut cell: DocCell<Timeline> = DocCell::loaded(None);
        cell.set(Timeline::new(studio_id, Vec::new(), versions.clone()));
        let changes = cell.into_changes();
        assert_eq!(changes.upserts.len(), 1);
        assert!(changes.deletes.is_empty());

        let existing = Timeline::new(studio_id, Vec::new(), versions);
        let mut cell = DocCell::loaded(Some(existing));
        cell.clear();
        let changes = cell.into_changes();
        assert!(changes.upserts.is_empty());
        assert_eq!(changes.deletes, vec![studio_id]);
    }

    #[test]
    fn untouched_cell_produces_no_changes() {
        let studio_id = StudioId::generate();
        let timeline = Timeline::new(
            studio_id,
            Vec::new(),
            TimelineVersions {
                core: "0".into(),
                hook_id: None,
                hook_version: None,
                studio_config_hash: "h".into(),
            },
        );
        let cell = DocCell::loaded(Some(timeline));
        let changes = cell.into_changes();
        assert!(changes.upserts.is_empty());
        assert!(changes.deletes.is_empty());
    }
}
