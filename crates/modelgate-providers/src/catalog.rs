//! Model catalog — the capability-indexed set of models one provider knows.
//!
//! The catalog is a single immutable snapshot behind a lock. Every write
//! builds a new snapshot and swaps it in whole, so a reader sees either the
//! old entries or the new ones, never a mix.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use modelgate_core::types::{CapabilityTag, ModelDescriptor};

type Snapshot = BTreeMap<String, ModelDescriptor>;

/// Mapping from model id to [`ModelDescriptor`] with derived capability and
/// pricing views.
///
/// Empty until the first successful discovery; afterwards a snapshot of the
/// last committed pass.
#[derive(Debug, Default)]
pub struct ModelCatalog {
    snapshot: RwLock<Arc<Snapshot>>,
}

impl ModelCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.read())
    }

    /// Replace every entry with `descriptors`. Later duplicates win.
    pub fn replace_all(&self, descriptors: impl IntoIterator<Item = ModelDescriptor>) {
        let next: Snapshot = descriptors
            .into_iter()
            .map(|model| (model.id.clone(), model))
            .collect();
        *self.snapshot.write() = Arc::new(next);
    }

    /// Insert or replace `descriptors` by id, keeping other entries.
    ///
    /// Applied to a copy and swapped in as one step.
    pub fn upsert_all(&self, descriptors: impl IntoIterator<Item = ModelDescriptor>) {
        let mut guard = self.snapshot.write();
        let mut next: Snapshot = (**guard).clone();
        for model in descriptors {
            next.insert(model.id.clone(), model);
        }
        *guard = Arc::new(next);
    }

    /// Look up one model.
    pub fn by_id(&self, id: &str) -> Option<ModelDescriptor> {
        self.snapshot.read().get(id).cloned()
    }

    /// Models whose capability set contains `tag`, ordered by id.
    pub fn by_capability(&self, tag: CapabilityTag) -> Vec<ModelDescriptor> {
        self.current()
            .values()
            .filter(|model| model.supports(tag))
            .cloned()
            .collect()
    }

    /// Every model, ordered by id.
    pub fn all(&self) -> Vec<ModelDescriptor> {
        self.current().values().cloned().collect()
    }

    /// Models with known, zero input and output cost.
    pub fn free_models(&self) -> Vec<ModelDescriptor> {
        self.current()
            .values()
            .filter(|model| model.is_free())
            .cloned()
            .collect()
    }

    /// Whether `id` is known and free. Unknown ids are not free.
    pub fn is_free(&self, id: &str) -> bool {
        self.snapshot.read().get(id).is_some_and(ModelDescriptor::is_free)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.snapshot.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.snapshot.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.read().is_empty()
    }
}
