//! Container index.
//!
//! The store only maps keys to entries. Per-container state is guarded by
//! each entry's own lock, so lookups never serialize unrelated containers.

use std::sync::Arc;

use corral_common::{ContainerId, CorralError, CorralResult};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::record::ContainerEntry;

/// Minimum length of an ID prefix accepted by lookups.
const MIN_PREFIX_LENGTH: usize = 3;

/// Index of containers by ID and by name.
#[derive(Debug, Default)]
pub struct StateStore {
    by_id: DashMap<ContainerId, Arc<ContainerEntry>>,
    by_name: DashMap<String, ContainerId>,
}

impl StateStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of containers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Returns true if there are no containers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub(crate) fn insert(&self, entry: Arc<ContainerEntry>) -> CorralResult<()> {
        match self.by_name.entry(entry.name.as_str().to_string()) {
            Entry::Occupied(_) => Err(CorralError::NameInUse {
                name: entry.name.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(entry.id.clone());
                self.by_id.insert(entry.id.clone(), entry);
                Ok(())
            }
        }
    }

    /// Resolve an ID, a name or a unique ID prefix.
    pub(crate) fn get(&self, key: &str) -> CorralResult<Arc<ContainerEntry>> {
        if let Some(entry) = self.by_id.get(key) {
            return Ok(Arc::clone(entry.value()));
        }

        let by_name = self.by_name.get(key).map(|id| id.value().clone());
        if let Some(entry) = by_name.and_then(|id| self.by_id.get(&id)) {
            return Ok(Arc::clone(entry.value()));
        }

        self.get_by_prefix(key)
            .ok_or_else(|| CorralError::not_found(key))
    }

    fn get_by_prefix(&self, prefix: &str) -> Option<Arc<ContainerEntry>> {
        if prefix.len() < MIN_PREFIX_LENGTH || !prefix.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }

        let mut matches = self
            .by_id
            .iter()
            .filter(|e| e.key().as_str().starts_with(prefix));
        let first = matches.next().map(|e| Arc::clone(e.value()));
        // Ambiguous prefixes resolve to nothing
        if matches.next().is_some() {
            tracing::debug!(prefix, "ambiguous container ID prefix");
            return None;
        }
        first
    }

    pub(crate) fn remove(&self, id: &ContainerId) -> Option<Arc<ContainerEntry>> {
        let (_, entry) = self.by_id.remove(id)?;
        self.by_name
            .remove_if(entry.name.as_str(), |_, owner| owner == id);
        Some(entry)
    }

    pub(crate) fn entries(&self) -> Vec<Arc<ContainerEntry>> {
        let mut entries: Vec<_> = self.by_id.iter().map(|e| Arc::clone(e.value())).collect();
        entries.sort_by_key(|e| e.created_at);
        entries
    }
}
