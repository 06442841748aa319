//! Replica store using ArcSwap for copy-on-write publishing.
//!
//! Readers get an `Arc<Base>` that stays valid and unchanged for as long as
//! they hold it. Writers take a private copy with
//! [`load_for_update`](ReplicaStore::load_for_update), apply a whole batch to
//! it, then [`publish`](ReplicaStore::publish) the result in one atomic swap.
//! Nothing a reader can load is ever half way through a batch.

use std::collections::BTreeSet;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::RwLock;

use crate::model::{Base, FieldRef};

/// Holds the single, possibly absent, replica of a base.
#[derive(Debug, Default)]
pub struct ReplicaStore {
    /// Published replica
    current: ArcSwapOption<Base>,
    /// Fields whose type changed without a fresh snapshot
    stale_fields: RwLock<BTreeSet<FieldRef>>,
}

impl ReplicaStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the published replica, if any.
    ///
    /// # Performance
    /// - O(1), no allocation
    pub fn get(&self) -> Option<Arc<Base>> {
        self.current.load_full()
    }

    /// Returns `true` if a replica is published.
    pub fn is_present(&self) -> bool {
        self.current.load().is_some()
    }

    /// Atomically installs a full snapshot.
    ///
    /// A snapshot carries complete field options, so the stale set is cleared.
    pub fn replace(&self, base: Base) {
        self.current.store(Some(Arc::new(base)));
        self.stale_fields.write().clear();
    }

    /// Drops the replica.
    pub fn clear(&self) {
        self.current.store(None);
        self.stale_fields.write().clear();
    }

    /// Returns a private copy of the replica for batch mutation.
    ///
    /// # Performance
    /// - O(n) in the size of the replica: a deep clone per accepted batch,
    ///   however few changes the batch carries
    pub fn load_for_update(&self) -> Option<Base> {
        self.current.load_full().map(|base| (*base).clone())
    }

    /// Atomically publishes the result of a batch.
    ///
    /// Stale marks on fields that no longer exist are dropped.
    pub fn publish(&self, replica: Option<Base>) {
        match replica {
            Some(base) => {
                self.stale_fields
                    .write()
                    .retain(|field_ref| base.field(field_ref).is_some());
                self.current.store(Some(Arc::new(base)));
            }
            None => self.clear(),
        }
    }

    /// Records that a field's type-specific options may be out of date.
    ///
    /// # Returns
    /// `true` if the field was not already marked.
    pub fn mark_stale(&self, field_ref: FieldRef) -> bool {
        self.stale_fields.write().insert(field_ref)
    }

    /// Returns `true` if the field is marked stale.
    pub fn is_stale(&self, field_ref: &FieldRef) -> bool {
        self.stale_fields.read().contains(field_ref)
    }

    /// Returns all stale fields in `(table, field)` order.
    pub fn stale_fields(&self) -> Vec<FieldRef> {
        self.stale_fields.read().iter().cloned().collect()
    }
}
