//! Staged user intents.
//!
//! The ledger accumulates not-yet-committed triage decisions: assets marked
//! for deletion and assets marked for favoriting. Nothing here touches the
//! external store; the commit coordinator drains the ledger into real
//! mutations.
//!
//! Delete and favorite candidates are independent sets tracking independent
//! human decisions: marking an asset as a favorite does not unmark it for
//! deletion. Within one set, set semantics hold (no duplicates).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::RwLock;

use crate::asset_store::AssetId;

#[derive(Debug, Default, Clone)]
struct LedgerSets {
    delete: HashSet<AssetId>,
    favorite: HashSet<AssetId>,
}

/// Immutable point-in-time copy of both intent sets, usable for rollback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    delete: HashSet<AssetId>,
    favorite: HashSet<AssetId>,
}

impl LedgerSnapshot {
    pub fn delete_ids(&self) -> &HashSet<AssetId> {
        &self.delete
    }

    pub fn favorite_ids(&self) -> &HashSet<AssetId> {
        &self.favorite
    }

    pub fn is_empty(&self) -> bool {
        self.delete.is_empty() && self.favorite.is_empty()
    }
}

/// Thread-safe staging area for delete/favorite intents.
///
/// Writes are serialized (single writer at a time); reads may run
/// concurrently with each other and always observe a consistent pre- or
/// post-write state. Mutation frequency is user-gesture-rate, so a
/// reader/writer lock is plenty.
#[derive(Debug, Default)]
pub struct StagingLedger {
    sets: RwLock<LedgerSets>,
}

impl StagingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an asset for deletion. Idempotent.
    pub fn mark_delete(&self, id: AssetId) {
        self.sets.write().unwrap().delete.insert(id);
    }

    /// Remove an asset from the delete candidates. Idempotent.
    pub fn unmark_delete(&self, id: &AssetId) {
        self.sets.write().unwrap().delete.remove(id);
    }

    /// Stage an asset for favoriting. Idempotent; does not touch the delete
    /// set.
    pub fn mark_favorite(&self, id: AssetId) {
        self.sets.write().unwrap().favorite.insert(id);
    }

    /// Remove an asset from the favorite candidates. Idempotent.
    pub fn unmark_favorite(&self, id: &AssetId) {
        self.sets.write().unwrap().favorite.remove(id);
    }

    pub fn is_marked_delete(&self, id: &AssetId) -> bool {
        self.sets.read().unwrap().delete.contains(id)
    }

    pub fn is_marked_favorite(&self, id: &AssetId) -> bool {
        self.sets.read().unwrap().favorite.contains(id)
    }

    pub fn delete_count(&self) -> usize {
        self.sets.read().unwrap().delete.len()
    }

    pub fn favorite_count(&self) -> usize {
        self.sets.read().unwrap().favorite.len()
    }

    pub fn is_empty(&self) -> bool {
        let sets = self.sets.read().unwrap();
        sets.delete.is_empty() && sets.favorite.is_empty()
    }

    /// Immutable copy of both sets as of this instant.
    pub fn snapshot(&self) -> LedgerSnapshot {
        let sets = self.sets.read().unwrap();
        LedgerSnapshot {
            delete: sets.delete.clone(),
            favorite: sets.favorite.clone(),
        }
    }

    /// Atomically replace both sets with a prior snapshot.
    pub fn restore(&self, snapshot: LedgerSnapshot) {
        let mut sets = self.sets.write().unwrap();
        sets.delete = snapshot.delete;
        sets.favorite = snapshot.favorite;
    }

    /// Atomically empty both sets.
    pub fn clear(&self) {
        let mut sets = self.sets.write().unwrap();
        sets.delete.clear();
        sets.favorite.clear();
    }

    /// Remove exactly the snapshot's members from both sets. Entries staged
    /// after the snapshot was taken survive.
    pub fn clear_committed(&self, snapshot: &LedgerSnapshot) {
        let mut sets = self.sets.write().unwrap();
        for id in &snapshot.delete {
            sets.delete.remove(id);
        }
        for id in &snapshot.favorite {
            sets.favorite.remove(id);
        }
    }
}
