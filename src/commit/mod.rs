//! Batch commit of staged intents.
//!
//! Drains a ledger snapshot into real store mutations as one logical batch:
//! deletions as one grouped request, favorites as another, both in flight
//! concurrently. The underlying store only offers per-group success/failure,
//! so batch semantics are synthesized here: clear the committed entries on
//! full success, restore the pre-commit snapshot on any failure.
//!
//! Rollback asymmetry, inherited from the real world: a delete group that
//! partially succeeded cannot be undone; assets removed from the external
//! store stay removed, and restoring the ledger only restores local intent
//! bookkeeping. A succeeded favorite group *is* reversible, so the
//! coordinator compensates it by reissuing an unfavorite for the assets it
//! just favorited. Callers must treat [`CommitError::GroupFailed`]
//! accordingly.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::asset_store::{AssetId, AssetStoreClient, AuthorizationStatus, StoreError};
use crate::config::CommitSettings;
use crate::library::LibrarySyncEngine;
use crate::staging::StagingLedger;

/// Which grouped mutation a commit failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitGroup {
    Deletes,
    Favorites,
}

impl fmt::Display for CommitGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitGroup::Deletes => f.write_str("delete"),
            CommitGroup::Favorites => f.write_str("favorite"),
        }
    }
}

/// Precheck failures. No mutation has been attempted when one of these is
/// returned; the batch is fully recoverable by retrying later.
#[derive(Debug, Error)]
pub enum ReadinessError {
    #[error("library access not authorized (status {0:?})")]
    NotAuthorized(AuthorizationStatus),

    #[error("free storage too low: {available} bytes available, {required} required")]
    LowStorage { available: u64, required: u64 },

    #[error("storage probe failed: {0}")]
    Probe(#[from] StoreError),
}

/// Commit failures surfaced to the caller.
#[derive(Debug, Error)]
pub enum CommitError {
    #[error("system not ready for commit: {0}")]
    NotReady(#[from] ReadinessError),

    #[error("a commit is already in progress")]
    InProgress,

    /// One of the two mutation groups failed. The ledger has been restored
    /// to the pre-commit snapshot. `compensated_favorites` reports whether
    /// a succeeded favorite group was rolled back in the store; a partially
    /// applied delete group is never rolled back.
    #[error("{group} group failed: {source}")]
    GroupFailed {
        group: CommitGroup,
        source: StoreError,
        compensated_favorites: bool,
    },
}

/// Coordinator state, published for UI consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitState {
    Idle,
    Precheck,
    Committing,
    Succeeded,
    Failed,
}

/// Outcome of a successful commit.
#[derive(Debug, Clone, Serialize)]
pub struct CommitReport {
    pub deleted: usize,
    pub favorited: usize,
}

/// Turns staged intents into store mutations with all-or-nothing visibility
/// on the ledger.
pub struct BatchCommitCoordinator {
    store: Arc<dyn AssetStoreClient>,
    ledger: Arc<StagingLedger>,
    settings: CommitSettings,
    state_tx: watch::Sender<CommitState>,
    in_flight: AtomicBool,
    sync: Option<Arc<LibrarySyncEngine>>,
}

impl BatchCommitCoordinator {
    pub fn new(
        store: Arc<dyn AssetStoreClient>,
        ledger: Arc<StagingLedger>,
        settings: CommitSettings,
    ) -> Self {
        let (state_tx, _) = watch::channel(CommitState::Idle);
        Self {
            store,
            ledger,
            settings,
            state_tx,
            in_flight: AtomicBool::new(false),
            sync: None,
        }
    }

    /// Have a successful commit request a library re-sync.
    pub fn with_sync_engine(mut self, engine: Arc<LibrarySyncEngine>) -> Self {
        self.sync = Some(engine);
        self
    }

    pub fn state(&self) -> watch::Receiver<CommitState> {
        self.state_tx.subscribe()
    }

    pub fn current_state(&self) -> CommitState {
        *self.state_tx.borrow()
    }

    /// Commit everything staged as of the snapshot taken at the start of
    /// this call. Intents staged while the commit runs are deferred to the
    /// next commit, never merged into this one.
    pub async fn commit_batch(&self) -> Result<CommitReport, CommitError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(CommitError::InProgress);
        }
        let result = self.run_commit().await;
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    async fn run_commit(&self) -> Result<CommitReport, CommitError> {
        self.state_tx.send_replace(CommitState::Precheck);
        if let Err(e) = self.precheck().await {
            self.state_tx.send_replace(CommitState::Failed);
            return Err(e.into());
        }

        // Snapshot first: concurrent staging during the commit cannot
        // corrupt the in-flight batch.
        let snapshot = self.ledger.snapshot();
        if snapshot.is_empty() {
            debug!("commit requested with empty ledger, nothing to do");
            self.state_tx.send_replace(CommitState::Succeeded);
            return Ok(CommitReport {
                deleted: 0,
                favorited: 0,
            });
        }

        self.state_tx.send_replace(CommitState::Committing);
        let delete_ids: Vec<AssetId> = snapshot.delete_ids().iter().cloned().collect();
        let favorite_ids: Vec<AssetId> = snapshot.favorite_ids().iter().cloned().collect();

        let delete_group = async {
            if delete_ids.is_empty() {
                Ok(())
            } else {
                self.store.delete_assets(&delete_ids).await
            }
        };
        let favorite_group = async {
            if favorite_ids.is_empty() {
                Ok(())
            } else {
                self.store.set_favorite_batch(&favorite_ids, true).await
            }
        };
        // Both groups start without waiting for each other.
        let (delete_result, favorite_result) = tokio::join!(delete_group, favorite_group);

        if delete_result.is_ok() && favorite_result.is_ok() {
            self.ledger.clear_committed(&snapshot);
            self.state_tx.send_replace(CommitState::Succeeded);
            info!(
                "commit succeeded: {} deleted, {} favorited",
                delete_ids.len(),
                favorite_ids.len()
            );
            if let Some(engine) = &self.sync {
                engine.start_sync();
            }
            return Ok(CommitReport {
                deleted: delete_ids.len(),
                favorited: favorite_ids.len(),
            });
        }

        // Failure path. Favorites are the only reversible group: if they
        // landed while the batch as a whole failed, unfavorite them again.
        let compensated_favorites = if delete_result.is_err()
            && favorite_result.is_ok()
            && !favorite_ids.is_empty()
        {
            match self.store.set_favorite_batch(&favorite_ids, false).await {
                Ok(()) => {
                    debug!("compensated {} favorites", favorite_ids.len());
                    true
                }
                Err(e) => {
                    warn!("favorite compensation failed: {}", e);
                    false
                }
            }
        } else {
            false
        };

        self.ledger.restore(snapshot);
        self.state_tx.send_replace(CommitState::Failed);

        let (group, source) = match (delete_result, favorite_result) {
            (Err(delete_err), Err(favorite_err)) => {
                warn!("favorite group failed alongside deletes: {}", favorite_err);
                (CommitGroup::Deletes, delete_err)
            }
            (Err(delete_err), Ok(())) => (CommitGroup::Deletes, delete_err),
            (Ok(()), Err(favorite_err)) => (CommitGroup::Favorites, favorite_err),
            (Ok(()), Ok(())) => unreachable!("failure path with both groups ok"),
        };
        warn!("commit failed, ledger restored: {} group: {}", group, source);
        Err(CommitError::GroupFailed {
            group,
            source,
            compensated_favorites,
        })
    }

    /// System readiness: authorization and free storage, checked before any
    /// mutation so a failed precheck can have no partial side effects.
    async fn precheck(&self) -> Result<(), ReadinessError> {
        let status = self.store.check_authorization();
        if status != AuthorizationStatus::Authorized {
            return Err(ReadinessError::NotAuthorized(status));
        }
        let available = self.store.free_storage_bytes().await?;
        let required = self.settings.min_free_storage_bytes;
        if available < required {
            return Err(ReadinessError::LowStorage {
                available,
                required,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset_store::{
        Asset, InjectedFailure, MediaKind, MemoryAssetStore, PixelSize,
    };

    fn id(n: usize) -> AssetId {
        AssetId::new(format!("asset-{n}"))
    }

    fn seeded_store(count: usize) -> Arc<MemoryAssetStore> {
        let store = Arc::new(MemoryAssetStore::new());
        let assets = (0..count)
            .map(|n| Asset {
                id: id(n),
                kind: MediaKind::Image,
                pixel_size: PixelSize::new(4000, 3000),
                creation_time: None,
                is_favorite: false,
                screenshot_flag: None,
            })
            .collect();
        store.seed_assets(assets);
        store
    }

    fn coordinator(
        store: &Arc<MemoryAssetStore>,
        ledger: &Arc<StagingLedger>,
    ) -> BatchCommitCoordinator {
        BatchCommitCoordinator::new(
            Arc::clone(store) as Arc<dyn AssetStoreClient>,
            Arc::clone(ledger),
            CommitSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_successful_commit_applies_and_clears() {
        let store = seeded_store(10);
        let ledger = Arc::new(StagingLedger::new());
        for n in 0..5 {
            ledger.mark_delete(id(n));
        }
        for n in 5..8 {
            ledger.mark_favorite(id(n));
        }

        let coordinator = coordinator(&store, &ledger);
        let report = coordinator.commit_batch().await.unwrap();

        assert_eq!(report.deleted, 5);
        assert_eq!(report.favorited, 3);
        assert!(ledger.is_empty());
        assert_eq!(store.asset_count(), 5);
        assert_eq!(store.persisted_favorite_ids().len(), 3);
        assert_eq!(coordinator.current_state(), CommitState::Succeeded);
    }

    #[tokio::test]
    async fn test_partial_delete_failure_restores_ledger() {
        let store = seeded_store(10);
        let ledger = Arc::new(StagingLedger::new());
        for n in 0..5 {
            ledger.mark_delete(id(n));
        }
        store.inject_delete_failure(InjectedFailure::AfterApplying(2));

        let coordinator = coordinator(&store, &ledger);
        let err = coordinator.commit_batch().await.unwrap_err();

        match err {
            CommitError::GroupFailed {
                group,
                compensated_favorites,
                ..
            } => {
                assert_eq!(group, CommitGroup::Deletes);
                assert!(!compensated_favorites);
            }
            other => panic!("unexpected error: {other}"),
        }

        // Local intent bookkeeping is fully restored...
        assert_eq!(ledger.delete_count(), 5);
        for n in 0..5 {
            assert!(ledger.is_marked_delete(&id(n)));
        }
        // ...but the two externally applied deletes are gone for good.
        assert_eq!(store.asset_count(), 8);
        assert_eq!(coordinator.current_state(), CommitState::Failed);
    }

    #[tokio::test]
    async fn test_delete_failure_compensates_succeeded_favorites() {
        let store = seeded_store(10);
        let ledger = Arc::new(StagingLedger::new());
        ledger.mark_delete(id(0));
        ledger.mark_favorite(id(5));
        ledger.mark_favorite(id(6));
        store.inject_delete_failure(InjectedFailure::AfterApplying(0));

        let coordinator = coordinator(&store, &ledger);
        let err = coordinator.commit_batch().await.unwrap_err();

        match err {
            CommitError::GroupFailed {
                group,
                compensated_favorites,
                ..
            } => {
                assert_eq!(group, CommitGroup::Deletes);
                assert!(compensated_favorites);
            }
            other => panic!("unexpected error: {other}"),
        }
        // The favorites that landed were rolled back in the store.
        assert!(store.persisted_favorite_ids().is_empty());
        assert_eq!(ledger.favorite_count(), 2);
    }

    #[tokio::test]
    async fn test_favorite_failure_identifies_favorite_group() {
        let store = seeded_store(10);
        let ledger = Arc::new(StagingLedger::new());
        ledger.mark_favorite(id(1));
        store.inject_favorite_failure(InjectedFailure::AfterApplying(0));

        let coordinator = coordinator(&store, &ledger);
        let err = coordinator.commit_batch().await.unwrap_err();

        match err {
            CommitError::GroupFailed { group, .. } => {
                assert_eq!(group, CommitGroup::Favorites)
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(ledger.is_marked_favorite(&id(1)));
    }

    #[tokio::test]
    async fn test_precheck_rejects_low_storage_before_any_mutation() {
        let store = seeded_store(10);
        store.set_free_storage(10 * 1024 * 1024);
        let ledger = Arc::new(StagingLedger::new());
        ledger.mark_delete(id(0));

        let coordinator = coordinator(&store, &ledger);
        let err = coordinator.commit_batch().await.unwrap_err();

        assert!(matches!(
            err,
            CommitError::NotReady(ReadinessError::LowStorage { .. })
        ));
        // No side effects at all.
        assert_eq!(store.asset_count(), 10);
        assert_eq!(ledger.delete_count(), 1);
    }

    #[tokio::test]
    async fn test_precheck_rejects_missing_authorization() {
        let store = seeded_store(10);
        store.set_authorization(AuthorizationStatus::Denied);
        let ledger = Arc::new(StagingLedger::new());
        ledger.mark_delete(id(0));

        let coordinator = coordinator(&store, &ledger);
        let err = coordinator.commit_batch().await.unwrap_err();
        assert!(matches!(
            err,
            CommitError::NotReady(ReadinessError::NotAuthorized(_))
        ));
        assert_eq!(store.asset_count(), 10);
    }

    #[tokio::test]
    async fn test_empty_ledger_commit_is_a_noop_success() {
        let store = seeded_store(3);
        let ledger = Arc::new(StagingLedger::new());

        let coordinator = coordinator(&store, &ledger);
        let report = coordinator.commit_batch().await.unwrap();
        assert_eq!(report.deleted, 0);
        assert_eq!(report.favorited, 0);
        assert_eq!(store.asset_count(), 3);
    }
}
