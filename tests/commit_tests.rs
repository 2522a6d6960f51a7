//! End-to-end tests for staging and batch commit through the triage facade.

mod common;

use common::{asset_id, init_tracing, seeded_store, store_client, test_settings, wait_until};
use std::sync::Arc;

use photosweep::asset_store::{AuthorizationStatus, InjectedFailure, MemoryAssetStore};
use photosweep::commit::{CommitError, CommitGroup, ReadinessError};
use photosweep::library::SyncStatus;
use photosweep::TriageManager;

fn manager_for(store: &Arc<MemoryAssetStore>) -> Arc<TriageManager> {
    TriageManager::new(store_client(store), test_settings())
}

async fn synced_manager(store: &Arc<MemoryAssetStore>) -> Arc<TriageManager> {
    let manager = manager_for(store);
    let mut status = manager.sync_status();
    manager.start();
    wait_until(&mut status, |s| *s == SyncStatus::Ready).await;
    manager
}

// ============================================================================
// Success path
// ============================================================================

#[tokio::test]
async fn test_stage_five_deletes_three_favorites_and_commit() {
    init_tracing();
    let store = seeded_store(20);
    let manager = synced_manager(&store).await;

    for n in 0..5 {
        manager.mark_delete(asset_id(n));
    }
    for n in 10..13 {
        manager.mark_favorite(asset_id(n));
    }

    let report = manager.commit_batch().await.unwrap();
    assert_eq!(report.deleted, 5);
    assert_eq!(report.favorited, 3);

    // Ledger is empty, the store reflects 5 fewer assets and 3 favorites.
    let stats = manager.organize_stats();
    assert_eq!(stats.staged_deletes, 0);
    assert_eq!(stats.staged_favorites, 0);
    assert_eq!(store.asset_count(), 15);
    assert_eq!(store.persisted_favorite_ids().len(), 3);

    // The commit triggers a resync, so the published library catches up.
    let mut state = manager.library();
    wait_until(&mut state, |s| s.total_count() == 15).await;

    manager.shutdown();
}

#[tokio::test]
async fn test_unmark_before_commit_keeps_the_asset() {
    let store = seeded_store(5);
    let manager = synced_manager(&store).await;

    manager.mark_delete(asset_id(0));
    manager.mark_delete(asset_id(1));
    manager.unmark_delete(&asset_id(0));

    manager.commit_batch().await.unwrap();
    assert!(store.contains_asset(&asset_id(0)));
    assert!(!store.contains_asset(&asset_id(1)));

    manager.shutdown();
}

#[tokio::test]
async fn test_cancel_all_staged_commits_nothing() {
    let store = seeded_store(5);
    let manager = synced_manager(&store).await;

    manager.mark_delete(asset_id(0));
    manager.mark_favorite(asset_id(1));
    manager.cancel_all_staged();

    let report = manager.commit_batch().await.unwrap();
    assert_eq!(report.deleted, 0);
    assert_eq!(report.favorited, 0);
    assert_eq!(store.asset_count(), 5);

    manager.shutdown();
}

// ============================================================================
// Failure and rollback
// ============================================================================

#[tokio::test]
async fn test_partial_delete_failure_restores_all_five_entries() {
    let store = seeded_store(10);
    let manager = synced_manager(&store).await;

    for n in 0..5 {
        manager.mark_delete(asset_id(n));
    }
    // 2 of 5 deletions land before the group fails.
    store.inject_delete_failure(InjectedFailure::AfterApplying(2));

    let err = manager.commit_batch().await.unwrap_err();
    match err {
        CommitError::GroupFailed { group, .. } => assert_eq!(group, CommitGroup::Deletes),
        other => panic!("unexpected error: {other}"),
    }

    // Local intent bookkeeping is back to the original five entries, even
    // though two assets are externally gone for good.
    for n in 0..5 {
        assert!(manager.is_marked_delete(&asset_id(n)));
    }
    assert_eq!(manager.organize_stats().staged_deletes, 5);
    assert_eq!(store.asset_count(), 8);

    manager.shutdown();
}

#[tokio::test]
async fn test_failed_batch_compensates_applied_favorites() {
    let store = seeded_store(10);
    let manager = synced_manager(&store).await;

    manager.mark_delete(asset_id(0));
    manager.mark_favorite(asset_id(5));
    store.inject_delete_failure(InjectedFailure::AfterApplying(0));

    let err = manager.commit_batch().await.unwrap_err();
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

    // The favorite that landed was reissued as an unfavorite.
    assert!(store.persisted_favorite_ids().is_empty());
    assert!(manager.is_marked_favorite(&asset_id(5)));

    manager.shutdown();
}

// ============================================================================
// Readiness precheck
// ============================================================================

#[tokio::test]
async fn test_low_storage_fails_before_any_mutation() {
    let store = seeded_store(10);
    let manager = synced_manager(&store).await;

    manager.mark_delete(asset_id(0));
    store.set_free_storage(1024);

    let err = manager.commit_batch().await.unwrap_err();
    assert!(matches!(
        err,
        CommitError::NotReady(ReadinessError::LowStorage { .. })
    ));
    assert_eq!(store.asset_count(), 10);
    assert_eq!(manager.organize_stats().staged_deletes, 1);

    manager.shutdown();
}

#[tokio::test]
async fn test_revoked_authorization_fails_precheck() {
    let store = seeded_store(10);
    let manager = synced_manager(&store).await;

    manager.mark_delete(asset_id(0));
    store.set_authorization(AuthorizationStatus::Denied);

    let err = manager.commit_batch().await.unwrap_err();
    assert!(matches!(
        err,
        CommitError::NotReady(ReadinessError::NotAuthorized(_))
    ));
    assert_eq!(store.asset_count(), 10);

    manager.shutdown();
}
