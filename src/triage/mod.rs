//! Upward-facing triage facade.
//!
//! `TriageManager` is what the application layer holds: it wires the sync
//! engine, staging ledger, decode cache and commit coordinator to one store
//! and exposes queries, staging mutations, image access and the commit
//! entry point. It owns no domain state of its own: everything lives in
//! the components it composes.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use crate::asset_store::{
    Asset, AssetId, AssetStoreClient, AuthorizationStatus, CollectionId, CollectionInfo,
    DecodedImage, DeliveryQuality, SizeClass, StoreError,
};
use crate::cache::ImageCache;
use crate::commit::{BatchCommitCoordinator, CommitError, CommitReport, CommitState};
use crate::config::EngineSettings;
use crate::library::{Category, LibrarySyncEngine, LibraryState, SyncStatus, TimeWindow, TimeWindowSummary};
use crate::staging::StagingLedger;

/// Rough per-asset size used for the reclaimed-space estimate; the actual
/// size would need a per-asset resource query against the store.
const ESTIMATED_ASSET_BYTES: u64 = 3_000_000;

/// Counters shown while organizing: what is staged and what it would free.
#[derive(Debug, Clone, Serialize)]
pub struct OrganizeStats {
    pub total_assets: usize,
    pub staged_deletes: usize,
    pub staged_favorites: usize,
    pub estimated_reclaimed_bytes: u64,
}

/// Aggregate entry point for the application layer.
pub struct TriageManager {
    store: Arc<dyn AssetStoreClient>,
    engine: Arc<LibrarySyncEngine>,
    ledger: Arc<StagingLedger>,
    cache: Arc<ImageCache>,
    coordinator: BatchCommitCoordinator,
}

impl TriageManager {
    /// Wire all components to one store. Requires a tokio runtime (the sync
    /// engine spawns its worker here).
    pub fn new(store: Arc<dyn AssetStoreClient>, settings: EngineSettings) -> Arc<Self> {
        let engine = LibrarySyncEngine::new(
            Arc::clone(&store),
            settings.sync.clone(),
            settings.display.clone(),
        );
        let ledger = Arc::new(StagingLedger::new());
        let cache = ImageCache::new(Arc::clone(&store), settings.cache.clone());
        let coordinator = BatchCommitCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&ledger),
            settings.commit.clone(),
        )
        .with_sync_engine(Arc::clone(&engine));

        Arc::new(Self {
            store,
            engine,
            ledger,
            cache,
            coordinator,
        })
    }

    /// Kick off the initial load: sync right away when already authorized,
    /// otherwise go through the authorization flow first.
    pub fn start(&self) {
        if self.store.check_authorization() == AuthorizationStatus::Authorized {
            self.engine.start_sync();
        } else {
            self.engine.request_access();
        }
    }

    pub fn request_access(&self) {
        self.engine.request_access();
    }

    pub fn start_sync(&self) {
        self.engine.start_sync();
    }

    pub fn shutdown(&self) {
        self.engine.shutdown();
    }

    // ------------------------------------------------------------------
    // Observables
    // ------------------------------------------------------------------

    pub fn library(&self) -> watch::Receiver<Arc<LibraryState>> {
        self.engine.state()
    }

    pub fn sync_progress(&self) -> watch::Receiver<f64> {
        self.engine.progress()
    }

    pub fn sync_status(&self) -> watch::Receiver<SyncStatus> {
        self.engine.status()
    }

    pub fn commit_state(&self) -> watch::Receiver<CommitState> {
        self.coordinator.state()
    }

    // ------------------------------------------------------------------
    // Library queries
    // ------------------------------------------------------------------

    pub fn count(&self, category: Category) -> usize {
        self.engine.current_state().count(category)
    }

    pub fn assets_in(&self, category: Category) -> Vec<Asset> {
        self.engine.current_state().assets_in(category)
    }

    pub fn assets_in_window(&self, window: TimeWindow) -> Vec<Asset> {
        self.engine.current_state().assets_in_window(window, Utc::now())
    }

    pub fn window_summaries(&self) -> Vec<TimeWindowSummary> {
        self.engine.current_state().window_summaries(Utc::now())
    }

    pub async fn collections(&self) -> Result<Vec<CollectionInfo>, StoreError> {
        self.store.fetch_collections().await
    }

    pub async fn collection_assets(&self, id: &CollectionId) -> Result<Vec<Asset>, StoreError> {
        self.store.fetch_collection_assets(id).await
    }

    pub async fn create_collection(&self, title: &str) -> Result<CollectionId, StoreError> {
        self.store.create_collection(title).await
    }

    pub async fn rename_collection(
        &self,
        id: &CollectionId,
        title: &str,
    ) -> Result<(), StoreError> {
        self.store.rename_collection(id, title).await
    }

    pub async fn delete_collection(&self, id: &CollectionId) -> Result<(), StoreError> {
        self.store.delete_collection(id).await
    }

    pub async fn add_to_collection(
        &self,
        ids: &[AssetId],
        collection: &CollectionId,
    ) -> Result<(), StoreError> {
        self.store.add_to_collection(ids, collection).await
    }

    // ------------------------------------------------------------------
    // Staging
    // ------------------------------------------------------------------

    pub fn mark_delete(&self, id: AssetId) {
        self.ledger.mark_delete(id);
    }

    pub fn unmark_delete(&self, id: &AssetId) {
        self.ledger.unmark_delete(id);
    }

    pub fn mark_favorite(&self, id: AssetId) {
        self.ledger.mark_favorite(id);
    }

    pub fn unmark_favorite(&self, id: &AssetId) {
        self.ledger.unmark_favorite(id);
    }

    pub fn is_marked_delete(&self, id: &AssetId) -> bool {
        self.ledger.is_marked_delete(id)
    }

    pub fn is_marked_favorite(&self, id: &AssetId) -> bool {
        self.ledger.is_marked_favorite(id)
    }

    /// Drop every staged intent without touching the store.
    pub fn cancel_all_staged(&self) {
        self.ledger.clear();
    }

    pub fn organize_stats(&self) -> OrganizeStats {
        let staged_deletes = self.ledger.delete_count();
        OrganizeStats {
            total_assets: self.engine.current_state().total_count(),
            staged_deletes,
            staged_favorites: self.ledger.favorite_count(),
            estimated_reclaimed_bytes: staged_deletes as u64 * ESTIMATED_ASSET_BYTES,
        }
    }

    // ------------------------------------------------------------------
    // Commit
    // ------------------------------------------------------------------

    /// Commit all currently staged intents as one batch. See
    /// [`BatchCommitCoordinator`] for the rollback contract.
    pub async fn commit_batch(&self) -> Result<CommitReport, CommitError> {
        self.coordinator.commit_batch().await
    }

    // ------------------------------------------------------------------
    // Images
    // ------------------------------------------------------------------

    /// Small preview for grid cells. Cache-first with decode-on-miss;
    /// `None` only when the decode itself fails.
    pub async fn thumbnail(&self, id: &AssetId) -> Option<Arc<DecodedImage>> {
        self.fetch_image(id, SizeClass::Thumbnail, DeliveryQuality::Fast)
            .await
    }

    /// Display-sized rendition for the triage view.
    pub async fn display_image(&self, id: &AssetId) -> Option<Arc<DecodedImage>> {
        self.fetch_image(id, SizeClass::Screen, DeliveryQuality::HighQuality)
            .await
    }

    /// Full-resolution rendition.
    pub async fn full_image(&self, id: &AssetId) -> Option<Arc<DecodedImage>> {
        self.fetch_image(id, SizeClass::Full, DeliveryQuality::HighQuality)
            .await
    }

    async fn fetch_image(
        &self,
        id: &AssetId,
        size: SizeClass,
        quality: DeliveryQuality,
    ) -> Option<Arc<DecodedImage>> {
        if let Some(image) = self.cache.get(id, size) {
            return Some(image);
        }
        match self.store.decode_image(id, size, quality).await {
            Ok(image) => {
                let cost = image.estimated_cost();
                self.cache.put(id.clone(), size, Arc::clone(&image), cost);
                Some(image)
            }
            Err(e) => {
                // Absorbed: the caller falls back to a placeholder and may
                // retry.
                debug!("decode of {} ({:?}) failed: {}", id, size, e);
                None
            }
        }
    }

    /// Warm the cache for upcoming assets. Returns immediately; failures
    /// are absorbed.
    pub fn preload_thumbnails(&self, ids: Vec<AssetId>, max_count: usize) {
        let cache = Arc::clone(&self.cache);
        tokio::spawn(async move {
            cache.preload(&ids, SizeClass::Thumbnail, max_count).await;
        });
    }

    /// Forward a system memory-pressure signal to the cache.
    pub fn handle_memory_pressure(&self) {
        self.cache.handle_memory_pressure();
    }
}
