//! The external asset store seam.
//!
//! Everything this crate knows about the system-owned photo collection goes
//! through `AssetStoreClient`. The real platform gateway lives outside this
//! crate; `MemoryAssetStore` is the shipped reference implementation.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;

use super::models::{
    Asset, AssetId, AssetPage, AuthorizationStatus, ChangeEvent, CollectionId, CollectionInfo,
    DecodedImage, DeliveryQuality, SizeClass, StoreError,
};

/// Read/write gateway to the externally-owned asset collection.
///
/// Mutation calls offer per-call success/failure only; the store has no
/// multi-operation transactions. Batch semantics around that limitation are
/// the commit coordinator's job, not the store's.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait AssetStoreClient: Send + Sync {
    /// Current authorization state, without prompting.
    fn check_authorization(&self) -> AuthorizationStatus;

    /// One authorization poll step. May prompt the user on first call;
    /// returns the state as of this step (possibly still `NotDetermined`).
    async fn request_authorization(&self) -> AuthorizationStatus;

    /// Fetch one page of the full asset list, sorted newest-first by
    /// creation time.
    async fn fetch_page(&self, offset: usize, limit: usize) -> Result<AssetPage, StoreError>;

    /// Ids of all assets currently favorited in the store. Queried
    /// separately from `fetch_page` so favorite state is correct even when
    /// the store mutated between pages.
    async fn fetch_favorite_ids(&self) -> Result<HashSet<AssetId>, StoreError>;

    /// List user-created collections.
    async fn fetch_collections(&self) -> Result<Vec<CollectionInfo>, StoreError>;

    /// Assets of one collection, newest-first.
    async fn fetch_collection_assets(&self, id: &CollectionId)
        -> Result<Vec<Asset>, StoreError>;

    /// Delete the given assets as one grouped request.
    async fn delete_assets(&self, ids: &[AssetId]) -> Result<(), StoreError>;

    /// Set the favorite flag on the given assets as one grouped request.
    async fn set_favorite_batch(&self, ids: &[AssetId], favorite: bool)
        -> Result<(), StoreError>;

    async fn create_collection(&self, title: &str) -> Result<CollectionId, StoreError>;

    async fn rename_collection(&self, id: &CollectionId, title: &str) -> Result<(), StoreError>;

    async fn delete_collection(&self, id: &CollectionId) -> Result<(), StoreError>;

    async fn add_to_collection(
        &self,
        ids: &[AssetId],
        collection: &CollectionId,
    ) -> Result<(), StoreError>;

    /// Subscribe to change notifications. Each call returns an independent
    /// receiver; events are emitted whenever the backing result set of a
    /// previously fetched query changes.
    fn subscribe_changes(&self) -> broadcast::Receiver<ChangeEvent>;

    /// Decode an asset at the requested size class.
    async fn decode_image(
        &self,
        id: &AssetId,
        size: SizeClass,
        quality: DeliveryQuality,
    ) -> Result<Arc<DecodedImage>, StoreError>;

    /// Free capacity of the volume backing the store, in bytes.
    async fn free_storage_bytes(&self) -> Result<u64, StoreError>;
}
