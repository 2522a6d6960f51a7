//! In-memory asset store implementation.
//!
//! A fully functional `AssetStoreClient` backed by process memory, used by
//! the integration tests and by hosts that want the engine without a real
//! platform gateway. Mutations emit change events exactly like a live store,
//! and per-group failures can be injected to exercise commit rollback paths.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::debug;

use super::models::{
    Asset, AssetId, AssetPage, AuthorizationStatus, ChangeEvent, CollectionId, CollectionInfo,
    DecodedImage, DeliveryQuality, PixelSize, SizeClass, StoreError,
};
use super::trait_def::AssetStoreClient;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Injected failure for one mutation group. Consumed by the next matching
/// call, so each injection fails exactly one grouped request.
#[derive(Debug, Clone, Copy)]
pub enum InjectedFailure {
    /// Apply the first `n` per-asset mutations, then fail the group. The
    /// applied mutations stay applied, matching a live store where a grouped
    /// request is not transactional.
    AfterApplying(usize),
}

#[derive(Default)]
struct FailurePlan {
    delete: Option<InjectedFailure>,
    favorite: Option<InjectedFailure>,
    decode: bool,
}

struct StoredCollection {
    id: CollectionId,
    title: String,
    members: Vec<AssetId>,
}

#[derive(Default)]
struct StoreState {
    /// Newest-first by creation time; unknown creation times sort last.
    assets: Vec<Asset>,
    collections: Vec<StoredCollection>,
}

/// In-memory reference implementation of [`AssetStoreClient`].
pub struct MemoryAssetStore {
    state: RwLock<StoreState>,
    auth: RwLock<AuthorizationStatus>,
    events: broadcast::Sender<ChangeEvent>,
    failures: Mutex<FailurePlan>,
    free_storage: AtomicU64,
}

impl Default for MemoryAssetStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAssetStore {
    /// Create an empty, authorized store with plenty of free storage.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: RwLock::new(StoreState::default()),
            auth: RwLock::new(AuthorizationStatus::Authorized),
            events,
            failures: Mutex::new(FailurePlan::default()),
            free_storage: AtomicU64::new(50 * 1024 * 1024 * 1024),
        }
    }

    /// Replace the asset set, re-sorting newest-first.
    pub fn seed_assets(&self, mut assets: Vec<Asset>) {
        assets.sort_by(|a, b| b.creation_time.cmp(&a.creation_time));
        let mut state = self.state.write().unwrap();
        state.assets = assets;
        drop(state);
        self.emit(ChangeEvent::AssetsChanged);
    }

    /// Set both the checked and the requested authorization outcome.
    /// `NotDetermined` models a prompt that never resolves.
    pub fn set_authorization(&self, status: AuthorizationStatus) {
        *self.auth.write().unwrap() = status;
    }

    pub fn set_free_storage(&self, bytes: u64) {
        self.free_storage.store(bytes, Ordering::SeqCst);
    }

    /// Fail the next grouped delete request.
    pub fn inject_delete_failure(&self, failure: InjectedFailure) {
        self.failures.lock().unwrap().delete = Some(failure);
    }

    /// Fail the next grouped favorite request.
    pub fn inject_favorite_failure(&self, failure: InjectedFailure) {
        self.failures.lock().unwrap().favorite = Some(failure);
    }

    /// Make every decode request fail until cleared.
    pub fn set_decode_failing(&self, failing: bool) {
        self.failures.lock().unwrap().decode = failing;
    }

    pub fn asset_count(&self) -> usize {
        self.state.read().unwrap().assets.len()
    }

    pub fn contains_asset(&self, id: &AssetId) -> bool {
        self.state
            .read()
            .unwrap()
            .assets
            .iter()
            .any(|a| &a.id == id)
    }

    /// Favorite flags as currently persisted, for test assertions.
    pub fn persisted_favorite_ids(&self) -> HashSet<AssetId> {
        self.state
            .read()
            .unwrap()
            .assets
            .iter()
            .filter(|a| a.is_favorite)
            .map(|a| a.id.clone())
            .collect()
    }

    fn emit(&self, event: ChangeEvent) {
        // No receivers is fine; the engine may not be subscribed yet.
        let _ = self.events.send(event);
    }

    fn decode_cost(size: SizeClass, asset: &Asset) -> (PixelSize, usize) {
        match size {
            SizeClass::Thumbnail => (PixelSize::new(150, 150), 150 * 150 * 4),
            SizeClass::Screen => (PixelSize::new(540, 960), 540 * 960 * 4),
            SizeClass::Full => {
                let px = asset.pixel_size;
                (px, (px.width as usize) * (px.height as usize) * 4)
            }
        }
    }
}

#[async_trait]
impl AssetStoreClient for MemoryAssetStore {
    fn check_authorization(&self) -> AuthorizationStatus {
        *self.auth.read().unwrap()
    }

    async fn request_authorization(&self) -> AuthorizationStatus {
        *self.auth.read().unwrap()
    }

    async fn fetch_page(&self, offset: usize, limit: usize) -> Result<AssetPage, StoreError> {
        let state = self.state.read().unwrap();
        let total = state.assets.len();
        let end = (offset + limit).min(total);
        let assets = if offset < total {
            state.assets[offset..end].to_vec()
        } else {
            Vec::new()
        };
        Ok(AssetPage {
            assets,
            offset,
            total,
        })
    }

    async fn fetch_favorite_ids(&self) -> Result<HashSet<AssetId>, StoreError> {
        Ok(self.persisted_favorite_ids())
    }

    async fn fetch_collections(&self) -> Result<Vec<CollectionInfo>, StoreError> {
        let state = self.state.read().unwrap();
        Ok(state
            .collections
            .iter()
            .map(|c| CollectionInfo {
                id: c.id.clone(),
                title: c.title.clone(),
                asset_count: c.members.len(),
                cover_asset: c.members.first().cloned(),
            })
            .collect())
    }

    async fn fetch_collection_assets(
        &self,
        id: &CollectionId,
    ) -> Result<Vec<Asset>, StoreError> {
        let state = self.state.read().unwrap();
        let collection = state
            .collections
            .iter()
            .find(|c| &c.id == id)
            .ok_or_else(|| StoreError::CollectionNotFound(id.clone()))?;
        let members: HashSet<&AssetId> = collection.members.iter().collect();
        Ok(state
            .assets
            .iter()
            .filter(|a| members.contains(&a.id))
            .cloned()
            .collect())
    }

    async fn delete_assets(&self, ids: &[AssetId]) -> Result<(), StoreError> {
        let failure = self.failures.lock().unwrap().delete.take();
        let applied: &[AssetId] = match failure {
            Some(InjectedFailure::AfterApplying(n)) => &ids[..n.min(ids.len())],
            None => ids,
        };

        if !applied.is_empty() {
            let mut state = self.state.write().unwrap();
            let doomed: HashSet<&AssetId> = applied.iter().collect();
            state.assets.retain(|a| !doomed.contains(&a.id));
            for collection in &mut state.collections {
                collection.members.retain(|id| !doomed.contains(id));
            }
            drop(state);
            self.emit(ChangeEvent::AssetsChanged);
        }

        if failure.is_some() {
            debug!(
                "injected delete failure after {} of {} assets",
                applied.len(),
                ids.len()
            );
            return Err(StoreError::Backend("delete group interrupted".to_string()));
        }
        Ok(())
    }

    async fn set_favorite_batch(
        &self,
        ids: &[AssetId],
        favorite: bool,
    ) -> Result<(), StoreError> {
        let failure = self.failures.lock().unwrap().favorite.take();
        let applied: &[AssetId] = match failure {
            Some(InjectedFailure::AfterApplying(n)) => &ids[..n.min(ids.len())],
            None => ids,
        };

        if !applied.is_empty() {
            let mut state = self.state.write().unwrap();
            let marked: HashSet<&AssetId> = applied.iter().collect();
            for asset in &mut state.assets {
                if marked.contains(&asset.id) {
                    asset.is_favorite = favorite;
                }
            }
            drop(state);
            self.emit(ChangeEvent::AssetsChanged);
        }

        if failure.is_some() {
            debug!(
                "injected favorite failure after {} of {} assets",
                applied.len(),
                ids.len()
            );
            return Err(StoreError::Backend(
                "favorite group interrupted".to_string(),
            ));
        }
        Ok(())
    }

    async fn create_collection(&self, title: &str) -> Result<CollectionId, StoreError> {
        let id = CollectionId::new(uuid::Uuid::new_v4().to_string());
        let mut state = self.state.write().unwrap();
        state.collections.push(StoredCollection {
            id: id.clone(),
            title: title.to_string(),
            members: Vec::new(),
        });
        drop(state);
        self.emit(ChangeEvent::CollectionsChanged);
        Ok(id)
    }

    async fn rename_collection(&self, id: &CollectionId, title: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().unwrap();
        let collection = state
            .collections
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| StoreError::CollectionNotFound(id.clone()))?;
        collection.title = title.to_string();
        drop(state);
        self.emit(ChangeEvent::CollectionsChanged);
        Ok(())
    }

    async fn delete_collection(&self, id: &CollectionId) -> Result<(), StoreError> {
        let mut state = self.state.write().unwrap();
        let before = state.collections.len();
        state.collections.retain(|c| &c.id != id);
        if state.collections.len() == before {
            return Err(StoreError::CollectionNotFound(id.clone()));
        }
        drop(state);
        self.emit(ChangeEvent::CollectionsChanged);
        Ok(())
    }

    async fn add_to_collection(
        &self,
        ids: &[AssetId],
        collection: &CollectionId,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().unwrap();
        let target = state
            .collections
            .iter_mut()
            .find(|c| &c.id == collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.clone()))?;
        for id in ids {
            if !target.members.contains(id) {
                target.members.push(id.clone());
            }
        }
        drop(state);
        self.emit(ChangeEvent::CollectionsChanged);
        Ok(())
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    async fn decode_image(
        &self,
        id: &AssetId,
        size: SizeClass,
        _quality: DeliveryQuality,
    ) -> Result<Arc<DecodedImage>, StoreError> {
        if self.failures.lock().unwrap().decode {
            return Err(StoreError::DecodeFailed {
                id: id.clone(),
                reason: "injected decode failure".to_string(),
            });
        }
        let state = self.state.read().unwrap();
        let asset = state
            .assets
            .iter()
            .find(|a| &a.id == id)
            .ok_or_else(|| StoreError::AssetNotFound(id.clone()))?;
        let (pixel_size, cost) = Self::decode_cost(size, asset);
        Ok(Arc::new(DecodedImage {
            pixel_size,
            bytes: vec![0; cost],
        }))
    }

    async fn free_storage_bytes(&self) -> Result<u64, StoreError> {
        Ok(self.free_storage.load(Ordering::SeqCst))
    }
}
