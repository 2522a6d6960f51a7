//! photosweep: asset synchronization and staged batch-edit engine.
//!
//! The library behind a photo-triage app: it pulls a potentially huge,
//! externally-owned asset collection into memory in bounded pages, keeps a
//! cost-weighted decode cache under budget, accumulates delete/favorite
//! intents in a thread-safe staging ledger, and commits them as one logical
//! batch with partial-failure rollback of the staged state.
//!
//! Nothing is mutated in the external store until [`TriageManager::commit_batch`]
//! (or the underlying [`commit::BatchCommitCoordinator`]) runs; until then
//! every user decision is just ledger state and can be dropped with
//! `cancel_all_staged`.
//!
//! The external collection is reached through the [`asset_store::AssetStoreClient`]
//! trait. Production hosts implement it against their platform's photo
//! library; [`asset_store::MemoryAssetStore`] is a complete in-memory
//! implementation for tests and embedded use.
//!
//! ```no_run
//! use std::sync::Arc;
//! use photosweep::asset_store::{AssetStoreClient, MemoryAssetStore};
//! use photosweep::config::EngineSettings;
//! use photosweep::TriageManager;
//!
//! # async fn demo() {
//! let store: Arc<dyn AssetStoreClient> = Arc::new(MemoryAssetStore::new());
//! let manager = TriageManager::new(store, EngineSettings::default());
//! manager.start();
//! # }
//! ```

pub mod asset_store;
pub mod cache;
pub mod commit;
pub mod config;
pub mod library;
pub mod staging;
pub mod triage;

pub use asset_store::{Asset, AssetId, AssetStoreClient};
pub use cache::ImageCache;
pub use commit::{BatchCommitCoordinator, CommitError, CommitReport, CommitState};
pub use config::EngineSettings;
pub use library::{Category, LibrarySyncEngine, LibraryState, SyncStatus, TimeWindow};
pub use staging::{LedgerSnapshot, StagingLedger};
pub use triage::{OrganizeStats, TriageManager};
