//! External asset store boundary.
//!
//! This module defines the `AssetStoreClient` seam to the system-owned photo
//! collection, the data models crossing it, and an in-memory reference
//! implementation used by tests and embedded hosts.

mod memory_store;
mod models;
mod trait_def;

pub use memory_store::{InjectedFailure, MemoryAssetStore};
pub use models::{
    Asset, AssetId, AssetPage, AuthorizationStatus, ChangeEvent, CollectionId, CollectionInfo,
    DecodedImage, DeliveryQuality, MediaKind, PixelSize, SizeClass, StoreError,
};
pub use trait_def::AssetStoreClient;

#[cfg(feature = "mock")]
pub use trait_def::MockAssetStoreClient;
