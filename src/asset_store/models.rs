//! Data models for the external asset store boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Opaque identifier of one externally-stored photo or video record.
///
/// The store owns the identifier format; this crate never parses it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of a user-created collection (album) in the external store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionId(String);

impl CollectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Media kind of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

/// Pixel dimensions of an asset or a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

impl PixelSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// One externally-stored asset record as seen by this crate.
///
/// All fields are owned by the external store. The favorite flag reflects the
/// store's state at fetch time, not any staged intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub kind: MediaKind,
    pub pixel_size: PixelSize,
    /// Creation timestamp; `None` when the store has no record of it.
    pub creation_time: Option<DateTime<Utc>>,
    pub is_favorite: bool,
    /// Store-provided screenshot subtype flag, when the backing store
    /// exposes one. `None` means the store cannot tell.
    pub screenshot_flag: Option<bool>,
}

/// Authorization state against the external store.
///
/// `Denied` is a persistent state, not a one-shot error: it is only left via
/// an explicit new authorization request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    NotDetermined,
    Denied,
    Authorized,
}

/// One page of a paged asset query, newest-first.
#[derive(Debug, Clone)]
pub struct AssetPage {
    pub assets: Vec<Asset>,
    /// Offset of the first asset in this page within the full result.
    pub offset: usize,
    /// Total size of the full result at fetch time.
    pub total: usize,
}

/// Change notification emitted by the store when a previously fetched
/// result set is no longer current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    AssetsChanged,
    CollectionsChanged,
}

/// Summary of a user-created collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub id: CollectionId,
    pub title: String,
    pub asset_count: usize,
    /// First asset of the collection, usable as a cover thumbnail.
    pub cover_asset: Option<AssetId>,
}

/// Requested decode size class. Cache entries are keyed per class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeClass {
    /// Small square preview, grid cells.
    Thumbnail,
    /// Fits the display, triage view.
    Screen,
    /// Full asset resolution.
    Full,
}

/// Decode delivery preference, mirroring fast-preview vs final-quality
/// request modes of platform image pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryQuality {
    Fast,
    HighQuality,
}

/// A decoded image owned by whoever holds the `Arc`.
///
/// The cache hands out `Arc` clones; dropping a handle never invalidates
/// other holders.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub pixel_size: PixelSize,
    pub bytes: Vec<u8>,
}

impl DecodedImage {
    /// Estimated residency cost in bytes.
    pub fn estimated_cost(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Errors surfaced by the external asset store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not authorized for library access")]
    Unauthorized,

    #[error("asset not found: {0}")]
    AssetNotFound(AssetId),

    #[error("collection not found: {0}")]
    CollectionNotFound(CollectionId),

    #[error("decode failed for {id}: {reason}")]
    DecodeFailed { id: AssetId, reason: String },

    #[error("store backend error: {0}")]
    Backend(String),
}
