//! Shared fixtures for the integration tests.
#![allow(dead_code)] // Not every test file uses every helper.

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use photosweep::asset_store::{
    Asset, AssetId, AssetStoreClient, MediaKind, MemoryAssetStore, PixelSize,
};
use photosweep::config::{EngineSettings, SyncSettings};

/// Opt-in log output while debugging a failing test (`RUST_LOG=debug`).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

pub fn asset_id(n: usize) -> AssetId {
    AssetId::new(format!("asset-{n:05}"))
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 17, 12, 0, 0).unwrap()
}

/// A plain image asset created `minutes_ago` before the fixture base time.
pub fn image_asset(n: usize, minutes_ago: i64) -> Asset {
    Asset {
        id: asset_id(n),
        kind: MediaKind::Image,
        pixel_size: PixelSize::new(4000, 3000),
        creation_time: Some(base_time() - ChronoDuration::minutes(minutes_ago)),
        is_favorite: false,
        screenshot_flag: None,
    }
}

pub fn video_asset(n: usize, minutes_ago: i64) -> Asset {
    Asset {
        kind: MediaKind::Video,
        pixel_size: PixelSize::new(1920, 1080),
        ..image_asset(n, minutes_ago)
    }
}

pub fn screenshot_asset(n: usize, minutes_ago: i64) -> Asset {
    Asset {
        screenshot_flag: Some(true),
        ..image_asset(n, minutes_ago)
    }
}

/// A store seeded with `count` plain image assets, one minute apart.
pub fn seeded_store(count: usize) -> Arc<MemoryAssetStore> {
    let store = Arc::new(MemoryAssetStore::new());
    store.seed_assets((0..count).map(|n| image_asset(n, n as i64)).collect());
    store
}

pub fn store_client(store: &Arc<MemoryAssetStore>) -> Arc<dyn AssetStoreClient> {
    Arc::clone(store) as Arc<dyn AssetStoreClient>
}

/// Settings tightened for tests: tiny pages exercise the paging loop, short
/// authorization ceilings keep the timeout scenarios fast.
pub fn test_settings() -> EngineSettings {
    EngineSettings {
        sync: SyncSettings {
            page_size: 500,
            inter_page_pause_ms: 5,
            auth_timeout_secs: 1,
            auth_poll_interval_ms: 50,
        },
        ..EngineSettings::default()
    }
}

/// Await a watch channel reaching a state the predicate accepts, bounded so
/// a broken engine fails the test instead of hanging it.
pub async fn wait_until<T, F>(rx: &mut watch::Receiver<T>, predicate: F)
where
    F: FnMut(&T) -> bool,
{
    tokio::time::timeout(Duration::from_secs(10), rx.wait_for(predicate))
        .await
        .expect("condition not reached within 10s")
        .expect("watch channel closed");
}
