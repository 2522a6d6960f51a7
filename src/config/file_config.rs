use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub sync: Option<SyncConfig>,
    pub cache: Option<CacheConfig>,
    pub commit: Option<CommitConfig>,
    pub display: Option<DisplayConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SyncConfig {
    pub page_size: Option<usize>,
    pub inter_page_pause_ms: Option<u64>,
    pub auth_timeout_secs: Option<u64>,
    pub auth_poll_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub max_entries: Option<usize>,
    pub max_cost_bytes: Option<u64>,
    pub pressure_cooldown_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct CommitConfig {
    pub min_free_storage_bytes: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct DisplayConfig {
    pub pixel_width: Option<u32>,
    pub pixel_height: Option<u32>,
    pub screenshot_tolerance_px: Option<u32>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
