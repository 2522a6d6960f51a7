mod file_config;

pub use file_config::{CacheConfig, CommitConfig, DisplayConfig, FileConfig, SyncConfig};

/// Settings for the library sync engine.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Assets fetched per page of the full library read.
    pub page_size: usize,
    /// Deliberate pause between pages, keeps the host responsive under
    /// very large libraries.
    pub inter_page_pause_ms: u64,
    /// Ceiling on authorization polling before settling into the
    /// not-authorized idle state.
    pub auth_timeout_secs: u64,
    /// Interval between authorization poll steps.
    pub auth_poll_interval_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            page_size: 500,
            inter_page_pause_ms: 20,
            auth_timeout_secs: 10,
            auth_poll_interval_ms: 200,
        }
    }
}

/// Settings for the decode cache budgets.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Maximum number of cached renditions.
    pub max_entries: usize,
    /// Maximum total estimated cost in bytes.
    pub max_cost_bytes: u64,
    /// How long the entry budget stays halved after a memory-pressure
    /// signal.
    pub pressure_cooldown_ms: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: 50,
            max_cost_bytes: 100 * 1024 * 1024,
            pressure_cooldown_ms: 1_000,
        }
    }
}

/// Settings for the batch commit precheck.
#[derive(Debug, Clone)]
pub struct CommitSettings {
    /// Minimum free storage required before any mutation is attempted.
    pub min_free_storage_bytes: u64,
}

impl Default for CommitSettings {
    fn default() -> Self {
        Self {
            min_free_storage_bytes: 100 * 1024 * 1024,
        }
    }
}

/// Pixel dimensions of the host display, used by the screenshot
/// classification fallback when the store provides no subtype flag.
#[derive(Debug, Clone)]
pub struct DisplaySpec {
    pub pixel_width: u32,
    pub pixel_height: u32,
    /// Per-axis tolerance when matching asset dimensions to the display.
    pub screenshot_tolerance_px: u32,
}

impl Default for DisplaySpec {
    fn default() -> Self {
        Self {
            pixel_width: 1179,
            pixel_height: 2556,
            screenshot_tolerance_px: 10,
        }
    }
}

/// Aggregate engine settings.
#[derive(Debug, Clone, Default)]
pub struct EngineSettings {
    pub sync: SyncSettings,
    pub cache: CacheSettings,
    pub commit: CommitSettings,
    pub display: DisplaySpec,
}

impl EngineSettings {
    /// Resolve settings from an optional TOML file config layered over the
    /// defaults. File values win where present.
    pub fn resolve(file_config: Option<FileConfig>) -> Self {
        let file = file_config.unwrap_or_default();
        let defaults = Self::default();

        let sync_file = file.sync.unwrap_or_default();
        let sync = SyncSettings {
            page_size: sync_file.page_size.unwrap_or(defaults.sync.page_size),
            inter_page_pause_ms: sync_file
                .inter_page_pause_ms
                .unwrap_or(defaults.sync.inter_page_pause_ms),
            auth_timeout_secs: sync_file
                .auth_timeout_secs
                .unwrap_or(defaults.sync.auth_timeout_secs),
            auth_poll_interval_ms: sync_file
                .auth_poll_interval_ms
                .unwrap_or(defaults.sync.auth_poll_interval_ms),
        };

        let cache_file = file.cache.unwrap_or_default();
        let cache = CacheSettings {
            max_entries: cache_file.max_entries.unwrap_or(defaults.cache.max_entries),
            max_cost_bytes: cache_file
                .max_cost_bytes
                .unwrap_or(defaults.cache.max_cost_bytes),
            pressure_cooldown_ms: cache_file
                .pressure_cooldown_ms
                .unwrap_or(defaults.cache.pressure_cooldown_ms),
        };

        let commit_file = file.commit.unwrap_or_default();
        let commit = CommitSettings {
            min_free_storage_bytes: commit_file
                .min_free_storage_bytes
                .unwrap_or(defaults.commit.min_free_storage_bytes),
        };

        let display_file = file.display.unwrap_or_default();
        let display = DisplaySpec {
            pixel_width: display_file
                .pixel_width
                .unwrap_or(defaults.display.pixel_width),
            pixel_height: display_file
                .pixel_height
                .unwrap_or(defaults.display.pixel_height),
            screenshot_tolerance_px: display_file
                .screenshot_tolerance_px
                .unwrap_or(defaults.display.screenshot_tolerance_px),
        };

        Self {
            sync,
            cache,
            commit,
            display,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = EngineSettings::default();
        assert_eq!(settings.sync.page_size, 500);
        assert_eq!(settings.cache.max_entries, 50);
        assert_eq!(settings.cache.max_cost_bytes, 100 * 1024 * 1024);
        assert_eq!(settings.commit.min_free_storage_bytes, 100 * 1024 * 1024);
        assert_eq!(settings.display.screenshot_tolerance_px, 10);
    }

    #[test]
    fn test_file_values_override_defaults() {
        let toml_str = r#"
            [sync]
            page_size = 100

            [cache]
            max_entries = 8
        "#;
        let file: FileConfig = toml::from_str(toml_str).unwrap();
        let settings = EngineSettings::resolve(Some(file));

        assert_eq!(settings.sync.page_size, 100);
        assert_eq!(settings.cache.max_entries, 8);
        // Untouched values keep their defaults.
        assert_eq!(settings.sync.inter_page_pause_ms, 20);
        assert_eq!(settings.cache.pressure_cooldown_ms, 1_000);
    }
}
