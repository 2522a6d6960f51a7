//! In-memory asset index and its derived buckets.
//!
//! `LibraryState` is the immutable snapshot the sync engine publishes after
//! a pass: the full asset list newest-first plus the classified id sets.
//! Categories and time windows are derived at query time, never stored.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::asset_store::{Asset, AssetId, MediaKind};
use crate::config::DisplaySpec;

/// Named asset category. Derived predicates over the current index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    All,
    Videos,
    Screenshots,
    Favorites,
}

/// Creation-time bucket for browsing. Windows are mutually exclusive and
/// together cover every asset with a known creation time; assets without
/// one belong to no window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindow {
    Today,
    ThisWeek,
    ThisMonth,
    LastMonth,
    Older,
}

impl TimeWindow {
    pub const ALL: [TimeWindow; 5] = [
        TimeWindow::Today,
        TimeWindow::ThisWeek,
        TimeWindow::ThisMonth,
        TimeWindow::LastMonth,
        TimeWindow::Older,
    ];

    /// Classify a creation time relative to `now`. Each branch excludes the
    /// ones above it, which is what keeps the windows mutually exclusive.
    pub fn classify(creation: DateTime<Utc>, now: DateTime<Utc>) -> TimeWindow {
        if creation.date_naive() == now.date_naive() {
            return TimeWindow::Today;
        }
        let same_week = creation.iso_week() == now.iso_week();
        if same_week {
            return TimeWindow::ThisWeek;
        }
        if creation.year() == now.year() && creation.month() == now.month() {
            return TimeWindow::ThisMonth;
        }
        let (last_month_year, last_month) = if now.month() == 1 {
            (now.year() - 1, 12)
        } else {
            (now.year(), now.month() - 1)
        };
        if creation.year() == last_month_year && creation.month() == last_month {
            return TimeWindow::LastMonth;
        }
        TimeWindow::Older
    }
}

/// Count of assets falling into one time window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeWindowSummary {
    pub window: TimeWindow,
    pub count: usize,
}

/// Screenshot classification, two-tier: trust the store's subtype flag when
/// it has one, otherwise fall back to matching the asset's pixel dimensions
/// against the display within a small tolerance. Only image assets qualify.
pub fn is_screenshot(asset: &Asset, display: &DisplaySpec) -> bool {
    if asset.kind != MediaKind::Image {
        return false;
    }
    if let Some(flag) = asset.screenshot_flag {
        return flag;
    }
    let tolerance = display.screenshot_tolerance_px as i64;
    let dw = (asset.pixel_size.width as i64 - display.pixel_width as i64).abs();
    let dh = (asset.pixel_size.height as i64 - display.pixel_height as i64).abs();
    dw < tolerance && dh < tolerance
}

/// Immutable published snapshot of the synced library.
///
/// Owned by the sync engine; everyone else holds read-only `Arc` handles.
#[derive(Debug, Default, Serialize)]
pub struct LibraryState {
    /// All assets, newest-first by creation time.
    assets: Vec<Asset>,
    videos: HashSet<AssetId>,
    screenshots: HashSet<AssetId>,
    favorites: HashSet<AssetId>,
}

impl LibraryState {
    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Assemble a snapshot from a full paged read plus the classified sets.
    pub fn new(
        assets: Vec<Asset>,
        videos: HashSet<AssetId>,
        screenshots: HashSet<AssetId>,
        favorites: HashSet<AssetId>,
    ) -> Self {
        Self {
            assets,
            videos,
            screenshots,
            favorites,
        }
    }

    pub fn total_count(&self) -> usize {
        self.assets.len()
    }

    pub fn count(&self, category: Category) -> usize {
        match category {
            Category::All => self.assets.len(),
            Category::Videos => self.videos.len(),
            Category::Screenshots => self.screenshots.len(),
            Category::Favorites => self.favorites.len(),
        }
    }

    fn in_category(&self, asset: &Asset, category: Category) -> bool {
        match category {
            Category::All => true,
            Category::Videos => self.videos.contains(&asset.id),
            Category::Screenshots => self.screenshots.contains(&asset.id),
            Category::Favorites => self.favorites.contains(&asset.id),
        }
    }

    /// Assets of one category, preserving newest-first order.
    pub fn assets_in(&self, category: Category) -> Vec<Asset> {
        self.assets
            .iter()
            .filter(|a| self.in_category(a, category))
            .cloned()
            .collect()
    }

    /// Assets whose creation time falls into `window` relative to `now`.
    /// Assets with no creation time are in no window.
    pub fn assets_in_window(&self, window: TimeWindow, now: DateTime<Utc>) -> Vec<Asset> {
        self.assets
            .iter()
            .filter(|a| {
                a.creation_time
                    .map(|t| TimeWindow::classify(t, now) == window)
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    /// Per-window counts in browsing order.
    pub fn window_summaries(&self, now: DateTime<Utc>) -> Vec<TimeWindowSummary> {
        TimeWindow::ALL
            .iter()
            .map(|&window| TimeWindowSummary {
                window,
                count: self
                    .assets
                    .iter()
                    .filter(|a| {
                        a.creation_time
                            .map(|t| TimeWindow::classify(t, now) == window)
                            .unwrap_or(false)
                    })
                    .count(),
            })
            .collect()
    }

    pub fn get(&self, id: &AssetId) -> Option<&Asset> {
        self.assets.iter().find(|a| &a.id == id)
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset_store::PixelSize;
    use chrono::{Duration, TimeZone};

    fn display() -> DisplaySpec {
        DisplaySpec {
            pixel_width: 1179,
            pixel_height: 2556,
            screenshot_tolerance_px: 10,
        }
    }

    fn image(id: &str, width: u32, height: u32, flag: Option<bool>) -> Asset {
        Asset {
            id: AssetId::new(id),
            kind: MediaKind::Image,
            pixel_size: PixelSize::new(width, height),
            creation_time: None,
            is_favorite: false,
            screenshot_flag: flag,
        }
    }

    #[test]
    fn test_screenshot_store_flag_is_trusted() {
        // Dimensions say screenshot, flag says no: flag wins.
        let asset = image("a", 1179, 2556, Some(false));
        assert!(!is_screenshot(&asset, &display()));

        // Dimensions say no, flag says screenshot: flag wins.
        let asset = image("b", 4000, 3000, Some(true));
        assert!(is_screenshot(&asset, &display()));
    }

    #[test]
    fn test_screenshot_dimension_fallback() {
        // No flag: dimensions within tolerance match.
        let asset = image("a", 1175, 2550, None);
        assert!(is_screenshot(&asset, &display()));

        // Off by exactly the tolerance is not a match.
        let asset = image("b", 1189, 2556, None);
        assert!(!is_screenshot(&asset, &display()));

        let asset = image("c", 4000, 3000, None);
        assert!(!is_screenshot(&asset, &display()));
    }

    #[test]
    fn test_videos_are_never_screenshots() {
        let mut asset = image("a", 1179, 2556, Some(true));
        asset.kind = MediaKind::Video;
        assert!(!is_screenshot(&asset, &display()));
    }

    #[test]
    fn test_time_windows_partition_known_creation_times() {
        // A Wednesday mid-month, so every window is reachable. Ages are
        // picked to land on and around the window boundaries.
        let now = Utc.with_ymd_and_hms(2026, 6, 17, 15, 0, 0).unwrap();
        let ages_hours = [0, 2, 23, 26, 49, 120, 240, 400, 800, 1600, 4000, 9600];
        let assets: Vec<Asset> = ages_hours
            .iter()
            .enumerate()
            .map(|(n, &hours)| Asset {
                id: AssetId::new(format!("x-{n}")),
                creation_time: Some(now - Duration::hours(hours)),
                ..image("x", 100, 100, None)
            })
            .collect();

        let state = LibraryState::new(
            assets.clone(),
            HashSet::new(),
            HashSet::new(),
            HashSet::new(),
        );

        // Mutually exclusive and jointly covering: every asset with a known
        // creation time shows up in exactly one window's query result.
        let mut seen: Vec<AssetId> = Vec::new();
        for window in TimeWindow::ALL {
            for asset in state.assets_in_window(window, now) {
                assert!(
                    !seen.contains(&asset.id),
                    "{} appeared in more than one window",
                    asset.id
                );
                seen.push(asset.id);
            }
        }
        assert_eq!(seen.len(), assets.len());
    }

    #[test]
    fn test_time_window_examples() {
        let now = Utc.with_ymd_and_hms(2026, 6, 17, 15, 0, 0).unwrap();

        let today = now - Duration::hours(3);
        assert_eq!(TimeWindow::classify(today, now), TimeWindow::Today);

        // Monday of the same ISO week.
        let this_week = Utc.with_ymd_and_hms(2026, 6, 15, 9, 0, 0).unwrap();
        assert_eq!(TimeWindow::classify(this_week, now), TimeWindow::ThisWeek);

        // Same month, earlier week.
        let this_month = Utc.with_ymd_and_hms(2026, 6, 2, 9, 0, 0).unwrap();
        assert_eq!(TimeWindow::classify(this_month, now), TimeWindow::ThisMonth);

        let last_month = Utc.with_ymd_and_hms(2026, 5, 20, 9, 0, 0).unwrap();
        assert_eq!(TimeWindow::classify(last_month, now), TimeWindow::LastMonth);

        let older = Utc.with_ymd_and_hms(2025, 11, 20, 9, 0, 0).unwrap();
        assert_eq!(TimeWindow::classify(older, now), TimeWindow::Older);
    }

    #[test]
    fn test_last_month_wraps_the_year() {
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();
        let december = Utc.with_ymd_and_hms(2025, 12, 20, 12, 0, 0).unwrap();
        assert_eq!(TimeWindow::classify(december, now), TimeWindow::LastMonth);
    }

    #[test]
    fn test_unknown_creation_time_is_in_no_window() {
        let now = Utc.with_ymd_and_hms(2026, 6, 17, 15, 0, 0).unwrap();
        let state = LibraryState::new(
            vec![image("a", 100, 100, None)],
            HashSet::new(),
            HashSet::new(),
            HashSet::new(),
        );

        for window in TimeWindow::ALL {
            assert!(state.assets_in_window(window, now).is_empty());
        }
        let total: usize = state.window_summaries(now).iter().map(|s| s.count).sum();
        assert_eq!(total, 0);
    }

    #[test]
    fn test_category_queries_preserve_order_and_membership() {
        let mut video = image("v", 1920, 1080, None);
        video.kind = MediaKind::Video;
        let favorite = image("f", 100, 100, None);
        let plain = image("p", 100, 100, None);

        let state = LibraryState::new(
            vec![video.clone(), favorite.clone(), plain],
            HashSet::from([video.id.clone()]),
            HashSet::new(),
            HashSet::from([favorite.id.clone()]),
        );

        assert_eq!(state.count(Category::All), 3);
        assert_eq!(state.count(Category::Videos), 1);
        assert_eq!(state.count(Category::Favorites), 1);
        assert_eq!(state.count(Category::Screenshots), 0);

        let favorites = state.assets_in(Category::Favorites);
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].id, favorite.id);
    }
}
