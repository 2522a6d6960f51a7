//! Bounded decode cache.
//!
//! Maps (asset id, size class) to a decoded image under two budgets: an
//! entry count and a total estimated byte cost. Eviction is an explicit
//! cost-aware LRU: recency is a monotonic tick bumped on every hit and
//! insert, and eviction always removes the lowest tick first. The eviction
//! order is part of the documented behavior rather than an opaque platform
//! policy.
//!
//! The cache is a pure performance layer: absence is never an error, and
//! every caller keeps a decode-on-miss fallback.

use byte_unit::{Byte, UnitType};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

use crate::asset_store::{AssetId, AssetStoreClient, DecodedImage, DeliveryQuality, SizeClass};
use crate::config::CacheSettings;

/// Cache key: one decoded rendition of one asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub asset: AssetId,
    pub size: SizeClass,
}

struct Slot {
    image: Arc<DecodedImage>,
    cost: u64,
    last_used: u64,
}

struct CacheBook {
    slots: HashMap<CacheKey, Slot>,
    tick: u64,
    total_cost: u64,
    /// Current entry budget; halved while under memory pressure.
    entry_budget: usize,
}

impl CacheBook {
    fn touch(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Remove the slot with the lowest recency tick.
    fn evict_one(&mut self) {
        let victim = self
            .slots
            .iter()
            .min_by_key(|(_, slot)| slot.last_used)
            .map(|(key, _)| key.clone());
        let Some(key) = victim else { return };
        if let Some(slot) = self.slots.remove(&key) {
            self.total_cost -= slot.cost;
            debug!("evicted {} ({:?}) from image cache", key.asset, key.size);
        }
    }

    /// Evict least-recently-used slots until both budgets hold with
    /// `incoming_cost` more bytes and one more entry about to land.
    fn evict_for(&mut self, incoming_cost: u64, max_cost: u64) {
        while !self.slots.is_empty()
            && (self.slots.len() >= self.entry_budget
                || self.total_cost + incoming_cost > max_cost)
        {
            self.evict_one();
        }
    }

    /// Evict until the current budgets hold as-is (no incoming entry).
    fn shrink_to_budgets(&mut self, max_cost: u64) {
        while self.slots.len() > self.entry_budget || self.total_cost > max_cost {
            self.evict_one();
        }
    }
}

/// Bounded, cost-weighted image cache with LRU eviction.
pub struct ImageCache {
    book: Mutex<CacheBook>,
    settings: CacheSettings,
    store: Arc<dyn AssetStoreClient>,
    /// Bumped on every pressure signal; a restore only fires if no newer
    /// signal arrived during the cooldown, so repeated signals extend the
    /// shrunken window instead of thrashing the budget.
    pressure_epoch: AtomicU64,
}

impl ImageCache {
    pub fn new(store: Arc<dyn AssetStoreClient>, settings: CacheSettings) -> Arc<Self> {
        let entry_budget = settings.max_entries.max(1);
        Arc::new(Self {
            book: Mutex::new(CacheBook {
                slots: HashMap::new(),
                tick: 0,
                total_cost: 0,
                entry_budget,
            }),
            settings,
            store,
            pressure_epoch: AtomicU64::new(0),
        })
    }

    /// Look up a cached rendition. Refreshes the entry's recency; has no
    /// other effect and never fails.
    pub fn get(&self, asset: &AssetId, size: SizeClass) -> Option<Arc<DecodedImage>> {
        let mut book = self.book.lock().unwrap();
        let tick = book.touch();
        let slot = book.slots.get_mut(&CacheKey {
            asset: asset.clone(),
            size,
        })?;
        slot.last_used = tick;
        Some(Arc::clone(&slot.image))
    }

    /// Insert a rendition, evicting LRU entries first so that neither the
    /// entry budget nor the byte budget is exceeded when this returns. A
    /// single image costing more than the whole byte budget is refused.
    pub fn put(&self, asset: AssetId, size: SizeClass, image: Arc<DecodedImage>, cost: u64) {
        if cost > self.settings.max_cost_bytes {
            debug!(
                "refusing cache insert of {}: cost {} exceeds whole budget",
                asset,
                Byte::from_u64(cost).get_appropriate_unit(UnitType::Binary)
            );
            return;
        }

        let mut book = self.book.lock().unwrap();
        let key = CacheKey { asset, size };
        if let Some(previous) = book.slots.remove(&key) {
            book.total_cost -= previous.cost;
        }
        let max_cost = self.settings.max_cost_bytes;
        book.evict_for(cost, max_cost);
        let tick = book.touch();
        book.total_cost += cost;
        book.slots.insert(
            key,
            Slot {
                image,
                cost,
                last_used: tick,
            },
        );
    }

    /// Best-effort warm-up of up to `max_count` not-yet-cached renditions.
    /// Decode failures are absorbed; the cache never becomes a correctness
    /// dependency.
    pub async fn preload(&self, ids: &[AssetId], size: SizeClass, max_count: usize) {
        let mut warmed = 0;
        for id in ids {
            if warmed >= max_count {
                break;
            }
            if self.contains(id, size) {
                continue;
            }
            match self
                .store
                .decode_image(id, size, DeliveryQuality::Fast)
                .await
            {
                Ok(image) => {
                    let cost = image.estimated_cost();
                    self.put(id.clone(), size, image, cost);
                    warmed += 1;
                }
                Err(e) => {
                    debug!("preload decode of {} skipped: {}", id, e);
                }
            }
        }
    }

    /// React to a system memory-pressure signal: halve the entry budget now
    /// and restore it after a cooldown. A fresh signal during the cooldown
    /// restarts the clock.
    pub fn handle_memory_pressure(self: &Arc<Self>) {
        let epoch = self.pressure_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut book = self.book.lock().unwrap();
            book.entry_budget = (self.settings.max_entries / 2).max(1);
            let max_cost = self.settings.max_cost_bytes;
            book.shrink_to_budgets(max_cost);
            debug!(
                "memory pressure: entry budget halved to {}, holding {}",
                book.entry_budget,
                Byte::from_u64(book.total_cost).get_appropriate_unit(UnitType::Binary)
            );
        }

        let cache = Arc::clone(self);
        let cooldown = Duration::from_millis(self.settings.pressure_cooldown_ms);
        tokio::spawn(async move {
            tokio::time::sleep(cooldown).await;
            if cache.pressure_epoch.load(Ordering::SeqCst) == epoch {
                let mut book = cache.book.lock().unwrap();
                book.entry_budget = cache.settings.max_entries.max(1);
                debug!("memory pressure cooled down, entry budget restored");
            }
        });
    }

    pub fn contains(&self, asset: &AssetId, size: SizeClass) -> bool {
        self.book.lock().unwrap().slots.contains_key(&CacheKey {
            asset: asset.clone(),
            size,
        })
    }

    pub fn len(&self) -> usize {
        self.book.lock().unwrap().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_cost(&self) -> u64 {
        self.book.lock().unwrap().total_cost
    }

    /// Current entry budget (shrunken while under pressure).
    pub fn entry_budget(&self) -> usize {
        self.book.lock().unwrap().entry_budget
    }
}
