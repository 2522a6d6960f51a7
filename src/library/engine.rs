//! Library synchronization engine.
//!
//! Pulls the externally-owned asset collection into memory in bounded pages,
//! classifies it, and publishes immutable snapshots. One background worker
//! owns all sync work; callers talk to it through a command channel and
//! observe it through watch channels, so no engine state is ever mutated
//! from outside.
//!
//! Ordering within a pass: the full paged read completes before
//! classification starts, and publication happens only after classification,
//! so partial states are never published. A pass runs to completion once
//! started; `shutdown` stops the worker between passes.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::asset_store::{
    Asset, AssetStoreClient, AuthorizationStatus, ChangeEvent, MediaKind, StoreError,
};
use crate::config::{DisplaySpec, SyncSettings};

use super::index::{is_screenshot, Category, LibraryState};
use super::progress::{classify_fraction, fetch_fraction, ProgressGauge, PUBLISH_FRACTION};

const COMMAND_CHANNEL_CAPACITY: usize = 16;

/// Update the progress gauge every this many classified assets.
const CLASSIFY_PROGRESS_STRIDE: usize = 200;

/// Commands accepted by the engine worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncCommand {
    /// Run a full pass if already authorized; settle idle otherwise.
    Sync,
    /// Poll authorization up to the configured ceiling first, then sync.
    AuthorizeThenSync,
}

/// Externally observable engine status.
///
/// `NotAuthorized` is a persistent state, not an error; it is only left by
/// an explicit `request_access` that resolves to authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Idle,
    NotAuthorized,
    Syncing,
    Ready,
}

/// Orchestrates paged loading, classification and publication of the asset
/// index. Create with [`LibrarySyncEngine::new`], which spawns the worker.
pub struct LibrarySyncEngine {
    store: Arc<dyn AssetStoreClient>,
    settings: SyncSettings,
    display: DisplaySpec,
    state_tx: watch::Sender<Arc<LibraryState>>,
    status_tx: watch::Sender<SyncStatus>,
    progress: ProgressGauge,
    cmd_tx: mpsc::Sender<SyncCommand>,
    cancel: CancellationToken,
    /// Whether a pass has ever published. Change notifications only matter
    /// once they can affect a previously fetched result set.
    has_synced: AtomicBool,
}

impl LibrarySyncEngine {
    /// Create the engine and start its background worker. Requires a tokio
    /// runtime.
    pub fn new(
        store: Arc<dyn AssetStoreClient>,
        settings: SyncSettings,
        display: DisplaySpec,
    ) -> Arc<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (state_tx, _) = watch::channel(LibraryState::empty());
        let (status_tx, _) = watch::channel(SyncStatus::Idle);
        let changes = store.subscribe_changes();

        let engine = Arc::new(Self {
            store,
            settings,
            display,
            state_tx,
            status_tx,
            progress: ProgressGauge::new(),
            cmd_tx,
            cancel: CancellationToken::new(),
            has_synced: AtomicBool::new(false),
        });

        let worker = Arc::clone(&engine);
        tokio::spawn(async move {
            worker.worker(cmd_rx, changes).await;
        });

        engine
    }

    /// Request a full sync pass. Never blocks; a no-op when the engine is
    /// not authorized against the store. Requests made while a pass is
    /// queued or running coalesce into one pass.
    pub fn start_sync(&self) {
        if let Err(e) = self.cmd_tx.try_send(SyncCommand::Sync) {
            debug!("sync request dropped (already queued): {}", e);
        }
    }

    /// Ask the store for authorization, polling up to the configured
    /// ceiling, then sync on success. Never blocks.
    pub fn request_access(&self) {
        if let Err(e) = self.cmd_tx.try_send(SyncCommand::AuthorizeThenSync) {
            debug!("access request dropped (already queued): {}", e);
        }
    }

    /// Watch the published library snapshots.
    pub fn state(&self) -> watch::Receiver<Arc<LibraryState>> {
        self.state_tx.subscribe()
    }

    /// The most recently published snapshot.
    pub fn current_state(&self) -> Arc<LibraryState> {
        self.state_tx.borrow().clone()
    }

    /// Watch sync progress, a monotonic fraction in [0, 1] per pass.
    pub fn progress(&self) -> watch::Receiver<f64> {
        self.progress.subscribe()
    }

    pub fn status(&self) -> watch::Receiver<SyncStatus> {
        self.status_tx.subscribe()
    }

    pub fn current_status(&self) -> SyncStatus {
        *self.status_tx.borrow()
    }

    /// Stop the worker. An in-flight pass finishes first.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    async fn worker(
        self: Arc<Self>,
        mut cmd_rx: mpsc::Receiver<SyncCommand>,
        mut changes: broadcast::Receiver<ChangeEvent>,
    ) {
        info!("library sync worker started");

        loop {
            let picked = tokio::select! {
                _ = self.cancel.cancelled() => break,
                cmd = cmd_rx.recv() => match cmd {
                    Some(cmd) => Some(cmd),
                    None => break,
                },
                event = changes.recv() => match event {
                    Ok(_) => self.resync_on_change(),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("change stream lagged by {}, resyncing", skipped);
                        self.resync_on_change()
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };
            let Some(mut command) = picked else { continue };

            // Coalesce everything queued behind this command into one pass.
            while let Ok(extra) = cmd_rx.try_recv() {
                if extra == SyncCommand::AuthorizeThenSync {
                    command = SyncCommand::AuthorizeThenSync;
                }
            }
            while changes.try_recv().is_ok() {}

            match command {
                SyncCommand::Sync => self.run_pass().await,
                SyncCommand::AuthorizeThenSync => {
                    if self.await_authorization().await {
                        self.run_pass().await;
                    } else {
                        self.status_tx.send_replace(SyncStatus::NotAuthorized);
                    }
                }
            }
        }

        info!("library sync worker stopped");
    }

    /// A change notification becomes a sync only after a first pass has
    /// published; before that there is no fetched result set it could
    /// affect.
    fn resync_on_change(&self) -> Option<SyncCommand> {
        if self.has_synced.load(Ordering::SeqCst) {
            Some(SyncCommand::Sync)
        } else {
            debug!("ignoring store change before first sync");
            None
        }
    }

    /// Poll authorization until it resolves or the ceiling elapses.
    async fn await_authorization(&self) -> bool {
        match self.store.check_authorization() {
            AuthorizationStatus::Authorized => return true,
            AuthorizationStatus::Denied => return false,
            AuthorizationStatus::NotDetermined => {}
        }

        let ceiling = Duration::from_secs(self.settings.auth_timeout_secs);
        let poll = Duration::from_millis(self.settings.auth_poll_interval_ms);
        let resolved = tokio::time::timeout(ceiling, async {
            loop {
                match self.store.request_authorization().await {
                    AuthorizationStatus::Authorized => return true,
                    AuthorizationStatus::Denied => return false,
                    AuthorizationStatus::NotDetermined => {
                        tokio::time::sleep(poll).await;
                    }
                }
            }
        })
        .await;

        match resolved {
            Ok(authorized) => authorized,
            Err(_) => {
                warn!(
                    "authorization polling gave up after {:?}, staying idle",
                    ceiling
                );
                false
            }
        }
    }

    /// One full pass: paged read, classification, publication.
    async fn run_pass(&self) {
        if self.store.check_authorization() != AuthorizationStatus::Authorized {
            debug!("sync requested without authorization, staying idle");
            self.status_tx.send_replace(SyncStatus::NotAuthorized);
            return;
        }

        self.status_tx.send_replace(SyncStatus::Syncing);
        self.progress.reset();
        let started = Instant::now();

        let assets = match self.read_all_pages().await {
            Ok(assets) => assets,
            Err(e) => {
                warn!("sync pass aborted during paged read: {}", e);
                self.status_tx.send_replace(SyncStatus::Idle);
                return;
            }
        };

        // Favorite state comes from its own predicate query so it is
        // correct even when the store mutated between pages.
        let favorites = match self.store.fetch_favorite_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("sync pass aborted during favorites query: {}", e);
                self.status_tx.send_replace(SyncStatus::Idle);
                return;
            }
        };

        let total = assets.len();
        let mut videos = HashSet::new();
        let mut screenshots = HashSet::new();
        for (n, asset) in assets.iter().enumerate() {
            match asset.kind {
                MediaKind::Video => {
                    videos.insert(asset.id.clone());
                }
                MediaKind::Image => {
                    if is_screenshot(asset, &self.display) {
                        screenshots.insert(asset.id.clone());
                    }
                }
            }
            if n % CLASSIFY_PROGRESS_STRIDE == 0 {
                self.progress.advance_to(classify_fraction(n, total));
            }
        }
        self.progress.advance_to(classify_fraction(total, total));

        self.progress.advance_to(PUBLISH_FRACTION);
        let state = Arc::new(LibraryState::new(assets, videos, screenshots, favorites));
        info!(
            "sync pass complete: {} assets ({} videos, {} screenshots, {} favorites) in {:?}",
            state.total_count(),
            state.count(Category::Videos),
            state.count(Category::Screenshots),
            state.count(Category::Favorites),
            started.elapsed()
        );
        self.state_tx.send_replace(state);
        self.progress.complete();
        self.has_synced.store(true, Ordering::SeqCst);
        self.status_tx.send_replace(SyncStatus::Ready);
    }

    /// Read the full sorted asset list in fixed-size pages, yielding
    /// between pages so the host stays responsive under very large
    /// libraries.
    async fn read_all_pages(&self) -> Result<Vec<Asset>, StoreError> {
        let page_size = self.settings.page_size.max(1);
        let pause = Duration::from_millis(self.settings.inter_page_pause_ms);
        let mut assets = Vec::new();
        let mut offset = 0;

        loop {
            let page = self.store.fetch_page(offset, page_size).await?;
            let fetched = page.assets.len();
            let total = page.total;
            assets.extend(page.assets);
            offset += fetched;

            let total_pages = total.div_ceil(page_size).max(1);
            let done_pages = offset.div_ceil(page_size);
            self.progress
                .advance_to(fetch_fraction(done_pages, total_pages));

            // The store may shrink mid-read; an empty page always ends the
            // scan, a change event will schedule the fresh pass.
            if offset >= total || fetched == 0 {
                break;
            }
            if !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
        }

        debug!("paged read finished: {} assets", assets.len());
        Ok(assets)
    }
}
