//! Library synchronization and the in-memory asset index.
//!
//! The sync engine pages the external collection into memory, classifies it
//! into categories and time windows, and publishes immutable snapshots.

mod engine;
mod index;
mod progress;

pub use engine::{LibrarySyncEngine, SyncStatus};
pub use index::{is_screenshot, Category, LibraryState, TimeWindow, TimeWindowSummary};
pub use progress::ProgressGauge;
