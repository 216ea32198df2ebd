//! Scheduled event scraper: renders a listing page in headless Chromium,
//! enriches every event from its detail page in bounded waves, and publishes
//! the result as an atomically swapped snapshot behind a small JSON API.

pub mod batch;
pub mod browser;
pub mod cache;
pub mod config;
pub mod detail;
pub mod dom;
pub mod error;
pub mod event_finder;
pub mod listing;
pub mod models;
pub mod scheduler;
pub mod scrapers;
pub mod server;
pub mod traits;

pub use cache::{SnapshotCache, SnapshotView};
pub use config::Config;
pub use event_finder::{EventFinder, PipelineSettings, RefreshOutcome, RefreshState};
