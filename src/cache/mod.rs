use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::models::{EventRecord, Snapshot};

/// What the read side sees when it asks for events
#[derive(Debug, Clone)]
pub enum SnapshotView {
    /// No refresh has completed since the process started
    NotYetAvailable,
    /// The most recently published snapshot; may legitimately hold zero events
    Ready(Arc<Snapshot>),
}

/// Holds the last complete set of scraped events.
///
/// Readers get an `Arc` to an immutable snapshot and never see a half-built
/// one: a refresh builds its records off to the side and publishes them with
/// a single pointer swap.
pub struct SnapshotCache {
    current: RwLock<Arc<Snapshot>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(Snapshot::default())),
        }
    }

    /// The current snapshot. The lock is held only long enough to clone the `Arc`.
    pub fn read(&self) -> Arc<Snapshot> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    pub fn view(&self) -> SnapshotView {
        let snapshot = self.read();
        if snapshot.completed_at.is_some() {
            SnapshotView::Ready(snapshot)
        } else {
            SnapshotView::NotYetAvailable
        }
    }

    /// Install `events` as the new current snapshot, completed now.
    pub fn replace(&self, events: Vec<EventRecord>) -> Arc<Snapshot> {
        self.replace_at(events, Utc::now())
    }

    pub fn replace_at(&self, events: Vec<EventRecord>, completed_at: DateTime<Utc>) -> Arc<Snapshot> {
        let snapshot = Arc::new(Snapshot {
            events,
            completed_at: Some(completed_at),
        });

        {
            let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
            *guard = Arc::clone(&snapshot);
        }

        info!("Event cache updated: {} events stored", snapshot.events.len());
        snapshot
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}
