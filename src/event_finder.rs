use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::batch;
use crate::cache::{SnapshotCache, SnapshotView};
use crate::config::Config;
use crate::detail::DetailEnricher;
use crate::listing::{self, ListingProbe};
use crate::models::{EventCandidate, EventRecord, Snapshot};
use crate::scrapers::SiteConfig;
use crate::traits::{PageContext, RenderEngine, RenderSession, SessionConfig, WaitCondition};

/// Whether a refresh is currently in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Running,
}

impl RefreshState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
        }
    }
}

/// Result of one refresh attempt
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// A new snapshot was published
    Published(Arc<Snapshot>),
    /// The run failed; the previous snapshot is still current
    Failed(String),
}

/// Timing knobs for one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub session: SessionConfig,
    pub concurrency: usize,
    pub listing_settle: Duration,
    pub detail_settle: Duration,
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            session: config.session.clone(),
            concurrency: config.concurrency,
            listing_settle: config.listing_settle,
            detail_settle: config.detail_settle,
        }
    }
}

/// Runs the scrape pipeline and owns the snapshot it publishes.
///
/// Cloning is cheap; clones share the engine, the cache and the refresh
/// counter. Refreshes are not serialized: a manual trigger that arrives while
/// a scheduled run is in progress starts a second, overlapping run with its
/// own browser session, and whichever finishes last wins the cache.
#[derive(Clone)]
pub struct EventFinder {
    engine: Arc<dyn RenderEngine>,
    site: Arc<SiteConfig>,
    settings: PipelineSettings,
    cache: Arc<SnapshotCache>,
    running: Arc<AtomicUsize>,
}

impl EventFinder {
    pub fn new(
        engine: Arc<dyn RenderEngine>,
        site: SiteConfig,
        settings: PipelineSettings,
        cache: Arc<SnapshotCache>,
    ) -> Self {
        Self {
            engine,
            site: Arc::new(site),
            settings,
            cache,
            running: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    pub fn snapshot(&self) -> SnapshotView {
        self.cache.view()
    }

    pub fn state(&self) -> RefreshState {
        if self.running.load(Ordering::SeqCst) > 0 {
            RefreshState::Running
        } else {
            RefreshState::Idle
        }
    }

    /// Scrape and publish. Failures are logged and leave the cache untouched.
    pub async fn refresh_now(&self) -> RefreshOutcome {
        let _guard = RunningGuard::enter(&self.running);
        info!("Updating event cache...");

        match self.scrape_events().await {
            Ok(events) => RefreshOutcome::Published(self.cache.replace(events)),
            Err(e) => {
                error!("Failed to update event cache: {:#}", e);
                RefreshOutcome::Failed(format!("{e:#}"))
            }
        }
    }

    /// One full pipeline run: listing, then detail pages in waves.
    ///
    /// # Returns
    /// * `Result<Vec<EventRecord>>` - Every listed candidate, enriched where possible.
    ///   Errors only for failures that make the whole run unusable.
    pub async fn scrape_events(&self) -> Result<Vec<EventRecord>> {
        info!("Starting to scrape {} events...", self.site.name);

        let session = self
            .engine
            .launch(&self.settings.session)
            .await
            .context("browser launch failed")?;

        let result = self.scrape_with(session.as_ref()).await;

        if let Err(e) = session.close().await {
            warn!("Failed to close browser session: {}", e);
        }

        result
    }

    async fn scrape_with(&self, session: &dyn RenderSession) -> Result<Vec<EventRecord>> {
        let candidates = self.scrape_listing(session).await?;
        info!("Found {} events on the listing page", candidates.len());

        let enricher = DetailEnricher::new(
            Arc::clone(&self.site),
            self.settings.session.default_timeout,
            self.settings.detail_settle,
        );
        let total = candidates.len();

        let records = batch::run_in_waves(candidates, self.settings.concurrency, |index, candidate| {
            let enricher = &enricher;
            async move {
                info!(
                    "Scraping detail page for event {}/{}: {}",
                    index + 1,
                    total,
                    candidate.original_url
                );
                enricher.enrich(session, candidate).await
            }
        })
        .await;

        let degraded = records.iter().filter(|r| !r.is_enriched()).count();
        info!(
            "Finished scraping all detail pages ({} enriched, {} without details)",
            total - degraded,
            degraded
        );

        Ok(records)
    }

    async fn scrape_listing(&self, session: &dyn RenderSession) -> Result<Vec<EventCandidate>> {
        let scraped_at = Utc::now();
        let html = self.load_listing(session).await?;
        listing::extract_candidates(&self.site, &html, scraped_at)
    }

    async fn load_listing(&self, session: &dyn RenderSession) -> Result<String> {
        let url = self.site.listing_url();
        let page = session.new_page().await.context("could not open listing page")?;

        let html = self.read_listing(page.as_ref(), &url).await;

        if let Err(e) = page.close().await {
            debug!("Failed to close listing page: {}", e);
        }

        html
    }

    async fn read_listing(&self, page: &dyn PageContext, url: &str) -> Result<String> {
        info!("Navigating to {} listing page: {}", self.site.name, url);
        page.goto(url, WaitCondition::NetworkIdle, self.settings.session.listing_timeout)
            .await
            .context("listing navigation failed")?;

        if !self.settings.listing_settle.is_zero() {
            tokio::time::sleep(self.settings.listing_settle).await;
        }

        page.content().await.context("could not read listing page")
    }

    /// Load the listing page in a throwaway session and report what it contains.
    pub async fn probe_listing(&self) -> Result<ListingProbe> {
        info!("Starting debug scrape...");

        let session = self
            .engine
            .launch(&self.settings.session)
            .await
            .context("browser launch failed")?;

        let result = async {
            let url = self.site.listing_url();
            let html = self.load_listing(session.as_ref()).await?;
            listing::probe(&self.site, &url, &html)
        }
        .await;

        if let Err(e) = session.close().await {
            warn!("Failed to close browser session: {}", e);
        }

        result
    }
}

struct RunningGuard<'a>(&'a AtomicUsize);

impl<'a> RunningGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        let already_running = counter.fetch_add(1, Ordering::SeqCst);
        if already_running > 0 {
            warn!(
                "Refresh started while {} other refresh(es) are still running",
                already_running
            );
        }
        Self(counter)
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
