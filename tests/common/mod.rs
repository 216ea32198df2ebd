//! In-memory rendering engine for driving the pipeline without a browser.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use event_finder::error::{RenderError, Result};
use event_finder::scrapers::eventbrite;
use event_finder::traits::{PageContext, RenderEngine, RenderSession, SessionConfig, WaitCondition};
use event_finder::{EventFinder, PipelineSettings, SnapshotCache};

pub const LISTING_URL: &str = "https://www.eventbrite.com/d/australia--sydney/events/";

/// What navigating to a URL produces
#[derive(Debug, Clone)]
pub enum FakePage {
    Html(String),
    Timeout,
    Fail,
}

#[derive(Debug, Default)]
pub struct Stats {
    pub launches: AtomicUsize,
    pub sessions_closed: AtomicUsize,
    pub pages_opened: AtomicUsize,
    pub pages_closed: AtomicUsize,
    pub open_now: AtomicUsize,
    pub max_open: AtomicUsize,
    pub visited: Mutex<Vec<(String, WaitCondition)>>,
}

impl Stats {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Default)]
pub struct FakeEngine {
    pages: Arc<Mutex<HashMap<String, FakePage>>>,
    fail_launch: Arc<AtomicBool>,
    latency: Duration,
    listing_delay: Duration,
    pub stats: Arc<Stats>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            latency: Duration::from_millis(5),
            ..Self::default()
        }
    }

    pub fn with_listing_delay(mut self, delay: Duration) -> Self {
        self.listing_delay = delay;
        self
    }

    pub fn page(self, url: &str, page: FakePage) -> Self {
        self.set_page(url, page);
        self
    }

    pub fn set_page(&self, url: &str, page: FakePage) {
        self.pages.lock().unwrap().insert(url.to_string(), page);
    }

    pub fn set_fail_launch(&self, fail: bool) {
        self.fail_launch.store(fail, Ordering::SeqCst);
    }

    pub fn visited_urls(&self) -> Vec<String> {
        self.stats
            .visited
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }
}

#[async_trait]
impl RenderEngine for FakeEngine {
    async fn launch(&self, _config: &SessionConfig) -> Result<Box<dyn RenderSession>> {
        self.stats.launches.fetch_add(1, Ordering::SeqCst);
        if self.fail_launch.load(Ordering::SeqCst) {
            return Err(RenderError::Launch("no chromium binary found".to_string()));
        }
        Ok(Box::new(FakeSession {
            engine: self.clone(),
        }))
    }
}

struct FakeSession {
    engine: FakeEngine,
}

#[async_trait]
impl RenderSession for FakeSession {
    async fn new_page(&self) -> Result<Box<dyn PageContext>> {
        let stats = &self.engine.stats;
        stats.pages_opened.fetch_add(1, Ordering::SeqCst);
        let now = stats.open_now.fetch_add(1, Ordering::SeqCst) + 1;
        stats.max_open.fetch_max(now, Ordering::SeqCst);

        Ok(Box::new(FakePageContext {
            engine: self.engine.clone(),
            document: Mutex::new(None),
        }))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.engine.stats.sessions_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakePageContext {
    engine: FakeEngine,
    document: Mutex<Option<String>>,
}

#[async_trait]
impl PageContext for FakePageContext {
    async fn goto(&self, url: &str, wait: WaitCondition, timeout: Duration) -> Result<()> {
        self.engine
            .stats
            .visited
            .lock()
            .unwrap()
            .push((url.to_string(), wait));

        let delay = if url == LISTING_URL {
            self.engine.listing_delay
        } else {
            self.engine.latency
        };
        tokio::time::sleep(delay).await;

        let page = self.engine.pages.lock().unwrap().get(url).cloned();
        match page {
            Some(FakePage::Html(html)) => {
                *self.document.lock().unwrap() = Some(html);
                Ok(())
            }
            Some(FakePage::Timeout) => Err(RenderError::Timeout {
                url: url.to_string(),
                after: timeout,
            }),
            Some(FakePage::Fail) | None => Err(RenderError::Navigation {
                url: url.to_string(),
                message: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            }),
        }
    }

    async fn content(&self) -> Result<String> {
        self.document
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| RenderError::Page("no document loaded".to_string()))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.engine.stats.open_now.fetch_sub(1, Ordering::SeqCst);
        self.engine.stats.pages_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn detail_url(n: usize) -> String {
    format!("https://www.eventbrite.com/e/sydney-event-{n}")
}

/// Listing page with `n` search cards linking to `detail_url(1..=n)`
pub fn listing_html(n: usize) -> String {
    let cards: String = (1..=n)
        .map(|i| {
            format!(
                r#"<li><article data-testid="search-event-card">
                     <a href="/e/sydney-event-{i}"><img src="https://img.evbuc.com/{i}.jpg"></a>
                     <h3>Sydney Event {i}</h3>
                     <p class="event-date">Fri, Jun {i}, 6:00 PM</p>
                     <p>From ${i}0.00</p>
                   </article></li>"#
            )
        })
        .collect();
    format!("<html><head><title>Events in Sydney</title></head><body><ul>{cards}</ul></body></html>")
}

pub fn detail_html(n: usize) -> String {
    format!(
        r#"<html><body>
             <time datetime="2025-06-{n:02}T18:00:00+10:00">Fri</time>
             <div class="date-info__full-datetime">Friday, June {n} · 6 - 9pm AEST</div>
             <div class="js-display-price">A${n}5</div>
             <div class="location-info__address">
               <p>Venue {n}</p>
               <p>{n} George St, Sydney</p>
             </div>
             <ul><li class="tags-item"><a class="tags-link">Tag {n}</a></li></ul>
           </body></html>"#
    )
}

/// Engine serving a listing of `n` events, each with a working detail page
pub fn site_with_events(n: usize) -> FakeEngine {
    let engine = FakeEngine::new().page(LISTING_URL, FakePage::Html(listing_html(n)));
    for i in 1..=n {
        engine.set_page(&detail_url(i), FakePage::Html(detail_html(i)));
    }
    engine
}

pub fn test_settings() -> PipelineSettings {
    PipelineSettings {
        session: SessionConfig::default(),
        concurrency: 3,
        listing_settle: Duration::ZERO,
        detail_settle: Duration::ZERO,
    }
}

pub fn finder(engine: &FakeEngine) -> EventFinder {
    EventFinder::new(
        Arc::new(engine.clone()),
        eventbrite(),
        test_settings(),
        Arc::new(SnapshotCache::new()),
    )
}
