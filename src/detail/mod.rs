//! Detail page enrichment.
//!
//! Every candidate gets its own page context. Whatever goes wrong while
//! visiting it (navigation error, timeout, closed page) is logged and the
//! candidate comes back unchanged as a degraded record.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use tracing::{debug, warn};

use crate::dom;
use crate::models::{EventCandidate, EventDetails, EventRecord};
use crate::scrapers::{SiteConfig, compile};
use crate::traits::{PageContext, RenderSession, WaitCondition};

/// Address reported when the detail page has no venue block
pub const VENUE_NOT_FOUND: &str = "Venue details not found";

static DETAIL_PRICE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(Free|from\s*\$\d+|Starting\s*at\s*\$\d+|\$\d+)")
        .expect("detail price pattern is valid")
});

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Fields read from one detail page. `price` is `None` when the page shows none.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailExtraction {
    pub details: EventDetails,
    pub price: Option<String>,
}

/// Visits detail pages and merges what it finds into candidates
#[derive(Debug, Clone)]
pub struct DetailEnricher {
    site: Arc<SiteConfig>,
    timeout: Duration,
    settle: Duration,
}

impl DetailEnricher {
    /// # Arguments
    /// * `site` - Profile supplying the detail selectors
    /// * `timeout` - Navigation timeout for each detail page
    /// * `settle` - Pause after DOM ready so client-side rendering can finish
    pub fn new(site: Arc<SiteConfig>, timeout: Duration, settle: Duration) -> Self {
        Self {
            site,
            timeout,
            settle,
        }
    }

    /// Enrich one candidate. Never fails: on any error the candidate is
    /// returned as a degraded record.
    pub async fn enrich(&self, session: &dyn RenderSession, candidate: EventCandidate) -> EventRecord {
        match self.scrape(session, &candidate.original_url).await {
            Ok(DetailExtraction { details, price }) => EventRecord::enriched(candidate, details, price),
            Err(e) => {
                warn!(
                    "Failed to scrape detail for {} ({}): {:#}",
                    candidate.id, candidate.original_url, e
                );
                EventRecord::degraded(candidate)
            }
        }
    }

    async fn scrape(&self, session: &dyn RenderSession, url: &str) -> Result<DetailExtraction> {
        let page = session.new_page().await.context("could not open page context")?;

        let outcome = self.visit(page.as_ref(), url).await;

        if let Err(e) = page.close().await {
            debug!("Failed to close detail page for {}: {}", url, e);
        }

        outcome
    }

    async fn visit(&self, page: &dyn PageContext, url: &str) -> Result<DetailExtraction> {
        page.goto(url, WaitCondition::DomReady, self.timeout).await?;
        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }
        let html = page.content().await?;

        extract_details(&self.site, &html)
    }
}

/// Read start time, date, price, venue and tags from a rendered detail page.
pub fn extract_details(site: &SiteConfig, html: &str) -> Result<DetailExtraction> {
    let selectors = &site.detail;
    let start_time_sel = compile(&selectors.start_time)?;
    let start_label_sel = compile(&selectors.start_date_label)?;
    let human_date_sel = compile(&selectors.human_date)?;
    let price_sel = compile(&selectors.price)?;
    let venue_name_sel = compile(&selectors.venue_name)?;
    let venue_block_sel = compile(&selectors.venue_block)?;
    let tags_sel = compile(&selectors.tags)?;
    let body_sel = compile("body")?;

    let document = Html::parse_document(html);
    let root = document.root_element();
    // The page title often mentions "Free" or a price of its own
    let body = root.select(&body_sel).next().unwrap_or(root);

    let start_time = root
        .select(&start_time_sel)
        .find_map(|time| time.value().attr("datetime").map(ToString::to_string))
        .or_else(|| dom::first_text(root, std::slice::from_ref(&start_label_sel)))
        .and_then(|raw| normalize_start_time(&raw));

    let human_date = dom::first_text(root, std::slice::from_ref(&human_date_sel));

    let price = dom::first_text(root, std::slice::from_ref(&price_sel)).or_else(|| {
        let page_text = dom::visible_text(body);
        DETAIL_PRICE.find(&page_text).map(|m| m.as_str().to_string())
    });

    let venue_name = dom::first_text(root, std::slice::from_ref(&venue_name_sel));
    let venue_lines = root.select(&venue_block_sel).next().map(dom::text_lines);
    let (venue_name, venue_address) = split_venue(venue_name, venue_lines);

    let tags = root
        .select(&tags_sel)
        .map(dom::visible_text)
        .filter(|tag| !tag.is_empty())
        .collect();

    Ok(DetailExtraction {
        details: EventDetails {
            start_time,
            human_date,
            venue_name,
            venue_address,
            tags,
        },
        price,
    })
}

/// Work out venue name and address from a dedicated name element and a
/// combined address block.
///
/// When the block repeats the name on its first line that line is dropped
/// from the address. Without a name element, a multi-line block is split
/// into name (first line) and address (the rest).
fn split_venue(name: Option<String>, block: Option<Vec<String>>) -> (Option<String>, String) {
    let Some(lines) = block.filter(|lines| !lines.is_empty()) else {
        return (name, VENUE_NOT_FOUND.to_string());
    };

    match name {
        Some(name) => {
            let address = if lines.join("\n").starts_with(&name) {
                lines[1..].join(", ")
            } else {
                lines.join(", ")
            };
            let address = if address.is_empty() {
                VENUE_NOT_FOUND.to_string()
            } else {
                address
            };
            (Some(name), address)
        }
        None if lines.len() > 1 => (Some(lines[0].clone()), lines[1..].join(", ")),
        None => (None, lines.join(", ")),
    }
}

/// Normalize a scraped timestamp to ISO-8601, or `None` if it is not one.
pub fn normalize_start_time(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.to_rfc3339());
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.format("%Y-%m-%dT%H:%M:%S").to_string());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|date| date.format("%Y-%m-%d").to_string())
}
