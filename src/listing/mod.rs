//! Listing page extraction.
//!
//! Cards are located with the site's ordered card selectors: the first
//! selector that matches anything is used for every card in the run. Each
//! field inside a card then goes through its own fallback list. A card that
//! cannot be turned into a candidate is logged and skipped without affecting
//! the others.

use anyhow::Result;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::dom;
use crate::models::EventCandidate;
use crate::scrapers::{SiteConfig, compile, compile_all};

/// Date reported for cards that do not show one
pub const DATE_UNKNOWN: &str = "Date TBA";

/// Price reported when a card shows no amount
pub const PRICE_PLACEHOLDER: &str = "See original listing";

/// Characters of card description kept before the ellipsis
pub const DESCRIPTION_BUDGET: usize = 200;

static SUMMARY_PRICE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$[\d,]+\.?\d*").expect("summary price pattern is valid"));

#[derive(Debug, Error)]
enum CardError {
    #[error("detail link {0:?} does not resolve to an http(s) URL")]
    UnresolvableLink(String),
}

struct CompiledSelectors {
    cards: Vec<(String, Selector)>,
    title: Vec<Selector>,
    date: Vec<Selector>,
    location: Vec<Selector>,
    link: Vec<Selector>,
    image: Vec<Selector>,
    description: Vec<Selector>,
}

impl CompiledSelectors {
    fn new(site: &SiteConfig) -> Result<Self> {
        let listing = &site.listing;
        let cards = listing
            .cards
            .iter()
            .map(|s| compile(s).map(|selector| (s.clone(), selector)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            cards,
            title: compile_all(&listing.title)?,
            date: compile_all(&listing.date)?,
            location: compile_all(&listing.location)?,
            link: compile_all(&listing.link)?,
            image: compile_all(&listing.image)?,
            description: compile_all(&listing.description)?,
        })
    }
}

/// Pull event candidates out of a rendered listing page, in DOM order.
///
/// # Arguments
/// * `site` - Site profile supplying selectors, origin and placeholders
/// * `html` - Serialized DOM of the listing page
/// * `scraped_at` - Run start time, stamped on every candidate and used in its id
///
/// # Returns
/// * `Result<Vec<EventCandidate>>` - Candidates with both a title and a detail URL;
///   an error only when the site profile itself has an invalid selector
pub fn extract_candidates(
    site: &SiteConfig,
    html: &str,
    scraped_at: DateTime<Utc>,
) -> Result<Vec<EventCandidate>> {
    let selectors = CompiledSelectors::new(site)?;
    let document = Html::parse_document(html);

    let Some((card_selector, cards)) = selectors.cards.iter().find_map(|(raw, selector)| {
        let found: Vec<ElementRef<'_>> = document.select(selector).collect();
        (!found.is_empty()).then_some((raw, found))
    }) else {
        info!("No event cards matched any selector on {}", site.name);
        return Ok(Vec::new());
    };

    info!(
        "Using card selector {} ({} cards on {})",
        card_selector,
        cards.len(),
        site.name
    );

    let mut candidates = Vec::with_capacity(cards.len());
    for (index, card) in cards.into_iter().enumerate() {
        match extract_card(site, &selectors, index, card, scraped_at) {
            Ok(Some(candidate)) => candidates.push(candidate),
            Ok(None) => debug!("Card {} has no title or detail link, skipping", index + 1),
            Err(e) => warn!("Error processing card {}: {}", index + 1, e),
        }
    }

    Ok(candidates)
}

fn extract_card(
    site: &SiteConfig,
    selectors: &CompiledSelectors,
    index: usize,
    card: ElementRef<'_>,
    scraped_at: DateTime<Utc>,
) -> std::result::Result<Option<EventCandidate>, CardError> {
    let Some(title) = dom::first_text(card, &selectors.title) else {
        return Ok(None);
    };
    let Some(href) = detail_href(card, &selectors.link) else {
        return Ok(None);
    };
    let original_url = dom::absolute_url(href, &site.origin)
        .ok_or_else(|| CardError::UnresolvableLink(href.to_string()))?;

    let date = dom::first_text(card, &selectors.date).unwrap_or_else(|| DATE_UNKNOWN.to_string());
    let location =
        dom::first_text(card, &selectors.location).unwrap_or_else(|| site.default_location.clone());

    let short_card_description = dom::first_text(card, &selectors.description).map_or_else(
        || site.description_placeholder.clone(),
        |text| dom::truncate_with_ellipsis(&text, DESCRIPTION_BUDGET),
    );

    let card_text = dom::visible_text(card);
    let price = SUMMARY_PRICE
        .find(&card_text)
        .map_or_else(|| PRICE_PLACEHOLDER.to_string(), |m| m.as_str().to_string());

    Ok(Some(EventCandidate {
        id: format!("event_{}_{}", index + 1, scraped_at.timestamp_millis()),
        title,
        date,
        location,
        image: image_url(card, &selectors.image, &site.origin),
        original_url,
        short_card_description,
        price,
        scraped_at,
    }))
}

fn detail_href<'a>(card: ElementRef<'a>, selectors: &[Selector]) -> Option<&'a str> {
    selectors.iter().find_map(|selector| {
        card.select(selector)
            .find_map(|link| link.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty())
    })
}

fn image_url(card: ElementRef<'_>, selectors: &[Selector], origin: &str) -> Option<String> {
    selectors.iter().find_map(|selector| {
        let element = card.select(selector).next()?;
        let attrs = element.value();

        let raw = ["src", "data-src", "data-original"]
            .iter()
            .filter_map(|name| attrs.attr(name))
            .map(str::trim)
            .find(|value| !value.is_empty())
            .map(ToString::to_string)
            .or_else(|| attrs.attr("srcset").and_then(dom::first_srcset_url))
            .or_else(|| attrs.attr("style").and_then(dom::background_image_url))?;

        let url = dom::normalize_url(&raw, origin);
        url.starts_with("http").then_some(url)
    })
}

/// Match counts for one card selector
#[derive(Debug, Clone, Serialize)]
pub struct SelectorCount {
    pub selector: String,
    pub count: usize,
}

/// Structural summary of a listing page, for diagnosing selector drift
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingProbe {
    pub title: Option<String>,
    pub url: String,
    pub html_length: usize,
    pub all_elements: usize,
    pub articles: usize,
    pub divs: usize,
    pub links: usize,
    pub event_links: usize,
    pub possible_event_selectors: Vec<SelectorCount>,
}

/// Count what the listing page contains without extracting anything.
pub fn probe(site: &SiteConfig, url: &str, html: &str) -> Result<ListingProbe> {
    let document = Html::parse_document(html);
    let count = |selector: &str| -> Result<usize> { Ok(document.select(&compile(selector)?).count()) };

    let event_link = site
        .listing
        .link
        .first()
        .map_or(r#"a[href*="/e/"]"#, String::as_str);

    let mut possible = Vec::with_capacity(site.listing.cards.len() + 2);
    for selector in site
        .listing
        .cards
        .iter()
        .map(String::as_str)
        .chain(["article", event_link])
    {
        possible.push(SelectorCount {
            selector: selector.to_string(),
            count: count(selector)?,
        });
    }

    let title = document
        .select(&compile("title")?)
        .next()
        .map(dom::visible_text)
        .filter(|t| !t.is_empty());

    Ok(ListingProbe {
        title,
        url: url.to_string(),
        html_length: html.len(),
        all_elements: count("*")?,
        articles: count("article")?,
        divs: count("div")?,
        links: count("a")?,
        event_links: count(event_link)?,
        possible_event_selectors: possible,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::eventbrite;
    use chrono::TimeZone;

    fn run_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap()
    }

    const TESTID_LISTING: &str = r#"
        <html><body>
          <ul>
            <li>
              <article data-testid="search-event-card">
                <a href="/e/harbour-jazz-night-111"><img src="//img.evbuc.com/jazz.jpg"></a>
                <h3>Harbour Jazz Night</h3>
                <p class="event-date">Sat, Jun 14, 7:00 PM</p>
                <p data-testid="event-location">The Basement</p>
                <div data-testid="event-description">An evening of live jazz by the water.</div>
                <p>From $25.00</p>
              </article>
            </li>
            <li>
              <article data-testid="search-event-card">
                <a href="https://www.eventbrite.com/e/startup-breakfast-222">
                  <div style="background-image: url('/images/breakfast.png')"></div>
                </a>
                <h2>Startup Breakfast</h2>
              </article>
            </li>
            <li>
              <article data-testid="search-event-card">
                <a href="/e/untitled-333"></a>
              </article>
            </li>
            <li>
              <article data-testid="search-event-card">
                <h3>No link here</h3>
              </article>
            </li>
          </ul>
          <div class="event-card"><h3>Other layout</h3><a href="/e/other-444"></a></div>
        </body></html>
    "#;

    #[test]
    fn test_extracts_cards_from_first_matching_selector() {
        let candidates = extract_candidates(&eventbrite(), TESTID_LISTING, run_at()).unwrap();

        // The .event-card element belongs to a lower-priority selector and is ignored
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].title, "Harbour Jazz Night");
        assert_eq!(candidates[1].title, "Startup Breakfast");
    }

    #[test]
    fn test_card_fields() {
        let candidates = extract_candidates(&eventbrite(), TESTID_LISTING, run_at()).unwrap();
        let jazz = &candidates[0];

        assert_eq!(jazz.id, format!("event_1_{}", run_at().timestamp_millis()));
        assert_eq!(
            jazz.original_url,
            "https://www.eventbrite.com/e/harbour-jazz-night-111"
        );
        assert_eq!(jazz.image.as_deref(), Some("https://img.evbuc.com/jazz.jpg"));
        assert_eq!(jazz.date, "Sat, Jun 14, 7:00 PM");
        assert_eq!(jazz.location, "The Basement");
        assert_eq!(
            jazz.short_card_description,
            "An evening of live jazz by the water...."
        );
        assert_eq!(jazz.price, "$25.00");
        assert_eq!(jazz.scraped_at, run_at());
    }

    #[test]
    fn test_card_defaults() {
        let candidates = extract_candidates(&eventbrite(), TESTID_LISTING, run_at()).unwrap();
        let breakfast = &candidates[1];

        assert_eq!(breakfast.id, format!("event_2_{}", run_at().timestamp_millis()));
        assert_eq!(breakfast.date, DATE_UNKNOWN);
        assert_eq!(breakfast.location, "Sydney, Australia");
        assert_eq!(
            breakfast.short_card_description,
            "Click to view full details on Eventbrite"
        );
        assert_eq!(breakfast.price, PRICE_PLACEHOLDER);
        assert_eq!(
            breakfast.image.as_deref(),
            Some("https://www.eventbrite.com/images/breakfast.png")
        );
    }

    #[test]
    fn test_falls_back_to_generic_class_selector() {
        let html = r#"
            <div class="eds-event-card">
              <div class="card-title">Night Market</div>
              <a href="https://www.eventbrite.com.au/e/night-market-1">Tickets</a>
              <img data-src="https://cdn.evbstatic.com/market.jpg">
              <span class="card-text">Street food, music and more</span>
            </div>
        "#;
        let candidates = extract_candidates(&eventbrite(), html, run_at()).unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].title, "Night Market");
        assert_eq!(
            candidates[0].image.as_deref(),
            Some("https://cdn.evbstatic.com/market.jpg")
        );
        assert_eq!(
            candidates[0].short_card_description,
            "Street food, music and more..."
        );
    }

    #[test]
    fn test_link_falls_back_to_any_anchor() {
        let html = r#"
            <div class="event-card">
              <h4>Members Only Mixer</h4>
              <a href="/o/organizer-9">Organizer</a>
            </div>
        "#;
        let candidates = extract_candidates(&eventbrite(), html, run_at()).unwrap();

        assert_eq!(
            candidates[0].original_url,
            "https://www.eventbrite.com/o/organizer-9"
        );
    }

    #[test]
    fn test_unresolvable_link_drops_only_that_card() {
        let html = r#"
            <div class="event-card"><h3>Broken</h3><a href="javascript:void(0)">x</a></div>
            <div class="event-card"><h3>Fine</h3><a href="/e/fine-1">x</a></div>
        "#;
        let candidates = extract_candidates(&eventbrite(), html, run_at()).unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].title, "Fine");
        assert_eq!(candidates[0].id, format!("event_2_{}", run_at().timestamp_millis()));
    }

    #[test]
    fn test_long_description_is_truncated() {
        let long = "x".repeat(450);
        let html = format!(
            r#"<div class="event-card"><h3>Talk</h3><a href="/e/t"></a><p class="card-text">{long}</p></div>"#
        );
        let candidates = extract_candidates(&eventbrite(), &html, run_at()).unwrap();

        let description = &candidates[0].short_card_description;
        assert_eq!(description.chars().count(), DESCRIPTION_BUDGET + 3);
        assert!(description.ends_with("..."));
    }

    #[test]
    fn test_no_matching_cards_yields_empty_set() {
        let html = "<html><body><main><p>Nothing to see</p></main></body></html>";
        let candidates = extract_candidates(&eventbrite(), html, run_at()).unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_probe_counts_selectors() {
        let probe = probe(
            &eventbrite(),
            "https://www.eventbrite.com/d/australia--sydney/events/",
            &format!("<html><head><title>Events in Sydney</title></head>{TESTID_LISTING}</html>"),
        )
        .unwrap();

        assert_eq!(probe.title.as_deref(), Some("Events in Sydney"));
        assert_eq!(probe.articles, 4);
        assert_eq!(probe.event_links, 4);
        assert_eq!(probe.possible_event_selectors[0].count, 4);
        assert_eq!(probe.possible_event_selectors[3].selector, ".event-card");
        assert_eq!(probe.possible_event_selectors[3].count, 1);
        assert_eq!(
            probe.possible_event_selectors.last().unwrap().selector,
            r#"a[href*="/e/"]"#
        );
    }
}
