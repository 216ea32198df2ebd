//! Site profiles: where to scrape and which selectors to try, in priority order

use anyhow::{Result, anyhow};
use scraper::Selector;

pub mod eventbrite;

pub use eventbrite::eventbrite;

/// Configuration for one event listing site
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Display name for the website
    pub name: String,
    /// Scheme and host used to absolutize relative URLs
    pub origin: String,
    /// Listing URL pattern with a {location} placeholder
    pub listing_url_pattern: String,
    /// Location slug substituted into the listing URL
    pub location: String,
    /// Location reported for cards that do not show one
    pub default_location: String,
    /// Description reported for cards that do not show one
    pub description_placeholder: String,
    /// Selectors for the listing page
    pub listing: ListingSelectors,
    /// Selectors for an event's detail page
    pub detail: DetailSelectors,
}

/// Ordered fallback selectors for listing cards.
///
/// Each list is tried front to back and the first selector that yields a
/// usable match wins.
#[derive(Debug, Clone)]
pub struct ListingSelectors {
    /// Card container candidates; the first one with any match is used for the whole run
    pub cards: Vec<String>,
    pub title: Vec<String>,
    pub date: Vec<String>,
    pub location: Vec<String>,
    /// Detail link candidates; the first is the canonical detail-URL pattern
    pub link: Vec<String>,
    pub image: Vec<String>,
    pub description: Vec<String>,
}

/// Selectors for fields on an event's detail page
#[derive(Debug, Clone)]
pub struct DetailSelectors {
    /// Element carrying a machine-readable `datetime` attribute
    pub start_time: String,
    /// Labeled start date used when no `datetime` attribute exists
    pub start_date_label: String,
    pub human_date: String,
    pub price: String,
    pub venue_name: String,
    /// Combined name and address block
    pub venue_block: String,
    pub tags: String,
}

impl SiteConfig {
    /// Build the listing URL for the configured location
    ///
    /// # Returns
    /// * `String` - The complete listing URL
    pub fn listing_url(&self) -> String {
        let encoded = urlencoding::encode(&self.location);
        self.listing_url_pattern.replace("{location}", &encoded)
    }

    /// Check that every selector in the profile parses.
    pub fn validate(&self) -> Result<()> {
        let listing = &self.listing;
        let detail = &self.detail;

        let groups: [(&str, &[String]); 7] = [
            ("cards", &listing.cards),
            ("title", &listing.title),
            ("date", &listing.date),
            ("location", &listing.location),
            ("link", &listing.link),
            ("image", &listing.image),
            ("description", &listing.description),
        ];
        for (field, selectors) in groups {
            compile_all(selectors).map_err(|e| anyhow!("{} listing {}: {}", self.name, field, e))?;
        }

        for selector in [
            &detail.start_time,
            &detail.start_date_label,
            &detail.human_date,
            &detail.price,
            &detail.venue_name,
            &detail.venue_block,
            &detail.tags,
        ] {
            compile(selector).map_err(|e| anyhow!("{} detail: {}", self.name, e))?;
        }

        Ok(())
    }
}

/// Parse a single selector
pub fn compile(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow!("Failed to parse selector {:?}: {:?}", selector, e))
}

/// Parse an ordered selector list, keeping its order
pub fn compile_all(selectors: &[String]) -> Result<Vec<Selector>> {
    selectors.iter().map(|s| compile(s)).collect()
}
