//! Eventbrite site profile

use super::{DetailSelectors, ListingSelectors, SiteConfig};

fn list(selectors: &[&str]) -> Vec<String> {
    selectors.iter().map(ToString::to_string).collect()
}

/// Profile for Eventbrite's "events near a city" discovery pages
pub fn eventbrite() -> SiteConfig {
    SiteConfig {
        name: "Eventbrite".to_string(),
        origin: "https://www.eventbrite.com".to_string(),
        listing_url_pattern: "https://www.eventbrite.com/d/{location}/events/".to_string(),
        location: "australia--sydney".to_string(),
        default_location: "Sydney, Australia".to_string(),
        description_placeholder: "Click to view full details on Eventbrite".to_string(),
        listing: ListingSelectors {
            cards: list(&[
                r#"article[data-testid="search-event-card"]"#,
                r#"[data-testid="search-event-card"]"#,
                ".search-event-card",
                ".event-card",
                ".discover-search-desktop-card",
                ".eds-event-card",
            ]),
            title: list(&[
                "h1",
                "h2",
                "h3",
                "h4",
                r#"[data-testid*="title"]"#,
                r#"[class*="title"]"#,
                ".event-card__formatted-name--is-clamped",
            ]),
            date: list(&["time", r#"[data-testid*="date"]"#, r#"[class*="date"]"#]),
            location: list(&[
                r#"[data-testid*="location"]"#,
                r#"[class*="location"]"#,
                r#"[class*="venue"]"#,
            ]),
            link: list(&[r#"a[href*="/e/"]"#, "a"]),
            image: list(&[
                r#"img[src*="eventbrite"]"#,
                r#"img[src*="eb.com"]"#,
                r#"img[class*="event"]"#,
                "img",
                r#"[style*="background-image"]"#,
            ]),
            description: list(&[
                r#"[data-testid*="description"]"#,
                ".card-text",
                ".event-card__description-block",
            ]),
        },
        detail: DetailSelectors {
            start_time: "time[datetime]".to_string(),
            start_date_label: r#"[data-automation="event-details-start-date"]"#.to_string(),
            human_date: ".date-info__full-datetime".to_string(),
            price: ".js-display-price".to_string(),
            venue_name: ".location-info__address-text".to_string(),
            venue_block: ".location-info__address".to_string(),
            tags: "ul li.tags-item a.tags-link".to_string(),
        },
    }
}
