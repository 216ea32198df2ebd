//! Data models for scraped events and the JSON payloads served over HTTP

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An event summary pulled from one card on the listing page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCandidate {
    pub id: String,
    pub title: String,
    pub date: String,
    pub location: String,
    pub image: Option<String>,
    pub original_url: String,
    pub short_card_description: String,
    pub price: String,
    pub scraped_at: DateTime<Utc>,
}

/// Fields only available on an event's own detail page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetails {
    pub start_time: Option<String>,
    pub human_date: Option<String>,
    pub venue_name: Option<String>,
    pub venue_address: String,
    pub tags: Vec<String>,
}

/// A candidate after its detail page has been visited.
///
/// `details` is `None` when the visit failed; the summary fields are then
/// exactly what the listing page produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    #[serde(flatten)]
    pub event: EventCandidate,
    #[serde(flatten)]
    pub details: Option<EventDetails>,
}

impl EventRecord {
    /// Wraps a candidate whose detail page could not be scraped.
    pub fn degraded(event: EventCandidate) -> Self {
        Self {
            event,
            details: None,
        }
    }

    /// Merges detail fields into the candidate. The detail price, when
    /// present, replaces the summary price.
    pub fn enriched(mut event: EventCandidate, details: EventDetails, price: Option<String>) -> Self {
        if let Some(price) = price {
            event.price = price;
        }
        Self {
            event,
            details: Some(details),
        }
    }

    pub fn is_enriched(&self) -> bool {
        self.details.is_some()
    }
}

/// The complete result of one successful refresh.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub events: Vec<EventRecord>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// `GET /api/events` and `POST /api/events/refresh` body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsResponse<'a> {
    pub success: bool,
    pub events: &'a [EventRecord],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refreshed: Option<bool>,
    pub last_updated: Option<String>,
    pub total_events: usize,
}

/// `GET /api/health` body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: String,
    pub cached_events: usize,
    pub last_scraped: Option<String>,
    pub refresh_state: String,
}

/// `POST /api/collect-email` body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSubmission {
    pub email: Option<String>,
    pub event_id: Option<String>,
    pub event_title: Option<String>,
}

/// Plain `{success, message}` acknowledgement
#[derive(Debug, Serialize)]
pub struct Acknowledgement {
    pub success: bool,
    pub message: String,
}

/// Error body shared by every route
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            message: None,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
