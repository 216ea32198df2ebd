//! JSON read interface over the snapshot cache.
//!
//! Routes:
//! - `GET  /api/events` - current snapshot, or 503 until the first refresh succeeds
//! - `POST /api/events/refresh` - run a refresh now and return the result
//! - `GET  /api/health` - liveness plus cache and refresh status
//! - `GET  /api/debug-scrape` - listing page selector diagnostics
//! - `POST /api/collect-email` - record interest in an event

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, SecondsFormat, Utc};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::cache::SnapshotView;
use crate::event_finder::{EventFinder, RefreshOutcome};
use crate::models::{
    Acknowledgement, EmailSubmission, ErrorResponse, EventsResponse, HealthResponse, Snapshot,
};

/// Build the router. `finder` is the only state the handlers need.
pub fn router(finder: EventFinder) -> Router {
    Router::new()
        .route("/api/events", get(list_events))
        .route("/api/events/refresh", post(refresh_events))
        .route("/api/health", get(health))
        .route("/api/debug-scrape", get(debug_scrape))
        .route("/api/collect-email", post(collect_email))
        .layer(CorsLayer::permissive())
        .with_state(finder)
}

fn iso(timestamp: Option<DateTime<Utc>>) -> Option<String> {
    timestamp.map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn events_body(snapshot: &Snapshot, refreshed: Option<bool>) -> Response {
    Json(EventsResponse {
        success: true,
        events: &snapshot.events,
        refreshed,
        last_updated: iso(snapshot.completed_at),
        total_events: snapshot.events.len(),
    })
    .into_response()
}

async fn list_events(State(finder): State<EventFinder>) -> Response {
    match finder.snapshot() {
        SnapshotView::Ready(snapshot) => events_body(&snapshot, None),
        SnapshotView::NotYetAvailable => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new(
                "Events not yet available. Please try again in a few moments.",
            )),
        )
            .into_response(),
    }
}

async fn refresh_events(State(finder): State<EventFinder>) -> Response {
    info!("Force refreshing events (manual trigger)...");

    // A started run finishes even if the client goes away
    let run = tokio::spawn(async move { finder.refresh_now().await });

    let outcome = match run.await {
        Ok(outcome) => outcome,
        Err(e) => RefreshOutcome::Failed(format!("refresh task failed: {e}")),
    };

    match outcome {
        RefreshOutcome::Published(snapshot) => events_body(&snapshot, Some(true)),
        RefreshOutcome::Failed(message) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("Failed to refresh events").with_message(message)),
        )
            .into_response(),
    }
}

async fn health(State(finder): State<EventFinder>) -> Json<HealthResponse> {
    let snapshot = finder.cache().read();

    Json(HealthResponse {
        success: true,
        message: "Server is running".to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        cached_events: snapshot.events.len(),
        last_scraped: iso(snapshot.completed_at),
        refresh_state: finder.state().as_str().to_string(),
    })
}

async fn debug_scrape(State(finder): State<EventFinder>) -> Response {
    let probe = tokio::spawn(async move { finder.probe_listing().await });

    match probe.await.map_err(anyhow::Error::from).and_then(|result| result) {
        Ok(probe) => Json(serde_json::json!({
            "success": true,
            "debugInfo": probe,
            "message": "Debug scrape completed",
        }))
        .into_response(),
        Err(e) => {
            error!("Debug scrape failed: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(format!("{e:#}"))),
            )
                .into_response()
        }
    }
}

async fn collect_email(Json(submission): Json<EmailSubmission>) -> Response {
    let (Some(email), Some(event_id)) = (non_blank(&submission.email), non_blank(&submission.event_id))
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Email and eventId are required")),
        )
            .into_response();
    };

    info!(
        "Email collected: {} for event {} ({})",
        email,
        event_id,
        submission.event_title.as_deref().unwrap_or("untitled")
    );

    Json(Acknowledgement {
        success: true,
        message: "Email collected successfully".to_string(),
    })
    .into_response()
}

fn non_blank(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|value| !value.is_empty())
}
