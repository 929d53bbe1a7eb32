//! Webhook handling for Warden.
//!
//! Receives GitHub and Travis CI deliveries and runs the matching handlers.
//! Each delivery is processed inline; a failing handler aborts the rest of
//! the delivery and is reported through the response status, so the
//! sender's redelivery takes care of retries.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::Instrument;
use warden_common::logging::generate_delivery_id;
use warden_common::{Error, Result};

use crate::assign::assign_reviewer;
use crate::ci_status::{report_ci_status, CiStatusEvent};
use crate::context::BotContext;
use crate::fix_commit::check_references;
use crate::github::PullRequestEvent;
use crate::labels::reconcile_labels;
use crate::warnings::resolve_warnings;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// Webhook handler state.
#[derive(Clone)]
pub struct WebhookState {
    pub context: Arc<BotContext>,
}

impl WebhookState {
    pub fn new(context: BotContext) -> Self {
        Self {
            context: Arc::new(context),
        }
    }
}

/// Webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
    pub event: String,
    /// Handlers that ran, in order
    pub handled: Vec<&'static str>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

/// Build webhook routes.
pub fn webhook_routes(state: WebhookState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhook/github", post(github_webhook))
        .route("/webhook/ci", post(ci_webhook))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        service: "warden-workflow",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|h| h.to_str().ok())
}

fn error_status(err: Error) -> StatusCode {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        tracing::error!(error = %err, "Webhook delivery failed");
    } else {
        tracing::warn!(error = %err, status = status.as_u16(), "Webhook delivery rejected");
    }
    status
}

/// GitHub webhook handler.
async fn github_webhook(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> std::result::Result<Json<WebhookResponse>, StatusCode> {
    let event_type = header(&headers, "X-GitHub-Event")
        .unwrap_or("unknown")
        .to_string();
    let delivery_id = header(&headers, "X-GitHub-Delivery")
        .map(String::from)
        .unwrap_or_else(generate_delivery_id);

    let payload: serde_json::Value =
        serde_json::from_slice(&body).map_err(|_| StatusCode::BAD_REQUEST)?;

    let span = tracing::info_span!("delivery", event = %event_type, delivery_id = %delivery_id);
    let handled = async {
        tracing::info!("Received GitHub webhook event");
        dispatch(&state.context, &event_type, payload).await
    }
    .instrument(span)
    .await
    .map_err(error_status)?;

    Ok(Json(WebhookResponse {
        status: "ok",
        event: event_type,
        handled,
    }))
}

/// Travis CI webhook handler.
async fn ci_webhook(
    State(state): State<WebhookState>,
    body: Bytes,
) -> std::result::Result<Json<WebhookResponse>, StatusCode> {
    let event: CiStatusEvent =
        serde_json::from_slice(&body).map_err(|_| StatusCode::BAD_REQUEST)?;

    let delivery_id = generate_delivery_id();
    let span = tracing::info_span!("delivery", event = "ci", delivery_id = %delivery_id);
    let commented = report_ci_status(&state.context, &event)
        .instrument(span)
        .await
        .map_err(error_status)?;

    Ok(Json(WebhookResponse {
        status: "ok",
        event: "ci".into(),
        handled: if commented { vec!["ci_status"] } else { vec![] },
    }))
}

// ============================================================================
// Dispatch
// ============================================================================

/// Run the handlers for one GitHub delivery.
///
/// Returns the names of the handlers that ran. Handlers run in order and the
/// first error aborts the remaining ones.
pub async fn dispatch(
    ctx: &BotContext,
    event_type: &str,
    payload: serde_json::Value,
) -> Result<Vec<&'static str>> {
    let mut handled = Vec::new();

    match event_type {
        "pull_request" => {
            let event: PullRequestEvent = serde_json::from_value(payload)?;
            let repo = event.repository.repo_ref();
            let action = event.action.as_str();
            tracing::debug!(pr = event.pr_number(), action, "Pull request event");

            if matches!(action, "opened" | "reopened" | "synchronize" | "closed") {
                reconcile_labels(ctx, &event).await?;
                handled.push("labels");
            }
            if matches!(action, "opened" | "synchronize" | "edited") {
                check_references(ctx, &repo, &event.pull_request, action == "opened").await?;
                handled.push("references");
            }
            if matches!(action, "synchronize" | "edited") {
                resolve_warnings(ctx, &repo, &event.pull_request).await?;
                handled.push("warnings");
            }
            if action == "review_requested" {
                assign_reviewer(ctx, &event).await?;
                handled.push("assign");
            }
        }
        "pull_request_review" => {
            let event: PullRequestEvent = serde_json::from_value(payload)?;
            if event.action == "submitted" {
                reconcile_labels(ctx, &event).await?;
                handled.push("labels");
            }
        }
        "ping" => tracing::info!("Webhook ping received"),
        other => tracing::debug!(event_type = other, "Ignoring unhandled event"),
    }

    Ok(handled)
}
