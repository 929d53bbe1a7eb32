//! Warden Workflow - Pull request automation bot.
//!
//! This crate provides:
//! - Review-status labels driven by pull request and review events
//! - Size bucket labels
//! - Closing-keyword issue references and the fix-commit warning
//! - Retraction of stale warning comments
//! - Label propagation onto referenced issues
//! - Travis CI build comments and reviewer assignment
//! - The webhook HTTP surface

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod api;
pub mod assign;
pub mod ci_status;
pub mod context;
pub mod fix_commit;
pub mod github;
pub mod labels;
pub mod memory;
pub mod propagation;
pub mod references;
pub mod review_state;
pub mod size;
pub mod templates;
pub mod warnings;
pub mod webhook;

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;
use warden_common::config::Config;

pub use api::{IssueApi, PullRequest, RepoRef};
pub use context::BotContext;
pub use github::{GitHubClient, PullRequestEvent};
pub use labels::{reconcile_labels, LabelOutcome};
pub use memory::{ApiCall, InMemoryIssueApi};
pub use references::{find_references, ReferenceSearch, ReferenceSet};
pub use review_state::{review_transition, ReviewAction, ReviewLabels};
pub use templates::{Template, TemplateRegistry};
pub use warnings::{resolve_warnings, ResolutionReport, Warning};
pub use webhook::{dispatch, webhook_routes, WebhookState};

// ============================================================================
// Warden Service
// ============================================================================

/// Service that runs the webhook HTTP server.
pub struct WardenService {
    config: Config,
}

impl WardenService {
    /// Create a new service.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Build the router on top of the given issue API.
    pub fn build_router_with(&self, api: Arc<dyn IssueApi>) -> Router {
        let context = BotContext::from_config(api, &self.config);
        webhook_routes(WebhookState::new(context)).layer(TraceLayer::new_for_http())
    }

    /// Build the router backed by the GitHub REST API.
    pub fn build_router(&self) -> anyhow::Result<Router> {
        let client = GitHubClient::from_config(&self.config.github)?;
        Ok(self.build_router_with(Arc::new(client)))
    }

    /// Start the webhook server.
    pub async fn start(&self) -> anyhow::Result<()> {
        tracing::info!("Starting Warden workflow service");

        let router = self.build_router()?;
        let addr = self.config.bind_address();

        tracing::info!(
            bot = %self.config.github.username,
            "Starting Warden HTTP server on {}",
            addr
        );

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
