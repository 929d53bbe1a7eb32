//! Shared, read-only state handed to every handler.

use std::sync::Arc;
use warden_common::{Config, PullsConfig};

use crate::api::IssueApi;
use crate::templates::TemplateRegistry;

/// Everything a handler needs besides the event itself.
///
/// Cheap to clone; all fields are shared and never mutated after startup.
#[derive(Clone)]
pub struct BotContext {
    pub api: Arc<dyn IssueApi>,
    pub config: Arc<PullsConfig>,
    pub templates: Arc<TemplateRegistry>,
    /// Login of the bot account
    pub bot_login: String,
}

impl BotContext {
    pub fn new(
        api: Arc<dyn IssueApi>,
        config: PullsConfig,
        templates: TemplateRegistry,
        bot_login: impl Into<String>,
    ) -> Self {
        Self {
            api,
            config: Arc::new(config),
            templates: Arc::new(templates),
            bot_login: bot_login.into(),
        }
    }

    /// Build from the loaded configuration, applying template overrides.
    pub fn from_config(api: Arc<dyn IssueApi>, config: &Config) -> Self {
        Self::new(
            api,
            config.pulls.clone(),
            TemplateRegistry::with_overrides(&config.templates),
            config.github.username.clone(),
        )
    }

    pub fn api(&self) -> &dyn IssueApi {
        self.api.as_ref()
    }
}

impl std::fmt::Debug for BotContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotContext")
            .field("bot_login", &self.bot_login)
            .field("templates", &self.templates.len())
            .finish_non_exhaustive()
    }
}
