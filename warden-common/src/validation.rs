//! Configuration validation for Warden services.
//!
//! Validation reports problems; it never aborts startup. Callers log the
//! result, and the `references.labels` check is repeated at runtime where a
//! failure becomes a comment on the pull request.

use thiserror::Error;

use crate::config::{Config, GitHubConfig, ObservabilityConfig, PullsConfig, ServerConfig};
use crate::logging::LOG_FORMATS;

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid port {port}: must be between 1 and 65535")]
    InvalidPort { port: u16, field: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Configuration conflict: {reason}")]
    Conflict { reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        let sections: [&dyn Validate; 4] = [
            &self.github,
            &self.server,
            &self.observability,
            &self.pulls,
        ];
        for section in sections {
            match section.validate() {
                Ok(()) => {}
                Err(ValidationError::Multiple(inner)) => errors.extend(inner),
                Err(e) => errors.push(e),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }
}

impl Validate for GitHubConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.username.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "github.username".into(),
            });
        }
        if self.api_base.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "github.apiBase".into(),
            });
        }
        Ok(())
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort {
                port: self.port,
                field: "server.port".into(),
            });
        }
        Ok(())
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.logLevel".into(),
                reason: format!("expected one of {:?}", LOG_LEVELS),
            });
        }
        if !LOG_FORMATS.contains(&self.log_format.as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.logFormat".into(),
                reason: format!("expected one of {:?}", LOG_FORMATS),
            });
        }
        Ok(())
    }
}

impl Validate for PullsConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if self.needs_review.label.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "pulls.needsReview.label".into(),
            });
        }
        if self.reviewed.label.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "pulls.reviewed.label".into(),
            });
        }
        if self.needs_review.label == self.reviewed.label {
            errors.push(ValidationError::Conflict {
                reason: "pulls.needsReview.label and pulls.reviewed.label are identical".into(),
            });
        }
        if !self.size.labels.is_ascending() {
            errors.push(ValidationError::InvalidValue {
                field: "pulls.size.labels".into(),
                reason: "thresholds are not ascending; bucket selection will not be monotonic"
                    .into(),
            });
        }
        if let Some(policy) = &self.references.labels {
            if let Err(e) = policy.label_filter() {
                errors.push(e);
            }
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ValidationError::Multiple(errors)),
        }
    }
}
