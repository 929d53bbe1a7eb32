//! Warden Common - Shared types and utilities for the Warden pull-request bot.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Configuration validation
//! - Error types and handling utilities
//! - Logging setup
//! - Label comparison helpers

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod util;
pub mod validation;

pub use config::{
    CiConfig, Config, GitHubConfig, LabelConfig, LabelFilter, LabelFilterConfig,
    MergeConflictConfig, ObservabilityConfig, PullsConfig, ReferenceLabelPolicy,
    ReferencesConfig, ServerConfig, SizeBucketTable, SizeConfig,
};
pub use error::{Error, Result, ResultExt};
pub use validation::{Validate, ValidationError, ValidationResult};
