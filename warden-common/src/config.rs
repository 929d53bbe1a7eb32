//! Configuration management for Warden services.
//!
//! The bot reads a single JSON file, by default `~/.warden/config.json`
//! (override the path with `WARDEN_CONFIG`). Configuration is loaded once at
//! startup and shared read-only by every webhook delivery.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (WARDEN_* prefix)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `WARDEN_GITHUB_TOKEN` (or `GITHUB_TOKEN`) → github.token
//! - `WARDEN_BOT_USERNAME` → github.username
//! - `WARDEN_HOST` → server.host
//! - `WARDEN_PORT` → server.port
//! - `WARDEN_LOG_LEVEL` → observability.logLevel

use anyhow::{Context, Result};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::validation::{ValidationError, ValidationResult};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".warden"),
        |dirs| dirs.home_dir().join(".warden"),
    )
}

/// Get the configuration file path, honoring `WARDEN_CONFIG`.
pub fn config_path() -> PathBuf {
    std::env::var("WARDEN_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| config_dir().join("config.json"))
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// GitHub API access and bot identity
    #[serde(default)]
    pub github: GitHubConfig,

    /// Webhook HTTP server
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Pull request automation behavior
    #[serde(default)]
    pub pulls: PullsConfig,

    /// Comment template overrides, keyed by template identifier
    #[serde(default)]
    pub templates: HashMap<String, String>,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides applied.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) =
            std::env::var("WARDEN_GITHUB_TOKEN").or_else(|_| std::env::var("GITHUB_TOKEN"))
        {
            self.github.token = Some(token);
        }

        if let Ok(username) = std::env::var("WARDEN_BOT_USERNAME") {
            self.github.username = username;
        }

        if let Ok(host) = std::env::var("WARDEN_HOST") {
            self.server.host = host;
        }

        if let Ok(port) = std::env::var("WARDEN_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }

        if let Ok(level) = std::env::var("WARDEN_LOG_LEVEL") {
            self.observability.log_level = level;
        }
    }

    /// Address the webhook server binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

// ============================================================================
// GitHub / Server / Observability
// ============================================================================

/// GitHub API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitHubConfig {
    /// REST API base URL (GitHub Enterprise uses `https://host/api/v3`)
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// API token
    #[serde(default, skip_serializing)]
    pub token: Option<String>,

    /// Login of the bot account; template comments are only recognized when authored by it
    #[serde(default)]
    pub username: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            token: None,
            username: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Webhook server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

// ============================================================================
// Pull Request Automation
// ============================================================================

/// Pull request automation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullsConfig {
    /// Move review-status labels automatically on PR events
    #[serde(default)]
    pub auto_update: bool,

    /// Label applied while a PR waits for review
    #[serde(default = "default_needs_review")]
    pub needs_review: LabelConfig,

    /// Label applied once someone other than the author reviewed
    #[serde(default = "default_reviewed")]
    pub reviewed: LabelConfig,

    /// Size bucket labels
    #[serde(default)]
    pub size: SizeConfig,

    /// Issue reference handling
    #[serde(default)]
    pub references: ReferencesConfig,

    /// CI status callbacks
    #[serde(default)]
    pub ci: CiConfig,

    /// Merge conflict warnings
    #[serde(default)]
    pub merge_conflicts: MergeConflictConfig,
}

impl Default for PullsConfig {
    fn default() -> Self {
        Self {
            auto_update: false,
            needs_review: default_needs_review(),
            reviewed: default_reviewed(),
            size: SizeConfig::default(),
            references: ReferencesConfig::default(),
            ci: CiConfig::default(),
            merge_conflicts: MergeConflictConfig::default(),
        }
    }
}

/// A single configurable label name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LabelConfig {
    pub label: String,
}

impl LabelConfig {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

/// Size labeling configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SizeConfig {
    /// Bucket name → threshold, in document order
    #[serde(default)]
    pub labels: SizeBucketTable,

    /// File names whose changes do not count towards the size
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Reference handling configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReferencesConfig {
    /// Policy for copying PR labels onto referenced issues
    #[serde(default)]
    pub labels: Option<ReferenceLabelPolicy>,
}

/// CI configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CiConfig {
    /// Label that opts a PR into Travis build comments
    #[serde(default)]
    pub travis: Option<String>,
}

/// Merge conflict configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MergeConflictConfig {
    /// Label marking a PR with merge conflicts
    #[serde(default)]
    pub label: Option<String>,
}

// ============================================================================
// Size Buckets
// ============================================================================

/// Ordered association of bucket name → changed-line threshold.
///
/// Iteration follows insertion order, which decides both the default bucket
/// (the first entry) and the tie-break (the last exceeded entry wins). Insert
/// thresholds ascending for the selection to be monotonic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SizeBucketTable {
    entries: Vec<(String, u64)>,
}

impl SizeBucketTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a bucket. A repeated name replaces the earlier threshold in place.
    pub fn insert(&mut self, name: impl Into<String>, threshold: u64) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = threshold,
            None => self.entries.push((name, threshold)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(n, t)| (n.as_str(), *t))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `label` names one of the buckets.
    pub fn contains(&self, label: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == label)
    }

    /// Whether thresholds never decrease in insertion order.
    pub fn is_ascending(&self) -> bool {
        self.entries.windows(2).all(|w| w[0].1 <= w[1].1)
    }

    /// Select the bucket for a total number of changed lines.
    ///
    /// Starts at the first bucket and moves to every later bucket whose
    /// threshold is strictly exceeded. `None` only for an empty table.
    pub fn classify(&self, total_changes: u64) -> Option<&str> {
        let mut chosen = self.entries.first().map(|(n, _)| n.as_str())?;
        for (name, threshold) in &self.entries {
            if total_changes > *threshold {
                chosen = name.as_str();
            }
        }
        Some(chosen)
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for SizeBucketTable {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (name, threshold) in iter {
            table.insert(name, threshold);
        }
        table
    }
}

impl Serialize for SizeBucketTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, threshold) in &self.entries {
            map.serialize_entry(name, threshold)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SizeBucketTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = SizeBucketTable;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping size label names to line thresholds")
            }

            // Reads entries in document order; a HashMap/BTreeMap would lose it.
            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut table = SizeBucketTable::new();
                while let Some((name, threshold)) = access.next_entry::<String, u64>()? {
                    table.insert(name, threshold);
                }
                Ok(table)
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

// ============================================================================
// Reference Label Policy
// ============================================================================

/// How PR labels are copied onto the issues a PR references.
///
/// `true` copies every label, `false` disables propagation, and the object
/// form filters by exactly one of `include` / `exclude`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ReferenceLabelPolicy {
    All(bool),
    Filtered(LabelFilterConfig),
}

/// Object form of the reference label policy.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct LabelFilterConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,
}

/// A validated label filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelFilter {
    /// Every label passes
    All,
    /// Only listed labels pass
    Include(Vec<String>),
    /// Listed labels are dropped
    Exclude(Vec<String>),
}

impl LabelFilter {
    /// Filter labels, keeping their order.
    pub fn apply(&self, labels: &[String]) -> Vec<String> {
        match self {
            Self::All => labels.to_vec(),
            Self::Include(allowed) => labels
                .iter()
                .filter(|l| allowed.contains(l))
                .cloned()
                .collect(),
            Self::Exclude(denied) => labels
                .iter()
                .filter(|l| !denied.contains(l))
                .cloned()
                .collect(),
        }
    }
}

impl ReferenceLabelPolicy {
    /// Whether propagation should run at all.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::All(false))
    }

    /// Resolve the policy into a filter.
    ///
    /// Returns `Ok(None)` when propagation is disabled and a
    /// [`ValidationError::Conflict`] when the object form defines both or
    /// neither of the lists.
    pub fn label_filter(&self) -> ValidationResult<Option<LabelFilter>> {
        match self {
            Self::All(false) => Ok(None),
            Self::All(true) => Ok(Some(LabelFilter::All)),
            Self::Filtered(cfg) => {
                let defined = |list: &Option<Vec<String>>| {
                    list.as_ref().filter(|l| !l.is_empty()).cloned()
                };
                match (defined(&cfg.include), defined(&cfg.exclude)) {
                    (Some(include), None) => Ok(Some(LabelFilter::Include(include))),
                    (None, Some(exclude)) => Ok(Some(LabelFilter::Exclude(exclude))),
                    (Some(_), Some(_)) => Err(ValidationError::Conflict {
                        reason: "references.labels defines both include and exclude".into(),
                    }),
                    (None, None) => Err(ValidationError::Conflict {
                        reason: "references.labels defines neither include nor exclude".into(),
                    }),
                }
            }
        }
    }
}

// ============================================================================
// Defaults
// ============================================================================

fn default_api_base() -> String {
    "https://api.github.com".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    4412
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "pretty".into()
}
fn default_needs_review() -> LabelConfig {
    LabelConfig::new("needs-review")
}
fn default_reviewed() -> LabelConfig {
    LabelConfig::new("reviewed")
}
