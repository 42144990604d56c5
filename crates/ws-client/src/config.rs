// config.rs — Workstream configuration and on-disk layout.
//
// Configuration comes from `.ws/workstream.toml` in the project, then the
// user-level `<config_dir>/workstream/workstream.toml`, then built-in
// defaults. Every section and key is optional.
//
// The `for_project()` constructor places all local state under `.ws/`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use ws_outbox::RetryPolicy;
use ws_pipeline::{default_sequence, DripStep};
use ws_sla::{default_rules, SlaEvaluator, SlaRule, DEFAULT_AMBER_WINDOW_HOURS};
use ws_today::PriorityConfig;

use crate::error::ClientError;

/// Filesystem layout of a Workstream project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkstreamPaths {
    pub project_root: PathBuf,
    /// One JSON file per record, by kind.
    pub store_dir: PathBuf,
    /// Work event notification log (JSONL).
    pub events_log: PathBuf,
    /// Hash-chained delivery outbox (JSONL).
    pub outbox_log: PathBuf,
    /// SLA breach ledger (JSON).
    pub breaches_file: PathBuf,
    /// Project configuration file.
    pub config_file: PathBuf,
}

impl WorkstreamPaths {
    pub fn for_project(project_root: impl AsRef<Path>) -> Self {
        let root = project_root.as_ref().to_path_buf();
        let ws_dir = root.join(".ws");
        Self {
            project_root: root,
            store_dir: ws_dir.join("store"),
            events_log: ws_dir.join("events.jsonl"),
            outbox_log: ws_dir.join("outbox.jsonl"),
            breaches_file: ws_dir.join("breaches.json"),
            config_file: ws_dir.join("workstream.toml"),
        }
    }
}

/// Top-level configuration from workstream.toml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkstreamConfig {
    /// Organization new records are created under.
    #[serde(default = "default_org_id")]
    pub org_id: String,

    #[serde(default)]
    pub sla: SlaConfig,

    #[serde(default)]
    pub priority: PriorityConfig,

    #[serde(default)]
    pub outbox: RetryPolicy,

    #[serde(default)]
    pub drip: DripConfig,
}

impl Default for WorkstreamConfig {
    fn default() -> Self {
        Self {
            org_id: default_org_id(),
            sla: SlaConfig::default(),
            priority: PriorityConfig::default(),
            outbox: RetryPolicy::default(),
            drip: DripConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaConfig {
    /// Hours before a deadline during which the badge is amber.
    #[serde(default = "default_amber_window_hours")]
    pub amber_window_hours: f64,

    /// Replaces the built-in rule set when present.
    #[serde(default = "default_rules")]
    pub rules: Vec<SlaRule>,
}

impl Default for SlaConfig {
    fn default() -> Self {
        Self {
            amber_window_hours: default_amber_window_hours(),
            rules: default_rules(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DripConfig {
    /// Nurture steps scheduled when a drip is triggered.
    #[serde(default = "default_sequence")]
    pub sequence: Vec<DripStep>,
}

impl Default for DripConfig {
    fn default() -> Self {
        Self {
            sequence: default_sequence(),
        }
    }
}

fn default_org_id() -> String {
    "default".to_string()
}

fn default_amber_window_hours() -> f64 {
    DEFAULT_AMBER_WINDOW_HOURS as f64
}

impl WorkstreamConfig {
    /// Parse and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ClientError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| ClientError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load the project config, else the user config, else defaults.
    ///
    /// A file that exists but fails to parse is an error; a missing file is not.
    pub fn resolve(paths: &WorkstreamPaths) -> Result<Self, ClientError> {
        if paths.config_file.exists() {
            return Self::load(&paths.config_file);
        }
        if let Some(user) = Self::user_config_path() {
            if user.exists() {
                tracing::debug!(path = %user.display(), "using user-level config");
                return Self::load(&user);
            }
        }
        Ok(Self::default())
    }

    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("workstream").join("workstream.toml"))
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.org_id.trim().is_empty() {
            return Err(ClientError::Config("org_id must not be empty".to_string()));
        }
        self.evaluator()?;
        self.priority.validate()?;
        self.outbox.validate()?;
        Ok(())
    }

    pub fn evaluator(&self) -> Result<SlaEvaluator, ClientError> {
        Ok(SlaEvaluator::new(
            self.sla.rules.clone(),
            self.sla.amber_window_hours,
        )?)
    }
}
