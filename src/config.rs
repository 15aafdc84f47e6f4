use anyhow::{Context, Result};
use paramkit::{
    ApplyOptions, BatchLimits, DEFAULT_BATCH_LIMIT, DesiredParameter, DesiredState, NameMatching,
    ParameterCatalog, ParameterDefinition, RetryConfig,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Desired State File
// ============================================================================

/// Desired state of one parameter group, as written in a TOML file
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DesiredConfig {
    /// Parameter group name
    pub name: String,
    /// Engine family, e.g. postgres14
    pub family: String,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default, rename = "parameter")]
    pub parameters: Vec<DesiredParameter>,

    /// Parameter catalog entries for the engine family
    #[serde(default, rename = "definition")]
    pub definitions: Vec<ParameterDefinition>,
}

/// Behaviour of the remote engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default)]
    pub name_matching: NameMatching,
    #[serde(default = "default_limit")]
    pub modify_limit: usize,
    #[serde(default = "default_limit")]
    pub reset_limit: usize,
    #[serde(default = "default_true")]
    pub prefer_reset_all: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name_matching: NameMatching::default(),
            modify_limit: DEFAULT_BATCH_LIMIT,
            reset_limit: DEFAULT_BATCH_LIMIT,
            prefer_reset_all: true,
        }
    }
}

/// Retry policy in file-friendly units
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Time budget for one batch including retries
    #[serde(default)]
    pub batch_timeout_secs: Option<u64>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            max_attempts: defaults.max_attempts,
            base_delay_ms: defaults.base_delay.as_millis() as u64,
            backoff_factor: defaults.backoff_factor,
            max_delay_ms: defaults.max_delay.as_millis() as u64,
            batch_timeout_secs: None,
        }
    }
}

const fn default_limit() -> usize {
    DEFAULT_BATCH_LIMIT
}

const fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    RetryConfig::default().max_attempts
}

const fn default_base_delay_ms() -> u64 {
    500
}

fn default_backoff_factor() -> f64 {
    RetryConfig::default().backoff_factor
}

const fn default_max_delay_ms() -> u64 {
    30_000
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            backoff_factor: self.backoff_factor,
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

impl DesiredConfig {
    /// Load a desired state file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid desired state file: {}", path.display()))?;
        log::debug!(
            "Loaded {} desired parameter(s) for {} from {}",
            config.parameters.len(),
            config.name,
            path.display()
        );
        Ok(config)
    }

    /// Parse desired state from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        if config.name.trim().is_empty() {
            anyhow::bail!("Parameter group name must not be empty");
        }
        config
            .retry
            .to_retry_config()
            .validate()
            .context("Invalid [retry] settings")?;
        Ok(config)
    }

    pub fn matching(&self) -> NameMatching {
        self.engine.name_matching
    }

    /// Parameter catalog built from the `[[definition]]` entries
    pub fn catalog(&self) -> Result<ParameterCatalog> {
        ParameterCatalog::from_definitions(self.matching(), self.definitions.iter().cloned())
            .context("Invalid parameter definitions")
    }

    /// Desired state with every apply timing resolved
    pub fn desired_state(&self) -> Result<DesiredState> {
        self.catalog()?
            .desired_state(&self.parameters)
            .context("Invalid desired parameters")
    }

    /// Apply options derived from the `[engine]` and `[retry]` tables
    pub fn apply_options(&self, dry_run: bool) -> ApplyOptions {
        ApplyOptions {
            limits: BatchLimits {
                modify: self.engine.modify_limit,
                reset: self.engine.reset_limit,
            },
            retry: self.retry.to_retry_config(),
            batch_timeout: self.retry.batch_timeout_secs.map(Duration::from_secs),
            prefer_reset_all: self.engine.prefer_reset_all,
            dry_run,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paramkit::ApplyTiming;
    use tempfile::TempDir;

    const MINIMAL: &str = r#"
name = "app-pg"
family = "postgres14"

[[parameter]]
name = "max_connections"
value = "200"
"#;

    #[test]
    fn test_defaults() {
        let config = DesiredConfig::parse(MINIMAL).unwrap();
        assert_eq!(config.matching(), NameMatching::CaseInsensitive);

        let opts = config.apply_options(false);
        assert_eq!(opts.limits.modify, 20);
        assert_eq!(opts.limits.reset, 20);
        assert!(opts.prefer_reset_all);
        assert!(opts.batch_timeout.is_none());
        assert_eq!(opts.retry, RetryConfig::default());
    }

    #[test]
    fn test_full_file() {
        let content = r#"
name = "app-pg"
family = "postgres14"

[engine]
name_matching = "case-sensitive"
modify_limit = 3
reset_limit = 5
prefer_reset_all = false

[retry]
max_attempts = 2
base_delay_ms = 100
backoff_factor = 3.0
max_delay_ms = 1000
batch_timeout_secs = 60

[[parameter]]
name = "shared_buffers"
value = "4GB"

[[parameter]]
name = "work_mem"
value = "8192"
apply_timing = "deferred"

[[definition]]
name = "shared_buffers"
apply_type = "static"
"#;
        let config = DesiredConfig::parse(content).unwrap();
        let opts = config.apply_options(true);
        assert_eq!(opts.limits.modify, 3);
        assert_eq!(opts.limits.reset, 5);
        assert!(!opts.prefer_reset_all);
        assert!(opts.dry_run);
        assert_eq!(opts.retry.max_attempts, 2);
        assert_eq!(opts.retry.base_delay, Duration::from_millis(100));
        assert_eq!(opts.batch_timeout, Some(Duration::from_secs(60)));

        let desired = config.desired_state().unwrap();
        assert_eq!(desired.len(), 2);
        assert_eq!(
            desired.get("shared_buffers").unwrap().apply_timing,
            ApplyTiming::Deferred
        );
        assert_eq!(
            desired.get("work_mem").unwrap().apply_timing,
            ApplyTiming::Deferred
        );
    }

    #[test]
    fn test_static_parameter_cannot_be_immediate() {
        let content = r#"
name = "app-pg"
family = "postgres14"

[[parameter]]
name = "shared_buffers"
value = "4GB"
apply_timing = "immediate"

[[definition]]
name = "shared_buffers"
apply_type = "static"
"#;
        let config = DesiredConfig::parse(content).unwrap();
        assert!(config.desired_state().is_err());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let content = r#"
name = "app-pg"
family = "postgres14"

[[parameter]]
name = "Max_Connections"
value = "100"

[[parameter]]
name = "max_connections"
value = "200"
"#;
        let config = DesiredConfig::parse(content).unwrap();
        assert!(config.desired_state().is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let content = r#"
name = "app-pg"
family = "postgres14"
colour = "blue"
"#;
        assert!(DesiredConfig::parse(content).is_err());
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(DesiredConfig::parse("name = \"\"\nfamily = \"mysql8.0\"\n").is_err());
    }

    #[test]
    fn test_shrinking_backoff_rejected() {
        for factor in ["-2.0", "0.5", "nan", "inf"] {
            let content = format!("{MINIMAL}\n[retry]\nbackoff_factor = {factor}\n");
            assert!(DesiredConfig::parse(&content).is_err(), "factor {factor}");
        }
    }

    #[test]
    fn test_huge_batch_timeout_accepted() {
        let content = format!("{MINIMAL}\n[retry]\nbatch_timeout_secs = {}\n", i64::MAX);
        let config = DesiredConfig::parse(&content).unwrap();
        let opts = config.apply_options(false);
        assert_eq!(opts.batch_timeout, Some(Duration::from_secs(i64::MAX as u64)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("desired.toml");
        fs::write(&path, MINIMAL).unwrap();

        let config = DesiredConfig::load(&path).unwrap();
        assert_eq!(config.name, "app-pg");
        assert_eq!(config.parameters.len(), 1);

        let missing = DesiredConfig::load(&dir.path().join("missing.toml"));
        assert!(missing.is_err());
    }
}
