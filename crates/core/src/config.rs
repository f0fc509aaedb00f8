use crate::{
    error::{CoreError, Result},
    model::Limits,
    tags::ResolverOptions,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Snapshots younger than this are not counted
    pub snapshot_age_secs: u64,

    /// Per-call deadlines
    pub timeouts: Timeouts,

    /// Parallel tasks for tag expansion and snapshot scans
    pub concurrency: usize,

    /// Container nesting followed below a tagged object
    pub max_expansion_depth: usize,

    /// Sample interval per summary kind
    pub intervals: Intervals,

    /// Counters added to the VM summary defaults
    pub extra_counters: Vec<String>,

    /// Thresholds for snapshot channels
    pub limits: Limits,

    /// Pretty JSON output instead of the compact sensor payload
    pub json_output: bool,
}

/// Per-operation timeouts in seconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub inventory_secs: u64,
    pub tags_secs: u64,
    pub performance_secs: u64,
}

impl Timeouts {
    fn merge(&mut self, other: Self) {
        let defaults = Self::default();
        if other.inventory_secs != defaults.inventory_secs {
            self.inventory_secs = other.inventory_secs;
        }
        if other.tags_secs != defaults.tags_secs {
            self.tags_secs = other.tags_secs;
        }
        if other.performance_secs != defaults.performance_secs {
            self.performance_secs = other.performance_secs;
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            inventory_secs: 10,
            tags_secs: 10,
            performance_secs: 30,
        }
    }
}

/// Sample intervals in seconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Intervals {
    pub vm: i32,
    pub host: i32,
    pub datastore: i32,
    pub switch: i32,
}

impl Intervals {
    fn merge(&mut self, other: Self) {
        let defaults = Self::default();
        if other.vm != defaults.vm {
            self.vm = other.vm;
        }
        if other.host != defaults.host {
            self.host = other.host;
        }
        if other.datastore != defaults.datastore {
            self.datastore = other.datastore;
        }
        if other.switch != defaults.switch {
            self.switch = other.switch;
        }
    }
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            vm: 20,
            host: 20,
            datastore: 1800,
            switch: 20,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snapshot_age_secs: 7 * 24 * 3600,
            timeouts: Timeouts::default(),
            concurrency: 8,
            max_expansion_depth: 32,
            intervals: Intervals::default(),
            extra_counters: Vec::new(),
            limits: Limits {
                max_warn: Some(1.0),
                ..Limits::default()
            },
            json_output: false,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources in order of preference:
    /// 1. CLI arguments override everything
    /// 2. JSON config file if specified
    /// 3. Default config file locations
    /// 4. Built-in defaults
    pub fn load(cli_config: Option<&CliConfig>, json_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(default_config) = Self::load_default_config()? {
            config.merge(default_config);
        }

        if let Some(path) = json_path {
            config.merge(Self::load_from_file(path)?);
        }

        if let Some(cli) = cli_config {
            config.apply_cli_overrides(cli);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific JSON file
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            CoreError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        serde_json::from_str(&contents).map_err(|e| {
            CoreError::config(format!("Failed to parse config file {}: {}", path.display(), e))
        })
    }

    /// Load configuration from default locations
    fn load_default_config() -> Result<Option<Self>> {
        for path in Self::default_config_paths() {
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(config) => return Ok(Some(config)),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                        continue;
                    }
                }
            }
        }

        Ok(None)
    }

    /// Get default configuration file search paths
    fn default_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("vmsensor").join("config.json"));
        }

        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".vmsensor.json"));
        }

        paths.push(PathBuf::from("vmsensor.json"));

        paths
    }

    /// Merge another configuration into this one; values left at their
    /// defaults in `other` do not override.
    fn merge(&mut self, other: Self) {
        let defaults = Self::default();
        if other.snapshot_age_secs != defaults.snapshot_age_secs {
            self.snapshot_age_secs = other.snapshot_age_secs;
        }
        self.timeouts.merge(other.timeouts);
        if other.concurrency != defaults.concurrency {
            self.concurrency = other.concurrency;
        }
        if other.max_expansion_depth != defaults.max_expansion_depth {
            self.max_expansion_depth = other.max_expansion_depth;
        }
        self.intervals.merge(other.intervals);
        self.extra_counters.extend(other.extra_counters);
        if other.limits != defaults.limits {
            self.limits = other.limits;
        }
        if other.json_output {
            self.json_output = true;
        }
    }

    /// Apply CLI argument overrides
    fn apply_cli_overrides(&mut self, cli: &CliConfig) {
        if let Some(age) = cli.snapshot_age {
            self.snapshot_age_secs = age.as_secs();
        }
        if let Some(concurrency) = cli.concurrency {
            self.concurrency = concurrency;
        }
        if !cli.extra_counters.is_empty() {
            self.extra_counters.extend(cli.extra_counters.iter().cloned());
        }
        if let Some(v) = cli.max_warn {
            self.limits.max_warn = Some(v);
        }
        if let Some(v) = cli.max_err {
            self.limits.max_err = Some(v);
        }
        if let Some(msg) = &cli.warn_msg {
            self.limits.warn_msg = Some(msg.clone());
        }
        if let Some(msg) = &cli.err_msg {
            self.limits.err_msg = Some(msg.clone());
        }
        if cli.json_output {
            self.json_output = true;
        }
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        for (name, secs) in [
            ("inventory", self.timeouts.inventory_secs),
            ("tags", self.timeouts.tags_secs),
            ("performance", self.timeouts.performance_secs),
        ] {
            if !(1..=300).contains(&secs) {
                return Err(CoreError::config(format!(
                    "{} timeout must be between 1 and 300 seconds",
                    name
                )));
            }
        }

        if self.concurrency == 0 {
            return Err(CoreError::config("Concurrency must be at least 1"));
        }

        if self.max_expansion_depth == 0 {
            return Err(CoreError::config("Expansion depth must be at least 1"));
        }

        let cutoff = chrono::Duration::from_std(self.snapshot_age())
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age));
        if cutoff.is_none() {
            return Err(CoreError::config(format!(
                "Snapshot age of {} seconds is out of range",
                self.snapshot_age_secs
            )));
        }

        let intervals = &self.intervals;
        if [intervals.vm, intervals.host, intervals.datastore, intervals.switch]
            .iter()
            .any(|&i| i <= 0)
        {
            return Err(CoreError::config("Sample intervals must be positive"));
        }

        Ok(())
    }

    pub fn snapshot_age(&self) -> Duration {
        Duration::from_secs(self.snapshot_age_secs)
    }

    pub fn inventory_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.inventory_secs)
    }

    pub fn performance_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.performance_secs)
    }

    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            call_timeout: Duration::from_secs(self.timeouts.tags_secs),
            max_depth: self.max_expansion_depth,
            concurrency: self.concurrency,
        }
    }
}

/// CLI configuration (temporary struct for CLI parsing)
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub snapshot_age: Option<Duration>,
    pub concurrency: Option<usize>,
    pub extra_counters: Vec<String>,
    pub max_warn: Option<f64>,
    pub max_err: Option<f64>,
    pub warn_msg: Option<String>,
    pub err_msg: Option<String>,
    pub json_output: bool,
}
