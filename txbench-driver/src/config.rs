//! Configuration for the benchmark driver.
//!
//! Configuration can be loaded from multiple sources with the following precedence (highest to
//! lowest):
//!
//! 1. Environment variables (prefixed with `TXB__`)
//! 2. YAML configuration file (specified via `-c` or `--config` flag)
//! 3. Defaults
//!
//! See [`Config`] for the run parameters and [`WorkloadConfig`] for the workload options.
//!
//! # Environment Variables
//!
//! Environment variables use `TXB__` as a prefix and double underscores (`__`) to denote nested
//! configuration structures. For example:
//!
//! - `TXB__THREADS=8` sets the number of client threads
//! - `TXB__DURATION=30s` bounds the run phase to 30 seconds
//! - `TXB__WORKLOAD__SINGLETON_PROPORTION=0.9` sets the share of singleton operations
//!
//! # YAML Configuration File
//!
//! The above configuration in YAML format would look like this:
//!
//! ```yaml
//! threads: 8
//! duration: 30s
//!
//! workload:
//!   singleton_proportion: 0.9
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use figment::providers::{Env, Format, Yaml};
use serde::{Deserialize, Serialize};
use txbench_workload::{EngineKind, WorkloadConfig};

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "TXB__";

/// Main configuration struct for the benchmark driver.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Number of client threads. Each thread owns its own engine and backend handle.
    ///
    /// # Default
    ///
    /// `1`
    ///
    /// # Environment Variable
    ///
    /// `TXB__THREADS`
    pub threads: usize,

    /// Number of logical operations of the run phase, split evenly across threads.
    ///
    /// `0` runs until [`duration`](Self::duration) elapses, which then must be set.
    ///
    /// # Default
    ///
    /// `1000`
    ///
    /// # Environment Variable
    ///
    /// `TXB__OPERATION_COUNT`
    pub operation_count: u64,

    /// Upper bound for the wall time of the run phase.
    ///
    /// Workers stop between operations once it elapses. An in-flight transaction always
    /// completes.
    ///
    /// # Default
    ///
    /// `None` (bounded by `operation_count` only)
    ///
    /// # Environment Variable
    ///
    /// `TXB__DURATION`, for example `30s` or `5m`
    #[serde(with = "humantime_serde")]
    pub duration: Option<Duration>,

    /// Engine generating the operations of the run phase.
    ///
    /// # Default
    ///
    /// `singleton`
    ///
    /// # Environment Variable
    ///
    /// `TXB__ENGINE`
    pub engine: EngineKind,

    /// Workload options, see [`WorkloadConfig`].
    ///
    /// # Environment Variables
    ///
    /// `TXB__WORKLOAD__<OPTION>`, for example `TXB__WORKLOAD__RECORD_COUNT=100000`
    pub workload: WorkloadConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threads: 1,
            operation_count: 1000,
            duration: None,
            engine: EngineKind::default(),
            workload: WorkloadConfig::default(),
        }
    }
}

impl Config {
    /// Loads and validates the configuration from defaults, an optional YAML file and the
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // Defaults are filled in by serde, so aliased option names never collide with them.
        let mut figment = figment::Figment::new();
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Checks the run parameters and the workload options.
    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            bail!("threads must be at least 1");
        }
        if self.operation_count == 0 && self.duration.is_none() {
            bail!("either operation_count or duration must be set");
        }
        self.workload
            .validate()
            .context("invalid workload configuration")?;

        if self.engine == EngineKind::Singleton && self.workload.singleton_proportion == 0.0 {
            tracing::warn!("Singleton engine configured without singleton operations");
        }
        Ok(())
    }
}
