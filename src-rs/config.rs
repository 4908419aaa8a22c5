//! Run configuration and the pacing constants the harness relies on.
//!
//! The application under test exposes no readiness signal, so every wait in a
//! run is one of the named [`Timings`] below. They can be tuned per
//! environment through the `[timings]` table of a TOML config file.

use crate::error::HarnessError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CHAOS_SECS: u64 = 30;
pub const DEFAULT_OUT_DIR: &str = "logs";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Scripted tab/enter navigation
    Simple,
    /// Time-boxed randomized input
    Chaos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Timings {
    /// After killing stale instances, before spawning the new one.
    pub supersede_settle: Duration,
    /// After spawning, before the UI is assumed to be up.
    pub launch_warmup: Duration,
    /// After any focus attempt.
    pub focus_settle: Duration,
    /// Between navigation key presses.
    pub navigate_pacing: Duration,
    /// After a navigation sequence.
    pub navigate_settle: Duration,
    /// Between the two simple-mode navigation sequences.
    pub simple_pause: Duration,
    pub chaos_tick: Duration,
    pub degraded_poll: Duration,
    /// Upper bound for every external helper command.
    pub command_timeout: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            supersede_settle: Duration::from_secs(1),
            launch_warmup: Duration::from_secs(3),
            focus_settle: Duration::from_secs(1),
            navigate_pacing: Duration::from_millis(100),
            navigate_settle: Duration::from_millis(500),
            simple_pause: Duration::from_secs(2),
            chaos_tick: Duration::from_millis(200),
            degraded_poll: Duration::from_secs(1),
            command_timeout: Duration::from_secs(2),
        }
    }
}

impl Timings {
    /// Every delay set to zero and a short command timeout. Used by tests.
    pub fn immediate() -> Self {
        Self {
            supersede_settle: Duration::ZERO,
            launch_warmup: Duration::ZERO,
            focus_settle: Duration::ZERO,
            navigate_pacing: Duration::ZERO,
            navigate_settle: Duration::ZERO,
            simple_pause: Duration::ZERO,
            chaos_tick: Duration::from_millis(10),
            degraded_poll: Duration::from_millis(10),
            command_timeout: Duration::from_millis(500),
        }
    }

    pub fn apply(&mut self, overrides: &TimingOverrides) {
        let set = |slot: &mut Duration, ms: Option<u64>| {
            if let Some(ms) = ms {
                *slot = Duration::from_millis(ms);
            }
        };
        set(&mut self.supersede_settle, overrides.supersede_settle_ms);
        set(&mut self.launch_warmup, overrides.launch_warmup_ms);
        set(&mut self.focus_settle, overrides.focus_settle_ms);
        set(&mut self.navigate_pacing, overrides.navigate_pacing_ms);
        set(&mut self.navigate_settle, overrides.navigate_settle_ms);
        set(&mut self.simple_pause, overrides.simple_pause_ms);
        set(&mut self.chaos_tick, overrides.chaos_tick_ms);
        set(&mut self.degraded_poll, overrides.degraded_poll_ms);
        set(&mut self.command_timeout, overrides.command_timeout_ms);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimingOverrides {
    pub supersede_settle_ms: Option<u64>,
    pub launch_warmup_ms: Option<u64>,
    pub focus_settle_ms: Option<u64>,
    pub navigate_pacing_ms: Option<u64>,
    pub navigate_settle_ms: Option<u64>,
    pub simple_pause_ms: Option<u64>,
    pub chaos_tick_ms: Option<u64>,
    pub degraded_poll_ms: Option<u64>,
    pub command_timeout_ms: Option<u64>,
}

/// Contents of the optional TOML config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub out_dir: Option<PathBuf>,
    #[serde(default)]
    pub timings: TimingOverrides,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, HarnessError> {
        let raw = fs::read_to_string(path).map_err(|err| HarnessError::Config {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Self::parse(path, &raw)
    }

    fn parse(path: &Path, raw: &str) -> Result<Self, HarnessError> {
        let file: ConfigFile = toml::from_str(raw).map_err(|err| HarnessError::Config {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        if file.timings.chaos_tick_ms == Some(0) || file.timings.degraded_poll_ms == Some(0) {
            return Err(HarnessError::Config {
                path: path.to_path_buf(),
                message: "chaos_tick_ms and degraded_poll_ms must be positive".to_string(),
            });
        }
        Ok(file)
    }
}

/// Read-only settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub mode: Mode,
    pub chaos_duration: Duration,
    /// Seed for the chaos RNG; random when absent.
    pub seed: Option<u64>,
    pub out_dir: PathBuf,
    /// Kill the target after the final checkpoint instead of leaving it running.
    pub terminate_after: bool,
    pub timings: Timings,
}

impl RunConfig {
    pub fn new(mode: Mode, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            chaos_duration: Duration::from_secs(DEFAULT_CHAOS_SECS),
            seed: None,
            out_dir: out_dir.into(),
            terminate_after: false,
            timings: Timings::default(),
        }
    }
}

/// CLI (or `GRH_OUT_DIR`) beats the config file, which beats `logs/`.
pub fn resolve_out_dir(cli: Option<PathBuf>, file: Option<&ConfigFile>) -> PathBuf {
    cli.filter(|p| !p.as_os_str().is_empty())
        .or_else(|| file.and_then(|f| f.out_dir.clone()))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUT_DIR))
}
