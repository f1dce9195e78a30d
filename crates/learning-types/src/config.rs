//! Typed configuration for the learning loop engine (spec.md §6 "Configuration").

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// First generator attempt timeout. Default 60s.
    pub generator_timeout_initial_secs: u64,
    /// Retry generator attempt timeout. Default 45s.
    pub generator_timeout_retry_secs: u64,
    /// Number of retries after the first attempt. Default 1 (two attempts total).
    pub generator_retries: u32,
    /// Windowed attempt count used by the difficulty engine. Default 8.
    pub dna_window: usize,
    /// Minimum attempts since the last CEFR change before reassessment may act. Default 10.
    pub reassess_min_attempts: usize,
    /// Minimum confidence required to promote a CEFR level. Default 0.6.
    pub reassess_confidence_min: f64,
    /// Maximum focus areas the plan updater may drop in one update. Default 1.
    pub plan_drop_max_per_update: usize,
    /// Number of previous lessons considered for lesson-builder context. Default 3.
    pub lesson_lookback: usize,
    /// Number of previous teacher observations considered for lesson-builder context. Default 10.
    pub observation_lookback: usize,
    /// Minimum character length for teacher notes to count as "substantive".
    pub teacher_notes_substantive_chars: usize,
    /// Bound on concurrent per-student pipelines in the dispatcher.
    pub max_concurrent_pipelines: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            generator_timeout_initial_secs: 60,
            generator_timeout_retry_secs: 45,
            generator_retries: 1,
            dna_window: 8,
            reassess_min_attempts: 10,
            reassess_confidence_min: 0.6,
            plan_drop_max_per_update: 1,
            lesson_lookback: 3,
            observation_lookback: 10,
            teacher_notes_substantive_chars: 120,
            max_concurrent_pipelines: 8,
        }
    }
}

impl EngineConfig {
    pub fn generator_timeout_initial(&self) -> Duration {
        Duration::from_secs(self.generator_timeout_initial_secs)
    }

    pub fn generator_timeout_retry(&self) -> Duration {
        Duration::from_secs(self.generator_timeout_retry_secs)
    }

    /// Load configuration layered as defaults -> optional TOML file -> `ENGINE_`-prefixed
    /// environment overrides, the way `brain-infra` layers `BrainConfig`.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults = Self::default();
        let mut builder = config::Config::builder().add_source(
            config::Config::try_from(&defaults)?,
        );
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("ENGINE").try_parsing(true),
        );
        let built = builder.build()?;
        Ok(built.try_deserialize()?)
    }
}
