use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use tracing::Level;

use crate::reciprocity::EngineConfig;
use crate::simulation::{BehaviorConfig, ScenarioConfig, SimulationConfig};

/// Top-level configuration for the simulator binary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Scenario, engine economics and behavior rules
    pub simulation: SimulationConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Report output configuration
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Emit span open/close events
    pub log_spans: bool,
}

impl LoggingConfig {
    /// Parsed max level, `None` when the name is not recognised
    pub fn max_level(&self) -> Option<Level> {
        match self.level.to_lowercase().as_str() {
            "error" => Some(Level::ERROR),
            "warn" => Some(Level::WARN),
            "info" => Some(Level::INFO),
            "debug" => Some(Level::DEBUG),
            "trace" => Some(Level::TRACE),
            _ => None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_spans: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Human-readable report
    #[default]
    Text,
    /// Full trace as JSON
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(anyhow::anyhow!("Unknown output format: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

/// Overwrite `target` when `var` is set, naming the variable on parse failure
fn override_from_env<T>(var: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Ok(raw) = env::var(var) {
        *target = raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("Invalid {} value: {}", var, raw))?;
    }
    Ok(())
}

fn check_probability(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(anyhow::anyhow!(
            "{} must be within [0, 1], got {}",
            name,
            value
        ));
    }
    Ok(())
}

impl AppConfig {
    /// Load configuration from environment variables and validate it
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Scenario
        let scenario = &mut config.simulation.scenario;
        override_from_env("RECIPROCITY_CLINICS", &mut scenario.clinics)?;
        override_from_env("RECIPROCITY_PATIENTS", &mut scenario.patients)?;
        override_from_env("RECIPROCITY_ROUNDS", &mut scenario.rounds)?;
        override_from_env("RECIPROCITY_STARTER_CREDITS", &mut scenario.starter_credits)?;
        override_from_env("RECIPROCITY_FREE_RIDER_FRACTION", &mut scenario.free_rider_fraction)?;
        override_from_env("RECIPROCITY_LOW_QUALITY_FRACTION", &mut scenario.low_quality_fraction)?;
        override_from_env("RECIPROCITY_SEED", &mut scenario.seed)?;
        override_from_env("RECIPROCITY_ROUND_DURATION_SECS", &mut scenario.round_duration_secs)?;

        // Engine economics
        let engine = &mut config.simulation.engine;
        override_from_env("RECIPROCITY_READ_COST", &mut engine.read_cost)?;
        override_from_env("RECIPROCITY_PUBLISH_REWARD", &mut engine.publish_reward)?;
        override_from_env("RECIPROCITY_PUBLISH_STAKE", &mut engine.publish_stake)?;
        override_from_env("RECIPROCITY_DECAY_PER_ROUND", &mut engine.decay_per_round)?;
        override_from_env("RECIPROCITY_MIN_CREDITS_TO_READ", &mut engine.min_credits_to_read)?;
        override_from_env("RECIPROCITY_DISPUTE_PROBABILITY", &mut engine.dispute_probability)?;
        override_from_env("RECIPROCITY_DISPUTE_THRESHOLD", &mut engine.dispute_threshold)?;
        override_from_env("RECIPROCITY_SLASH_AMOUNT", &mut engine.slash_amount)?;
        override_from_env("RECIPROCITY_MATCH_POOL_RATE", &mut engine.match_pool_rate)?;
        override_from_env("RECIPROCITY_TOKEN_TTL_SECS", &mut engine.token_ttl_secs)?;

        // Logging
        override_from_env("RECIPROCITY_LOG_LEVEL", &mut config.logging.level)?;
        override_from_env("RECIPROCITY_LOG_SPANS", &mut config.logging.log_spans)?;

        // Output
        override_from_env("RECIPROCITY_OUTPUT", &mut config.output.format)?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration for consistency
    pub fn validate(&self) -> Result<()> {
        validate_scenario(&self.simulation.scenario)?;
        validate_engine(&self.simulation.engine)?;
        validate_behavior(&self.simulation.behavior)?;
        Ok(())
    }
}

fn validate_scenario(scenario: &ScenarioConfig) -> Result<()> {
    if scenario.clinics == 0 {
        return Err(anyhow::anyhow!("At least one clinic is required"));
    }

    if scenario.patients == 0 {
        return Err(anyhow::anyhow!("At least one patient is required"));
    }

    check_probability("free_rider_fraction", scenario.free_rider_fraction)?;
    check_probability("low_quality_fraction", scenario.low_quality_fraction)?;

    Ok(())
}

fn validate_engine(engine: &EngineConfig) -> Result<()> {
    check_probability("dispute_probability", engine.dispute_probability)?;
    check_probability("dispute_threshold", engine.dispute_threshold)?;
    check_probability("match_pool_rate", engine.match_pool_rate)?;

    if engine.token_ttl_secs == 0 {
        return Err(anyhow::anyhow!("Token TTL must be non-zero"));
    }

    Ok(())
}

fn validate_behavior(behavior: &BehaviorConfig) -> Result<()> {
    check_probability("read_probability", behavior.read_probability)?;
    check_probability("cooperative_share_propensity", behavior.cooperative_share_propensity)?;
    check_probability("free_rider_share_propensity", behavior.free_rider_share_propensity)?;
    check_probability("low_quality_draft_probability", behavior.low_quality_draft_probability)?;
    check_probability("opt_out_probability", behavior.opt_out_probability)?;

    for (name, band) in [("low_band", behavior.low_band), ("high_band", behavior.high_band)] {
        if !band.is_well_formed() {
            return Err(anyhow::anyhow!(
                "{} must be an ordered interval inside [0, 1], got [{}, {})",
                name,
                band.low,
                band.high
            ));
        }
    }

    Ok(())
}
