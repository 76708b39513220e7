//! Repeated-Round Simulation
//!
//! Seeds one generator, builds a population, and drives it through the
//! configured number of rounds. Identical configuration and seed give
//! identical results: every draw comes from the same `StdRng`, and simulated
//! time advances by a fixed step per round.

mod driver;
mod report;
mod scenario;

pub use driver::{RoundDriver, RoundSummary};
pub use report::{SimulationResult, SimulationTrace};
pub use scenario::{
    clinic_id, draft_entry, draw_profile, patient_ids, populate, BehaviorConfig, QualityBand,
    ScenarioConfig, LOW_DETAIL_SUMMARY, STRUCTURED_SUMMARY,
};

use crate::reciprocity::{EngineConfig, LedgerError, ManualClock, ReciprocityEngine};
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Simulated time at the start of every run (2024-01-01T00:00:00Z)
const SIMULATION_EPOCH_SECS: i64 = 1_704_067_200;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub scenario: ScenarioConfig,
    pub engine: EngineConfig,
    pub behavior: BehaviorConfig,
}

/// Round step in seconds, capped at `i32::MAX`
fn clamp_secs(secs: u64) -> i64 {
    secs.min(i32::MAX as u64) as i64
}

pub fn simulation_epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(SIMULATION_EPOCH_SECS, 0).unwrap_or_default()
}

/// Run a full simulation and report the final snapshot
pub fn simulate(config: &SimulationConfig) -> Result<SimulationResult, LedgerError> {
    simulate_detailed(config).map(|trace| trace.result)
}

/// Run a full simulation, keeping the per-round breakdown
pub fn simulate_detailed(config: &SimulationConfig) -> Result<SimulationTrace, LedgerError> {
    let scenario = &config.scenario;
    let mut rng = StdRng::seed_from_u64(scenario.seed);

    let mut engine =
        ReciprocityEngine::with_clock(config.engine.clone(), ManualClock::new(simulation_epoch()));
    populate(&mut engine, scenario, &config.behavior, &mut rng)?;

    info!(
        clinics = scenario.clinics,
        patients = scenario.patients,
        rounds = scenario.rounds,
        seed = scenario.seed,
        "Starting simulation"
    );

    let round_step = Duration::seconds(clamp_secs(scenario.round_duration_secs));
    let mut driver = RoundDriver::new(
        engine,
        config.behavior.clone(),
        patient_ids(scenario.patients),
    );
    let mut rounds = Vec::with_capacity(scenario.rounds as usize);

    for _ in 0..scenario.rounds {
        driver.engine().clock().advance(round_step);
        rounds.push(driver.run_round(&mut rng)?);
    }

    let result = driver.result();
    info!(
        opt_in_rate = result.opt_in_rate,
        total_reads = result.total_reads,
        total_publishes = result.total_publishes,
        "Simulation finished"
    );

    Ok(SimulationTrace {
        seed: scenario.seed,
        result,
        rounds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(seed: u64) -> SimulationConfig {
        SimulationConfig {
            scenario: ScenarioConfig {
                clinics: 30,
                patients: 40,
                rounds: 12,
                seed,
                ..ScenarioConfig::default()
            },
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn test_trace_has_one_summary_per_round() {
        let trace = simulate_detailed(&small_config(7)).unwrap();
        assert_eq!(trace.rounds.len(), 12);
        assert_eq!(trace.rounds.last().unwrap().opted_in, trace.result.remaining_clinics);

        let reads: u64 = trace.rounds.iter().map(|r| r.reads).sum();
        let publishes: u64 = trace.rounds.iter().map(|r| r.publishes).sum();
        assert_eq!(reads, trace.result.total_reads);
        assert_eq!(publishes, trace.result.total_publishes);
    }

    #[test]
    fn test_empty_population() {
        let mut config = small_config(1);
        config.scenario.clinics = 0;

        let result = simulate(&config).unwrap();
        assert_eq!(result.opt_in_rate, 0.0);
        assert_eq!(result.avg_credits, 0.0);
        assert_eq!(result.remaining_clinics, 0);
    }

    #[test]
    fn test_zero_rounds_reports_starting_state() {
        let mut config = small_config(1);
        config.scenario.rounds = 0;

        let result = simulate(&config).unwrap();
        assert_eq!(result.opt_in_rate, 1.0);
        assert_eq!(result.avg_credits, 10.0);
        assert_eq!(result.avg_reputation, 1.0);
        assert_eq!(result.total_reads + result.total_publishes, 0);
    }
}
