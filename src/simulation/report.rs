//! Simulation results and their text rendering.

use crate::reciprocity::{Clock, ReciprocityEngine};
use crate::simulation::driver::RoundSummary;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Final snapshot of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub opt_in_rate: f64,
    pub total_reads: u64,
    pub total_publishes: u64,
    pub avg_credits: f64,
    pub avg_reputation: f64,
    pub remaining_clinics: u64,
}

impl SimulationResult {
    pub fn from_engine<C: Clock>(
        engine: &ReciprocityEngine<C>,
        total_reads: u64,
        total_publishes: u64,
    ) -> Self {
        let clinics = engine.clinics();
        let (avg_credits, avg_reputation) = if clinics.is_empty() {
            (0.0, 0.0)
        } else {
            let n = clinics.len() as f64;
            (
                engine.total_credits() as f64 / n,
                clinics.iter().map(|c| c.reputation).sum::<f64>() / n,
            )
        };

        Self {
            opt_in_rate: engine.opt_in_rate(),
            total_reads,
            total_publishes,
            avg_credits,
            avg_reputation,
            remaining_clinics: engine.opted_in_count() as u64,
        }
    }

    /// Named fields in report order
    pub fn fields(&self) -> [(&'static str, f64); 6] {
        [
            ("opt_in_rate", self.opt_in_rate),
            ("total_reads", self.total_reads as f64),
            ("total_publishes", self.total_publishes as f64),
            ("avg_credits", self.avg_credits),
            ("avg_reputation", self.avg_reputation),
            ("remaining_clinics", self.remaining_clinics as f64),
        ]
    }
}

impl fmt::Display for SimulationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Project 1: Incentive Design Under Adversarial Conditions")?;
        writeln!(f, "Simulation results:")?;
        for (name, value) in self.fields() {
            if name.contains("rate") {
                writeln!(f, "- {}: {:.3}", name, value)?;
            } else {
                writeln!(f, "- {}: {:.1}", name, value)?;
            }
        }
        Ok(())
    }
}

/// Result plus the per-round breakdown that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationTrace {
    pub seed: u64,
    pub result: SimulationResult,
    pub rounds: Vec<RoundSummary>,
}
