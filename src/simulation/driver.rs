//! Round Driver
//!
//! Runs one round at a time over the clinic population:
//!
//! ```text
//! decay_credits ──► for each opted-in clinic (snapshot) ──► distribute_pool
//!                     ├─ maybe read
//!                     ├─ maybe publish (never a free-rider)
//!                     └─ maybe opt out (low balance + free-rider or damaged reputation)
//! ```
//!
//! The driver only decides; every state change is an engine call.

use crate::reciprocity::{Clock, LedgerError, ReciprocityEngine};
use crate::simulation::report::SimulationResult;
use crate::simulation::scenario::{draft_entry, BehaviorConfig};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// What happened in one round
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSummary {
    /// 1-based round number
    pub round: u32,

    /// Reads that returned at least one entry
    pub reads: u64,

    pub publishes: u64,

    /// Disputes that produced a slash
    pub slashes: u64,
    pub credits_slashed: u64,

    pub opt_outs: u64,
    pub pool_distributed: u64,
    pub pool_forfeited: u64,

    /// Clinics still opted in after the round
    pub opted_in: u64,
}

pub struct RoundDriver<C: Clock> {
    engine: ReciprocityEngine<C>,
    behavior: BehaviorConfig,
    patients: Vec<String>,
    rounds_run: u32,
    total_reads: u64,
    total_publishes: u64,
}

impl<C: Clock> RoundDriver<C> {
    pub fn new(
        engine: ReciprocityEngine<C>,
        behavior: BehaviorConfig,
        patients: Vec<String>,
    ) -> Self {
        Self {
            engine,
            behavior,
            patients,
            rounds_run: 0,
            total_reads: 0,
            total_publishes: 0,
        }
    }

    /// Execute one full round: decay, clinic actions, pool payout
    pub fn run_round<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
    ) -> Result<RoundSummary, LedgerError> {
        self.rounds_run += 1;
        let mut summary = RoundSummary {
            round: self.rounds_run,
            ..RoundSummary::default()
        };
        let slashes_before = self.engine.slash_history().len();

        self.engine.decay_credits();

        for clinic_id in self.engine.clinic_ids() {
            let opted_in = self
                .engine
                .clinic(&clinic_id)
                .map(|c| c.opted_in)
                .ok_or_else(|| LedgerError::UnknownClinic(clinic_id.clone()))?;
            if !opted_in {
                continue;
            }

            if self.attempt_read(&clinic_id, rng)? {
                summary.reads += 1;
            }
            if self.attempt_publish(&clinic_id, rng)? {
                summary.publishes += 1;
            }
            if self.consider_opt_out(&clinic_id, rng)? {
                summary.opt_outs += 1;
            }
        }

        let new_slashes = &self.engine.slash_history()[slashes_before..];
        summary.slashes = new_slashes.len() as u64;
        summary.credits_slashed = new_slashes.iter().map(|s| s.credits_slashed).sum();

        let distribution = self.engine.distribute_pool();
        summary.pool_distributed = distribution.total_paid();
        summary.pool_forfeited = distribution.residual;
        summary.opted_in = self.engine.opted_in_count() as u64;

        self.total_reads += summary.reads;
        self.total_publishes += summary.publishes;

        info!(
            round = summary.round,
            reads = summary.reads,
            publishes = summary.publishes,
            slashes = summary.slashes,
            opt_outs = summary.opt_outs,
            opted_in = summary.opted_in,
            "Round complete"
        );

        Ok(summary)
    }

    /// Returns true when the read came back with records
    fn attempt_read<R: Rng + ?Sized>(
        &mut self,
        clinic_id: &str,
        rng: &mut R,
    ) -> Result<bool, LedgerError> {
        if rng.gen::<f64>() >= self.behavior.read_probability {
            return Ok(false);
        }
        let Some(patient_id) = self.patients.choose(rng) else {
            return Ok(false);
        };

        let ttl = self.engine.config().token_ttl();
        let token = self.engine.issue_patient_token(patient_id, clinic_id, ttl);
        let entries = self.engine.read_history(clinic_id, &token)?;
        Ok(!entries.is_empty())
    }

    fn attempt_publish<R: Rng + ?Sized>(
        &mut self,
        clinic_id: &str,
        rng: &mut R,
    ) -> Result<bool, LedgerError> {
        let clinic = self
            .engine
            .clinic(clinic_id)
            .ok_or_else(|| LedgerError::UnknownClinic(clinic_id.to_string()))?;
        if clinic.profile.free_rider {
            return Ok(false);
        }

        let in_need = clinic.credits < self.behavior.publish_need_threshold;
        if !in_need && rng.gen::<f64>() >= clinic.profile.share_propensity {
            return Ok(false);
        }

        let Some(patient_id) = self.patients.choose(rng) else {
            return Ok(false);
        };
        let now = self.engine.clock().now();
        let entry = draft_entry(clinic, patient_id, &self.behavior, now, rng);
        self.engine.publish_history(clinic_id, entry, rng)
    }

    fn consider_opt_out<R: Rng + ?Sized>(
        &mut self,
        clinic_id: &str,
        rng: &mut R,
    ) -> Result<bool, LedgerError> {
        let clinic = self
            .engine
            .clinic(clinic_id)
            .ok_or_else(|| LedgerError::UnknownClinic(clinic_id.to_string()))?;
        if clinic.credits >= self.behavior.opt_out_balance_threshold
            || rng.gen::<f64>() >= self.behavior.opt_out_probability
        {
            return Ok(false);
        }

        if clinic.profile.free_rider || clinic.reputation < self.behavior.opt_out_reputation_floor {
            debug!(
                clinic_id = %clinic_id,
                credits = clinic.credits,
                reputation = clinic.reputation,
                "Clinic leaving"
            );
            self.engine.opt_out(clinic_id)?;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn engine(&self) -> &ReciprocityEngine<C> {
        &self.engine
    }

    pub fn rounds_run(&self) -> u32 {
        self.rounds_run
    }

    pub fn total_reads(&self) -> u64 {
        self.total_reads
    }

    pub fn total_publishes(&self) -> u64 {
        self.total_publishes
    }

    /// Snapshot of the population as it stands now
    pub fn result(&self) -> SimulationResult {
        SimulationResult::from_engine(&self.engine, self.total_reads, self.total_publishes)
    }

    pub fn into_engine(self) -> ReciprocityEngine<C> {
        self.engine
    }
}
