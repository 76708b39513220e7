//! Scenario Generation
//!
//! Builds the clinic population and drafts the entries clinics try to
//! publish. Quality and summary are drawn together so the dispute process
//! sees a consistent pair.

use crate::reciprocity::{
    BehaviorProfile, Clinic, Clock, HistoryEntry, LedgerError, ReciprocityEngine,
};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const LOW_DETAIL_SUMMARY: &str = "Generic note: exercises advised. (low detail)";
pub const STRUCTURED_SUMMARY: &str =
    "Structured summary: Dx, red flags checked, plan-of-care, response, discharge status.";

/// Population and run shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub clinics: usize,
    pub patients: usize,
    pub rounds: u32,
    pub starter_credits: u64,

    /// Chance a clinic is created as a free-rider
    pub free_rider_fraction: f64,

    /// Chance a non-free-rider is created as a low-quality contributor
    pub low_quality_fraction: f64,

    pub seed: u64,

    /// Simulated time between rounds
    pub round_duration_secs: u64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            clinics: 200,
            patients: 400,
            rounds: 45,
            starter_credits: 10,
            free_rider_fraction: 0.18,
            low_quality_fraction: 0.10,
            seed: 7,
            round_duration_secs: 86_400,
        }
    }
}

/// Half-open quality interval `[low, high)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityBand {
    pub low: f64,
    pub high: f64,
}

impl QualityBand {
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.low + (self.high - self.low) * rng.gen::<f64>()
    }

    pub fn is_well_formed(&self) -> bool {
        (0.0..=1.0).contains(&self.low) && (0.0..=1.0).contains(&self.high) && self.low <= self.high
    }
}

/// Per-round decision rules for clinic agents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorConfig {
    /// Chance an opted-in clinic attempts a read each round
    pub read_probability: f64,

    /// Clinics below this balance publish regardless of propensity
    pub publish_need_threshold: u64,

    pub cooperative_share_propensity: f64,
    pub free_rider_share_propensity: f64,

    /// Chance a low-quality clinic drafts from the low band
    pub low_quality_draft_probability: f64,
    pub low_band: QualityBand,
    pub high_band: QualityBand,

    /// Opt-out is only considered below this balance
    pub opt_out_balance_threshold: u64,
    pub opt_out_probability: f64,

    /// Reputation under which a contributing clinic may still quit
    pub opt_out_reputation_floor: f64,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            read_probability: 0.55,
            publish_need_threshold: 6,
            cooperative_share_propensity: 0.75,
            free_rider_share_propensity: 0.05,
            low_quality_draft_probability: 0.6,
            low_band: QualityBand { low: 0.1, high: 0.5 },
            high_band: QualityBand { low: 0.6, high: 1.0 },
            opt_out_balance_threshold: 3,
            opt_out_probability: 0.05,
            opt_out_reputation_floor: 0.7,
        }
    }
}

pub fn clinic_id(index: usize) -> String {
    format!("C{:03}", index)
}

pub fn patient_ids(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("P{:04}", i)).collect()
}

/// Draw one clinic's archetype
pub fn draw_profile<R: Rng + ?Sized>(
    scenario: &ScenarioConfig,
    behavior: &BehaviorConfig,
    rng: &mut R,
) -> BehaviorProfile {
    let free_rider = rng.gen::<f64>() < scenario.free_rider_fraction;
    let low_quality = !free_rider && rng.gen::<f64>() < scenario.low_quality_fraction;
    let share_propensity = if free_rider {
        behavior.free_rider_share_propensity
    } else {
        behavior.cooperative_share_propensity
    };

    BehaviorProfile {
        share_propensity,
        free_rider,
        low_quality,
    }
}

/// Register `scenario.clinics` freshly drawn clinics with the engine
pub fn populate<C: Clock, R: Rng + ?Sized>(
    engine: &mut ReciprocityEngine<C>,
    scenario: &ScenarioConfig,
    behavior: &BehaviorConfig,
    rng: &mut R,
) -> Result<(), LedgerError> {
    for i in 0..scenario.clinics {
        let profile = draw_profile(scenario, behavior, rng);
        engine.register_clinic(Clinic::new(clinic_id(i), scenario.starter_credits, profile))?;
    }

    let free_riders = engine.clinics().iter().filter(|c| c.profile.free_rider).count();
    let low_quality = engine.clinics().iter().filter(|c| c.profile.low_quality).count();
    debug!(
        clinics = scenario.clinics,
        free_riders,
        low_quality,
        "Population generated"
    );

    Ok(())
}

/// Draft the entry a clinic would publish about `patient_id`
pub fn draft_entry<R: Rng + ?Sized>(
    clinic: &Clinic,
    patient_id: &str,
    behavior: &BehaviorConfig,
    created_at: DateTime<Utc>,
    rng: &mut R,
) -> HistoryEntry {
    let low_detail =
        clinic.profile.low_quality && rng.gen::<f64>() < behavior.low_quality_draft_probability;

    let (quality, summary) = if low_detail {
        (behavior.low_band.sample(rng), LOW_DETAIL_SUMMARY)
    } else {
        (behavior.high_band.sample(rng), STRUCTURED_SUMMARY)
    };

    HistoryEntry::new(patient_id, clinic.clinic_id.as_str(), summary, quality, created_at)
}
