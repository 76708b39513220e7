//! Dispute Slashing
//!
//! A dispute is drawn after a publish. Only entries whose quality falls below
//! the dispute threshold are penalised; each penalty is recorded here for
//! audit. Slashes never overdraw and never decay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A recorded slash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlashRecord {
    /// Author that was penalised
    pub clinic_id: String,

    /// Patient the disputed entry was about
    pub patient_id: String,

    /// Quality of the disputed entry
    pub quality_score: f64,

    /// Credits actually removed (clamped to the balance at the time)
    pub credits_slashed: u64,

    pub reputation_before: f64,
    pub reputation_after: f64,

    pub slashed_at: DateTime<Utc>,
}

impl SlashRecord {
    pub fn reputation_lost(&self) -> f64 {
        self.reputation_before - self.reputation_after
    }
}

/// Credits a slash can actually take from `balance`
pub(crate) fn clamp_penalty(slash_amount: u64, balance: u64) -> u64 {
    slash_amount.min(balance)
}
