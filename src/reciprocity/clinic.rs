//! Clinic Accounts
//!
//! A clinic's balance and reputation are mutated only by the engine.
//! Reputation starts at 1.0 and can only shrink.

use serde::{Deserialize, Serialize};

/// Behavioral parameters fixed at registration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BehaviorProfile {
    /// Chance of publishing in a round when not already short of credits
    pub share_propensity: f64,

    /// Never publishes
    pub free_rider: bool,

    /// Mostly publishes thin, low-quality summaries
    pub low_quality: bool,
}

impl Default for BehaviorProfile {
    fn default() -> Self {
        Self {
            share_propensity: 0.7,
            free_rider: false,
            low_quality: false,
        }
    }
}

/// A market participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clinic {
    pub clinic_id: String,

    /// Credit balance (never negative)
    pub credits: u64,

    /// Starts at 1.0, multiplied down by disputes
    pub reputation: f64,

    /// Once false, stays false
    pub opted_in: bool,

    pub profile: BehaviorProfile,

    /// Publishes accepted this round; cleared by pool distribution
    pub last_round_contribution: u64,
}

impl Clinic {
    pub fn new(clinic_id: impl Into<String>, credits: u64, profile: BehaviorProfile) -> Self {
        Self {
            clinic_id: clinic_id.into(),
            credits,
            reputation: 1.0,
            opted_in: true,
            profile,
            last_round_contribution: 0,
        }
    }

    /// Whether the clinic contributed at least one entry this round
    pub fn is_contributor(&self) -> bool {
        self.last_round_contribution > 0
    }
}
