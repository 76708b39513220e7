//! Shared History Records and Access Tokens
//!
//! Entries are append-only and authored anonymously: readers only ever see
//! `redacted_author = true`. Tokens bind one patient to one clinic until an
//! absolute expiry; they are not persisted and cannot be revoked.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One published observation about a patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub patient_id: String,

    /// Clinic that wrote the entry (and answers for it in a dispute)
    pub author_clinic_id: String,

    pub summary: String,

    /// Quality in [0, 1]; disputes only bite below the configured threshold
    pub quality_score: f64,

    pub created_at: DateTime<Utc>,

    /// Credits escrowed at publish time (set by the engine)
    pub stake: u64,

    /// Author identity hidden from readers
    pub redacted_author: bool,
}

impl HistoryEntry {
    pub fn new(
        patient_id: impl Into<String>,
        author_clinic_id: impl Into<String>,
        summary: impl Into<String>,
        quality_score: f64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            patient_id: patient_id.into(),
            author_clinic_id: author_clinic_id.into(),
            summary: summary.into(),
            quality_score,
            created_at,
            stake: 0,
            redacted_author: true,
        }
    }

    /// Finite and within [0, 1]
    pub fn has_valid_quality(&self) -> bool {
        (0.0..=1.0).contains(&self.quality_score)
    }
}

/// Short-lived read capability for a single patient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub patient_id: String,

    /// Only this clinic may present the token
    pub issued_to_clinic_id: String,

    pub issued_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,

    /// Asserts an active clinical encounter; carried, not verified
    pub encounter_bound: bool,
}

impl AccessToken {
    /// Usable strictly up to and including `expires_at`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_issued_to(&self, clinic_id: &str) -> bool {
        self.issued_to_clinic_id == clinic_id
    }
}

/// Audit row for a successful read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLogEntry {
    pub at: DateTime<Utc>,
    pub clinic_id: String,
    pub patient_id: String,
}
