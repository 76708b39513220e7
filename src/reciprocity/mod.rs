//! Reciprocity Engine for Shared Patient Histories
//!
//! Owns every piece of mutable economic state: clinic balances and
//! reputation, the shared pool, per-patient history logs and the access log.
//! Reads are gated by short-lived tokens and metered in credits; publishes
//! are staked, rewarded, and occasionally audited.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌────────────────────┐     ┌─────────────────┐
//! │ AccessToken     │────►│ ReciprocityEngine  │◄────│ HistoryEntry    │
//! │ (read gate)     │     │ (ledger owner)     │     │ (staked publish)│
//! └─────────────────┘     └────────────────────┘     └─────────────────┘
//!                           │        │       │
//!                           ▼        ▼       ▼
//!                    ┌────────┐ ┌────────┐ ┌─────────────┐
//!                    │ Clinic │ │  Pool  │ │ SlashRecord │
//!                    │ table  │ │        │ │ (disputes)  │
//!                    └────────┘ └────────┘ └─────────────┘
//! ```
//!
//! ## Credit Model
//!
//! - Reads cost `read_cost`; `floor(read_cost * match_pool_rate)` of it feeds the pool
//! - Publishes escrow `publish_stake` and pay `publish_reward`
//! - Low-quality entries caught by a dispute draw are slashed (clamped to balance)
//!   and cost the author 10% of its reputation
//! - Every opted-in balance decays once per round, floored at zero
//! - The pool is split by that round's publish counts, then emptied

mod clinic;
mod clock;
mod engine;
mod history;
mod slash;

pub use clinic::{BehaviorProfile, Clinic};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{EngineConfig, PoolDistribution, ReciprocityEngine, REPUTATION_SLASH_FACTOR};
pub use history::{AccessLogEntry, AccessToken, HistoryEntry};
pub use slash::SlashRecord;

use thiserror::Error;

/// Misuse of the engine API.
///
/// Expected business outcomes (denied reads, unaffordable publishes) are not
/// errors; they come back as empty results or `false`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("unknown clinic: {0}")]
    UnknownClinic(String),

    #[error("clinic already registered: {0}")]
    DuplicateClinic(String),

    #[error("clinic {publisher} cannot publish an entry authored by {author}")]
    AuthorMismatch { publisher: String, author: String },

    #[error("quality score {0} is outside [0, 1]")]
    InvalidQuality(f64),
}
