//! Clinic Reciprocity
//!
//! Token-gated, credit-metered reciprocity mechanism for sharing patient
//! histories between competing clinics, with stake-and-slash quality audits
//! and a pooled reward for contributors. A repeated-round simulator drives a
//! population of clinic agents through the mechanism.
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── lib.rs          - Crate root with re-exports
//! ├── main.rs         - Simulator entrypoint
//! ├── config.rs       - Environment-driven configuration
//! ├── reciprocity/    - Ledger & access engine
//! │   ├── engine.rs   - Reads, publishes, disputes, decay, pool payout
//! │   ├── clinic.rs   - Clinic accounts & behavioral profiles
//! │   ├── history.rs  - History entries, access tokens, access log rows
//! │   ├── slash.rs    - Slash audit records
//! │   └── clock.rs    - Injectable time source
//! └── simulation/     - Round driver
//!     ├── driver.rs   - Per-round state transition
//!     ├── scenario.rs - Population & draft generation
//!     └── report.rs   - Result records & rendering
//! ```

pub mod config;
pub mod reciprocity;
pub mod simulation;

// Re-export main types for convenience
pub use config::{AppConfig, LoggingConfig, OutputConfig, OutputFormat};

pub use reciprocity::{
    AccessLogEntry, AccessToken, BehaviorProfile, Clinic, Clock, EngineConfig, HistoryEntry,
    LedgerError, ManualClock, PoolDistribution, ReciprocityEngine, SlashRecord, SystemClock,
};

pub use simulation::{
    simulate, simulate_detailed, BehaviorConfig, RoundDriver, RoundSummary, ScenarioConfig,
    SimulationConfig, SimulationResult, SimulationTrace,
};
