//! Reciprocity Engine - Ledger Owner
//!
//! Every economic state change goes through this type: token-gated reads,
//! staked publishes, post-publish disputes, per-round decay and the pool
//! payout. Operations run to completion one at a time; nothing here is
//! shared across threads.

use crate::reciprocity::clock::{Clock, SystemClock};
use crate::reciprocity::slash::clamp_penalty;
use crate::reciprocity::{
    AccessLogEntry, AccessToken, Clinic, HistoryEntry, LedgerError, SlashRecord,
};
use chrono::Duration;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Reputation multiplier applied to the author of a disputed low-quality entry
pub const REPUTATION_SLASH_FACTOR: f64 = 0.9;

/// Economic parameters, fixed for the lifetime of an engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Credits charged per successful read
    pub read_cost: u64,

    /// Credits paid per accepted publish
    pub publish_reward: u64,

    /// Credits escrowed per publish (must be held to publish)
    pub publish_stake: u64,

    /// Credits removed from every opted-in balance each round
    pub decay_per_round: u64,

    /// Balance required before a read is even considered
    pub min_credits_to_read: u64,

    /// Chance that a publish is audited
    pub dispute_probability: f64,

    /// Audited entries scoring below this are slashed
    pub dispute_threshold: f64,

    /// Credits removed by a slash (clamped to the balance)
    pub slash_amount: u64,

    /// Fraction of each read fee routed to the pool
    pub match_pool_rate: f64,

    /// Lifetime of a freshly issued access token
    pub token_ttl_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            read_cost: 3,
            publish_reward: 4,
            publish_stake: 2,
            decay_per_round: 1,
            min_credits_to_read: 3,
            dispute_probability: 0.12,
            dispute_threshold: 0.45,
            slash_amount: 6,
            match_pool_rate: 0.5,
            token_ttl_secs: 3600,
        }
    }
}

impl EngineConfig {
    /// Portion of one read fee that lands in the pool
    pub fn pool_cut(&self) -> u64 {
        (self.read_cost as f64 * self.match_pool_rate).floor() as u64
    }

    /// Token lifetime, capped at `i32::MAX` seconds
    pub fn token_ttl(&self) -> Duration {
        Duration::seconds(self.token_ttl_secs.min(i32::MAX as u64) as i64)
    }
}

/// Outcome of one end-of-round pool payout
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolDistribution {
    /// Pool balance before the payout
    pub pool_before: u64,

    /// (clinic_id, credits) for every contributor, in registration order
    pub payouts: Vec<(String, u64)>,

    /// Credits that left the pool without being paid out
    pub residual: u64,
}

impl PoolDistribution {
    pub fn total_paid(&self) -> u64 {
        self.payouts.iter().map(|(_, share)| share).sum()
    }
}

/// The ledger and access-control engine
pub struct ReciprocityEngine<C: Clock = SystemClock> {
    config: EngineConfig,
    clock: C,

    /// Clinics in registration order
    clinics: Vec<Clinic>,

    /// clinic_id -> position in `clinics`
    index: HashMap<String, usize>,

    /// patient_id -> published entries, oldest first
    patient_histories: HashMap<String, Vec<HistoryEntry>>,

    access_log: Vec<AccessLogEntry>,
    slash_log: Vec<SlashRecord>,
    pool_balance: u64,
}

impl ReciprocityEngine<SystemClock> {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> ReciprocityEngine<C> {
    pub fn with_clock(config: EngineConfig, clock: C) -> Self {
        Self {
            config,
            clock,
            clinics: Vec::new(),
            index: HashMap::new(),
            patient_histories: HashMap::new(),
            access_log: Vec::new(),
            slash_log: Vec::new(),
            pool_balance: 0,
        }
    }

    pub fn register_clinic(&mut self, clinic: Clinic) -> Result<(), LedgerError> {
        if self.index.contains_key(&clinic.clinic_id) {
            return Err(LedgerError::DuplicateClinic(clinic.clinic_id));
        }

        debug!(
            clinic_id = %clinic.clinic_id,
            credits = clinic.credits,
            free_rider = clinic.profile.free_rider,
            low_quality = clinic.profile.low_quality,
            "Registered clinic"
        );

        self.index.insert(clinic.clinic_id.clone(), self.clinics.len());
        self.clinics.push(clinic);
        Ok(())
    }

    /// Issue a token for one patient/clinic pair.
    ///
    /// No authorization happens here; it is checked when the token is used.
    pub fn issue_patient_token(
        &self,
        patient_id: &str,
        clinic_id: &str,
        ttl: Duration,
    ) -> AccessToken {
        let now = self.clock.now();
        AccessToken {
            patient_id: patient_id.to_string(),
            issued_to_clinic_id: clinic_id.to_string(),
            issued_at: now,
            expires_at: now + ttl,
            encounter_bound: true,
        }
    }

    /// Eligibility predicate for a read; never mutates state
    pub fn can_read(&self, clinic_id: &str, token: &AccessToken) -> Result<bool, LedgerError> {
        let clinic = &self.clinics[self.position(clinic_id)?];

        Ok(clinic.opted_in
            && token.is_issued_to(clinic_id)
            && !token.is_expired(self.clock.now())
            && clinic.credits >= self.config.min_credits_to_read)
    }

    /// Read a patient's shared history.
    ///
    /// An empty result means either "denied" or "nothing published yet";
    /// denied reads leave all state untouched.
    pub fn read_history(
        &mut self,
        clinic_id: &str,
        token: &AccessToken,
    ) -> Result<Vec<HistoryEntry>, LedgerError> {
        if !self.can_read(clinic_id, token)? {
            debug!(clinic_id = %clinic_id, patient_id = %token.patient_id, "Read denied");
            return Ok(Vec::new());
        }

        let pos = self.position(clinic_id)?;
        let read_cost = self.config.read_cost;
        let clinic = &mut self.clinics[pos];
        if clinic.credits < read_cost {
            debug!(
                clinic_id = %clinic_id,
                credits = clinic.credits,
                read_cost,
                "Read denied: balance below read cost"
            );
            return Ok(Vec::new());
        }

        clinic.credits -= read_cost;
        self.pool_balance = self.pool_balance.saturating_add(self.config.pool_cut());
        self.access_log.push(AccessLogEntry {
            at: self.clock.now(),
            clinic_id: clinic_id.to_string(),
            patient_id: token.patient_id.clone(),
        });

        let entries = self
            .patient_histories
            .get(&token.patient_id)
            .cloned()
            .unwrap_or_default();

        debug!(
            clinic_id = %clinic_id,
            patient_id = %token.patient_id,
            entries = entries.len(),
            "History read"
        );

        Ok(entries)
    }

    /// Stake, reward and append an entry, then maybe audit it.
    ///
    /// Returns `Ok(false)` without touching state when the clinic has opted
    /// out or cannot cover the stake.
    pub fn publish_history<R: Rng + ?Sized>(
        &mut self,
        clinic_id: &str,
        mut entry: HistoryEntry,
        rng: &mut R,
    ) -> Result<bool, LedgerError> {
        let pos = self.position(clinic_id)?;
        if entry.author_clinic_id != clinic_id {
            return Err(LedgerError::AuthorMismatch {
                publisher: clinic_id.to_string(),
                author: entry.author_clinic_id,
            });
        }
        if !entry.has_valid_quality() {
            return Err(LedgerError::InvalidQuality(entry.quality_score));
        }

        let stake = self.config.publish_stake;
        let clinic = &mut self.clinics[pos];
        if !clinic.opted_in || clinic.credits < stake {
            debug!(
                clinic_id = %clinic_id,
                opted_in = clinic.opted_in,
                credits = clinic.credits,
                stake,
                "Publish rejected"
            );
            return Ok(false);
        }

        clinic.credits -= stake;
        entry.stake = stake;
        clinic.credits = clinic.credits.saturating_add(self.config.publish_reward);
        clinic.last_round_contribution += 1;

        debug!(
            clinic_id = %clinic_id,
            patient_id = %entry.patient_id,
            quality = entry.quality_score,
            "History published"
        );

        let patient_id = entry.patient_id.clone();
        let quality = entry.quality_score;
        self.patient_histories
            .entry(patient_id.clone())
            .or_default()
            .push(entry);

        if rng.gen::<f64>() < self.config.dispute_probability {
            self.resolve_dispute(pos, &patient_id, quality);
        }

        Ok(true)
    }

    /// Penalise the author when an audited entry is below the threshold
    fn resolve_dispute(&mut self, author_pos: usize, patient_id: &str, quality: f64) {
        let below_threshold = quality < self.config.dispute_threshold;
        if !below_threshold {
            return;
        }

        let author = &mut self.clinics[author_pos];
        let penalty = clamp_penalty(self.config.slash_amount, author.credits);
        let reputation_before = author.reputation;

        author.credits -= penalty;
        author.reputation *= REPUTATION_SLASH_FACTOR;

        info!(
            clinic_id = %author.clinic_id,
            patient_id = %patient_id,
            quality,
            penalty,
            reputation = author.reputation,
            "Slashed low-quality entry"
        );

        self.slash_log.push(SlashRecord {
            clinic_id: author.clinic_id.clone(),
            patient_id: patient_id.to_string(),
            quality_score: quality,
            credits_slashed: penalty,
            reputation_before,
            reputation_after: author.reputation,
            slashed_at: self.clock.now(),
        });
    }

    /// Apply one round of decay to every opted-in balance, floored at zero
    pub fn decay_credits(&mut self) {
        let decay = self.config.decay_per_round;
        for clinic in self.clinics.iter_mut().filter(|c| c.opted_in && c.credits > 0) {
            clinic.credits = clinic.credits.saturating_sub(decay);
        }
    }

    /// Pay the pool out in proportion to this round's publishes.
    ///
    /// Integer truncation leftovers, and the whole pool when nobody
    /// contributed, are forfeited rather than carried into the next round.
    /// Afterwards the pool and every contribution counter are zero.
    pub fn distribute_pool(&mut self) -> PoolDistribution {
        let pool_before = self.pool_balance;
        let total: u64 = self.clinics.iter().map(|c| c.last_round_contribution).sum();

        let mut payouts = Vec::new();
        if total > 0 && pool_before > 0 {
            for clinic in self.clinics.iter_mut().filter(|c| c.is_contributor()) {
                let share = (u128::from(pool_before) * u128::from(clinic.last_round_contribution)
                    / u128::from(total)) as u64;
                clinic.credits = clinic.credits.saturating_add(share);
                payouts.push((clinic.clinic_id.clone(), share));
            }
        }

        for clinic in self.clinics.iter_mut() {
            clinic.last_round_contribution = 0;
        }
        self.pool_balance = 0;

        let distribution = PoolDistribution {
            pool_before,
            residual: pool_before - payouts.iter().map(|(_, s)| s).sum::<u64>(),
            payouts,
        };

        debug!(
            pool_before,
            contributors = distribution.payouts.len(),
            paid = distribution.total_paid(),
            residual = distribution.residual,
            "Pool distributed"
        );

        distribution
    }

    /// Permanently withdraw a clinic from the mechanism
    pub fn opt_out(&mut self, clinic_id: &str) -> Result<(), LedgerError> {
        let pos = self.position(clinic_id)?;
        let clinic = &mut self.clinics[pos];
        if clinic.opted_in {
            clinic.opted_in = false;
            info!(
                clinic_id = %clinic_id,
                credits = clinic.credits,
                reputation = clinic.reputation,
                "Clinic opted out"
            );
        }
        Ok(())
    }

    /// Fraction of registered clinics still opted in (0 when none registered)
    pub fn opt_in_rate(&self) -> f64 {
        if self.clinics.is_empty() {
            return 0.0;
        }
        self.opted_in_count() as f64 / self.clinics.len() as f64
    }

    pub fn opted_in_count(&self) -> usize {
        self.clinics.iter().filter(|c| c.opted_in).count()
    }

    pub fn clinic(&self, clinic_id: &str) -> Option<&Clinic> {
        self.index.get(clinic_id).map(|&pos| &self.clinics[pos])
    }

    /// All clinics in registration order
    pub fn clinics(&self) -> &[Clinic] {
        &self.clinics
    }

    /// Snapshot of clinic ids in registration order
    pub fn clinic_ids(&self) -> Vec<String> {
        self.clinics.iter().map(|c| c.clinic_id.clone()).collect()
    }

    pub fn patient_history(&self, patient_id: &str) -> &[HistoryEntry] {
        self.patient_histories
            .get(patient_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn access_log(&self) -> &[AccessLogEntry] {
        &self.access_log
    }

    pub fn slash_history(&self) -> &[SlashRecord] {
        &self.slash_log
    }

    pub fn pool_balance(&self) -> u64 {
        self.pool_balance
    }

    /// Sum of all clinic balances (pool excluded)
    pub fn total_credits(&self) -> u64 {
        self.clinics.iter().map(|c| c.credits).sum()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn position(&self, clinic_id: &str) -> Result<usize, LedgerError> {
        self.index
            .get(clinic_id)
            .copied()
            .ok_or_else(|| LedgerError::UnknownClinic(clinic_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reciprocity::{BehaviorProfile, ManualClock};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn quiet_config() -> EngineConfig {
        EngineConfig {
            dispute_probability: 0.0,
            ..EngineConfig::default()
        }
    }

    fn engine_with(
        config: EngineConfig,
        clinics: &[(&str, u64)],
    ) -> ReciprocityEngine<ManualClock> {
        let mut engine = ReciprocityEngine::with_clock(config, ManualClock::default());
        for (id, credits) in clinics {
            engine
                .register_clinic(Clinic::new(*id, *credits, BehaviorProfile::default()))
                .unwrap();
        }
        engine
    }

    fn entry(engine: &ReciprocityEngine<ManualClock>, author: &str, quality: f64) -> HistoryEntry {
        HistoryEntry::new("P0001", author, "Structured summary", quality, engine.clock().now())
    }

    fn credits(engine: &ReciprocityEngine<ManualClock>, id: &str) -> u64 {
        engine.clinic(id).unwrap().credits
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut engine = engine_with(quiet_config(), &[("C001", 10)]);
        let err = engine
            .register_clinic(Clinic::new("C001", 5, BehaviorProfile::default()))
            .unwrap_err();
        assert_eq!(err, LedgerError::DuplicateClinic("C001".to_string()));
        assert_eq!(credits(&engine, "C001"), 10);
    }

    #[test]
    fn test_unknown_clinic_is_an_error() {
        let mut engine = engine_with(quiet_config(), &[]);
        let token = engine.issue_patient_token("P0001", "C404", Duration::hours(1));

        assert!(matches!(
            engine.can_read("C404", &token),
            Err(LedgerError::UnknownClinic(_))
        ));
        assert!(matches!(
            engine.read_history("C404", &token),
            Err(LedgerError::UnknownClinic(_))
        ));
        assert!(engine.opt_out("C404").is_err());
    }

    #[test]
    fn test_can_read_requires_binding_and_balance() {
        let engine = engine_with(quiet_config(), &[("C001", 5), ("C002", 5), ("C003", 2)]);
        let token = engine.issue_patient_token("P0001", "C001", Duration::hours(1));

        assert!(engine.can_read("C001", &token).unwrap());
        assert!(!engine.can_read("C002", &token).unwrap(), "token bound to C001");

        let poor = engine.issue_patient_token("P0001", "C003", Duration::hours(1));
        assert!(!engine.can_read("C003", &poor).unwrap(), "below min credits");
    }

    #[test]
    fn test_expired_token_denied() {
        let mut engine = engine_with(quiet_config(), &[("C001", 10)]);
        let token = engine.issue_patient_token("P0001", "C001", Duration::seconds(60));

        engine.clock().advance(Duration::seconds(60));
        assert!(engine.can_read("C001", &token).unwrap(), "valid at expiry instant");

        engine.clock().advance(Duration::seconds(1));
        assert!(!engine.can_read("C001", &token).unwrap());
        assert!(engine.read_history("C001", &token).unwrap().is_empty());
        assert_eq!(credits(&engine, "C001"), 10);
        assert!(engine.access_log().is_empty());
    }

    #[test]
    fn test_opted_out_clinic_cannot_read_or_publish() {
        let mut engine = engine_with(quiet_config(), &[("C001", 10)]);
        let mut rng = StdRng::seed_from_u64(1);
        engine.opt_out("C001").unwrap();

        let token = engine.issue_patient_token("P0001", "C001", Duration::hours(1));
        assert!(!engine.can_read("C001", &token).unwrap());

        let e = entry(&engine, "C001", 0.9);
        assert!(!engine.publish_history("C001", e, &mut rng).unwrap());
        assert_eq!(credits(&engine, "C001"), 10);
        assert!(engine.patient_history("P0001").is_empty());
    }

    #[test]
    fn test_read_denied_when_cost_exceeds_balance() {
        let config = EngineConfig {
            read_cost: 5,
            min_credits_to_read: 3,
            ..quiet_config()
        };
        let mut engine = engine_with(config, &[("C001", 4)]);
        let token = engine.issue_patient_token("P0001", "C001", Duration::hours(1));

        assert!(engine.can_read("C001", &token).unwrap());
        assert!(engine.read_history("C001", &token).unwrap().is_empty());
        assert_eq!(credits(&engine, "C001"), 4);
        assert_eq!(engine.pool_balance(), 0);
    }

    #[test]
    fn test_successful_read_charges_and_logs() {
        let mut engine = engine_with(quiet_config(), &[("C001", 10)]);
        let token = engine.issue_patient_token("P0009", "C001", Duration::hours(1));

        let entries = engine.read_history("C001", &token).unwrap();
        assert!(entries.is_empty(), "no records yet, but the read still succeeds");
        assert_eq!(credits(&engine, "C001"), 7);
        assert_eq!(engine.pool_balance(), 1);
        assert_eq!(engine.access_log().len(), 1);
        assert_eq!(engine.access_log()[0].patient_id, "P0009");
    }

    #[test]
    fn test_read_returns_a_copy() {
        let mut engine = engine_with(quiet_config(), &[("C001", 20)]);
        let mut rng = StdRng::seed_from_u64(1);
        let e = entry(&engine, "C001", 0.8);
        engine.publish_history("C001", e, &mut rng).unwrap();

        let token = engine.issue_patient_token("P0001", "C001", Duration::hours(1));
        let mut entries = engine.read_history("C001", &token).unwrap();
        entries[0].summary = "tampered".to_string();
        entries.clear();

        assert_eq!(engine.patient_history("P0001").len(), 1);
        assert_eq!(engine.patient_history("P0001")[0].summary, "Structured summary");
    }

    #[test]
    fn test_publish_stakes_and_rewards() {
        let mut engine = engine_with(quiet_config(), &[("C001", 2)]);
        let mut rng = StdRng::seed_from_u64(1);
        let e = entry(&engine, "C001", 0.8);

        assert!(engine.publish_history("C001", e, &mut rng).unwrap());
        assert_eq!(credits(&engine, "C001"), 4);
        assert_eq!(engine.clinic("C001").unwrap().last_round_contribution, 1);

        let stored = &engine.patient_history("P0001")[0];
        assert_eq!(stored.stake, 2);
        assert!(stored.redacted_author);
    }

    #[test]
    fn test_publish_rejects_foreign_author() {
        let mut engine = engine_with(quiet_config(), &[("C001", 10), ("C002", 10)]);
        let mut rng = StdRng::seed_from_u64(1);
        let e = entry(&engine, "C002", 0.8);

        let err = engine.publish_history("C001", e, &mut rng).unwrap_err();
        assert!(matches!(err, LedgerError::AuthorMismatch { .. }));
        assert!(engine.patient_history("P0001").is_empty());
    }

    #[test]
    fn test_dispute_slashes_low_quality() {
        let config = EngineConfig {
            dispute_probability: 1.0,
            ..EngineConfig::default()
        };
        let mut engine = engine_with(config, &[("C001", 10)]);
        let mut rng = StdRng::seed_from_u64(1);
        let e = entry(&engine, "C001", 0.2);

        assert!(engine.publish_history("C001", e, &mut rng).unwrap());

        // 10 - 2 stake + 4 reward - 6 slash
        assert_eq!(credits(&engine, "C001"), 6);
        assert!((engine.clinic("C001").unwrap().reputation - 0.9).abs() < 1e-12);
        assert_eq!(engine.slash_history().len(), 1);
        assert_eq!(engine.slash_history()[0].credits_slashed, 6);
        assert_eq!(engine.patient_history("P0001").len(), 1, "entry stays published");
    }

    #[test]
    fn test_dispute_spares_entries_at_threshold() {
        let config = EngineConfig {
            dispute_probability: 1.0,
            ..EngineConfig::default()
        };
        let mut engine = engine_with(config, &[("C001", 10)]);
        let mut rng = StdRng::seed_from_u64(1);
        let e = entry(&engine, "C001", 0.45);

        assert!(engine.publish_history("C001", e, &mut rng).unwrap());
        assert_eq!(credits(&engine, "C001"), 12);
        assert_eq!(engine.clinic("C001").unwrap().reputation, 1.0);
        assert!(engine.slash_history().is_empty());
    }

    #[test]
    fn test_slash_clamped_to_balance() {
        let config = EngineConfig {
            dispute_probability: 1.0,
            slash_amount: 50,
            ..EngineConfig::default()
        };
        let mut engine = engine_with(config, &[("C001", 3)]);
        let mut rng = StdRng::seed_from_u64(1);
        let e = entry(&engine, "C001", 0.1);

        engine.publish_history("C001", e, &mut rng).unwrap();
        assert_eq!(credits(&engine, "C001"), 0);
        assert_eq!(engine.slash_history()[0].credits_slashed, 5);
    }

    #[test]
    fn test_decay_floors_at_zero_and_skips_opted_out() {
        let config = EngineConfig {
            decay_per_round: 3,
            ..quiet_config()
        };
        let mut engine = engine_with(config, &[("C001", 10), ("C002", 2), ("C003", 10)]);
        engine.opt_out("C003").unwrap();

        engine.decay_credits();
        assert_eq!(credits(&engine, "C001"), 7);
        assert_eq!(credits(&engine, "C002"), 0);
        assert_eq!(credits(&engine, "C003"), 10);
    }

    #[test]
    fn test_distribution_without_contributors_forfeits_pool() {
        let mut engine = engine_with(quiet_config(), &[("C001", 10)]);
        engine.pool_balance = 5;

        let distribution = engine.distribute_pool();
        assert!(distribution.payouts.is_empty());
        assert_eq!(distribution.residual, 5);
        assert_eq!(engine.pool_balance(), 0);
        assert_eq!(credits(&engine, "C001"), 10);
    }

    #[test]
    fn test_distribution_truncates_shares() {
        let mut engine = engine_with(quiet_config(), &[("C001", 0), ("C002", 0), ("C003", 0)]);
        for clinic in engine.clinics.iter_mut() {
            clinic.last_round_contribution = 1;
        }
        engine.pool_balance = 10;

        let distribution = engine.distribute_pool();
        assert_eq!(distribution.total_paid(), 9);
        assert_eq!(distribution.residual, 1);
        assert!(engine.clinics().iter().all(|c| c.credits == 3));
        assert!(engine.clinics().iter().all(|c| c.last_round_contribution == 0));
    }

    #[test]
    fn test_opt_in_rate() {
        let empty = engine_with(quiet_config(), &[]);
        assert_eq!(empty.opt_in_rate(), 0.0);

        let mut engine = engine_with(
            quiet_config(),
            &[("C001", 1), ("C002", 1), ("C003", 1), ("C004", 1)],
        );
        engine.opt_out("C002").unwrap();
        engine.opt_out("C002").unwrap();
        assert_eq!(engine.opt_in_rate(), 0.75);
        assert_eq!(engine.opted_in_count(), 3);
    }

    #[test]
    fn test_pool_cut_floors() {
        let config = EngineConfig {
            read_cost: 3,
            match_pool_rate: 0.5,
            ..EngineConfig::default()
        };
        assert_eq!(config.pool_cut(), 1);
    }

    #[test]
    fn test_publish_rejects_invalid_quality() {
        let config = EngineConfig {
            dispute_probability: 1.0,
            ..EngineConfig::default()
        };
        let mut engine = engine_with(config, &[("C001", 10)]);
        let mut rng = StdRng::seed_from_u64(1);

        for quality in [f64::NAN, -0.1, 1.1] {
            let e = entry(&engine, "C001", quality);
            let err = engine.publish_history("C001", e, &mut rng).unwrap_err();
            assert!(matches!(err, LedgerError::InvalidQuality(_)), "{} accepted", quality);
        }

        let clinic = engine.clinic("C001").unwrap();
        assert_eq!(clinic.credits, 10);
        assert_eq!(clinic.reputation, 1.0);
        assert_eq!(clinic.last_round_contribution, 0);
        assert!(engine.slash_history().is_empty());
        assert!(engine.patient_history("P0001").is_empty());
    }

    #[test]
    fn test_dispute_only_slashes_scores_strictly_below_threshold() {
        let mut engine = engine_with(quiet_config(), &[("C001", 10)]);

        engine.resolve_dispute(0, "P0001", f64::NAN);
        engine.resolve_dispute(0, "P0001", 0.45);
        assert!(engine.slash_history().is_empty());
        assert_eq!(credits(&engine, "C001"), 10);

        engine.resolve_dispute(0, "P0001", 0.44);
        assert_eq!(engine.slash_history().len(), 1);
    }

    #[test]
    fn test_balances_saturate_instead_of_overflowing() {
        let mut engine = engine_with(quiet_config(), &[("C001", u64::MAX - 1)]);
        let mut rng = StdRng::seed_from_u64(1);

        let e = entry(&engine, "C001", 0.9);
        assert!(engine.publish_history("C001", e, &mut rng).unwrap());
        assert_eq!(credits(&engine, "C001"), u64::MAX);

        engine.pool_balance = u64::MAX;
        let token = engine.issue_patient_token("P0001", "C001", Duration::hours(1));
        engine.read_history("C001", &token).unwrap();
        assert_eq!(credits(&engine, "C001"), u64::MAX - 3);
        assert_eq!(engine.pool_balance(), u64::MAX);

        let distribution = engine.distribute_pool();
        assert_eq!(distribution.payouts, vec![("C001".to_string(), u64::MAX)]);
        assert_eq!(credits(&engine, "C001"), u64::MAX);
    }
}
