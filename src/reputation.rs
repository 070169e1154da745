use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::auth::ensure_owner;
use crate::config::{ReputationConfig, MAX_SCORE};
use crate::decimal::Money;
use crate::errors::{ProtocolError, Result};
use crate::events::{Event, EventStore};
use crate::types::{AccountId, Tier};

/// repayment reputation for one borrower
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationRecord {
    pub score: u32,
    pub tier: Tier,
    pub on_time_count: u32,
    pub late_count: u32,
    pub default_count: u32,
    pub total_defaulted: Money,
    pub updated_at: DateTime<Utc>,
}

impl ReputationRecord {
    fn new(score: u32, now: DateTime<Utc>) -> Self {
        let score = score.min(MAX_SCORE);
        Self {
            score,
            tier: Tier::from_score(score),
            on_time_count: 0,
            late_count: 0,
            default_count: 0,
            total_defaulted: Money::ZERO,
            updated_at: now,
        }
    }
}

/// score ledger, written only by its owner
#[derive(Debug, Clone)]
pub struct ReputationLedger {
    owner: AccountId,
    config: ReputationConfig,
    records: HashMap<AccountId, ReputationRecord>,
}

impl ReputationLedger {
    pub fn new(owner: AccountId, config: ReputationConfig) -> Self {
        Self {
            owner,
            config,
            records: HashMap::new(),
        }
    }

    pub fn record(&self, user: &AccountId) -> Option<&ReputationRecord> {
        self.records.get(user)
    }

    pub fn score(&self, user: &AccountId) -> Option<u32> {
        self.records.get(user).map(|r| r.score)
    }

    pub fn tier(&self, user: &AccountId) -> Option<Tier> {
        self.records.get(user).map(|r| r.tier)
    }

    /// idempotent; returns true when a record was created
    pub fn ensure_initialized(
        &mut self,
        caller: &AccountId,
        user: &AccountId,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        ensure_owner(&self.owner, caller, "initialize reputation")?;
        if self.records.contains_key(user) {
            return Ok(false);
        }
        self.records
            .insert(user.clone(), ReputationRecord::new(self.config.initial_score, now));
        Ok(true)
    }

    /// bounded score move for an on-time (positive) or late repayment
    pub fn record_outcome(
        &mut self,
        caller: &AccountId,
        user: &AccountId,
        positive: bool,
        now: DateTime<Utc>,
        events: &mut EventStore,
    ) -> Result<u32> {
        ensure_owner(&self.owner, caller, "record repayment outcome")?;
        let config = self.config;
        let record = self.record_mut(user)?;

        let new_score = if positive {
            record.on_time_count += 1;
            (record.score + config.on_time_delta).min(MAX_SCORE)
        } else {
            record.late_count += 1;
            record.score.saturating_sub(config.late_delta)
        };

        apply_score(user, record, new_score, now, events);
        Ok(new_score)
    }

    /// penalize a default; large defaults count double
    pub fn record_default(
        &mut self,
        caller: &AccountId,
        user: &AccountId,
        debt: Money,
        now: DateTime<Utc>,
        events: &mut EventStore,
    ) -> Result<u32> {
        ensure_owner(&self.owner, caller, "record default")?;
        let config = self.config;
        let record = self.record_mut(user)?;

        let penalty = if debt > config.large_default_threshold {
            config.default_penalty.saturating_mul(2)
        } else {
            config.default_penalty
        };

        record.default_count += 1;
        record.total_defaulted += debt;
        let new_score = record.score.saturating_sub(penalty);

        events.emit(Event::DefaultRecorded {
            user: user.clone(),
            debt,
            penalty,
            timestamp: now,
        });
        apply_score(user, record, new_score, now, events);
        Ok(new_score)
    }

    fn record_mut(&mut self, user: &AccountId) -> Result<&mut ReputationRecord> {
        self.records.get_mut(user).ok_or_else(|| ProtocolError::NotFound {
            kind: "reputation record",
            owner: user.clone(),
        })
    }

    pub(crate) fn restore_record(&mut self, user: AccountId, previous: Option<ReputationRecord>) {
        match previous {
            Some(record) => {
                self.records.insert(user, record);
            }
            None => {
                self.records.remove(&user);
            }
        }
    }
}

fn apply_score(
    user: &AccountId,
    record: &mut ReputationRecord,
    new_score: u32,
    now: DateTime<Utc>,
    events: &mut EventStore,
) {
    let old_score = record.score;
    let old_tier = record.tier;
    record.score = new_score;
    record.tier = Tier::from_score(new_score);
    record.updated_at = now;

    if old_score != new_score {
        events.emit(Event::ScoreUpdated {
            user: user.clone(),
            old_score,
            new_score,
            timestamp: now,
        });
    }
    if old_tier != record.tier {
        events.emit(Event::TierChanged {
            user: user.clone(),
            old_tier,
            new_tier: record.tier,
            timestamp: now,
        });
    }
}
