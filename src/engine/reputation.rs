//! ReputationTracker — accuracy, tier, streaks, and specialty per user.
//!
//! Fed exclusively by settlement events for pools the user authored.
//! Records live behind per-user locks; updates for one user apply in the
//! order their pools resolve, while different users update independently.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::debug;

use crate::types::{NewsCategory, Outcome, ReputationRecord, Tier};

// ---------------------------------------------------------------------------
// Tier bands
// ---------------------------------------------------------------------------

/// Map an accuracy percentage to its tier.
///
/// Bands are inclusive on the lower bound, exclusive on the upper, except
/// the top band which is inclusive on both ends:
/// Novice [0,50), Analyst [50,70), Expert [70,85), Master [85,95),
/// Legend [95,100].
pub fn tier_for(accuracy: u8) -> Tier {
    match accuracy {
        0..=49 => Tier::Novice,
        50..=69 => Tier::Analyst,
        70..=84 => Tier::Expert,
        85..=94 => Tier::Master,
        _ => Tier::Legend,
    }
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// Owns every ReputationRecord; nothing else mutates them.
pub struct ReputationTracker {
    records: RwLock<HashMap<String, Arc<Mutex<ReputationRecord>>>>,
}

impl ReputationTracker {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Apply one resolution event for a pool the user authored.
    ///
    /// Creates the record on first touch (`member_since = now`). Returns a
    /// copy of the updated record.
    pub fn on_pool_resolved(
        &self,
        author: &str,
        category: NewsCategory,
        outcome: Outcome,
        now: DateTime<Utc>,
    ) -> ReputationRecord {
        let entry = {
            let mut map = self.records.write().unwrap_or_else(PoisonError::into_inner);
            map.entry(author.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(ReputationRecord::new(author, now))))
                .clone()
        };

        let mut record = entry.lock().unwrap_or_else(PoisonError::into_inner);

        record.total_pools += 1;
        match outcome {
            Outcome::Correct => {
                record.correct_pools += 1;
                record.current_streak += 1;
                record.best_streak = record.best_streak.max(record.current_streak);
            }
            Outcome::Incorrect => {
                record.wrong_pools += 1;
                record.current_streak = 0;
            }
        }
        record.specialties.insert(category);
        record.last_active = now;
        debug_assert!(record.counts_consistent());

        debug!(
            user = %author,
            outcome = %outcome,
            accuracy = record.accuracy(),
            tier = %tier_for(record.accuracy()),
            streak = record.current_streak,
            "Reputation updated"
        );

        record.clone()
    }

    /// One user's record, if they have any history.
    pub fn record(&self, user: &str) -> Option<ReputationRecord> {
        let map = self.records.read().unwrap_or_else(PoisonError::into_inner);
        map.get(user)
            .map(|e| e.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    /// All records, sorted by accuracy then volume (best first).
    pub fn leaderboard(&self) -> Vec<ReputationRecord> {
        let map = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let mut records: Vec<ReputationRecord> = map
            .values()
            .map(|e| e.lock().unwrap_or_else(PoisonError::into_inner).clone())
            .collect();
        records.sort_by(|a, b| {
            b.accuracy()
                .cmp(&a.accuracy())
                .then(b.total_pools.cmp(&a.total_pools))
                .then(a.user.cmp(&b.user))
        });
        records
    }

    /// Serializable copy of all records, sorted by user for stable output.
    pub fn snapshot(&self) -> Vec<ReputationRecord> {
        let map = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let mut records: Vec<ReputationRecord> = map
            .values()
            .map(|e| e.lock().unwrap_or_else(PoisonError::into_inner).clone())
            .collect();
        records.sort_by(|a, b| a.user.cmp(&b.user));
        records
    }

    /// Replace all records with a previously saved snapshot.
    pub fn restore(&self, records: Vec<ReputationRecord>) {
        let mut map = self.records.write().unwrap_or_else(PoisonError::into_inner);
        map.clear();
        for record in records {
            map.insert(record.user.clone(), Arc::new(Mutex::new(record)));
        }
    }
}

impl Default for ReputationTracker {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
