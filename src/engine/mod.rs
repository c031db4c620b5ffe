//! Core engine — stake intake → settlement → reputation → aggregation.
//!
//! The `Engine` facade wires the four components together behind the
//! operations the intake, resolution, and read surfaces call. Components
//! never reach into each other's state directly.

pub mod aggregator;
pub mod ledger;
pub mod reputation;
pub mod settlement;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::{
    EngineError, NewsCategory, NewsItem, Outcome, Pool, PoolStake, Position, ReputationRecord,
    Stance,
};
use aggregator::NewsIndex;
use ledger::{Ledger, LedgerConfig, PoolRecord};
use reputation::ReputationTracker;
use settlement::{SettlementConfig, SettlementEngine, SettlementResult};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Engine tuning knobs, usually loaded from `config.toml`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Minimum accepted stake (applies to opening stakes too).
    pub min_stake: Decimal,
    /// Protocol fee taken from the whole pool at settlement.
    pub fee_rate: Decimal,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_stake: dec!(1),
            fee_rate: dec!(0.02),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Serializable copy of all engine state, for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub news: Vec<NewsItem>,
    pub pools: Vec<PoolRecord>,
    pub reputation: Vec<ReputationRecord>,
}

/// A pool together with its stakes, for the read surface.
#[derive(Debug, Clone, Serialize)]
pub struct PoolView {
    pub pool: Pool,
    pub stakes: Vec<PoolStake>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct Engine {
    ledger: Ledger,
    settlement: SettlementEngine,
    reputation: ReputationTracker,
    news: NewsIndex,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            ledger: Ledger::new(LedgerConfig {
                min_stake: config.min_stake,
            }),
            settlement: SettlementEngine::new(SettlementConfig {
                fee_rate: config.fee_rate,
            }),
            reputation: ReputationTracker::new(),
            news: NewsIndex::new(),
        }
    }

    // -- Intake surface ---------------------------------------------------

    /// Register a new predicted event.
    pub fn create_news(
        &self,
        title: &str,
        description: &str,
        resolution_criteria: &str,
        category: NewsCategory,
        ends_at: DateTime<Utc>,
        creator: &str,
    ) -> NewsItem {
        self.news
            .create(title, description, resolution_criteria, category, ends_at, creator, Utc::now())
    }

    /// Open an analysis pool against an active news item. The creator's
    /// opening stake lands on the `Agree` side.
    pub fn open_pool(
        &self,
        news_id: &str,
        creator: &str,
        stance: Stance,
        initial_stake: Decimal,
    ) -> Result<Pool, EngineError> {
        let item = self.news.get(news_id)?;
        if !item.is_active() {
            return Err(EngineError::NewsClosed(news_id.to_string()));
        }

        let pool = self
            .ledger
            .open_pool(news_id, creator, stance, initial_stake, Utc::now())?;
        self.recompute_news(news_id)?;
        Ok(pool)
    }

    /// Accept a stake on one side of a pool.
    pub fn place_stake(
        &self,
        pool_id: &str,
        staker: &str,
        position: Position,
        amount: Decimal,
    ) -> Result<PoolStake, EngineError> {
        let stake = self
            .ledger
            .record_stake(pool_id, staker, position, amount, Utc::now())?;
        let pool = self.ledger.pool(pool_id)?;
        self.recompute_news(&pool.news_id)?;
        Ok(stake)
    }

    // -- Resolution surface -----------------------------------------------

    /// Settle one pool against its final outcome, then apply the author's
    /// reputation update and refresh the item totals.
    ///
    /// Authorization is the caller's responsibility, not the engine's.
    pub fn settle_pool(
        &self,
        pool_id: &str,
        outcome: Outcome,
    ) -> Result<SettlementResult, EngineError> {
        // Resolve the author and category up front so a dangling news id
        // fails before any settlement state is written.
        let pool = self.ledger.pool(pool_id)?;
        let item = self.news.get(&pool.news_id)?;

        let result = self.settlement.settle(&self.ledger, pool_id, outcome)?;

        self.reputation
            .on_pool_resolved(&pool.creator, item.category, outcome, Utc::now());
        self.recompute_news(&pool.news_id)?;

        Ok(result)
    }

    /// Resolve a news item with a final verdict: every still-active pool is
    /// settled (Correct iff its stance matches the verdict) and the item is
    /// flipped to Resolved. Pools settled earlier are left untouched.
    pub fn resolve_news(
        &self,
        news_id: &str,
        verdict: Stance,
    ) -> Result<Vec<SettlementResult>, EngineError> {
        // Existence check up front so an unknown id fails before any
        // settlement work.
        self.news.get(news_id)?;

        let mut results = Vec::new();
        for pool in self.ledger.pools_for_news(news_id) {
            if !pool.is_active() {
                continue;
            }
            let outcome = if pool.stance == verdict {
                Outcome::Correct
            } else {
                Outcome::Incorrect
            };
            match self.settle_pool(&pool.id, outcome) {
                Ok(result) => results.push(result),
                // A racing resolver got there first; the pool-level guard
                // makes this a skip, not a failure.
                Err(EngineError::AlreadySettled(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        self.news.mark_resolved(news_id)?;

        info!(
            news_id = %news_id,
            verdict = %verdict,
            pools_settled = results.len(),
            "News item resolved"
        );

        Ok(results)
    }

    // -- Read surface -----------------------------------------------------

    pub fn news_item(&self, news_id: &str) -> Result<NewsItem, EngineError> {
        self.news.get(news_id)
    }

    pub fn list_news(&self) -> Vec<NewsItem> {
        self.news.list()
    }

    pub fn pools_for_news(&self, news_id: &str) -> Vec<Pool> {
        self.ledger.pools_for_news(news_id)
    }

    pub fn pool_view(&self, pool_id: &str) -> Result<PoolView, EngineError> {
        Ok(PoolView {
            pool: self.ledger.pool(pool_id)?,
            stakes: self.ledger.stakes_for(pool_id)?,
        })
    }

    pub fn reputation(&self, user: &str) -> Option<ReputationRecord> {
        self.reputation.record(user)
    }

    pub fn leaderboard(&self) -> Vec<ReputationRecord> {
        self.reputation.leaderboard()
    }

    // -- Persistence ------------------------------------------------------

    /// A serializable copy of all engine state.
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            news: self.news.snapshot(),
            pools: self.ledger.snapshot(),
            reputation: self.reputation.snapshot(),
        }
    }

    /// Replace all engine state with a previously saved snapshot.
    pub fn restore(&self, snapshot: EngineSnapshot) {
        self.news.restore(snapshot.news);
        self.ledger.restore(snapshot.pools);
        self.reputation.restore(snapshot.reputation);
    }

    fn recompute_news(&self, news_id: &str) -> Result<(), EngineError> {
        let pools = self.ledger.pools_for_news(news_id);
        self.news.recompute(news_id, &pools)?;
        Ok(())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
