//! Ledger — stake intake and per-pool running totals.
//!
//! Pure bookkeeping, no payout logic. Each pool entry sits behind its own
//! mutex so that stake recording and settlement on the same pool are
//! serialized while different pools proceed fully in parallel.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::types::{EngineError, Pool, PoolStake, Position, PoolStatus, Stance};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Ledger configuration.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Minimum accepted stake, in units of the settlement currency.
    pub min_stake: Decimal,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self { min_stake: dec!(1) }
    }
}

// ---------------------------------------------------------------------------
// Pool entry
// ---------------------------------------------------------------------------

/// A pool together with its stakes, guarded as a single mutation scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolRecord {
    pub pool: Pool,
    /// All stakes in stake-creation order.
    pub stakes: Vec<PoolStake>,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// In-memory record of stakes per pool.
pub struct Ledger {
    config: LedgerConfig,
    pools: RwLock<HashMap<String, Arc<Mutex<PoolRecord>>>>,
}

impl Ledger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            pools: RwLock::new(HashMap::new()),
        }
    }

    /// The configured minimum stake.
    pub fn min_stake(&self) -> Decimal {
        self.config.min_stake
    }

    /// Open a new pool with the creator's opening stake recorded on the
    /// `Agree` side. Fails with `InvalidAmount` below the minimum stake.
    pub fn open_pool(
        &self,
        news_id: &str,
        creator: &str,
        stance: Stance,
        initial_stake: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Pool, EngineError> {
        if initial_stake < self.config.min_stake {
            return Err(EngineError::InvalidAmount {
                amount: initial_stake,
                min: self.config.min_stake,
            });
        }

        let pool_id = Uuid::new_v4().to_string();
        let pool = Pool {
            id: pool_id.clone(),
            news_id: news_id.to_string(),
            creator: creator.to_string(),
            stance,
            initial_stake,
            agree_stakes: initial_stake,
            disagree_stakes: Decimal::ZERO,
            total_staked: initial_stake,
            status: PoolStatus::Active,
            outcome: None,
            created_at: now,
        };

        let creator_stake = PoolStake {
            id: Uuid::new_v4().to_string(),
            pool_id: pool_id.clone(),
            staker: creator.to_string(),
            position: Position::Agree,
            amount: initial_stake,
            created_at: now,
            payout: None,
            outcome: None,
        };

        let record = PoolRecord {
            pool: pool.clone(),
            stakes: vec![creator_stake],
        };

        self.pools
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pool_id.clone(), Arc::new(Mutex::new(record)));

        info!(
            pool_id = %pool_id,
            news_id = %news_id,
            creator = %creator,
            stance = %stance,
            stake = %initial_stake,
            "Pool opened"
        );

        Ok(pool)
    }

    /// Accept a stake into a pool, atomically updating the side total and
    /// `total_staked` within the pool's mutation scope.
    pub fn record_stake(
        &self,
        pool_id: &str,
        staker: &str,
        position: Position,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<PoolStake, EngineError> {
        if amount < self.config.min_stake {
            return Err(EngineError::InvalidAmount {
                amount,
                min: self.config.min_stake,
            });
        }

        let entry = self.entry(pool_id)?;
        let mut record = entry.lock().unwrap_or_else(PoisonError::into_inner);

        if !record.pool.is_active() {
            return Err(EngineError::PoolClosed(pool_id.to_string()));
        }

        let stake = PoolStake {
            id: Uuid::new_v4().to_string(),
            pool_id: pool_id.to_string(),
            staker: staker.to_string(),
            position,
            amount,
            created_at: now,
            payout: None,
            outcome: None,
        };

        match position {
            Position::Agree => record.pool.agree_stakes += amount,
            Position::Disagree => record.pool.disagree_stakes += amount,
        }
        record.pool.total_staked += amount;
        debug_assert!(record.pool.totals_consistent());

        record.stakes.push(stake.clone());

        debug!(
            pool_id = %pool_id,
            staker = %staker,
            position = %position,
            amount = %amount,
            total = %record.pool.total_staked,
            "Stake recorded"
        );

        Ok(stake)
    }

    /// All stakes for a pool, in stake-creation order.
    pub fn stakes_for(&self, pool_id: &str) -> Result<Vec<PoolStake>, EngineError> {
        let entry = self.entry(pool_id)?;
        let record = entry.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(record.stakes.clone())
    }

    /// A point-in-time copy of one pool.
    pub fn pool(&self, pool_id: &str) -> Result<Pool, EngineError> {
        let entry = self.entry(pool_id)?;
        let record = entry.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(record.pool.clone())
    }

    /// Point-in-time copies of all pools.
    pub fn pools(&self) -> Vec<Pool> {
        let map = self.pools.read().unwrap_or_else(PoisonError::into_inner);
        map.values()
            .map(|e| e.lock().unwrap_or_else(PoisonError::into_inner).pool.clone())
            .collect()
    }

    /// All pools attached to one news item, oldest first.
    pub fn pools_for_news(&self, news_id: &str) -> Vec<Pool> {
        let mut pools: Vec<Pool> = self
            .pools()
            .into_iter()
            .filter(|p| p.news_id == news_id)
            .collect();
        pools.sort_by_key(|p| p.created_at);
        pools
    }

    /// Run `f` inside the pool's mutation scope. Settlement uses this so the
    /// already-settled guard, payout computation and status flip share one
    /// critical section.
    pub(crate) fn with_pool_mut<T>(
        &self,
        pool_id: &str,
        f: impl FnOnce(&mut PoolRecord) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let entry = self.entry(pool_id)?;
        let mut record = entry.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut record)
    }

    /// Serializable copy of the whole ledger, pools sorted by creation time.
    pub fn snapshot(&self) -> Vec<PoolRecord> {
        let map = self.pools.read().unwrap_or_else(PoisonError::into_inner);
        let mut records: Vec<PoolRecord> = map
            .values()
            .map(|e| e.lock().unwrap_or_else(PoisonError::into_inner).clone())
            .collect();
        records.sort_by_key(|r| r.pool.created_at);
        records
    }

    /// Replace the ledger contents with a previously saved snapshot.
    pub fn restore(&self, records: Vec<PoolRecord>) {
        let mut map = self.pools.write().unwrap_or_else(PoisonError::into_inner);
        map.clear();
        for record in records {
            map.insert(record.pool.id.clone(), Arc::new(Mutex::new(record)));
        }
    }

    fn entry(&self, pool_id: &str) -> Result<Arc<Mutex<PoolRecord>>, EngineError> {
        self.pools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(pool_id)
            .cloned()
            .ok_or_else(|| EngineError::PoolNotFound(pool_id.to_string()))
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> Ledger {
        Ledger::default()
    }

    fn open(ledger: &Ledger) -> Pool {
        ledger
            .open_pool("news-1", "alice", Stance::Yes, dec!(100), Utc::now())
            .unwrap()
    }

    #[test]
    fn test_open_pool_records_creator_stake() {
        let ledger = ledger();
        let pool = open(&ledger);

        assert_eq!(pool.agree_stakes, dec!(100));
        assert_eq!(pool.disagree_stakes, Decimal::ZERO);
        assert_eq!(pool.total_staked, dec!(100));
        assert!(pool.totals_consistent());

        let stakes = ledger.stakes_for(&pool.id).unwrap();
        assert_eq!(stakes.len(), 1);
        assert_eq!(stakes[0].staker, "alice");
        assert_eq!(stakes[0].position, Position::Agree);
    }

    #[test]
    fn test_open_pool_below_minimum() {
        let ledger = ledger();
        let result = ledger.open_pool("news-1", "alice", Stance::Yes, dec!(0.5), Utc::now());
        assert!(matches!(result, Err(EngineError::InvalidAmount { .. })));
    }

    #[test]
    fn test_record_stake_updates_totals() {
        let ledger = ledger();
        let pool = open(&ledger);

        ledger
            .record_stake(&pool.id, "bob", Position::Agree, dec!(50), Utc::now())
            .unwrap();
        ledger
            .record_stake(&pool.id, "carol", Position::Disagree, dec!(150), Utc::now())
            .unwrap();

        let pool = ledger.pool(&pool.id).unwrap();
        assert_eq!(pool.agree_stakes, dec!(150));
        assert_eq!(pool.disagree_stakes, dec!(150));
        assert_eq!(pool.total_staked, dec!(300));
        assert!(pool.totals_consistent());
    }

    #[test]
    fn test_record_stake_zero_amount() {
        let ledger = ledger();
        let pool = open(&ledger);
        let result = ledger.record_stake(&pool.id, "bob", Position::Agree, dec!(0), Utc::now());
        assert!(matches!(result, Err(EngineError::InvalidAmount { .. })));
    }

    #[test]
    fn test_record_stake_negative_amount() {
        let ledger = ledger();
        let pool = open(&ledger);
        let result = ledger.record_stake(&pool.id, "bob", Position::Agree, dec!(-5), Utc::now());
        assert!(matches!(result, Err(EngineError::InvalidAmount { .. })));
    }

    #[test]
    fn test_record_stake_below_minimum() {
        let ledger = Ledger::new(LedgerConfig { min_stake: dec!(5) });
        let pool = ledger
            .open_pool("news-1", "alice", Stance::Yes, dec!(10), Utc::now())
            .unwrap();
        let result = ledger.record_stake(&pool.id, "bob", Position::Agree, dec!(4.99), Utc::now());
        assert!(matches!(result, Err(EngineError::InvalidAmount { .. })));
    }

    #[test]
    fn test_record_stake_unknown_pool() {
        let ledger = ledger();
        let result = ledger.record_stake("missing", "bob", Position::Agree, dec!(10), Utc::now());
        assert!(matches!(result, Err(EngineError::PoolNotFound(_))));
    }

    #[test]
    fn test_record_stake_closed_pool() {
        let ledger = ledger();
        let pool = open(&ledger);

        ledger
            .with_pool_mut(&pool.id, |record| {
                record.pool.status = PoolStatus::Resolved;
                Ok(())
            })
            .unwrap();

        let result = ledger.record_stake(&pool.id, "bob", Position::Agree, dec!(10), Utc::now());
        assert!(matches!(result, Err(EngineError::PoolClosed(_))));
    }

    #[test]
    fn test_stakes_preserve_creation_order() {
        let ledger = ledger();
        let pool = open(&ledger);

        for (i, name) in ["bob", "carol", "dave"].iter().enumerate() {
            ledger
                .record_stake(
                    &pool.id,
                    name,
                    if i % 2 == 0 { Position::Agree } else { Position::Disagree },
                    dec!(10),
                    Utc::now(),
                )
                .unwrap();
        }

        let stakes = ledger.stakes_for(&pool.id).unwrap();
        let stakers: Vec<&str> = stakes.iter().map(|s| s.staker.as_str()).collect();
        assert_eq!(stakers, vec!["alice", "bob", "carol", "dave"]);
    }

    #[test]
    fn test_pools_for_news_filters_and_sorts() {
        let ledger = ledger();
        let p1 = ledger
            .open_pool("news-1", "alice", Stance::Yes, dec!(10), Utc::now())
            .unwrap();
        let p2 = ledger
            .open_pool(
                "news-1",
                "bob",
                Stance::No,
                dec!(20),
                Utc::now() + chrono::Duration::seconds(1),
            )
            .unwrap();
        ledger
            .open_pool("news-2", "carol", Stance::Yes, dec!(30), Utc::now())
            .unwrap();

        let pools = ledger.pools_for_news("news-1");
        assert_eq!(pools.len(), 2);
        assert_eq!(pools[0].id, p1.id);
        assert_eq!(pools[1].id, p2.id);
    }

    #[test]
    fn test_snapshot_restore_roundtrip() {
        let ledger = ledger();
        let pool = open(&ledger);
        ledger
            .record_stake(&pool.id, "bob", Position::Disagree, dec!(25), Utc::now())
            .unwrap();

        let snapshot = ledger.snapshot();
        assert_eq!(snapshot.len(), 1);

        let restored = Ledger::default();
        restored.restore(snapshot);

        let copy = restored.pool(&pool.id).unwrap();
        assert_eq!(copy.total_staked, dec!(125));
        assert_eq!(restored.stakes_for(&pool.id).unwrap().len(), 2);
    }

    #[test]
    fn test_concurrent_stakes_one_pool() {
        use std::sync::Arc as StdArc;

        let ledger = StdArc::new(ledger());
        let pool = ledger
            .open_pool("news-1", "alice", Stance::Yes, dec!(100), Utc::now())
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let ledger = StdArc::clone(&ledger);
            let pool_id = pool.id.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..25 {
                    let position = if i % 2 == 0 { Position::Agree } else { Position::Disagree };
                    ledger
                        .record_stake(&pool_id, &format!("user-{i}"), position, dec!(2), Utc::now())
                        .unwrap();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        let pool = ledger.pool(&pool.id).unwrap();
        // 100 creator + 8 threads * 25 stakes * 2
        assert_eq!(pool.total_staked, dec!(500));
        assert!(pool.totals_consistent());
        assert_eq!(ledger.stakes_for(&pool.id).unwrap().len(), 201);
    }
}
