//! SettlementEngine — converts a pool's final outcome into per-stake
//! payouts, exactly once, with conservation guarantees.
//!
//! All arithmetic is `Decimal`. The 2% protocol fee is taken off the top of
//! the whole pool; winner shares are floored to cents and the rounding
//! residual is assigned to the largest winning stake (earliest on ties), so
//! `sum(payouts) == reward_pool` holds as an exact equality whenever the
//! winning side is non-empty.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::engine::ledger::Ledger;
use crate::types::{EngineError, Outcome, PoolStatus, Position, StakeOutcome};

/// Decimal places of the settlement currency.
const PAYOUT_SCALE: u32 = 2;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Settlement configuration.
#[derive(Debug, Clone)]
pub struct SettlementConfig {
    /// Protocol fee taken from the whole pool before distribution.
    pub fee_rate: Decimal,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self { fee_rate: dec!(0.02) }
    }
}

// ---------------------------------------------------------------------------
// Settlement result
// ---------------------------------------------------------------------------

/// Per-stake payout line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakePayout {
    pub stake_id: String,
    pub staker: String,
    pub position: Position,
    pub amount: Decimal,
    pub payout: Decimal,
    pub outcome: StakeOutcome,
}

/// The full accounting of one settled pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementResult {
    pub pool_id: String,
    pub outcome: Outcome,
    pub total_staked: Decimal,
    pub protocol_fee: Decimal,
    /// `total_staked - protocol_fee`, the value available for distribution.
    pub reward_pool: Decimal,
    pub winning_total: Decimal,
    pub losing_total: Decimal,
    pub payouts: Vec<StakePayout>,
    /// Nobody backed the winning side — zero payouts were made.
    pub degenerate: bool,
}

impl SettlementResult {
    /// Sum of all payouts. Equals `reward_pool` unless degenerate.
    pub fn total_paid(&self) -> Decimal {
        self.payouts.iter().map(|p| p.payout).sum()
    }
}

// ---------------------------------------------------------------------------
// Settlement engine
// ---------------------------------------------------------------------------

pub struct SettlementEngine {
    config: SettlementConfig,
}

impl SettlementEngine {
    pub fn new(config: SettlementConfig) -> Self {
        Self { config }
    }

    /// The configured fee rate.
    pub fn fee_rate(&self) -> Decimal {
        self.config.fee_rate
    }

    /// Settle a pool against its final outcome.
    ///
    /// The already-settled guard, the payout computation, the stake
    /// annotations and the status flip all run inside the pool's mutation
    /// scope, so two concurrent resolution calls cannot both pass the guard.
    pub fn settle(
        &self,
        ledger: &Ledger,
        pool_id: &str,
        outcome: Outcome,
    ) -> Result<SettlementResult, EngineError> {
        let fee_rate = self.config.fee_rate;

        let result = ledger.with_pool_mut(pool_id, |record| {
            if record.pool.status == PoolStatus::Resolved {
                return Err(EngineError::AlreadySettled(pool_id.to_string()));
            }
            if record.pool.total_staked.is_zero() {
                return Err(EngineError::EmptyPool(pool_id.to_string()));
            }

            let winning_side = outcome.winning_side();
            let winning_total = record.pool.side_total(winning_side);
            let losing_total = record.pool.side_total(winning_side.opposite());
            let total_staked = record.pool.total_staked;

            let protocol_fee = (total_staked * fee_rate)
                .round_dp_with_strategy(PAYOUT_SCALE, RoundingStrategy::MidpointAwayFromZero);
            let reward_pool = total_staked - protocol_fee;

            let degenerate = winning_total.is_zero();
            let mut payouts = Vec::with_capacity(record.stakes.len());

            if degenerate {
                // Nobody backed the winning side. Zero payouts; the pool's
                // value goes to the protocol sink wholesale.
                for stake in record.stakes.iter_mut() {
                    stake.payout = Some(Decimal::ZERO);
                    stake.outcome = Some(StakeOutcome::Lost);
                    payouts.push(StakePayout {
                        stake_id: stake.id.clone(),
                        staker: stake.staker.clone(),
                        position: stake.position,
                        amount: stake.amount,
                        payout: Decimal::ZERO,
                        outcome: StakeOutcome::Lost,
                    });
                }
            } else {
                // The fee comes off the whole pool, so the distributable
                // surplus for winners is reward_pool - winning_total, not the
                // raw losing total.
                let surplus = reward_pool - winning_total;

                let mut paid = Decimal::ZERO;
                let mut largest: Option<(usize, Decimal)> = None;

                for stake in record.stakes.iter_mut() {
                    if stake.position == winning_side {
                        let share = (surplus * stake.amount / winning_total)
                            .round_dp_with_strategy(PAYOUT_SCALE, RoundingStrategy::ToZero);
                        let payout = stake.amount + share;
                        paid += payout;

                        match largest {
                            Some((_, max)) if stake.amount <= max => {}
                            _ => largest = Some((payouts.len(), stake.amount)),
                        }

                        stake.payout = Some(payout);
                        stake.outcome = Some(StakeOutcome::Won);
                        payouts.push(StakePayout {
                            stake_id: stake.id.clone(),
                            staker: stake.staker.clone(),
                            position: stake.position,
                            amount: stake.amount,
                            payout,
                            outcome: StakeOutcome::Won,
                        });
                    } else {
                        stake.payout = Some(Decimal::ZERO);
                        stake.outcome = Some(StakeOutcome::Lost);
                        payouts.push(StakePayout {
                            stake_id: stake.id.clone(),
                            staker: stake.staker.clone(),
                            position: stake.position,
                            amount: stake.amount,
                            payout: Decimal::ZERO,
                            outcome: StakeOutcome::Lost,
                        });
                    }
                }

                // Assign the rounding residual to the largest winning stake
                // so every unit of the reward pool is distributed.
                let residual = reward_pool - paid;
                if !residual.is_zero() {
                    if let Some((payout_idx, _)) = largest {
                        payouts[payout_idx].payout += residual;
                        let stake_id = payouts[payout_idx].stake_id.clone();
                        for stake in record.stakes.iter_mut() {
                            if stake.id == stake_id {
                                stake.payout = Some(payouts[payout_idx].payout);
                            }
                        }
                    }
                }
            }

            record.pool.status = PoolStatus::Resolved;
            record.pool.outcome = Some(outcome);

            Ok(SettlementResult {
                pool_id: pool_id.to_string(),
                outcome,
                total_staked,
                protocol_fee,
                reward_pool,
                winning_total,
                losing_total,
                payouts,
                degenerate,
            })
        })?;

        if result.degenerate {
            warn!(
                pool_id = %pool_id,
                outcome = %outcome,
                total_staked = %result.total_staked,
                "Degenerate resolution — nobody backed the winning side, zero payouts"
            );
        } else {
            info!(
                pool_id = %pool_id,
                outcome = %outcome,
                total_staked = %result.total_staked,
                fee = %result.protocol_fee,
                paid = %result.total_paid(),
                winners = result
                    .payouts
                    .iter()
                    .filter(|p| p.outcome == StakeOutcome::Won)
                    .count(),
                "Pool settled"
            );
        }

        Ok(result)
    }
}

impl Default for SettlementEngine {
    fn default() -> Self {
        Self::new(SettlementConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ledger::LedgerConfig;
    use crate::types::Stance;
    use chrono::Utc;

    fn setup() -> (Ledger, SettlementEngine) {
        (Ledger::default(), SettlementEngine::default())
    }

    /// Creator 100 agree, one 50 agree, one 150 disagree; resolved correct.
    /// Fee 6, reward pool 294, payouts 196 + 98.
    #[test]
    fn test_worked_example_correct() {
        let (ledger, engine) = setup();
        let pool = ledger
            .open_pool("news-1", "alice", Stance::Yes, dec!(100), Utc::now())
            .unwrap();
        ledger
            .record_stake(&pool.id, "bob", Position::Agree, dec!(50), Utc::now())
            .unwrap();
        ledger
            .record_stake(&pool.id, "carol", Position::Disagree, dec!(150), Utc::now())
            .unwrap();

        let result = engine.settle(&ledger, &pool.id, Outcome::Correct).unwrap();

        assert_eq!(result.total_staked, dec!(300));
        assert_eq!(result.protocol_fee, dec!(6));
        assert_eq!(result.reward_pool, dec!(294));
        assert_eq!(result.winning_total, dec!(150));
        assert_eq!(result.losing_total, dec!(150));
        assert!(!result.degenerate);

        let alice = result.payouts.iter().find(|p| p.staker == "alice").unwrap();
        let bob = result.payouts.iter().find(|p| p.staker == "bob").unwrap();
        let carol = result.payouts.iter().find(|p| p.staker == "carol").unwrap();

        assert_eq!(alice.payout, dec!(196));
        assert_eq!(alice.outcome, StakeOutcome::Won);
        assert_eq!(bob.payout, dec!(98));
        assert_eq!(bob.outcome, StakeOutcome::Won);
        assert_eq!(carol.payout, Decimal::ZERO);
        assert_eq!(carol.outcome, StakeOutcome::Lost);

        assert_eq!(result.total_paid(), result.reward_pool);
    }

    /// Lone disagree staker against the creator; resolved incorrect.
    /// The winner receives the entire reward pool.
    #[test]
    fn test_lone_disagree_winner_takes_reward_pool() {
        let (ledger, engine) = setup();
        let pool = ledger
            .open_pool("news-1", "alice", Stance::Yes, dec!(100), Utc::now())
            .unwrap();
        ledger
            .record_stake(&pool.id, "bob", Position::Disagree, dec!(10), Utc::now())
            .unwrap();

        let result = engine.settle(&ledger, &pool.id, Outcome::Incorrect).unwrap();

        assert_eq!(result.total_staked, dec!(110));
        assert_eq!(result.protocol_fee, dec!(2.20));
        assert_eq!(result.reward_pool, dec!(107.80));

        let alice = result.payouts.iter().find(|p| p.staker == "alice").unwrap();
        let bob = result.payouts.iter().find(|p| p.staker == "bob").unwrap();

        assert_eq!(alice.outcome, StakeOutcome::Lost);
        assert_eq!(alice.payout, Decimal::ZERO);
        assert_eq!(bob.outcome, StakeOutcome::Won);
        assert_eq!(bob.payout, dec!(107.80));
    }

    #[test]
    fn test_settle_twice_fails_and_preserves_first_result() {
        let (ledger, engine) = setup();
        let pool = ledger
            .open_pool("news-1", "alice", Stance::Yes, dec!(100), Utc::now())
            .unwrap();
        ledger
            .record_stake(&pool.id, "bob", Position::Disagree, dec!(50), Utc::now())
            .unwrap();

        let first = engine.settle(&ledger, &pool.id, Outcome::Correct).unwrap();
        let second = engine.settle(&ledger, &pool.id, Outcome::Incorrect);
        assert!(matches!(second, Err(EngineError::AlreadySettled(_))));

        // The first settlement's annotations are untouched.
        let stakes = ledger.stakes_for(&pool.id).unwrap();
        let alice = stakes.iter().find(|s| s.staker == "alice").unwrap();
        assert_eq!(alice.outcome, Some(StakeOutcome::Won));
        assert_eq!(alice.payout, Some(first.payouts[0].payout));

        let pool = ledger.pool(&pool.id).unwrap();
        assert_eq!(pool.outcome, Some(Outcome::Correct));
    }

    #[test]
    fn test_degenerate_resolution_zero_payouts() {
        let (ledger, engine) = setup();
        // Only the creator's agree stake; an incorrect outcome leaves the
        // winning (disagree) side empty.
        let pool = ledger
            .open_pool("news-1", "alice", Stance::Yes, dec!(100), Utc::now())
            .unwrap();

        let result = engine.settle(&ledger, &pool.id, Outcome::Incorrect).unwrap();

        assert!(result.degenerate);
        assert_eq!(result.winning_total, Decimal::ZERO);
        assert_eq!(result.total_paid(), Decimal::ZERO);
        assert_eq!(result.payouts.len(), 1);
        assert_eq!(result.payouts[0].outcome, StakeOutcome::Lost);

        // Degenerate settlement is still terminal.
        let pool = ledger.pool(&pool.id).unwrap();
        assert_eq!(pool.status, PoolStatus::Resolved);
    }

    #[test]
    fn test_equal_stakes_equal_payouts() {
        let (ledger, engine) = setup();
        let pool = ledger
            .open_pool("news-1", "alice", Stance::Yes, dec!(100), Utc::now())
            .unwrap();
        ledger
            .record_stake(&pool.id, "bob", Position::Agree, dec!(100), Utc::now())
            .unwrap();
        ledger
            .record_stake(&pool.id, "carol", Position::Disagree, dec!(100), Utc::now())
            .unwrap();

        let result = engine.settle(&ledger, &pool.id, Outcome::Correct).unwrap();

        let alice = result.payouts.iter().find(|p| p.staker == "alice").unwrap();
        let bob = result.payouts.iter().find(|p| p.staker == "bob").unwrap();
        assert_eq!(alice.payout, bob.payout);
        assert_eq!(result.total_paid(), result.reward_pool);
    }

    #[test]
    fn test_rounding_residual_goes_to_largest_stake() {
        let (ledger, engine) = setup();
        // Three equal agree stakes of 10 against a disagree 10.
        // surplus = 39.20 - 30 = 9.20; share = 3.0666… → floored to 3.06;
        // residual 0.02 goes to the earliest of the equal-largest stakes.
        let pool = ledger
            .open_pool("news-1", "alice", Stance::Yes, dec!(10), Utc::now())
            .unwrap();
        ledger
            .record_stake(&pool.id, "bob", Position::Agree, dec!(10), Utc::now())
            .unwrap();
        ledger
            .record_stake(&pool.id, "carol", Position::Agree, dec!(10), Utc::now())
            .unwrap();
        ledger
            .record_stake(&pool.id, "dave", Position::Disagree, dec!(10), Utc::now())
            .unwrap();

        let result = engine.settle(&ledger, &pool.id, Outcome::Correct).unwrap();

        assert_eq!(result.reward_pool, dec!(39.20));
        assert_eq!(result.total_paid(), dec!(39.20));

        let alice = result.payouts.iter().find(|p| p.staker == "alice").unwrap();
        let bob = result.payouts.iter().find(|p| p.staker == "bob").unwrap();
        let carol = result.payouts.iter().find(|p| p.staker == "carol").unwrap();
        assert_eq!(alice.payout, dec!(13.08));
        assert_eq!(bob.payout, dec!(13.06));
        assert_eq!(carol.payout, dec!(13.06));
    }

    #[test]
    fn test_conservation_with_uneven_stakes() {
        let (ledger, engine) = setup();
        let pool = ledger
            .open_pool("news-1", "alice", Stance::No, dec!(33.33), Utc::now())
            .unwrap();
        let stakes: &[(&str, Position, Decimal)] = &[
            ("bob", Position::Agree, dec!(17.77)),
            ("carol", Position::Agree, dec!(250.01)),
            ("dave", Position::Disagree, dec!(99.99)),
            ("erin", Position::Disagree, dec!(1)),
            ("frank", Position::Agree, dec!(5.55)),
        ];
        for (staker, position, amount) in stakes {
            ledger
                .record_stake(&pool.id, staker, *position, *amount, Utc::now())
                .unwrap();
        }

        let result = engine.settle(&ledger, &pool.id, Outcome::Correct).unwrap();

        // Every unit of the fee-adjusted pool is distributed to winners.
        assert_eq!(result.total_paid(), result.reward_pool);
        assert_eq!(result.reward_pool, result.total_staked - result.protocol_fee);

        for payout in &result.payouts {
            match payout.outcome {
                StakeOutcome::Won => assert!(payout.payout >= Decimal::ZERO),
                StakeOutcome::Lost => assert_eq!(payout.payout, Decimal::ZERO),
            }
        }
    }

    #[test]
    fn test_one_sided_pool_winners_pay_fee() {
        let (ledger, engine) = setup();
        // Everyone on the agree side; resolved correct. There is no losing
        // stake to distribute, so winners bear the fee pro rata.
        let pool = ledger
            .open_pool("news-1", "alice", Stance::Yes, dec!(100), Utc::now())
            .unwrap();
        ledger
            .record_stake(&pool.id, "bob", Position::Agree, dec!(100), Utc::now())
            .unwrap();

        let result = engine.settle(&ledger, &pool.id, Outcome::Correct).unwrap();

        assert!(!result.degenerate);
        assert_eq!(result.reward_pool, dec!(196));
        assert_eq!(result.total_paid(), dec!(196));
        let alice = result.payouts.iter().find(|p| p.staker == "alice").unwrap();
        assert_eq!(alice.payout, dec!(98));
    }

    #[test]
    fn test_stake_annotations_written_through() {
        let (ledger, engine) = setup();
        let pool = ledger
            .open_pool("news-1", "alice", Stance::Yes, dec!(100), Utc::now())
            .unwrap();
        ledger
            .record_stake(&pool.id, "bob", Position::Disagree, dec!(60), Utc::now())
            .unwrap();

        engine.settle(&ledger, &pool.id, Outcome::Incorrect).unwrap();

        let stakes = ledger.stakes_for(&pool.id).unwrap();
        for stake in &stakes {
            assert!(stake.payout.is_some());
            assert!(stake.outcome.is_some());
        }
        let bob = stakes.iter().find(|s| s.staker == "bob").unwrap();
        assert_eq!(bob.outcome, Some(StakeOutcome::Won));
        // 160 total, fee 3.20, reward 156.80 — the lone winner takes it all.
        assert_eq!(bob.payout, Some(dec!(156.80)));
    }

    #[test]
    fn test_custom_fee_rate() {
        let ledger = Ledger::new(LedgerConfig::default());
        let engine = SettlementEngine::new(SettlementConfig { fee_rate: dec!(0.05) });
        let pool = ledger
            .open_pool("news-1", "alice", Stance::Yes, dec!(100), Utc::now())
            .unwrap();
        ledger
            .record_stake(&pool.id, "bob", Position::Disagree, dec!(100), Utc::now())
            .unwrap();

        let result = engine.settle(&ledger, &pool.id, Outcome::Correct).unwrap();
        assert_eq!(result.protocol_fee, dec!(10));
        assert_eq!(result.reward_pool, dec!(190));
    }

    #[test]
    fn test_settle_unknown_pool() {
        let (ledger, engine) = setup();
        let result = engine.settle(&ledger, "missing", Outcome::Correct);
        assert!(matches!(result, Err(EngineError::PoolNotFound(_))));
    }
}
