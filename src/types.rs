//! Shared types for the VERITY engine.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that ledger, settlement,
//! and reputation modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// The stance a pool creator declares on a news item's claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stance {
    Yes,
    No,
}

impl Stance {
    /// The opposite stance.
    pub fn opposite(&self) -> Self {
        match self {
            Stance::Yes => Stance::No,
            Stance::No => Stance::Yes,
        }
    }
}

impl fmt::Display for Stance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stance::Yes => write!(f, "YES"),
            Stance::No => write!(f, "NO"),
        }
    }
}

/// The side a stake takes relative to the pool creator's claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    Agree,
    Disagree,
}

impl Position {
    /// The opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Position::Agree => Position::Disagree,
            Position::Disagree => Position::Agree,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Agree => write!(f, "AGREE"),
            Position::Disagree => write!(f, "DISAGREE"),
        }
    }
}

/// Final verdict on a pool creator's claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Correct,
    Incorrect,
}

impl Outcome {
    /// The side that wins under this outcome. The creator's own stake is
    /// always recorded on the `Agree` side, so `Correct` rewards `Agree`.
    pub fn winning_side(&self) -> Position {
        match self {
            Outcome::Correct => Position::Agree,
            Outcome::Incorrect => Position::Disagree,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Correct => write!(f, "CORRECT"),
            Outcome::Incorrect => write!(f, "INCORRECT"),
        }
    }
}

/// Per-stake classification once its pool has been settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StakeOutcome {
    Won,
    Lost,
}

impl fmt::Display for StakeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StakeOutcome::Won => write!(f, "WON"),
            StakeOutcome::Lost => write!(f, "LOST"),
        }
    }
}

/// News item lifecycle. The transition to `Resolved` is one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NewsStatus {
    Active,
    Resolved,
}

impl fmt::Display for NewsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NewsStatus::Active => write!(f, "active"),
            NewsStatus::Resolved => write!(f, "resolved"),
        }
    }
}

/// Pool lifecycle. The transition to `Resolved` is one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolStatus {
    Active,
    Resolved,
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolStatus::Active => write!(f, "active"),
            PoolStatus::Resolved => write!(f, "resolved"),
        }
    }
}

/// News category, used for reputation specialty tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NewsCategory {
    Politics,
    Economics,
    Technology,
    Sports,
    Science,
    Culture,
    Other,
}

impl NewsCategory {
    /// All known categories (useful for iteration).
    pub const ALL: &'static [NewsCategory] = &[
        NewsCategory::Politics,
        NewsCategory::Economics,
        NewsCategory::Technology,
        NewsCategory::Sports,
        NewsCategory::Science,
        NewsCategory::Culture,
        NewsCategory::Other,
    ];
}

impl fmt::Display for NewsCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NewsCategory::Politics => write!(f, "Politics"),
            NewsCategory::Economics => write!(f, "Economics"),
            NewsCategory::Technology => write!(f, "Technology"),
            NewsCategory::Sports => write!(f, "Sports"),
            NewsCategory::Science => write!(f, "Science"),
            NewsCategory::Culture => write!(f, "Culture"),
            NewsCategory::Other => write!(f, "Other"),
        }
    }
}

/// Attempt to parse a string into a NewsCategory (case-insensitive).
impl std::str::FromStr for NewsCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "politics" | "political" => Ok(NewsCategory::Politics),
            "economics" | "economic" | "econ" | "finance" => Ok(NewsCategory::Economics),
            "technology" | "tech" => Ok(NewsCategory::Technology),
            "sports" | "sport" => Ok(NewsCategory::Sports),
            "science" => Ok(NewsCategory::Science),
            "culture" | "cultural" | "entertainment" => Ok(NewsCategory::Culture),
            "other" => Ok(NewsCategory::Other),
            _ => Err(anyhow::anyhow!("Unknown news category: {s}")),
        }
    }
}

/// Reputation tier, always derived from accuracy — never stored on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    Novice,
    Analyst,
    Expert,
    Master,
    Legend,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Novice => write!(f, "Novice"),
            Tier::Analyst => write!(f, "Analyst"),
            Tier::Expert => write!(f, "Expert"),
            Tier::Master => write!(f, "Master"),
            Tier::Legend => write!(f, "Legend"),
        }
    }
}

// ---------------------------------------------------------------------------
// NewsItem
// ---------------------------------------------------------------------------

/// A predicted event that analysis pools attach to.
///
/// `total_staked` and `total_pools` are derived by the aggregator and
/// carry no authority of their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub resolution_criteria: String,
    pub category: NewsCategory,
    pub status: NewsStatus,
    pub ends_at: DateTime<Utc>,
    pub creator: String,
    /// Sum of `total_staked` across all attached pools (derived).
    pub total_staked: Decimal,
    /// Count of attached pools, regardless of status (derived).
    pub total_pools: u64,
    pub created_at: DateTime<Utc>,
}

impl NewsItem {
    /// Whether pools can still be opened against this item.
    pub fn is_active(&self) -> bool {
        self.status == NewsStatus::Active
    }
}

impl fmt::Display for NewsItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({} | pools: {} | staked: {} | {})",
            self.category, self.title, self.status, self.total_pools, self.total_staked, self.id,
        )
    }
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// An analyst's stated position on a news item, backed by their own stake.
///
/// Invariant: `total_staked == agree_stakes + disagree_stakes` at all times.
/// Immutable after resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pool {
    pub id: String,
    pub news_id: String,
    pub creator: String,
    /// The creator's declared stance on the news item's claim.
    pub stance: Stance,
    /// The creator's opening stake, recorded as an `Agree` stake.
    pub initial_stake: Decimal,
    pub agree_stakes: Decimal,
    pub disagree_stakes: Decimal,
    pub total_staked: Decimal,
    pub status: PoolStatus,
    pub outcome: Option<Outcome>,
    pub created_at: DateTime<Utc>,
}

impl Pool {
    /// Whether the pool still accepts stakes.
    pub fn is_active(&self) -> bool {
        self.status == PoolStatus::Active
    }

    /// Running total for one side.
    pub fn side_total(&self, position: Position) -> Decimal {
        match position {
            Position::Agree => self.agree_stakes,
            Position::Disagree => self.disagree_stakes,
        }
    }

    /// The running-totals invariant. Checked after every mutation.
    pub fn totals_consistent(&self) -> bool {
        self.total_staked == self.agree_stakes + self.disagree_stakes
    }
}

impl fmt::Display for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} by {} (agree: {} | disagree: {} | {})",
            self.id, self.stance, self.creator, self.agree_stakes, self.disagree_stakes, self.status,
        )
    }
}

// ---------------------------------------------------------------------------
// PoolStake
// ---------------------------------------------------------------------------

/// One user's stake on one side of a pool.
///
/// Append-only: immutable after creation except for the one-time payout
/// annotation at settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStake {
    pub id: String,
    pub pool_id: String,
    pub staker: String,
    pub position: Position,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
    /// Set once, at settlement.
    pub payout: Option<Decimal>,
    /// Set once, at settlement.
    pub outcome: Option<StakeOutcome>,
}

impl fmt::Display for PoolStake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} on {}", self.staker, self.position, self.amount, self.pool_id)?;
        if let Some(outcome) = self.outcome {
            write!(f, " [{outcome}]")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ReputationRecord
// ---------------------------------------------------------------------------

/// Per-user reputation rollup, mutated only by the reputation tracker.
///
/// Invariant: `correct_pools + wrong_pools == total_pools` — pools still
/// active are excluded from the denominator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationRecord {
    pub user: String,
    pub total_pools: u32,
    pub correct_pools: u32,
    pub wrong_pools: u32,
    /// Consecutive correct resolutions, most recent first.
    pub current_streak: u32,
    pub best_streak: u32,
    /// Categories with at least one authored resolved pool.
    pub specialties: BTreeSet<NewsCategory>,
    pub member_since: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl ReputationRecord {
    /// A fresh record for a user first seen at `now`.
    pub fn new(user: &str, now: DateTime<Utc>) -> Self {
        Self {
            user: user.to_string(),
            total_pools: 0,
            correct_pools: 0,
            wrong_pools: 0,
            current_streak: 0,
            best_streak: 0,
            specialties: BTreeSet::new(),
            member_since: now,
            last_active: now,
        }
    }

    /// Accuracy percentage 0–100, rounded half-up. 0 with no resolved pools.
    pub fn accuracy(&self) -> u8 {
        if self.total_pools == 0 {
            return 0;
        }
        // Integer half-up rounding: (200c + t) / 2t.
        let pct = (200 * self.correct_pools as u64 + self.total_pools as u64)
            / (2 * self.total_pools as u64);
        pct as u8
    }

    /// The counters invariant.
    pub fn counts_consistent(&self) -> bool {
        self.correct_pools + self.wrong_pools == self.total_pools
    }
}

impl fmt::Display for ReputationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}% over {} pools (W{}/L{} | streak {} best {})",
            self.user,
            self.accuracy(),
            self.total_pools,
            self.correct_pools,
            self.wrong_pools,
            self.current_streak,
            self.best_streak,
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for the VERITY engine.
///
/// Every rejected operation propagates one of these; nothing is swallowed.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid stake amount {amount}: minimum is {min}")]
    InvalidAmount { amount: Decimal, min: Decimal },

    #[error("Pool is closed to new stakes: {0}")]
    PoolClosed(String),

    #[error("Pool already settled: {0}")]
    AlreadySettled(String),

    #[error("Pool has no stake on either side: {0}")]
    EmptyPool(String),

    #[error("Pool not found: {0}")]
    PoolNotFound(String),

    #[error("News item not found: {0}")]
    NewsNotFound(String),

    #[error("News item is resolved, no new pools accepted: {0}")]
    NewsClosed(String),
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

impl NewsItem {
    /// Helper to build a test/sample news item with sensible defaults.
    #[cfg(test)]
    pub fn sample() -> Self {
        NewsItem {
            id: "news-001".to_string(),
            title: "Will the central bank cut rates in March?".to_string(),
            description: "Resolves YES if the target rate is lowered at the March meeting."
                .to_string(),
            resolution_criteria: "Official announcement following the March meeting".to_string(),
            category: NewsCategory::Economics,
            status: NewsStatus::Active,
            ends_at: Utc::now() + chrono::Duration::days(30),
            creator: "alice".to_string(),
            total_staked: Decimal::ZERO,
            total_pools: 0,
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
