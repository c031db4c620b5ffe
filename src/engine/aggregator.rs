//! NewsAggregator — keeps NewsItem-level totals consistent with its pools.
//!
//! Recomputed on demand from ledger state; correctness over performance,
//! since cardinalities are small. Also home to the NewsIndex, the owning
//! registry of news items.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::types::{EngineError, NewsCategory, NewsItem, NewsStatus, Pool};

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

pub struct NewsAggregator;

impl NewsAggregator {
    /// Derive item totals from the pools referencing it, regardless of pool
    /// status. Pure; overwrites the derived fields wholesale.
    pub fn recompute(item: &mut NewsItem, pools: &[Pool]) {
        item.total_staked = pools.iter().map(|p| p.total_staked).sum();
        item.total_pools = pools.len() as u64;
    }
}

// ---------------------------------------------------------------------------
// News index
// ---------------------------------------------------------------------------

/// Owns every NewsItem. Items are never deleted; resolution is one-way.
pub struct NewsIndex {
    items: RwLock<HashMap<String, NewsItem>>,
}

impl NewsIndex {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new predicted event.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        &self,
        title: &str,
        description: &str,
        resolution_criteria: &str,
        category: NewsCategory,
        ends_at: DateTime<Utc>,
        creator: &str,
        now: DateTime<Utc>,
    ) -> NewsItem {
        let item = NewsItem {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            description: description.to_string(),
            resolution_criteria: resolution_criteria.to_string(),
            category,
            status: NewsStatus::Active,
            ends_at,
            creator: creator.to_string(),
            total_staked: Decimal::ZERO,
            total_pools: 0,
            created_at: now,
        };

        self.items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(item.id.clone(), item.clone());

        info!(news_id = %item.id, title = %title, category = %category, "News item created");
        item
    }

    /// One item by id.
    pub fn get(&self, id: &str) -> Result<NewsItem, EngineError> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::NewsNotFound(id.to_string()))
    }

    /// All items, newest first.
    pub fn list(&self) -> Vec<NewsItem> {
        let map = self.items.read().unwrap_or_else(PoisonError::into_inner);
        let mut items: Vec<NewsItem> = map.values().cloned().collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items
    }

    /// Recompute an item's derived totals from the given pools.
    pub fn recompute(&self, id: &str, pools: &[Pool]) -> Result<NewsItem, EngineError> {
        let mut map = self.items.write().unwrap_or_else(PoisonError::into_inner);
        let item = map
            .get_mut(id)
            .ok_or_else(|| EngineError::NewsNotFound(id.to_string()))?;
        NewsAggregator::recompute(item, pools);
        debug!(
            news_id = %id,
            total_staked = %item.total_staked,
            total_pools = item.total_pools,
            "News totals recomputed"
        );
        Ok(item.clone())
    }

    /// Flip an item to Resolved. One-way; already-resolved items are left
    /// unchanged.
    pub fn mark_resolved(&self, id: &str) -> Result<NewsItem, EngineError> {
        let mut map = self.items.write().unwrap_or_else(PoisonError::into_inner);
        let item = map
            .get_mut(id)
            .ok_or_else(|| EngineError::NewsNotFound(id.to_string()))?;
        if item.status != NewsStatus::Resolved {
            item.status = NewsStatus::Resolved;
            info!(news_id = %id, "News item resolved");
        }
        Ok(item.clone())
    }

    /// Serializable copy of all items, oldest first.
    pub fn snapshot(&self) -> Vec<NewsItem> {
        let map = self.items.read().unwrap_or_else(PoisonError::into_inner);
        let mut items: Vec<NewsItem> = map.values().cloned().collect();
        items.sort_by_key(|i| i.created_at);
        items
    }

    /// Replace all items with a previously saved snapshot.
    pub fn restore(&self, items: Vec<NewsItem>) {
        let mut map = self.items.write().unwrap_or_else(PoisonError::into_inner);
        map.clear();
        for item in items {
            map.insert(item.id.clone(), item);
        }
    }
}

impl Default for NewsIndex {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
