//! Persistence layer.
//!
//! Saves and loads the engine snapshot to/from a JSON file.
//! JSON is sufficient for the state volumes involved; a database can be
//! swapped in behind the same three functions if history queries are ever
//! needed.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};

use crate::engine::EngineSnapshot;

/// Default state file path.
const DEFAULT_STATE_FILE: &str = "verity_state.json";

/// Save the engine snapshot to a JSON file.
pub fn save_state(snapshot: &EngineSnapshot, path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);
    let json = serde_json::to_string_pretty(snapshot)
        .context("Failed to serialise engine snapshot")?;

    std::fs::write(path, &json)
        .context(format!("Failed to write state to {path}"))?;

    debug!(
        path,
        news = snapshot.news.len(),
        pools = snapshot.pools.len(),
        "State saved"
    );
    Ok(())
}

/// Load an engine snapshot from a JSON file.
/// Returns None if the file doesn't exist (fresh start).
pub fn load_state(path: Option<&str>) -> Result<Option<EngineSnapshot>> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);

    if !Path::new(path).exists() {
        info!(path, "No saved state found, starting fresh");
        return Ok(None);
    }

    let json = std::fs::read_to_string(path)
        .context(format!("Failed to read state from {path}"))?;

    let snapshot: EngineSnapshot = serde_json::from_str(&json)
        .context(format!("Failed to parse state from {path}"))?;

    info!(
        path,
        news = snapshot.news.len(),
        pools = snapshot.pools.len(),
        users = snapshot.reputation.len(),
        "State loaded from disk"
    );

    Ok(Some(snapshot))
}

/// Delete the state file (for testing or reset).
pub fn delete_state(path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);
    if Path::new(path).exists() {
        std::fs::remove_file(path)
            .context(format!("Failed to delete state file {path}"))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
