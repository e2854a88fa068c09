//! Persisted roster and channel-index documents.
//!
//! Two JSON files live in the state directory. `tracked-users.json` is a flat
//! array holding only the operator-added user IDs; the built-in roster is
//! compiled in and never written. `channel-index.json` maps string-encoded
//! user IDs to channel IDs. Both are rewritten in full through an atomic
//! write on every change, and both degrade to empty on load problems so a
//! damaged disk never blocks startup.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use argus_core::write_json_atomic;

pub(super) const TRACKED_USERS_FILE_NAME: &str = "tracked-users.json";
pub(super) const CHANNEL_INDEX_FILE_NAME: &str = "channel-index.json";

pub(super) struct TrackerStateStore {
    tracked_path: PathBuf,
    index_path: PathBuf,
}

impl TrackerStateStore {
    pub(super) fn new(state_dir: &Path) -> Self {
        Self {
            tracked_path: state_dir.join(TRACKED_USERS_FILE_NAME),
            index_path: state_dir.join(CHANNEL_INDEX_FILE_NAME),
        }
    }

    /// Loads both documents, degrading each to empty independently.
    pub(super) fn load(&self) -> (BTreeSet<u64>, BTreeMap<u64, u64>) {
        (self.load_tracked(), self.load_index())
    }

    fn load_tracked(&self) -> BTreeSet<u64> {
        let Some(raw) = read_if_present(&self.tracked_path) else {
            return BTreeSet::new();
        };
        match serde_json::from_str::<Vec<u64>>(&raw) {
            Ok(user_ids) => user_ids.into_iter().collect(),
            Err(error) => {
                eprintln!(
                    "failed to parse tracked users file {}: {error} (starting with the built-in roster only)",
                    self.tracked_path.display()
                );
                BTreeSet::new()
            }
        }
    }

    fn load_index(&self) -> BTreeMap<u64, u64> {
        let Some(raw) = read_if_present(&self.index_path) else {
            return BTreeMap::new();
        };
        match serde_json::from_str::<BTreeMap<String, u64>>(&raw) {
            Ok(entries) => entries
                .into_iter()
                .filter_map(|(user_id, channel_id)| {
                    user_id.parse::<u64>().ok().map(|user_id| (user_id, channel_id))
                })
                .collect(),
            Err(error) => {
                eprintln!(
                    "failed to parse channel index file {}: {error} (starting with an empty index)",
                    self.index_path.display()
                );
                BTreeMap::new()
            }
        }
    }

    pub(super) fn save_tracked(&self, additional_users: &BTreeSet<u64>) -> Result<()> {
        let user_ids = additional_users.iter().copied().collect::<Vec<_>>();
        write_json_atomic(&self.tracked_path, &user_ids)
            .with_context(|| format!("failed to write {}", self.tracked_path.display()))
    }

    pub(super) fn save_index(&self, channel_index: &BTreeMap<u64, u64>) -> Result<()> {
        let entries = channel_index
            .iter()
            .map(|(user_id, channel_id)| (user_id.to_string(), *channel_id))
            .collect::<BTreeMap<_, _>>();
        write_json_atomic(&self.index_path, &entries)
            .with_context(|| format!("failed to write {}", self.index_path.display()))
    }
}

fn read_if_present(path: &Path) -> Option<String> {
    if !path.exists() {
        return None;
    }
    match std::fs::read_to_string(path) {
        Ok(raw) => Some(raw),
        Err(error) => {
            eprintln!(
                "failed to read {}: {error} (treating as empty)",
                path.display()
            );
            None
        }
    }
}
