//! Tracker runtime for argus.
//!
//! Hosts the reconciliation loop that keeps one Discord status channel per
//! tracked Roblox user, the persisted roster and channel-index state, and the
//! operator control surface the CLI feeds with slash-command lines.

pub mod tracker_runtime;

pub use tracker_runtime::{
    run_tracker, AddUserOutcome, CheckUserOutcome, ControlOutcome, ReconcilePassReport,
    RemoveUserOutcome, TrackerRuntime, TrackerRuntimeConfig, DEFAULT_TRACKED_USER_IDS,
};
