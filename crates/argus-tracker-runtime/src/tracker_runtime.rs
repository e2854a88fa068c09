//! Reconciliation runtime that mirrors Roblox presence into Discord channels.
//!
//! One runtime owns all mutable state (roster, channel index) and runs a
//! single task, so passes and operator commands are serialized by
//! construction: a pass never observes a half-applied mutation and two passes
//! never overlap. Each pass walks the roster, compares the channel name each
//! user should have against what the guild actually has, and creates or
//! renames channels to close the gap. Work that cannot be completed this pass
//! is simply retried on the next one; nothing in the loop is fatal.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};

use argus_core::current_unix_timestamp_ms;
use argus_discord::{ChannelProbe, ChannelVisibility, DiscordChannelGateway, DiscordGatewayConfig};
use argus_roblox::RobloxApiClient;

mod tracker_commands;
mod tracker_helpers;
mod tracker_state_store;

pub use tracker_commands::{AddUserOutcome, CheckUserOutcome, RemoveUserOutcome};

use tracker_commands::{
    parse_control_line, render_add_outcome, render_check_outcome, render_remove_outcome,
    ControlCommand, CONTROL_USAGE,
};
use tracker_helpers::{channel_name_for, parse_user_query, UserQuery};
use tracker_state_store::TrackerStateStore;

/// Roblox user IDs tracked by every deployment. Compiled in: never persisted
/// to the roster file and never removable at runtime.
pub const DEFAULT_TRACKED_USER_IDS: [u64; 15] = [
    8447038336, 8447064756, 8447079827, 8447109786, 8447185938, 8447226387, 8447260393,
    8447660792, 8447646077, 8447668063, 8447701884, 8447818820, 8447826973, 8447863656,
    8447924262,
];

#[derive(Debug, Clone)]
pub struct TrackerRuntimeConfig {
    pub state_dir: PathBuf,
    pub guild_id: u64,
    pub discord_api_base: String,
    pub discord_bot_token: String,
    pub roblox_users_api_base: String,
    pub roblox_presence_api_base: String,
    /// Built-in roster for this deployment, normally
    /// [`DEFAULT_TRACKED_USER_IDS`].
    pub default_user_ids: Vec<u64>,
    pub tick_interval: Duration,
    /// Pause after each user's work within a pass.
    pub user_pause: Duration,
    pub request_timeout_ms: u64,
    pub gateway_base_delay_ms: u64,
    pub gateway_delay_cap_ms: u64,
}

/// Counters for one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePassReport {
    pub tracked: usize,
    pub created: usize,
    pub renamed: usize,
    pub unchanged: usize,
    /// Index entries dropped because the channel vanished out-of-band.
    pub dropped_missing: usize,
    /// Users whose profile was unreachable this pass.
    pub skipped_unresolved: usize,
    /// Users whose channel probe failed this pass.
    pub skipped_unavailable: usize,
    pub failed: usize,
    pub persist_errors: usize,
    pub duration_ms: u64,
}

impl ReconcilePassReport {
    /// True when the pass did or skipped anything worth reporting. A fully
    /// converged pass stays quiet.
    pub fn has_activity(&self) -> bool {
        self.created
            + self.renamed
            + self.dropped_missing
            + self.skipped_unresolved
            + self.skipped_unavailable
            + self.failed
            + self.persist_errors
            > 0
    }

    pub fn summary(&self) -> String {
        format!(
            "tracked={} created={} renamed={} unchanged={} dropped_missing={} skipped_unresolved={} skipped_unavailable={} failed={} persist_errors={} duration_ms={}",
            self.tracked,
            self.created,
            self.renamed,
            self.unchanged,
            self.dropped_missing,
            self.skipped_unresolved,
            self.skipped_unavailable,
            self.failed,
            self.persist_errors,
            self.duration_ms,
        )
    }
}

/// What the runtime wants done with one control line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlOutcome {
    Reply(String),
    /// Blank input; nothing to answer.
    Ignored,
    Shutdown,
}

enum QueryResolution {
    Resolved(u64),
    NotFound,
    Failed(String),
}

/// Builds a runtime from `config` and drives it until shutdown.
pub async fn run_tracker(
    config: TrackerRuntimeConfig,
    control_rx: mpsc::Receiver<String>,
) -> Result<()> {
    let mut runtime = TrackerRuntime::new(config)?;
    runtime.run(control_rx).await
}

pub struct TrackerRuntime {
    config: TrackerRuntimeConfig,
    roblox_client: RobloxApiClient,
    gateway: DiscordChannelGateway,
    store: TrackerStateStore,
    default_users: BTreeSet<u64>,
    /// Operator-added users; the only part of the roster that persists.
    additional_users: BTreeSet<u64>,
    /// Maps tracked user IDs to the channels that represent them.
    channel_index: BTreeMap<u64, u64>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    started: Instant,
    passes_completed: u64,
}

impl TrackerRuntime {
    pub fn new(config: TrackerRuntimeConfig) -> Result<Self> {
        let store = TrackerStateStore::new(&config.state_dir);
        let (additional_users, channel_index) = store.load();
        let roblox_client = RobloxApiClient::new(
            config.roblox_users_api_base.clone(),
            config.roblox_presence_api_base.clone(),
            config.request_timeout_ms,
        )
        .context("failed to create roblox api client")?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let gateway = DiscordChannelGateway::new(
            DiscordGatewayConfig {
                api_base: config.discord_api_base.clone(),
                bot_token: config.discord_bot_token.clone(),
                guild_id: config.guild_id,
                request_timeout_ms: config.request_timeout_ms,
                base_delay_ms: config.gateway_base_delay_ms,
                delay_cap_ms: config.gateway_delay_cap_ms,
            },
            shutdown_rx.clone(),
        )?;
        let default_users = config.default_user_ids.iter().copied().collect();
        Ok(Self {
            config,
            roblox_client,
            gateway,
            store,
            default_users,
            additional_users,
            channel_index,
            shutdown_tx,
            shutdown_rx,
            started: Instant::now(),
            passes_completed: 0,
        })
    }

    /// Drives passes on the configured cadence and answers control lines
    /// between them until ctrl-c or `/quit`.
    pub async fn run(&mut self, mut control_rx: mpsc::Receiver<String>) -> Result<()> {
        println!(
            "argus tracker starting: guild={} built_in={} additional={} tick_interval_ms={} state_dir={}",
            self.config.guild_id,
            self.default_users.len(),
            self.additional_users.len(),
            self.config.tick_interval.as_millis(),
            self.config.state_dir.display()
        );
        let mut control_open = true;
        let mut next_pass = tokio::time::Instant::now();
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    self.request_shutdown();
                    println!("argus tracker shutdown requested");
                    return Ok(());
                }
                _ = tokio::time::sleep_until(next_pass) => {
                    let report = self.reconcile_once().await;
                    if report.has_activity() {
                        println!("tracker pass: {}", report.summary());
                    }
                    next_pass = tokio::time::Instant::now() + self.config.tick_interval;
                }
                line = control_rx.recv(), if control_open => {
                    match line {
                        Some(line) => match self.handle_control_line(&line).await {
                            ControlOutcome::Reply(reply) => println!("{reply}"),
                            ControlOutcome::Ignored => {}
                            ControlOutcome::Shutdown => {
                                self.request_shutdown();
                                println!("argus tracker shutting down");
                                return Ok(());
                            }
                        },
                        // Control surface closed; keep reconciling.
                        None => control_open = false,
                    }
                }
            }
        }
    }

    /// Signals in-flight gateway retries to give up after their current
    /// attempt.
    pub fn request_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Runs one reconciliation pass over the full roster.
    pub async fn reconcile_once(&mut self) -> ReconcilePassReport {
        let pass_started = Instant::now();
        let mut report = ReconcilePassReport::default();
        let roster = self.roster();
        report.tracked = roster.len();
        for user_id in roster {
            if *self.shutdown_rx.borrow() {
                break;
            }
            self.reconcile_user(user_id, &mut report).await;
            // Spread provider load across the pass instead of bursting every
            // call at tick start.
            if !self.config.user_pause.is_zero() {
                tokio::time::sleep(self.config.user_pause).await;
            }
        }
        report.duration_ms =
            u64::try_from(pass_started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.passes_completed += 1;
        report
    }

    /// Handles one line from the control surface.
    pub async fn handle_control_line(&mut self, line: &str) -> ControlOutcome {
        let Some(command) = parse_control_line(line) else {
            return ControlOutcome::Ignored;
        };
        match command {
            ControlCommand::Track(query) => {
                let outcome = self.add_user(&query).await;
                ControlOutcome::Reply(render_add_outcome(&outcome))
            }
            ControlCommand::Untrack(query) => {
                let outcome = self.remove_user(&query).await;
                ControlOutcome::Reply(render_remove_outcome(&outcome))
            }
            ControlCommand::Check(query) => {
                let outcome = self.check_user(&query).await;
                ControlOutcome::Reply(render_check_outcome(&outcome))
            }
            ControlCommand::Status => ControlOutcome::Reply(self.render_status()),
            ControlCommand::Help => ControlOutcome::Reply(CONTROL_USAGE.to_string()),
            ControlCommand::Quit => ControlOutcome::Shutdown,
            ControlCommand::Invalid { message } => ControlOutcome::Reply(message),
        }
    }

    /// Starts tracking a user. The status channel is not created here; the
    /// next pass observes the roster entry without a channel and creates it.
    pub async fn add_user(&mut self, query: &str) -> AddUserOutcome {
        let user_id = match self.resolve_query(query).await {
            QueryResolution::Resolved(user_id) => user_id,
            QueryResolution::NotFound => return AddUserOutcome::NotFound,
            QueryResolution::Failed(reason) => return AddUserOutcome::LookupFailed(reason),
        };
        if self.is_tracked(user_id) {
            return AddUserOutcome::AlreadyTracked(user_id);
        }
        self.additional_users.insert(user_id);
        self.persist_tracked();
        AddUserOutcome::Added(user_id)
    }

    /// Stops tracking a user and deletes its status channel. The index entry
    /// is dropped even when the delete fails; a lingering channel is reported
    /// back instead of blocking the removal.
    pub async fn remove_user(&mut self, query: &str) -> RemoveUserOutcome {
        let user_id = match self.resolve_query(query).await {
            QueryResolution::Resolved(user_id) => user_id,
            QueryResolution::NotFound => return RemoveUserOutcome::NotFound,
            QueryResolution::Failed(reason) => return RemoveUserOutcome::LookupFailed(reason),
        };
        if self.default_users.contains(&user_id) {
            return RemoveUserOutcome::IsDefault(user_id);
        }
        if !self.additional_users.remove(&user_id) {
            return RemoveUserOutcome::NotTracked(user_id);
        }
        self.persist_tracked();
        let orphaned_channel = match self.channel_index.get(&user_id).copied() {
            Some(channel_id) => match self.gateway.delete_channel(channel_id).await {
                Ok(()) => false,
                Err(error) => {
                    eprintln!(
                        "failed to delete channel {} for user {}: {} ({})",
                        channel_id, user_id, error.detail, error.reason_code
                    );
                    true
                }
            },
            None => false,
        };
        if self.channel_index.remove(&user_id).is_some() {
            self.persist_index();
        }
        RemoveUserOutcome::Removed {
            user_id,
            orphaned_channel,
        }
    }

    /// One-off status check; reads the providers, touches no state.
    pub async fn check_user(&self, query: &str) -> CheckUserOutcome {
        let user_id = match self.resolve_query(query).await {
            QueryResolution::Resolved(user_id) => user_id,
            QueryResolution::NotFound => return CheckUserOutcome::NotFound,
            QueryResolution::Failed(reason) => return CheckUserOutcome::LookupFailed(reason),
        };
        let snapshot = self.roblox_client.fetch_snapshot(user_id).await;
        match snapshot.username {
            Some(username) => CheckUserOutcome::Status {
                username,
                status: snapshot.status,
            },
            None => CheckUserOutcome::Unavailable(user_id),
        }
    }

    async fn reconcile_user(&mut self, user_id: u64, report: &mut ReconcilePassReport) {
        let channel_id = match self.channel_index.get(&user_id).copied() {
            Some(channel_id) => channel_id,
            None => {
                self.create_channel_for(user_id, report).await;
                return;
            }
        };
        let observed = match self.gateway.fetch_channel(channel_id).await {
            ChannelProbe::Exists(record) => record,
            ChannelProbe::Missing => {
                // The channel vanished out-of-band. Forget it and let the
                // next pass recreate it instead of renaming a ghost.
                self.channel_index.remove(&user_id);
                if !self.persist_index() {
                    report.persist_errors += 1;
                }
                report.dropped_missing += 1;
                return;
            }
            ChannelProbe::Unavailable => {
                report.skipped_unavailable += 1;
                return;
            }
        };
        let snapshot = self.roblox_client.fetch_snapshot(user_id).await;
        let Some(username) = snapshot.username else {
            // Keep the last good name while the profile is unreachable
            // rather than flapping every channel to -unknown.
            report.skipped_unresolved += 1;
            return;
        };
        let desired = channel_name_for(&username, snapshot.status);
        if desired == observed.name {
            report.unchanged += 1;
            return;
        }
        match self.gateway.rename_channel(channel_id, &desired).await {
            Ok(()) => report.renamed += 1,
            Err(error) => {
                report.failed += 1;
                eprintln!(
                    "tracker rename failed: user={} channel={} reason={} detail={}",
                    user_id, channel_id, error.reason_code, error.detail
                );
            }
        }
    }

    async fn create_channel_for(&mut self, user_id: u64, report: &mut ReconcilePassReport) {
        let snapshot = self.roblox_client.fetch_snapshot(user_id).await;
        let Some(username) = snapshot.username else {
            report.skipped_unresolved += 1;
            return;
        };
        let name = channel_name_for(&username, snapshot.status);
        match self
            .gateway
            .create_channel(&name, ChannelVisibility::Hidden)
            .await
        {
            Ok(record) => {
                self.channel_index.insert(user_id, record.id);
                if !self.persist_index() {
                    report.persist_errors += 1;
                }
                report.created += 1;
            }
            Err(error) => {
                report.failed += 1;
                eprintln!(
                    "tracker create failed: user={} name={} reason={} detail={}",
                    user_id, name, error.reason_code, error.detail
                );
            }
        }
    }

    async fn resolve_query(&self, query: &str) -> QueryResolution {
        match parse_user_query(query) {
            UserQuery::Id(user_id) => QueryResolution::Resolved(user_id),
            UserQuery::Name(name) => match self.roblox_client.resolve_user_id(name).await {
                Ok(Some(user_id)) => QueryResolution::Resolved(user_id),
                Ok(None) => QueryResolution::NotFound,
                Err(error) => QueryResolution::Failed(error.to_string()),
            },
        }
    }

    fn roster(&self) -> Vec<u64> {
        let mut roster = self.default_users.clone();
        roster.extend(self.additional_users.iter().copied());
        roster.into_iter().collect()
    }

    fn is_tracked(&self, user_id: u64) -> bool {
        self.default_users.contains(&user_id) || self.additional_users.contains(&user_id)
    }

    fn render_status(&self) -> String {
        format!(
            "tracked_users: {} ({} built-in, {} additional)\nindexed_channels: {}\npasses_completed: {}\ngateway_shared_delay_ms: {}\nuptime_s: {}\nunix_time_ms: {}",
            self.roster().len(),
            self.default_users.len(),
            self.additional_users.len(),
            self.channel_index.len(),
            self.passes_completed,
            self.gateway.shared_delay().as_millis(),
            self.started.elapsed().as_secs(),
            current_unix_timestamp_ms(),
        )
    }

    fn persist_tracked(&self) -> bool {
        match self.store.save_tracked(&self.additional_users) {
            Ok(()) => true,
            Err(error) => {
                eprintln!("failed to persist tracked users: {error:#}");
                false
            }
        }
    }

    fn persist_index(&self) -> bool {
        match self.store.save_index(&self.channel_index) {
            Ok(()) => true,
            Err(error) => {
                eprintln!("failed to persist channel index: {error:#}");
                false
            }
        }
    }
}
