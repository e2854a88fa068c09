mod bootstrap_helpers;
mod cli_args;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use argus_tracker_runtime::{run_tracker, TrackerRuntimeConfig, DEFAULT_TRACKED_USER_IDS};

use crate::bootstrap_helpers::{init_tracing, spawn_control_reader};
use crate::cli_args::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = TrackerRuntimeConfig {
        state_dir: cli.state_dir,
        guild_id: cli.guild_id,
        discord_api_base: cli.discord_api_base,
        discord_bot_token: cli.discord_bot_token,
        roblox_users_api_base: cli.roblox_users_api_base,
        roblox_presence_api_base: cli.roblox_presence_api_base,
        default_user_ids: DEFAULT_TRACKED_USER_IDS.to_vec(),
        tick_interval: Duration::from_secs(cli.tick_interval_seconds.max(1)),
        user_pause: Duration::from_millis(cli.user_pause_ms),
        request_timeout_ms: cli.request_timeout_ms,
        gateway_base_delay_ms: cli.gateway_base_delay_ms,
        gateway_delay_cap_ms: cli.gateway_delay_cap_ms,
    };

    let control_rx = spawn_control_reader();
    run_tracker(config, control_rx).await
}
