use std::path::PathBuf;

use clap::Parser;

use argus_discord::DEFAULT_DISCORD_API_BASE;
use argus_roblox::{DEFAULT_PRESENCE_API_BASE, DEFAULT_USERS_API_BASE};

#[derive(Debug, Parser)]
#[command(
    name = "argus",
    about = "Mirrors Roblox user presence into Discord guild channels",
    version
)]
pub(crate) struct Cli {
    #[arg(
        long,
        env = "ARGUS_DISCORD_BOT_TOKEN",
        hide_env_values = true,
        help = "Discord bot token used for all guild channel calls"
    )]
    pub(crate) discord_bot_token: String,

    #[arg(
        long,
        env = "ARGUS_GUILD_ID",
        help = "Discord guild that owns the presence channels"
    )]
    pub(crate) guild_id: u64,

    #[arg(
        long,
        env = "ARGUS_STATE_DIR",
        default_value = ".argus",
        help = "Directory for the tracked-user roster and channel index documents"
    )]
    pub(crate) state_dir: PathBuf,

    #[arg(
        long,
        env = "ARGUS_DISCORD_API_BASE",
        default_value = DEFAULT_DISCORD_API_BASE,
        help = "Base URL for the Discord REST API"
    )]
    pub(crate) discord_api_base: String,

    #[arg(
        long,
        env = "ARGUS_ROBLOX_USERS_API_BASE",
        default_value = DEFAULT_USERS_API_BASE,
        help = "Base URL for the Roblox users API"
    )]
    pub(crate) roblox_users_api_base: String,

    #[arg(
        long,
        env = "ARGUS_ROBLOX_PRESENCE_API_BASE",
        default_value = DEFAULT_PRESENCE_API_BASE,
        help = "Base URL for the Roblox presence API"
    )]
    pub(crate) roblox_presence_api_base: String,

    #[arg(
        long,
        env = "ARGUS_TICK_INTERVAL_SECONDS",
        default_value_t = 5,
        help = "Seconds between reconcile passes"
    )]
    pub(crate) tick_interval_seconds: u64,

    #[arg(
        long,
        env = "ARGUS_USER_PAUSE_MS",
        default_value_t = 700,
        help = "Pause after each user's work within a pass in milliseconds"
    )]
    pub(crate) user_pause_ms: u64,

    #[arg(
        long,
        env = "ARGUS_REQUEST_TIMEOUT_MS",
        default_value_t = 10_000,
        help = "HTTP request timeout for Roblox and Discord calls in milliseconds"
    )]
    pub(crate) request_timeout_ms: u64,

    #[arg(
        long,
        env = "ARGUS_GATEWAY_BASE_DELAY_MS",
        default_value_t = 1_000,
        help = "Starting value of the shared Discord pacing delay in milliseconds"
    )]
    pub(crate) gateway_base_delay_ms: u64,

    #[arg(
        long,
        env = "ARGUS_GATEWAY_DELAY_CAP_MS",
        default_value_t = 10_000,
        help = "Upper bound applied to rate-limit retry intervals in milliseconds"
    )]
    pub(crate) gateway_delay_cap_ms: u64,
}
