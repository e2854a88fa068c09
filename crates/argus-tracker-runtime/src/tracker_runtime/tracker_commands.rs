//! Control-surface command parsing and operator-facing result rendering.
//!
//! The runtime consumes one line at a time from its control channel. Lines
//! are slash commands in the `/name args` shape; parsing never fails, it
//! classifies unusable input as [`ControlCommand::Invalid`] so the runtime
//! can answer with usage help instead of dropping the line silently.

use argus_roblox::PresenceStatus;

pub(super) const CONTROL_USAGE: &str = "commands:\n  /track <username|id>    start tracking a Roblox user\n  /untrack <username|id>  stop tracking and delete the status channel\n  /check <username|id>    show a user's current status\n  /status                 show runtime counters\n  /help                   show this help\n  /quit                   shut down";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum ControlCommand {
    Track(String),
    Untrack(String),
    Check(String),
    Status,
    Help,
    Quit,
    Invalid { message: String },
}

/// Parses one control line. Returns `None` for blank lines.
pub(super) fn parse_control_line(line: &str) -> Option<ControlCommand> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    if !trimmed.starts_with('/') {
        return Some(ControlCommand::Invalid {
            message: format!("unrecognized input '{trimmed}'; see /help"),
        });
    }
    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default();
    let args = parts.next().unwrap_or_default();
    let command = match name {
        "/track" => require_query(args, "/track <username|id>", ControlCommand::Track),
        "/untrack" => require_query(args, "/untrack <username|id>", ControlCommand::Untrack),
        "/check" => require_query(args, "/check <username|id>", ControlCommand::Check),
        "/status" => ControlCommand::Status,
        "/help" => ControlCommand::Help,
        "/quit" | "/exit" => ControlCommand::Quit,
        other => ControlCommand::Invalid {
            message: format!("unknown command '{other}'; see /help"),
        },
    };
    Some(command)
}

fn require_query(
    args: &str,
    usage: &str,
    build: impl FnOnce(String) -> ControlCommand,
) -> ControlCommand {
    let query = args.trim();
    if query.is_empty() {
        ControlCommand::Invalid {
            message: format!("usage: {usage}"),
        }
    } else {
        build(query.to_string())
    }
}

/// Result of asking the runtime to start tracking a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddUserOutcome {
    /// The user joined the roster; its channel appears on the next pass.
    Added(u64),
    AlreadyTracked(u64),
    /// Roblox answered and knows no such username.
    NotFound,
    /// The username lookup itself failed and may succeed on retry.
    LookupFailed(String),
}

/// Result of asking the runtime to stop tracking a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveUserOutcome {
    Removed {
        user_id: u64,
        /// True when the status channel could not be deleted and may linger.
        orphaned_channel: bool,
    },
    /// Built-in roster entries cannot be removed.
    IsDefault(u64),
    NotTracked(u64),
    NotFound,
    LookupFailed(String),
}

/// Result of a one-off status check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckUserOutcome {
    Status {
        username: String,
        status: PresenceStatus,
    },
    /// The user's profile was unreachable; nothing to report right now.
    Unavailable(u64),
    NotFound,
    LookupFailed(String),
}

pub(super) fn render_add_outcome(outcome: &AddUserOutcome) -> String {
    match outcome {
        AddUserOutcome::Added(user_id) => format!(
            "Now tracking user {user_id}; the status channel appears on the next pass."
        ),
        AddUserOutcome::AlreadyTracked(user_id) => {
            format!("User {user_id} is already being tracked.")
        }
        AddUserOutcome::NotFound => "No Roblox user with that name exists.".to_string(),
        AddUserOutcome::LookupFailed(reason) => {
            format!("Roblox lookup failed: {reason}. Try again shortly.")
        }
    }
}

pub(super) fn render_remove_outcome(outcome: &RemoveUserOutcome) -> String {
    match outcome {
        RemoveUserOutcome::Removed {
            user_id,
            orphaned_channel: false,
        } => format!("Stopped tracking user {user_id}."),
        RemoveUserOutcome::Removed {
            user_id,
            orphaned_channel: true,
        } => format!(
            "Stopped tracking user {user_id}; the status channel could not be deleted and may need manual cleanup."
        ),
        RemoveUserOutcome::IsDefault(user_id) => {
            format!("User {user_id} is a built-in tracked user and cannot be removed.")
        }
        RemoveUserOutcome::NotTracked(user_id) => format!("User {user_id} is not tracked."),
        RemoveUserOutcome::NotFound => "No Roblox user with that name exists.".to_string(),
        RemoveUserOutcome::LookupFailed(reason) => {
            format!("Roblox lookup failed: {reason}. Try again shortly.")
        }
    }
}

pub(super) fn render_check_outcome(outcome: &CheckUserOutcome) -> String {
    match outcome {
        CheckUserOutcome::Status { username, status } => {
            format!("**{username}** is **{}**", status.as_str().to_uppercase())
        }
        CheckUserOutcome::Unavailable(user_id) => {
            format!("Status for user {user_id} is currently unavailable.")
        }
        CheckUserOutcome::NotFound => "No Roblox user with that name exists.".to_string(),
        CheckUserOutcome::LookupFailed(reason) => {
            format!("Roblox lookup failed: {reason}. Try again shortly.")
        }
    }
}
