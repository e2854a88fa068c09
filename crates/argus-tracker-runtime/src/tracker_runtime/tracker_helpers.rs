//! Naming and query-parsing helpers for the tracker runtime.

use argus_roblox::PresenceStatus;

/// Canonical channel name for a user's current presence:
/// `lowercase(username)-status`.
pub(super) fn channel_name_for(username: &str, status: PresenceStatus) -> String {
    format!("{}-{}", username.to_lowercase(), status.as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum UserQuery<'a> {
    Id(u64),
    Name(&'a str),
}

/// All-digit queries address a user ID directly; anything else is treated as
/// a username to resolve.
pub(super) fn parse_user_query(query: &str) -> UserQuery<'_> {
    let trimmed = query.trim();
    if !trimmed.is_empty() && trimmed.chars().all(|ch| ch.is_ascii_digit()) {
        if let Ok(user_id) = trimmed.parse::<u64>() {
            return UserQuery::Id(user_id);
        }
    }
    UserQuery::Name(trimmed)
}
