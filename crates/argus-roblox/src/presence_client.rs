//! Client for the Roblox Users and Presence APIs.
//!
//! Two call shapes exist on purpose. Operator-initiated lookups
//! ([`RobloxApiClient::resolve_user_id`]) surface errors so the operator can
//! distinguish "no such user" from "try again later". The per-pass snapshot
//! ([`RobloxApiClient::fetch_snapshot`]) never fails: the reconciliation loop
//! wants a best-effort view every pass, and anything unresolvable simply
//! degrades toward `Unknown`.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::presence_status::PresenceStatus;

pub const DEFAULT_USERS_API_BASE: &str = "https://users.roblox.com";
pub const DEFAULT_PRESENCE_API_BASE: &str = "https://presence.roblox.com";

const ERROR_BODY_MAX_CHARS: usize = 600;

#[derive(Debug, Error)]
pub enum RobloxApiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("roblox returned status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("invalid response body: {0}")]
    InvalidResponse(reqwest::Error),
}

/// Point-in-time presence view of one user. Recomputed every pass, never
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceSnapshot {
    /// Current display name, or `None` when the profile was unreachable.
    pub username: Option<String>,
    pub status: PresenceStatus,
}

impl PresenceSnapshot {
    fn unavailable() -> Self {
        Self {
            username: None,
            status: PresenceStatus::Unknown,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UsernameLookupResponse {
    #[serde(default)]
    data: Vec<UsernameLookupRow>,
}

#[derive(Debug, Deserialize)]
struct UsernameLookupRow {
    id: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserProfileResponse {
    name: String,
    #[serde(default)]
    is_banned: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PresenceLookupResponse {
    #[serde(default)]
    user_presences: Vec<PresenceRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PresenceRow {
    /// Absent when Roblox returns a row without a presence type; that is
    /// missing data, not an offline user.
    user_presence_type: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct RobloxApiClient {
    http: reqwest::Client,
    users_api_base: String,
    presence_api_base: String,
}

impl RobloxApiClient {
    pub fn new(
        users_api_base: String,
        presence_api_base: String,
        request_timeout_ms: u64,
    ) -> Result<Self, RobloxApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("Argus-presence-tracker"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()?;
        Ok(Self {
            http,
            users_api_base: users_api_base.trim_end_matches('/').to_string(),
            presence_api_base: presence_api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Resolves a username to a user ID.
    ///
    /// `Ok(None)` means Roblox answered and knows no such user; `Err` means
    /// the lookup itself failed and may succeed on retry.
    pub async fn resolve_user_id(&self, username: &str) -> Result<Option<u64>, RobloxApiError> {
        let endpoint = format!("{}/v1/usernames/users", self.users_api_base);
        let payload = json!({
            "usernames": [username],
            "excludeBannedUsers": false,
        });
        let response = self.http.post(&endpoint).json(&payload).send().await?;
        let response = require_ok(response).await?;
        let parsed = response
            .json::<UsernameLookupResponse>()
            .await
            .map_err(RobloxApiError::InvalidResponse)?;
        Ok(parsed.data.into_iter().next().map(|row| row.id))
    }

    /// Returns the best-effort presence view of `user_id`.
    ///
    /// A failed profile fetch yields a fully unavailable snapshot without
    /// touching the presence API. A banned profile short-circuits to
    /// [`PresenceStatus::Banned`]. A presence fetch that fails or comes back
    /// without a presence type keeps the username but degrades the status to
    /// `Unknown`.
    pub async fn fetch_snapshot(&self, user_id: u64) -> PresenceSnapshot {
        let profile = match self.fetch_profile(user_id).await {
            Ok(profile) => profile,
            Err(_) => return PresenceSnapshot::unavailable(),
        };
        if profile.is_banned {
            return PresenceSnapshot {
                username: Some(profile.name),
                status: PresenceStatus::Banned,
            };
        }
        let status = match self.fetch_presence_type(user_id).await {
            Ok(Some(code)) => PresenceStatus::from_presence_type(code),
            Ok(None) | Err(_) => PresenceStatus::Unknown,
        };
        PresenceSnapshot {
            username: Some(profile.name),
            status,
        }
    }

    async fn fetch_profile(&self, user_id: u64) -> Result<UserProfileResponse, RobloxApiError> {
        let endpoint = format!("{}/v1/users/{}", self.users_api_base, user_id);
        let response = self.http.get(&endpoint).send().await?;
        let response = require_ok(response).await?;
        response
            .json::<UserProfileResponse>()
            .await
            .map_err(RobloxApiError::InvalidResponse)
    }

    async fn fetch_presence_type(&self, user_id: u64) -> Result<Option<i64>, RobloxApiError> {
        let endpoint = format!("{}/v1/presence/users", self.presence_api_base);
        let payload = json!({ "userIds": [user_id] });
        let response = self.http.post(&endpoint).json(&payload).send().await?;
        let response = require_ok(response).await?;
        let parsed = response
            .json::<PresenceLookupResponse>()
            .await
            .map_err(RobloxApiError::InvalidResponse)?;
        Ok(parsed
            .user_presences
            .into_iter()
            .next()
            .and_then(|row| row.user_presence_type))
    }
}

/// Roblox endpoints report success with exactly 200. Anything else carries an
/// error body worth surfacing.
async fn require_ok(response: reqwest::Response) -> Result<reqwest::Response, RobloxApiError> {
    let status = response.status().as_u16();
    if status != 200 {
        let body = response.text().await.unwrap_or_default();
        return Err(RobloxApiError::HttpStatus {
            status,
            body: truncate_body(&body, ERROR_BODY_MAX_CHARS),
        });
    }
    Ok(response)
}

fn truncate_body(body: &str, max_chars: usize) -> String {
    if body.chars().count() <= max_chars {
        return body.to_string();
    }
    let truncated = body.chars().take(max_chars).collect::<String>();
    format!("{truncated}… (truncated)")
}
