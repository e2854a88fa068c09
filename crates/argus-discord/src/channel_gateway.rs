//! Discord REST gateway for tracking channels.
//!
//! Every mutating call (create, rename, delete) runs through one shared
//! pacing protocol: sleep for the process-wide delay, issue the request, and
//! on a 429 raise the delay to the provider's suggestion (bounded by a cap),
//! sleep, and retry the same call. The delay is shared across all call sites
//! and keeps its last value after the provider recovers, so one hot endpoint
//! slows the whole process down instead of letting other calls keep hammering
//! the API. Reads (`fetch_channel`) stay outside the protocol and never
//! retry.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::watch;

use crate::throttle::{next_shared_delay, suggested_retry_delay};

pub const DEFAULT_DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Permission bit for VIEW_CHANNEL in Discord's permission bitfield.
const VIEW_CHANNEL_PERMISSION: u64 = 1 << 10;
const GUILD_TEXT_CHANNEL_TYPE: u8 = 0;
const RETRY_ATTEMPT_HEADER: &str = "x-argus-retry-attempt";
const ERROR_BODY_MAX_CHARS: usize = 600;

#[derive(Debug, Clone)]
pub struct DiscordGatewayConfig {
    pub api_base: String,
    pub bot_token: String,
    pub guild_id: u64,
    pub request_timeout_ms: u64,
    /// Initial shared delay applied before every mutating call.
    pub base_delay_ms: u64,
    /// Ceiling for the shared delay regardless of what the provider suggests.
    pub delay_cap_ms: u64,
}

impl Default for DiscordGatewayConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_DISCORD_API_BASE.to_string(),
            bot_token: String::new(),
            guild_id: 0,
            request_timeout_ms: 10_000,
            base_delay_ms: 1_000,
            delay_cap_ms: 10_000,
        }
    }
}

/// Visibility applied to a newly created tracking channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelVisibility {
    /// Hidden from the guild's @everyone role via a VIEW_CHANNEL deny.
    Hidden,
    /// No overwrites; the guild's defaults apply.
    GuildDefault,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelRecord {
    #[serde(deserialize_with = "deserialize_snowflake")]
    pub id: u64,
    pub name: String,
}

/// Result of probing a channel by ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelProbe {
    Exists(ChannelRecord),
    /// The provider answered and the channel is gone.
    Missing,
    /// The probe itself failed; existence is undecided.
    Unavailable,
}

/// Non-throttle failure from a gateway call.
///
/// Throttles never surface here; the retry loop absorbs them. Callers decide
/// whether to retry a failed call on a later pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCallError {
    pub reason_code: String,
    pub detail: String,
    pub retryable: bool,
    pub http_status: Option<u16>,
}

impl GatewayCallError {
    fn transport(operation: &str, error: &reqwest::Error) -> Self {
        Self {
            reason_code: format!("{operation}_transport_error"),
            detail: error.to_string(),
            retryable: true,
            http_status: None,
        }
    }

    fn rejected(operation: &str, status: u16, body: &str) -> Self {
        Self {
            reason_code: format!("{operation}_rejected"),
            detail: truncate_body(body, ERROR_BODY_MAX_CHARS),
            retryable: (500..600).contains(&status),
            http_status: Some(status),
        }
    }

    fn shutdown(operation: &str) -> Self {
        Self {
            reason_code: format!("{operation}_shutdown"),
            detail: "shutdown requested while throttled".to_string(),
            retryable: false,
            http_status: Some(429),
        }
    }

    fn invalid_response(operation: &str, error: &reqwest::Error) -> Self {
        Self {
            reason_code: format!("{operation}_invalid_response"),
            detail: error.to_string(),
            retryable: false,
            http_status: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiscordChannelGateway {
    http: reqwest::Client,
    api_base: String,
    guild_id: u64,
    delay_cap: Duration,
    shared_delay: Arc<Mutex<Duration>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl DiscordChannelGateway {
    pub fn new(config: DiscordGatewayConfig, shutdown_rx: watch::Receiver<bool>) -> Result<Self> {
        if config.bot_token.trim().is_empty() {
            bail!("discord gateway requires a bot token");
        }
        if config.guild_id == 0 {
            bail!("discord gateway requires a guild id");
        }

        let mut headers = HeaderMap::new();
        let auth_value = HeaderValue::from_str(&format!("Bot {}", config.bot_token.trim()))
            .context("discord bot token contains invalid header characters")?;
        headers.insert(AUTHORIZATION, auth_value);
        headers.insert(USER_AGENT, HeaderValue::from_static("Argus-presence-tracker"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .context("failed to create discord http client")?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            guild_id: config.guild_id,
            delay_cap: Duration::from_millis(config.delay_cap_ms.max(1)),
            shared_delay: Arc::new(Mutex::new(Duration::from_millis(config.base_delay_ms))),
            shutdown_rx,
        })
    }

    /// Creates a guild text channel named `name` and returns its record.
    pub async fn create_channel(
        &self,
        name: &str,
        visibility: ChannelVisibility,
    ) -> Result<ChannelRecord, GatewayCallError> {
        let endpoint = format!("{}/guilds/{}/channels", self.api_base, self.guild_id);
        let payload = create_channel_payload(self.guild_id, name, visibility);
        let response = self
            .mutate("create_channel", || self.http.post(&endpoint).json(&payload))
            .await?;
        response
            .json::<ChannelRecord>()
            .await
            .map_err(|error| GatewayCallError::invalid_response("create_channel", &error))
    }

    pub async fn rename_channel(
        &self,
        channel_id: u64,
        new_name: &str,
    ) -> Result<(), GatewayCallError> {
        let endpoint = format!("{}/channels/{}", self.api_base, channel_id);
        let payload = json!({ "name": new_name });
        self.mutate("rename_channel", || {
            self.http.patch(&endpoint).json(&payload)
        })
        .await?;
        Ok(())
    }

    /// Deletes a channel. A 404 counts as success: the channel is gone, which
    /// is the state the caller asked for.
    pub async fn delete_channel(&self, channel_id: u64) -> Result<(), GatewayCallError> {
        let endpoint = format!("{}/channels/{}", self.api_base, channel_id);
        match self.mutate("delete_channel", || self.http.delete(&endpoint)).await {
            Ok(_) => Ok(()),
            Err(error) if error.http_status == Some(404) => Ok(()),
            Err(error) => Err(error),
        }
    }

    /// Probes a channel by ID without entering the pacing protocol.
    pub async fn fetch_channel(&self, channel_id: u64) -> ChannelProbe {
        let endpoint = format!("{}/channels/{}", self.api_base, channel_id);
        let response = match self.http.get(&endpoint).send().await {
            Ok(response) => response,
            Err(_) => return ChannelProbe::Unavailable,
        };
        match response.status().as_u16() {
            200 => match response.json::<ChannelRecord>().await {
                Ok(record) => ChannelProbe::Exists(record),
                Err(_) => ChannelProbe::Unavailable,
            },
            404 => ChannelProbe::Missing,
            _ => ChannelProbe::Unavailable,
        }
    }

    /// Current value of the process-wide pacing delay.
    pub fn shared_delay(&self) -> Duration {
        *self.lock_shared_delay()
    }

    /// Runs one mutating call through the pacing protocol: pause, send, and
    /// on a throttle raise the shared delay and retry the same request. Only
    /// a shutdown signal breaks the retry loop early.
    async fn mutate<F>(
        &self,
        operation: &str,
        mut build_request: F,
    ) -> Result<reqwest::Response, GatewayCallError>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt: u32 = 0;
        loop {
            self.pause_for_shared_delay().await;
            let result = build_request()
                .header(RETRY_ATTEMPT_HEADER, attempt.to_string())
                .send()
                .await;
            let response = match result {
                Ok(response) => response,
                Err(error) => return Err(GatewayCallError::transport(operation, &error)),
            };
            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }
            if status.as_u16() == 429 {
                let headers = response.headers().clone();
                let body = response.text().await.unwrap_or_default();
                let wait = self.record_throttle(&headers, &body);
                if *self.shutdown_rx.borrow() {
                    return Err(GatewayCallError::shutdown(operation));
                }
                tokio::time::sleep(wait).await;
                attempt += 1;
                continue;
            }
            let status_code = status.as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayCallError::rejected(operation, status_code, &body));
        }
    }

    async fn pause_for_shared_delay(&self) {
        let delay = self.shared_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Raises the shared delay to the throttle's suggestion (bounded by the
    /// cap) and returns the wait before the next attempt.
    fn record_throttle(&self, headers: &HeaderMap, body: &str) -> Duration {
        let mut shared = self.lock_shared_delay();
        let suggested = suggested_retry_delay(headers, body, *shared);
        *shared = next_shared_delay(suggested, self.delay_cap);
        *shared
    }

    fn lock_shared_delay(&self) -> MutexGuard<'_, Duration> {
        self.shared_delay
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn create_channel_payload(
    guild_id: u64,
    name: &str,
    visibility: ChannelVisibility,
) -> serde_json::Value {
    let mut payload = json!({
        "name": name,
        "type": GUILD_TEXT_CHANNEL_TYPE,
    });
    if let ChannelVisibility::Hidden = visibility {
        // The @everyone role shares the guild's ID.
        payload["permission_overwrites"] = json!([{
            "id": guild_id.to_string(),
            "type": 0,
            "deny": VIEW_CHANNEL_PERMISSION.to_string(),
        }]);
    }
    payload
}

fn deserialize_snowflake<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse::<u64>().map_err(serde::de::Error::custom)
}

fn truncate_body(body: &str, max_chars: usize) -> String {
    if body.chars().count() <= max_chars {
        return body.to_string();
    }
    let truncated = body.chars().take(max_chars).collect::<String>();
    format!("{truncated}… (truncated)")
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    fn gateway_for(server: &MockServer) -> (DiscordChannelGateway, watch::Sender<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let config = DiscordGatewayConfig {
            api_base: server.base_url(),
            bot_token: "discord-token".to_string(),
            guild_id: 9001,
            request_timeout_ms: 2_000,
            base_delay_ms: 1,
            delay_cap_ms: 50,
        };
        let gateway = DiscordChannelGateway::new(config, shutdown_rx).unwrap();
        (gateway, shutdown_tx)
    }

    #[test]
    fn unit_create_channel_payload_hides_channel_from_everyone() {
        let hidden = create_channel_payload(9001, "zed-online", ChannelVisibility::Hidden);
        assert_eq!(hidden["name"], "zed-online");
        assert_eq!(hidden["type"], 0);
        assert_eq!(hidden["permission_overwrites"][0]["id"], "9001");
        assert_eq!(hidden["permission_overwrites"][0]["deny"], "1024");

        let open = create_channel_payload(9001, "zed-online", ChannelVisibility::GuildDefault);
        assert!(open.get("permission_overwrites").is_none());
    }

    #[test]
    fn unit_new_requires_token_and_guild() {
        let (_tx, rx) = watch::channel(false);
        let missing_token = DiscordGatewayConfig {
            guild_id: 9001,
            ..DiscordGatewayConfig::default()
        };
        let error = DiscordChannelGateway::new(missing_token, rx.clone()).unwrap_err();
        assert!(error.to_string().contains("bot token"));

        let missing_guild = DiscordGatewayConfig {
            bot_token: "discord-token".to_string(),
            ..DiscordGatewayConfig::default()
        };
        let error = DiscordChannelGateway::new(missing_guild, rx).unwrap_err();
        assert!(error.to_string().contains("guild id"));
    }

    #[tokio::test]
    async fn integration_create_channel_sends_bot_token_and_parses_snowflake() {
        let server = MockServer::start();
        let create = server.mock(|when, then| {
            when.method(POST)
                .path("/guilds/9001/channels")
                .header("authorization", "Bot discord-token")
                .body_includes("zed-online")
                .body_includes("permission_overwrites");
            then.status(201)
                .json_body(json!({ "id": "555", "name": "zed-online", "type": 0 }));
        });

        let (gateway, _shutdown) = gateway_for(&server);
        let record = gateway
            .create_channel("zed-online", ChannelVisibility::Hidden)
            .await
            .unwrap();

        create.assert_calls(1);
        assert_eq!(record, ChannelRecord { id: 555, name: "zed-online".to_string() });
    }

    #[tokio::test]
    async fn integration_rename_channel_patches_new_name() {
        let server = MockServer::start();
        let rename = server.mock(|when, then| {
            when.method(PATCH)
                .path("/channels/555")
                .header("authorization", "Bot discord-token")
                .body_includes("zed-ingame");
            then.status(200)
                .json_body(json!({ "id": "555", "name": "zed-ingame" }));
        });

        let (gateway, _shutdown) = gateway_for(&server);
        gateway.rename_channel(555, "zed-ingame").await.unwrap();

        rename.assert_calls(1);
    }

    #[tokio::test]
    async fn integration_delete_channel_treats_missing_channel_as_already_deleted() {
        let server = MockServer::start();
        let delete = server.mock(|when, then| {
            when.method(DELETE).path("/channels/555");
            then.status(404)
                .json_body(json!({ "message": "Unknown Channel", "code": 10003 }));
        });

        let (gateway, _shutdown) = gateway_for(&server);
        gateway.delete_channel(555).await.unwrap();

        delete.assert_calls(1);
    }

    #[tokio::test]
    async fn regression_delete_channel_surfaces_forbidden() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(DELETE).path("/channels/555");
            then.status(403)
                .json_body(json!({ "message": "Missing Permissions", "code": 50013 }));
        });

        let (gateway, _shutdown) = gateway_for(&server);
        let error = gateway.delete_channel(555).await.unwrap_err();

        assert_eq!(error.reason_code, "delete_channel_rejected");
        assert_eq!(error.http_status, Some(403));
        assert!(!error.retryable);
        assert!(error.detail.contains("Missing Permissions"));
    }

    #[tokio::test]
    async fn integration_mutate_retries_through_throttles_and_keeps_last_delay() {
        let server = MockServer::start();
        let first = server.mock(|when, then| {
            when.method(PATCH)
                .path("/channels/555")
                .header(RETRY_ATTEMPT_HEADER, "0");
            then.status(429).json_body(json!({ "retry_after": 0.02 }));
        });
        let second = server.mock(|when, then| {
            when.method(PATCH)
                .path("/channels/555")
                .header(RETRY_ATTEMPT_HEADER, "1");
            then.status(429).json_body(json!({ "retry_after": 0.05 }));
        });
        let third = server.mock(|when, then| {
            when.method(PATCH)
                .path("/channels/555")
                .header(RETRY_ATTEMPT_HEADER, "2");
            then.status(429).json_body(json!({ "retry_after": 0.01 }));
        });
        let success = server.mock(|when, then| {
            when.method(PATCH)
                .path("/channels/555")
                .header(RETRY_ATTEMPT_HEADER, "3");
            then.status(200)
                .json_body(json!({ "id": "555", "name": "zed-online" }));
        });

        let (gateway, _shutdown) = gateway_for(&server);
        gateway.rename_channel(555, "zed-online").await.unwrap();

        first.assert_calls(1);
        second.assert_calls(1);
        third.assert_calls(1);
        success.assert_calls(1);
        // The delay keeps the last suggestion instead of the largest one.
        assert_eq!(gateway.shared_delay(), Duration::from_millis(10));
    }

    #[tokio::test]
    async fn regression_throttle_cap_bounds_shared_delay() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(PATCH)
                .path("/channels/555")
                .header(RETRY_ATTEMPT_HEADER, "0");
            then.status(429).json_body(json!({ "retry_after": 0.4 }));
        });
        server.mock(|when, then| {
            when.method(PATCH)
                .path("/channels/555")
                .header(RETRY_ATTEMPT_HEADER, "1");
            then.status(200)
                .json_body(json!({ "id": "555", "name": "zed-online" }));
        });

        let (gateway, _shutdown) = gateway_for(&server);
        gateway.rename_channel(555, "zed-online").await.unwrap();

        assert_eq!(gateway.shared_delay(), Duration::from_millis(50));
    }

    #[tokio::test]
    async fn regression_shared_delay_is_shared_across_clones() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(PATCH)
                .path("/channels/555")
                .header(RETRY_ATTEMPT_HEADER, "0");
            then.status(429).json_body(json!({ "retry_after": 0.03 }));
        });
        server.mock(|when, then| {
            when.method(PATCH)
                .path("/channels/555")
                .header(RETRY_ATTEMPT_HEADER, "1");
            then.status(200)
                .json_body(json!({ "id": "555", "name": "zed-online" }));
        });

        let (gateway, _shutdown) = gateway_for(&server);
        let observer = gateway.clone();
        gateway.rename_channel(555, "zed-online").await.unwrap();

        assert_eq!(observer.shared_delay(), Duration::from_millis(30));
    }

    #[tokio::test]
    async fn regression_non_throttle_rejection_fails_without_retry() {
        let server = MockServer::start();
        let rename = server.mock(|when, then| {
            when.method(PATCH).path("/channels/555");
            then.status(400)
                .json_body(json!({ "message": "Invalid Form Body", "code": 50035 }));
        });

        let (gateway, _shutdown) = gateway_for(&server);
        let error = gateway.rename_channel(555, "zed-online").await.unwrap_err();

        rename.assert_calls(1);
        assert_eq!(error.reason_code, "rename_channel_rejected");
        assert_eq!(error.http_status, Some(400));
    }

    #[tokio::test]
    async fn regression_shutdown_abandons_retry_after_current_attempt() {
        let server = MockServer::start();
        let throttled = server.mock(|when, then| {
            when.method(PATCH).path("/channels/555");
            then.status(429).json_body(json!({ "retry_after": 0.01 }));
        });

        let (gateway, shutdown) = gateway_for(&server);
        shutdown.send(true).unwrap();
        let error = gateway.rename_channel(555, "zed-online").await.unwrap_err();

        throttled.assert_calls(1);
        assert_eq!(error.reason_code, "rename_channel_shutdown");
        assert!(!error.retryable);
    }

    #[tokio::test]
    async fn integration_fetch_channel_classifies_probe_results() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/channels/1");
            then.status(200).json_body(json!({ "id": "1", "name": "zed-online" }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/channels/2");
            then.status(404)
                .json_body(json!({ "message": "Unknown Channel", "code": 10003 }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/channels/3");
            then.status(500).body("oops");
        });

        let (gateway, _shutdown) = gateway_for(&server);

        assert_eq!(
            gateway.fetch_channel(1).await,
            ChannelProbe::Exists(ChannelRecord { id: 1, name: "zed-online".to_string() })
        );
        assert_eq!(gateway.fetch_channel(2).await, ChannelProbe::Missing);
        assert_eq!(gateway.fetch_channel(3).await, ChannelProbe::Unavailable);
    }
}
