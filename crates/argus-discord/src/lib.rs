//! Discord REST access for the argus tracker.
//!
//! The tracker's entire Discord footprint is channel management: create,
//! rename, delete, and probe guild text channels. All mutating traffic is
//! paced by a single process-wide rate-limit delay described in
//! [`channel_gateway`].

pub mod channel_gateway;
pub mod throttle;

pub use channel_gateway::{
    ChannelProbe, ChannelRecord, ChannelVisibility, DiscordChannelGateway, DiscordGatewayConfig,
    GatewayCallError, DEFAULT_DISCORD_API_BASE,
};
