//! Roblox presence lookups for the argus tracker.
//!
//! Wraps the public Users and Presence APIs behind a small client that
//! classifies each tracked user into a closed status set. Lookup failures are
//! split by who asked: operator commands get real errors, the reconciliation
//! loop gets a degraded-but-usable snapshot.

pub mod presence_client;
pub mod presence_status;

pub use presence_client::{
    PresenceSnapshot, RobloxApiClient, RobloxApiError, DEFAULT_PRESENCE_API_BASE,
    DEFAULT_USERS_API_BASE,
};
pub use presence_status::PresenceStatus;
