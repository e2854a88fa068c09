//! Presence classification for tracked Roblox users.

/// Closed set of statuses a tracked user can be in.
///
/// `Unknown` is the safe default for anything the presence API cannot
/// classify, including transport failures and unrecognized presence codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceStatus {
    Offline,
    Online,
    InGame,
    InStudio,
    Banned,
    Unknown,
}

impl PresenceStatus {
    /// Lowercase token used in channel names and operator-facing output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Online => "online",
            Self::InGame => "ingame",
            Self::InStudio => "studio",
            Self::Banned => "banned",
            Self::Unknown => "unknown",
        }
    }

    /// Maps the presence API's `userPresenceType` code. Codes outside the
    /// documented range classify as `Unknown`, never as an error.
    pub fn from_presence_type(value: i64) -> Self {
        match value {
            0 => Self::Offline,
            1 => Self::Online,
            2 => Self::InGame,
            3 => Self::InStudio,
            _ => Self::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_from_presence_type_maps_documented_codes() {
        assert_eq!(PresenceStatus::from_presence_type(0), PresenceStatus::Offline);
        assert_eq!(PresenceStatus::from_presence_type(1), PresenceStatus::Online);
        assert_eq!(PresenceStatus::from_presence_type(2), PresenceStatus::InGame);
        assert_eq!(PresenceStatus::from_presence_type(3), PresenceStatus::InStudio);
    }

    #[test]
    fn unit_from_presence_type_classifies_unrecognized_codes_as_unknown() {
        assert_eq!(PresenceStatus::from_presence_type(4), PresenceStatus::Unknown);
        assert_eq!(PresenceStatus::from_presence_type(-1), PresenceStatus::Unknown);
        assert_eq!(PresenceStatus::from_presence_type(i64::MAX), PresenceStatus::Unknown);
    }

    #[test]
    fn unit_as_str_uses_channel_name_tokens() {
        assert_eq!(PresenceStatus::Offline.as_str(), "offline");
        assert_eq!(PresenceStatus::InGame.as_str(), "ingame");
        assert_eq!(PresenceStatus::InStudio.as_str(), "studio");
        assert_eq!(PresenceStatus::Banned.as_str(), "banned");
    }
}
