//! Shared vocabulary for the game-server moderation bot.
//!
//! Everything that describes *what the game server says* and *what the bot
//! answers* lives here, so the server crate and the integration tests agree
//! on one set of types:
//!
//! - [`event`]: the closed set of log events and the line parser
//! - [`tables`]: hit-location, hit-item and death-cause code tables for the
//!   two supported game revisions
//! - [`action`]: outbound actions and their RCON command rendering
//!
//! The core enums (`Team`, `Role`, `GameKind`, `ModVersion`) are defined at
//! the crate root.

pub mod action;
pub mod event;
pub mod tables;

pub use action::Action;
pub use event::{Event, FlagAction, GameInfo, Identity, IdentityProblem, Userinfo};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Slot reserved for the pseudo-player "World" (environmental kills).
pub const WORLD_SLOT: u32 = 1022;

/// Ping value the server reports for clients that are still connecting or
/// have dropped; never counts as a high ping.
pub const DISCONNECTED_PING: u32 = 999;

/// Address used when a client's userinfo carries no `ip` key.
pub const NULL_ADDRESS: &str = "0.0.0.0";

/// Team assignment as encoded by the game server (`t` key, 0-3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Team {
    Green,
    Red,
    Blue,
    #[default]
    Spectator,
}

impl Team {
    /// Decodes the numeric team code; unknown codes fall back to spectator.
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => Team::Green,
            1 => Team::Red,
            2 => Team::Blue,
            _ => Team::Spectator,
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Team::Green => 0,
            Team::Red => 1,
            Team::Blue => 2,
            Team::Spectator => 3,
        }
    }

    /// Name understood by the `forceteam` command
    pub fn name(self) -> &'static str {
        match self {
            Team::Green => "green",
            Team::Red => "red",
            Team::Blue => "blue",
            Team::Spectator => "spectator",
        }
    }

    /// Chat colour prefix used when naming a player of this team
    pub fn color(self) -> &'static str {
        if self == Team::Red {
            "^1"
        } else {
            "^4"
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Administrative role of a player.
///
/// Roles are ordered by their numeric level, so `role >= Role::Moderator`
/// reads the way the permission rules are written.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum Role {
    #[default]
    Guest,
    User,
    Regular,
    Moderator,
    Admin,
    FullAdmin,
    SeniorAdmin,
    HeadAdmin,
}

impl Role {
    pub const ALL: [Role; 8] = [
        Role::Guest,
        Role::User,
        Role::Regular,
        Role::Moderator,
        Role::Admin,
        Role::FullAdmin,
        Role::SeniorAdmin,
        Role::HeadAdmin,
    ];

    /// Numeric level as stored by the bot's database
    pub fn level(self) -> u32 {
        match self {
            Role::Guest => 0,
            Role::User => 1,
            Role::Regular => 2,
            Role::Moderator => 20,
            Role::Admin => 40,
            Role::FullAdmin => 60,
            Role::SeniorAdmin => 80,
            Role::HeadAdmin => 100,
        }
    }

    pub fn from_level(level: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.level() == level)
    }

    pub fn name(self) -> &'static str {
        match self {
            Role::Guest => "Guest",
            Role::User => "User",
            Role::Regular => "Regular",
            Role::Moderator => "Moderator",
            Role::Admin => "Admin",
            Role::FullAdmin => "Full Admin",
            Role::SeniorAdmin => "Senior Admin",
            Role::HeadAdmin => "Head Admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Game-type classification derived from the `g_gametype` code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameKind {
    /// Free for all, last man standing and jump mode: no teams to police
    FreeForAll,
    CaptureTheFlag,
    TeamSurvivor,
    #[default]
    Other,
}

impl GameKind {
    pub fn from_code(code: u32) -> Self {
        match code {
            0 | 1 | 9 => GameKind::FreeForAll,
            7 => GameKind::CaptureTheFlag,
            4 => GameKind::TeamSurvivor,
            _ => GameKind::Other,
        }
    }

    /// Team kills are neither counted nor punished without teams
    pub fn tracks_team_kills(self) -> bool {
        self != GameKind::FreeForAll
    }
}

/// Game content revision, selecting the hit/death code tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModVersion {
    Urt41,
    #[default]
    Urt42,
}

impl ModVersion {
    /// Classifies a `g_modversion` value such as `4.1.1` or `4.2.023`.
    pub fn from_modversion(value: &str) -> Self {
        if value.trim().starts_with("4.1") {
            ModVersion::Urt41
        } else {
            ModVersion::Urt42
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_codes() {
        assert_eq!(Team::from_code(1), Team::Red);
        assert_eq!(Team::from_code(2), Team::Blue);
        assert_eq!(Team::from_code(7), Team::Spectator);
        assert_eq!(Team::Blue.code(), 2);
        assert_eq!(Team::Spectator.name(), "spectator");
    }

    #[test]
    fn test_role_ordering() {
        assert!(Role::Guest < Role::User);
        assert!(Role::Moderator < Role::Admin);
        assert!(Role::HeadAdmin > Role::SeniorAdmin);
        assert_eq!(Role::from_level(40), Some(Role::Admin));
        assert_eq!(Role::from_level(41), None);
        assert_eq!(Role::FullAdmin.to_string(), "Full Admin");
    }

    #[test]
    fn test_game_kind_classification() {
        for code in [0, 1, 9] {
            assert_eq!(GameKind::from_code(code), GameKind::FreeForAll);
            assert!(!GameKind::from_code(code).tracks_team_kills());
        }
        assert_eq!(GameKind::from_code(7), GameKind::CaptureTheFlag);
        assert_eq!(GameKind::from_code(4), GameKind::TeamSurvivor);
        assert_eq!(GameKind::from_code(3), GameKind::Other);
        assert_eq!(GameKind::from_code(10), GameKind::Other);
    }

    #[test]
    fn test_mod_version() {
        assert_eq!(ModVersion::from_modversion("4.1.1"), ModVersion::Urt41);
        assert_eq!(ModVersion::from_modversion("4.2.023"), ModVersion::Urt42);
        assert_eq!(ModVersion::from_modversion(""), ModVersion::Urt42);
    }

    #[test]
    fn test_role_serialization_roundtrip() {
        let serialized = bincode::serialize(&Role::SeniorAdmin).unwrap();
        let deserialized: Role = bincode::deserialize(&serialized).unwrap();
        assert_eq!(deserialized, Role::SeniorAdmin);
    }
}
