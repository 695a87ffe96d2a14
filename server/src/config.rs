//! Runtime configuration for the moderation bot.
//!
//! Built from the command line in `main.rs`; tests construct it directly
//! from [`Config::default`] and override single fields.

use shared::Role;
use std::path::PathBuf;
use std::time::Duration;

/// Lower bound for the status sweep interval
pub const MIN_TASK_FREQUENCY_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    /// Game server log to tail
    pub log_file: PathBuf,
    pub rcon_host: String,
    pub rcon_port: u16,
    pub rcon_password: String,
    /// Snapshot file for bans, ban points and player profiles
    pub storage_path: PathBuf,
    /// Server map cycle, one map per line
    pub mapcycle_file: Option<PathBuf>,
    /// Warnings at which a player is kicked; the alert fires one below
    pub max_warnings: u32,
    /// Highest tolerated ping, 0 disables the check
    pub max_ping: u32,
    /// Spectators are warned once more than this many players are connected, 0 disables
    pub kick_spec_full_server: usize,
    /// Seconds a fresh connection may stay in spectator
    pub spec_grace_secs: u64,
    /// Status sweep interval, 0 disables the sweep
    pub task_frequency_secs: u64,
    pub heartbeat_secs: u64,
    pub heartbeat_url: Option<String>,
    pub tk_autokick: bool,
    /// `g_gravity` applied on every InitGame
    pub low_gravity: Option<u32>,
    pub poll_interval_ms: u64,
    /// Pause between two queued RCON commands
    pub rcon_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from("games.log"),
            rcon_host: "127.0.0.1".to_string(),
            rcon_port: 27960,
            rcon_password: String::new(),
            storage_path: PathBuf::from("warden.db"),
            mapcycle_file: None,
            max_warnings: 3,
            max_ping: 200,
            kick_spec_full_server: 10,
            spec_grace_secs: 30,
            task_frequency_secs: 60,
            heartbeat_secs: 12 * 60 * 60,
            heartbeat_url: None,
            tk_autokick: true,
            low_gravity: None,
            poll_interval_ms: 125,
            rcon_delay_ms: 300,
        }
    }
}

impl Config {
    /// Sweep interval with the lower bound applied, `None` when disabled
    pub fn task_interval(&self) -> Option<Duration> {
        if self.task_frequency_secs == 0 {
            return None;
        }
        Some(Duration::from_secs(
            self.task_frequency_secs.max(MIN_TASK_FREQUENCY_SECS),
        ))
    }

    pub fn heartbeat_interval(&self) -> Option<Duration> {
        if self.heartbeat_url.is_none() || self.heartbeat_secs == 0 {
            return None;
        }
        Some(Duration::from_secs(self.heartbeat_secs))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn rcon_delay(&self) -> Duration {
        Duration::from_millis(self.rcon_delay_ms)
    }

    /// Count at which the kick fires
    pub fn kick_threshold(&self) -> u32 {
        self.max_warnings.max(1)
    }

    /// Count at which the "auto-kick imminent" alert fires
    pub fn alert_threshold(&self) -> u32 {
        self.kick_threshold().saturating_sub(1)
    }
}

/// Roles at or above these levels are exempt from the matching rule
pub mod immunity {
    use super::Role;

    /// Generic warnings and high ping
    pub const WARNINGS: Role = Role::Admin;
    pub const PING: Role = Role::Admin;
    /// Spectating on a full server
    pub const SPECTATOR: Role = Role::Moderator;
    /// Team kills are only punished below this role
    pub const TEAM_KILL: Role = Role::Regular;
    /// Lowest role allowed to issue `!warn`
    pub const ISSUE_WARNING: Role = Role::Moderator;
    /// Lowest role allowed to issue `!warnclear`
    pub const CLEAR_WARNINGS: Role = Role::Admin;
    /// Lowest role allowed to issue `!aliases`
    pub const LOOKUP_ALIASES: Role = Role::Admin;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_interval_floor() {
        let mut config = Config::default();
        config.task_frequency_secs = 3;
        assert_eq!(config.task_interval(), Some(Duration::from_secs(10)));

        config.task_frequency_secs = 45;
        assert_eq!(config.task_interval(), Some(Duration::from_secs(45)));

        config.task_frequency_secs = 0;
        assert_eq!(config.task_interval(), None);
    }

    #[test]
    fn test_heartbeat_requires_url() {
        let mut config = Config::default();
        assert_eq!(config.heartbeat_interval(), None);
        config.heartbeat_url = Some("http://localhost/ping".to_string());
        assert_eq!(
            config.heartbeat_interval(),
            Some(Duration::from_secs(43_200))
        );
    }

    #[test]
    fn test_thresholds() {
        let config = Config::default();
        assert_eq!(config.kick_threshold(), 3);
        assert_eq!(config.alert_threshold(), 2);
    }
}
