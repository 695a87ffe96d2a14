//! Player state tracked per occupied slot.
//!
//! A [`Player`] carries three kinds of data:
//! - identity (slot, guid, name, address, aliases) and admin role
//! - round counters, reset at every Warmup
//! - lifetime counters mirrored from storage and flushed back at round end
//!
//! The two team-kill relation lists are kept as plain slot vectors so a
//! repeated offence against the same victim counts once per occurrence.

use crate::utils::{percentage, ratio, strip_colors};
use serde::{Deserialize, Serialize};
use shared::event::strip_whitespace;
use shared::{Role, Team, WORLD_SLOT};

/// Longest alias history kept per guid
pub const MAX_ALIASES: usize = 15;

/// Counters that survive across rounds and connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LifetimeStats {
    pub kills: u32,
    pub deaths: u32,
    pub headshots: u32,
    pub team_kills: u32,
    pub team_deaths: u32,
    pub max_streak: u32,
    pub suicides: u32,
}

impl LifetimeStats {
    pub fn ratio(&self) -> f64 {
        ratio(self.kills, self.deaths)
    }
}

#[derive(Debug, Clone)]
pub struct Player {
    pub slot: u32,
    pub guid: String,
    /// Display name with whitespace removed, colour codes kept
    pub name: String,
    pub address: String,
    pub aliases: Vec<String>,
    pub role: Role,
    pub registered: bool,
    pub num_played: u32,
    pub last_visit: Option<u64>,
    pub team: Team,
    /// Unix seconds of the first identity event for this slot
    pub time_joined: u64,
    pub country: Option<String>,
    /// An active ban matched on connect; the slot is being kicked
    pub banned: bool,
    /// Registered players are greeted once per connection
    pub welcome_pending: bool,

    pub kills: u32,
    pub deaths: u32,
    pub streak: u32,
    pub max_streak: u32,
    pub headshots: u32,
    pub all_hits: u32,
    pub tk_count: u32,
    pub warnings: u32,
    pub spec_warnings: u32,
    pub high_ping_count: u32,
    pub ping_value: u32,
    pub flags_captured: u32,
    pub flags_returned: u32,
    /// Teammates this player killed and who have not forgiven yet
    pub tk_victims: Vec<u32>,
    /// Teammates who killed this player and were not forgiven yet
    pub killed_me: Vec<u32>,

    pub lifetime: LifetimeStats,
}

impl Player {
    pub fn new(slot: u32, address: &str, guid: &str, name: &str, now: u64) -> Self {
        Self {
            slot,
            guid: guid.to_string(),
            name: strip_whitespace(name),
            address: address.to_string(),
            aliases: Vec::new(),
            role: Role::Guest,
            registered: false,
            num_played: 0,
            last_visit: None,
            team: Team::Spectator,
            time_joined: now,
            country: None,
            banned: false,
            welcome_pending: true,
            kills: 0,
            deaths: 0,
            streak: 0,
            max_streak: 0,
            headshots: 0,
            all_hits: 0,
            tk_count: 0,
            warnings: 0,
            spec_warnings: 0,
            high_ping_count: 0,
            ping_value: 0,
            flags_captured: 0,
            flags_returned: 0,
            tk_victims: Vec::new(),
            killed_me: Vec::new(),
            lifetime: LifetimeStats::default(),
        }
    }

    /// The pseudo-player blamed for environmental kills
    pub fn world() -> Self {
        let mut world = Self::new(WORLD_SLOT, "127.0.0.1", "NONE", "World", 0);
        world.welcome_pending = false;
        world
    }

    pub fn is_world(&self) -> bool {
        self.slot == WORLD_SLOT
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = strip_whitespace(name);
    }

    /// Name without colour codes, as stored in profiles
    pub fn pretty_name(&self) -> String {
        strip_colors(&self.name)
    }

    /// Name prefixed with the team colour
    pub fn colored_name(&self) -> String {
        format!("{}{}", self.team.color(), self.name)
    }

    pub fn kill(&mut self) {
        self.streak += 1;
        self.kills += 1;
        self.lifetime.kills += 1;
    }

    pub fn die(&mut self) {
        self.max_streak = self.max_streak.max(self.streak);
        self.lifetime.max_streak = self.lifetime.max_streak.max(self.max_streak);
        self.streak = 0;
        self.deaths += 1;
        self.lifetime.deaths += 1;
    }

    pub fn suicide(&mut self) {
        self.lifetime.suicides += 1;
    }

    pub fn hit(&mut self) {
        self.all_hits += 1;
    }

    pub fn headshot(&mut self) {
        self.headshots += 1;
        self.lifetime.headshots += 1;
    }

    /// Share of all hits that landed on the head, in percent
    pub fn headshot_percentage(&self) -> u32 {
        percentage(self.headshots, self.all_hits)
    }

    pub fn count_team_kill(&mut self) {
        self.tk_count += 1;
        self.lifetime.team_kills += 1;
    }

    pub fn team_death(&mut self) {
        self.lifetime.team_deaths += 1;
    }

    pub fn capture_flag(&mut self) {
        self.flags_captured += 1;
    }

    pub fn return_flag(&mut self) {
        self.flags_returned += 1;
    }

    pub fn add_warning(&mut self) {
        self.warnings += 1;
    }

    pub fn add_spec_warning(&mut self) {
        self.spec_warnings += 1;
    }

    pub fn clear_spec_warning(&mut self) {
        self.spec_warnings = 0;
    }

    pub fn add_high_ping(&mut self, ping: u32) {
        self.high_ping_count += 1;
        self.ping_value = ping;
    }

    pub fn clear_high_ping(&mut self) {
        self.high_ping_count = 0;
    }

    /// Drops every entry for `victim` from this player's victim list
    pub fn forget_victim(&mut self, victim: u32) {
        self.tk_victims.retain(|&slot| slot != victim);
    }

    /// Drops every entry for `killer` from this player's killed-me list
    pub fn forgive_killer(&mut self, killer: u32) {
        self.killed_me.retain(|&slot| slot != killer);
    }

    /// Clears the killed-me list and returns the distinct killers in it
    pub fn forgive_all(&mut self) -> Vec<u32> {
        let mut killers = Vec::new();
        for slot in self.killed_me.drain(..) {
            if !killers.contains(&slot) {
                killers.push(slot);
            }
        }
        killers
    }

    /// Warning counters and both relation lists back to empty
    pub fn clear_warnings(&mut self) {
        self.warnings = 0;
        self.spec_warnings = 0;
        self.tk_victims.clear();
        self.killed_me.clear();
    }

    /// Zeroes every round counter; lifetime counters are left alone
    pub fn reset_round(&mut self) {
        self.kills = 0;
        self.deaths = 0;
        self.streak = 0;
        self.max_streak = 0;
        self.headshots = 0;
        self.all_hits = 0;
        self.tk_count = 0;
        self.tk_victims.clear();
        self.killed_me.clear();
        self.warnings = 0;
        self.spec_warnings = 0;
        self.high_ping_count = 0;
        self.reset_flag_stats();
    }

    pub fn reset_flag_stats(&mut self) {
        self.flags_captured = 0;
        self.flags_returned = 0;
    }

    /// Alias list for display, marked when the history is full
    pub fn aliases_display(&self) -> String {
        let mut display = self.aliases.join(", ");
        if self.aliases.len() >= MAX_ALIASES {
            display.push_str(", and more...");
        }
        display
    }
}
