//! Warning, kick and ban rules.
//!
//! [`Escalation`] borrows the collaborators for the duration of one event
//! or task and evaluates the rules against players in the registry. It owns
//! no state of its own: every counter lives on [`Player`], every ban and ban
//! point in [`Storage`].

use crate::config::{immunity, Config};
use crate::outbox::Outbox;
use crate::player::Player;
use crate::registry::PlayerRegistry;
use crate::storage::{BanRecord, Storage};
use log::{debug, error, info};
use shared::{Action, Team, DISCONNECTED_PING};

/// Unforgiven team kills that get a player kicked
pub const TEAM_KILL_LIMIT: usize = 5;
/// Base duration of the ban point added on a team-kill kick
pub const TEAM_KILL_POINT_SECS: u64 = 15 * 60;
/// Ban duration is this multiple of the point that triggered it
pub const BAN_POINT_MULTIPLIER: u64 = 3;
/// Names of GTV relay clients start with this and are never spectator-warned
const GTV_PREFIX: &str = "GTV-";

/// Reason codes accepted by `!warn` and their broadcast text
pub const WARN_REASONS: [(&str, &str); 10] = [
    ("obj", "go for objective"),
    ("camp", "stop camping"),
    ("spam", "do not spam, shut-up!"),
    ("lang", "bad language"),
    ("racism", "racism is not tolerated"),
    ("ping", "fix your ping"),
    ("afk", "away from keyboard"),
    ("tk", "stop team killing"),
    ("spec", "spectator too long on full server"),
    ("ci", "connection interrupted"),
];

/// Live ping of one slot as reported by the server status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerPing {
    pub slot: u32,
    pub ping: u32,
}

pub struct Escalation<'a> {
    pub config: &'a Config,
    pub storage: &'a mut dyn Storage,
    pub outbox: &'a mut Outbox,
    pub now: u64,
}

impl<'a> Escalation<'a> {
    pub fn new(
        config: &'a Config,
        storage: &'a mut dyn Storage,
        outbox: &'a mut Outbox,
        now: u64,
    ) -> Self {
        Self {
            config,
            storage,
            outbox,
            now,
        }
    }

    /// Periodic pass over every player: kicks, alerts and spectator checks.
    ///
    /// The alert at the count below the kick threshold bumps both the
    /// generic and the spectator counter, whichever of the two reached it.
    pub fn sweep_warnings(&mut self, registry: &mut PlayerRegistry) {
        let connected = registry.connected_count();
        let kick_at = self.config.kick_threshold();
        let alert_at = self.config.alert_threshold();

        for slot in registry.slots() {
            let Some(player) = registry.get_mut(slot) else {
                continue;
            };
            if player.is_world() {
                continue;
            }

            if player.warnings >= kick_at && player.role < immunity::WARNINGS {
                self.outbox.say(format!(
                    "^7Player ^2{} ^7kicked, because of too many warnings",
                    player.name
                ));
                self.outbox.kick(slot);
            } else if player.high_ping_count >= kick_at && player.role < immunity::PING {
                self.outbox.say(format!(
                    "^7Player ^2{} ^7kicked, ping was too high for this server ^7[^4{}^7]",
                    player.name, player.ping_value
                ));
                self.outbox.kick(slot);
            } else if player.spec_warnings >= kick_at && player.role < immunity::SPECTATOR {
                self.outbox.say(format!(
                    "^7Player ^2{} ^7kicked, spectator too long on full server",
                    player.name
                ));
                self.outbox.kick(slot);
            }

            // a threshold of zero would alert every clean player
            if alert_at > 0
                && (player.warnings == alert_at || player.spec_warnings == alert_at)
                && player.role < immunity::WARNINGS
            {
                self.outbox.say(format!(
                    "^1ALERT: ^7Player ^2{}, ^7auto-kick from warnings if not cleared",
                    player.name
                ));
                player.add_spec_warning();
                player.add_warning();
            }

            let threshold = self.config.kick_spec_full_server;
            if threshold == 0 || player.name.contains(GTV_PREFIX) {
                continue;
            }
            let idle_spectator = connected > threshold
                && player.team == Team::Spectator
                && player.role < immunity::SPECTATOR
                && player.time_joined + self.config.spec_grace_secs < self.now;
            if idle_spectator {
                player.add_spec_warning();
                self.outbox.tell_plain(
                    slot,
                    format!(
                        "^1WARNING ^7[^3{}^7]: ^7You are spectator too long on full server",
                        player.spec_warnings
                    ),
                );
            } else {
                player.clear_spec_warning();
            }
        }
    }

    /// Counts or clears high-ping strikes from a status refresh
    pub fn check_pings(&mut self, registry: &mut PlayerRegistry, pings: &[PlayerPing]) {
        let max_ping = self.config.max_ping;
        if max_ping == 0 {
            return;
        }
        for &PlayerPing { slot, ping } in pings {
            let Some(player) = registry.get_mut(slot) else {
                continue;
            };
            if max_ping < ping && ping < DISCONNECTED_PING && player.role < immunity::PING {
                player.add_high_ping(ping);
                self.outbox.tell_plain(
                    slot,
                    format!(
                        "^1WARNING ^7[^3{}^7]: ^7Your ping is too high [^4{}^7]. ^3The maximum allowed ping is {}.",
                        player.high_ping_count, ping, max_ping
                    ),
                );
            } else {
                player.clear_high_ping();
            }
        }
    }

    /// Accounts a same-team kill and punishes repeat offenders.
    ///
    /// Counters always move. Warnings, forgiveness entries and the kick only
    /// apply to roles below Regular and when auto-kick is enabled.
    pub fn team_kill(&mut self, registry: &mut PlayerRegistry, killer_slot: u32, victim_slot: u32) {
        let (Some(killer), Some(victim)) = (registry.get(killer_slot), registry.get(victim_slot))
        else {
            return;
        };
        let killer_name = killer.name.clone();
        let victim_name = victim.name.clone();
        let punish = killer.role < immunity::TEAM_KILL && self.config.tk_autokick;

        if let Some(victim) = registry.get_mut(victim_slot) {
            victim.team_death();
            if punish {
                victim.killed_me.push(killer_slot);
            }
        }
        let Some(killer) = registry.get_mut(killer_slot) else {
            return;
        };
        killer.count_team_kill();
        if !punish {
            return;
        }
        killer.tk_victims.push(victim_slot);
        let offences = killer.tk_victims.len();

        self.outbox.tell(
            killer_slot,
            format!("^7Do not attack teammates, you ^1killed ^7{}", victim_name),
        );
        self.outbox.tell(
            victim_slot,
            format!("^7Type ^3!fp ^7to forgive ^3{}", killer_name),
        );

        if offences >= TEAM_KILL_LIMIT {
            info!("Player {} {} kicked for team killing", killer_slot, killer_name);
            self.outbox
                .say(format!("^7Player ^2{} ^7kicked for team killing", killer_name));
            killer.tk_victims.clear();
            for other in registry.iter_mut() {
                other.forgive_killer(killer_slot);
            }
            if let Some(killer) = registry.get(killer_slot) {
                self.add_ban_point(killer, "tk, auto-kick", TEAM_KILL_POINT_SECS);
            }
            self.outbox.kick(killer_slot);
        } else if offences >= 2 {
            self.outbox.tell(
                killer_slot,
                format!(
                    "^1WARNING ^7[^3{}^7]: ^7For team killing you will get kicked",
                    offences - 1
                ),
            );
        }
    }

    /// Records a ban point and bans when more than one is active.
    ///
    /// Returns whether a ban was issued.
    pub fn add_ban_point(&mut self, player: &Player, point_type: &str, duration_secs: u64) -> bool {
        let expires = self.now + duration_secs;
        if let Err(e) = self
            .storage
            .insert_ban_point(&player.guid, point_type, expires)
        {
            error!("Failed to store ban point for {}: {}", player.guid, e);
        }
        let active = self
            .storage
            .count_active_ban_points(&player.guid, self.now)
            .unwrap_or_else(|e| {
                error!("Failed to count ban points for {}: {}", player.guid, e);
                0
            });
        debug!(
            "Player {} has {} active ban points after '{}'",
            player.name, active, point_type
        );
        if active <= 1 {
            return false;
        }

        let ban_secs = duration_secs * BAN_POINT_MULTIPLIER;
        self.ban(player, ban_secs, point_type, None);
        self.outbox.say(format!(
            "{} ^7banned for ^1{} minutes ^7for too many warnings",
            player.name,
            ban_secs / 60
        ));
        true
    }

    /// Stores a ban record and removes the player
    pub fn ban(&mut self, player: &Player, duration_secs: u64, reason: &str, admin: Option<&str>) {
        let reason = match admin {
            Some(admin) => format!("{}, ban by {}", reason, admin),
            None => reason.to_string(),
        };
        let record = BanRecord {
            id: 0,
            guid: player.guid.clone(),
            name: player.pretty_name(),
            address: player.address.clone(),
            expires: self.now + duration_secs,
            created: self.now,
            reason: reason.clone(),
        };
        match self.storage.insert_ban(record) {
            Ok(id) => info!(
                "Banned {} ({}) for {}s: {} (ID #{})",
                player.name, player.guid, duration_secs, reason, id
            ),
            Err(e) => error!("Failed to store ban for {}: {}", player.guid, e),
        }
        self.outbox.push(Action::Ban {
            slot: player.slot,
            guid: player.guid.clone(),
            duration_secs,
            reason,
        });
    }

    /// Manual warning issued by an admin.
    ///
    /// Known reason codes expand to their text and, for `tk`, `lang`, `spam`
    /// and `racism`, add a ban point from the second warning on.
    pub fn warn(&mut self, registry: &mut PlayerRegistry, issuer_slot: u32, target_slot: u32, reason: &str) {
        let Some(issuer) = registry.get(issuer_slot) else {
            return;
        };
        let issuer_role = issuer.role;
        let issuer_name = issuer.name.clone();
        let Some(target) = registry.get_mut(target_slot) else {
            return;
        };
        if target.role >= issuer_role {
            self.outbox.tell(issuer_slot, "You cannot warn an admin");
            return;
        }
        if target.warnings >= self.config.kick_threshold() {
            self.outbox.kick(target_slot);
            self.outbox.say(format!(
                "^7Player ^2{} ^7kicked, because of too many warnings",
                target.name
            ));
            return;
        }

        target.add_warning();
        let count = target.warnings;
        let mut message = format!("^1WARNING ^7[^3{}^7]: ^2{}^7: ", count, target.name);
        match WARN_REASONS.iter().find(|(code, _)| *code == reason) {
            Some((_, text)) => message.push_str(text),
            None => message.push_str(reason),
        }

        let point = match reason {
            "tk" => Some((format!("tk, ban by {}", issuer_name), 600)),
            "lang" | "spam" | "racism" => Some((reason.to_string(), 300)),
            _ => None,
        };
        if let Some((point_type, secs)) = point.filter(|_| count > 1) {
            if let Some(target) = registry.get(target_slot) {
                self.add_ban_point(target, &point_type, secs);
            }
        }
        self.outbox.say(message);
    }

    /// Forgives the most recent unforgiven team kill against `victim_slot`
    pub fn forgive_prev(&mut self, registry: &mut PlayerRegistry, victim_slot: u32) {
        let Some(victim) = registry.get_mut(victim_slot) else {
            return;
        };
        let Some(&killer_slot) = victim.killed_me.last() else {
            self.outbox.tell(victim_slot, "No one to forgive");
            return;
        };
        victim.forgive_killer(killer_slot);
        let victim_name = victim.name.clone();

        let killer_name = match registry.get_mut(killer_slot) {
            Some(killer) => {
                killer.forget_victim(victim_slot);
                killer.name.clone()
            }
            None => return,
        };
        self.outbox.say(format!(
            "^7{} has forgiven {}'s attack",
            victim_name, killer_name
        ));
    }

    /// Forgives every team kill against `victim_slot`
    pub fn forgive_all(&mut self, registry: &mut PlayerRegistry, victim_slot: u32) {
        let Some(victim) = registry.get_mut(victim_slot) else {
            return;
        };
        let victim_name = victim.name.clone();
        let killers = victim.forgive_all();

        let mut names = Vec::new();
        for killer_slot in killers {
            if let Some(killer) = registry.get_mut(killer_slot) {
                killer.forget_victim(victim_slot);
                names.push(killer.name.clone());
            }
        }
        if names.is_empty() {
            self.outbox.tell(victim_slot, "No one to forgive");
        } else {
            self.outbox.say(format!(
                "^7{} has forgiven: {}",
                victim_name,
                names.join(", ")
            ));
        }
    }

    /// Clears warnings, forgiveness lists and active ban points of a player
    pub fn clear_warnings(&mut self, registry: &mut PlayerRegistry, slot: u32) {
        let Some(player) = registry.get_mut(slot) else {
            return;
        };
        player.clear_warnings();
        if let Err(e) = self.storage.clear_ban_points(&player.guid, self.now) {
            error!("Failed to clear ban points for {}: {}", player.guid, e);
        }
        self.outbox
            .say(format!("^1All warnings cleared for ^2{}", player.name));
    }
}
