//! Slot-indexed collection of connected players.
//!
//! The registry owns every [`Player`], including the World pseudo-player
//! which is inserted on construction and never removed. Creating a player
//! runs the connection checks against storage: active bans, profile and
//! alias history, registered stats and country lookup.

use crate::balance::TeamCounts;
use crate::geo::GeoLookup;
use crate::outbox::Outbox;
use crate::player::Player;
use crate::storage::Storage;
use log::{debug, error, info};
use shared::{Identity, Team, WORLD_SLOT};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Source ports used by known cheat clients
const CHEATER_PORTS: [u16; 2] = [1337, 1024];
/// Guid fragment of a known cheat client
const CHEATER_GUID: &str = "KEMFEW";
/// Guid fragments that can never belong to a real client
const INVALID_GUIDS: [&str; 2] = ["WORLD", "UNKNOWN"];

pub struct PlayerRegistry {
    players: HashMap<u32, Player>,
}

impl Default for PlayerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerRegistry {
    pub fn new() -> Self {
        let mut players = HashMap::new();
        players.insert(WORLD_SLOT, Player::world());
        Self { players }
    }

    /// Creates or updates the player in `slot`.
    ///
    /// Returns the player and whether it was created by this call. A player
    /// flagged as banned is kicked on every identity event.
    pub fn upsert(
        &mut self,
        slot: u32,
        identity: &Identity,
        storage: &mut dyn Storage,
        geo: &dyn GeoLookup,
        outbox: &mut Outbox,
        now: u64,
    ) -> (&mut Player, bool) {
        let (player, created) = match self.players.entry(slot) {
            Entry::Occupied(entry) => (entry.into_mut(), false),
            Entry::Vacant(entry) => (
                entry.insert(connect(slot, identity, storage, geo, outbox, now)),
                true,
            ),
        };
        if player.guid != identity.guid {
            debug!("Player {} changed guid to {}", slot, identity.guid);
            player.guid = identity.guid.clone();
        }
        if player.name != identity.name {
            player.set_name(&identity.name);
        }
        if player.banned {
            outbox.kick(slot);
        }
        (player, created)
    }

    pub fn get(&self, slot: u32) -> Option<&Player> {
        self.players.get(&slot)
    }

    pub fn get_mut(&mut self, slot: u32) -> Option<&mut Player> {
        self.players.get_mut(&slot)
    }

    pub fn contains(&self, slot: u32) -> bool {
        self.players.contains_key(&slot)
    }

    /// Flushes the player's stats and deletes the slot.
    ///
    /// Forgiveness entries pointing at the slot are dropped from every
    /// remaining player, since slots are reused by the next connection.
    pub fn remove(&mut self, slot: u32, storage: &mut dyn Storage) -> Option<Player> {
        if slot == WORLD_SLOT {
            return None;
        }
        let player = self.players.remove(&slot)?;
        if let Err(e) = storage.flush_round_stats(&player) {
            error!("Failed to store stats of {}: {}", player.name, e);
        }
        for other in self.players.values_mut() {
            other.forget_victim(slot);
            other.forgive_killer(slot);
        }
        Some(player)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.values_mut()
    }

    /// Occupied slots in ascending order, World included
    pub fn slots(&self) -> Vec<u32> {
        let mut slots: Vec<u32> = self.players.keys().copied().collect();
        slots.sort_unstable();
        slots
    }

    /// Number of real players, World excluded
    pub fn connected_count(&self) -> usize {
        self.players.values().filter(|p| !p.is_world()).count()
    }

    pub fn team_counts(&self) -> TeamCounts {
        let mut counts = TeamCounts::default();
        for player in self.players.values().filter(|p| !p.is_world()) {
            match player.team {
                Team::Red => counts.red += 1,
                Team::Blue => counts.blue += 1,
                Team::Spectator => counts.spectator += 1,
                Team::Green => {}
            }
        }
        counts
    }

    pub fn reset_round(&mut self) {
        for player in self.players.values_mut() {
            player.reset_round();
        }
    }

    pub fn reset_flag_stats(&mut self) {
        for player in self.players.values_mut() {
            player.reset_flag_stats();
        }
    }

    /// Resolves a command target by slot number or name.
    ///
    /// An exact (case-insensitive) name or slot match wins; otherwise the
    /// argument must be a substring of exactly one name. The error is the
    /// message to show the issuer.
    pub fn find(&self, user: &str) -> Result<u32, String> {
        let needle = user.to_uppercase();
        let mut matches = Vec::new();
        for slot in self.slots() {
            let Some(player) = self.players.get(&slot) else {
                continue;
            };
            if player.is_world() {
                continue;
            }
            let name = player.name.to_uppercase();
            if name == needle || user == slot.to_string() {
                return Ok(slot);
            }
            if name.contains(&needle) {
                matches.push(player);
            }
        }
        match matches.as_slice() {
            [] => Err("No Player found".to_string()),
            [player] => Ok(player.slot),
            players => {
                let names: Vec<String> = players
                    .iter()
                    .map(|p| format!("^3{} [^2{}^3]", p.name, p.slot))
                    .collect();
                Err(format!("^7Players matching {}: {}", user, names.join(", ")))
            }
        }
    }
}

/// Builds a fresh player and runs the storage checks for it
fn connect(
    slot: u32,
    identity: &Identity,
    storage: &mut dyn Storage,
    geo: &dyn GeoLookup,
    outbox: &mut Outbox,
    now: u64,
) -> Player {
    let mut player = Player::new(slot, &identity.address, &identity.guid, &identity.name, now);

    let ban = storage
        .active_ban(&player.guid, &player.address, now)
        .unwrap_or_else(|e| {
            error!("Ban lookup failed for {}: {}", player.guid, e);
            None
        });
    match ban {
        Some(ban) => {
            info!(
                "Player {} {} is banned until {} (ID #{})",
                slot, player.name, ban.expires, ban.id
            );
            outbox.say(format!("^7{} ^1banned ^7(ID #{})", player.name, ban.id));
            player.banned = true;
        }
        None => {
            if let Some(country) = geo.country(&player.address) {
                outbox.say(format!("^7{} ^7connected from {}", player.name, country));
                player.country = Some(country);
            }
        }
    }

    let pretty = player.pretty_name();
    player.aliases = storage
        .upsert_player_profile(&player.guid, &pretty, &player.address, now)
        .unwrap_or_else(|e| {
            error!("Profile update failed for {}: {}", player.guid, e);
            vec![pretty.clone()]
        });

    match storage.load_stats(&player.guid, &pretty, now) {
        Ok(Some(record)) => {
            player.registered = true;
            player.role = record.role;
            player.num_played = record.num_played;
            player.last_visit = Some(record.last_played);
            player.lifetime = record.stats;
        }
        Ok(None) => {}
        Err(e) => error!("Stats lookup failed for {}: {}", player.guid, e),
    }

    info!(
        "Player {} {} connected from {} (guid {})",
        slot, player.name, player.address, player.guid
    );
    player
}

/// Kicks for identity problems, cheat ports and blacklisted guids
pub fn screen_identity(slot: u32, identity: &Identity, outbox: &mut Outbox) {
    for problem in &identity.problems {
        outbox.say(problem.message());
        outbox.kick(slot);
    }

    if identity
        .port
        .is_some_and(|port| CHEATER_PORTS.contains(&port))
    {
        outbox.say(format!(
            "Cheater Port detected for {} -> Player kicked",
            identity.name
        ));
        outbox.kick(slot);
    }

    let guid = identity.guid.to_uppercase();
    if guid.contains(CHEATER_GUID) {
        outbox.say(format!(
            "Cheater GUID detected for {} -> Player kicked",
            identity.name
        ));
        outbox.kick(slot);
    }
    if INVALID_GUIDS.iter().any(|marker| guid.contains(marker)) {
        outbox.say(format!(
            "Invalid GUID detected for {} -> Player kicked",
            identity.name
        ));
        outbox.kick(slot);
    }
}
