//! Persistence collaborator: bans, ban points, profiles and lifetime stats.
//!
//! Game logic talks to the [`Storage`] trait only. [`MemoryStorage`] keeps
//! everything in maps and backs the tests; [`FileStorage`] wraps it and
//! writes a `bincode` snapshot after every mutation.
//!
//! Expired bans and ban points are dropped before each snapshot, measured
//! against the newest timestamp the store has been handed.
//!
//! A failed snapshot write is logged and leaves the store dirty. The
//! in-memory state stays authoritative and [`Storage::sync`] retries the
//! write, so a full disk never stops the log loop.

use crate::player::{LifetimeStats, Player, MAX_ALIASES};
use log::{debug, error};
use serde::{Deserialize, Serialize};
use shared::Role;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot encoding error: {0}")]
    Encode(#[from] bincode::Error),
}

/// A ban is active while `now < expires`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanRecord {
    /// Assigned by the store on insert
    pub id: u64,
    pub guid: String,
    pub name: String,
    pub address: String,
    pub expires: u64,
    pub created: u64,
    pub reason: String,
}

impl BanRecord {
    pub fn is_active(&self, now: u64) -> bool {
        now < self.expires
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanPoint {
    pub guid: String,
    pub point_type: String,
    pub expires: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub name: String,
    pub address: String,
    pub last_joined: u64,
    pub aliases: Vec<String>,
}

/// Stats row of a registered player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsRecord {
    pub name: String,
    pub role: Role,
    pub first_seen: u64,
    pub last_played: u64,
    pub num_played: u32,
    pub rounds: u32,
    pub ratio: f64,
    pub stats: LifetimeStats,
}

pub trait Storage: Send + Sync {
    /// Newest ban matching the guid or the address that is still active
    fn active_ban(&self, guid: &str, address: &str, now: u64)
        -> Result<Option<BanRecord>, StorageError>;

    /// Stores the ban and returns its id; `record.id` is ignored
    fn insert_ban(&mut self, record: BanRecord) -> Result<u64, StorageError>;

    /// Returns whether a ban with this id existed
    fn delete_ban(&mut self, id: u64) -> Result<bool, StorageError>;

    fn insert_ban_point(
        &mut self,
        guid: &str,
        point_type: &str,
        expires: u64,
    ) -> Result<(), StorageError>;

    fn count_active_ban_points(&self, guid: &str, now: u64) -> Result<usize, StorageError>;

    /// Deletes the points of `guid` that are still active
    fn clear_ban_points(&mut self, guid: &str, now: u64) -> Result<(), StorageError>;

    /// Records a visit and returns the alias history including `name`
    fn upsert_player_profile(
        &mut self,
        guid: &str,
        name: &str,
        address: &str,
        now: u64,
    ) -> Result<Vec<String>, StorageError>;

    /// Role of a registered guid, `None` when unregistered
    fn is_registered(&self, guid: &str) -> Result<Option<Role>, StorageError>;

    /// Stats of a registered guid; stamps the visit and bumps the play count
    fn load_stats(
        &mut self,
        guid: &str,
        name: &str,
        now: u64,
    ) -> Result<Option<StatsRecord>, StorageError>;

    fn register_player(
        &mut self,
        guid: &str,
        name: &str,
        role: Role,
        now: u64,
    ) -> Result<(), StorageError>;

    fn update_role(&mut self, guid: &str, role: Role) -> Result<(), StorageError>;

    /// Writes the lifetime counters of a registered player
    fn flush_round_stats(&mut self, player: &Player) -> Result<(), StorageError>;

    /// Retries pending writes
    fn sync(&mut self) -> Result<(), StorageError> {
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MemoryStorage {
    bans: Vec<BanRecord>,
    next_ban_id: u64,
    ban_points: Vec<BanPoint>,
    profiles: HashMap<String, PlayerProfile>,
    stats: HashMap<String, StatsRecord>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bans(&self) -> &[BanRecord] {
        &self.bans
    }

    pub fn ban_points(&self) -> &[BanPoint] {
        &self.ban_points
    }

    pub fn stats(&self, guid: &str) -> Option<&StatsRecord> {
        self.stats.get(guid)
    }

    /// Drops bans and ban points no longer active at `now`, returns how many
    pub fn prune_expired(&mut self, now: u64) -> usize {
        let before = self.bans.len() + self.ban_points.len();
        self.bans.retain(|ban| ban.is_active(now));
        self.ban_points.retain(|point| point.expires > now);
        before - self.bans.len() - self.ban_points.len()
    }
}

impl Storage for MemoryStorage {
    fn active_ban(
        &self,
        guid: &str,
        address: &str,
        now: u64,
    ) -> Result<Option<BanRecord>, StorageError> {
        Ok(self
            .bans
            .iter()
            .rev()
            .find(|ban| ban.is_active(now) && (ban.guid == guid || ban.address == address))
            .cloned())
    }

    fn insert_ban(&mut self, mut record: BanRecord) -> Result<u64, StorageError> {
        self.next_ban_id += 1;
        record.id = self.next_ban_id;
        self.bans.push(record);
        Ok(self.next_ban_id)
    }

    fn delete_ban(&mut self, id: u64) -> Result<bool, StorageError> {
        let before = self.bans.len();
        self.bans.retain(|ban| ban.id != id);
        Ok(self.bans.len() != before)
    }

    fn insert_ban_point(
        &mut self,
        guid: &str,
        point_type: &str,
        expires: u64,
    ) -> Result<(), StorageError> {
        self.ban_points.push(BanPoint {
            guid: guid.to_string(),
            point_type: point_type.to_string(),
            expires,
        });
        Ok(())
    }

    fn count_active_ban_points(&self, guid: &str, now: u64) -> Result<usize, StorageError> {
        Ok(self
            .ban_points
            .iter()
            .filter(|point| point.guid == guid && point.expires > now)
            .count())
    }

    fn clear_ban_points(&mut self, guid: &str, now: u64) -> Result<(), StorageError> {
        self.ban_points
            .retain(|point| !(point.guid == guid && point.expires > now));
        Ok(())
    }

    fn upsert_player_profile(
        &mut self,
        guid: &str,
        name: &str,
        address: &str,
        now: u64,
    ) -> Result<Vec<String>, StorageError> {
        let profile = self
            .profiles
            .entry(guid.to_string())
            .or_insert_with(|| PlayerProfile {
                name: name.to_string(),
                address: address.to_string(),
                last_joined: now,
                aliases: Vec::new(),
            });
        profile.name = name.to_string();
        profile.address = address.to_string();
        profile.last_joined = now;
        if !profile.aliases.iter().any(|alias| alias == name) && profile.aliases.len() < MAX_ALIASES
        {
            profile.aliases.push(name.to_string());
        }
        Ok(profile.aliases.clone())
    }

    fn is_registered(&self, guid: &str) -> Result<Option<Role>, StorageError> {
        Ok(self.stats.get(guid).map(|record| record.role))
    }

    fn load_stats(
        &mut self,
        guid: &str,
        name: &str,
        now: u64,
    ) -> Result<Option<StatsRecord>, StorageError> {
        let Some(record) = self.stats.get_mut(guid) else {
            return Ok(None);
        };
        // the caller sees the previous visit
        let snapshot = record.clone();
        record.name = name.to_string();
        record.last_played = now;
        record.num_played += 1;
        Ok(Some(snapshot))
    }

    fn register_player(
        &mut self,
        guid: &str,
        name: &str,
        role: Role,
        now: u64,
    ) -> Result<(), StorageError> {
        self.stats
            .entry(guid.to_string())
            .or_insert_with(|| StatsRecord {
                name: name.to_string(),
                role,
                first_seen: now,
                last_played: now,
                num_played: 1,
                rounds: 0,
                ratio: 0.0,
                stats: LifetimeStats::default(),
            });
        Ok(())
    }

    fn update_role(&mut self, guid: &str, role: Role) -> Result<(), StorageError> {
        if let Some(record) = self.stats.get_mut(guid) {
            record.role = role;
        }
        Ok(())
    }

    fn flush_round_stats(&mut self, player: &Player) -> Result<(), StorageError> {
        if !player.registered {
            return Ok(());
        }
        if let Some(record) = self.stats.get_mut(&player.guid) {
            record.stats = player.lifetime;
            record.ratio = player.lifetime.ratio();
            record.rounds += 1;
        }
        Ok(())
    }
}

/// [`MemoryStorage`] persisted to a single snapshot file
pub struct FileStorage {
    path: PathBuf,
    data: MemoryStorage,
    dirty: bool,
    /// Newest unix time seen in any call
    clock: u64,
}

impl FileStorage {
    /// Loads the snapshot at `path`, starting empty if there is none
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let bytes = fs::read(&path)?;
            bincode::deserialize(&bytes)?
        } else {
            MemoryStorage::default()
        };
        debug!(
            "Loaded storage from {} ({} bans, {} profiles)",
            path.display(),
            data.bans.len(),
            data.profiles.len()
        );
        Ok(Self {
            path,
            data,
            dirty: false,
            clock: 0,
        })
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn observe(&mut self, now: u64) {
        self.clock = self.clock.max(now);
    }

    fn write_snapshot(&mut self) -> Result<(), StorageError> {
        let pruned = self.data.prune_expired(self.clock);
        if pruned > 0 {
            debug!("Pruned {} expired bans and ban points", pruned);
        }
        let bytes = bincode::serialize(&self.data)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn persist(&mut self) {
        match self.write_snapshot() {
            Ok(()) => self.dirty = false,
            Err(e) => {
                error!("Failed to write storage snapshot {}: {}", self.path.display(), e);
                self.dirty = true;
            }
        }
    }

    /// Runs a mutation on the in-memory data and persists it
    fn mutate<T>(
        &mut self,
        f: impl FnOnce(&mut MemoryStorage) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let value = f(&mut self.data)?;
        self.persist();
        Ok(value)
    }
}

impl Storage for FileStorage {
    fn active_ban(
        &self,
        guid: &str,
        address: &str,
        now: u64,
    ) -> Result<Option<BanRecord>, StorageError> {
        self.data.active_ban(guid, address, now)
    }

    fn insert_ban(&mut self, record: BanRecord) -> Result<u64, StorageError> {
        self.observe(record.created);
        self.mutate(|data| data.insert_ban(record))
    }

    fn delete_ban(&mut self, id: u64) -> Result<bool, StorageError> {
        self.mutate(|data| data.delete_ban(id))
    }

    fn insert_ban_point(
        &mut self,
        guid: &str,
        point_type: &str,
        expires: u64,
    ) -> Result<(), StorageError> {
        self.mutate(|data| data.insert_ban_point(guid, point_type, expires))
    }

    fn count_active_ban_points(&self, guid: &str, now: u64) -> Result<usize, StorageError> {
        self.data.count_active_ban_points(guid, now)
    }

    fn clear_ban_points(&mut self, guid: &str, now: u64) -> Result<(), StorageError> {
        self.observe(now);
        self.mutate(|data| data.clear_ban_points(guid, now))
    }

    fn upsert_player_profile(
        &mut self,
        guid: &str,
        name: &str,
        address: &str,
        now: u64,
    ) -> Result<Vec<String>, StorageError> {
        self.observe(now);
        self.mutate(|data| data.upsert_player_profile(guid, name, address, now))
    }

    fn is_registered(&self, guid: &str) -> Result<Option<Role>, StorageError> {
        self.data.is_registered(guid)
    }

    fn load_stats(
        &mut self,
        guid: &str,
        name: &str,
        now: u64,
    ) -> Result<Option<StatsRecord>, StorageError> {
        self.observe(now);
        self.mutate(|data| data.load_stats(guid, name, now))
    }

    fn register_player(
        &mut self,
        guid: &str,
        name: &str,
        role: Role,
        now: u64,
    ) -> Result<(), StorageError> {
        self.observe(now);
        self.mutate(|data| data.register_player(guid, name, role, now))
    }

    fn update_role(&mut self, guid: &str, role: Role) -> Result<(), StorageError> {
        self.mutate(|data| data.update_role(guid, role))
    }

    fn flush_round_stats(&mut self, player: &Player) -> Result<(), StorageError> {
        self.mutate(|data| data.flush_round_stats(player))
    }

    fn sync(&mut self) -> Result<(), StorageError> {
        if !self.dirty {
            return Ok(());
        }
        self.write_snapshot()?;
        self.dirty = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ban(guid: &str, address: &str, expires: u64) -> BanRecord {
        BanRecord {
            id: 0,
            guid: guid.to_string(),
            name: "Bob".to_string(),
            address: address.to_string(),
            expires,
            created: 100,
            reason: "tk".to_string(),
        }
    }

    #[test]
    fn test_active_ban_matches_guid_or_address() {
        let mut storage = MemoryStorage::new();
        let id = storage.insert_ban(ban("G1", "1.1.1.1", 500)).unwrap();
        assert_eq!(id, 1);

        assert!(storage.active_ban("G1", "9.9.9.9", 200).unwrap().is_some());
        assert!(storage.active_ban("G2", "1.1.1.1", 200).unwrap().is_some());
        assert!(storage.active_ban("G2", "2.2.2.2", 200).unwrap().is_none());
        // expiry is exclusive
        assert!(storage.active_ban("G1", "1.1.1.1", 500).unwrap().is_none());
    }

    #[test]
    fn test_delete_ban() {
        let mut storage = MemoryStorage::new();
        let id = storage.insert_ban(ban("G1", "1.1.1.1", 500)).unwrap();
        assert!(storage.delete_ban(id).unwrap());
        assert!(!storage.delete_ban(id).unwrap());
    }

    #[test]
    fn test_ban_points_expire_passively() {
        let mut storage = MemoryStorage::new();
        storage.insert_ban_point("G1", "tk", 1_000).unwrap();
        storage.insert_ban_point("G1", "spam", 2_000).unwrap();
        storage.insert_ban_point("G2", "spam", 2_000).unwrap();

        assert_eq!(storage.count_active_ban_points("G1", 500).unwrap(), 2);
        assert_eq!(storage.count_active_ban_points("G1", 1_500).unwrap(), 1);

        storage.clear_ban_points("G1", 500).unwrap();
        assert_eq!(storage.count_active_ban_points("G1", 500).unwrap(), 0);
        assert_eq!(storage.count_active_ban_points("G2", 500).unwrap(), 1);
    }

    #[test]
    fn test_alias_history_is_capped() {
        let mut storage = MemoryStorage::new();
        for i in 0..20 {
            storage
                .upsert_player_profile("G1", &format!("name{}", i), "1.1.1.1", i)
                .unwrap();
        }
        let aliases = storage
            .upsert_player_profile("G1", "name0", "1.1.1.1", 30)
            .unwrap();
        assert_eq!(aliases.len(), MAX_ALIASES);
        assert_eq!(aliases[0], "name0");
    }

    #[test]
    fn test_registration_and_stats() {
        let mut storage = MemoryStorage::new();
        assert_eq!(storage.is_registered("G1").unwrap(), None);
        assert!(storage.load_stats("G1", "Bob", 10).unwrap().is_none());

        storage.register_player("G1", "Bob", Role::User, 10).unwrap();
        assert_eq!(storage.is_registered("G1").unwrap(), Some(Role::User));

        storage.update_role("G1", Role::Moderator).unwrap();
        let first = storage.load_stats("G1", "Bob", 20).unwrap().unwrap();
        assert_eq!(first.role, Role::Moderator);
        assert_eq!(first.last_played, 10);
        let second = storage.load_stats("G1", "Bob", 30).unwrap().unwrap();
        assert_eq!(second.last_played, 20);
        assert_eq!(second.num_played, first.num_played + 1);
    }

    #[test]
    fn test_flush_round_stats_only_for_registered() {
        let mut storage = MemoryStorage::new();
        storage.register_player("G1", "Bob", Role::User, 10).unwrap();

        let mut player = Player::new(1, "1.1.1.1", "G1", "Bob", 10);
        player.kill();
        storage.flush_round_stats(&player).unwrap();
        assert_eq!(storage.stats("G1").unwrap().stats.kills, 0);

        player.registered = true;
        storage.flush_round_stats(&player).unwrap();
        let record = storage.stats("G1").unwrap();
        assert_eq!(record.stats.kills, 1);
        assert_eq!(record.rounds, 1);
    }

    #[test]
    fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.db");

        {
            let mut storage = FileStorage::open(&path).unwrap();
            storage.insert_ban(ban("G1", "1.1.1.1", 500)).unwrap();
            storage.register_player("G2", "Alice", Role::Admin, 5).unwrap();
            assert!(!storage.is_dirty());
        }

        let storage = FileStorage::open(&path).unwrap();
        assert!(storage.active_ban("G1", "", 100).unwrap().is_some());
        assert_eq!(storage.is_registered("G2").unwrap(), Some(Role::Admin));
    }

    #[test]
    fn test_file_storage_prunes_expired_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.db");

        {
            let mut storage = FileStorage::open(&path).unwrap();
            storage.insert_ban(ban("G1", "1.1.1.1", 500)).unwrap();
            storage.insert_ban(ban("G2", "2.2.2.2", 5_000)).unwrap();
            storage.insert_ban_point("G3", "tk", 900).unwrap();
            storage.insert_ban_point("G3", "spam", 3_000).unwrap();
            storage
                .upsert_player_profile("G4", "Alice", "4.4.4.4", 1_000)
                .unwrap();
        }

        let bytes = fs::read(&path).unwrap();
        let snapshot: MemoryStorage = bincode::deserialize(&bytes).unwrap();
        assert_eq!(snapshot.bans().len(), 1);
        assert_eq!(snapshot.bans()[0].guid, "G2");
        assert_eq!(snapshot.ban_points().len(), 1);
        assert_eq!(snapshot.ban_points()[0].point_type, "spam");

        // ids keep counting past pruned bans
        let mut storage = FileStorage::open(&path).unwrap();
        assert_eq!(storage.insert_ban(ban("G5", "5.5.5.5", 9_000)).unwrap(), 3);
    }

    #[test]
    fn test_file_storage_stays_dirty_on_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("warden.db");

        let mut storage = FileStorage::open(&path).unwrap();
        storage.insert_ban_point("G1", "tk", 900).unwrap();
        assert!(storage.is_dirty());
        assert_eq!(storage.count_active_ban_points("G1", 0).unwrap(), 1);
        assert!(storage.sync().is_err());

        fs::create_dir_all(dir.path().join("missing")).unwrap();
        storage.sync().unwrap();
        assert!(!storage.is_dirty());
        assert!(path.exists());
    }
}
