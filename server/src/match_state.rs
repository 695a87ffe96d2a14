//! Match phase, game-type classification and map rotation.

use log::debug;
use shared::tables;
use shared::{GameInfo, GameKind, ModVersion};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Warmup,
    Live,
    Intermission,
}

#[derive(Debug, Clone)]
pub struct MatchState {
    pub phase: Phase,
    /// Set only by InitGame, constant until the next one
    pub kind: GameKind,
    pub game_type: Option<u32>,
    pub mod_version: ModVersion,
    pub map_name: Option<String>,
    pub next_map: Option<String>,
    pub rotation: Vec<String>,
    /// Cleared while a Team Survivor round is running
    pub allow_balance: bool,
    /// A balance was requested mid-round and waits for the round end
    pub defer_balance: bool,
}

impl Default for MatchState {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Warmup,
            kind: GameKind::default(),
            game_type: None,
            mod_version: ModVersion::default(),
            map_name: None,
            next_map: None,
            rotation: Vec::new(),
            allow_balance: true,
            defer_balance: false,
        }
    }

    /// Applies the settings of an InitGame line
    pub fn classify(&mut self, info: &GameInfo) {
        self.kind = info.kind();
        self.game_type = info.game_type;
        self.mod_version = info.mod_version;
        if let Some(map) = &info.map_name {
            self.map_name = Some(map.clone());
        }
        debug!(
            "Game classified as {:?} ({:?}) on {}",
            self.kind,
            self.mod_version,
            self.map_name.as_deref().unwrap_or("unknown map")
        );
    }

    pub fn enter(&mut self, phase: Phase) {
        if self.phase != phase {
            debug!("Match phase {:?} -> {:?}", self.phase, phase);
            self.phase = phase;
        }
    }

    pub fn set_rotation(&mut self, maps: Vec<String>) {
        self.rotation = maps;
        self.refresh_next_map();
    }

    /// Next map follows the current one in the rotation and wraps around.
    ///
    /// A current map missing from the rotation is followed by the first
    /// entry; without a rotation the current map repeats.
    pub fn refresh_next_map(&mut self) {
        self.next_map = match &self.map_name {
            _ if self.rotation.is_empty() => self.map_name.clone(),
            Some(current) => match self.rotation.iter().position(|map| map == current) {
                Some(index) => self.rotation.get((index + 1) % self.rotation.len()).cloned(),
                None => self.rotation.first().cloned(),
            },
            None => self.rotation.first().cloned(),
        };
    }

    pub fn tracks_team_kills(&self) -> bool {
        self.kind.tracks_team_kills()
    }

    pub fn is_ctf(&self) -> bool {
        self.kind == GameKind::CaptureTheFlag
    }

    pub fn is_team_survivor(&self) -> bool {
        self.kind == GameKind::TeamSurvivor
    }

    pub fn death_cause(&self, code: u32) -> Option<&'static str> {
        tables::death_cause(self.mod_version, code)
    }

    pub fn hit_location(&self, code: u32) -> Option<&'static str> {
        tables::hit_location(self.mod_version, code)
    }

    pub fn hit_item(&self, code: u32) -> Option<&'static str> {
        tables::hit_item(self.mod_version, code)
    }
}

/// Map names from a map cycle file.
///
/// Blank lines, comments and the brace blocks of per-map settings are
/// skipped.
pub fn parse_mapcycle(text: &str) -> Vec<String> {
    let mut maps = Vec::new();
    let mut depth = 0usize;
    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with("//") {
            continue;
        }
        if line.starts_with('{') {
            depth += 1;
            continue;
        }
        if line.starts_with('}') {
            depth = depth.saturating_sub(1);
            continue;
        }
        if depth == 0 {
            maps.push(line.to_string());
        }
    }
    maps
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rotation() -> Vec<String> {
        vec!["ut4_abbey".into(), "ut4_casa".into(), "ut4_turnpike".into()]
    }

    #[test]
    fn test_classify_from_init_game() {
        let mut state = MatchState::new();
        state.classify(&GameInfo {
            game_type: Some(7),
            mod_version: ModVersion::Urt41,
            map_name: Some("ut4_casa".into()),
        });
        assert!(state.is_ctf());
        assert!(state.tracks_team_kills());
        assert_eq!(state.death_cause(33), Some("UT_MOD_BOMBED"));

        state.classify(&GameInfo {
            game_type: Some(0),
            ..GameInfo::default()
        });
        assert_eq!(state.kind, GameKind::FreeForAll);
        assert!(!state.tracks_team_kills());
        assert_eq!(state.map_name.as_deref(), Some("ut4_casa"));
    }

    #[test]
    fn test_next_map_wraps() {
        let mut state = MatchState::new();
        state.map_name = Some("ut4_turnpike".into());
        state.set_rotation(rotation());
        assert_eq!(state.next_map.as_deref(), Some("ut4_abbey"));

        state.map_name = Some("ut4_abbey".into());
        state.refresh_next_map();
        assert_eq!(state.next_map.as_deref(), Some("ut4_casa"));
    }

    #[test]
    fn test_next_map_fallbacks() {
        let mut state = MatchState::new();
        state.map_name = Some("ut4_custom".into());
        state.refresh_next_map();
        assert_eq!(state.next_map.as_deref(), Some("ut4_custom"));

        state.set_rotation(rotation());
        assert_eq!(state.next_map.as_deref(), Some("ut4_abbey"));
    }

    #[test]
    fn test_parse_mapcycle() {
        let text = "ut4_abbey\n// comment\n\nut4_casa\n{\n  g_gear \"0\"\n}\nut4_turnpike\n";
        assert_eq!(parse_mapcycle(text), rotation());
    }
}
