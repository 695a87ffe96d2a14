//! Game log events and the line parser.
//!
//! A server log line looks like `  3:27 Kill: 2 4 19: Alice killed Bob by UT_MOD_LR300`:
//! an optional `minutes:seconds` stamp, a category token terminated by `:`
//! and a category specific payload. [`Event::parse`] turns such a line into a
//! typed [`Event`], returning `None` for unknown categories and for payloads
//! that do not match their schema. Dropping a line is never an error for the
//! caller; the log keeps flowing.

use crate::{GameKind, ModVersion, Team, NULL_ADDRESS};
use std::collections::HashMap;

/// Log categories the bot reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    InitGame,
    Warmup,
    InitRound,
    ShutdownGame,
    Exit,
    SurvivorWinner,
    ClientUserinfo,
    ClientUserinfoChanged,
    ClientBegin,
    ClientDisconnect,
    Kill,
    Hit,
    Flag,
    Say,
}

impl Category {
    pub fn from_token(token: &str) -> Option<Self> {
        let category = match token {
            "InitGame" => Category::InitGame,
            "Warmup" => Category::Warmup,
            "InitRound" => Category::InitRound,
            "ShutdownGame" => Category::ShutdownGame,
            "Exit" => Category::Exit,
            "SurvivorWinner" => Category::SurvivorWinner,
            "ClientUserinfo" => Category::ClientUserinfo,
            "ClientUserinfoChanged" => Category::ClientUserinfoChanged,
            "ClientBegin" => Category::ClientBegin,
            "ClientDisconnect" => Category::ClientDisconnect,
            "Kill" => Category::Kill,
            "Hit" => Category::Hit,
            "Flag" => Category::Flag,
            "say" => Category::Say,
            _ => return None,
        };
        Some(category)
    }
}

/// Settings announced by an InitGame line
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GameInfo {
    pub game_type: Option<u32>,
    pub mod_version: ModVersion,
    pub map_name: Option<String>,
}

impl GameInfo {
    pub fn kind(&self) -> GameKind {
        self.game_type.map(GameKind::from_code).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagAction {
    Dropped,
    Returned,
    Captured,
}

/// Raw identity keys from a `ClientUserinfo` line
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Userinfo {
    pub guid: Option<String>,
    pub name: Option<String>,
    /// `address:port` as sent by the client
    pub ip: Option<String>,
    /// Server-side bots announce a `skill` key instead of a guid
    pub is_bot: bool,
    pub challenge: bool,
}

/// Reasons a connecting client has to be removed right away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityProblem {
    InvalidGuid,
    InvalidName,
}

impl IdentityProblem {
    pub fn message(self) -> &'static str {
        match self {
            IdentityProblem::InvalidGuid => "Player with invalid GUID kicked",
            IdentityProblem::InvalidName => "Player with invalid name kicked",
        }
    }
}

/// Userinfo with every missing key replaced by its sentinel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub guid: String,
    pub name: String,
    pub address: String,
    pub port: Option<u16>,
    pub problems: Vec<IdentityProblem>,
}

impl Userinfo {
    pub fn from_values(values: &HashMap<String, String>) -> Self {
        Self {
            guid: values.get("cl_guid").cloned(),
            name: values.get("name").cloned(),
            ip: values.get("ip").cloned(),
            is_bot: values.contains_key("skill"),
            challenge: values.contains_key("challenge"),
        }
    }

    /// Fills in sentinel values for missing keys.
    ///
    /// Bots without a guid get `BOT<slot>`; humans without a guid get
    /// `None` and a kick, as do humans without a name. A missing address
    /// becomes the null address.
    pub fn resolve(&self, slot: u32) -> Identity {
        let mut problems = Vec::new();

        let guid = match &self.guid {
            Some(guid) => guid.clone(),
            None if self.is_bot => format!("BOT{}", slot),
            None => {
                problems.push(IdentityProblem::InvalidGuid);
                "None".to_string()
            }
        };

        let name = match &self.name {
            Some(name) => strip_whitespace(name),
            None => {
                problems.push(IdentityProblem::InvalidName);
                "UnnamedPlayer".to_string()
            }
        };

        let (address, port) = match self.ip.as_deref() {
            Some(ip) => match ip.split_once(':') {
                Some((address, port)) => (address.trim().to_string(), port.trim().parse().ok()),
                None => (ip.trim().to_string(), None),
            },
            None => (NULL_ADDRESS.to_string(), None),
        };

        Identity {
            guid,
            name,
            address,
            port,
            problems,
        }
    }
}

/// A parsed log event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    InitGame(GameInfo),
    Warmup,
    InitRound,
    ShutdownGame,
    Exit,
    SurvivorWinner(String),
    ClientUserinfo {
        slot: u32,
        info: Userinfo,
    },
    ClientUserinfoChanged {
        slot: u32,
        name: Option<String>,
        team: Option<Team>,
    },
    ClientBegin {
        slot: u32,
    },
    ClientDisconnect {
        slot: u32,
    },
    Kill {
        killer: u32,
        victim: u32,
        cause: u32,
        /// Killer name was `<non-client>`: the world did it
        world_kill: bool,
    },
    Hit {
        victim: u32,
        attacker: u32,
        location: u32,
        item: u32,
    },
    Flag {
        slot: u32,
        action: FlagAction,
    },
    Say {
        slot: u32,
        name: String,
        message: String,
    },
}

impl Event {
    pub fn parse(line: &str) -> Option<Event> {
        let (token, payload) = split_line(line)?;
        let category = Category::from_token(token)?;
        Self::parse_payload(category, payload)
    }

    fn parse_payload(category: Category, payload: &str) -> Option<Event> {
        match category {
            Category::InitGame => Some(Event::InitGame(parse_game_info(payload))),
            Category::Warmup => Some(Event::Warmup),
            Category::InitRound => Some(Event::InitRound),
            Category::ShutdownGame => Some(Event::ShutdownGame),
            Category::Exit => Some(Event::Exit),
            Category::SurvivorWinner => Some(Event::SurvivorWinner(payload.to_string())),
            Category::ClientUserinfo => {
                let (slot, rest) = slot_prefix(payload)?;
                let info = Userinfo::from_values(&explode(rest));
                Some(Event::ClientUserinfo { slot, info })
            }
            Category::ClientUserinfoChanged => {
                let (slot, rest) = slot_prefix(payload)?;
                let values = explode(rest);
                let team = values
                    .get("t")
                    .and_then(|code| code.parse().ok())
                    .map(Team::from_code);
                let name = values.get("n").map(|name| strip_whitespace(name));
                Some(Event::ClientUserinfoChanged { slot, name, team })
            }
            Category::ClientBegin => {
                let (slot, _) = slot_prefix(payload)?;
                Some(Event::ClientBegin { slot })
            }
            Category::ClientDisconnect => {
                let (slot, _) = slot_prefix(payload)?;
                Some(Event::ClientDisconnect { slot })
            }
            Category::Kill => {
                let (numbers, text) = payload.split_once(':')?;
                let [killer, victim, cause] = integers::<3>(numbers)?;
                let world_kill = text.split_whitespace().next() == Some("<non-client>");
                Some(Event::Kill {
                    killer,
                    victim,
                    cause,
                    world_kill,
                })
            }
            Category::Hit => {
                let (numbers, _) = payload.split_once(':')?;
                let [victim, attacker, location, item] = integers::<4>(numbers)?;
                Some(Event::Hit {
                    victim,
                    attacker,
                    location,
                    item,
                })
            }
            Category::Flag => {
                let (numbers, _) = payload.split_once(':')?;
                let [slot, code] = integers::<2>(numbers)?;
                let action = match code {
                    0 => FlagAction::Dropped,
                    1 => FlagAction::Returned,
                    2 => FlagAction::Captured,
                    _ => return None,
                };
                Some(Event::Flag { slot, action })
            }
            Category::Say => {
                let (slot, rest) = slot_prefix(payload)?;
                let (name, message) = rest.split_once(char::is_whitespace)?;
                let message = message.trim();
                if message.is_empty() {
                    return None;
                }
                Some(Event::Say {
                    slot,
                    name: name.trim_end_matches(':').to_string(),
                    message: message.to_string(),
                })
            }
        }
    }
}

/// Splits a raw line into its category token and trimmed payload.
///
/// The leading `mm:ss` stamp is optional. Returns `None` for separator
/// lines and anything else without an alphabetic category.
pub fn split_line(line: &str) -> Option<(&str, &str)> {
    let rest = line.trim_start();
    let rest = match rest.split_once(char::is_whitespace) {
        Some((stamp, tail)) if is_timestamp(stamp) => tail.trim_start(),
        _ => rest,
    };
    let (category, payload) = rest.split_once(':')?;
    if category.is_empty() || !category.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some((category, payload.trim()))
}

/// Category of a raw line, if it is one the bot knows
pub fn category(line: &str) -> Option<Category> {
    split_line(line).and_then(|(token, _)| Category::from_token(token))
}

/// Decodes the `\key\value\key\value` micro-format.
///
/// A trailing key without a value is ignored.
pub fn explode(info: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();
    let mut parts = info.trim_start().trim_start_matches('\\').split('\\');
    while let Some(key) = parts.next() {
        let Some(value) = parts.next() else {
            break;
        };
        values.insert(key.trim_end().to_string(), value.trim_end().to_string());
    }
    values
}

fn parse_game_info(payload: &str) -> GameInfo {
    let values = explode(payload);
    GameInfo {
        game_type: values.get("g_gametype").and_then(|code| code.parse().ok()),
        mod_version: values
            .get("g_modversion")
            .map(|version| ModVersion::from_modversion(version))
            .unwrap_or_default(),
        map_name: values.get("mapname").cloned(),
    }
}

fn is_timestamp(token: &str) -> bool {
    token.split_once(':').is_some_and(|(minutes, seconds)| {
        !minutes.is_empty()
            && !seconds.is_empty()
            && minutes.chars().all(|c| c.is_ascii_digit())
            && seconds.chars().all(|c| c.is_ascii_digit())
    })
}

/// Leading slot number and the remainder of the payload
fn slot_prefix(payload: &str) -> Option<(u32, &str)> {
    let payload = payload.trim_start();
    let end = payload
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(payload.len());
    let slot = payload[..end].parse().ok()?;
    Some((slot, payload[end..].trim_start()))
}

/// Exactly `N` whitespace separated integers
fn integers<const N: usize>(text: &str) -> Option<[u32; N]> {
    let mut values = [0; N];
    let mut tokens = text.split_whitespace();
    for value in values.iter_mut() {
        *value = tokens.next()?.parse().ok()?;
    }
    Some(values)
}

/// Names are stored without whitespace, as the game prints them
pub fn strip_whitespace(name: &str) -> String {
    name.split_whitespace().collect()
}
