//! Outbound actions and their RCON rendering.
//!
//! Game logic never formats RCON commands directly. It emits [`Action`]s,
//! and the transport turns each one into zero or more command strings with
//! [`Action::to_commands`].

use crate::Team;
use serde::{Deserialize, Serialize};

/// Longest chunk of a global chat message
pub const SAY_WIDTH: usize = 145;
/// Longest chunk of a private message
pub const TELL_WIDTH: usize = 135;

const PM_TAG: &str = "^4[pm]";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    SayAll(String),
    TellPlayer {
        slot: u32,
        text: String,
        private_tag: bool,
    },
    BigText(String),
    Kick(u32),
    /// The ban itself is persisted by the caller; on the wire it is a kick.
    Ban {
        slot: u32,
        guid: String,
        duration_secs: u64,
        reason: String,
    },
    ForceTeam {
        slot: u32,
        team: Team,
    },
    RunRawCommand(String),
    /// Drop every command still queued for the server
    ClearPending,
}

impl Action {
    pub fn say(text: impl Into<String>) -> Self {
        Action::SayAll(text.into())
    }

    pub fn tell(slot: u32, text: impl Into<String>) -> Self {
        Action::TellPlayer {
            slot,
            text: text.into(),
            private_tag: true,
        }
    }

    /// Renders the action as RCON command strings.
    ///
    /// Chat messages are word wrapped; only the first chunk of a private
    /// message carries the `[pm]` tag.
    pub fn to_commands(&self) -> Vec<String> {
        match self {
            Action::SayAll(text) => wrap(text, SAY_WIDTH)
                .into_iter()
                .map(|line| format!("say ^3{}", line))
                .collect(),
            Action::TellPlayer {
                slot,
                text,
                private_tag,
            } => wrap(text, TELL_WIDTH)
                .into_iter()
                .enumerate()
                .map(|(index, line)| {
                    if !private_tag {
                        format!("tell {} ^3{}", slot, line)
                    } else if index == 0 {
                        format!("tell {} {} ^3{}", slot, PM_TAG, line)
                    } else {
                        format!("tell {}  ^3{}", slot, line)
                    }
                })
                .collect(),
            Action::BigText(text) => vec![format!("bigtext \"{}\"", text)],
            Action::Kick(slot) | Action::Ban { slot, .. } => vec![format!("kick {}", slot)],
            Action::ForceTeam { slot, team } => vec![format!("forceteam {} {}", slot, team.name())],
            Action::RunRawCommand(command) => vec![command.clone()],
            Action::ClearPending => Vec::new(),
        }
    }
}

/// Greedy word wrap.
///
/// Runs of whitespace collapse to one space and words longer than `width`
/// are split. An empty or blank text yields no lines.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word = word;
        loop {
            let used = current.chars().count();
            let needed = word.chars().count() + usize::from(used > 0);
            if used + needed <= width {
                if used > 0 {
                    current.push(' ');
                }
                current.push_str(word);
                break;
            }
            if used > 0 {
                lines.push(std::mem::take(&mut current));
                continue;
            }
            // word alone is wider than a line
            let split = word
                .char_indices()
                .nth(width)
                .map(|(index, _)| index)
                .unwrap_or(word.len());
            lines.push(word[..split].to_string());
            word = &word[split..];
            if word.is_empty() {
                break;
            }
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
