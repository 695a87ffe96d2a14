//! Buffer of actions produced while handling one event or task.

use shared::{Action, Team};

#[derive(Debug, Default)]
pub struct Outbox {
    actions: Vec<Action>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: Action) {
        self.actions.push(action);
    }

    pub fn say(&mut self, text: impl Into<String>) {
        self.push(Action::say(text));
    }

    /// Private message with the `[pm]` tag
    pub fn tell(&mut self, slot: u32, text: impl Into<String>) {
        self.push(Action::tell(slot, text));
    }

    /// Private message without the `[pm]` tag
    pub fn tell_plain(&mut self, slot: u32, text: impl Into<String>) {
        self.push(Action::TellPlayer {
            slot,
            text: text.into(),
            private_tag: false,
        });
    }

    pub fn kick(&mut self, slot: u32) {
        self.push(Action::Kick(slot));
    }

    pub fn force_team(&mut self, slot: u32, team: Team) {
        self.push(Action::ForceTeam { slot, team });
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn drain(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.actions)
    }

    /// Empties the buffer without delivering anything
    pub fn discard(&mut self) {
        self.actions.clear();
    }
}
