//! Chat commands that drive the core's own operations.
//!
//! Only forgiveness, balancing, registration, map stats, alias lookup and
//! manual warnings are understood; every other `!` command is ignored.

use crate::config::immunity;
use crate::game::Game;
use crate::utils::ratio;
use log::{debug, error, info};
use shared::Role;

impl Game {
    pub(crate) fn on_say(&mut self, slot: u32, message: &str, now: u64) {
        let mut words = message.split_whitespace();
        let Some(command) = words.next().filter(|word| word.starts_with('!')) else {
            return;
        };
        let args: Vec<&str> = words.collect();
        let Some(role) = self.registry.get(slot).map(|player| player.role) else {
            return;
        };
        debug!("Player {} issued {} {:?}", slot, command, args);

        match command.to_lowercase().as_str() {
            "!forgiveprev" | "!fp" | "!f" => {
                let (mut escalation, registry) = self.split(now);
                escalation.forgive_prev(registry, slot);
            }
            "!forgiveall" | "!fa" => {
                let (mut escalation, registry) = self.split(now);
                escalation.forgive_all(registry, slot);
            }
            "!teams" => {
                if self.state.tracks_team_kills() {
                    self.balance_or_defer();
                }
            }
            "!stats" => self.tell_map_stats(slot),
            "!register" => self.register(slot, now),
            "!warn" | "!w" if role >= immunity::ISSUE_WARNING => self.warn(slot, &args, now),
            "!warnclear" | "!wc" | "!wr" if role >= immunity::CLEAR_WARNINGS => {
                self.warn_clear(slot, &args, now)
            }
            "!aliases" | "!alias" if role >= immunity::LOOKUP_ALIASES => {
                self.tell_aliases(slot, &args)
            }
            _ => {}
        }
    }

    fn tell_map_stats(&mut self, slot: u32) {
        let Some(player) = self.registry.get(slot) else {
            return;
        };
        let message = format!(
            "^7Map Stats {}: ^7K ^2{} ^7D ^3{} ^7TK ^1{} ^7Ratio ^5{} ^7HS ^2{}",
            player.name,
            player.kills,
            player.deaths,
            player.tk_count,
            ratio(player.kills, player.deaths),
            player.headshots
        );
        self.outbox.tell(slot, message);
    }

    fn tell_aliases(&mut self, slot: u32, args: &[&str]) {
        if args.is_empty() {
            self.outbox.tell(slot, "^7Usage: !alias <name>");
            return;
        }
        let message = match self.registry.find(&args.join(" ")) {
            Ok(target) => match self.registry.get(target) {
                Some(player) => format!(
                    "^7Aliases of ^5{}: ^3{}",
                    player.name,
                    player.aliases_display()
                ),
                None => return,
            },
            Err(message) => message,
        };
        self.outbox.tell(slot, message);
    }

    fn register(&mut self, slot: u32, now: u64) {
        let Some(player) = self.registry.get_mut(slot) else {
            return;
        };
        if player.registered {
            self.outbox.tell(
                slot,
                format!("{} ^7is already in a higher level group", player.name),
            );
            return;
        }
        if let Err(e) =
            self.storage
                .register_player(&player.guid, &player.pretty_name(), Role::User, now)
        {
            error!("Failed to register {}: {}", player.guid, e);
            return;
        }
        player.registered = true;
        player.role = player.role.max(Role::User);
        player.welcome_pending = false;
        info!("Player {} {} registered as {}", slot, player.name, Role::User);
        self.outbox
            .tell(slot, format!("{} ^7put in group User", player.name));
    }

    fn warn(&mut self, slot: u32, args: &[&str], now: u64) {
        let (user, reason) = match args {
            [] => {
                self.outbox.tell(slot, "^7Usage: !warn <name> <reason>");
                return;
            }
            [_] => {
                self.outbox
                    .tell(slot, "^7You need to enter a reason: ^3!warn <name> <reason>");
                return;
            }
            [user, reason @ ..] => (*user, reason.join(" ")),
        };
        match self.registry.find(user) {
            Ok(target) => {
                let (mut escalation, registry) = self.split(now);
                escalation.warn(registry, slot, target, &reason);
            }
            Err(message) => self.outbox.tell(slot, message),
        }
    }

    fn warn_clear(&mut self, slot: u32, args: &[&str], now: u64) {
        if args.is_empty() {
            self.outbox.tell(slot, "^7Usage: !warnclear <name>");
            return;
        }
        match self.registry.find(&args.join(" ")) {
            Ok(target) => {
                let (mut escalation, registry) = self.split(now);
                escalation.clear_warnings(registry, target);
            }
            Err(message) => self.outbox.tell(slot, message),
        }
    }
}
