//! Event dispatch and match bookkeeping.
//!
//! [`Game`] is the single owner of the player registry, the match state and
//! the storage collaborator. Every log event and every periodic task enters
//! through one `&mut Game` borrow, so callers guard the whole coordinator
//! with one lock and handlers never observe half-applied state.

use crate::balance::plan_balance;
use crate::config::Config;
use crate::escalation::{Escalation, PlayerPing};
use crate::geo::GeoLookup;
use crate::match_state::{MatchState, Phase};
use crate::outbox::Outbox;
use crate::registry::{screen_identity, PlayerRegistry};
use crate::storage::Storage;
use crate::utils::format_timestamp;
use log::{debug, error, info};
use shared::tables::{is_headshot, BOMBED, CHANGE_TEAM_CAUSE, SELF_INFLICTED_CAUSES, SUICIDE_CAUSES};
use shared::{Action, Event, FlagAction, GameInfo, Team, Userinfo, WORLD_SLOT};

/// Streak lengths that get a broadcast, with their title
const STREAK_TITLES: [(u32, &str, &str); 4] = [
    (20, "is godlike!", "godlike"),
    (15, "is unstoppable!", "unstoppable"),
    (10, "is on a rampage!", "rampage"),
    (5, "is on a killing spree!", "killing spree"),
];

pub struct Game {
    pub(crate) registry: PlayerRegistry,
    pub(crate) state: MatchState,
    pub(crate) config: Config,
    pub(crate) storage: Box<dyn Storage>,
    geo: Box<dyn GeoLookup>,
    pub(crate) outbox: Outbox,
    live: bool,
}

impl Game {
    pub fn new(config: Config, storage: Box<dyn Storage>, geo: Box<dyn GeoLookup>) -> Self {
        Self {
            registry: PlayerRegistry::new(),
            state: MatchState::new(),
            config,
            storage,
            geo,
            outbox: Outbox::new(),
            live: false,
        }
    }

    pub fn registry(&self) -> &PlayerRegistry {
        &self.registry
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Classifies the match from the InitGame line found by startup recovery
    pub fn apply_recovered(&mut self, info: &GameInfo) {
        self.state.classify(info);
        self.state.refresh_next_map();
        info!(
            "Recovered running match: {:?} on {}",
            self.state.kind,
            self.state.map_name.as_deref().unwrap_or("unknown map")
        );
    }

    /// Opens the gate for outbound actions once the backlog is consumed
    pub fn go_live(&mut self, rotation: Vec<String>) {
        self.state.set_rotation(rotation);
        self.live = true;
        self.outbox.discard();
        info!(
            "Caught up with the log, now live (next map {})",
            self.state.next_map.as_deref().unwrap_or("unknown")
        );
    }

    /// Parses and dispatches one raw log line
    pub fn handle_line(&mut self, line: &str, now: u64) -> Vec<Action> {
        match Event::parse(line) {
            Some(event) => self.handle_event(event, now),
            None => Vec::new(),
        }
    }

    pub fn handle_event(&mut self, event: Event, now: u64) -> Vec<Action> {
        match event {
            Event::InitGame(info) => self.on_init_game(&info),
            Event::Warmup => self.on_warmup(),
            Event::InitRound => self.on_init_round(),
            Event::ShutdownGame => self.outbox.push(Action::ClearPending),
            Event::Exit => self.on_exit(),
            Event::SurvivorWinner(winner) => {
                debug!("Round won by {}", winner);
                if self.state.defer_balance {
                    self.state.defer_balance = false;
                    self.balance_teams();
                }
            }
            Event::ClientUserinfo { slot, info } => self.on_userinfo(slot, &info, now),
            Event::ClientUserinfoChanged { slot, name, team } => {
                self.on_userinfo_changed(slot, name, team)
            }
            Event::ClientBegin { slot } => self.on_begin(slot),
            Event::ClientDisconnect { slot } => {
                if let Some(player) = self.registry.remove(slot, self.storage.as_mut()) {
                    info!("Player {} {} has left the game", slot, player.name);
                }
            }
            Event::Kill {
                killer,
                victim,
                cause,
                world_kill,
            } => self.on_kill(killer, victim, cause, world_kill, now),
            Event::Hit {
                victim,
                attacker,
                location,
                item,
            } => self.on_hit(victim, attacker, location, item),
            Event::Flag { slot, action } => {
                if let Some(player) = self.registry.get_mut(slot) {
                    match action {
                        FlagAction::Returned => player.return_flag(),
                        FlagAction::Captured => player.capture_flag(),
                        FlagAction::Dropped => {}
                    }
                }
            }
            Event::Say { slot, message, .. } => self.on_say(slot, &message, now),
        }
        self.take_actions()
    }

    /// Periodic status pass: ping strikes first, then the warning sweep
    pub fn run_status_sweep(&mut self, pings: Option<&[PlayerPing]>, now: u64) -> Vec<Action> {
        let (mut escalation, registry) = self.split(now);
        if let Some(pings) = pings {
            escalation.check_pings(registry, pings);
        }
        escalation.sweep_warnings(registry);
        self.take_actions()
    }

    pub fn sync_storage(&mut self) {
        if let Err(e) = self.storage.sync() {
            error!("Failed to write storage: {}", e);
        }
    }

    /// Balances now when allowed, otherwise defers it to the round end
    /// under Team Survivor.
    pub fn request_balance(&mut self) -> Vec<Action> {
        self.balance_or_defer();
        self.take_actions()
    }

    /// Hands out the buffered actions; before going live they are dropped
    pub fn take_actions(&mut self) -> Vec<Action> {
        let actions = self.outbox.drain();
        if self.live {
            actions
        } else {
            Vec::new()
        }
    }

    pub(crate) fn split(&mut self, now: u64) -> (Escalation<'_>, &mut PlayerRegistry) {
        (
            Escalation::new(&self.config, self.storage.as_mut(), &mut self.outbox, now),
            &mut self.registry,
        )
    }

    pub(crate) fn balance_or_defer(&mut self) {
        if self.registry.team_counts().is_balanced() {
            self.outbox.say("^7Teams are already balanced");
        } else if self.state.allow_balance {
            self.balance_teams();
        } else if self.state.is_team_survivor() {
            self.state.defer_balance = true;
            self.outbox
                .say("^7Teams will be balanced at the end of the round!");
        }
    }

    fn balance_teams(&mut self) {
        let counts = self.registry.team_counts();
        let Some(plan) = plan_balance(counts, self.registry.iter()) else {
            self.outbox.say("^7Teams are already balanced");
            return;
        };
        info!(
            "Balancing teams (red {}, blue {}): moving {:?} to {}",
            counts.red, counts.blue, plan.moves, plan.to
        );
        self.outbox
            .push(Action::BigText("AUTOBALANCING TEAMS...".to_string()));
        for slot in plan.moves {
            self.outbox.force_team(slot, plan.to);
        }
        self.outbox.say("^7Autobalance complete!");
    }

    fn on_init_game(&mut self, info: &GameInfo) {
        self.outbox.push(Action::ClearPending);
        if let Some(gravity) = self.config.low_gravity {
            self.outbox
                .push(Action::RunRawCommand(format!("set g_gravity {}", gravity)));
        }
        self.state.classify(info);
        self.registry.reset_round();
        self.state.allow_balance = true;
        self.state.defer_balance = false;
        self.state.refresh_next_map();
        self.state.enter(Phase::Warmup);
    }

    fn on_warmup(&mut self) {
        self.registry.reset_round();
        self.state.refresh_next_map();
        self.state.allow_balance = true;
        self.state.enter(Phase::Warmup);
    }

    fn on_init_round(&mut self) {
        if self.state.is_ctf() {
            self.registry.reset_flag_stats();
        } else if self.state.is_team_survivor() {
            self.state.allow_balance = false;
        }
        self.state.enter(Phase::Live);
    }

    /// Awards, personal stats and the stats flush at the end of a round
    fn on_exit(&mut self) {
        let mut most_flags = (0, String::new());
        let mut most_kills = (0, String::new());
        let mut most_streak = (0, String::new());
        let mut most_heads = (0, String::new());

        for slot in self.registry.slots() {
            let Some(player) = self.registry.get(slot) else {
                continue;
            };
            if player.flags_captured > most_flags.0 {
                most_flags = (player.flags_captured, player.name.clone());
            }
            if player.kills > most_kills.0 && !player.is_world() {
                most_kills = (player.kills, player.name.clone());
            }
            if player.max_streak > most_streak.0 && !player.is_world() {
                most_streak = (player.max_streak, player.name.clone());
            }
            if player.headshots > most_heads.0 {
                most_heads = (player.headshots, player.name.clone());
            }
            if player.team != Team::Spectator {
                self.outbox.tell(
                    slot,
                    format!(
                        "^7Stats {}: ^7K ^2{} ^7D ^3{} ^7HS ^1{} ^7TK ^1{}",
                        player.name, player.kills, player.deaths, player.headshots, player.tk_count
                    ),
                );
            }
            if let Err(e) = self.storage.flush_round_stats(player) {
                error!("Failed to store stats of {}: {}", player.name, e);
            }
        }

        let awards: Vec<String> = [
            (most_flags, "^4caps"),
            (most_kills, "^3kills"),
            (most_streak, "^6streaks"),
            (most_heads, "^1heads"),
        ]
        .into_iter()
        .filter(|((count, _), _)| *count > 1)
        .map(|((count, name), label)| format!("^7{}: ^2{} {}", name, count, label))
        .collect();
        if !awards.is_empty() {
            self.outbox
                .say(format!("^1AWARDS: {}", awards.join(" ^7- ")));
        }

        self.state.allow_balance = true;
        self.state.enter(Phase::Intermission);
    }

    fn on_userinfo(&mut self, slot: u32, info: &Userinfo, now: u64) {
        let identity = info.resolve(slot);
        screen_identity(slot, &identity, &mut self.outbox);
        let (player, created) = self.registry.upsert(
            slot,
            &identity,
            self.storage.as_mut(),
            self.geo.as_ref(),
            &mut self.outbox,
            now,
        );
        if !created {
            debug!("Player {} {} refreshed userinfo", slot, player.name);
        }
    }

    fn on_userinfo_changed(&mut self, slot: u32, name: Option<String>, team: Option<Team>) {
        let Some(player) = self.registry.get_mut(slot) else {
            return;
        };
        let (name, team) = match (name, team) {
            (Some(name), Some(team)) => (name, team),
            _ => ("UnnamedPlayer".to_string(), Team::Spectator),
        };
        player.team = team;
        if player.name != name {
            player.set_name(&name);
        }
        debug!("Player {} {} is on the {} team", slot, player.name, team);
    }

    fn on_begin(&mut self, slot: u32) {
        let Some(player) = self.registry.get_mut(slot) else {
            return;
        };
        if player.registered && player.welcome_pending {
            let last_visit = player
                .last_visit
                .map(format_timestamp)
                .unwrap_or_else(|| "never".to_string());
            let message = format!(
                "^7[^2Authed^7] Welcome back {}, you are ^2{}^7, last visit {}, you played {} times",
                player.name, player.role, last_visit, player.num_played
            );
            player.welcome_pending = false;
            self.outbox.tell_plain(slot, message);
        }
        debug!("Player {} {} has entered the game", slot, player.name);
    }

    fn on_kill(&mut self, killer_slot: u32, victim_slot: u32, cause: u32, world_kill: bool, now: u64) {
        let killer_slot = if world_kill { WORLD_SLOT } else { killer_slot };
        let Some(cause_name) = self.state.death_cause(cause) else {
            debug!("Dropping kill with unknown cause {}", cause);
            return;
        };
        let (Some(killer), Some(victim)) =
            (self.registry.get(killer_slot), self.registry.get(victim_slot))
        else {
            return;
        };
        let team_kill = self.state.tracks_team_kills()
            && killer.team == victim.team
            && killer_slot != victim_slot
            && cause_name != BOMBED;

        if team_kill {
            let (mut escalation, registry) = self.split(now);
            escalation.team_kill(registry, killer_slot, victim_slot);
        }

        let suicide = SUICIDE_CAUSES.contains(&cause_name)
            || (killer_slot == victim_slot && SELF_INFLICTED_CAUSES.contains(&cause_name));
        if suicide {
            if let Some(victim) = self.registry.get_mut(victim_slot) {
                victim.suicide();
                victim.die();
                debug!(
                    "Player {} {} committed suicide with {}",
                    victim_slot, victim.name, cause_name
                );
            }
            return;
        }
        if team_kill || cause == CHANGE_TEAM_CAUSE {
            return;
        }

        let Some(killer) = self.registry.get_mut(killer_slot) else {
            return;
        };
        killer.kill();
        let killer_name = killer.colored_name();
        let plain_killer = killer.name.clone();
        let streak = killer.streak;
        if killer_slot != WORLD_SLOT {
            if let Some((_, title, _)) = STREAK_TITLES.iter().find(|(at, _, _)| *at == streak) {
                self.outbox.say(format!("{} ^7{}", killer_name, title));
            }
        }

        let Some(victim) = self.registry.get_mut(victim_slot) else {
            return;
        };
        if killer_slot != WORLD_SLOT && plain_killer != victim.name {
            let ended = STREAK_TITLES
                .iter()
                .find(|(at, _, _)| victim.streak >= *at);
            if let Some((_, _, title)) = ended {
                self.outbox.say(format!(
                    "{}'s ^7{} was ended by {}!",
                    victim.colored_name(),
                    title,
                    killer_name
                ));
            }
        }
        victim.die();
        debug!(
            "Player {} {} killed {} {} with {}",
            killer_slot, plain_killer, victim_slot, victim.name, cause_name
        );
    }

    fn on_hit(&mut self, victim_slot: u32, attacker_slot: u32, location: u32, item: u32) {
        let location = self.state.hit_location(location);
        let item = self.state.hit_item(item);
        let Some(victim_name) = self.registry.get(victim_slot).map(|v| v.name.clone()) else {
            return;
        };
        let Some(hitter) = self.registry.get_mut(attacker_slot) else {
            return;
        };
        hitter.hit();
        let Some(location) = location else {
            return;
        };
        if is_headshot(location) {
            hitter.headshot();
            let count = hitter.headshots;
            self.outbox.say(format!(
                "{} ^7has {} {} ({} percent)",
                hitter.colored_name(),
                count,
                if count > 1 { "headshots" } else { "headshot" },
                hitter.headshot_percentage()
            ));
        }
        debug!(
            "Player {} {} hit {} {} in the {} with {}",
            attacker_slot,
            hitter.name,
            victim_slot,
            victim_name,
            location,
            item.unwrap_or("unknown")
        );
    }
}
