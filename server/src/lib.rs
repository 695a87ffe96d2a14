//! # Moderation Bot Library
//!
//! This library follows the log of a running game server, rebuilds the match
//! and player state from it, and answers through the server's remote console
//! (RCON) with chat messages, team moves, kicks and bans.
//!
//! ## Core Responsibilities
//!
//! ### State Reconstruction
//! Every line of the game log is parsed into a typed [`shared::Event`] and
//! applied to the coordinator ([`game::Game`]): players join, change teams,
//! kill and hit each other, rounds start and end. Round counters reset at
//! warmup, lifetime counters persist in storage.
//!
//! ### Escalation
//! Warnings, team kills, idle spectators and high pings are counted per
//! player. Counters that reach the configured threshold lead to a kick;
//! repeated offences within a short window lead to a timed ban through the
//! ban point ledger. Roles at or above the immunity thresholds are exempt.
//!
//! ### Team Balancing
//! On request the larger team gives up its most recently joined players
//! until red and blue differ by at most one. Under Team Survivor a balance
//! requested mid-round waits for the round end.
//!
//! ## Architecture Design
//!
//! ### One Lock Domain
//! The coordinator owns the registry, the match state and the storage
//! handle. The control loop and the periodic status task share it as
//! `Arc<RwLock<Game>>` and take the lock once per event or task, so no
//! handler ever sees another one's half-applied changes.
//!
//! ### Actions, Not Side Effects
//! Handlers never talk to the network. They buffer [`shared::Action`]s in an
//! [`outbox::Outbox`]; the control loop renders them to RCON commands and a
//! sender task delivers them with a small delay between commands. Nothing is
//! delivered until the tailer has caught up with the end of the log.
//!
//! ## Module Organization
//!
//! - `tailer`: backward recovery scan and forward line reading
//! - `game`, `commands`: event dispatch and the chat commands
//! - `registry`, `player`: connected players and their counters
//! - `match_state`: phase, game type and map rotation
//! - `escalation`: warning, kick, ban and forgiveness rules
//! - `balance`: team balancing plan
//! - `scheduler`: deadlines for periodic tasks
//! - `storage`: persistence collaborator and its file backed implementation
//! - `rcon`: UDP transport to the game server
//! - `network`: the control loop tying everything together
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::Config;
//! use server::geo::NoGeo;
//! use server::network::Server;
//! use server::storage::FileStorage;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         log_file: "/srv/urt/games.log".into(),
//!         rcon_password: "secret".to_string(),
//!         ..Config::default()
//!     };
//!     let storage = FileStorage::open(&config.storage_path)?;
//!
//!     // Tails the log, dispatches events and runs the periodic tasks
//!     let mut server = Server::new(config, Box::new(storage), Box::new(NoGeo)).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod balance;
mod commands;
pub mod config;
pub mod escalation;
pub mod game;
pub mod geo;
pub mod match_state;
pub mod network;
pub mod outbox;
pub mod player;
pub mod rcon;
pub mod registry;
pub mod scheduler;
pub mod storage;
pub mod tailer;
pub mod utils;

pub use game::Game;
pub use network::Server;
