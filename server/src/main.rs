use clap::Parser;
use log::{error, info};
use server::config::Config;
use server::geo::NoGeo;
use server::network::Server;
use server::storage::FileStorage;
use std::path::PathBuf;

/// Main-method of the moderation bot.
/// Parses command-line arguments, opens storage and runs the tail loop until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Game server log file to tail
        #[clap(short, long, default_value = "games.log")]
        log_file: PathBuf,
        /// Game server address for RCON
        #[clap(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Game server port for RCON
        #[clap(short, long, default_value = "27960")]
        port: u16,
        /// RCON password
        #[clap(long, default_value = "")]
        rcon_password: String,
        /// Snapshot file for bans, profiles and stats
        #[clap(short, long, default_value = "warden.db")]
        storage: PathBuf,
        /// Map cycle file used to announce the next map
        #[clap(long)]
        mapcycle: Option<PathBuf>,
        /// Warnings before a player is kicked
        #[clap(long, default_value = "3")]
        max_warnings: u32,
        /// Highest tolerated ping, 0 disables the check
        #[clap(long, default_value = "200")]
        max_ping: u32,
        /// Warn spectators when more players are connected, 0 disables
        #[clap(long, default_value = "10")]
        kick_spec_full_server: usize,
        /// Seconds between status sweeps, 0 disables them
        #[clap(long, default_value = "60")]
        task_frequency: u64,
        /// Heartbeat endpoint, none disables the heartbeat
        #[clap(long)]
        heartbeat_url: Option<String>,
        /// Do not warn and kick for team kills
        #[clap(long)]
        no_tk_autokick: bool,
        /// Gravity to set on every new map
        #[clap(long)]
        low_gravity: Option<u32>,
        /// Log debug output
        #[clap(short, long)]
        verbose: bool,
    }

    // Parse command line arguments
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config = Config {
        log_file: args.log_file,
        rcon_host: args.host,
        rcon_port: args.port,
        rcon_password: args.rcon_password,
        storage_path: args.storage,
        mapcycle_file: args.mapcycle,
        max_warnings: args.max_warnings,
        max_ping: args.max_ping,
        kick_spec_full_server: args.kick_spec_full_server,
        task_frequency_secs: args.task_frequency,
        heartbeat_url: args.heartbeat_url,
        tk_autokick: !args.no_tk_autokick,
        low_gravity: args.low_gravity,
        ..Config::default()
    };

    let storage = FileStorage::open(&config.storage_path)?;
    let mut server = Server::new(config, Box::new(storage), Box::new(NoGeo)).await?;
    let game = server.game();

    // Handle shutdown gracefully
    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    game.write().await.sync_storage();
    Ok(())
}
