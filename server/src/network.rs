//! Control loop: log tailing, scheduled tasks and RCON delivery

use crate::config::Config;
use crate::game::Game;
use crate::geo::GeoLookup;
use crate::match_state::parse_mapcycle;
use crate::rcon::RconClient;
use crate::scheduler::{Scheduler, Task};
use crate::storage::Storage;
use crate::tailer::LogTailer;
use crate::utils::get_timestamp;
use log::{debug, error, info, warn};
use shared::{Action, Event};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// How long a status query waits for the server's reply
pub const RCON_TIMEOUT: Duration = Duration::from_secs(2);
/// Interval of the retry for storage writes that failed
const STORAGE_SYNC_INTERVAL: Duration = Duration::from_secs(60);
const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(10);

/// Command waiting for the RCON sender task
#[derive(Debug)]
pub struct Outgoing {
    /// Queue generation the command was issued in
    pub generation: u64,
    pub command: String,
}

/// Front of the RCON send queue.
///
/// Clearing the queue bumps the generation; the sender task drops every
/// command issued in an older one.
#[derive(Debug, Clone)]
pub struct RconQueue {
    tx: mpsc::UnboundedSender<Outgoing>,
    generation: Arc<AtomicU64>,
}

impl RconQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Outgoing>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = Self {
            tx,
            generation: Arc::new(AtomicU64::new(0)),
        };
        (queue, rx)
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Renders the actions and queues their commands, fire and forget
    pub fn dispatch(&self, actions: Vec<Action>) {
        for action in actions {
            if matches!(action, Action::ClearPending) {
                let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                debug!("Discarding queued RCON commands (generation {})", generation);
                continue;
            }
            let generation = self.generation();
            for command in action.to_commands() {
                if let Err(e) = self.tx.send(Outgoing {
                    generation,
                    command,
                }) {
                    error!("Failed to queue RCON command: {}", e);
                }
            }
        }
    }

    /// Spawns the task that sends queued commands one by one, `delay` apart
    pub fn spawn_sender(
        &self,
        mut rx: mpsc::UnboundedReceiver<Outgoing>,
        rcon: Arc<RconClient>,
        delay: Duration,
    ) -> JoinHandle<()> {
        let current = Arc::clone(&self.generation);

        tokio::spawn(async move {
            while let Some(Outgoing {
                generation,
                command,
            }) = rx.recv().await
            {
                if generation != current.load(Ordering::SeqCst) {
                    debug!("Dropping stale RCON command: {}", command);
                    continue;
                }
                debug!("RCON: {}", command);
                if let Err(e) = rcon.send(&command).await {
                    error!("Failed to send RCON command '{}': {}", command, e);
                }
                sleep(delay).await;
            }
        })
    }
}

/// Query string of the heartbeat request
pub fn heartbeat_url(base: &str, port: u16) -> String {
    format!(
        "{}?v={}&p={}&o={}",
        base,
        env!("CARGO_PKG_VERSION"),
        port,
        std::env::consts::OS
    )
}

/// Owns the tail loop and everything it drives
pub struct Server {
    game: Arc<RwLock<Game>>,
    tailer: LogTailer,
    rcon: Arc<RconClient>,
    scheduler: Scheduler,
    config: Config,
    http: reqwest::Client,

    queue: RconQueue,
    queue_rx: mpsc::UnboundedReceiver<Outgoing>,
}

impl Server {
    pub async fn new(
        config: Config,
        storage: Box<dyn Storage>,
        geo: Box<dyn GeoLookup>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let tailer = LogTailer::open(&config.log_file)?;
        let rcon = RconClient::connect(
            &config.rcon_host,
            config.rcon_port,
            &config.rcon_password,
            RCON_TIMEOUT,
        )
        .await?;
        let http = reqwest::Client::builder()
            .timeout(HEARTBEAT_TIMEOUT)
            .build()?;
        let (queue, queue_rx) = RconQueue::new();
        info!(
            "Watching {} for {}:{}",
            config.log_file.display(),
            config.rcon_host,
            config.rcon_port
        );

        Ok(Server {
            game: Arc::new(RwLock::new(Game::new(config.clone(), storage, geo))),
            tailer,
            rcon: Arc::new(rcon),
            scheduler: Scheduler::new(),
            config,
            http,
            queue,
            queue_rx,
        })
    }

    /// Shared handle on the coordinator
    pub fn game(&self) -> Arc<RwLock<Game>> {
        Arc::clone(&self.game)
    }

    /// Classifies the running match before tailing starts
    async fn recover(&mut self) -> io::Result<()> {
        match self.tailer.recover_start()? {
            Some(line) => match Event::parse(&line) {
                Some(Event::InitGame(info)) => self.game.write().await.apply_recovered(&info),
                _ => warn!("Ignoring unparsable InitGame line: {}", line),
            },
            None => info!(
                "No InitGame in {}, waiting for the next match",
                self.tailer.path().display()
            ),
        }
        Ok(())
    }

    fn schedule_tasks(&mut self) {
        let now = Instant::now();
        if let Some(interval) = self.config.task_interval() {
            self.scheduler.every(interval, Task::StatusRefresh, now);
        }
        if let Some(interval) = self.config.heartbeat_interval() {
            self.scheduler.every(interval, Task::Heartbeat, now);
        }
        self.scheduler
            .every(STORAGE_SYNC_INTERVAL, Task::SyncStorage, now);
    }

    async fn go_live(&self) {
        let rotation = match &self.config.mapcycle_file {
            Some(path) => match tokio::fs::read_to_string(path).await {
                Ok(text) => parse_mapcycle(&text),
                Err(e) => {
                    warn!("Failed to read map cycle {}: {}", path.display(), e);
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        self.game.write().await.go_live(rotation);
    }

    async fn run_task(&self, task: Task) {
        debug!("Running scheduled {:?}", task);
        match task {
            Task::StatusRefresh => self.spawn_status_refresh(),
            Task::Heartbeat => self.spawn_heartbeat(),
            Task::SyncStorage => self.game.write().await.sync_storage(),
        }
    }

    /// Queries pings off the tail loop, then sweeps under the game lock
    fn spawn_status_refresh(&self) {
        let rcon = Arc::clone(&self.rcon);
        let game = Arc::clone(&self.game);
        let queue = self.queue.clone();
        let check_pings = self.config.max_ping > 0;

        tokio::spawn(async move {
            let pings = if check_pings {
                match rcon.status().await {
                    Ok(pings) => Some(pings),
                    Err(e) => {
                        warn!("Status refresh failed: {}", e);
                        None
                    }
                }
            } else {
                None
            };
            let actions = game
                .write()
                .await
                .run_status_sweep(pings.as_deref(), get_timestamp());
            queue.dispatch(actions);
        });
    }

    fn spawn_heartbeat(&self) {
        let Some(base) = &self.config.heartbeat_url else {
            return;
        };
        let request = self.http.get(heartbeat_url(base, self.config.rcon_port));

        tokio::spawn(async move {
            match request.send().await {
                Ok(response) => debug!("Heartbeat answered with {}", response.status()),
                Err(e) => debug!("Heartbeat failed: {}", e),
            }
        });
    }

    /// Main loop: dispatch new lines, run due tasks when idle
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let queue_rx = std::mem::replace(&mut self.queue_rx, mpsc::unbounded_channel().1);
        self.queue
            .spawn_sender(queue_rx, Arc::clone(&self.rcon), self.config.rcon_delay());

        self.recover().await?;
        self.schedule_tasks();
        info!("Tailing {}", self.tailer.path().display());

        loop {
            match self.tailer.next_line() {
                Ok(Some(line)) => {
                    let actions = self
                        .game
                        .write()
                        .await
                        .handle_line(&line, get_timestamp());
                    self.queue.dispatch(actions);
                }
                Ok(None) => {
                    if !self.game.read().await.is_live() {
                        self.go_live().await;
                    }
                    for task in self.scheduler.due(Instant::now()) {
                        self.run_task(task).await;
                    }
                    sleep(self.config.poll_interval()).await;
                }
                Err(e) => {
                    error!("Failed to read {}: {}", self.tailer.path().display(), e);
                    sleep(self.config.poll_interval()).await;
                }
            }
        }
    }
}
