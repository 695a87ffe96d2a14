//! Cooperative periodic tasks.
//!
//! The scheduler never runs anything itself. The control loop asks it which
//! tasks are due, starts them in order and moves on; slow ones are spawned
//! off the loop. The clock is passed in so tests can step it by hand.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    /// Pull pings from the server and run the warning sweep
    StatusRefresh,
    /// Best-effort liveness ping
    Heartbeat,
    /// Retry storage writes that failed earlier
    SyncStorage,
}

#[derive(Debug)]
struct Entry {
    task: Task,
    interval: Duration,
    last_run: Instant,
}

#[derive(Debug, Default)]
pub struct Scheduler {
    entries: Vec<Entry>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `task` to run every `interval`, first after one full interval
    pub fn every(&mut self, interval: Duration, task: Task, now: Instant) {
        self.entries.push(Entry {
            task,
            interval,
            last_run: now,
        });
    }

    /// Tasks whose interval has elapsed; their last run is stamped `now`
    pub fn due(&mut self, now: Instant) -> Vec<Task> {
        let mut due = Vec::new();
        for entry in &mut self.entries {
            if now.saturating_duration_since(entry.last_run) >= entry.interval {
                entry.last_run = now;
                due.push(entry.task);
            }
        }
        due
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
