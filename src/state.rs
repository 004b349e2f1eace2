//! Shared application state: config, task store, notifier, and the solver
//! push channel.
//!
//! One `AppState` is built at startup and shared behind an Arc. Solver
//! WebSocket connections subscribe to the broadcast channel; createTask
//! publishes a notice and every connected surface gets it. A lagging or
//! absent subscriber never blocks task creation.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, instrument};

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::notifier::Notifier;
use crate::protocol::SolverNotice;
use crate::store::TaskStore;

/// Capacity of the solver notice channel; old notices are dropped for slow
/// subscribers rather than queued without bound.
const NOTICE_CAPACITY: usize = 64;

pub struct AppState {
    pub config: Config,
    pub store: TaskStore,
    pub notifier: Option<Notifier>,
    pub clock: Arc<dyn Clock>,
    notices: broadcast::Sender<SolverNotice>,
}

impl AppState {
    #[instrument(level = "info", skip_all)]
    pub fn new(config: Config) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build with an explicit clock; tests drive expiry with a manual one.
    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Self {
        let store = TaskStore::new(config.task_timeout_secs, clock.clone());
        let notifier = Notifier::new(&config.discord_webhook, config.notify_cooldown_secs, clock.clone());
        if notifier.is_some() {
            info!(target: "relay_backend", "Webhook notifications enabled");
        } else {
            info!(target: "relay_backend", "Webhook notifications disabled (no DISCORD_WEBHOOK)");
        }
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self { config, store, notifier, clock, notices }
    }

    /// Subscribe a solver connection to task notices.
    pub fn subscribe_notices(&self) -> broadcast::Receiver<SolverNotice> {
        self.notices.subscribe()
    }

    /// Publish a notice to every connected solver. Returns the number of
    /// receivers that got it.
    pub fn publish_notice(&self, notice: SolverNotice) -> usize {
        self.notices.send(notice).unwrap_or(0)
    }

    /// External link a human follows to solve a task.
    pub fn solve_url(&self, task_id: &str) -> String {
        format!("{}/solve/{}", self.config.public_base(), task_id)
    }
}
