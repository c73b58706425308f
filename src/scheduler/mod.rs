//! The unified scheduler: one loop that runs every class once per interval.
//!
//! # Lifecycle
//!
//! `Idle → (initial delay | interval) → Running → Idle`. Manual triggers go through
//! the same loop via a message channel, so a triggered cycle queues behind a
//! running one instead of overlapping it.
//!
//! Only one loop is active at a time: [`SyncScheduler::start`] stops any previous
//! loop (waiting for it to reach a class boundary) before spawning the new one.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::effects::{PlatformInterpreter, UpstreamInterpreter};
use crate::reconcile::Controller;

/// Default time between cycles (10 minutes).
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(600);

/// Default delay before the first cycle after start (30 seconds).
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(30);

/// Buffer size of the scheduler's control channel.
const CONTROL_CHANNEL_BUFFER: usize = 8;

/// Capacity of the manual trigger channel. Requests arriving while one is
/// already pending are coalesced into it.
pub const TRIGGER_CHANNEL_CAPACITY: usize = 1;

/// Scheduler timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub interval: Duration,
    pub initial_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            interval: DEFAULT_INTERVAL,
            initial_delay: DEFAULT_INITIAL_DELAY,
        }
    }
}

/// Messages accepted by a running loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerMessage {
    /// Run a cycle as soon as the loop is idle.
    RunNow,
    /// Stop after the current class.
    Shutdown,
}

struct LoopHandle {
    tx: mpsc::Sender<SchedulerMessage>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns the single reconciliation loop.
pub struct SyncScheduler<P, U> {
    controller: Arc<Controller<P, U>>,
    config: SchedulerConfig,
    shutdown: CancellationToken,
    handle: Mutex<Option<LoopHandle>>,
}

impl<P, U> SyncScheduler<P, U>
where
    P: PlatformInterpreter,
    U: UpstreamInterpreter,
{
    /// Creates an idle scheduler. Cancelling `shutdown` stops any loop it starts.
    pub fn new(
        controller: Arc<Controller<P, U>>,
        config: SchedulerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        SyncScheduler {
            controller,
            config,
            shutdown,
            handle: Mutex::new(None),
        }
    }

    /// Starts the loop, replacing any running one.
    pub async fn start(&self) {
        let mut handle = self.handle.lock().await;
        if let Some(previous) = handle.take() {
            info!("Replacing running scheduler loop");
            stop_loop(previous).await;
        }

        let (tx, rx) = mpsc::channel(CONTROL_CHANNEL_BUFFER);
        let cancel = self.shutdown.child_token();
        let task = tokio::spawn(run_loop(
            Arc::clone(&self.controller),
            self.config.clone(),
            rx,
            cancel.clone(),
        ));
        info!(
            interval_secs = self.config.interval.as_secs(),
            initial_delay_secs = self.config.initial_delay.as_secs(),
            "Scheduler started"
        );
        *handle = Some(LoopHandle { tx, cancel, task });
    }

    /// Requests an out-of-band cycle. Returns false if no loop is running.
    pub async fn run_now(&self) -> bool {
        let handle = self.handle.lock().await;
        match handle.as_ref() {
            Some(h) => h.tx.send(SchedulerMessage::RunNow).await.is_ok(),
            None => false,
        }
    }

    /// Stops the loop and waits for it to exit.
    pub async fn shutdown(&self) {
        if let Some(previous) = self.handle.lock().await.take() {
            stop_loop(previous).await;
            info!("Scheduler stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.handle
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| !h.task.is_finished())
    }

    /// Spawns the task that forwards manual sync requests to the running loop.
    ///
    /// The HTTP layer only holds the sending half, so it never needs to know the
    /// interpreter types.
    pub fn spawn_trigger_worker(
        self: Arc<Self>,
        mut rx: mpsc::Receiver<()>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    req = rx.recv() => {
                        if req.is_none() {
                            break;
                        }
                        if !self.run_now().await {
                            warn!("Manual sync requested but no scheduler loop is running");
                        }
                    }
                }
            }
            debug!("Trigger worker stopped");
        })
    }
}

async fn stop_loop(handle: LoopHandle) {
    handle.cancel.cancel();
    let _ = handle.tx.send(SchedulerMessage::Shutdown).await;
    if let Err(e) = handle.task.await {
        warn!(error = %e, "Scheduler loop ended abnormally");
    }
}

async fn run_loop<P, U>(
    controller: Arc<Controller<P, U>>,
    config: SchedulerConfig,
    mut rx: mpsc::Receiver<SchedulerMessage>,
    cancel: CancellationToken,
) where
    P: PlatformInterpreter,
    U: UpstreamInterpreter,
{
    let mut next = Instant::now() + config.initial_delay;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            msg = rx.recv() => match msg {
                Some(SchedulerMessage::RunNow) => debug!("Manual sync requested"),
                Some(SchedulerMessage::Shutdown) | None => break,
            },
            _ = sleep_until(next) => {}
        }

        controller.run_cycle(&cancel).await;
        next = Instant::now() + config.interval;
    }

    debug!("Scheduler loop exited");
}
