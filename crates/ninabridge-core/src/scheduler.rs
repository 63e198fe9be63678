//! Cooperative poll scheduler.
//!
//! All tasks share a single timing loop and run **serially**: when a task is
//! due its action is awaited on the loop itself, so a slow action delays
//! every other task. `last_run` is stamped on completion, which makes the
//! interval a completion-to-next-start gap rather than a fixed cadence.
//!
//! Between ticks the loop sleeps for the smallest remaining time across
//! tasks, capped at [`MAX_TICK`] and floored at [`MIN_TICK`].

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::config_err;
use crate::error::{Error, Result};

/// Upper bound on the loop's sleep between ticks.
pub const MAX_TICK: Duration = Duration::from_secs(1);

/// Lower bound on the loop's sleep, to avoid busy-spinning.
pub const MIN_TICK: Duration = Duration::from_millis(50);

/// How long [`Scheduler::stop`] waits for the loop to exit.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Future returned by a task action.
pub type TaskFuture = BoxFuture<'static, Result<()>>;

/// Zero-argument recurring operation.
pub type TaskAction = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

/// A named recurring task.
pub struct ScheduledTask {
    name: String,
    interval: Duration,
    action: TaskAction,
    last_run: Option<Instant>,
}

impl std::fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("last_run", &self.last_run)
            .finish()
    }
}

impl ScheduledTask {
    /// Create a task. A zero interval is a configuration error.
    pub fn new<F, Fut>(name: impl Into<String>, interval: Duration, action: F) -> Result<Self>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let name = name.into();
        if interval.is_zero() {
            return Err(config_err!("Task '{}' must have a positive interval", name));
        }
        Ok(Self {
            name,
            interval,
            action: Arc::new(move || action().boxed()),
            last_run: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Time until the task is due; zero when due now. Never-run tasks are due.
    fn due_in(&self, now: Instant) -> Duration {
        match self.last_run {
            Some(last) => (last + self.interval).saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }

    /// Run the action, containing errors and panics.
    async fn run(&self) {
        trace!(task = %self.name, "Running scheduled task");
        let action = self.action.clone();
        let outcome = match std::panic::catch_unwind(AssertUnwindSafe(|| action())) {
            Ok(fut) => AssertUnwindSafe(fut).catch_unwind().await,
            Err(panic) => Err(panic),
        };

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(task = %self.name, error = %e, "Scheduled task failed");
            }
            Err(panic) => {
                let err = Error::TaskPanic {
                    task: self.name.clone(),
                    message: panic_message(panic.as_ref()),
                };
                error!(task = %self.name, "{}", err);
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Running loop state.
struct LoopHandle {
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

/// Single-loop scheduler for recurring tasks.
///
/// Tasks are registered with [`Scheduler::add`] before [`Scheduler::start`];
/// the task set is fixed once the loop runs.
#[derive(Default)]
pub struct Scheduler {
    tasks: Vec<ScheduledTask>,
    names: Vec<String>,
    running: Option<LoopHandle>,
    started: bool,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task. Fails after `start()` or on a duplicate name.
    pub fn add(&mut self, task: ScheduledTask) -> Result<()> {
        if self.started {
            return Err(config_err!(
                "Cannot add task '{}' after the scheduler has started",
                task.name
            ));
        }
        if self.names.contains(&task.name) {
            return Err(config_err!("Duplicate scheduled task name '{}'", task.name));
        }
        self.names.push(task.name.clone());
        debug!(task = %task.name, interval = ?task.interval, "Scheduled task added");
        self.tasks.push(task);
        Ok(())
    }

    /// Names of the registered tasks, in registration order.
    pub fn task_names(&self) -> Vec<String> {
        self.names.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .map(|h| !h.join.is_finished())
            .unwrap_or(false)
    }

    /// Spawn the timing loop. Calling it again is a no-op.
    pub fn start(&mut self) {
        if self.started {
            debug!("Scheduler already started");
            return;
        }
        self.started = true;

        let tasks = std::mem::take(&mut self.tasks);
        let (stop_tx, stop_rx) = watch::channel(false);
        let count = tasks.len();
        let join = tokio::spawn(run_loop(tasks, stop_rx));
        self.running = Some(LoopHandle { stop_tx, join });
        info!(tasks = count, "Scheduler started");
    }

    /// Ask the loop to exit and wait up to [`STOP_TIMEOUT`] for it.
    ///
    /// An in-flight task always finishes; the loop exits after it.
    pub async fn stop(&mut self) -> Result<()> {
        self.stop_with_timeout(STOP_TIMEOUT).await
    }

    pub async fn stop_with_timeout(&mut self, timeout: Duration) -> Result<()> {
        let Some(handle) = self.running.take() else {
            return Ok(());
        };
        let _ = handle.stop_tx.send(true);

        match tokio::time::timeout(timeout, handle.join).await {
            Ok(Ok(())) => {
                info!("Scheduler stopped");
                Ok(())
            }
            Ok(Err(e)) => Err(Error::Scheduler(format!("Scheduler loop failed: {}", e))),
            Err(_) => Err(Error::Scheduler(format!(
                "Scheduler loop did not stop within {:?}",
                timeout
            ))),
        }
    }
}

async fn run_loop(mut tasks: Vec<ScheduledTask>, mut stop_rx: watch::Receiver<bool>) {
    'ticks: loop {
        let mut next_delay = MAX_TICK;

        for task in tasks.iter_mut() {
            if *stop_rx.borrow() {
                break 'ticks;
            }
            let mut due_in = task.due_in(Instant::now());
            if due_in.is_zero() {
                task.run().await;
                task.last_run = Some(Instant::now());
                due_in = task.interval;
            }
            next_delay = next_delay.min(due_in.max(MIN_TICK));
        }

        tokio::select! {
            _ = tokio::time::sleep(next_delay) => {}
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
        }
    }
    debug!("Scheduler loop exited");
}
