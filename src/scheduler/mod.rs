//! Task Scheduler (§4.8): a cooperative in-process scheduler, not a
//! general-purpose cron — purpose-built for driving this crate's own
//! periodic tasks (`download_monitor`, `auto_download`,
//! `cleanup_orphaned_covers`) from a single composition root.
//!
//! Tasks never overlap with their own prior invocation: `next_run` only
//! advances once a task's future resolves, so a task that outruns its
//! own interval simply delays its next tick rather than running twice
//! concurrently (§5: "Monitor runs are non-overlapping with
//! themselves"). Distinct tasks run concurrently with each other.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{error, info, instrument, warn};

/// A registered task's async body, boxed so heterogeneous tasks can
/// share one registry.
pub type TaskFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;
pub type TaskFn = Box<dyn Fn() -> TaskFuture + Send + Sync>;

const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// The outcome of a task's most recent run, for the status snapshot.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    /// Has not run yet since registration.
    NeverRun,
    Success,
    Failed(String),
}

struct TaskEntry {
    task_fn: TaskFn,
    interval: Duration,
    last_run: Option<DateTime<Utc>>,
    next_run: DateTime<Utc>,
    last_status: TaskOutcome,
    running: bool,
}

/// A point-in-time view of one task's bookkeeping, returned by
/// [`Scheduler::status`].
#[derive(Debug, Clone)]
pub struct TaskStatus {
    pub interval: Duration,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: DateTime<Utc>,
    pub last_status: TaskOutcome,
}

/// A snapshot of the scheduler and every registered task.
#[derive(Debug, Clone)]
pub struct SchedulerStatus {
    pub running: bool,
    pub tasks: HashMap<String, TaskStatus>,
}

/// Cooperative periodic task driver (§4.8).
pub struct Scheduler {
    tasks: Arc<RwLock<HashMap<String, TaskEntry>>>,
    running: Arc<AtomicBool>,
    stop_requested: Arc<AtomicBool>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            running: Arc::new(AtomicBool::new(false)),
            stop_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Registers a task under `name`, to run every `interval` starting
    /// one interval from now. Re-registering an existing name replaces it.
    pub async fn register(&self, name: impl Into<String>, interval: Duration, task_fn: TaskFn) {
        let name = name.into();
        let entry = TaskEntry {
            task_fn,
            interval,
            last_run: None,
            next_run: Utc::now() + chrono_duration(interval),
            last_status: TaskOutcome::NeverRun,
            running: false,
        };
        self.tasks.write().await.insert(name, entry);
    }

    /// Runs the scheduler loop until [`Scheduler::stop`] is called.
    /// Ticks once a second; a tick that finds a due, non-running task
    /// spawns it and moves on without waiting for it to finish.
    #[instrument(skip(self))]
    pub async fn run(&self) {
        self.running.store(true, Ordering::SeqCst);
        self.stop_requested.store(false, Ordering::SeqCst);
        info!("scheduler started");

        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        while !self.stop_requested.load(Ordering::SeqCst) {
            ticker.tick().await;
            self.dispatch_due_tasks().await;
        }

        self.running.store(false, Ordering::SeqCst);
        info!("scheduler stopped");
    }

    /// Signals [`Scheduler::run`] to exit after its current tick.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    /// Returns a snapshot of the scheduler and all registered tasks.
    pub async fn status(&self) -> SchedulerStatus {
        let tasks = self.tasks.read().await;
        let task_statuses = tasks
            .iter()
            .map(|(name, entry)| {
                (
                    name.clone(),
                    TaskStatus {
                        interval: entry.interval,
                        last_run: entry.last_run,
                        next_run: entry.next_run,
                        last_status: entry.last_status.clone(),
                    },
                )
            })
            .collect();

        SchedulerStatus { running: self.running.load(Ordering::SeqCst), tasks: task_statuses }
    }

    async fn dispatch_due_tasks(&self) {
        let now = Utc::now();
        let due: Vec<String> = {
            let mut tasks = self.tasks.write().await;
            let mut due = Vec::new();
            for (name, entry) in tasks.iter_mut() {
                if !entry.running && now >= entry.next_run {
                    entry.running = true;
                    due.push(name.clone());
                }
            }
            due
        };

        for name in due {
            self.spawn_task(name).await;
        }
    }

    async fn spawn_task(&self, name: String) {
        let future = {
            let tasks = self.tasks.read().await;
            let Some(entry) = tasks.get(&name) else { return };
            (entry.task_fn)()
        };

        let tasks = Arc::clone(&self.tasks);
        tokio::spawn(async move {
            let result = future.await;
            let finished_at = Utc::now();

            let mut tasks = tasks.write().await;
            if let Some(entry) = tasks.get_mut(&name) {
                entry.last_run = Some(finished_at);
                entry.next_run = finished_at + chrono_duration(entry.interval);
                entry.running = false;
                match &result {
                    Ok(()) => {
                        entry.last_status = TaskOutcome::Success;
                    }
                    Err(error) => {
                        warn!(task = %name, %error, "scheduled task failed; scheduler continues");
                        entry.last_status = TaskOutcome::Failed(error.to_string());
                    }
                }
            } else {
                error!(task = %name, "task vanished from registry before completion");
            }
        });
    }
}

fn chrono_duration(interval: Duration) -> chrono::Duration {
    chrono::Duration::from_std(interval).unwrap_or(chrono::Duration::seconds(1))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_register_and_status_before_any_run() {
        let scheduler = Scheduler::new();
        scheduler
            .register("noop", Duration::from_secs(60), Box::new(|| Box::pin(async { Ok(()) })))
            .await;

        let status = scheduler.status().await;
        let task = status.tasks.get("noop").unwrap();
        assert!(task.last_run.is_none());
        assert!(matches!(task.last_status, TaskOutcome::NeverRun));
    }

    #[tokio::test(start_paused = true)]
    async fn test_due_task_runs_and_reschedules() {
        let scheduler = Arc::new(Scheduler::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let counter_clone = Arc::clone(&counter);
        scheduler
            .register(
                "count",
                Duration::from_secs(2),
                Box::new(move || {
                    let counter = Arc::clone(&counter_clone);
                    Box::pin(async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                }),
            )
            .await;

        let run_handle = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.run().await })
        };

        tokio::time::advance(Duration::from_secs(3)).await;
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_millis(50)).await;
        tokio::task::yield_now().await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);

        scheduler.stop();
        tokio::time::advance(Duration::from_secs(2)).await;
        let _ = run_handle.await;
    }

    #[tokio::test]
    async fn test_failed_task_does_not_abort_scheduler() {
        let scheduler = Scheduler::new();
        scheduler
            .register(
                "always-fails",
                Duration::from_secs(60),
                Box::new(|| Box::pin(async { Err(anyhow::anyhow!("boom")) })),
            )
            .await;

        scheduler.dispatch_due_tasks().await;
        // Give the spawned task a chance to run and record its outcome.
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let status = scheduler.status().await;
        let task = status.tasks.get("always-fails").unwrap();
        assert!(matches!(task.last_status, TaskOutcome::Failed(_)));
    }
}
