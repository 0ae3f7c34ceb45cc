//! Heartbeat: time-triggered jobs.
//!
//! Runs as a background Tokio task, ticking at a configurable interval. Each
//! tick evaluates the report's cron schedule and runs it when due.

pub mod daily_report;
pub mod scheduler;

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::watch;
use tracing::info;

use self::daily_report::{DailyReport, RunOutcome, Trigger};
use self::scheduler::{CronTrigger, SchedulerState};

/// Shared dependencies for the heartbeat runner.
pub struct HeartbeatDeps {
    /// The report job.
    pub report: Arc<DailyReport>,
    /// When the report fires.
    pub trigger: CronTrigger,
    /// Schedule evaluation interval.
    pub tick: Duration,
}

/// Run the heartbeat background loop.
///
/// Exits when the shutdown signal is received or the watch channel closes.
pub async fn run_heartbeat(deps: HeartbeatDeps, mut shutdown_rx: watch::Receiver<bool>) {
    let started = Local::now();
    info!(
        cron = deps.trigger.expression(),
        next_run = ?deps.trigger.next_after(&started),
        tick_secs = deps.tick.as_secs(),
        "heartbeat started"
    );

    let mut interval = tokio::time::interval(deps.tick);
    let mut state = SchedulerState::new(started);

    // Skip the first immediate tick.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                run_tick(&deps, &mut state).await;
            }
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    info!("heartbeat shutting down");
                    break;
                }
            }
        }
    }

    info!("heartbeat stopped");
}

/// Execute a single heartbeat tick. Returns the outcome if the job ran.
pub async fn run_tick(deps: &HeartbeatDeps, state: &mut SchedulerState) -> Option<RunOutcome> {
    let now = Local::now();
    if !deps.trigger.is_due(state, now) {
        return None;
    }

    state.record_run(deps.trigger.name(), now);
    let outcome = deps.report.run(Trigger::Scheduled).await;
    info!(
        job = deps.trigger.name(),
        next_run = ?deps.trigger.next_after(&now),
        "scheduled job finished"
    );
    Some(outcome)
}
