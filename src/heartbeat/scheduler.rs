//! Cron evaluation for scheduled jobs.
//!
//! Expressions use the six-field `cron` crate syntax (seconds first) and are
//! evaluated in server-local time.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Local};

/// A named job schedule.
#[derive(Debug, Clone)]
pub struct CronTrigger {
    name: String,
    expression: String,
    schedule: cron::Schedule,
}

impl CronTrigger {
    /// Parse a cron expression for the job `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the expression is not valid cron syntax.
    pub fn parse(name: &str, expression: &str) -> anyhow::Result<Self> {
        let schedule = cron::Schedule::from_str(expression)
            .map_err(|e| anyhow::anyhow!("invalid cron expression {expression:?} for {name}: {e}"))?;
        Ok(Self {
            name: name.to_owned(),
            expression: expression.to_owned(),
            schedule,
        })
    }

    /// Job name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source expression.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First fire time strictly after `after`.
    pub fn next_after(&self, after: &DateTime<Local>) -> Option<DateTime<Local>> {
        self.schedule.after(after).next()
    }

    /// Whether a fire time lies between the last run (or the scheduler
    /// baseline) and `now`.
    pub fn is_due(&self, state: &SchedulerState, now: DateTime<Local>) -> bool {
        let after = state
            .last_run_for(&self.name)
            .copied()
            .unwrap_or(state.baseline);
        self.next_after(&after).is_some_and(|next| next <= now)
    }
}

/// Tracks last-run timestamps for scheduled jobs.
#[derive(Debug)]
pub struct SchedulerState {
    /// Map of job name to last execution time.
    last_run: HashMap<String, DateTime<Local>>,
    /// Never-run jobs only fire for times after this instant.
    baseline: DateTime<Local>,
}

impl SchedulerState {
    /// Create a state whose never-run jobs wait for their next fire time
    /// after `baseline`. Using process start avoids a catch-up run at boot.
    pub fn new(baseline: DateTime<Local>) -> Self {
        Self {
            last_run: HashMap::new(),
            baseline,
        }
    }

    /// Record that a job was executed at the given time.
    pub fn record_run(&mut self, name: &str, at: DateTime<Local>) {
        self.last_run.insert(name.to_owned(), at);
    }

    /// Get the last run time for a job.
    pub fn last_run_for(&self, name: &str) -> Option<&DateTime<Local>> {
        self.last_run.get(name)
    }
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self::new(Local::now())
    }
}
