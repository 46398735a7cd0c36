// src/scheduler.rs
//! Daily time-of-day scheduling.
//!
//! The loop wakes every `poll_interval`, works out how many configured slots passed since
//! the previous tick and runs the job once per slot. Each run happens on its own task, so an
//! error or a panic inside a run is logged and the loop keeps going.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime, NaiveTime};
use metrics::{counter, gauge};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::error::ConfigError;

/// Sorted, deduplicated local times of day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    times: Vec<NaiveTime>,
}

impl Schedule {
    /// Accepts `HH:MM` and `HH:MM:SS`.
    pub fn parse(raw: &[String]) -> Result<Self, ConfigError> {
        let mut times = Vec::with_capacity(raw.len());
        for s in raw {
            let s = s.trim();
            let t = NaiveTime::parse_from_str(s, "%H:%M:%S")
                .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                .map_err(|e| ConfigError::invalid("general.schedule_time", format!("`{s}`: {e}")))?;
            times.push(t);
        }
        if times.is_empty() {
            return Err(ConfigError::Missing("general.schedule_time"));
        }
        times.sort();
        times.dedup();
        Ok(Self { times })
    }

    pub fn times(&self) -> &[NaiveTime] {
        &self.times
    }

    /// Number of scheduled slots in `(last, now]`.
    pub fn due_between(&self, last: NaiveDateTime, now: NaiveDateTime) -> usize {
        if now <= last {
            return 0;
        }
        let mut due = 0;
        let mut day = last.date();
        while day <= now.date() {
            for t in &self.times {
                let slot = day.and_time(*t);
                if slot > last && slot <= now {
                    due += 1;
                }
            }
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
        due
    }
}

#[async_trait::async_trait]
pub trait ScheduledJob: Send + Sync + 'static {
    fn name(&self) -> &str;
    async fn run(&self) -> anyhow::Result<()>;
}

/// Run `job` once on a separate task. Returns `false` if it failed or panicked.
pub async fn run_guarded(job: Arc<dyn ScheduledJob>) -> bool {
    let name = job.name().to_string();
    counter!("digest_runs_total").increment(1);
    gauge!("digest_last_run_ts").set(Local::now().timestamp() as f64);

    let handle = tokio::spawn(async move { job.run().await });
    match handle.await {
        Ok(Ok(())) => {
            info!(target: "scheduler", job = %name, "run finished");
            true
        }
        Ok(Err(e)) => {
            error!(target: "scheduler", job = %name, error = ?e, "run failed");
            false
        }
        Err(join) => {
            error!(target: "scheduler", job = %name, panicked = join.is_panic(), "run aborted");
            false
        }
    }
}

pub struct Scheduler {
    schedule: Schedule,
    poll_interval: Duration,
}

impl Scheduler {
    pub fn new(schedule: Schedule, poll_interval: Duration) -> Self {
        Self {
            schedule,
            poll_interval,
        }
    }

    /// Runs owed for the window `(last, now]`. Slots missed during a suspend or a clock jump
    /// collapse into a single run.
    pub fn runs_due(&self, last: NaiveDateTime, now: NaiveDateTime) -> usize {
        let due = self.schedule.due_between(last, now);
        if due > 1 {
            warn!(target: "scheduler", missed = due - 1, "several slots passed since the last tick, running once");
        }
        due.min(1)
    }

    /// Never returns.
    pub async fn run_forever(&self, job: Arc<dyn ScheduledJob>) {
        for t in self.schedule.times() {
            info!(target: "scheduler", at = %t.format("%H:%M:%S"), job = job.name(), "daily run scheduled");
        }

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last = Local::now().naive_local();
        loop {
            ticker.tick().await;
            let now = Local::now().naive_local();
            if self.runs_due(last, now) > 0 {
                run_guarded(job.clone()).await;
            }
            last = now;
        }
    }
}
