//! Scheduled jobs.
//!
//! `run_scheduled` is the single entry point for periodic work; the
//! [`Scheduler`] drives it on a ticker and the admin API calls it on demand.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use crate::lifecycle::startup::Gateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduledJob {
    /// Drop rate-limit entries with nothing inside the current window.
    SweepRateLimits,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job: ScheduledJob,
    pub affected: usize,
}

pub fn run_scheduled(job: ScheduledJob, gateway: &Gateway) -> JobReport {
    let affected = match job {
        ScheduledJob::SweepRateLimits => gateway.limiter.evict_stale(Instant::now()),
    };
    tracing::debug!(?job, affected, "Scheduled job finished");
    JobReport { job, affected }
}

pub struct Scheduler {
    gateway: Arc<Gateway>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        let interval = Duration::from_secs(gateway.config.rate_limit.sweep_interval_secs);
        Self { gateway, interval }
    }

    /// Tick until shutdown is signalled.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it.
        ticker.tick().await;

        tracing::info!(interval_secs = self.interval.as_secs(), "Scheduler started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    run_scheduled(ScheduledJob::SweepRateLimits, &self.gateway);
                }
                _ = shutdown.recv() => {
                    tracing::info!("Scheduler stopping");
                    break;
                }
            }
        }
    }
}
