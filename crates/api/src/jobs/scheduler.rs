//! Periodic background jobs.
//!
//! Each registered job runs on its own tokio task with a fixed interval. A
//! run that fails is logged and counted; the job keeps its schedule.

use std::sync::Arc;
use std::time::{Duration, Instant};

use domain::RegistrationError;
use metrics::{counter, histogram};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobFrequency {
    Seconds(u64),
    Minutes(u64),
    Hourly,
}

impl JobFrequency {
    pub fn duration(&self) -> Duration {
        match self {
            JobFrequency::Seconds(secs) => Duration::from_secs(*secs),
            JobFrequency::Minutes(mins) => Duration::from_secs(*mins * 60),
            JobFrequency::Hourly => Duration::from_secs(3600),
        }
    }

    /// Frequency for a configured interval, in whole minutes when it divides evenly.
    pub fn from_secs(secs: u64) -> Self {
        if secs >= 60 && secs % 60 == 0 {
            JobFrequency::Minutes(secs / 60)
        } else {
            JobFrequency::Seconds(secs.max(1))
        }
    }
}

/// Failure of one job run.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct JobError(pub String);

impl From<RegistrationError> for JobError {
    fn from(err: RegistrationError) -> Self {
        JobError(err.to_string())
    }
}

#[async_trait::async_trait]
pub trait Job: Send + Sync {
    /// Stable name used in logs and metric labels.
    fn name(&self) -> &'static str;

    fn frequency(&self) -> JobFrequency;

    async fn execute(&self) -> Result<(), JobError>;
}

/// Runs `job` once and records the outcome.
async fn run_once(job: &dyn Job) -> bool {
    let name = job.name();
    let start = Instant::now();
    let result = job.execute().await;
    let elapsed = start.elapsed();

    histogram!("background_job_duration_seconds", "job" => name).record(elapsed.as_secs_f64());

    match result {
        Ok(()) => {
            counter!("background_job_runs_total", "job" => name, "result" => "ok").increment(1);
            tracing::debug!(job = name, elapsed_ms = elapsed.as_millis() as u64, "Job run finished");
            true
        }
        Err(e) => {
            counter!("background_job_runs_total", "job" => name, "result" => "error").increment(1);
            error!(
                job = name,
                elapsed_ms = elapsed.as_millis() as u64,
                error = %e,
                "Job run failed"
            );
            false
        }
    }
}

async fn run_schedule(job: Arc<dyn Job>, mut shutdown: watch::Receiver<bool>) {
    let name = job.name();
    let frequency = job.frequency();
    let mut interval = tokio::time::interval(frequency.duration());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // The first tick completes immediately; jobs start one period after boot.
    interval.tick().await;
    info!(job = name, frequency = ?frequency, "Job scheduled");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                run_once(job.as_ref()).await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!(job = name, "Job stopped");
                    return;
                }
            }
        }
    }
}

pub struct JobScheduler {
    jobs: Vec<Arc<dyn Job>>,
    shutdown_tx: watch::Sender<bool>,
    tasks: JoinSet<()>,
}

impl JobScheduler {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            jobs: Vec::new(),
            shutdown_tx,
            tasks: JoinSet::new(),
        }
    }

    pub fn register<J: Job + 'static>(&mut self, job: J) {
        self.jobs.push(Arc::new(job));
    }

    pub fn start(&mut self) {
        info!(jobs = self.jobs.len(), "Starting job scheduler");
        for job in &self.jobs {
            self.tasks
                .spawn(run_schedule(Arc::clone(job), self.shutdown_tx.subscribe()));
        }
    }

    /// Signals every job to stop after its current run.
    pub fn shutdown(&self) {
        info!("Stopping job scheduler");
        self.shutdown_tx.send_replace(true);
    }

    /// Waits for job tasks to finish, aborting whatever is left after `timeout`.
    pub async fn wait_for_shutdown(mut self, timeout: Duration) {
        let drain = async {
            while let Some(joined) = self.tasks.join_next().await {
                if let Err(e) = joined {
                    warn!(error = %e, "Job task panicked");
                }
            }
        };

        if tokio::time::timeout(timeout, drain).await.is_err() {
            warn!(timeout = ?timeout, "Jobs still running at shutdown deadline; aborting");
            self.tasks.abort_all();
        }
    }
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}
