//! Job manager: a flat registry of interval jobs on a shared scheduler.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use uuid::Uuid;

use crate::job::{Job, JobError};

struct Entry {
    job: Arc<dyn Job>,
    schedule: Option<Uuid>,
}

/// Registers jobs by name and starts or stops each one independently.
///
/// Starting a running job or stopping a stopped one is a no-op.
pub struct JobManager {
    scheduler: JobScheduler,
    started: AtomicBool,
    jobs: Mutex<HashMap<String, Entry>>,
}

impl std::fmt::Debug for JobManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobManager")
            .field("started", &self.started.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl JobManager {
    /// Creates a manager with an idle scheduler.
    pub async fn new() -> Result<Self, JobError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| JobError::Scheduler(format!("Failed to create scheduler: {e}")))?;

        Ok(Self {
            scheduler,
            started: AtomicBool::new(false),
            jobs: Mutex::new(HashMap::new()),
        })
    }

    /// Registers `job` under `name`, replacing and stopping any previous one.
    pub async fn register(&self, name: impl Into<String>, job: Arc<dyn Job>) {
        let name = name.into();
        let previous = self
            .jobs
            .lock()
            .await
            .insert(name.clone(), Entry { job, schedule: None });

        if let Some(Entry {
            schedule: Some(id), ..
        }) = previous
        {
            self.unschedule(&name, id).await;
        }
        tracing::info!(job = %name, "Registered job");
    }

    /// Looks up a registered job.
    pub async fn get_job(&self, name: &str) -> Option<Arc<dyn Job>> {
        self.jobs
            .lock()
            .await
            .get(name)
            .map(|entry| Arc::clone(&entry.job))
    }

    /// Registered job names, sorted.
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.jobs.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Whether `name` is currently scheduled.
    pub async fn is_running(&self, name: &str) -> bool {
        self.jobs
            .lock()
            .await
            .get(name)
            .is_some_and(|entry| entry.schedule.is_some())
    }

    /// Schedules one job. Returns `false` if it was already running.
    pub async fn start(&self, name: &str) -> Result<bool, JobError> {
        let mut jobs = self.jobs.lock().await;
        let entry = jobs
            .get_mut(name)
            .ok_or_else(|| JobError::NotFound(name.to_string()))?;
        if entry.schedule.is_some() {
            return Ok(false);
        }

        let interval = entry.job.interval();
        if interval.is_zero() {
            return Err(JobError::InvalidSchedule {
                name: name.to_string(),
                reason: "interval must be greater than zero".to_string(),
            });
        }

        let job = Arc::clone(&entry.job);
        let label = name.to_string();
        let cron = CronJob::new_repeated_async(interval, move |_uuid, _lock| {
            let job = Arc::clone(&job);
            let label = label.clone();
            Box::pin(async move {
                run_logged(&label, job.as_ref()).await;
            })
        })
        .map_err(|e| JobError::InvalidSchedule {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

        let id = self
            .scheduler
            .add(cron)
            .await
            .map_err(|e| JobError::Scheduler(format!("Failed to add '{name}': {e}")))?;
        entry.schedule = Some(id);
        drop(jobs);

        self.ensure_started().await?;
        tracing::info!(job = %name, interval_secs = interval.as_secs(), "Started job");
        Ok(true)
    }

    /// Unschedules one job. Returns `false` if it was not running.
    ///
    /// A tick already dispatched is allowed to finish.
    pub async fn stop(&self, name: &str) -> Result<bool, JobError> {
        let id = {
            let mut jobs = self.jobs.lock().await;
            let entry = jobs
                .get_mut(name)
                .ok_or_else(|| JobError::NotFound(name.to_string()))?;
            match entry.schedule.take() {
                Some(id) => id,
                None => return Ok(false),
            }
        };

        self.unschedule(name, id).await;
        tracing::info!(job = %name, "Stopped job");
        Ok(true)
    }

    /// Starts every registered job.
    ///
    /// A job that fails to start is logged and skipped; the failures are
    /// returned by name.
    pub async fn start_all(&self) -> Vec<(String, JobError)> {
        let mut failures = Vec::new();
        for name in self.names().await {
            if let Err(err) = self.start(&name).await {
                tracing::error!(job = %name, error = %err, "Failed to start job");
                failures.push((name, err));
            }
        }
        failures
    }

    /// Stops every registered job.
    pub async fn stop_all(&self) {
        for name in self.names().await {
            if let Err(err) = self.stop(&name).await {
                tracing::warn!(job = %name, error = %err, "Failed to stop job");
            }
        }
    }

    /// Runs a registered job once, outside its schedule.
    pub async fn run_now(&self, name: &str) -> Result<serde_json::Value, JobError> {
        let job = self
            .get_job(name)
            .await
            .ok_or_else(|| JobError::NotFound(name.to_string()))?;
        job.run().await
    }

    async fn ensure_started(&self) -> Result<(), JobError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Err(e) = self.scheduler.start().await {
            self.started.store(false, Ordering::SeqCst);
            return Err(JobError::Scheduler(format!("Failed to start scheduler: {e}")));
        }
        tracing::info!("Job scheduler started");
        Ok(())
    }

    async fn unschedule(&self, name: &str, id: Uuid) {
        if let Err(e) = self.scheduler.remove(&id).await {
            tracing::warn!(job = %name, error = %e, "Failed to remove job schedule");
        }
    }
}

async fn run_logged(name: &str, job: &dyn Job) {
    match job.run().await {
        Ok(summary) => tracing::debug!(job = %name, summary = %summary, "Job tick completed"),
        Err(err) => tracing::error!(job = %name, error = %err, "Job tick failed"),
    }
}
