use crate::pipeline::{run_stages, Pipeline, PipelineError};
use catdog_model::{ModelError, ModelHandle, ModelLoader, ModelRegistry};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::{
    collections::{BTreeMap, HashMap},
    path::PathBuf,
    sync::Arc,
};
use thiserror::Error;
use tracing::Instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Running,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Running)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingJob {
    id: String,
    status: JobState,
    force: bool,
    started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl TrainingJob {
    fn running(id: String, force: bool, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            status: JobState::Running,
            force,
            started_at,
            completed_at: None,
            error: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> JobState {
        self.status
    }

    pub fn force(&self) -> bool {
        self.force
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Moves a running job to its terminal state. Terminal jobs are left as
    /// they are and `false` is returned.
    fn finish(&mut self, outcome: &Result<(), JobFailure>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        match outcome {
            Ok(()) => self.status = JobState::Completed,
            Err(failure) => {
                self.status = JobState::Failed;
                self.error = Some(failure.to_string());
            }
        }
        self.completed_at = Some(Utc::now());
        true
    }
}

/// Why a job ended in `Failed`.
#[derive(Error, Debug)]
pub enum JobFailure {
    #[error("Pipeline reproduction failed: {0}")]
    Reproduce(#[from] PipelineError),
    #[error("Model reload failed: {0}")]
    Reload(#[from] ModelError),
    #[error("Model reload task aborted: {0}")]
    ReloadAborted(String),
    #[error("Training job aborted: {0}")]
    Aborted(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("Training job {0} not found")]
    NotFound(String),
}

type JobTable = Arc<RwLock<HashMap<String, TrainingJob>>>;

struct JobRunner {
    registry: Arc<ModelRegistry>,
    pipeline: Arc<dyn Pipeline>,
    loader: Arc<dyn ModelLoader>,
    model_path: PathBuf,
}

impl JobRunner {
    async fn run(&self, force: bool) -> Result<(), JobFailure> {
        run_stages(self.pipeline.as_ref(), force, |_, _| {}).await?;

        let loader = self.loader.clone();
        let model_path = self.model_path.clone();
        let classifier = tokio::task::spawn_blocking(move || loader.load(&model_path))
            .await
            .map_err(|e| JobFailure::ReloadAborted(e.to_string()))??;

        self.registry
            .swap(ModelHandle::new(classifier, self.model_path.clone()));
        Ok(())
    }
}

/// Starts retraining jobs in the background and keeps their records.
///
/// The table is never pruned; it lives as long as the process. Concurrent
/// jobs are not serialized against each other.
#[derive(Clone)]
pub struct JobOrchestrator {
    jobs: JobTable,
    runner: Arc<JobRunner>,
}

impl JobOrchestrator {
    pub fn new(
        registry: Arc<ModelRegistry>,
        pipeline: Arc<dyn Pipeline>,
        loader: Arc<dyn ModelLoader>,
        model_path: PathBuf,
    ) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            runner: Arc::new(JobRunner {
                registry,
                pipeline,
                loader,
                model_path,
            }),
        }
    }

    /// Registers a running job and spawns its execution; returns at once.
    /// Must be called from within a Tokio runtime.
    pub fn start_job(&self, force: bool) -> String {
        let job_id = {
            let mut jobs = self.jobs.write();
            let started_at = Utc::now();
            let job_id = unique_job_id(&jobs, started_at);
            jobs.insert(
                job_id.clone(),
                TrainingJob::running(job_id.clone(), force, started_at),
            );
            job_id
        };

        let jobs = self.jobs.clone();
        let runner = self.runner.clone();
        let span = tracing::info_span!("training_job", job_id = %job_id, force);
        let id = job_id.clone();

        tokio::spawn(
            async move {
                tracing::info!("Training job started");
                // Run in its own task so a panicking stage still ends the job.
                let work = async move { runner.run(force).await }.in_current_span();
                let outcome = tokio::spawn(work)
                    .await
                    .unwrap_or_else(|e| Err(JobFailure::Aborted(e.to_string())));
                match &outcome {
                    Ok(()) => tracing::info!("Training job completed"),
                    Err(e) => tracing::error!("Training job failed: {}", e),
                }
                if let Some(job) = jobs.write().get_mut(&id) {
                    job.finish(&outcome);
                }
            }
            .instrument(span),
        );

        job_id
    }

    pub fn get_job(&self, job_id: &str) -> Result<TrainingJob, JobError> {
        self.jobs
            .read()
            .get(job_id)
            .cloned()
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))
    }

    pub fn list_jobs(&self) -> BTreeMap<String, TrainingJob> {
        self.jobs
            .read()
            .iter()
            .map(|(id, job)| (id.clone(), job.clone()))
            .collect()
    }
}

fn unique_job_id(jobs: &HashMap<String, TrainingJob>, started_at: DateTime<Utc>) -> String {
    let base = format!("job_{}", started_at.format("%Y%m%d%H%M%S%6f"));
    if !jobs.contains_key(&base) {
        return base;
    }
    let mut discriminator = 1;
    loop {
        let candidate = format!("{}_{}", base, discriminator);
        if !jobs.contains_key(&candidate) {
            return candidate;
        }
        discriminator += 1;
    }
}
