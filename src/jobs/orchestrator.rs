//! Drives one image-generation job from `pending` to a terminal state.
//!
//! Lifecycle: `processing` on dispatch → load subject → wait for a rate-limit
//! slot → call the generator → persist the reference → `completed`. Any error
//! after dispatch ends in `failed` with the error text. Nothing is retried here.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::imagegen::DynImageGenerator;
use crate::jobs::rate_limit::RateLimiter;
use crate::jobs::store::{JobStatus, JobStore};
use crate::store::DynStore;
use crate::subject::{SubjectKind, SubjectRef};

/// Added to every computed rate-limit wait.
pub const SAFETY_MARGIN: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct ImageJobRunner {
    store: DynStore,
    jobs: Arc<JobStore>,
    limiter: Arc<RateLimiter>,
    images: DynImageGenerator,
}

impl ImageJobRunner {
    pub fn new(
        store: DynStore,
        jobs: Arc<JobStore>,
        limiter: Arc<RateLimiter>,
        images: DynImageGenerator,
    ) -> Self {
        Self {
            store,
            jobs,
            limiter,
            images,
        }
    }

    pub fn jobs(&self) -> &Arc<JobStore> {
        &self.jobs
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn images(&self) -> &DynImageGenerator {
        &self.images
    }

    /// Create one job per entity of `kind` lacking an image and spawn a runner
    /// task for each. Returns the new job ids.
    pub async fn schedule_missing(&self, kind: SubjectKind) -> anyhow::Result<Vec<Uuid>> {
        let ids = kind.missing_image(self.store.as_ref()).await?;
        let mut job_ids = Vec::with_capacity(ids.len());
        for id in ids {
            let subject = SubjectRef::new(kind, id);
            let job_id = self.jobs.create(subject);
            self.dispatch(job_id, subject);
            job_ids.push(job_id);
        }
        tracing::info!(kind = kind.as_str(), queued = job_ids.len(), "scheduled image jobs");
        Ok(job_ids)
    }

    /// Run `job_id` on its own task.
    pub fn dispatch(&self, job_id: Uuid, subject: SubjectRef) -> JoinHandle<JobStatus> {
        let runner = self.clone();
        tokio::spawn(async move { runner.run(job_id, subject).await })
    }

    /// Drive the job to a terminal state and return it.
    pub async fn run(&self, job_id: Uuid, subject: SubjectRef) -> JobStatus {
        self.jobs.update(job_id, JobStatus::Processing, None, None);

        match self.process(subject).await {
            Ok(image_url) => {
                self.jobs
                    .update(job_id, JobStatus::Completed, Some(image_url), None);
                counter!("image_jobs_total", "outcome" => "completed").increment(1);
                JobStatus::Completed
            }
            Err(e) => {
                tracing::warn!(job_id = %job_id, %subject, error = %e, "image job failed");
                self.jobs
                    .update(job_id, JobStatus::Failed, None, Some(e.to_string()));
                counter!("image_jobs_total", "outcome" => "failed").increment(1);
                JobStatus::Failed
            }
        }
    }

    async fn process(&self, subject: SubjectRef) -> anyhow::Result<String> {
        let entity = subject
            .kind
            .load(self.store.as_ref(), subject.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("{subject} not found"))?;

        let prompt = entity.image_prompt();

        self.wait_for_slot(subject).await;

        let image_url = self.images.generate(&prompt, subject).await?;
        entity.attach_image(self.store.as_ref(), &image_url).await?;
        Ok(image_url)
    }

    /// Poll-sleep-recheck until the limiter admits one request, then record it.
    /// No upper bound on waiting.
    async fn wait_for_slot(&self, subject: SubjectRef) {
        while !self.limiter.try_acquire() {
            let wait = self.limiter.time_until_available() + SAFETY_MARGIN;
            tracing::info!(%subject, wait_secs = wait.as_secs_f64(), "image rate limit reached; waiting");
            counter!("image_rate_limit_waits_total").increment(1);
            tokio::time::sleep(wait).await;
        }
    }
}
