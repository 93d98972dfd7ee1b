//! In-memory job registry. Jobs live for the lifetime of the process only.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::subject::{SubjectKind, SubjectRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub id: Uuid,
    pub subject_id: i64,
    pub subject_kind: SubjectKind,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Image reference on success.
    pub result: Option<String>,
    pub error: Option<String>,
}

impl Job {
    pub fn subject(&self) -> SubjectRef {
        SubjectRef::new(self.subject_kind, self.subject_id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobCounts {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug, Default)]
pub struct JobStore {
    jobs: Mutex<HashMap<Uuid, Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a `pending` job for `subject` and return its id.
    pub fn create(&self, subject: SubjectRef) -> Uuid {
        let id = Uuid::new_v4();
        let job = Job {
            id,
            subject_id: subject.id,
            subject_kind: subject.kind,
            status: JobStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            result: None,
            error: None,
        };
        self.jobs.lock().insert(id, job);
        tracing::info!(job_id = %id, %subject, "created job");
        id
    }

    /// Overwrite the status of `id`. Terminal statuses stamp `completed_at`.
    /// Unknown ids are ignored.
    pub fn update(&self, id: Uuid, status: JobStatus, result: Option<String>, error: Option<String>) {
        let mut jobs = self.jobs.lock();
        let Some(job) = jobs.get_mut(&id) else {
            tracing::debug!(job_id = %id, status = status.as_str(), "update for unknown job ignored");
            return;
        };
        job.status = status;
        if status.is_terminal() {
            job.completed_at = Some(Utc::now());
        }
        if result.is_some() {
            job.result = result;
        }
        if error.is_some() {
            job.error = error;
        }
        tracing::info!(
            job_id = %id,
            status = status.as_str(),
            result = job.result.as_deref(),
            error = job.error.as_deref(),
            "updated job"
        );
    }

    pub fn get(&self, id: Uuid) -> Option<Job> {
        self.jobs.lock().get(&id).cloned()
    }

    /// Snapshot of all jobs, newest first.
    pub fn list(&self) -> Vec<Job> {
        let mut out: Vec<Job> = self.jobs.lock().values().cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }

    pub fn counts(&self) -> JobCounts {
        let jobs = self.jobs.lock();
        let mut c = JobCounts::default();
        for j in jobs.values() {
            match j.status {
                JobStatus::Pending => c.pending += 1,
                JobStatus::Processing => c.processing += 1,
                JobStatus::Completed => c.completed += 1,
                JobStatus::Failed => c.failed += 1,
            }
        }
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject() -> SubjectRef {
        SubjectRef::new(SubjectKind::Scholarship, 42)
    }

    #[test]
    fn create_starts_pending() {
        let store = JobStore::new();
        let id = store.create(subject());
        let job = store.get(id).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.subject_id, 42);
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn terminal_update_stamps_completion() {
        let store = JobStore::new();
        let id = store.create(subject());
        store.update(id, JobStatus::Processing, None, None);
        assert!(store.get(id).unwrap().completed_at.is_none());

        store.update(id, JobStatus::Failed, None, Some("boom".into()));
        let job = store.get(id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("boom"));
        assert!(job.result.is_none());
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let store = JobStore::new();
        store.update(Uuid::new_v4(), JobStatus::Completed, Some("x".into()), None);
        assert!(store.get(Uuid::new_v4()).is_none());
        assert!(store.list().is_empty());
    }

    #[test]
    fn counts_follow_status() {
        let store = JobStore::new();
        let a = store.create(subject());
        let _b = store.create(subject());
        store.update(a, JobStatus::Completed, Some("/img.png".into()), None);
        let c = store.counts();
        assert_eq!(c.pending, 1);
        assert_eq!(c.completed, 1);
        assert_eq!(store.list().len(), 2);
    }
}
