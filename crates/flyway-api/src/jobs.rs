//! Background inference jobs.
//!
//! Large case batches run off the request path. The registry tracks
//! each job's status and holds its cancellation flag; a cancelled job
//! surfaces as `Cancelled` and stores nothing.

use dashmap::DashMap;
use flyway_network::CancelFlag;
use serde::{Deserialize, Serialize};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use uuid::Uuid;

/// Externally visible job status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed { network_id: Uuid },
    Failed { error: String },
    Cancelled,
}

#[derive(Debug)]
struct JobEntry {
    status: JobStatus,
    cancel: CancelFlag,
}

/// Registry of in-flight and finished inference jobs.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: DashMap<Uuid, JobEntry>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new running job; returns its id and cancel flag.
    pub fn start(&self) -> (Uuid, CancelFlag) {
        let job_id = Uuid::new_v4();
        let cancel = CancelFlag::default();
        self.jobs.insert(
            job_id,
            JobEntry {
                status: JobStatus::Running,
                cancel: Arc::clone(&cancel),
            },
        );
        (job_id, cancel)
    }

    pub fn complete(&self, job_id: Uuid, network_id: Uuid) {
        self.set_status(job_id, JobStatus::Completed { network_id });
    }

    pub fn fail(&self, job_id: Uuid, error: String) {
        self.set_status(job_id, JobStatus::Failed { error });
    }

    pub fn mark_cancelled(&self, job_id: Uuid) {
        self.set_status(job_id, JobStatus::Cancelled);
    }

    /// Raise a running job's cancel flag. Returns false for unknown or
    /// already finished jobs.
    pub fn cancel(&self, job_id: Uuid) -> bool {
        match self.jobs.get(&job_id) {
            Some(entry) if entry.status == JobStatus::Running => {
                entry.cancel.store(true, Ordering::Relaxed);
                true
            }
            _ => false,
        }
    }

    pub fn status(&self, job_id: Uuid) -> Option<JobStatus> {
        self.jobs.get(&job_id).map(|e| e.status.clone())
    }

    fn set_status(&self, job_id: Uuid, status: JobStatus) {
        if let Some(mut entry) = self.jobs.get_mut(&job_id) {
            entry.status = status;
        }
    }
}
