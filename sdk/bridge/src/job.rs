//! Handles for asynchronous server-side work.
//!
//! The SDK only reports which job or schedule an operation started; polling
//! and cancelling jobs belong to the caller's job tooling.

/// A job the service started in response to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobHandle {
    job_id: u64,
}

impl JobHandle {
    pub fn new(job_id: u64) -> Self {
        Self { job_id }
    }

    pub fn job_id(&self) -> u64 {
        self.job_id
    }
}

impl std::fmt::Display for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job {}", self.job_id)
    }
}

/// What a task request produced: a job now, or a schedule for later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Started(JobHandle),
    Scheduled { task_id: u64 },
}

impl TaskOutcome {
    pub fn job(&self) -> Option<JobHandle> {
        match self {
            TaskOutcome::Started(job) => Some(*job),
            TaskOutcome::Scheduled { .. } => None,
        }
    }
}
