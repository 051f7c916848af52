//! Job Poller
//!
//! Drives one job to a terminal state by repeated read-only status queries.
//!
//! ```text
//! Unknown ──► Queued ──► Running ──► Succeeded   (return the job)
//!                                ├─► Failed      (JobFailed, no retry)
//!                                ├─► Cancelled   (JobTerminal, no retry)
//!                                └─► Expired     (JobTerminal, no retry)
//! ```
//!
//! A query that fails for any other reason (network, non-2xx, malformed body,
//! per-query timeout) is logged and the loop keeps its fixed cadence until the
//! overall deadline passes, at which point `PollTimeout` is raised. A session
//! therefore ends in exactly one of: succeeded job, terminal-state error,
//! timeout error.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::video::{Job, JobStatus};
use super::video_jobs::VideoJobApi;
use crate::core::transport::HeaderSet;
use crate::core::{CoreError, CoreResult, JobId, SessionId};

/// Deadline used when `now + timeout` is not representable
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

// =============================================================================
// Poll Session
// =============================================================================

/// Last status the session has seen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    /// No successful query yet
    Unknown,
    Observed(JobStatus),
}

/// Client-side state of one polling loop
#[derive(Debug, Clone)]
pub struct PollSession {
    pub session_id: SessionId,
    pub job_id: JobId,
    pub started_at: Instant,
    pub deadline: Instant,
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub state: PollState,
    /// Status queries issued
    pub queries: u32,
    /// Queries that failed and were tolerated
    pub failed_queries: u32,
}

impl PollSession {
    /// Starts a session now with `deadline = now + timeout`.
    ///
    /// A timeout too large for the clock puts the deadline in the far future.
    pub fn start(job_id: impl Into<JobId>, timeout: Duration, poll_interval: Duration) -> Self {
        let started_at = Instant::now();
        let deadline = started_at
            .checked_add(timeout)
            .or_else(|| started_at.checked_add(FAR_FUTURE))
            .unwrap_or(started_at);
        Self {
            session_id: ulid::Ulid::new().to_string(),
            job_id: job_id.into(),
            started_at,
            deadline,
            timeout,
            poll_interval,
            state: PollState::Unknown,
            queries: 0,
            failed_queries: 0,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Time left before the deadline
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Delay before the next query: the poll interval, capped at the time left
    pub fn next_delay(&self) -> Duration {
        self.poll_interval.min(self.remaining())
    }

    /// Records a successful status query.
    ///
    /// Returns the job when it succeeded, an error when it ended otherwise,
    /// and `None` while it is still in progress.
    pub fn observe(&mut self, job: Job) -> CoreResult<Option<Job>> {
        self.queries += 1;
        self.state = PollState::Observed(job.status.clone());

        match &job.status {
            JobStatus::Succeeded => Ok(Some(job)),
            JobStatus::Failed => Err(CoreError::JobFailed {
                job_id: self.job_id.clone(),
                message: job.failure_message(),
                code: job.failure_code(),
            }),
            JobStatus::Cancelled | JobStatus::Expired => Err(CoreError::JobTerminal {
                job_id: self.job_id.clone(),
                status: job.status.clone(),
            }),
            JobStatus::Queued | JobStatus::Running | JobStatus::Other(_) => Ok(None),
        }
    }

    /// Records a tolerated query failure
    pub fn record_failure(&mut self) {
        self.queries += 1;
        self.failed_queries += 1;
    }

    /// The error raised when the deadline passes
    pub fn timeout_error(&self) -> CoreError {
        CoreError::PollTimeout {
            job_id: self.job_id.clone(),
            timeout: self.timeout,
        }
    }
}

// =============================================================================
// Poller
// =============================================================================

/// Polls jobs of one deployment until they reach a terminal state
#[derive(Debug, Clone)]
pub struct JobPoller {
    api: VideoJobApi,
    query_timeout: Duration,
}

impl JobPoller {
    /// `query_timeout` bounds each status check independently of the overall timeout
    pub fn new(api: VideoJobApi, query_timeout: Duration) -> Self {
        Self { api, query_timeout }
    }

    /// Waits for `job_id` to reach a terminal state.
    ///
    /// Returns the job only when it succeeded. Failed, cancelled and expired
    /// jobs short-circuit with an error; everything else is retried every
    /// `poll_interval` until `timeout` has elapsed.
    pub async fn poll(
        &self,
        job_id: &str,
        headers: &HeaderSet,
        timeout: Duration,
        poll_interval: Duration,
    ) -> CoreResult<Job> {
        let mut session = PollSession::start(job_id, timeout, poll_interval);
        debug!(
            session = %session.session_id,
            "Polling job {} (timeout {}s, interval {}s)",
            job_id,
            timeout.as_secs(),
            poll_interval.as_secs()
        );

        while !session.is_expired() {
            let budget = self.query_timeout.min(session.remaining());
            match self.query(job_id, headers, budget).await {
                Ok(job) => {
                    let status = job.status.clone();
                    debug!(session = %session.session_id, "Job {} status: {}", job_id, status);
                    if let Some(done) = session.observe(job)? {
                        info!(
                            session = %session.session_id,
                            "Job {} succeeded after {} queries in {:.1}s",
                            job_id,
                            session.queries,
                            session.elapsed().as_secs_f64()
                        );
                        return Ok(done);
                    }
                }
                Err(e) => {
                    session.record_failure();
                    warn!(
                        session = %session.session_id,
                        "Error polling job {} status: {}, retrying...",
                        job_id,
                        e
                    );
                }
            }

            tokio::time::sleep(session.next_delay()).await;
        }

        warn!(
            session = %session.session_id,
            "Job {} still {:?} after {}s ({} queries, {} failed)",
            job_id,
            session.state,
            timeout.as_secs(),
            session.queries,
            session.failed_queries
        );
        Err(session.timeout_error())
    }

    /// One status query bounded by `budget`, the per-query timeout capped at
    /// the time left in the session
    async fn query(&self, job_id: &str, headers: &HeaderSet, budget: Duration) -> CoreResult<Job> {
        tokio::time::timeout(budget, self.api.get_job(job_id, headers, budget))
            .await
            .unwrap_or_else(|_| {
                Err(CoreError::Network(format!(
                    "Status query timed out after {:.1}s",
                    budget.as_secs_f64()
                )))
            })
    }
}
