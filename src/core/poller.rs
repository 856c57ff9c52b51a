use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use super::backend::JobBackend;
use super::models::JobStatus;
use crate::api::types::JobOutcome;
use crate::db::JobStore;

/// Progress label for a status the client does not recognise.
pub const UNKNOWN_STATUS_LABEL: &str = "Working...";

#[derive(Debug, Clone, PartialEq)]
pub enum PollState {
    /// Job still running. `status` is `None` when the backend reported a
    /// status this client does not know.
    Waiting {
        status: Option<JobStatus>,
        label: String,
    },
    /// Terminal status reached; the payload is kept and never refetched.
    Finished {
        status: JobStatus,
        outcome: JobOutcome,
    },
    /// Status lookup failed after its retries.
    Errored(String),
    Cancelled,
}

impl PollState {
    fn queued() -> Self {
        PollState::Waiting {
            status: Some(JobStatus::Pending),
            label: JobStatus::Pending.label().to_string(),
        }
    }

    /// No further polls happen from this state.
    pub fn is_settled(&self) -> bool {
        !matches!(self, PollState::Waiting { .. })
    }

    pub fn label(&self) -> String {
        match self {
            PollState::Waiting { label, .. } => label.clone(),
            PollState::Finished { status, .. } => status.label().to_string(),
            PollState::Errored(message) => format!("Error checking status: {}", message),
            PollState::Cancelled => "Stopped".to_string(),
        }
    }
}

/// Client-side view of one job being polled.
#[derive(Debug, Clone)]
pub struct PollSession {
    job_id: String,
    state: PollState,
}

impl PollSession {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            state: PollState::queued(),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }
}

#[derive(Clone)]
pub struct JobPoller {
    backend: Arc<dyn JobBackend>,
    store: JobStore,
    interval: Duration,
}

impl JobPoller {
    pub fn new(backend: Arc<dyn JobBackend>, store: JobStore, interval: Duration) -> Self {
        Self {
            backend,
            store,
            interval,
        }
    }

    /// Perform one status check and fold it into `session`.
    ///
    /// A settled session is returned as is without touching the backend.
    pub async fn poll_once<'a>(&self, session: &'a mut PollSession) -> &'a PollState {
        if session.state.is_settled() {
            return &session.state;
        }

        let data = match self.backend.job_status(&session.job_id).await {
            Ok(data) => data,
            Err(e) => {
                warn!(job_id = %session.job_id, error = %e, "Job status check failed");
                session.state = PollState::Errored(e.to_string());
                return &session.state;
            }
        };

        session.state = match data.status() {
            Some(status) if status.is_terminal() => PollState::Finished {
                status,
                outcome: data.outcome(),
            },
            Some(status) => PollState::Waiting {
                status: Some(status),
                label: status.label().to_string(),
            },
            None => {
                debug!(job_id = %session.job_id, raw = ?data.status, "Unrecognised job status");
                PollState::Waiting {
                    status: None,
                    label: UNKNOWN_STATUS_LABEL.to_string(),
                }
            }
        };

        if let Some(status) = observed_status(&session.state) {
            // The store never fails loudly; a lost update only delays the
            // history view until the next observation.
            if let Err(e) = self.store.update_status(&session.job_id, status).await {
                warn!(job_id = %session.job_id, error = %e, "Failed to persist job status");
            }
        }

        &session.state
    }

    /// Poll `job_id` on a background task until it settles or is stopped.
    pub fn spawn(&self, job_id: impl Into<String>) -> PollHandle {
        let session = PollSession::new(job_id);
        let job_id = session.job_id.clone();
        let (tx, rx) = watch::channel(session.state.clone());
        let token = CancellationToken::new();

        let poller = self.clone();
        let cancel = token.clone();
        let task = tokio::spawn(async move { poller.run(session, tx, cancel).await });

        PollHandle {
            job_id,
            token: token.clone(),
            state: rx,
            task,
            _guard: token.drop_guard(),
        }
    }

    async fn run(
        self,
        mut session: PollSession,
        tx: watch::Sender<PollState>,
        cancel: CancellationToken,
    ) -> PollState {
        info!(job_id = %session.job_id, interval_ms = self.interval.as_millis() as u64, "Polling job");

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let state = self.poll_once(&mut session).await.clone();
            tx.send_replace(state.clone());

            if state.is_settled() {
                info!(job_id = %session.job_id, state = %state.label(), "Polling finished");
                return state;
            }
            debug!(job_id = %session.job_id, state = %state.label(), "Job still running");

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!(job_id = %session.job_id, "Polling stopped");
        tx.send_replace(PollState::Cancelled);
        PollState::Cancelled
    }
}

fn observed_status(state: &PollState) -> Option<JobStatus> {
    match state {
        PollState::Waiting { status, .. } => *status,
        PollState::Finished { status, .. } => Some(*status),
        PollState::Errored(_) | PollState::Cancelled => None,
    }
}

/// Owner of a background poll. Dropping the handle stops the poll before
/// its next scheduled check.
pub struct PollHandle {
    job_id: String,
    token: CancellationToken,
    state: watch::Receiver<PollState>,
    task: JoinHandle<PollState>,
    _guard: DropGuard,
}

impl PollHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Latest observed state.
    pub fn state(&self) -> PollState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state.clone()
    }

    /// Cancel the next scheduled check. A check already in flight is
    /// allowed to finish.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Wait for the poll to settle and return its final state.
    pub async fn wait(self) -> Result<PollState> {
        let job_id = self.job_id;
        self.task
            .await
            .with_context(|| format!("Polling task for job {} panicked", job_id))
    }
}
