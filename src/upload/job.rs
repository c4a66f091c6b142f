// SPDX-License-Identifier: GPL-3.0-only

use super::{CredentialFieldSet, FieldKind, JobType};

/// Lifecycle of an upload job.
///
/// `Created → Running → (AwaitingCredentials ⇄ Running)* → Completed | Failed | Cancelled`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Created,
    Running,
    AwaitingCredentials,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    #[must_use]
    pub fn can_advance_to(self, next: JobState) -> bool {
        use JobState::{AwaitingCredentials, Cancelled, Completed, Created, Failed, Running};

        matches!(
            (self, next),
            (Created, Running)
                | (Running, AwaitingCredentials | Completed | Failed | Cancelled)
                | (AwaitingCredentials, Running | Failed | Cancelled)
        )
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum JobError {
    #[error("an upload is already in progress")]
    Busy,
    #[error("uploads need a running async runtime")]
    NoRuntime,
    #[error("invalid job transition from {from:?} to {to:?}")]
    InvalidTransition { from: JobState, to: JobState },
}

#[derive(Debug)]
pub struct UploadJob {
    job_type: JobType,
    state: JobState,
    pub fields: CredentialFieldSet,
    pub upload_name: Option<String>,
    pub cancel_requested: bool,
}

impl UploadJob {
    #[must_use]
    pub fn new(job_type: JobType, fields: CredentialFieldSet) -> Self {
        Self {
            job_type,
            state: JobState::Created,
            fields,
            upload_name: None,
            cancel_requested: false,
        }
    }

    #[must_use]
    pub fn job_type(&self) -> JobType {
        self.job_type
    }

    #[must_use]
    pub fn state(&self) -> JobState {
        self.state
    }

    /// # Errors
    /// Rejects any move the lifecycle does not allow, including every move out of a terminal state.
    pub fn advance(&mut self, next: JobState) -> Result<(), JobError> {
        if !self.state.can_advance_to(next) {
            return Err(JobError::InvalidTransition { from: self.state, to: next });
        }
        log::debug!("{} job: {:?} -> {:?}", self.job_type, self.state, next);
        self.state = next;
        Ok(())
    }

    /// Ends the job as failed from any non-terminal state.
    pub(crate) fn abort(&mut self) {
        if !self.state.is_terminal() {
            self.state = JobState::Failed;
        }
    }

    /// User name known to the job, if any
    #[must_use]
    pub fn user(&self) -> Option<&str> {
        Some(self.fields.get(FieldKind::User)).filter(|user| !user.is_empty())
    }
}
