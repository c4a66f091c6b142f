// SPDX-License-Identifier: GPL-3.0-only

//! Uploading screenshots to image hosting services
//!
//! A transport performs the network conversation for one service and talks to
//! the [`JobController`] only through a [`JobLink`]: progress messages,
//! credential requests and, when it returns, the upload name or an error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

pub mod controller;
pub mod credentials;
pub mod imgur;
pub mod job;
pub mod links;
pub mod signals;
#[cfg(test)]
mod test_server;
pub mod zimagez;

pub use controller::{JobController, JobFrontend, JobReport, ProgressDisplay};
pub use credentials::{CredentialFieldSet, CredentialPrompt, FieldKind, PromptOutcome, PromptResponse};
pub use job::{JobError, JobState, UploadJob};
pub use links::{ResultPresenter, UploadLinks};
pub use signals::{JobSignal, SignalBus, SignalKind, SubscriptionId};

/// Upload service, and for Imgur how the result is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum JobType {
    /// Imgur, links shown in a dialog
    #[default]
    #[serde(rename = "imgur")]
    #[value(name = "imgur")]
    Imgur,
    /// Imgur, image link copied to the clipboard
    #[serde(rename = "imgur-copy")]
    #[value(name = "imgur-copy")]
    ImgurCopy,
    /// ZimageZ, needs an account
    #[serde(rename = "zimagez")]
    #[value(name = "zimagez")]
    ZimageZ,
}

impl JobType {
    #[must_use]
    pub fn service_name(self) -> &'static str {
        match self {
            Self::Imgur | Self::ImgurCopy => "Imgur",
            Self::ZimageZ => "ZimageZ",
        }
    }

    /// Whether the result replaces the links dialog with a clipboard copy
    #[must_use]
    pub fn copies_link(self) -> bool {
        self == Self::ImgurCopy
    }

    /// Whether a successful upload reports the account it used
    #[must_use]
    pub fn remembers_user(self) -> bool {
        self == Self::ZimageZ
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Imgur => write!(f, "imgur"),
            Self::ImgurCopy => write!(f, "imgur-copy"),
            Self::ZimageZ => write!(f, "zimagez"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Service(String),
    #[error("unexpected answer from the server: {0}")]
    Protocol(String),
    #[error("upload cancelled")]
    Cancelled,
}

/// What a running transport tells the controller, in the order it happens.
#[derive(Debug)]
pub enum TransportEvent {
    Progress(String),
    CredentialNeeded {
        fields: CredentialFieldSet,
        message: String,
        reply: oneshot::Sender<Option<CredentialFieldSet>>,
    },
    Completed(String),
    Error(String),
}

/// The transport's end of a job.
pub struct JobLink {
    events: mpsc::Sender<TransportEvent>,
    cancel: watch::Receiver<bool>,
    fields: CredentialFieldSet,
}

impl JobLink {
    pub(crate) fn new(
        events: mpsc::Sender<TransportEvent>,
        cancel: watch::Receiver<bool>,
        fields: CredentialFieldSet,
    ) -> Self {
        Self { events, cancel, fields }
    }

    /// Values confirmed so far for this job
    #[must_use]
    pub fn fields(&self) -> &CredentialFieldSet {
        &self.fields
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// # Errors
    /// `UploadError::Cancelled` once a cancel was requested.
    pub fn check_cancelled(&self) -> Result<(), UploadError> {
        if self.is_cancelled() {
            Err(UploadError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolves once the job is cancelled or the controller is gone.
    pub async fn cancelled(&mut self) {
        let _ = self.cancel.wait_for(|cancelled| *cancelled).await;
    }

    pub async fn progress(&self, message: impl Into<String>) {
        let _ = self.events.send(TransportEvent::Progress(message.into())).await;
    }

    /// Suspends until the user confirmed or declined the credential prompt.
    ///
    /// # Errors
    /// `UploadError::Cancelled` when the user declined or the job is gone.
    pub async fn ask_for_information(&mut self, message: impl Into<String>) -> Result<(), UploadError> {
        let (reply, response) = oneshot::channel();
        self.events
            .send(TransportEvent::CredentialNeeded {
                fields: self.fields.clone(),
                message: message.into(),
                reply,
            })
            .await
            .map_err(|_| UploadError::Cancelled)?;

        match response.await {
            Ok(Some(fields)) => {
                self.fields = fields;
                Ok(())
            }
            Ok(None) | Err(_) => Err(UploadError::Cancelled),
        }
    }

    /// Reports how the transport ended. A cancelled transport just goes away.
    pub(crate) async fn finish(self, outcome: Result<String, UploadError>) {
        let event = match outcome {
            Ok(upload_name) => TransportEvent::Completed(upload_name),
            Err(UploadError::Cancelled) => return,
            Err(e) => TransportEvent::Error(e.to_string()),
        };
        let _ = self.events.send(event).await;
    }
}

#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// Uploads a PNG image and returns the name the service gave it.
    async fn upload(&self, image: &[u8], link: &mut JobLink) -> Result<String, UploadError>;
}

/// Transport used for each job type
#[derive(Clone)]
pub struct Transports {
    pub imgur: Arc<dyn UploadTransport>,
    pub zimagez: Arc<dyn UploadTransport>,
}

impl Transports {
    #[must_use]
    pub fn new(imgur_client_id: &str) -> Self {
        Self {
            imgur: Arc::new(imgur::ImgurTransport::new(imgur_client_id)),
            zimagez: Arc::new(zimagez::ZimagezTransport::new()),
        }
    }

    #[must_use]
    pub fn for_job(&self, job_type: JobType) -> Arc<dyn UploadTransport> {
        match job_type {
            JobType::Imgur | JobType::ImgurCopy => Arc::clone(&self.imgur),
            JobType::ZimageZ => Arc::clone(&self.zimagez),
        }
    }
}
