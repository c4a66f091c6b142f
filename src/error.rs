// SPDX-License-Identifier: GPL-3.0-only

use crate::dispatch::DispatchError;
use crate::output::OutputError;
use crate::screenshot::ScreenshotError;
use crate::settings::SettingsError;
use crate::upload::JobError;

/// Failure of a capture-and-dispatch cycle.
///
/// `Display` is meant for logs. Use [`Error::to_user_facing`] for notices.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("capturing: {0}")]
    Capture(#[from] ScreenshotError),
    #[error("dispatching: {0}")]
    Dispatch(#[from] DispatchError),
    #[error("settings: {0}")]
    Settings(#[from] SettingsError),
    #[error("a screenshot is already being taken")]
    Busy,
}

impl Error {
    /// Condensed message for end users
    #[must_use]
    pub fn to_user_facing(&self) -> String {
        match self {
            _ if self.cancelled() => "The screenshot was cancelled.".to_string(),
            _ if self.zbus() => "Could not talk to the desktop to take the screenshot.".to_string(),
            Self::Capture(ScreenshotError::NotAvailable) => {
                "No screenshot method is available on this desktop.".to_string()
            }
            Self::Capture(ScreenshotError::InvalidRegion(_)) => {
                "The requested region lies outside the screen.".to_string()
            }
            Self::Capture(_) => "The screenshot could not be taken.".to_string(),
            Self::Dispatch(DispatchError::Output(OutputError::Clipboard(_))) => {
                "The screenshot could not be copied to the clipboard.".to_string()
            }
            Self::Dispatch(DispatchError::Output(OutputError::Launch { path, .. })) => {
                format!("The screenshot was saved to {} but could not be opened.", path.display())
            }
            Self::Dispatch(DispatchError::Output(_)) => "The screenshot could not be saved.".to_string(),
            Self::Dispatch(DispatchError::Job(JobError::Busy)) | Self::Busy => {
                "Another screenshot is still in progress.".to_string()
            }
            Self::Dispatch(DispatchError::Job(_)) => "The upload could not be started.".to_string(),
            Self::Settings(_) => "The settings could not be saved.".to_string(),
        }
    }

    /// Capture cancelled by the user
    #[must_use]
    pub fn cancelled(&self) -> bool {
        matches!(self, Self::Capture(ScreenshotError::Cancelled))
    }

    /// D-Bus communication problem
    #[must_use]
    pub fn zbus(&self) -> bool {
        matches!(self, Self::Capture(ScreenshotError::DBus(_)))
    }
}
