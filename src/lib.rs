// SPDX-License-Identifier: GPL-3.0-only

//! Screenshot utility
//!
//! Captures the screen, the active window or a region, then saves the image,
//! copies it to the clipboard, opens it in a viewer or uploads it to an image
//! hosting service.

pub mod app;
pub mod cli;
pub mod dispatch;
pub mod error;
pub mod error_handling;
pub mod notifications;
pub mod output;
pub mod request;
pub mod screenshot;
pub mod settings;
pub mod ui;
pub mod upload;

pub use app::{CaptureTrigger, CycleOutcome, Screenshooter, SetupDialog, TriggerGuard};
pub use dispatch::{dispatch, DispatchError, DispatchOutcome};
pub use error::Error;
pub use request::{Action, ScreenshotRequest};
pub use screenshot::{CaptureMode, CaptureOptions, Region, ScreenshotError, Screengrabber, ScreenshotManager};
pub use upload::{JobController, JobReport, JobState, JobType};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version with the commit it was built from, when known
#[must_use]
pub fn version_string() -> String {
    match option_env!("VERGEN_GIT_SHA") {
        Some(sha) if !sha.is_empty() && sha != "VERGEN_IDEMPOTENT_OUTPUT" => format!("{VERSION} ({sha})"),
        _ => VERSION.to_string(),
    }
}
