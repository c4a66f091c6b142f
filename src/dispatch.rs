// SPDX-License-Identifier: GPL-3.0-only

//! Routes a captured image to the one action the request asks for

use std::path::PathBuf;

use image::DynamicImage;

use crate::output::{encode_png, generate_filename, unique_path, OutputDependencies, OutputError};
use crate::request::{Action, ScreenshotRequest};
use crate::upload::{JobController, JobError, JobType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Saved(PathBuf),
    /// The save dialog was cancelled, nothing was written
    SaveAborted,
    Copied,
    Opened(PathBuf),
    /// The controller now owns the upload
    UploadStarted(JobType),
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Output(#[from] OutputError),
    #[error("could not start the upload: {0}")]
    Job(#[from] JobError),
}

/// Applies `request.action` to `image`.
///
/// Uploads only start here. The caller waits on `controller` for the result.
pub fn dispatch(
    image: &DynamicImage,
    request: &ScreenshotRequest,
    deps: &OutputDependencies,
    controller: &mut JobController,
) -> Result<DispatchOutcome, DispatchError> {
    log::debug!("Dispatching screenshot: {:?}", request.action);
    let png = encode_png(image)?;

    match request.action {
        Action::Save => Ok(match save(&png, request, deps)? {
            Some(path) => DispatchOutcome::Saved(path),
            None => DispatchOutcome::SaveAborted,
        }),
        Action::Clipboard => {
            deps.clipboard.copy_image(&png)?;
            log::info!("Screenshot copied to the clipboard");
            Ok(DispatchOutcome::Copied)
        }
        Action::Open => {
            let Some(path) = save(&png, request, deps)? else {
                return Ok(DispatchOutcome::SaveAborted);
            };
            deps.launcher.open(&path, request.app.as_deref())?;
            Ok(DispatchOutcome::Opened(path))
        }
        Action::Upload => {
            controller.start(request.upload_service, png, request.upload_user.as_deref())?;
            Ok(DispatchOutcome::UploadStarted(request.upload_service))
        }
    }
}

/// Writes the image to the save directory, or where the save dialog says.
fn save(
    png: &[u8],
    request: &ScreenshotRequest,
    deps: &OutputDependencies,
) -> Result<Option<PathBuf>, OutputError> {
    let suggested = unique_path(&request.screenshot_dir, &generate_filename());

    let path = if request.show_save_dialog {
        match deps.save_dialog.choose_location(&suggested) {
            Some(path) => path,
            None => {
                log::info!("Save dialog cancelled");
                return Ok(None);
            }
        }
    } else {
        suggested
    };

    deps.saver.save(png, &path)?;
    Ok(Some(path))
}
