// SPDX-License-Identifier: GPL-3.0-only

//! Local destinations for a captured image: files, the clipboard and external viewers

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use chrono::Local;
use image::{DynamicImage, ImageFormat};
use wl_clipboard_rs::copy::{MimeType, Options, ServeRequests, Source};

const FILENAME_TEMPLATE: &str = "Screenshot_%Y-%m-%d_%H-%M-%S";

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("clipboard error: {0}")]
    Clipboard(String),
    #[error("could not open {path}: {reason}")]
    Launch { path: PathBuf, reason: String },
}

pub trait ImageSaver: Send + Sync {
    fn save(&self, png: &[u8], path: &Path) -> Result<(), OutputError>;
}

pub trait Clipboard: Send + Sync {
    fn copy_image(&self, png: &[u8]) -> Result<(), OutputError>;

    fn copy_text(&self, text: &str) -> Result<(), OutputError>;
}

pub trait Launcher: Send + Sync {
    /// Opens `path` with `app`, or with the desktop default when `app` is `None`.
    fn open(&self, path: &Path, app: Option<&str>) -> Result<(), OutputError>;
}

/// Lets the user pick where to save. `None` means the dialog was cancelled.
pub trait SaveDialog: Send + Sync {
    fn choose_location(&self, suggested: &Path) -> Option<PathBuf>;
}

/// Collaborators used by the dispatcher. Each one can be mocked in tests.
#[derive(Clone)]
pub struct OutputDependencies {
    pub saver: Arc<dyn ImageSaver>,
    pub clipboard: Arc<dyn Clipboard>,
    pub launcher: Arc<dyn Launcher>,
    pub save_dialog: Arc<dyn SaveDialog>,
}

impl OutputDependencies {
    /// Desktop defaults around the given save dialog
    #[must_use]
    pub fn new(save_dialog: Arc<dyn SaveDialog>) -> Self {
        Self {
            saver: Arc::new(FileSaver),
            clipboard: Arc::new(WaylandClipboard),
            launcher: Arc::new(DesktopLauncher),
            save_dialog,
        }
    }
}

pub struct FileSaver;
pub struct WaylandClipboard;
pub struct DesktopLauncher;

impl ImageSaver for FileSaver {
    fn save(&self, png: &[u8], path: &Path) -> Result<(), OutputError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                log::info!("Creating screenshot directory: {}", parent.display());
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, png)?;
        log::info!("Screenshot saved to {}", path.display());
        Ok(())
    }
}

impl Clipboard for WaylandClipboard {
    fn copy_image(&self, png: &[u8]) -> Result<(), OutputError> {
        copy_to_clipboard(png, "image/png")
    }

    fn copy_text(&self, text: &str) -> Result<(), OutputError> {
        copy_to_clipboard(text.as_bytes(), "text/plain;charset=utf-8")
    }
}

impl Launcher for DesktopLauncher {
    fn open(&self, path: &Path, app: Option<&str>) -> Result<(), OutputError> {
        let result = match app {
            Some(app) => open::with_detached(path, app),
            None => open::that_detached(path),
        };
        result.map_err(|e| OutputError::Launch {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

/// PNG bytes of `image`
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, OutputError> {
    let mut png = Cursor::new(Vec::new());
    image.write_to(&mut png, ImageFormat::Png)?;
    Ok(png.into_inner())
}

#[must_use]
pub fn generate_filename() -> String {
    format!("{}.png", Local::now().format(FILENAME_TEMPLATE))
}

/// `directory/name`, with a numeric suffix when that file already exists
#[must_use]
pub fn unique_path(directory: &Path, name: &str) -> PathBuf {
    let candidate = directory.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, extension) = match name.rsplit_once('.') {
        Some((stem, extension)) => (stem, format!(".{extension}")),
        None => (name, String::new()),
    };
    (1..)
        .map(|n| directory.join(format!("{stem}-{n}{extension}")))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

/// Puts `data` on the Wayland clipboard: wl-copy first, wl-clipboard-rs when that fails.
fn copy_to_clipboard(data: &[u8], mime: &str) -> Result<(), OutputError> {
    log::debug!("Copying {} bytes of {mime} to the clipboard", data.len());

    match copy_via_command(data, mime) {
        Ok(()) => Ok(()),
        Err(cmd_err) => {
            log::warn!("wl-copy failed ({cmd_err}), falling back to wl-clipboard-rs");
            copy_via_library(data, mime).map_err(|lib_err| {
                OutputError::Clipboard(format!("wl-copy: {cmd_err}; wl-clipboard-rs: {lib_err}"))
            })
        }
    }
}

fn copy_via_library(data: &[u8], mime: &str) -> Result<(), OutputError> {
    let mut opts = Options::new();
    opts.serve_requests(ServeRequests::Only(1));
    opts.copy(Source::Bytes(data.into()), MimeType::Specific(mime.to_string()))
        .map_err(|e| OutputError::Clipboard(e.to_string()))
}

fn copy_via_command(data: &[u8], mime: &str) -> Result<(), OutputError> {
    let mut child = Command::new("wl-copy")
        .arg("--type")
        .arg(mime)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| OutputError::Clipboard(format!("cannot run wl-copy: {e}")))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(data)?;
    }

    let output = child.wait_with_output()?;
    if !output.status.success() {
        return Err(OutputError::Clipboard(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(())
}
