// SPDX-License-Identifier: GPL-3.0-only

//! Parameters of one capture-and-dispatch cycle

use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use crate::screenshot::{CaptureMode, CaptureOptions, Region};
use crate::settings::ScreenshotSettings;
use crate::upload::JobType;

/// The single terminal action applied to a captured image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum Action {
    #[default]
    Save,
    Clipboard,
    Open,
    Upload,
}

impl Action {
    pub const ALL: [Action; 4] = [Self::Save, Self::Clipboard, Self::Open, Self::Upload];
}

impl From<Action> for i32 {
    fn from(action: Action) -> Self {
        match action {
            Action::Save => 1,
            Action::Clipboard => 2,
            Action::Open => 4,
            Action::Upload => 8,
        }
    }
}

impl TryFrom<i32> for Action {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Save),
            2 => Ok(Self::Clipboard),
            4 => Ok(Self::Open),
            8 => Ok(Self::Upload),
            other => Err(format!("unknown action {other}")),
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Save => write!(f, "Save"),
            Self::Clipboard => write!(f, "Copy to the clipboard"),
            Self::Open => write!(f, "Open with an application"),
            Self::Upload => write!(f, "Host on an image hosting service"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenshotRequest {
    pub mode: CaptureMode,
    /// Seconds to wait before capturing
    pub delay: u32,
    pub action: Action,
    /// Application for `Action::Open`, `None` for the desktop default
    pub app: Option<String>,
    pub screenshot_dir: PathBuf,
    pub show_save_dialog: bool,
    pub show_mouse: bool,
    /// Set when no action was given on the command line
    pub interactive: bool,
    pub upload_service: JobType,
    pub region: Option<Region>,
    /// Known upload account, pre-filled in the credential prompt
    pub upload_user: Option<String>,
}

impl ScreenshotRequest {
    /// A request carrying the persisted defaults
    #[must_use]
    pub fn from_settings(settings: &ScreenshotSettings) -> Self {
        Self {
            mode: settings.mode,
            delay: settings.delay,
            action: settings.action,
            app: (!settings.app.is_empty()).then(|| settings.app.clone()),
            screenshot_dir: resolve_save_directory(&settings.screenshot_dir),
            show_save_dialog: settings.show_save_dialog,
            show_mouse: settings.show_mouse,
            interactive: true,
            upload_service: settings.upload_service,
            region: None,
            upload_user: (!settings.last_user.is_empty()).then(|| settings.last_user.clone()),
        }
    }

    #[must_use]
    pub fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            mode: self.mode,
            delay: Duration::from_secs(u64::from(self.delay)),
            show_mouse: self.show_mouse,
            region: self.region,
        }
    }
}

/// Pictures directory, else the home directory
#[must_use]
pub fn default_save_directory() -> PathBuf {
    dirs::picture_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Turns a configured directory (path, `~/` path or `file://` URI) into an
/// absolute existing directory, falling back to the default with a warning.
#[must_use]
pub fn resolve_save_directory(raw: &str) -> PathBuf {
    resolve_save_directory_from(raw, &default_save_directory())
}

fn resolve_save_directory_from(raw: &str, fallback: &Path) -> PathBuf {
    let raw = raw.trim();
    let raw = raw.strip_prefix("file://").unwrap_or(raw);

    let mut path = match raw.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map_or_else(|| PathBuf::from(raw), |home| home.join(rest)),
        None => PathBuf::from(raw),
    };

    if path.is_relative() {
        if let Ok(cwd) = std::env::current_dir() {
            path = cwd.join(path);
        }
    }

    if !raw.is_empty() && path.is_dir() {
        return path;
    }

    crate::report_warning!(
        "Save directory",
        &format!(
            "{} is not a valid directory, {} will be used.",
            if raw.is_empty() { "(empty)" } else { raw },
            fallback.display()
        )
    );
    fallback.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_int_mapping() {
        for action in Action::ALL {
            assert_eq!(Action::try_from(i32::from(action)), Ok(action));
        }
        assert!(Action::try_from(3).is_err());
    }

    #[test]
    fn existing_directory_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().to_string_lossy().into_owned();
        assert_eq!(resolve_save_directory_from(&raw, Path::new("/fallback")), dir.path());

        let uri = format!("file://{raw}");
        assert_eq!(resolve_save_directory_from(&uri, Path::new("/fallback")), dir.path());
    }

    #[test]
    fn invalid_directory_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let fallback = dir.path().join("fallback");
        assert_eq!(
            resolve_save_directory_from(&missing.to_string_lossy(), &fallback),
            fallback
        );
        assert_eq!(resolve_save_directory_from("", &fallback), fallback);
    }

    #[test]
    fn request_from_settings() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ScreenshotSettings {
            delay: 2,
            mode: CaptureMode::Select,
            app: "gimp".into(),
            screenshot_dir: dir.path().to_string_lossy().into_owned(),
            last_user: String::new(),
            ..ScreenshotSettings::default()
        };

        let request = ScreenshotRequest::from_settings(&settings);
        assert_eq!(request.app.as_deref(), Some("gimp"));
        assert_eq!(request.upload_user, None);
        assert_eq!(request.screenshot_dir, dir.path());
        assert_eq!(request.capture_options().delay, Duration::from_secs(2));
        assert_eq!(request.capture_options().mode, CaptureMode::Select);
    }
}
