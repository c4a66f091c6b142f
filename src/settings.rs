// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

use crate::request::{Action, ScreenshotRequest};
use crate::screenshot::CaptureMode;
use crate::upload::JobType;

pub const APP_ID: &str = "screenshooter";

/// Anonymous upload key registered for the desktop screenshooter
pub const DEFAULT_IMGUR_CLIENT_ID: &str = "66ab680b597e293";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("no configuration directory for this user")]
    NoConfigDir,
    #[error("reading settings: {0}")]
    Io(#[from] io::Error),
    #[error("parsing settings: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("serializing settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenshotSettings {
    /// Delay in seconds before capturing
    pub delay: u32,
    /// Last used capture mode
    pub mode: CaptureMode,
    /// Last used destination
    pub action: Action,
    pub show_save_dialog: bool,
    pub show_mouse: bool,
    /// Save directory as a path or `file://` URI
    pub screenshot_dir: String,
    /// Application used by the open action, empty for the desktop default
    pub app: String,
    pub upload_service: JobType,
    /// User name of the last successful ZimageZ upload
    pub last_user: String,
    pub imgur_client_id: String,
}

impl Default for ScreenshotSettings {
    fn default() -> Self {
        Self {
            delay: 0,
            mode: CaptureMode::Fullscreen,
            action: Action::Save,
            show_save_dialog: true,
            show_mouse: true,
            screenshot_dir: crate::request::default_save_directory()
                .to_string_lossy()
                .into_owned(),
            app: String::new(),
            upload_service: JobType::Imgur,
            last_user: String::new(),
            imgur_client_id: DEFAULT_IMGUR_CLIENT_ID.to_string(),
        }
    }
}

impl ScreenshotSettings {
    /// Settings file under the XDG configuration directory
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_ID).join(format!("{APP_ID}.toml")))
    }

    /// Reads settings from `path`; a missing file yields the defaults.
    ///
    /// # Errors
    /// Fails when the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(toml::from_str(&contents)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// # Errors
    /// Fails when the directory cannot be created or the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}

pub struct SettingsManager {
    pub path: PathBuf,
    pub settings: ScreenshotSettings,
}

impl SettingsManager {
    /// Loads the user's settings, falling back to defaults on a broken file.
    ///
    /// # Errors
    /// Fails only when no configuration directory can be determined.
    pub fn new() -> Result<Self, SettingsError> {
        let path = ScreenshotSettings::default_path().ok_or(SettingsError::NoConfigDir)?;
        Ok(Self::open(path))
    }

    #[must_use]
    pub fn open(path: PathBuf) -> Self {
        let settings = ScreenshotSettings::load(&path).unwrap_or_else(|e| {
            crate::report_warning!(
                "Settings",
                &format!("{} is unusable ({e}), using defaults", path.display())
            );
            ScreenshotSettings::default()
        });

        Self { path, settings }
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn save(&self) -> Result<(), SettingsError> {
        self.settings.save(&self.path)
    }

    /// Stores the choices made in an interactive session
    #[allow(clippy::missing_errors_doc)]
    pub fn remember_request(&mut self, request: &ScreenshotRequest) -> Result<(), SettingsError> {
        self.settings.delay = request.delay;
        self.settings.mode = request.mode;
        self.settings.action = request.action;
        self.settings.show_save_dialog = request.show_save_dialog;
        self.settings.show_mouse = request.show_mouse;
        self.settings.screenshot_dir = request.screenshot_dir.to_string_lossy().into_owned();
        self.settings.app = request.app.clone().unwrap_or_default();
        self.settings.upload_service = request.upload_service;
        self.save()
    }

    /// Stores the default save folder chosen in the preferences
    #[allow(clippy::missing_errors_doc)]
    pub fn update_screenshot_dir(&mut self, dir: &Path) -> Result<(), SettingsError> {
        self.settings.screenshot_dir = dir.to_string_lossy().into_owned();
        self.save()
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn update_last_user(&mut self, user: &str) -> Result<(), SettingsError> {
        self.settings.last_user = user.to_string();
        self.save()
    }
}
