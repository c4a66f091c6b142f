// SPDX-License-Identifier: GPL-3.0-only

//! Command line options

use std::ffi::OsString;

use clap::{ArgGroup, CommandFactory, FromArgMatches, Parser};

use crate::request::{resolve_save_directory, Action, ScreenshotRequest};
use crate::screenshot::{CaptureMode, Region};
use crate::settings::{ScreenshotSettings, APP_ID};
use crate::upload::JobType;

/// Printed after an argument error
pub const HELP_HINT: &str =
    "Try screenshooter --help to see a full list of available command line options.";

/// Take screenshots of the whole screen, the active window or a region.
///
/// Without one of --clipboard, --open, --save or --upload the options are asked for interactively.
#[derive(Parser, Debug, Default, Clone, PartialEq, Eq)]
#[command(name = APP_ID, version, about, long_about = None)]
#[command(group(ArgGroup::new("mode").args(["fullscreen", "window", "region"])))]
#[command(group(ArgGroup::new("action").args(["clipboard", "open", "upload"])))]
pub struct Args {
    /// Delay in seconds before taking the screenshot
    #[arg(short, long, value_name = "SECONDS")]
    pub delay: Option<u32>,

    /// Take a screenshot of the entire screen
    #[arg(short, long)]
    pub fullscreen: bool,

    /// Take a screenshot of the active window
    #[arg(short, long)]
    pub window: bool,

    /// Select a region to be captured
    #[arg(short, long)]
    pub region: bool,

    /// Region to keep when selecting, as X,Y,WxH
    #[arg(short, long, value_name = "X,Y,WxH", conflicts_with_all = ["fullscreen", "window"])]
    pub geometry: Option<Region>,

    /// Copy the screenshot to the clipboard
    #[arg(short, long)]
    pub clipboard: bool,

    /// Do not display the save dialog
    #[arg(short, long)]
    pub no_save_dialog: bool,

    /// Do not display the mouse pointer on the screenshot
    #[arg(short = 'M', long)]
    pub hide_mouse: bool,

    /// Open the screenshot with APP, or with the default viewer
    #[arg(short, long, value_name = "APP", num_args = 0..=1, default_missing_value = "")]
    pub open: Option<String>,

    /// Directory where the screenshot will be saved. Saves unless another action is given
    #[arg(short, long, value_name = "DIR")]
    pub save: Option<String>,

    /// Host the screenshot on an image hosting service
    #[arg(short, long, value_name = "SERVICE", num_args = 0..=1, default_missing_value = "imgur")]
    pub upload: Option<JobType>,

    /// Choose the default save folder
    #[arg(short, long, exclusive = true)]
    pub preferences: bool,
}

impl Args {
    /// The clap command, reporting the commit it was built from in `--version`
    #[must_use]
    pub fn command_with_build() -> clap::Command {
        <Self as CommandFactory>::command().version(crate::version_string())
    }

    /// Parses `args` against [`Args::command_with_build`].
    ///
    /// # Errors
    /// The clap error for invalid arguments, help and version requests.
    pub fn try_parse_with_build<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let mut matches = Self::command_with_build().try_get_matches_from(args)?;
        Self::from_arg_matches_mut(&mut matches)
    }

    fn action(&self) -> Option<Action> {
        if self.clipboard {
            Some(Action::Clipboard)
        } else if self.open.is_some() {
            Some(Action::Open)
        } else if self.save.is_some() {
            Some(Action::Save)
        } else if self.upload.is_some() {
            Some(Action::Upload)
        } else {
            None
        }
    }

    fn mode(&self) -> Option<CaptureMode> {
        if self.fullscreen {
            Some(CaptureMode::Fullscreen)
        } else if self.window {
            Some(CaptureMode::ActiveWindow)
        } else if self.region || self.geometry.is_some() {
            Some(CaptureMode::Select)
        } else {
            None
        }
    }

    /// Builds the request, taking whatever the flags leave open from `settings`.
    #[must_use]
    pub fn into_request(self, settings: &ScreenshotSettings) -> ScreenshotRequest {
        let mut request = ScreenshotRequest::from_settings(settings);

        if let Some(mode) = self.mode() {
            request.mode = mode;
        }
        if let Some(delay) = self.delay {
            request.delay = delay;
        }
        request.region = self.geometry;
        if self.hide_mouse {
            request.show_mouse = false;
        }

        match self.action() {
            Some(action) => {
                request.action = action;
                request.interactive = false;
                request.show_save_dialog = !self.no_save_dialog;
            }
            None => {
                request.interactive = true;
                if self.no_save_dialog {
                    request.show_save_dialog = false;
                }
            }
        }

        if let Some(dir) = self.save.as_deref() {
            request.screenshot_dir = resolve_save_directory(dir);
        }
        if let Some(app) = self.open {
            request.app = (!app.is_empty()).then_some(app);
        }
        if let Some(service) = self.upload {
            request.upload_service = service;
        }

        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_with_build(std::iter::once("screenshooter").chain(args.iter().copied()))
    }

    fn settings() -> ScreenshotSettings {
        ScreenshotSettings {
            screenshot_dir: std::env::temp_dir().to_string_lossy().into_owned(),
            ..ScreenshotSettings::default()
        }
    }

    #[test]
    fn no_action_is_interactive() {
        let request = parse(&["-w", "-d", "3"]).unwrap().into_request(&settings());
        assert!(request.interactive);
        assert_eq!(request.mode, CaptureMode::ActiveWindow);
        assert_eq!(request.delay, 3);
    }

    #[test]
    fn clipboard_flag() {
        let request = parse(&["-c", "-M"]).unwrap().into_request(&settings());
        assert!(!request.interactive);
        assert_eq!(request.action, Action::Clipboard);
        assert!(!request.show_mouse);
    }

    #[test]
    fn open_with_and_without_app() {
        let request = parse(&["-o", "gimp"]).unwrap().into_request(&settings());
        assert_eq!(request.action, Action::Open);
        assert_eq!(request.app.as_deref(), Some("gimp"));

        let plain = ScreenshotSettings { app: String::new(), ..settings() };
        let request = parse(&["--open"]).unwrap().into_request(&plain);
        assert_eq!(request.action, Action::Open);
        assert_eq!(request.app, None);
    }

    #[test]
    fn upload_defaults_to_imgur() {
        let request = parse(&["-u"]).unwrap().into_request(&settings());
        assert_eq!(request.action, Action::Upload);
        assert_eq!(request.upload_service, JobType::Imgur);

        let request = parse(&["--upload", "zimagez"]).unwrap().into_request(&settings());
        assert_eq!(request.upload_service, JobType::ZimageZ);
    }

    #[test]
    fn save_directory_and_dialog() {
        let dir = tempfile::tempdir().unwrap();
        let request = parse(&["-s", &dir.path().to_string_lossy(), "-n"])
            .unwrap()
            .into_request(&settings());
        assert_eq!(request.action, Action::Save);
        assert_eq!(request.screenshot_dir, dir.path());
        assert!(!request.show_save_dialog);
    }

    #[test]
    fn save_directory_goes_with_other_actions() {
        let dir = tempfile::tempdir().unwrap();
        let dir_arg = dir.path().to_string_lossy().into_owned();

        let request = parse(&["-o", "gimp", "-s", &dir_arg]).unwrap().into_request(&settings());
        assert_eq!(request.action, Action::Open);
        assert_eq!(request.app.as_deref(), Some("gimp"));
        assert_eq!(request.screenshot_dir, dir.path());

        let request = parse(&["-u", "-s", &dir_arg]).unwrap().into_request(&settings());
        assert_eq!(request.action, Action::Upload);
        assert_eq!(request.screenshot_dir, dir.path());
    }

    #[test]
    fn preferences_stand_alone() {
        assert!(parse(&["-p"]).unwrap().preferences);
        assert!(parse(&["-p", "-c"]).is_err());
        assert!(parse(&["--preferences", "-s", "/tmp"]).is_err());
    }

    #[test]
    fn version_carries_build() {
        let version = Args::command_with_build().render_version();
        assert!(version.contains(&crate::version_string()));
    }

    #[test]
    fn geometry_selects_region() {
        let request = parse(&["-c", "-g", "10,20,300x200"]).unwrap().into_request(&settings());
        assert_eq!(request.mode, CaptureMode::Select);
        assert_eq!(
            request.region,
            Some(Region { x: 10, y: 20, width: 300, height: 200 })
        );
    }

    #[test]
    fn conflicting_flags_fail() {
        assert!(parse(&["-f", "-w"]).is_err());
        assert!(parse(&["-c", "-u"]).is_err());
        assert!(parse(&["-g", "10,20"]).is_err());
        assert!(parse(&["-d", "soon"]).is_err());
    }
}
