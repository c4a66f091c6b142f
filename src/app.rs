// SPDX-License-Identifier: GPL-3.0-only

//! One capture-and-dispatch cycle, from the request to the persisted settings

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::dispatch::{dispatch, DispatchOutcome};
use crate::error::Error;
use crate::error_handling::{report_error, report_success, ErrorSeverity};
use crate::output::OutputDependencies;
use crate::request::{resolve_save_directory, ScreenshotRequest};
use crate::screenshot::{ScreenshotError, ScreenshotManager};
use crate::settings::SettingsManager;
use crate::upload::{JobController, JobReport};

/// Dialogs shown before anything is captured
pub trait SetupDialog: Send + Sync {
    /// Lets the user adjust a request before capturing. Returns false when declined.
    fn configure(&self, request: &mut ScreenshotRequest) -> bool;

    /// Asks for the default save folder, starting at `current`. `None` when declined.
    fn choose_save_folder(&self, current: &Path) -> Option<PathBuf>;
}

/// The button that starts a capture. Insensitive while a cycle holds its guard.
#[derive(Debug, Clone, Default)]
pub struct CaptureTrigger {
    busy: Arc<AtomicBool>,
}

/// Held for the length of a cycle
#[derive(Debug)]
pub struct TriggerGuard {
    busy: Arc<AtomicBool>,
}

impl CaptureTrigger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` while another cycle is running.
    #[must_use]
    pub fn fire(&self) -> Option<TriggerGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TriggerGuard {
                busy: Arc::clone(&self.busy),
            })
    }

    #[must_use]
    pub fn is_sensitive(&self) -> bool {
        !self.busy.load(Ordering::Acquire)
    }
}

impl Drop for TriggerGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// How a cycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Setup or capture cancelled by the user
    Aborted,
    Dispatched(DispatchOutcome),
    Uploaded(JobReport),
}

pub struct Screenshooter {
    settings: SettingsManager,
    screenshots: ScreenshotManager,
    outputs: OutputDependencies,
    setup: Arc<dyn SetupDialog>,
    controller: JobController,
    trigger: CaptureTrigger,
}

impl Screenshooter {
    pub fn new(
        settings: SettingsManager,
        screenshots: ScreenshotManager,
        outputs: OutputDependencies,
        setup: Arc<dyn SetupDialog>,
        controller: JobController,
    ) -> Self {
        Self {
            settings,
            screenshots,
            outputs,
            setup,
            controller,
            trigger: CaptureTrigger::new(),
        }
    }

    #[must_use]
    pub fn trigger(&self) -> &CaptureTrigger {
        &self.trigger
    }

    #[must_use]
    pub fn settings(&self) -> &SettingsManager {
        &self.settings
    }

    /// Captures and dispatches once, waiting for an upload to finish.
    ///
    /// # Errors
    /// Capture and dispatch failures. User cancellation is `Ok(CycleOutcome::Aborted)`.
    pub async fn run(&mut self, mut request: ScreenshotRequest) -> Result<CycleOutcome, Error> {
        let guard = self.trigger.fire().ok_or(Error::Busy)?;

        if request.interactive {
            if !self.setup.configure(&mut request) {
                log::info!("Screenshot setup cancelled");
                return Ok(CycleOutcome::Aborted);
            }
            if let Err(e) = self.settings.remember_request(&request) {
                crate::report_warning!("Settings", &format!("Could not save the settings: {e}"));
            }
        }

        let image = match self.screenshots.capture(&request.capture_options()).await {
            Ok(image) => image,
            Err(ScreenshotError::Cancelled) => {
                log::info!("Screenshot cancelled");
                return Ok(CycleOutcome::Aborted);
            }
            Err(e) => return Err(e.into()),
        };

        let outcome = dispatch(&image, &request, &self.outputs, &mut self.controller)?;
        match &outcome {
            DispatchOutcome::Saved(path) => {
                report_success("Screenshot saved", &path.display().to_string());
            }
            DispatchOutcome::Copied => report_success("Screenshot copied", "The screenshot is on the clipboard"),
            DispatchOutcome::Opened(path) => log::info!("Opened {}", path.display()),
            DispatchOutcome::SaveAborted => log::info!("Screenshot not saved"),
            DispatchOutcome::UploadStarted(_) => {
                // The local part is over, uploads run on their own
                drop(guard);
                if let Some(report) = self.controller.wait().await {
                    self.remember_upload(&report);
                    return Ok(CycleOutcome::Uploaded(report));
                }
            }
        }

        Ok(CycleOutcome::Dispatched(outcome))
    }

    /// Lets the user pick the default save folder and stores it.
    /// Returns false when the dialog was declined.
    ///
    /// # Errors
    /// `Error::Settings` when the choice cannot be written.
    pub fn edit_preferences(&mut self) -> Result<bool, Error> {
        let current = resolve_save_directory(&self.settings.settings.screenshot_dir);
        let Some(dir) = self.setup.choose_save_folder(&current) else {
            log::info!("Preferences left unchanged");
            return Ok(false);
        };

        self.settings.update_screenshot_dir(&dir)?;
        report_error(
            ErrorSeverity::Info,
            "Preferences",
            &format!("Screenshots are saved to {} by default", dir.display()),
        );
        Ok(true)
    }

    fn remember_upload(&mut self, report: &JobReport) {
        let Some(user) = report.last_user.as_deref() else {
            return;
        };
        if user == self.settings.settings.last_user {
            return;
        }
        if let Err(e) = self.settings.update_last_user(user) {
            crate::report_warning!("Settings", &format!("Could not remember the upload account: {e}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{Clipboard, ImageSaver, Launcher, OutputError, SaveDialog};
    use crate::request::Action;
    use crate::screenshot::{CaptureMode, CaptureOptions, Screengrabber};
    use crate::settings::ScreenshotSettings;
    use crate::upload::{
        CredentialFieldSet, CredentialPrompt, FieldKind, JobFrontend, JobLink, JobState, JobType,
        ProgressDisplay, PromptResponse, ResultPresenter, Transports, UploadError, UploadLinks,
        UploadTransport,
    };
    use async_trait::async_trait;
    use image::DynamicImage;
    use std::sync::Mutex;

    struct Grabber {
        cancel: bool,
    }

    #[async_trait]
    impl Screengrabber for Grabber {
        async fn is_available(&self) -> bool {
            true
        }

        async fn take_screenshot(&self, _options: &CaptureOptions) -> Result<DynamicImage, ScreenshotError> {
            if self.cancel {
                Err(ScreenshotError::Cancelled)
            } else {
                Ok(DynamicImage::new_rgba8(8, 8))
            }
        }

        fn name(&self) -> &'static str {
            "test"
        }

        fn supports_mode(&self, _mode: CaptureMode) -> bool {
            true
        }
    }

    #[derive(Default)]
    struct Desk {
        saved: Mutex<Vec<PathBuf>>,
        setups: Mutex<usize>,
        accept_setup: bool,
        save_folder: Option<PathBuf>,
        trigger: Mutex<Option<CaptureTrigger>>,
        sensitive_while_uploading: Mutex<Option<bool>>,
    }

    struct Shared(Arc<Desk>);

    impl ImageSaver for Shared {
        fn save(&self, _png: &[u8], path: &Path) -> Result<(), OutputError> {
            self.0.saved.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }
    }

    impl Clipboard for Shared {
        fn copy_image(&self, _png: &[u8]) -> Result<(), OutputError> {
            Ok(())
        }

        fn copy_text(&self, _text: &str) -> Result<(), OutputError> {
            Ok(())
        }
    }

    impl Launcher for Shared {
        fn open(&self, _path: &Path, _app: Option<&str>) -> Result<(), OutputError> {
            Ok(())
        }
    }

    impl SaveDialog for Shared {
        fn choose_location(&self, suggested: &Path) -> Option<PathBuf> {
            Some(suggested.to_path_buf())
        }
    }

    impl SetupDialog for Shared {
        fn configure(&self, request: &mut ScreenshotRequest) -> bool {
            *self.0.setups.lock().unwrap() += 1;
            request.action = Action::Upload;
            request.upload_service = JobType::ZimageZ;
            self.0.accept_setup
        }

        fn choose_save_folder(&self, _current: &Path) -> Option<PathBuf> {
            self.0.save_folder.clone()
        }
    }

    impl CredentialPrompt for Shared {
        fn ask_for_information(&self, fields: &CredentialFieldSet, _message: &str) -> PromptResponse {
            if let Some(trigger) = self.0.trigger.lock().unwrap().as_ref() {
                *self.0.sensitive_while_uploading.lock().unwrap() = Some(trigger.is_sensitive());
            }
            let mut fields = fields.clone();
            fields.set(FieldKind::User, "grace");
            fields.set(FieldKind::Password, "pw");
            PromptResponse::Confirmed(fields)
        }
    }

    impl ResultPresenter for Shared {
        fn present_links(&self, _title: &str, _links: &UploadLinks) {}

        fn copy_link(&self, _url: &str) {}
    }

    impl ProgressDisplay for Shared {
        fn update(&self, _message: &str) {}

        fn close(&self) {}
    }

    impl JobFrontend for Shared {
        fn open_progress(&self, _title: &str) -> Arc<dyn ProgressDisplay> {
            Arc::new(Shared(Arc::clone(&self.0)))
        }

        fn show_error(&self, _message: &str) {}
    }

    struct LoginUpload;

    #[async_trait]
    impl UploadTransport for LoginUpload {
        async fn upload(&self, _image: &[u8], link: &mut JobLink) -> Result<String, UploadError> {
            if !link.fields().has_account() {
                link.ask_for_information("login").await?;
            }
            Ok("z1".to_string())
        }
    }

    fn screenshooter(
        dir: &Path,
        desk: &Arc<Desk>,
        cancel_capture: bool,
    ) -> Screenshooter {
        let settings = SettingsManager::open(dir.join("screenshooter.toml"));
        let shared = Arc::new(Shared(Arc::clone(desk)));
        let outputs = OutputDependencies {
            saver: shared.clone(),
            clipboard: shared.clone(),
            launcher: shared.clone(),
            save_dialog: shared.clone(),
        };
        let transport: Arc<dyn UploadTransport> = Arc::new(LoginUpload);
        let controller = JobController::new(
            shared.clone(),
            Transports {
                imgur: Arc::clone(&transport),
                zimagez: transport,
            },
        );
        Screenshooter::new(
            settings,
            ScreenshotManager::with_grabbers(vec![Box::new(Grabber { cancel: cancel_capture })]),
            outputs,
            shared,
            controller,
        )
    }

    fn request(dir: &Path, interactive: bool) -> ScreenshotRequest {
        let mut request = ScreenshotRequest::from_settings(&ScreenshotSettings {
            screenshot_dir: dir.to_string_lossy().into_owned(),
            ..ScreenshotSettings::default()
        });
        request.interactive = interactive;
        request.show_save_dialog = false;
        request
    }

    #[test]
    fn trigger_is_insensitive_while_held() {
        let trigger = CaptureTrigger::new();
        let guard = trigger.fire().unwrap();
        assert!(!trigger.is_sensitive());
        assert!(trigger.fire().is_none());
        drop(guard);
        assert!(trigger.is_sensitive());
        assert!(trigger.fire().is_some());
    }

    #[tokio::test]
    async fn command_line_save_skips_setup() {
        let dir = tempfile::tempdir().unwrap();
        let desk = Arc::new(Desk::default());
        let mut app = screenshooter(dir.path(), &desk, false);

        let outcome = app.run(request(dir.path(), false)).await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Dispatched(DispatchOutcome::Saved(_))));
        assert_eq!(*desk.setups.lock().unwrap(), 0);
        assert_eq!(desk.saved.lock().unwrap().len(), 1);
        assert!(app.trigger().is_sensitive());
        assert!(!dir.path().join("screenshooter.toml").exists());
    }

    #[tokio::test]
    async fn declined_setup_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let desk = Arc::new(Desk::default());
        let mut app = screenshooter(dir.path(), &desk, false);

        let outcome = app.run(request(dir.path(), true)).await.unwrap();
        assert_eq!(outcome, CycleOutcome::Aborted);
        assert!(desk.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancelled_capture_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let desk = Arc::new(Desk::default());
        let mut app = screenshooter(dir.path(), &desk, true);

        assert_eq!(app.run(request(dir.path(), false)).await.unwrap(), CycleOutcome::Aborted);
    }

    #[tokio::test]
    async fn interactive_upload_persists_choices_and_user() {
        let dir = tempfile::tempdir().unwrap();
        let desk = Arc::new(Desk {
            accept_setup: true,
            ..Desk::default()
        });
        let mut app = screenshooter(dir.path(), &desk, false);
        *desk.trigger.lock().unwrap() = Some(app.trigger().clone());

        let CycleOutcome::Uploaded(report) = app.run(request(dir.path(), true)).await.unwrap() else {
            panic!("no upload");
        };
        assert_eq!(report.state, JobState::Completed);
        assert_eq!(report.last_user.as_deref(), Some("grace"));

        let stored = ScreenshotSettings::load(&dir.path().join("screenshooter.toml")).unwrap();
        assert_eq!(stored.action, Action::Upload);
        assert_eq!(stored.upload_service, JobType::ZimageZ);
        assert_eq!(stored.last_user, "grace");
        assert_eq!(app.settings().settings.last_user, "grace");
        assert_eq!(*desk.sensitive_while_uploading.lock().unwrap(), Some(true));
    }

    #[test]
    fn preferences_store_save_folder() {
        let dir = tempfile::tempdir().unwrap();
        let folder = tempfile::tempdir().unwrap();
        let desk = Arc::new(Desk {
            save_folder: Some(folder.path().to_path_buf()),
            ..Desk::default()
        });
        let mut app = screenshooter(dir.path(), &desk, false);

        assert!(app.edit_preferences().unwrap());
        let stored = ScreenshotSettings::load(&dir.path().join("screenshooter.toml")).unwrap();
        assert_eq!(stored.screenshot_dir, folder.path().to_string_lossy());
        assert_eq!(
            ScreenshotRequest::from_settings(&stored).screenshot_dir,
            folder.path()
        );
    }

    #[test]
    fn declined_preferences_write_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let desk = Arc::new(Desk::default());
        let mut app = screenshooter(dir.path(), &desk, false);

        assert!(!app.edit_preferences().unwrap());
        assert!(!dir.path().join("screenshooter.toml").exists());
    }

    #[test]
    fn unwritable_preferences_are_a_settings_error() {
        let dir = tempfile::tempdir().unwrap();
        // A file where the settings directory should be
        let blocker = dir.path().join("blocked");
        std::fs::write(&blocker, "").unwrap();
        let desk = Arc::new(Desk {
            save_folder: Some(dir.path().to_path_buf()),
            ..Desk::default()
        });
        let mut app = screenshooter(&blocker, &desk, false);

        let err = app.edit_preferences().unwrap_err();
        assert!(matches!(err, Error::Settings(_)));
        assert_eq!(err.to_user_facing(), "The settings could not be saved.");
    }
}
