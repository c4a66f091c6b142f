// SPDX-License-Identifier: GPL-3.0-only

//! Drives one upload job at a time: starts the transport, relays its events to
//! the UI and tears everything down once the job reaches a terminal state.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::credentials::{run_prompt, CredentialFieldSet, CredentialPrompt, PromptOutcome};
use super::job::{JobError, JobState, UploadJob};
use super::links::{present_result, ResultPresenter};
use super::signals::{JobSignal, SignalBus, SignalHandler, SignalKind, SubscriptionId};
use super::{JobLink, JobType, TransportEvent, Transports};

const EVENT_QUEUE: usize = 16;

/// Progress window shown while a job runs
pub trait ProgressDisplay: Send + Sync {
    fn update(&self, message: &str);

    fn close(&self);
}

/// Everything the controller needs from the UI.
pub trait JobFrontend: CredentialPrompt + ResultPresenter + Send + Sync {
    fn open_progress(&self, title: &str) -> Arc<dyn ProgressDisplay>;

    fn show_error(&self, message: &str);
}

/// How a job ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub job_type: JobType,
    pub state: JobState,
    pub upload_name: Option<String>,
    /// Account to remember for the next upload
    pub last_user: Option<String>,
}

struct ActiveJob {
    job: UploadJob,
    events: mpsc::Receiver<TransportEvent>,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
    signals: SignalBus,
    progress: Arc<dyn ProgressDisplay>,
}

pub struct JobController {
    frontend: Arc<dyn JobFrontend>,
    transports: Transports,
    active: Option<ActiveJob>,
}

impl JobController {
    #[must_use]
    pub fn new(frontend: Arc<dyn JobFrontend>, transports: Transports) -> Self {
        Self {
            frontend,
            transports,
            active: None,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    #[must_use]
    pub fn state(&self) -> Option<JobState> {
        self.active.as_ref().map(|active| active.job.state())
    }

    /// Starts uploading `image` (PNG data) in the background.
    ///
    /// # Errors
    /// `JobError::Busy` while another job is active, `JobError::NoRuntime` outside of tokio.
    pub fn start(&mut self, job_type: JobType, image: Vec<u8>, user: Option<&str>) -> Result<(), JobError> {
        if self.active.is_some() {
            return Err(JobError::Busy);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| JobError::NoRuntime)?;

        let mut job = UploadJob::new(job_type, CredentialFieldSet::with_user(user));
        job.advance(JobState::Running)?;

        let (events_tx, events) = mpsc::channel(EVENT_QUEUE);
        let (cancel, cancel_rx) = watch::channel(false);
        let mut link = JobLink::new(events_tx, cancel_rx, job.fields.clone());
        let transport = self.transports.for_job(job_type);

        log::info!("Uploading screenshot to {}", job_type.service_name());
        let task = runtime.spawn(async move {
            let outcome = transport.upload(&image, &mut link).await;
            link.finish(outcome).await;
        });

        let progress = self
            .frontend
            .open_progress(&format!("Uploading to {}", job_type.service_name()));
        let signals = self.default_handlers(&progress);

        self.active = Some(ActiveJob {
            job,
            events,
            cancel,
            task,
            signals,
            progress,
        });
        Ok(())
    }

    fn default_handlers(&self, progress: &Arc<dyn ProgressDisplay>) -> SignalBus {
        let mut signals = SignalBus::default();

        let progress = Arc::clone(progress);
        signals.connect(
            SignalKind::Progress,
            Box::new(move |signal| {
                if let JobSignal::Progress(message) = signal {
                    progress.update(message);
                }
            }),
        );

        let frontend = Arc::clone(&self.frontend);
        signals.connect(
            SignalKind::Error,
            Box::new(move |signal| {
                if let JobSignal::Error(message) = signal {
                    frontend.show_error(message);
                }
            }),
        );

        let frontend = Arc::clone(&self.frontend);
        signals.connect(
            SignalKind::Completed,
            Box::new(move |signal| {
                if let JobSignal::Completed { job_type, upload_name } = signal {
                    present_result(frontend.as_ref(), *job_type, upload_name);
                }
            }),
        );

        signals
    }

    /// Adds a handler to the running job. Handlers go away with the job.
    pub fn subscribe(&mut self, kind: SignalKind, handler: SignalHandler) -> Option<SubscriptionId> {
        self.active
            .as_mut()
            .map(|active| active.signals.connect(kind, handler))
    }

    /// Asks the transport to stop. The job ends as cancelled once it does.
    pub fn cancel(&mut self) {
        if let Some(active) = self.active.as_mut() {
            if !active.job.cancel_requested {
                log::info!("Cancelling {} upload", active.job.job_type());
                active.job.cancel_requested = true;
                let _ = active.cancel.send(true);
            }
        }
    }

    /// Runs the active job to its end and returns how it went.
    pub async fn wait(&mut self) -> Option<JobReport> {
        loop {
            let active = self.active.as_mut()?;
            let Some(event) = active.events.recv().await else {
                self.transport_gone();
                break;
            };
            if self.handle_event(event).await {
                break;
            }
        }

        let active = self.active.take()?;
        Some(Self::finish(active))
    }

    /// Returns true once the job is in a terminal state.
    async fn handle_event(&mut self, event: TransportEvent) -> bool {
        let Some(active) = self.active.as_mut() else {
            return true;
        };

        match event {
            TransportEvent::Progress(message) => {
                if !active.job.cancel_requested {
                    active.signals.emit(&JobSignal::Progress(message));
                }
                false
            }
            TransportEvent::CredentialNeeded { fields, message, reply } => {
                self.ask_for_information(fields, message, reply).await;
                false
            }
            TransportEvent::Completed(upload_name) => {
                if active.job.cancel_requested {
                    Self::end_cancelled(active);
                } else if active.job.advance(JobState::Completed).is_ok() {
                    active.job.upload_name = Some(upload_name.clone());
                    active.signals.emit(&JobSignal::Completed {
                        job_type: active.job.job_type(),
                        upload_name,
                    });
                } else {
                    Self::end_failed(active, "Upload finished while waiting for account details");
                }
                true
            }
            TransportEvent::Error(message) => {
                if active.job.cancel_requested {
                    Self::end_cancelled(active);
                } else {
                    Self::end_failed(active, &message);
                }
                true
            }
        }
    }

    async fn ask_for_information(
        &mut self,
        fields: CredentialFieldSet,
        message: String,
        reply: oneshot::Sender<Option<CredentialFieldSet>>,
    ) {
        let Some(active) = self.active.as_mut() else {
            let _ = reply.send(None);
            return;
        };
        if active.job.cancel_requested || active.job.advance(JobState::AwaitingCredentials).is_err() {
            let _ = reply.send(None);
            return;
        }

        let frontend = Arc::clone(&self.frontend);
        let answer = tokio::task::spawn_blocking(move || {
            let mut fields = fields;
            let outcome = run_prompt(frontend.as_ref(), &mut fields, &message);
            (outcome, fields)
        })
        .await;

        match answer {
            Ok((PromptOutcome::Confirmed, fields)) => {
                let Some(active) = self.active.as_mut() else {
                    let _ = reply.send(None);
                    return;
                };
                active.job.fields.merge(&fields);
                if active.job.advance(JobState::Running).is_ok() {
                    let _ = reply.send(Some(active.job.fields.clone()));
                } else {
                    let _ = reply.send(None);
                }
            }
            Ok((PromptOutcome::Cancelled, _)) => {
                self.cancel();
                let _ = reply.send(None);
            }
            Err(e) => {
                log::error!("Credential prompt failed: {e}");
                self.cancel();
                let _ = reply.send(None);
            }
        }
    }

    /// The transport went away without reporting a result.
    fn transport_gone(&mut self) {
        if let Some(active) = self.active.as_mut() {
            if active.job.state().is_terminal() {
                return;
            }
            if active.job.cancel_requested {
                Self::end_cancelled(active);
            } else {
                Self::end_failed(active, "The upload stopped unexpectedly");
            }
        }
    }

    fn end_cancelled(active: &mut ActiveJob) {
        if active.job.advance(JobState::Cancelled).is_err() {
            active.job.abort();
        }
        log::info!("{} upload cancelled", active.job.job_type());
        active.signals.emit(&JobSignal::Cancelled);
    }

    fn end_failed(active: &mut ActiveJob, message: &str) {
        log::warn!("{} upload failed: {message}", active.job.job_type());
        active.job.abort();
        active.signals.emit(&JobSignal::Error(message.to_string()));
    }

    fn finish(active: ActiveJob) -> JobReport {
        let job = Self::cleanup(active);

        let last_user = if job.job_type().remembers_user() && job.state() == JobState::Completed {
            job.user().map(str::to_string)
        } else {
            None
        };

        JobReport {
            job_type: job.job_type(),
            state: job.state(),
            upload_name: job.upload_name,
            last_user,
        }
    }

    /// Releases what the job held. Takes the job by value so it can only run once.
    fn cleanup(mut active: ActiveJob) -> UploadJob {
        let dropped = active.signals.disconnect_all();
        log::debug!("Released {dropped} job handlers");
        active.progress.close();
        active.task.abort();
        active.job
    }
}

impl Drop for JobController {
    fn drop(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.job.cancel_requested = true;
            let _ = active.cancel.send(true);
            active.job.abort();
            Self::cleanup(active);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::{FieldKind, PromptResponse, UploadError, UploadLinks, UploadTransport};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Counters {
        opened: AtomicUsize,
        closed: AtomicUsize,
        updates: Mutex<Vec<String>>,
        prompts: AtomicUsize,
        errors: Mutex<Vec<String>>,
        presented: Mutex<Vec<String>>,
        copied: Mutex<Vec<String>>,
    }

    struct Progress(Arc<Counters>);

    impl ProgressDisplay for Progress {
        fn update(&self, message: &str) {
            self.0.updates.lock().unwrap().push(message.to_string());
        }

        fn close(&self) {
            self.0.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Frontend {
        counters: Arc<Counters>,
        answer: Option<&'static str>,
    }

    impl CredentialPrompt for Frontend {
        fn ask_for_information(&self, fields: &CredentialFieldSet, _message: &str) -> PromptResponse {
            self.counters.prompts.fetch_add(1, Ordering::SeqCst);
            match self.answer {
                Some(user) => {
                    let mut fields = fields.clone();
                    fields.set(FieldKind::User, user);
                    fields.set(FieldKind::Password, "pw");
                    PromptResponse::Confirmed(fields)
                }
                None => PromptResponse::Cancelled,
            }
        }
    }

    impl ResultPresenter for Frontend {
        fn present_links(&self, title: &str, links: &UploadLinks) {
            self.counters
                .presented
                .lock()
                .unwrap()
                .push(format!("{title}|{}", links.image_url));
        }

        fn copy_link(&self, url: &str) {
            self.counters.copied.lock().unwrap().push(url.to_string());
        }
    }

    impl JobFrontend for Frontend {
        fn open_progress(&self, _title: &str) -> Arc<dyn ProgressDisplay> {
            self.counters.opened.fetch_add(1, Ordering::SeqCst);
            Arc::new(Progress(Arc::clone(&self.counters)))
        }

        fn show_error(&self, message: &str) {
            self.counters.errors.lock().unwrap().push(message.to_string());
        }
    }

    struct Instant;

    #[async_trait]
    impl UploadTransport for Instant {
        async fn upload(&self, _image: &[u8], link: &mut JobLink) -> Result<String, UploadError> {
            link.progress("sending").await;
            Ok("abc123".to_string())
        }
    }

    struct NeedsLogin;

    #[async_trait]
    impl UploadTransport for NeedsLogin {
        async fn upload(&self, _image: &[u8], link: &mut JobLink) -> Result<String, UploadError> {
            if !link.fields().has_account() {
                link.ask_for_information("Please log in").await?;
            }
            link.check_cancelled()?;
            Ok(format!("{}-shot", link.fields().get(FieldKind::User)))
        }
    }

    struct Broken;

    #[async_trait]
    impl UploadTransport for Broken {
        async fn upload(&self, _image: &[u8], _link: &mut JobLink) -> Result<String, UploadError> {
            Err(UploadError::Service("server said no".to_string()))
        }
    }

    struct Stuck;

    #[async_trait]
    impl UploadTransport for Stuck {
        async fn upload(&self, _image: &[u8], _link: &mut JobLink) -> Result<String, UploadError> {
            std::future::pending().await
        }
    }

    /// Stops without a result although nobody cancelled
    struct GivesUp;

    #[async_trait]
    impl UploadTransport for GivesUp {
        async fn upload(&self, _image: &[u8], link: &mut JobLink) -> Result<String, UploadError> {
            link.progress("connecting").await;
            Err(UploadError::Cancelled)
        }
    }

    /// Carries on after the user declined the prompt
    struct Stubborn {
        fails: bool,
    }

    #[async_trait]
    impl UploadTransport for Stubborn {
        async fn upload(&self, _image: &[u8], link: &mut JobLink) -> Result<String, UploadError> {
            let _ = link.ask_for_information("Please log in").await;
            link.progress("still sending").await;
            if self.fails {
                Err(UploadError::Service("too late".to_string()))
            } else {
                Ok("late".to_string())
            }
        }
    }

    fn controller(
        transport: Arc<dyn UploadTransport>,
        answer: Option<&'static str>,
    ) -> (JobController, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let frontend = Arc::new(Frontend {
            counters: Arc::clone(&counters),
            answer,
        });
        let transports = Transports {
            imgur: Arc::clone(&transport),
            zimagez: transport,
        };
        (JobController::new(frontend, transports), counters)
    }

    #[tokio::test]
    async fn completed_job_presents_links_and_cleans_up_once() {
        let (mut controller, counters) = controller(Arc::new(Instant), None);
        controller.start(JobType::Imgur, vec![1, 2, 3], None).unwrap();
        assert_eq!(controller.state(), Some(JobState::Running));

        let report = controller.wait().await.unwrap();
        assert_eq!(report.state, JobState::Completed);
        assert_eq!(report.upload_name.as_deref(), Some("abc123"));
        assert_eq!(report.last_user, None);
        assert_eq!(*counters.updates.lock().unwrap(), vec!["sending"]);
        assert_eq!(
            *counters.presented.lock().unwrap(),
            vec!["My screenshot on Imgur|http://i.imgur.com/abc123.png"]
        );

        assert!(!controller.is_active());
        assert!(controller.wait().await.is_none());
        drop(controller);
        assert_eq!(counters.opened.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn imgur_copy_copies_instead_of_dialog() {
        let (mut controller, counters) = controller(Arc::new(Instant), None);
        controller.start(JobType::ImgurCopy, Vec::new(), None).unwrap();
        controller.wait().await.unwrap();
        assert!(counters.presented.lock().unwrap().is_empty());
        assert_eq!(*counters.copied.lock().unwrap(), vec!["http://i.imgur.com/abc123.png"]);
    }

    #[tokio::test]
    async fn second_start_is_busy() {
        let (mut controller, _counters) = controller(Arc::new(Stuck), None);
        controller.start(JobType::Imgur, Vec::new(), None).unwrap();
        assert_eq!(
            controller.start(JobType::Imgur, Vec::new(), None),
            Err(JobError::Busy)
        );
    }

    #[test]
    fn start_needs_runtime() {
        let (mut controller, _counters) = controller(Arc::new(Instant), None);
        assert_eq!(
            controller.start(JobType::Imgur, Vec::new(), None),
            Err(JobError::NoRuntime)
        );
        assert!(!controller.is_active());
    }

    #[tokio::test]
    async fn confirmed_credentials_reach_transport() {
        let (mut controller, counters) = controller(Arc::new(NeedsLogin), Some("carol"));
        controller.start(JobType::ZimageZ, Vec::new(), None).unwrap();

        let report = controller.wait().await.unwrap();
        assert_eq!(counters.prompts.load(Ordering::SeqCst), 1);
        assert_eq!(report.state, JobState::Completed);
        assert_eq!(report.upload_name.as_deref(), Some("carol-shot"));
        assert_eq!(report.last_user.as_deref(), Some("carol"));
    }

    #[tokio::test]
    async fn declined_prompt_cancels_without_error() {
        let (mut controller, counters) = controller(Arc::new(NeedsLogin), None);
        controller.start(JobType::ZimageZ, Vec::new(), Some("dave")).unwrap();

        let report = controller.wait().await.unwrap();
        assert_eq!(report.state, JobState::Cancelled);
        assert_eq!(report.last_user, None);
        assert!(counters.errors.lock().unwrap().is_empty());
        assert!(counters.presented.lock().unwrap().is_empty());
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transport_error_is_shown() {
        let (mut controller, counters) = controller(Arc::new(Broken), None);
        controller.start(JobType::Imgur, Vec::new(), None).unwrap();

        let report = controller.wait().await.unwrap();
        assert_eq!(report.state, JobState::Failed);
        assert_eq!(*counters.errors.lock().unwrap(), vec!["server said no"]);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transport_vanishing_fails_the_job() {
        let (mut controller, counters) = controller(Arc::new(GivesUp), None);
        controller.start(JobType::Imgur, Vec::new(), None).unwrap();

        let report = controller.wait().await.unwrap();
        assert_eq!(report.state, JobState::Failed);
        assert_eq!(report.upload_name, None);
        assert_eq!(
            *counters.errors.lock().unwrap(),
            vec!["The upload stopped unexpectedly"]
        );
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn results_after_declined_prompt_end_cancelled() {
        for fails in [false, true] {
            let (mut controller, counters) = controller(Arc::new(Stubborn { fails }), None);
            controller.start(JobType::ZimageZ, Vec::new(), Some("gina")).unwrap();

            let report = controller.wait().await.unwrap();
            assert_eq!(report.state, JobState::Cancelled);
            assert_eq!(report.upload_name, None);
            assert_eq!(report.last_user, None);
            assert_eq!(counters.prompts.load(Ordering::SeqCst), 1);
            assert!(counters.errors.lock().unwrap().is_empty());
            assert!(counters.presented.lock().unwrap().is_empty());
            // Nothing reaches the progress window once cancelled
            assert!(counters.updates.lock().unwrap().is_empty());
            assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn subscriptions_are_released_with_the_job() {
        let (mut controller, _counters) = controller(Arc::new(Instant), None);
        controller.start(JobType::Imgur, Vec::new(), None).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        controller
            .subscribe(
                SignalKind::Completed,
                Box::new(move |signal| sink.lock().unwrap().push(signal.clone())),
            )
            .unwrap();
        assert_eq!(Arc::strong_count(&seen), 2);

        controller.wait().await.unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(Arc::strong_count(&seen), 1);
        assert!(controller
            .subscribe(SignalKind::Completed, Box::new(|_| {}))
            .is_none());
    }

    #[tokio::test]
    async fn dropping_controller_tears_down_running_job() {
        let (mut controller, counters) = controller(Arc::new(Stuck), None);
        controller.start(JobType::Imgur, Vec::new(), None).unwrap();
        drop(controller);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
        assert!(counters.errors.lock().unwrap().is_empty());
    }
}
