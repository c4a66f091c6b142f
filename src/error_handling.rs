// SPDX-License-Identifier: GPL-3.0-only

//! User-facing error reporting
//!
//! Every report is logged. When desktop notices are enabled the report is also
//! posted as a freedesktop notification from a background task; `flush` waits
//! for those tasks so a short-lived process does not exit before they are sent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::task::JoinHandle;

use crate::notifications::{show_system_notification, NotificationType};

static DESKTOP_NOTICES: AtomicBool = AtomicBool::new(false);

static PENDING: Mutex<Vec<JoinHandle<()>>> = Mutex::new(Vec::new());

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Failures the user has to know about
    Error,
    /// Fallbacks or degraded functionality
    Warning,
    /// State changes worth mentioning
    Info,
}

impl From<ErrorSeverity> for NotificationType {
    fn from(severity: ErrorSeverity) -> Self {
        match severity {
            ErrorSeverity::Error => NotificationType::Error,
            ErrorSeverity::Warning => NotificationType::Warning,
            ErrorSeverity::Info => NotificationType::Info,
        }
    }
}

/// Enable or disable desktop notifications for reports
pub fn set_desktop_notices(enabled: bool) {
    DESKTOP_NOTICES.store(enabled, Ordering::Relaxed);
}

pub fn desktop_notices() -> bool {
    DESKTOP_NOTICES.load(Ordering::Relaxed)
}

pub fn report_error(severity: ErrorSeverity, title: &str, message: &str) {
    match severity {
        ErrorSeverity::Error => log::error!("{title}: {message}"),
        ErrorSeverity::Warning => log::warn!("{title}: {message}"),
        ErrorSeverity::Info => log::info!("{title}: {message}"),
    }

    if desktop_notices() {
        post(severity.into(), title, message);
    }
}

/// Show a success notice
pub fn report_success(title: &str, message: &str) {
    log::info!("{title}: {message}");

    if desktop_notices() {
        post(NotificationType::Success, title, message);
    }
}

fn post(notification_type: NotificationType, title: &str, message: &str) {
    // Reports can come from synchronous code paths outside of the runtime
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        return;
    };

    let title = title.to_string();
    let message = message.to_string();
    let task = handle.spawn(async move {
        if let Err(e) = show_system_notification(notification_type, &title, &message).await {
            log::debug!("Notification failed: {e}");
        }
    });

    if let Ok(mut pending) = PENDING.lock() {
        pending.retain(|task| !task.is_finished());
        pending.push(task);
    }
}

/// Wait for notifications that are still being posted
pub async fn flush() {
    let tasks = match PENDING.lock() {
        Ok(mut pending) => std::mem::take(&mut *pending),
        Err(_) => return,
    };

    for task in tasks {
        let _ = task.await;
    }
}

#[macro_export]
macro_rules! report_error {
    ($title:expr, $msg:expr) => {
        $crate::error_handling::report_error(
            $crate::error_handling::ErrorSeverity::Error,
            $title,
            $msg,
        )
    };
}

#[macro_export]
macro_rules! report_warning {
    ($title:expr, $msg:expr) => {
        $crate::error_handling::report_error(
            $crate::error_handling::ErrorSeverity::Warning,
            $title,
            $msg,
        )
    };
}
