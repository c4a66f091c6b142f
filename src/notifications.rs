// SPDX-License-Identifier: GPL-3.0-only

//! System notification support using freedesktop notification standard

use std::collections::HashMap;
use tokio::sync::OnceCell;
use zbus::{proxy, Connection};

pub const APP_NAME: &str = "Screenshooter";

/// Notification urgency levels
#[derive(Debug, Clone, Copy)]
pub enum NotificationUrgency {
    Low = 0,
    Normal = 1,
    Critical = 2,
}

/// Notification types with appropriate urgency and icons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationType {
    Info,
    Warning,
    Error,
    Success,
}

impl NotificationType {
    #[must_use]
    pub fn urgency(&self) -> NotificationUrgency {
        match self {
            NotificationType::Info | NotificationType::Success => NotificationUrgency::Low,
            NotificationType::Warning => NotificationUrgency::Normal,
            NotificationType::Error => NotificationUrgency::Critical,
        }
    }

    #[must_use]
    pub fn icon(&self) -> &'static str {
        match self {
            NotificationType::Info => "dialog-information",
            NotificationType::Success => "emblem-default",
            NotificationType::Warning => "dialog-warning",
            NotificationType::Error => "dialog-error",
        }
    }
}

/// Freedesktop Notifications D-Bus proxy
#[allow(clippy::too_many_arguments)]
#[proxy(
    interface = "org.freedesktop.Notifications",
    default_service = "org.freedesktop.Notifications",
    default_path = "/org/freedesktop/Notifications"
)]
trait Notifications {
    /// Show a notification
    fn notify(
        &self,
        app_name: &str,
        replaces_id: u32,
        app_icon: &str,
        summary: &str,
        body: &str,
        actions: Vec<&str>,
        hints: HashMap<&str, zbus::zvariant::Value<'_>>,
        expire_timeout: i32,
    ) -> zbus::Result<u32>;
}

/// Session bus connection shared by every notification, opened on first use
static SESSION: OnceCell<Option<Connection>> = OnceCell::const_new();

async fn session() -> Option<&'static Connection> {
    SESSION
        .get_or_init(|| async { Connection::session().await.ok() })
        .await
        .as_ref()
}

/// Show a system notification
///
/// # Errors
/// Fails when there is no session bus or the notification daemon rejects the call.
pub async fn show_system_notification(
    notification_type: NotificationType,
    title: &str,
    message: &str,
) -> zbus::Result<u32> {
    let connection = session()
        .await
        .ok_or_else(|| zbus::Error::Failure("No D-Bus session bus for notifications".into()))?;
    let proxy = NotificationsProxy::new(connection).await?;

    let mut hints = HashMap::new();
    hints.insert("urgency", zbus::zvariant::Value::U8(notification_type.urgency() as u8));
    hints.insert("transient", zbus::zvariant::Value::Bool(true));

    proxy
        .notify(
            APP_NAME,
            0,
            notification_type.icon(),
            title,
            message,
            vec![],
            hints,
            5000,
        )
        .await
}
