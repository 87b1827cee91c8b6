//! User notifications for triggered price alerts

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};

/// Whether the user allows notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPermission {
    /// Not asked yet
    Default,
    Granted,
    Denied,
}

/// A notification ready to be shown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

/// Sink for user notifications
pub trait Notifier: Send + Sync {
    /// Current permission state
    fn permission(&self) -> NotificationPermission;

    /// Asks the user for permission and returns the outcome
    fn request_permission(&self) -> NotificationPermission;

    /// Shows a notification; only called while permission is granted
    fn notify(&self, notification: &Notification);
}

/// Notifier for the terminal client
///
/// Starts in the `Default` state and grants on request; notifications are
/// emitted as warnings on the `alerts` tracing target.
#[derive(Debug)]
pub struct LogNotifier {
    permission: AtomicU8,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self {
            permission: AtomicU8::new(encode(NotificationPermission::Default)),
        }
    }

    /// A notifier whose permission was already decided
    pub fn with_permission(permission: NotificationPermission) -> Self {
        Self {
            permission: AtomicU8::new(encode(permission)),
        }
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new()
    }
}

fn encode(permission: NotificationPermission) -> u8 {
    match permission {
        NotificationPermission::Default => 0,
        NotificationPermission::Granted => 1,
        NotificationPermission::Denied => 2,
    }
}

fn decode(raw: u8) -> NotificationPermission {
    match raw {
        1 => NotificationPermission::Granted,
        2 => NotificationPermission::Denied,
        _ => NotificationPermission::Default,
    }
}

impl Notifier for LogNotifier {
    fn permission(&self) -> NotificationPermission {
        decode(self.permission.load(Ordering::Acquire))
    }

    fn request_permission(&self) -> NotificationPermission {
        // terminal output needs no consent, so a pending request is granted
        let _ = self.permission.compare_exchange(
            encode(NotificationPermission::Default),
            encode(NotificationPermission::Granted),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        self.permission()
    }

    fn notify(&self, notification: &Notification) {
        tracing::warn!(target: "alerts", title = %notification.title, "{}", notification.body);
    }
}
