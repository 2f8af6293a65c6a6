//! Notification surface that only writes log lines.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{info, warn};

use crate::domain::{NotificationId, NotificationKind, NotificationMessage, NotificationSurface};

/// For headless deployments: every notification becomes a log event
#[derive(Default)]
pub struct TracingNotificationSurface {
    next_id: AtomicU64,
}

impl TracingNotificationSurface {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn emit(id: &NotificationId, message: &NotificationMessage, kind: NotificationKind) {
        let source = message.source.as_deref().unwrap_or("-");
        let description = message.description.as_deref().unwrap_or("");
        match kind {
            NotificationKind::Error | NotificationKind::Warning => warn!(
                id = %id,
                source = %source,
                kind = ?kind,
                description = %description,
                "{}",
                message.title
            ),
            _ => info!(
                id = %id,
                source = %source,
                kind = ?kind,
                description = %description,
                "{}",
                message.title
            ),
        }
    }
}

impl NotificationSurface for TracingNotificationSurface {
    fn show(&self, message: &NotificationMessage, kind: NotificationKind) -> NotificationId {
        let id = NotificationId::new(format!(
            "log-{}",
            self.next_id.fetch_add(1, Ordering::Relaxed) + 1
        ));
        Self::emit(&id, message, kind);
        id
    }

    fn update(&self, id: &NotificationId, message: &NotificationMessage, kind: NotificationKind) {
        Self::emit(id, message, kind);
    }

    fn dismiss(&self, id: &NotificationId) {
        info!(id = %id, "Notification dismissed");
    }
}
