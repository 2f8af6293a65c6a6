//! Notification channel adapter.
//!
//! Thin wrapper over the shared [`NotificationSurface`] that tags every
//! notification with its owning call site. It holds no visibility state of
//! its own: keeping one notification per attempt is the lifecycle machine's job.

use std::sync::Arc;

use tracing::debug;

use crate::domain::{NotificationId, NotificationKind, NotificationMessage, NotificationSurface};

#[derive(Clone)]
pub struct NotificationChannel {
    surface: Arc<dyn NotificationSurface>,
    source: String,
}

impl NotificationChannel {
    #[must_use]
    pub fn new(surface: Arc<dyn NotificationSurface>, source: impl Into<String>) -> Self {
        Self {
            surface,
            source: source.into(),
        }
    }

    pub fn show(&self, message: NotificationMessage, kind: NotificationKind) -> NotificationId {
        let message = message.with_source(self.source.clone());
        let id = self.surface.show(&message, kind);
        debug!(source = %self.source, id = %id, ?kind, title = %message.title, "Notification shown");
        id
    }

    pub fn update(&self, id: &NotificationId, message: NotificationMessage, kind: NotificationKind) {
        let message = message.with_source(self.source.clone());
        debug!(source = %self.source, id = %id, ?kind, title = %message.title, "Notification updated");
        self.surface.update(id, &message, kind);
    }

    pub fn dismiss(&self, id: &NotificationId) {
        debug!(source = %self.source, id = %id, "Notification dismissed");
        self.surface.dismiss(id);
    }
}
