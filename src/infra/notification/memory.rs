//! In-memory notification surface backing the dashboard.

use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;
use uuid::Uuid;

use crate::domain::{
    AppError, Notification, NotificationId, NotificationKind, NotificationMessage,
    NotificationSurface,
};

/// Holds visible notifications until they are dismissed
#[derive(Default)]
pub struct InMemoryNotificationSurface {
    /// Insertion sequence keeps `visible` ordered oldest first
    notifications: DashMap<NotificationId, (u64, Notification)>,
    sequence: AtomicU64,
}

impl InMemoryNotificationSurface {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.notifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }
}

impl NotificationSurface for InMemoryNotificationSurface {
    fn show(&self, message: &NotificationMessage, kind: NotificationKind) -> NotificationId {
        let id = NotificationId::new(Uuid::new_v4().to_string());
        let now = Utc::now();
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.notifications.insert(
            id.clone(),
            (
                seq,
                Notification {
                    id: id.clone(),
                    kind,
                    message: message.clone(),
                    created_at: now,
                    updated_at: now,
                },
            ),
        );
        id
    }

    fn update(&self, id: &NotificationId, message: &NotificationMessage, kind: NotificationKind) {
        match self.notifications.get_mut(id) {
            Some(mut entry) => {
                let notification = &mut entry.value_mut().1;
                notification.kind = kind;
                notification.message = message.clone();
                notification.updated_at = Utc::now();
            }
            None => debug!(id = %id, "Update for unknown notification ignored"),
        }
    }

    fn dismiss(&self, id: &NotificationId) {
        self.notifications.remove(id);
    }

    fn visible(&self) -> Result<Vec<Notification>, AppError> {
        let mut entries: Vec<(u64, Notification)> = self
            .notifications
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        entries.sort_by_key(|(seq, _)| *seq);
        Ok(entries.into_iter().map(|(_, n)| n).collect())
    }
}
