use std::sync::Arc;

use super::NotificationBus;
use crate::domain::LifecycleError;
use crate::models::{Notification, NotificationDraft};
use crate::store::NotificationRepository;

/// Read side of the notification store plus the manual create command.
/// Manual creates go through the bus like every other notification.
pub struct NotificationInbox {
    notifications: Arc<dyn NotificationRepository>,
    bus: Arc<NotificationBus>,
}

impl NotificationInbox {
    pub fn new(notifications: Arc<dyn NotificationRepository>, bus: Arc<NotificationBus>) -> Self {
        Self { notifications, bus }
    }

    pub async fn create(&self, draft: NotificationDraft) -> Result<Notification, LifecycleError> {
        if draft.title.trim().is_empty() {
            return Err(LifecycleError::InvalidArgument("title must not be blank".to_string()));
        }
        Ok(self.bus.notify(draft).await?)
    }

    pub async fn list(&self, unread_only: bool) -> Result<Vec<Notification>, LifecycleError> {
        Ok(self.notifications.list(unread_only).await?)
    }

    pub async fn get(&self, id: i64) -> Result<Notification, LifecycleError> {
        self.notifications
            .get(id)
            .await?
            .ok_or_else(|| LifecycleError::notification_not_found(id))
    }

    pub async fn mark_read(&self, id: i64) -> Result<Notification, LifecycleError> {
        self.notifications
            .mark_read(id)
            .await?
            .ok_or_else(|| LifecycleError::notification_not_found(id))
    }

    pub async fn mark_all_read(&self) -> Result<u64, LifecycleError> {
        let flipped = self.notifications.mark_all_read().await?;
        tracing::debug!(flipped, "Marked all notifications read");
        Ok(flipped)
    }

    pub async fn delete(&self, id: i64) -> Result<(), LifecycleError> {
        if self.notifications.delete(id).await? {
            Ok(())
        } else {
            Err(LifecycleError::notification_not_found(id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::testkit::Harness;
    use crate::models::NotificationType;

    fn inbox(h: &Harness) -> NotificationInbox {
        NotificationInbox::new(h.store.clone(), h.bus.clone())
    }

    #[tokio::test]
    async fn test_read_receipts() {
        let h = Harness::new();
        let inbox = inbox(&h);
        let first = inbox
            .create(NotificationDraft::new(NotificationType::Info, "a", "m"))
            .await
            .unwrap();
        inbox
            .create(NotificationDraft::new(NotificationType::Error, "b", "m"))
            .await
            .unwrap();

        assert!(inbox.mark_read(first.id).await.unwrap().read);
        assert_eq!(inbox.list(true).await.unwrap().len(), 1);
        assert_eq!(inbox.mark_all_read().await.unwrap(), 1);
        assert!(inbox.list(true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_ids_are_not_found() {
        let h = Harness::new();
        let inbox = inbox(&h);
        assert_eq!(inbox.get(7).await.unwrap_err().kind(), "not_found");
        assert_eq!(inbox.mark_read(7).await.unwrap_err().kind(), "not_found");
        assert_eq!(inbox.delete(7).await.unwrap_err().kind(), "not_found");
    }

    #[tokio::test]
    async fn test_delete_removes_row() {
        let h = Harness::new();
        let inbox = inbox(&h);
        let created = inbox
            .create(NotificationDraft::new(NotificationType::Info, "a", "m"))
            .await
            .unwrap();

        inbox.delete(created.id).await.unwrap();
        assert!(inbox.list(false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_title_is_rejected() {
        let h = Harness::new();
        let err = inbox(&h)
            .create(NotificationDraft::new(NotificationType::Info, " ", "m"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
    }
}
