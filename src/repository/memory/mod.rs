//! In-process adapters backing the scenario and router tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    domain::{group::Group, notification::Notification, user::Recipient},
    repository::errors::RepositoryError,
    usecase::contracts::{GroupRepository, NotificationRepository, UserDirectory},
};

#[derive(Default)]
pub struct InMemoryNotificationRepository {
    notifications: Mutex<Vec<Notification>>,
}

impl InMemoryNotificationRepository {
    pub fn all(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn insert(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}

#[async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn create(&self, notification: &Notification) -> Result<(), RepositoryError> {
        self.notifications.lock().unwrap().push(notification.clone());
        Ok(())
    }

    async fn find_by_user_id(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let mut owned: Vec<Notification> = self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.recipient_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(owned
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_by_user_id(&self, user_id: Uuid) -> Result<i64, RepositoryError> {
        let notifications = self.notifications.lock().unwrap();
        Ok(notifications.iter().filter(|n| n.recipient_id == user_id).count() as i64)
    }

    async fn count_unread(&self, user_id: Uuid) -> Result<i64, RepositoryError> {
        let notifications = self.notifications.lock().unwrap();
        Ok(notifications
            .iter()
            .filter(|n| n.recipient_id == user_id && !n.is_read())
            .count() as i64)
    }

    async fn mark_as_read(
        &self,
        id: Uuid,
        user_id: Uuid,
        read_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut notifications = self.notifications.lock().unwrap();
        let notification = notifications
            .iter_mut()
            .find(|n| n.id == id && n.recipient_id == user_id)
            .ok_or(RepositoryError::NotFound)?;
        notification.mark_read(read_at);
        Ok(())
    }

    async fn mark_all_as_read(&self, user_id: Uuid, read_at: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut notifications = self.notifications.lock().unwrap();
        let mut updated = 0;
        for notification in notifications
            .iter_mut()
            .filter(|n| n.recipient_id == user_id && !n.is_read())
        {
            notification.mark_read(read_at);
            updated += 1;
        }
        Ok(updated)
    }

    async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<(), RepositoryError> {
        let mut notifications = self.notifications.lock().unwrap();
        let before = notifications.len();
        notifications.retain(|n| !(n.id == id && n.recipient_id == user_id));
        if notifications.len() == before {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete_all(&self, user_id: Uuid) -> Result<u64, RepositoryError> {
        let mut notifications = self.notifications.lock().unwrap();
        let before = notifications.len();
        notifications.retain(|n| n.recipient_id != user_id);
        Ok((before - notifications.len()) as u64)
    }
}

/// Users, groups and enrollments in one place.
#[derive(Default)]
pub struct InMemoryDirectory {
    users: Mutex<HashMap<Uuid, Recipient>>,
    groups: Mutex<HashMap<Uuid, Group>>,
    enrollments: Mutex<HashSet<(Uuid, Uuid)>>,
}

impl InMemoryDirectory {
    pub fn add_user(&self, recipient: Recipient) {
        self.users.lock().unwrap().insert(recipient.id, recipient);
    }

    pub fn add_group(&self, group: Group) {
        self.groups.lock().unwrap().insert(group.id, group);
    }

    pub fn is_enrolled(&self, group_id: Uuid, student_id: Uuid) -> bool {
        self.enrollments.lock().unwrap().contains(&(group_id, student_id))
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn find_recipient(&self, id: Uuid) -> Result<Option<Recipient>, RepositoryError> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn find_recipients(&self, ids: &[Uuid]) -> Result<Vec<Recipient>, RepositoryError> {
        let users = self.users.lock().unwrap();
        Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
    }
}

#[async_trait]
impl GroupRepository for InMemoryDirectory {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Group>, RepositoryError> {
        Ok(self.groups.lock().unwrap().get(&id).cloned())
    }

    async fn is_member_or_teacher(&self, group_id: Uuid, user_id: Uuid) -> Result<bool, RepositoryError> {
        let teaches = self
            .groups
            .lock()
            .unwrap()
            .get(&group_id)
            .is_some_and(|group| group.is_taught_by(user_id));
        Ok(teaches || self.is_enrolled(group_id, user_id))
    }

    async fn enroll_student(&self, group_id: Uuid, student_id: Uuid) -> Result<bool, RepositoryError> {
        Ok(self.enrollments.lock().unwrap().insert((group_id, student_id)))
    }
}
