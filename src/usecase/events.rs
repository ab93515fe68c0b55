use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{definition::NotificationDefinition, user::Recipient};
use crate::usecase::contracts::{NotificationRepository, UserDirectory};
use crate::usecase::dispatcher::NotificationDispatcher;
use crate::usecase::error::UsecaseError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventOutcome {
    pub notification_ids: Vec<Uuid>,
    pub failed_recipient_ids: Vec<Uuid>,
}

/// Entry point for events raised by other SAMS services.
pub struct EventsUseCase<U, N>
where
    U: UserDirectory + ?Sized,
    N: NotificationRepository + ?Sized,
{
    user_directory: Arc<U>,
    dispatcher: Arc<NotificationDispatcher<N>>,
}

impl<U, N> EventsUseCase<U, N>
where
    U: UserDirectory + ?Sized,
    N: NotificationRepository + ?Sized,
{
    pub fn new(user_directory: Arc<U>, dispatcher: Arc<NotificationDispatcher<N>>) -> Self {
        Self {
            user_directory,
            dispatcher,
        }
    }

    #[tracing::instrument(skip(self, recipient_ids, definition), fields(notification_type = %definition.kind(), recipients = recipient_ids.len()))]
    pub async fn publish(
        &self,
        recipient_ids: &[Uuid],
        definition: &NotificationDefinition,
    ) -> Result<EventOutcome, UsecaseError> {
        tracing::debug!("publishing event");

        let kind = definition.kind();
        if kind.after_commit() {
            return Err(UsecaseError::validation(
                "notification.type",
                format!("The {} notification is only raised by this service after its own commit.", kind),
            ));
        }

        if recipient_ids.is_empty() {
            return Err(UsecaseError::validation(
                "recipient_ids",
                "At least one recipient is required.",
            ));
        }

        let mut seen = HashSet::new();
        let ids: Vec<Uuid> = recipient_ids.iter().copied().filter(|id| seen.insert(*id)).collect();

        let mut found: HashMap<Uuid, Recipient> = self
            .user_directory
            .find_recipients(&ids)
            .await?
            .into_iter()
            .map(|recipient| (recipient.id, recipient))
            .collect();

        let mut recipients = Vec::with_capacity(ids.len());
        for id in &ids {
            match found.remove(id) {
                Some(recipient) => recipients.push(recipient),
                None => return Err(UsecaseError::NotFound(format!("Recipient {}", id))),
            }
        }

        let mut outcome = EventOutcome::default();
        let results = self.dispatcher.notify_all(&recipients, definition).await;
        for (recipient, result) in recipients.iter().zip(results) {
            match result {
                Ok(receipt) => outcome.notification_ids.push(receipt.notification.id),
                Err(_) => outcome.failed_recipient_ids.push(recipient.id),
            }
        }

        tracing::info!(
            dispatched = outcome.notification_ids.len(),
            failed = outcome.failed_recipient_ids.len(),
            "event published"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::definition::{ActorRef, ContactRef, UserRef};
    use crate::repository::memory::{InMemoryDirectory, InMemoryNotificationRepository};
    use crate::usecase::worker::DeliveryQueue;

    fn user(name: &str) -> Recipient {
        Recipient {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
        }
    }

    fn registration() -> NotificationDefinition {
        NotificationDefinition::NewCenterAdminRegistration {
            center_admin: ContactRef {
                id: Uuid::new_v4(),
                name: "Nadia".to_string(),
                email: "nadia@example.com".to_string(),
            },
        }
    }

    fn setup(
        directory: Arc<InMemoryDirectory>,
    ) -> (
        EventsUseCase<InMemoryDirectory, InMemoryNotificationRepository>,
        Arc<InMemoryNotificationRepository>,
        tokio::sync::mpsc::Receiver<crate::usecase::worker::DeliveryJob>,
    ) {
        let repo = Arc::new(InMemoryNotificationRepository::default());
        let (queue, receiver) = DeliveryQueue::bounded(16);
        let dispatcher = Arc::new(NotificationDispatcher::new(
            repo.clone(),
            queue,
            "http://sams.test/login".to_string(),
        ));
        (EventsUseCase::new(directory, dispatcher), repo, receiver)
    }

    #[tokio::test]
    async fn test_publish_creates_one_row_per_recipient() {
        let directory = Arc::new(InMemoryDirectory::default());
        let first = user("Amal");
        let second = user("Badr");
        directory.add_user(first.clone());
        directory.add_user(second.clone());
        let (usecase, repo, _receiver) = setup(directory);

        let outcome = usecase
            .publish(&[first.id, second.id, first.id], &registration())
            .await
            .unwrap();

        assert_eq!(outcome.notification_ids.len(), 2);
        assert!(outcome.failed_recipient_ids.is_empty());
        let stored = repo.all();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].recipient_id, first.id);
        assert_eq!(stored[1].recipient_id, second.id);
    }

    #[tokio::test]
    async fn test_unknown_recipient_is_not_found() {
        let directory = Arc::new(InMemoryDirectory::default());
        let known = user("Amal");
        directory.add_user(known.clone());
        let (usecase, repo, _receiver) = setup(directory);

        let result = usecase.publish(&[known.id, Uuid::new_v4()], &registration()).await;

        assert!(matches!(result, Err(UsecaseError::NotFound(_))));
        assert!(repo.all().is_empty());
    }

    #[tokio::test]
    async fn test_empty_recipient_list_is_invalid() {
        let (usecase, _, _receiver) = setup(Arc::new(InMemoryDirectory::default()));

        let definition = NotificationDefinition::NewGroupCreated {
            group: crate::domain::definition::GroupRef {
                id: Uuid::new_v4(),
                name: "Physics".to_string(),
                subject: None,
            },
            teacher: UserRef {
                id: Uuid::new_v4(),
                name: "Karim".to_string(),
            },
        };
        let result = usecase.publish(&[], &definition).await;

        assert!(matches!(result, Err(UsecaseError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_after_commit_types_are_refused_from_outside() {
        let directory = Arc::new(InMemoryDirectory::default());
        let student = user("Omar");
        directory.add_user(student.clone());
        let (usecase, repo, _receiver) = setup(directory);

        let definition = NotificationDefinition::StudentAddedToGroup {
            added_by: ActorRef {
                id: Uuid::new_v4(),
                name: "Karim".to_string(),
                role: None,
            },
            group: None,
        };
        let result = usecase.publish(&[student.id], &definition).await;

        let Err(UsecaseError::Validation { errors, .. }) = result else {
            panic!("expected a validation error");
        };
        assert!(errors["notification.type"].is_array());
        assert!(repo.all().is_empty());
    }
}
