use std::sync::Arc;

use serde_json::json;
use thiserror::Error;

use crate::domain::{
    definition::NotificationDefinition,
    notification::{BROADCAST_EVENT, Channel, Notification},
    topic::Topic,
    user::Recipient,
};
use crate::repository::errors::RepositoryError;
use crate::usecase::contracts::NotificationRepository;
use crate::usecase::worker::{DeliveryJob, DeliveryQueue, DeliveryTarget};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to persist notification: {0}")]
    Persist(#[from] RepositoryError),
}

#[derive(Debug, Clone)]
pub struct DispatchReceipt {
    pub notification: Notification,
    /// Channels that were handed to the delivery queue.
    pub enqueued: Vec<Channel>,
}

pub fn broadcast_message(topic: &Topic, notification: &Notification) -> String {
    json!({
        "event": BROADCAST_EVENT,
        "topic": topic,
        "data": notification.broadcast_data(),
    })
    .to_string()
}

pub struct NotificationDispatcher<N>
where
    N: NotificationRepository + ?Sized,
{
    notification_repository: Arc<N>,
    queue: DeliveryQueue,
    login_url: String,
}

impl<N> NotificationDispatcher<N>
where
    N: NotificationRepository + ?Sized,
{
    pub fn new(notification_repository: Arc<N>, queue: DeliveryQueue, login_url: String) -> Self {
        Self {
            notification_repository,
            queue,
            login_url,
        }
    }

    #[tracing::instrument(skip(self, recipient, definition), fields(recipient_id = %recipient.id, notification_type = %definition.kind()))]
    pub async fn notify(
        &self,
        recipient: &Recipient,
        definition: &NotificationDefinition,
    ) -> Result<DispatchReceipt, DispatchError> {
        tracing::debug!("dispatching notification");

        let kind = definition.kind();
        let notification = Notification::new(recipient.id, kind, definition.render());

        if kind.has_channel(Channel::Persistent) {
            self.notification_repository.create(&notification).await?;
        }

        let mut enqueued = Vec::new();

        if kind.has_channel(Channel::Broadcast) {
            match definition.topic(recipient.id) {
                Some(topic) => {
                    let job = DeliveryJob {
                        notification_id: notification.id,
                        target: DeliveryTarget::Broadcast {
                            topic,
                            message: broadcast_message(&topic, &notification),
                        },
                    };
                    if self.queue.enqueue(job) {
                        enqueued.push(Channel::Broadcast);
                    }
                }
                None => tracing::debug!("no broadcast topic for this notification"),
            }
        }

        if kind.has_channel(Channel::Mail) {
            match definition.mail(recipient, &self.login_url) {
                Some(mail) => {
                    let job = DeliveryJob {
                        notification_id: notification.id,
                        target: DeliveryTarget::Mail {
                            recipient: recipient.clone(),
                            mail,
                        },
                    };
                    if self.queue.enqueue(job) {
                        enqueued.push(Channel::Mail);
                    }
                }
                None => tracing::debug!("no mail representation for this notification"),
            }
        }

        tracing::info!(notification_id = %notification.id, enqueued = ?enqueued, "notification dispatched");
        Ok(DispatchReceipt { notification, enqueued })
    }

    /// Dispatches to every recipient. One recipient's failure does not stop the others.
    #[tracing::instrument(skip(self, recipients, definition), fields(recipients = recipients.len(), notification_type = %definition.kind()))]
    pub async fn notify_all(
        &self,
        recipients: &[Recipient],
        definition: &NotificationDefinition,
    ) -> Vec<Result<DispatchReceipt, DispatchError>> {
        let mut results = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let result = self.notify(recipient, definition).await;
            if let Err(e) = &result {
                tracing::error!(recipient_id = %recipient.id, error = %e, "failed to dispatch notification");
            }
            results.push(result);
        }
        results
    }
}
