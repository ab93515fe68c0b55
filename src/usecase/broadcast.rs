//! Real-time fan-out.
//!
//! Every connected socket subscribes to topics on the in-process `BroadcastHub`.
//! With a single replica, `LocalBroadcaster` publishes straight into the hub.
//! With NATS available, `NatsBroadcaster` publishes to `notifications.{topic}` and
//! every replica runs a relay that feeds those messages back into its own hub.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;

use crate::domain::topic::Topic;
use crate::usecase::contracts::Broadcaster;
use crate::usecase::error::BroadcastError;

pub const NATS_SUBJECT_PREFIX: &str = "notifications";
const DEFAULT_TOPIC_CAPACITY: usize = 64;

pub struct BroadcastHub {
    channels: RwLock<HashMap<Topic, broadcast::Sender<String>>>,
    capacity: usize,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC_CAPACITY)
    }
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub async fn subscribe(&self, topic: Topic) -> broadcast::Receiver<String> {
        let mut channels = self.channels.write().await;
        channels
            .entry(topic)
            .or_insert_with(|| {
                tracing::debug!(%topic, "creating new broadcast channel");
                broadcast::channel(self.capacity).0
            })
            .subscribe()
    }

    /// Returns the number of local subscribers that received the message.
    pub async fn publish(&self, topic: &Topic, message: String) -> usize {
        let channels = self.channels.read().await;
        match channels.get(topic) {
            Some(sender) => sender.send(message).unwrap_or(0),
            None => 0,
        }
    }

    /// Drops the topic channel once nobody listens on it anymore.
    pub async fn release(&self, topic: &Topic) {
        let mut channels = self.channels.write().await;
        if let Some(sender) = channels.get(topic) {
            if sender.receiver_count() == 0 {
                channels.remove(topic);
                tracing::debug!(%topic, "removed empty broadcast channel");
            }
        }
    }

    #[cfg(test)]
    pub async fn topic_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

pub struct LocalBroadcaster {
    hub: Arc<BroadcastHub>,
}

impl LocalBroadcaster {
    pub fn new(hub: Arc<BroadcastHub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl Broadcaster for LocalBroadcaster {
    async fn publish(&self, topic: &Topic, message: &str) -> Result<(), BroadcastError> {
        let receivers = self.hub.publish(topic, message.to_string()).await;
        tracing::debug!(%topic, receivers, "published to local subscribers");
        Ok(())
    }
}

pub struct NatsBroadcaster {
    client: async_nats::Client,
}

impl NatsBroadcaster {
    pub fn new(client: async_nats::Client) -> Self {
        Self { client }
    }
}

pub fn nats_subject(topic: &Topic) -> String {
    format!("{}.{}", NATS_SUBJECT_PREFIX, topic)
}

pub fn topic_from_subject(subject: &str) -> Option<Topic> {
    subject
        .strip_prefix(NATS_SUBJECT_PREFIX)?
        .strip_prefix('.')?
        .parse()
        .ok()
}

#[async_trait]
impl Broadcaster for NatsBroadcaster {
    async fn publish(&self, topic: &Topic, message: &str) -> Result<(), BroadcastError> {
        self.client
            .publish(nats_subject(topic), message.as_bytes().to_vec().into())
            .await
            .map_err(|e| BroadcastError::Publish {
                topic: topic.to_string(),
                reason: e.to_string(),
            })?;
        tracing::debug!(%topic, "published to NATS");
        Ok(())
    }
}

/// Feeds messages published by any replica into the local hub.
pub async fn spawn_nats_relay(
    client: async_nats::Client,
    hub: Arc<BroadcastHub>,
) -> Result<JoinHandle<()>, async_nats::SubscribeError> {
    let mut subscriber = client.subscribe(format!("{}.>", NATS_SUBJECT_PREFIX)).await?;

    Ok(tokio::spawn(async move {
        while let Some(message) = subscriber.next().await {
            let Some(topic) = topic_from_subject(message.subject.as_str()) else {
                tracing::warn!(subject = %message.subject, "ignoring message on unknown subject");
                continue;
            };
            match String::from_utf8(message.payload.to_vec()) {
                Ok(payload) => {
                    let receivers = hub.publish(&topic, payload).await;
                    tracing::debug!(%topic, receivers, "relayed broadcast from NATS");
                }
                Err(e) => tracing::warn!(%topic, error = %e, "dropping non UTF-8 broadcast"),
            }
        }
        tracing::info!("NATS broadcast relay stopped");
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_subscriber_receives_published_message() {
        let hub = Arc::new(BroadcastHub::default());
        let topic = Topic::User(Uuid::new_v4());
        let mut receiver = hub.subscribe(topic).await;
        let broadcaster = LocalBroadcaster::new(hub.clone());

        broadcaster.publish(&topic, "hello").await.unwrap();

        assert_eq!(receiver.recv().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_not_an_error() {
        let hub = Arc::new(BroadcastHub::default());
        let broadcaster = LocalBroadcaster::new(hub.clone());

        assert!(broadcaster.publish(&Topic::Admin, "hello").await.is_ok());
        assert_eq!(hub.topic_count().await, 0);
    }

    #[tokio::test]
    async fn test_topics_are_isolated() {
        let hub = BroadcastHub::default();
        let mut group = hub.subscribe(Topic::Group(Uuid::new_v4())).await;
        let _admin = hub.subscribe(Topic::Admin).await;

        assert_eq!(hub.publish(&Topic::Admin, "admins only".to_string()).await, 1);
        assert!(group.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_release_removes_channel_without_receivers() {
        let hub = BroadcastHub::default();
        let topic = Topic::Admin;
        let receiver = hub.subscribe(topic).await;

        hub.release(&topic).await;
        assert_eq!(hub.topic_count().await, 1);

        drop(receiver);
        hub.release(&topic).await;
        assert_eq!(hub.topic_count().await, 0);
    }

    #[test]
    fn test_subject_round_trip() {
        let topic = Topic::Group(Uuid::new_v4());

        assert_eq!(topic_from_subject(&nats_subject(&topic)), Some(topic));
        assert_eq!(nats_subject(&Topic::Admin), "notifications.admin-channel");
        assert_eq!(topic_from_subject("photos.process"), None);
        assert_eq!(topic_from_subject("notifications.unknown"), None);
    }
}
