//! Delivery queue and worker pool.
//!
//! The dispatcher enqueues one job per non-persistent channel. A fixed set of
//! workers drains the queue, each job being a single broadcast publish or mail
//! send bounded by the delivery timeout. Failures are logged and counted, never
//! retried and never reported back to the event source.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::domain::{mail::MailMessage, notification::Channel, topic::Topic, user::Recipient};
use crate::usecase::contracts::{Broadcaster, Mailer};

#[derive(Debug, Clone)]
pub enum DeliveryTarget {
    Broadcast { topic: Topic, message: String },
    Mail { recipient: Recipient, mail: MailMessage },
}

impl DeliveryTarget {
    pub fn channel(&self) -> Channel {
        match self {
            DeliveryTarget::Broadcast { .. } => Channel::Broadcast,
            DeliveryTarget::Mail { .. } => Channel::Mail,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeliveryJob {
    pub notification_id: Uuid,
    pub target: DeliveryTarget,
}

#[derive(Clone)]
pub struct DeliveryQueue {
    sender: mpsc::Sender<DeliveryJob>,
}

impl DeliveryQueue {
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<DeliveryJob>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Returns `false` when the job was dropped.
    pub fn enqueue(&self, job: DeliveryJob) -> bool {
        let channel = job.target.channel();
        match self.sender.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                tracing::error!(notification_id = %job.notification_id, %channel, "delivery queue is full, dropping job");
                metrics::counter!("notification_deliveries_dropped_total", "channel" => channel.as_str()).increment(1);
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                tracing::error!(notification_id = %job.notification_id, %channel, "delivery queue is closed, dropping job");
                metrics::counter!("notification_deliveries_dropped_total", "channel" => channel.as_str()).increment(1);
                false
            }
        }
    }
}

#[derive(Clone)]
pub struct DeliveryChannels {
    pub broadcaster: Arc<dyn Broadcaster>,
    pub mailer: Arc<dyn Mailer>,
    pub timeout: Duration,
}

#[derive(Debug, Default)]
struct DeliveryStats {
    delivered: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeliverySnapshot {
    pub delivered: u64,
    pub failed: u64,
}

pub struct DeliveryWorkerPool {
    handles: Vec<JoinHandle<()>>,
    stats: Arc<DeliveryStats>,
}

impl DeliveryWorkerPool {
    pub fn spawn(
        receiver: mpsc::Receiver<DeliveryJob>,
        workers: usize,
        channels: DeliveryChannels,
    ) -> Self {
        let receiver = Arc::new(Mutex::new(receiver));
        let stats = Arc::new(DeliveryStats::default());

        let handles = (0..workers.max(1))
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    receiver.clone(),
                    channels.clone(),
                    stats.clone(),
                ))
            })
            .collect();

        tracing::info!(workers = workers.max(1), "delivery workers started");
        Self { handles, stats }
    }

    /// Waits for the workers to drain the queue. Every `DeliveryQueue` clone must
    /// have been dropped for this to return.
    pub async fn join(self) -> DeliverySnapshot {
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "delivery worker panicked");
            }
        }
        DeliverySnapshot {
            delivered: self.stats.delivered.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
        }
    }
}

async fn run_worker(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<DeliveryJob>>>,
    channels: DeliveryChannels,
    stats: Arc<DeliveryStats>,
) {
    loop {
        let job = receiver.lock().await.recv().await;
        let Some(job) = job else {
            tracing::debug!(worker_id, "delivery queue closed, worker exiting");
            break;
        };
        deliver(&job, &channels, &stats).await;
    }
}

#[tracing::instrument(skip(job, channels, stats), fields(notification_id = %job.notification_id, channel = %job.target.channel()))]
async fn deliver(job: &DeliveryJob, channels: &DeliveryChannels, stats: &DeliveryStats) {
    let channel = job.target.channel();

    let attempt = async {
        match &job.target {
            DeliveryTarget::Broadcast { topic, message } => channels
                .broadcaster
                .publish(topic, message)
                .await
                .map_err(|e| e.to_string()),
            DeliveryTarget::Mail { recipient, mail } => channels
                .mailer
                .send(recipient, mail)
                .await
                .map_err(|e| e.to_string()),
        }
    };

    let outcome = match tokio::time::timeout(channels.timeout, attempt).await {
        Ok(Ok(())) => {
            tracing::info!("notification delivered");
            stats.delivered.fetch_add(1, Ordering::Relaxed);
            "delivered"
        }
        Ok(Err(error)) => {
            tracing::warn!(%error, "notification delivery failed");
            stats.failed.fetch_add(1, Ordering::Relaxed);
            "failed"
        }
        Err(_) => {
            tracing::warn!(timeout_ms = channels.timeout.as_millis() as u64, "notification delivery timed out");
            stats.failed.fetch_add(1, Ordering::Relaxed);
            "timeout"
        }
    };

    metrics::counter!(
        "notification_deliveries_total",
        "channel" => channel.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecase::contracts::{MockBroadcaster, MockMailer};
    use crate::usecase::error::{BroadcastError, MailError};
    use async_trait::async_trait;

    struct SlowBroadcaster;

    #[async_trait]
    impl Broadcaster for SlowBroadcaster {
        async fn publish(&self, _topic: &Topic, _message: &str) -> Result<(), BroadcastError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
    }

    fn recipient() -> Recipient {
        Recipient {
            id: Uuid::new_v4(),
            name: "Sara".to_string(),
            email: "sara@example.com".to_string(),
        }
    }

    fn broadcast_job(topic: Topic) -> DeliveryJob {
        DeliveryJob {
            notification_id: Uuid::new_v4(),
            target: DeliveryTarget::Broadcast {
                topic,
                message: "{}".to_string(),
            },
        }
    }

    fn mail_job() -> DeliveryJob {
        DeliveryJob {
            notification_id: Uuid::new_v4(),
            target: DeliveryTarget::Mail {
                recipient: recipient(),
                mail: MailMessage::new("Subject", "Hello Sara,"),
            },
        }
    }

    fn channels(broadcaster: impl Broadcaster + 'static, mailer: impl Mailer + 'static) -> DeliveryChannels {
        DeliveryChannels {
            broadcaster: Arc::new(broadcaster),
            mailer: Arc::new(mailer),
            timeout: Duration::from_millis(100),
        }
    }

    #[tokio::test]
    async fn test_each_job_is_delivered_once() {
        let mut broadcaster = MockBroadcaster::new();
        broadcaster.expect_publish().times(3).returning(|_, _| Ok(()));
        let mut mailer = MockMailer::new();
        mailer.expect_send().times(1).returning(|_, _| Ok(()));

        let (queue, receiver) = DeliveryQueue::bounded(16);
        let pool = DeliveryWorkerPool::spawn(receiver, 2, channels(broadcaster, mailer));

        for _ in 0..3 {
            assert!(queue.enqueue(broadcast_job(Topic::Admin)));
        }
        assert!(queue.enqueue(mail_job()));
        drop(queue);

        let snapshot = pool.join().await;
        assert_eq!(snapshot, DeliverySnapshot { delivered: 4, failed: 0 });
    }

    #[tokio::test]
    async fn test_mail_failure_does_not_affect_broadcast() {
        let mut broadcaster = MockBroadcaster::new();
        broadcaster.expect_publish().times(1).returning(|_, _| Ok(()));
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .times(1)
            .returning(|_, _| Err(MailError::Transport("connection refused".to_string())));

        let (queue, receiver) = DeliveryQueue::bounded(16);
        let pool = DeliveryWorkerPool::spawn(receiver, 1, channels(broadcaster, mailer));

        queue.enqueue(mail_job());
        queue.enqueue(broadcast_job(Topic::User(Uuid::new_v4())));
        drop(queue);

        let snapshot = pool.join().await;
        assert_eq!(snapshot, DeliverySnapshot { delivered: 1, failed: 1 });
    }

    #[tokio::test]
    async fn test_slow_delivery_times_out() {
        let (queue, receiver) = DeliveryQueue::bounded(4);
        let pool = DeliveryWorkerPool::spawn(receiver, 1, channels(SlowBroadcaster, MockMailer::new()));

        queue.enqueue(broadcast_job(Topic::Admin));
        drop(queue);

        let snapshot = pool.join().await;
        assert_eq!(snapshot, DeliverySnapshot { delivered: 0, failed: 1 });
    }

    #[test]
    fn test_full_queue_drops_job() {
        let (queue, _receiver) = DeliveryQueue::bounded(1);

        assert!(queue.enqueue(broadcast_job(Topic::Admin)));
        assert!(!queue.enqueue(broadcast_job(Topic::Admin)));
    }

    #[test]
    fn test_closed_queue_drops_job() {
        let (queue, receiver) = DeliveryQueue::bounded(4);
        drop(receiver);

        assert!(!queue.enqueue(mail_job()));
    }

    #[test]
    fn test_target_channel() {
        assert_eq!(broadcast_job(Topic::Admin).target.channel(), Channel::Broadcast);
        assert_eq!(mail_job().target.channel(), Channel::Mail);
    }
}
