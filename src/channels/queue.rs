//! Queue channel: bounded in-memory point-to-point channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify, mpsc};
use tracing::{debug, warn};

use crate::channels::{MessageChannel, PollableChannel, SendOutcome};
use crate::error::ChannelError;
use crate::message::Message;

/// Default queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Bounded FIFO channel. Senders never wait: a full queue reports
/// [`SendOutcome::Full`].
pub struct QueueChannel {
    name: String,
    tx: mpsc::Sender<Message>,
    rx: Mutex<mpsc::Receiver<Message>>,
    closed: AtomicBool,
    close_signal: Notify,
}

impl QueueChannel {
    /// Create a queue holding at most `capacity` messages.
    pub fn new(name: impl Into<String>, capacity: usize) -> Result<Arc<Self>, ChannelError> {
        let name = name.into();
        if capacity == 0 {
            return Err(ChannelError::ZeroCapacity { name });
        }
        let (tx, rx) = mpsc::channel(capacity);
        Ok(Arc::new(Self {
            name,
            tx,
            rx: Mutex::new(rx),
            closed: AtomicBool::new(false),
            close_signal: Notify::new(),
        }))
    }

    /// Stop accepting messages. Already queued messages can still be received;
    /// receivers waiting on an empty queue return `None`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.close_signal.notify_waiters();
        debug!(channel = %self.name, "Queue channel closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

#[async_trait]
impl MessageChannel for QueueChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: Message) -> SendOutcome {
        if self.is_closed() {
            return SendOutcome::Closed;
        }
        match self.tx.try_send(message) {
            Ok(()) => SendOutcome::Sent,
            Err(mpsc::error::TrySendError::Full(message)) => {
                warn!(channel = %self.name, message_id = %message.id(), "Queue channel full");
                SendOutcome::Full
            }
            Err(mpsc::error::TrySendError::Closed(_)) => SendOutcome::Closed,
        }
    }
}

#[async_trait]
impl PollableChannel for QueueChannel {
    async fn receive(&self, timeout: Duration) -> Option<Message> {
        let mut rx = self.rx.lock().await;

        if let Ok(message) = rx.try_recv() {
            return Some(message);
        }

        // Registered before the closed check so a concurrent close() is not missed.
        let closing = self.close_signal.notified();
        tokio::pin!(closing);
        closing.as_mut().enable();

        if self.is_closed() {
            return None;
        }

        tokio::select! {
            received = tokio::time::timeout(timeout, rx.recv()) => received.ok().flatten(),
            () = &mut closing => rx.try_recv().ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(payload: &str) -> Message {
        Message::new(payload).unwrap()
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(matches!(
            QueueChannel::new("q", 0),
            Err(ChannelError::ZeroCapacity { .. })
        ));
    }

    #[tokio::test]
    async fn send_and_receive_in_order() {
        let queue = QueueChannel::new("orders", 4).unwrap();
        assert_eq!(queue.send(msg("a")).await, SendOutcome::Sent);
        assert_eq!(queue.send(msg("b")).await, SendOutcome::Sent);
        assert_eq!(queue.len(), 2);

        let first = queue.receive(Duration::from_millis(10)).await.unwrap();
        let second = queue.receive(Duration::from_millis(10)).await.unwrap();
        assert_eq!(first.payload(), "a");
        assert_eq!(second.payload(), "b");
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn full_queue_reports_full() {
        let queue = QueueChannel::new("small", 1).unwrap();
        assert_eq!(queue.send(msg("a")).await, SendOutcome::Sent);
        assert_eq!(queue.send(msg("b")).await, SendOutcome::Full);
    }

    #[tokio::test]
    async fn receive_times_out_when_empty() {
        let queue = QueueChannel::new("empty", 1).unwrap();
        assert!(queue.receive(Duration::from_millis(5)).await.is_none());
    }

    #[tokio::test]
    async fn closed_queue_rejects_but_drains() {
        let queue = QueueChannel::new("closing", 2).unwrap();
        queue.send(msg("kept")).await;
        queue.close();

        assert_eq!(queue.send(msg("late")).await, SendOutcome::Closed);
        let drained = queue.receive(Duration::from_millis(5)).await.unwrap();
        assert_eq!(drained.payload(), "kept");
        assert!(queue.receive(Duration::from_secs(5)).await.is_none());
    }

    #[tokio::test]
    async fn close_wakes_waiting_receiver() {
        let queue = QueueChannel::new("closing", 1).unwrap();
        let receiver = Arc::clone(&queue);
        let waiting =
            tokio::spawn(async move { receiver.receive(Duration::from_secs(30)).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close();

        let received = tokio::time::timeout(Duration::from_secs(2), waiting)
            .await
            .expect("receiver should return promptly after close")
            .unwrap();
        assert!(received.is_none());
    }

    #[tokio::test]
    async fn receive_waits_for_late_sender() {
        let queue = QueueChannel::new("late", 1).unwrap();
        let sender = Arc::clone(&queue);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            sender.send(msg("late")).await;
        });
        let received = queue.receive(Duration::from_secs(2)).await;
        assert_eq!(received.unwrap().payload(), "late");
    }
}
