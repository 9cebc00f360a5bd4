//! In-process publish/subscribe bus for user-facing progress messages.
//!
//! Each subscriber gets its own unbounded queue and a dedicated delivery
//! task, so publishers never block and a slow subscriber only delays its
//! own deliveries. Messages reach each subscriber in exact publish order,
//! with no drops and no duplicates; a subscriber only observes messages
//! published after it registered.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::domain::{Message, MessageKind};

/// Opaque handle identifying one subscription, used for teardown.
pub type SubscriptionToken = Uuid;

struct Delivery {
    tx: mpsc::UnboundedSender<Message>,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

/// Fan-out broadcast of [`Message`] values to any number of subscribers.
///
/// Must be used from within a tokio runtime: `subscribe` spawns the
/// delivery task.
#[derive(Default)]
pub struct ReportBus {
    subscribers: Mutex<HashMap<SubscriptionToken, Delivery>>,
}

impl ReportBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a message stamped with the current time and publish it to
    /// every current subscriber. Never blocks the caller.
    pub fn post(&self, kind: MessageKind, text: impl Into<String>) {
        let message = Message::new(kind, text);
        let subscribers = self.subscribers.lock().unwrap();
        for delivery in subscribers.values() {
            // A send only fails once the delivery task is gone, which
            // means the subscriber is being torn down anyway.
            let _ = delivery.tx.send(message.clone());
        }
    }

    /// Register a subscriber. Spawns a delivery task that invokes
    /// `handler` for every message published after this call, strictly in
    /// publish order.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionToken
    where
        F: FnMut(Message) + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let mut handler = handler;

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    message = rx.recv() => match message {
                        Some(message) => handler(message),
                        None => break,
                    },
                }
            }
        });

        let token = Uuid::new_v4();
        self.subscribers.lock().unwrap().insert(
            token,
            Delivery {
                tx,
                stop: Some(stop_tx),
                task: Some(task),
            },
        );
        token
    }

    /// Tear down one subscription. The delivery task finishes any handler
    /// invocation already in flight, then exits; once this returns, no
    /// further message reaches the subscriber, including ones still queued.
    pub async fn unsubscribe(&self, token: SubscriptionToken) {
        let delivery = self.subscribers.lock().unwrap().remove(&token);
        if let Some(mut delivery) = delivery {
            if let Some(stop) = delivery.stop.take() {
                let _ = stop.send(());
            }
            if let Some(task) = delivery.task.take() {
                let _ = task.await;
            }
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}
