//! Per-post live subscribers and non-blocking fan-out.

use std::{
    collections::HashMap,
    sync::{
        RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use metrics::counter;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace};

use crate::{cache::lock, domain::posts::PostId};

const SOURCE: &str = "application::notify";

/// Message sent to subscribers when the post they watch has new content.
pub const RELOAD_MESSAGE: &str = "reload";

pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    post_id: PostId,
    sender: mpsc::Sender<String>,
}

/// Receiving half of one registration.
///
/// Dropping it closes the receiver, after which the notifier counts sends to
/// it as dropped until [`ChangeNotifier::unsubscribe`] removes the entry.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    post_id: PostId,
    receiver: mpsc::Receiver<String>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn post_id(&self) -> &PostId {
        &self.post_id
    }

    /// Next message, or `None` once unsubscribed.
    pub async fn recv(&mut self) -> Option<String> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<String> {
        self.receiver.try_recv().ok()
    }
}

/// Registry of live subscribers keyed by the post they watch.
///
/// `notify` holds the shared lock and never waits on a subscriber: a full
/// buffer or a gone receiver loses that one message for that one subscriber.
pub struct ChangeNotifier {
    subscribers: RwLock<HashMap<SubscriptionId, Subscriber>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
        }
    }

    pub fn subscribe(&self, post_id: PostId) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.capacity);
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));

        lock::write(&self.subscribers, SOURCE, "subscribe").insert(
            id,
            Subscriber {
                post_id: post_id.clone(),
                sender,
            },
        );
        debug!(target = "the_archive::live", post_id = %post_id, "subscriber added");

        Subscription {
            id,
            post_id,
            receiver,
        }
    }

    /// Remove a registration and close its channel.
    pub fn unsubscribe(&self, subscription: &Subscription) {
        self.unsubscribe_id(subscription.id);
    }

    pub fn unsubscribe_id(&self, id: SubscriptionId) {
        let removed = lock::write(&self.subscribers, SOURCE, "unsubscribe").remove(&id);
        if let Some(subscriber) = removed {
            debug!(
                target = "the_archive::live",
                post_id = %subscriber.post_id,
                "subscriber removed"
            );
        }
    }

    /// Offer `message` to every subscriber of `post_id`. Returns how many accepted it.
    pub fn notify(&self, post_id: &PostId, message: &str) -> usize {
        let subscribers = lock::read(&self.subscribers, SOURCE, "notify");
        let mut delivered = 0;
        let mut dropped = 0;

        for subscriber in subscribers.values().filter(|s| &s.post_id == post_id) {
            match subscriber.sender.try_send(message.to_string()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => dropped += 1,
            }
        }
        drop(subscribers);

        counter!("archive_live_delivered_total").increment(delivered as u64);
        counter!("archive_live_dropped_total").increment(dropped as u64);
        trace!(
            target = "the_archive::live",
            post_id = %post_id,
            delivered,
            dropped,
            "change notification fanned out"
        );
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        lock::read(&self.subscribers, SOURCE, "subscriber_count").len()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}
