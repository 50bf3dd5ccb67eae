use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use content_model::{Announcement, Category, Product, StoredSettings};
use tokio::sync::mpsc::Sender;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, trace};

use crate::error::SourceResult;
use crate::events::{SourceChanged, Topic};

/// Read side of the content store plus its change notifications.
///
/// Fetches may be slow, fail, or resolve in any order; callers treat every
/// result as a snapshot as of the moment it resolved.
pub trait ContentSource: Send + Sync + 'static {
    /// Products that are both active and featured.
    fn fetch_featured_products(&self) -> impl Future<Output = SourceResult<Vec<Product>>> + Send;

    /// All categories ordered by display order, unordered ones last.
    fn fetch_categories(&self) -> impl Future<Output = SourceResult<Vec<Category>>> + Send;

    /// Active announcements of type `slide`, date window not yet applied.
    fn fetch_active_slide_announcements(
        &self,
    ) -> impl Future<Output = SourceResult<Vec<Announcement>>> + Send;

    fn fetch_settings(&self) -> impl Future<Output = SourceResult<StoredSettings>> + Send;

    /// Registers `tx` for notifications about `topic`. Dropping or
    /// unsubscribing the returned handle severs the registration.
    fn subscribe(&self, topic: Topic, tx: Sender<SourceChanged>) -> Subscription;
}

#[derive(Default)]
struct HubInner {
    next_id: u64,
    subscribers: HashMap<u64, (Topic, Sender<SourceChanged>)>,
}

/// Observer registry shared by a source and its change producers.
#[derive(Clone, Default)]
pub struct ChangeHub {
    inner: Arc<Mutex<HubInner>>,
}

impl ChangeHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, topic: Topic, tx: Sender<SourceChanged>) -> Subscription {
        let mut inner = lock(&self.inner);
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.insert(id, (topic, tx));
        debug!(id, ?topic, "subscriber registered");
        Subscription {
            id,
            topic,
            hub: Arc::downgrade(&self.inner),
            released: false,
        }
    }

    /// Notifies every subscriber of `topic`; returns how many were reached.
    ///
    /// A subscriber whose queue is full already has a pending notification,
    /// and one notification triggers a full re-aggregation, so nothing is lost.
    pub fn publish(&self, topic: Topic) -> usize {
        let mut inner = lock(&self.inner);
        let mut reached = 0;
        let mut closed = Vec::new();
        for (id, (subscribed, tx)) in inner.subscribers.iter() {
            if *subscribed != topic {
                continue;
            }
            match tx.try_send(SourceChanged(topic)) {
                Ok(()) => reached += 1,
                Err(TrySendError::Full(_)) => {
                    trace!(id, ?topic, "notification already pending");
                    reached += 1;
                }
                Err(TrySendError::Closed(_)) => closed.push(*id),
            }
        }
        for id in closed {
            inner.subscribers.remove(&id);
        }
        reached
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner).subscribers.len()
    }
}

/// Handle returned by [`ChangeHub::subscribe`].
#[derive(Debug)]
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    topic: Topic,
    hub: Weak<Mutex<HubInner>>,
    released: bool,
}

impl Subscription {
    pub fn topic(&self) -> Topic {
        self.topic
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Some(hub) = self.hub.upgrade() {
            lock(&hub).subscribers.remove(&self.id);
            debug!(id = self.id, topic = ?self.topic, "subscriber released");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

fn lock(inner: &Mutex<HubInner>) -> MutexGuard<'_, HubInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}
