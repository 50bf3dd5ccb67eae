use tracing::debug;

use crate::source::Subscription;

/// Generation captured when an aggregation cycle starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleTicket {
    generation: u64,
}

impl CycleTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Decides whether asynchronous results may still touch rotation state.
///
/// A result is applied only while the guard is mounted and its ticket is the
/// newest one issued. Subscriptions held here are released on teardown.
#[derive(Debug)]
pub struct LifecycleGuard {
    generation: u64,
    mounted: bool,
    subscriptions: Vec<Subscription>,
}

impl Default for LifecycleGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleGuard {
    pub fn new() -> Self {
        Self {
            generation: 0,
            mounted: true,
            subscriptions: Vec::new(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Starts a new cycle, invalidating every ticket issued before it.
    pub fn begin_cycle(&mut self) -> CycleTicket {
        self.generation += 1;
        CycleTicket {
            generation: self.generation,
        }
    }

    pub fn is_current(&self, ticket: CycleTicket) -> bool {
        self.mounted && ticket.generation == self.generation
    }

    pub fn hold(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    pub fn held_subscriptions(&self) -> usize {
        self.subscriptions.len()
    }

    /// Unmounts and releases every held subscription. Idempotent.
    pub fn teardown(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;
        let released = self.subscriptions.len();
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
        debug!(released, generation = self.generation, "lifecycle guard torn down");
    }
}

impl Drop for LifecycleGuard {
    fn drop(&mut self) {
        self.teardown();
    }
}
