//! Topic state
//!
//! A `TopicState` bundles everything the bus keeps for one topic: the ordered
//! handler registrations, the FIFO of pending payloads and the throttle timer.
//! Keeping them in one value means they are created and torn down together.
//!
//! Concurrency note: callers must synchronize access to `TopicState` (the bus
//! keeps every topic behind its map lock).

use std::collections::VecDeque;

use crate::config::OverflowPolicy;

use super::handler::Subscription;
use super::timer::ThrottleTimer;

/// Result of a `publish` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The topic has no subscribers; the payload was dropped.
    NoSubscribers,
    /// The payload was appended to the topic queue.
    Queued,
    /// The queue was full; the oldest payload was dropped to make room.
    DisplacedOldest,
    /// The queue was full; the published payload was dropped.
    Rejected,
}

impl PublishOutcome {
    /// Whether the published payload is now waiting for delivery.
    pub fn is_queued(self) -> bool {
        matches!(self, PublishOutcome::Queued | PublishOutcome::DisplacedOldest)
    }
}

pub(crate) struct TopicState<P> {
    /// Distinguishes this incarnation of the topic from earlier ones with the same name.
    pub(crate) epoch: u64,
    pub(crate) subscriptions: Vec<Subscription<P>>,
    pub(crate) queue: VecDeque<P>,
    pub(crate) timer: ThrottleTimer,
}

impl<P> TopicState<P> {
    pub(crate) fn new(epoch: u64, timer: ThrottleTimer) -> Self {
        Self {
            epoch,
            subscriptions: Vec::new(),
            queue: VecDeque::new(),
            timer,
        }
    }

    /// Appends `payload`, applying `policy` when `bound` is reached.
    ///
    /// Also returns the payload the policy discarded, if any, so the caller
    /// can drop it after releasing the bus lock.
    pub(crate) fn enqueue(
        &mut self,
        payload: P,
        bound: Option<usize>,
        policy: OverflowPolicy,
    ) -> (PublishOutcome, Option<P>) {
        match bound {
            Some(max) if self.queue.len() >= max => match policy {
                OverflowPolicy::RejectNewest => (PublishOutcome::Rejected, Some(payload)),
                OverflowPolicy::DropOldest => {
                    let oldest = self.queue.pop_front();
                    self.queue.push_back(payload);
                    (PublishOutcome::DisplacedOldest, oldest)
                }
            },
            _ => {
                self.queue.push_back(payload);
                (PublishOutcome::Queued, None)
            }
        }
    }
}
