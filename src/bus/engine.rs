//! Bus engine
//!
//! This module contains the throttling bus responsible for:
//! - managing topics and their ordered handler registrations
//! - buffering published payloads per topic
//! - driving one throttle timer per topic that delivers at most one payload
//!   per interval to every handler of that topic
//!
//! Concurrency and usage notes:
//! - The public API is synchronous and never waits on a timer. All topic
//!   state sits behind one map lock shared with the timer tasks.
//! - Handlers run on the timer task with the lock released, so a handler may
//!   publish, subscribe or unsubscribe on the same bus.
//! - The bus is cheap to clone; every clone addresses the same topics.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::panic;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{debug, trace, warn};

use crate::config::BusSettings;
use crate::utils::error::BusError;

use super::handler::{self, Handler, Subscription, SubscriptionId};
use super::timer::{ThrottleTimer, TimerState};
use super::topic::{PublishOutcome, TopicState};

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    /// The topic was torn down (or the bus dropped); the timer must stop.
    Gone,
    /// The queue was empty; the timer is now idle.
    Idle,
    /// One payload was handed to every handler.
    Delivered,
}

pub(crate) struct Shared<P> {
    topics: Mutex<HashMap<String, TopicState<P>>>,
    settings: BusSettings,
    runtime: Handle,
    next_subscription: AtomicU64,
    next_epoch: AtomicU64,
}

/// In-process publish/subscribe bus that throttles delivery per topic.
///
/// Published payloads are queued per topic and a per-topic timer delivers
/// the oldest one to every handler of that topic once per throttle interval.
pub struct ThrottlingBus<P> {
    shared: Arc<Shared<P>>,
}

impl<P> Clone for ThrottlingBus<P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<P> fmt::Debug for ThrottlingBus<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThrottlingBus")
            .field("settings", &self.shared.settings)
            .field("topics", &self.shared.lock().len())
            .finish()
    }
}

impl<P: Send + 'static> ThrottlingBus<P> {
    /// Creates a bus whose timers run on the current tokio runtime.
    pub fn new(settings: BusSettings) -> Result<Self, BusError> {
        let runtime = Handle::try_current().map_err(|_| BusError::NoRuntime)?;
        Self::with_handle(settings, runtime)
    }

    /// Creates a bus whose timers run on `runtime`.
    ///
    /// Useful when the bus is built outside of an async context. The runtime
    /// must have its time driver enabled, otherwise `BusError::NoTimeDriver`.
    pub fn with_handle(settings: BusSettings, runtime: Handle) -> Result<Self, BusError> {
        settings.validate()?;
        if !has_time_driver(&runtime) {
            return Err(BusError::NoTimeDriver);
        }
        Ok(Self {
            shared: Arc::new(Shared {
                topics: Mutex::new(HashMap::new()),
                settings,
                runtime,
                next_subscription: AtomicU64::new(1),
                next_epoch: AtomicU64::new(1),
            }),
        })
    }

    /// Default settings with a custom interval, on the current runtime.
    ///
    /// The interval is stored in whole milliseconds, rounded up, so any
    /// non-zero interval yields a running bus.
    pub fn with_interval(interval: Duration) -> Result<Self, BusError> {
        let settings = BusSettings {
            throttle_interval_ms: interval_to_millis(interval),
            ..BusSettings::default()
        };
        Self::new(settings)
    }

    /// Registers `handler` on `topic`.
    ///
    /// The first subscription of a topic creates its queue and arms its
    /// timer to tick one interval from now. Registering the same handler
    /// twice yields two independent subscriptions.
    pub fn subscribe(&self, topic: &str, handler: Handler<P>) -> SubscriptionId {
        let id = SubscriptionId::from_raw(self.shared.next_subscription.fetch_add(1, Ordering::Relaxed));

        let mut topics = self.shared.lock();
        let state = match topics.entry(topic.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let epoch = self.shared.next_epoch.fetch_add(1, Ordering::Relaxed);
                let timer = ThrottleTimer::spawn(
                    &self.shared.runtime,
                    Arc::downgrade(&self.shared),
                    topic.to_string(),
                    epoch,
                    self.shared.settings.throttle_interval(),
                );
                debug!(topic, epoch, "topic created, timer armed");
                entry.insert(TopicState::new(epoch, timer))
            }
        };

        state.subscriptions.push(Subscription { id, handler });
        debug!(topic, subscription = %id, subscribers = state.subscriptions.len(), "subscribed");
        id
    }

    /// Removes the registration `id` from `topic`.
    ///
    /// Removing the last registration tears the topic down: its timer stops
    /// and any queued payloads are dropped. Returns `false` if nothing matched.
    pub fn unsubscribe(&self, topic: &str, id: SubscriptionId) -> bool {
        self.remove_first(topic, |sub| sub.id == id)
    }

    /// Removes the first registration of `handler` (by `Arc` identity) from `topic`.
    ///
    /// Same teardown rules as [`ThrottlingBus::unsubscribe`].
    pub fn unsubscribe_handler(&self, topic: &str, handler: &Handler<P>) -> bool {
        self.remove_first(topic, |sub| Arc::ptr_eq(&sub.handler, handler))
    }

    /// Queues `payload` for delivery on `topic`.
    ///
    /// Payloads for topics without subscribers are dropped. If the timer went
    /// idle and `rearm_on_publish` is set, the timer is armed again and ticks
    /// one interval from now.
    pub fn publish(&self, topic: &str, payload: P) -> PublishOutcome {
        let settings = &self.shared.settings;

        let (outcome, _discarded) = {
            let mut topics = self.shared.lock();

            let Some(state) = topics.get_mut(topic) else {
                trace!(topic, "no subscribers, payload dropped");
                return PublishOutcome::NoSubscribers;
            };

            let (outcome, discarded) =
                state.enqueue(payload, settings.max_queue_len, settings.overflow_policy);
            match outcome {
                PublishOutcome::Rejected => {
                    warn!(topic, pending = state.queue.len(), "queue full, payload rejected");
                }
                PublishOutcome::DisplacedOldest => {
                    warn!(topic, pending = state.queue.len(), "queue full, oldest payload dropped");
                }
                _ => trace!(topic, pending = state.queue.len(), "payload queued"),
            }

            if settings.rearm_on_publish && outcome.is_queued() && state.timer.rearm() {
                debug!(topic, "idle timer re-armed by publish");
            }

            (outcome, discarded)
        };

        // a rejected or displaced payload is dropped here, outside the lock
        outcome
    }

    /// Tears down every topic. Queued payloads are dropped and all timers stop.
    pub fn shutdown(&self) {
        let topics = std::mem::take(&mut *self.shared.lock());
        debug!(topics = topics.len(), "bus shut down");
        // dropped here, outside the lock
        drop(topics);
    }

    /// Names of all live topics, sorted.
    pub fn topics(&self) -> Vec<String> {
        let mut names: Vec<String> = self.shared.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.shared
            .lock()
            .get(topic)
            .map_or(0, |state| state.subscriptions.len())
    }

    /// Number of payloads waiting for delivery on `topic`.
    pub fn pending_len(&self, topic: &str) -> usize {
        self.shared
            .lock()
            .get(topic)
            .map_or(0, |state| state.queue.len())
    }

    /// Timer state of `topic`, or `None` if the topic does not exist.
    pub fn timer_state(&self, topic: &str) -> Option<TimerState> {
        self.shared.lock().get(topic).map(|state| state.timer.state())
    }

    pub fn interval(&self) -> Duration {
        self.shared.settings.throttle_interval()
    }

    pub fn settings(&self) -> &BusSettings {
        &self.shared.settings
    }

    fn remove_first<F>(&self, topic: &str, matches: F) -> bool
    where
        F: Fn(&Subscription<P>) -> bool,
    {
        // both are dropped after the lock is released: a handler or payload
        // Drop may call back into the bus
        let (removed, torn_down) = {
            let mut topics = self.shared.lock();
            let Some(state) = topics.get_mut(topic) else {
                return false;
            };
            let Some(pos) = state.subscriptions.iter().position(|sub| matches(sub)) else {
                return false;
            };

            let removed = state.subscriptions.remove(pos);
            if state.subscriptions.is_empty() {
                (removed, topics.remove(topic))
            } else {
                (removed, None)
            }
        };

        debug!(topic, subscription = %removed.id, "unsubscribed");
        // dropping the state aborts its timer
        if let Some(state) = torn_down {
            debug!(topic, dropped = state.queue.len(), "last subscriber left, topic torn down");
        }
        true
    }
}

/// Whether `runtime` can drive `tokio::time` sleeps.
///
/// Creating a sleep on a runtime built without `enable_time()` panics, and
/// the panic would otherwise surface later inside a topic's timer task.
fn has_time_driver(runtime: &Handle) -> bool {
    let _guard = runtime.enter();
    panic::catch_unwind(|| drop(tokio::time::sleep(Duration::ZERO))).is_ok()
}

pub(crate) fn interval_to_millis(interval: Duration) -> u64 {
    u64::try_from(interval.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
}

impl<P> Shared<P> {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, TopicState<P>>> {
        // handlers never run under this lock, so poisoning leaves the map consistent
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// One firing of `topic`'s timer.
    ///
    /// Takes the oldest payload under the lock, then hands it to a snapshot
    /// of the handler list with the lock released.
    pub(crate) fn tick(&self, topic: &str, epoch: u64) -> TickOutcome {
        let (payload, subscriptions) = {
            let mut topics = self.lock();
            let Some(state) = topics.get_mut(topic).filter(|state| state.epoch == epoch) else {
                trace!(topic, epoch, "tick for a topic that is gone");
                return TickOutcome::Gone;
            };

            match state.queue.pop_front() {
                Some(payload) => (payload, state.subscriptions.clone()),
                None => {
                    state.timer.go_idle();
                    debug!(topic, "queue drained, timer idle");
                    return TickOutcome::Idle;
                }
            }
        };

        trace!(topic, handlers = subscriptions.len(), "delivering payload");
        for err in handler::deliver(topic, &payload, &subscriptions) {
            warn!(label = err.as_label(), "{err}");
        }

        TickOutcome::Delivered
    }
}
