//! Handlers and their delivery
//!
//! A handler is a shared callback (`Arc<dyn Fn>`) invoked once per delivered
//! payload. Each registration gets its own [`SubscriptionId`], which is the
//! token callers hand back to `unsubscribe`.
//!
//! Delivery isolates handlers from each other: an `Err` return or a panic in
//! one handler is turned into a [`DeliveryError`] and the remaining handlers
//! still run.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::utils::error::{BoxError, DeliveryError};

/// What a handler returns. Errors are logged by the bus, never propagated.
pub type HandlerResult = Result<(), BoxError>;

/// A subscriber callback for payloads of type `P`.
pub type Handler<P> = Arc<dyn Fn(&P) -> HandlerResult + Send + Sync>;

/// Wraps a closure into a [`Handler`].
pub fn handler<P, F>(f: F) -> Handler<P>
where
    F: Fn(&P) -> HandlerResult + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Opaque identity of one handler registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

pub(crate) struct Subscription<P> {
    pub(crate) id: SubscriptionId,
    pub(crate) handler: Handler<P>,
}

// derive would demand `P: Clone`
impl<P> Clone for Subscription<P> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            handler: Arc::clone(&self.handler),
        }
    }
}

/// Invokes every subscription in order with `payload`.
///
/// Returns the failures; an empty vec means every handler succeeded.
pub(crate) fn deliver<P>(
    topic: &str,
    payload: &P,
    subscriptions: &[Subscription<P>],
) -> Vec<DeliveryError> {
    let mut failures = Vec::new();

    for sub in subscriptions {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (sub.handler)(payload)));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(source)) => failures.push(DeliveryError::Failed {
                topic: topic.to_string(),
                subscription: sub.id,
                source,
            }),
            Err(panic) => failures.push(DeliveryError::Panicked {
                topic: topic.to_string(),
                subscription: sub.id,
                message: panic_message(panic.as_ref()),
            }),
        }
    }

    failures
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
