//! Per-topic throttle timer
//!
//! Every topic owns one tokio task that sleeps until its deadline, then asks
//! the bus to tick the topic. After a tick that delivered a payload the next
//! deadline is one interval later. After a tick that found the queue empty
//! the task parks on a `Notify` (the timer is idle) until something re-arms
//! it, and the next deadline is one interval after the re-arm.
//!
//! Dropping a [`ThrottleTimer`] aborts its task, so removing a topic from the
//! bus map is enough to stop its timer. A tick that is already running when
//! that happens finds the topic gone (or replaced by a newer epoch) and exits.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use super::engine::{Shared, TickOutcome};

/// State of a topic's timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// Counting down toward the next tick.
    Armed,
    /// Stopped; the last tick found nothing to deliver.
    Idle,
}

pub(crate) struct ThrottleTimer {
    state: TimerState,
    rearm: Arc<Notify>,
    task: JoinHandle<()>,
}

impl ThrottleTimer {
    /// Spawns an armed timer whose first tick happens one interval from now.
    pub(crate) fn spawn<P: Send + 'static>(
        runtime: &Handle,
        shared: Weak<Shared<P>>,
        topic: String,
        epoch: u64,
        interval: Duration,
    ) -> Self {
        let rearm = Arc::new(Notify::new());
        let first_tick = Instant::now() + interval;
        let task = runtime.spawn(run(shared, topic, epoch, interval, Arc::clone(&rearm), first_tick));

        Self {
            state: TimerState::Armed,
            rearm,
            task,
        }
    }

    pub(crate) fn state(&self) -> TimerState {
        self.state
    }

    /// Marks the timer idle. Only the timer task itself calls this, right
    /// before it parks.
    pub(crate) fn go_idle(&mut self) {
        self.state = TimerState::Idle;
    }

    /// Arms an idle timer. Returns `false` if it was already armed.
    pub(crate) fn rearm(&mut self) -> bool {
        if self.state == TimerState::Armed {
            return false;
        }
        self.state = TimerState::Armed;
        // stores a permit if the task has not parked yet
        self.rearm.notify_one();
        true
    }
}

impl Drop for ThrottleTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run<P: Send + 'static>(
    shared: Weak<Shared<P>>,
    topic: String,
    epoch: u64,
    interval: Duration,
    rearm: Arc<Notify>,
    first_tick: Instant,
) {
    let mut deadline = first_tick;

    loop {
        time::sleep_until(deadline).await;

        // never hold the bus alive across an await
        let outcome = match shared.upgrade() {
            Some(shared) => shared.tick(&topic, epoch),
            None => TickOutcome::Gone,
        };

        match outcome {
            TickOutcome::Gone => return,
            TickOutcome::Delivered => {}
            TickOutcome::Idle => rearm.notified().await,
        }

        deadline = Instant::now() + interval;
    }
}
