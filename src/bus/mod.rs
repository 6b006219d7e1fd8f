pub mod engine;
pub mod handler;
pub mod timer;
pub mod topic;

pub use engine::ThrottlingBus;
pub use handler::{Handler, HandlerResult, SubscriptionId, handler};
pub use timer::TimerState;
pub use topic::PublishOutcome;
