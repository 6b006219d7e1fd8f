//! # ThrottleBus
//!
//! `throttlebus` is a minimal in-process publish/subscribe bus that throttles
//! delivery per topic. Published payloads are buffered in a per-topic queue
//! and a per-topic timer delivers at most one payload per interval to every
//! subscriber of that topic.
//!
//! ## Core Modules
//!
//! - `bus`: The `ThrottlingBus`, its handlers, topic queues and timers.
//! - `config`: Handles loading and validating settings (interval, queue bound).
//! - `utils`: Shared error types and logging setup.
//!
//! ## Example
//!
//! ```no_run
//! use throttlebus::bus::{ThrottlingBus, handler};
//! use throttlebus::config::BusSettings;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let bus = ThrottlingBus::<String>::new(BusSettings::default())?;
//! bus.subscribe("message", handler(|msg: &String| {
//!     println!("Message received: {msg}");
//!     Ok(())
//! }));
//! bus.publish("message", "Hello".to_string());
//! # Ok(())
//! # }
//! ```

pub mod bus;
pub mod config;
pub mod utils;
