//! The `utils` module provides the pieces shared by the bus, the config loader
//! and the demo binary: error types and logging setup.

pub mod error;
pub mod logging;
