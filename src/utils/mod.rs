//! # Utility Modules
//!
//! Supporting utilities for logging, metrics, and timing.
//!
//! ## Components
//! - **Logging**: Structured logging configuration
//! - **Metrics**: Thread-safe observability counters
//! - **Timeout**: Protocol deadlines and async timeout wrappers

pub mod logging;
pub mod metrics;
pub mod timeout;
