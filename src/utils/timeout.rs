//! Timeout constants and async deadline helpers.

use std::future::Future;
use std::time::Duration;

use crate::error::{ProtocolError, Result};

/// TCP connect deadline
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Socket inactivity window
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Authentication response deadline
pub const AUTH_TIMEOUT: Duration = Duration::from_secs(15);

/// Per-command response deadline
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(15);

/// Keep-alive cadence once authenticated
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(20);

/// Supervisor liveness sweep cadence
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Run a future with a deadline, mapping expiry to the supplied error
pub async fn with_timeout_error<F, T>(
    fut: F,
    duration: Duration,
    on_timeout: ProtocolError,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout),
    }
}
