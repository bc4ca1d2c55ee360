//! Serializable results handed to the administration layer.
//!
//! These mirror the `{success, message}` shapes its HTTP handlers return, so the
//! handlers only forward them.

use serde::Serialize;

use crate::error::{constants, ProtocolError, Result};

/// `{success, message}` result of connect and disconnect
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub success: bool,
    pub message: String,
}

impl Outcome {
    pub fn connected(result: &Result<()>) -> Self {
        match result {
            Ok(()) => Self {
                success: true,
                message: constants::MSG_CONNECTED.to_string(),
            },
            Err(e) => Self {
                success: false,
                message: e.to_string(),
            },
        }
    }

    pub fn disconnected(was_connected: bool) -> Self {
        let message = if was_connected {
            constants::MSG_DISCONNECTED
        } else {
            constants::MSG_ALREADY_DISCONNECTED
        };
        Self {
            success: true,
            message: message.to_string(),
        }
    }
}

/// `{success, response | message}` result of a single command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<Result<String>> for CommandOutcome {
    fn from(result: Result<String>) -> Self {
        match result {
            Ok(response) if response.is_empty() => Self {
                success: true,
                response: Some(constants::MSG_COMMAND_EXECUTED.to_string()),
                message: None,
            },
            Ok(response) => Self {
                success: true,
                response: Some(response),
                message: None,
            },
            Err(e) => Self {
                success: false,
                response: None,
                message: Some(failure_message(&e)),
            },
        }
    }
}

/// Unusable-socket failures all read as a lost connection to the operator
fn failure_message(err: &ProtocolError) -> String {
    if err.is_connection_fatal() {
        constants::ERR_CONNECTION_LOST.to_string()
    } else {
        err.to_string()
    }
}

/// Per-server line of a broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCommandResult {
    pub server_id: String,
    pub server_name: String,
    #[serde(flatten)]
    pub outcome: CommandOutcome,
}

/// Aggregate result of sending one command to every known server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    pub success: bool,
    pub message: String,
    pub results: Vec<ServerCommandResult>,
    pub succeeded: usize,
}

impl BroadcastReport {
    /// Report for a broadcast that found no connected server to send to
    pub fn nothing_connected() -> Self {
        Self {
            success: false,
            message: constants::MSG_NO_SERVERS.to_string(),
            results: Vec::new(),
            succeeded: 0,
        }
    }

    pub fn from_results(results: Vec<ServerCommandResult>) -> Self {
        if results.is_empty() {
            return Self::nothing_connected();
        }

        let succeeded = results.iter().filter(|r| r.outcome.success).count();
        Self {
            success: true,
            message: format!("Command sent to {succeeded}/{} servers", results.len()),
            results,
            succeeded,
        }
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded
    }
}
