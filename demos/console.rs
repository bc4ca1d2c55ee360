//! Minimal interactive console.
//!
//! ```text
//! RCON_HOST=127.0.0.1 RCON_PORT=27020 RCON_PASSWORD=secret cargo run --example console
//! ```
//!
//! Every line read from stdin is sent to the server; `quit` exits.

use rcon_supervisor::utils::logging::init_logging;
use rcon_supervisor::{CommandOutcome, ConnectionSupervisor, Endpoint, Outcome, RconConfig};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

const SERVER_ID: &str = "console";

#[tokio::main]
async fn main() -> rcon_supervisor::Result<()> {
    let config = RconConfig::from_env()?;
    config.validate_strict()?;
    init_logging(&config.logging)?;

    let host = std::env::var("RCON_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = std::env::var("RCON_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(27020);
    let password = std::env::var("RCON_PASSWORD").unwrap_or_default();

    let supervisor = ConnectionSupervisor::new(config);
    let mut status = supervisor.subscribe();
    tokio::spawn(async move {
        while let Ok(statuses) = status.recv().await {
            for s in statuses {
                info!(server = %s.id, connected = s.connected, "Status changed");
            }
        }
    });

    let result = supervisor
        .connect(SERVER_ID, Endpoint::new(host, port), &password)
        .await;
    let outcome = Outcome::connected(&result);
    if !outcome.success {
        error!(message = %outcome.message, "Could not connect");
        return result;
    }
    println!("{}", outcome.message);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" {
            break;
        }

        let outcome = CommandOutcome::from(supervisor.send_command(SERVER_ID, line).await);
        match (outcome.response, outcome.message) {
            (Some(response), _) => println!("{response}"),
            (None, Some(message)) => eprintln!("error: {message}"),
            (None, None) => {}
        }
    }

    let was_connected = supervisor.disconnect(SERVER_ID).await;
    println!("{}", Outcome::disconnected(was_connected).message);
    supervisor.shutdown().await;
    Ok(())
}
