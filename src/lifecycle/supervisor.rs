//! Integration with a parent supervisor process.
//!
//! The desktop shell that launches the host learns it is ready through a
//! [`ReadinessNotifier`] and can stop it by closing our stdin.

use tokio::io::AsyncReadExt;
use tokio::task::JoinHandle;

use crate::error::EXIT_OK;
use crate::lifecycle::shutdown::ShutdownTrigger;
use crate::net::Endpoint;

/// Told once the service is accepting requests.
pub trait ReadinessNotifier: Send + Sync {
    fn notify_ready(&self, endpoint: &Endpoint);
}

/// Logs readiness. The default.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl ReadinessNotifier for LogNotifier {
    fn notify_ready(&self, endpoint: &Endpoint) {
        tracing::info!(address = %endpoint, "Companion host ready");
    }
}

/// Prints `READY <host>:<port>` on stdout for a parent process to read.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutNotifier;

impl ReadinessNotifier for StdoutNotifier {
    fn notify_ready(&self, endpoint: &Endpoint) {
        use std::io::Write;

        let mut stdout = std::io::stdout().lock();
        if let Err(error) = writeln!(stdout, "READY {endpoint}").and_then(|()| stdout.flush()) {
            tracing::warn!(error = %error, "Failed to write readiness line");
        }
        LogNotifier.notify_ready(endpoint);
    }
}

/// Request shutdown when stdin reaches end-of-file.
pub fn spawn_stdin_watcher(trigger: ShutdownTrigger) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stdin = tokio::io::stdin();
        let mut buf = [0u8; 256];
        loop {
            match stdin.read(&mut buf).await {
                Ok(0) => {
                    tracing::info!("Stdin closed by parent process");
                    break;
                }
                Ok(_) => continue,
                Err(error) => {
                    tracing::warn!(error = %error, "Stdin read failed, treating as closed");
                    break;
                }
            }
        }
        trigger.trigger(EXIT_OK);
    })
}
