use super::{ShutdownHandle, ShutdownReason, Supervisor};
use crate::error::{CxlEmuError, Result};
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};

impl Supervisor {
    /// Wait for a shutdown trigger, then shut every component down.
    ///
    /// Returns the process exit code.
    pub async fn run(&mut self) -> Result<i32> {
        info!("CXL emulator is running");

        let mut shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| CxlEmuError::system("Shutdown receiver already taken"))?;

        let signal_tasks = setup_signal_handlers(self.shutdown_handle());

        let shutdown_reason = shutdown_receiver
            .recv()
            .await
            .ok_or_else(|| CxlEmuError::system("Shutdown channel closed unexpectedly"))?;

        for task in signal_tasks {
            task.abort();
        }

        info!("Shutdown initiated: {:?}", shutdown_reason);

        let mut exit_code = self.shutdown().await?;
        if matches!(shutdown_reason, ShutdownReason::Error(_)) {
            exit_code = 1;
        }

        info!("CXL emulator shutdown complete");
        Ok(exit_code)
    }
}

/// Spawn SIGINT/SIGTERM listeners that request a shutdown
fn setup_signal_handlers(shutdown: ShutdownHandle) -> Vec<JoinHandle<()>> {
    let mut tasks = Vec::new();

    // Handle SIGTERM - Unix only
    #[cfg(unix)]
    {
        let shutdown_sigterm = shutdown.clone();
        tasks.push(tokio::spawn(async move {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    if let Some(()) = sigterm.recv().await {
                        info!("Received SIGTERM signal");
                        shutdown_sigterm.request(ShutdownReason::Signal("SIGTERM".to_string()));
                    }
                }
                Err(e) => warn!("Failed to register SIGTERM handler: {}", e),
            }
        }));
    }

    // Handle SIGINT (Ctrl+C)
    tasks.push(tokio::spawn(async move {
        if let Ok(()) = signal::ctrl_c().await {
            info!("Received SIGINT signal (Ctrl+C)");
            shutdown.request(ShutdownReason::Signal("SIGINT".to_string()));
        }
    }));

    tasks
}
