use super::Supervisor;
use crate::error::Result;
use futures::future::join_all;
use tokio::time::timeout;
use tracing::{error, info, warn};

impl Supervisor {
    /// Stop all components concurrently and wait for every one of them.
    ///
    /// Each stop is bounded by the configured stop timeout. The exit code is 1
    /// when a component failed to stop in time, failed while stopping, or had
    /// exited with an error.
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");

        let stop_timeout = self.config.system.stop_timeout();
        let mut exit_code = 0;

        let stops = self.components.iter().map(|component| async move {
            (
                component.label(),
                timeout(stop_timeout, component.stop()).await,
            )
        });

        for (label, result) in join_all(stops).await {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!("Error stopping {}: {}", label, e);
                    exit_code = 1;
                }
                Err(_) => {
                    error!("{} stop timeout", label);
                    exit_code = 1;
                }
            }
        }

        for (label, mut handle) in self.run_tasks.drain(..) {
            match timeout(stop_timeout, &mut handle).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => {
                    error!("{} exited with error: {}", label, e);
                    exit_code = 1;
                }
                Ok(Err(e)) => {
                    error!("{} task failed: {}", label, e);
                    exit_code = 1;
                }
                Err(_) => {
                    warn!("{} did not exit, aborting its task", label);
                    handle.abort();
                    exit_code = 1;
                }
            }
        }

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }
}
