use super::{ShutdownReason, Supervisor};
use crate::error::{CxlEmuError, Result};
use futures::future::try_join_all;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{error, info};

impl Supervisor {
    /// Start every component and wait until all of them report Running
    pub async fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(CxlEmuError::system("Supervisor already started"));
        }
        self.started = true;

        info!("Starting {} component(s)", self.components.len());

        for component in &self.components {
            let component = Arc::clone(component);
            let label = component.label().to_string();
            let shutdown = self.shutdown_handle();

            let handle = tokio::spawn(async move {
                let result = component.run().await;
                let reason = match &result {
                    Ok(()) => ShutdownReason::ComponentExited(component.label().to_string()),
                    Err(e) => ShutdownReason::Error(format!("{}: {}", component.label(), e)),
                };
                shutdown.request(reason);
                result
            });

            self.run_tasks.push((label, handle));
        }

        let startup_timeout = self.config.system.startup_timeout();
        let readiness = try_join_all(
            self.components
                .iter()
                .map(|component| component.lifecycle().wait_for_ready()),
        );

        match timeout(startup_timeout, readiness).await {
            Ok(Ok(_)) => {
                info!("All components running");
                Ok(())
            }
            Ok(Err(e)) => {
                error!("Component failed during startup: {}", e);
                Err(e)
            }
            Err(_) => {
                let pending: Vec<&str> = self
                    .components
                    .iter()
                    .filter(|c| !c.lifecycle().is_running())
                    .map(|c| c.label())
                    .collect();
                error!("Startup timeout waiting for: {}", pending.join(", "));
                Err(CxlEmuError::system(format!(
                    "Components not running within {}ms: {}",
                    startup_timeout.as_millis(),
                    pending.join(", ")
                )))
            }
        }
    }
}
