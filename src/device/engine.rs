use super::connection::CxlConnection;
use super::DeviceEngine;
use crate::component::{Lifecycle, RunnableComponent};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Type 1 accelerator stand-in.
///
/// Consumes every frame the switch delivers over the shared connection and
/// keeps a count; the CXL.io/CXL.cache handling itself lives elsewhere.
pub struct Type1Device {
    lifecycle: Lifecycle,
    connection: CxlConnection,
    frames_received: AtomicU64,
    bytes_received: AtomicU64,
}

impl Type1Device {
    pub fn new(connection: CxlConnection, label: &str) -> Self {
        Self {
            lifecycle: Lifecycle::new(format!("{}:Type1Device", label)),
            connection,
            frames_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
        }
    }

    pub fn connection(&self) -> &CxlConnection {
        &self.connection
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }
}

impl DeviceEngine for Type1Device {}

#[async_trait]
impl RunnableComponent for Type1Device {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    async fn run_component(&self, cancellation_token: CancellationToken) -> Result<()> {
        self.lifecycle.mark_running();
        info!("{} ready", self.label());

        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => break,
                Some(frame) = self.connection.recv_from_switch() => {
                    self.frames_received.fetch_add(1, Ordering::Relaxed);
                    self.bytes_received
                        .fetch_add(frame.len() as u64, Ordering::Relaxed);
                    debug!("{} received {} byte frame", self.label(), frame.len());
                }
            }
        }

        Ok(())
    }
}
