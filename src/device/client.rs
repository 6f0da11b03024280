use super::connection::CxlConnection;
use super::engine::Type1Device;
use super::switch_client::{ComponentRole, SwitchConnectionClient};
use super::{ConnectionClient, DeviceEngine};
use crate::component::{default_stop, stop_all, Lifecycle, RunnableComponent};
use crate::config::DeviceConfig;
use crate::error::{CxlEmuError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Emulated device attached to one switch port.
///
/// Owns a connection client and a device engine bound to the client's
/// connection. Both run concurrently; the client reports Running only once
/// both children are Running, and stopping it stops both children
/// concurrently.
///
/// A child that fails does not cancel its sibling: `run()` returns the
/// failure as soon as it happens and the survivor keeps running until
/// `stop()` is called.
pub struct DeviceClient<C = SwitchConnectionClient, D = Type1Device> {
    lifecycle: Lifecycle,
    port_index: u32,
    connection_client: Arc<C>,
    device: Arc<D>,
}

impl DeviceClient {
    /// Build a Type 1 device client connecting to the switch at `host:port`
    pub fn new(port_index: u32, host: &str, port: u16, frame_capacity: usize) -> Self {
        let connection_client = SwitchConnectionClient::new(
            port_index,
            ComponentRole::LogicalDevice,
            host,
            port,
            frame_capacity,
        );

        Self::with_parts(port_index, connection_client, Type1Device::new)
    }

    pub fn from_config(config: &DeviceConfig) -> Self {
        Self::new(
            config.port_index,
            &config.host,
            config.port,
            config.frame_capacity,
        )
    }
}

impl<C, D> DeviceClient<C, D>
where
    C: ConnectionClient + 'static,
    D: DeviceEngine + 'static,
{
    /// Compose a device client from a connection client and a device engine
    /// constructed against that client's connection
    pub fn with_parts<F>(port_index: u32, connection_client: C, build_device: F) -> Self
    where
        F: FnOnce(CxlConnection, &str) -> D,
    {
        let label = format!("Port{}", port_index);
        let device = build_device(connection_client.connection(), &label);

        Self {
            lifecycle: Lifecycle::new(label),
            port_index,
            connection_client: Arc::new(connection_client),
            device: Arc::new(device),
        }
    }

    pub fn port_index(&self) -> u32 {
        self.port_index
    }

    pub fn connection_client(&self) -> &Arc<C> {
        &self.connection_client
    }

    pub fn device(&self) -> &Arc<D> {
        &self.device
    }
}

fn spawn_child<T>(child: &Arc<T>) -> JoinHandle<Result<()>>
where
    T: RunnableComponent + 'static,
{
    let child = Arc::clone(child);
    tokio::spawn(async move { child.run().await })
}

fn join_result(label: &str, joined: std::result::Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    match joined {
        Ok(result) => result,
        Err(e) => Err(CxlEmuError::component(label, format!("task failed: {}", e))),
    }
}

#[async_trait]
impl<C, D> RunnableComponent for DeviceClient<C, D>
where
    C: ConnectionClient + 'static,
    D: DeviceEngine + 'static,
{
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    async fn run_component(&self, _cancellation_token: CancellationToken) -> Result<()> {
        let mut client_task = spawn_child(&self.connection_client);
        let mut device_task = spawn_child(&self.device);
        let mut client_done = false;
        let mut device_done = false;
        let mut awaiting_ready = true;

        let readiness = async {
            tokio::try_join!(
                self.connection_client.lifecycle().wait_for_ready(),
                self.device.lifecycle().wait_for_ready()
            )
        };
        tokio::pin!(readiness);

        // Children exit when stopped; stop_component drives that.
        while !(client_done && device_done) {
            tokio::select! {
                ready = &mut readiness, if awaiting_ready => {
                    awaiting_ready = false;
                    match ready {
                        Ok(_) => {
                            self.lifecycle.mark_running();
                            info!("{} is running", self.label());
                        }
                        Err(e) => warn!("{} did not become ready: {}", self.label(), e),
                    }
                }
                joined = &mut client_task, if !client_done => {
                    client_done = true;
                    join_result(self.connection_client.label(), joined)?;
                }
                joined = &mut device_task, if !device_done => {
                    device_done = true;
                    join_result(self.device.label(), joined)?;
                }
            }
        }

        Ok(())
    }

    async fn stop_component(&self) -> Result<()> {
        stop_all(&[
            self.connection_client.as_ref() as &dyn RunnableComponent,
            self.device.as_ref() as &dyn RunnableComponent,
        ])
        .await
    }

    /// A body that failed on one child leaves the other running, so the
    /// children are stopped even when the composite itself already is.
    async fn stop(&self) -> Result<()> {
        let stopped = default_stop(self).await;
        let children = self.stop_component().await;
        stopped.and(children)
    }
}
