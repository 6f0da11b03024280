use super::connection::CxlConnection;
use super::ConnectionClient;
use crate::component::{Lifecycle, RunnableComponent};
use crate::error::{CxlEmuError, Result};
use async_trait::async_trait;
use bytes::BytesMut;
use std::fmt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const READ_BUFFER_SIZE: usize = 4096;

/// Role the client announces itself as on the switch port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentRole {
    /// Logical device behind a downstream port
    LogicalDevice,
    /// Host root port
    RootPort,
}

impl fmt::Display for ComponentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentRole::LogicalDevice => f.write_str("LD"),
            ComponentRole::RootPort => f.write_str("RP"),
        }
    }
}

/// TCP client holding the connection between one switch port and its device.
///
/// Bytes are relayed unchanged in both directions between the switch socket
/// and the [`CxlConnection`] queues.
pub struct SwitchConnectionClient {
    lifecycle: Lifecycle,
    port_index: u32,
    role: ComponentRole,
    host: String,
    port: u16,
    connection: CxlConnection,
}

impl SwitchConnectionClient {
    pub fn new(
        port_index: u32,
        role: ComponentRole,
        host: impl Into<String>,
        port: u16,
        frame_capacity: usize,
    ) -> Self {
        Self {
            lifecycle: Lifecycle::new(format!("Port{}:SwitchConnectionClient", port_index)),
            port_index,
            role,
            host: host.into(),
            port,
            connection: CxlConnection::new(frame_capacity),
        }
    }

    pub fn port_index(&self) -> u32 {
        self.port_index
    }

    pub fn role(&self) -> ComponentRole {
        self.role
    }

    fn switch_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl ConnectionClient for SwitchConnectionClient {
    fn connection(&self) -> CxlConnection {
        self.connection.clone()
    }
}

#[async_trait]
impl RunnableComponent for SwitchConnectionClient {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    async fn run_component(&self, cancellation_token: CancellationToken) -> Result<()> {
        let address = self.switch_address();

        let stream = tokio::select! {
            _ = cancellation_token.cancelled() => return Ok(()),
            connected = TcpStream::connect(&address) => connected.map_err(|e| {
                CxlEmuError::component(
                    self.label(),
                    format!("failed to connect to switch at {}: {}", address, e),
                )
            })?,
        };

        info!(
            "Connected to switch at {} as {} on port {}",
            address, self.role, self.port_index
        );
        self.lifecycle.mark_running();

        let (mut reader, mut writer) = stream.into_split();
        let mut buffer = BytesMut::with_capacity(READ_BUFFER_SIZE);

        let outcome = loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => break Ok(()),
                Some(frame) = self.connection.recv_from_device() => {
                    debug!("Forwarding {} byte(s) to switch", frame.len());
                    writer.write_all(&frame).await?;
                }
                read = reader.read_buf(&mut buffer) => match read? {
                    0 => {
                        warn!("Switch at {} closed the connection", address);
                        break Err(CxlEmuError::component(
                            self.label(),
                            "switch closed the connection",
                        ));
                    }
                    count => {
                        debug!("Received {} byte(s) from switch", count);
                        self.connection.send_to_device(buffer.split().freeze()).await?;
                    }
                },
            }
        };

        if let Err(e) = writer.shutdown().await {
            debug!("Switch socket shutdown: {}", e);
        }
        outcome
    }
}
