use super::dispatch::{run_dispatch, Registrations};
use super::stats::IrqStats;
use super::types::{Irq, IrqEvent, IRQ_WIDTH};
use crate::component::{ComponentStatus, Lifecycle, RunnableComponent};
use crate::config::IrqConfig;
use crate::error::{CxlEmuError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument, Span};

/// Callback invoked once per received interrupt
pub type IrqCallback = Arc<dyn Fn() + Send + Sync>;

/// Interrupt listener and sender for one emulated device.
///
/// Handlers are registered before `run()`; once the listener is serving the
/// registration set is frozen and further `register` calls are rejected.
/// Every received interrupt is queued and delivered to its callback exactly
/// once, so repeated interrupts of the same kind are never coalesced.
pub struct IrqHandler {
    lifecycle: Lifecycle,
    config: IrqConfig,
    registrations: Mutex<Option<HashMap<Irq, IrqCallback>>>,
    local_addr: Mutex<Option<SocketAddr>>,
    stats: Arc<Mutex<IrqStats>>,
}

impl IrqHandler {
    pub fn new(config: IrqConfig) -> Self {
        let label = format!("{}:IrqHandler", config.device_name);

        Self {
            lifecycle: Lifecycle::new(label),
            config,
            registrations: Mutex::new(Some(HashMap::new())),
            local_addr: Mutex::new(None),
            stats: Arc::new(Mutex::new(IrqStats::default())),
        }
    }

    /// Register a callback for an interrupt. Replaces any earlier registration
    /// for the same interrupt.
    pub fn register<F>(&self, irq: Irq, callback: F) -> Result<()>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut registrations = self.registrations.lock();

        match registrations.as_mut() {
            Some(map) if self.lifecycle.status() == ComponentStatus::NotRunning => {
                if map.insert(irq, Arc::new(callback)).is_some() {
                    debug!("Replaced handler for {}", irq);
                } else {
                    debug!("Registered handler for {}", irq);
                }
                Ok(())
            }
            _ => Err(CxlEmuError::RegistrationClosed { irq }),
        }
    }

    /// Address the listener is bound to, once it is serving
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    pub fn stats(&self) -> IrqStats {
        self.stats.lock().clone()
    }

    pub fn config(&self) -> &IrqConfig {
        &self.config
    }

    /// Send an interrupt to the first configured peer
    pub async fn send(&self, irq: Irq) -> Result<()> {
        self.send_to(irq, 0).await
    }

    /// Send an interrupt to the peer at `target` in the configured port list
    pub async fn send_to(&self, irq: Irq, target: usize) -> Result<()> {
        let port = self
            .config
            .target_ports
            .get(target)
            .copied()
            .ok_or(CxlEmuError::UnknownTarget { index: target })?;
        let address = format!("{}:{}", self.config.target_addr, port);

        send_irq(&address, irq, self.config.send_timeout()).await
    }
}

/// Open a connection, write one interrupt, flush and close.
///
/// No acknowledgment is expected and failures are not retried.
async fn send_irq(address: &str, irq: Irq, limit: Duration) -> Result<()> {
    let delivery = async {
        let mut stream = TcpStream::connect(address).await?;
        stream.write_all(&[irq.as_byte()]).await?;
        stream.flush().await?;
        stream.shutdown().await?;
        Ok::<(), std::io::Error>(())
    };

    match timeout(limit, delivery).await {
        Ok(Ok(())) => {
            debug!("Sent {} to {}", irq, address);
            Ok(())
        }
        Ok(Err(source)) => Err(CxlEmuError::Send {
            address: address.to_string(),
            source,
        }),
        Err(_) => Err(CxlEmuError::SendTimeout {
            address: address.to_string(),
        }),
    }
}

/// Read a single interrupt from an accepted connection and queue it
async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    registrations: Registrations,
    queue: mpsc::Sender<IrqEvent>,
    stats: Arc<Mutex<IrqStats>>,
) -> Result<()> {
    let mut message = [0u8; IRQ_WIDTH];
    let read = stream.read(&mut message).await?;

    if read == 0 {
        stats.lock().record_empty_connection();
        debug!("Irq enable connection broken ({})", peer);
        return Ok(());
    }

    let irq = match Irq::try_from(message[0]) {
        Ok(irq) if registrations.contains_key(&irq) => irq,
        _ => {
            stats.lock().record_invalid();
            return Err(CxlEmuError::InvalidInterrupt { value: message[0] });
        }
    };

    stats.lock().record_received(irq);
    debug!("Received {} from {}", irq, peer);

    queue
        .send(IrqEvent::new(irq))
        .await
        .map_err(|_| CxlEmuError::system("Irq dispatch queue closed"))
}

#[async_trait]
impl RunnableComponent for IrqHandler {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    async fn run_component(&self, cancellation_token: CancellationToken) -> Result<()> {
        let registrations: Registrations =
            Arc::new(self.registrations.lock().take().unwrap_or_default());

        let address = self.config.bind_address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| CxlEmuError::Bind {
                address: address.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        *self.local_addr.lock() = Some(local_addr);

        let (queue, receiver) = mpsc::channel(self.config.dispatch_capacity.max(1));
        let dispatcher = tokio::spawn(
            run_dispatch(receiver, Arc::clone(&registrations), Arc::clone(&self.stats))
                .instrument(Span::current()),
        );

        info!(
            "Irq listener serving on {} ({} handler(s) registered)",
            local_addr,
            registrations.len()
        );
        self.lifecycle.mark_running();

        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => {
                    info!("Irq enable listener stopped");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        self.stats.lock().record_connection();
                        connections.spawn(
                            handle_connection(
                                stream,
                                peer,
                                Arc::clone(&registrations),
                                queue.clone(),
                                Arc::clone(&self.stats),
                            )
                            .instrument(Span::current()),
                        );
                    }
                    Err(e) => warn!("Failed to accept interrupt connection: {}", e),
                },
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    match joined {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => warn!("Dropped interrupt connection: {}", e),
                        Err(e) => error!("Interrupt connection task failed: {}", e),
                    }
                }
            }
        }

        // Unbind before draining so no new peers are accepted
        drop(listener);
        *self.local_addr.lock() = None;

        connections.shutdown().await;
        drop(queue);
        if let Err(e) = dispatcher.await {
            error!("Irq dispatch task failed: {}", e);
        }

        Ok(())
    }
}
