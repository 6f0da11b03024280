use super::types::{ShutdownHandle, ShutdownReason};
use crate::component::RunnableComponent;
use crate::config::CxlEmuConfig;
use crate::device::DeviceClient;
use crate::error::{CxlEmuError, Result};
use crate::irq::IrqHandler;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

const SHUTDOWN_QUEUE_CAPACITY: usize = 16;

/// Owns the emulator's components and drives them from start to shutdown
pub struct Supervisor {
    pub(super) config: CxlEmuConfig,

    // Components
    pub(super) components: Vec<Arc<dyn RunnableComponent>>,
    pub(super) device_client: Option<Arc<DeviceClient>>,
    pub(super) irq_handler: Option<Arc<IrqHandler>>,

    // Lifecycle management
    pub(super) started: bool,
    pub(super) run_tasks: Vec<(String, JoinHandle<Result<()>>)>,
    pub(super) shutdown_sender: mpsc::Sender<ShutdownReason>,
    pub(super) shutdown_receiver: Option<mpsc::Receiver<ShutdownReason>>,
}

impl Supervisor {
    /// Build the device client and interrupt handler described by `config`
    pub fn new(config: CxlEmuConfig) -> Result<Self> {
        config.validate()?;

        let device_client = Arc::new(DeviceClient::from_config(&config.device));
        let irq_handler = Arc::new(IrqHandler::new(config.irq.clone()));

        let mut supervisor = Self::empty(config);
        supervisor.add(Arc::clone(&device_client) as Arc<dyn RunnableComponent>)?;
        supervisor.add(Arc::clone(&irq_handler) as Arc<dyn RunnableComponent>)?;
        supervisor.device_client = Some(device_client);
        supervisor.irq_handler = Some(irq_handler);

        Ok(supervisor)
    }

    /// Supervisor with no components; populate it with [`add`](Self::add)
    pub fn empty(config: CxlEmuConfig) -> Self {
        let (shutdown_sender, shutdown_receiver) = mpsc::channel(SHUTDOWN_QUEUE_CAPACITY);

        Self {
            config,
            components: Vec::new(),
            device_client: None,
            irq_handler: None,
            started: false,
            run_tasks: Vec::new(),
            shutdown_sender,
            shutdown_receiver: Some(shutdown_receiver),
        }
    }

    /// Add a component. Labels must be unique and components can only be
    /// added before `start()`.
    pub fn add(&mut self, component: Arc<dyn RunnableComponent>) -> Result<()> {
        if self.started {
            return Err(CxlEmuError::system(format!(
                "Cannot add {} after the supervisor has started",
                component.label()
            )));
        }

        if self.components.iter().any(|c| c.label() == component.label()) {
            return Err(CxlEmuError::system(format!(
                "Duplicate component label: {}",
                component.label()
            )));
        }

        debug!("Supervising {}", component.label());
        self.components.push(component);
        Ok(())
    }

    pub fn config(&self) -> &CxlEmuConfig {
        &self.config
    }

    pub fn device_client(&self) -> Option<&Arc<DeviceClient>> {
        self.device_client.as_ref()
    }

    pub fn irq_handler(&self) -> Option<&Arc<IrqHandler>> {
        self.irq_handler.as_ref()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle::new(self.shutdown_sender.clone())
    }

    /// Ask a running supervisor to shut down
    pub fn request_shutdown(&self) {
        self.shutdown_handle().request(ShutdownReason::UserRequest);
    }
}
