pub mod app;
pub mod component;
pub mod config;
pub mod device;
pub mod error;
pub mod irq;

pub use app::{ShutdownHandle, ShutdownReason, Supervisor};
pub use component::{default_stop, stop_all, ComponentStatus, Lifecycle, RunnableComponent, StatusTransition};
pub use config::CxlEmuConfig;
pub use device::{
    ComponentRole, ConnectionClient, CxlConnection, DeviceClient, DeviceEngine,
    SwitchConnectionClient, Type1Device,
};
pub use error::{CxlEmuError, Result};
pub use irq::{Irq, IrqCallback, IrqEvent, IrqHandler, IrqStats};
