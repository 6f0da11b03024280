//! Device-side composition: a switch connection client and a device engine
//! sharing one CXL connection under one lifecycle.

mod client;
mod connection;
mod engine;
mod switch_client;


use crate::component::RunnableComponent;

pub use client::DeviceClient;
pub use connection::CxlConnection;
pub use engine::Type1Device;
pub use switch_client::{ComponentRole, SwitchConnectionClient};

/// Provider of the transport connection to the switch
pub trait ConnectionClient: RunnableComponent {
    /// Handle to the connection this client maintains
    fn connection(&self) -> CxlConnection;
}

/// Device emulation running against a transport connection
pub trait DeviceEngine: RunnableComponent {}
