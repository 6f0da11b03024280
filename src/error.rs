use crate::irq::Irq;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CxlEmuError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Failed to bind listener on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to send interrupt to {address}: {source}")]
    Send {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out sending interrupt to {address}")]
    SendTimeout { address: String },

    #[error("Invalid IRQ: 0x{value:02x}")]
    InvalidInterrupt { value: u8 },

    #[error("Cannot register {irq} handler once the listener is serving")]
    RegistrationClosed { irq: Irq },

    #[error("No interrupt target configured at index {index}")]
    UnknownTarget { index: usize },

    #[error("Lifecycle error in {component}: {message}")]
    Lifecycle { component: String, message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },

    #[error("System error: {message}")]
    System { message: String },
}

impl CxlEmuError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<C: Into<String>, M: Into<String>>(component: C, message: M) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn lifecycle<C: Into<String>, M: Into<String>>(component: C, message: M) -> Self {
        Self::Lifecycle {
            component: component.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CxlEmuError>;
