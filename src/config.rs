use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CxlEmuConfig {
    pub irq: IrqConfig,
    pub device: DeviceConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IrqConfig {
    /// Name of the emulated device, used to label the handler
    #[serde(default = "default_device_name")]
    pub device_name: String,

    /// Address the interrupt listener binds to
    #[serde(default = "default_irq_bind_addr")]
    pub bind_addr: String,

    /// Port the interrupt listener binds to (0 picks an ephemeral port)
    #[serde(default = "default_irq_bind_port")]
    pub bind_port: u16,

    /// Address of the peer interrupt listener(s)
    #[serde(default = "default_irq_target_addr")]
    pub target_addr: String,

    /// Ports of the peer interrupt listeners, one per remote device
    #[serde(default = "default_irq_target_ports")]
    pub target_ports: Vec<u16>,

    /// Maximum number of received interrupts waiting for dispatch
    #[serde(default = "default_dispatch_capacity")]
    pub dispatch_capacity: usize,

    /// Upper bound for connecting and writing a single interrupt
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DeviceConfig {
    /// Switch port index this device attaches to
    #[serde(default = "default_port_index")]
    pub port_index: u32,

    /// Switch host
    #[serde(default = "default_switch_host")]
    pub host: String,

    /// Switch port
    #[serde(default = "default_switch_port")]
    pub port: u16,

    /// Capacity of each direction of the CXL connection queues
    #[serde(default = "default_frame_capacity")]
    pub frame_capacity: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// How long the supervisor waits for every component to report Running
    #[serde(default = "default_startup_timeout_ms")]
    pub startup_timeout_ms: u64,

    /// How long a single component may take to stop
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
}

impl IrqConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.bind_port)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

impl SystemConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

impl CxlEmuConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("cxl-emu.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("irq.device_name", default_device_name())?
            .set_default("irq.bind_addr", default_irq_bind_addr())?
            .set_default("irq.bind_port", default_irq_bind_port() as i64)?
            .set_default("irq.target_addr", default_irq_target_addr())?
            .set_default(
                "irq.target_ports",
                default_irq_target_ports()
                    .into_iter()
                    .map(i64::from)
                    .collect::<Vec<_>>(),
            )?
            .set_default("irq.dispatch_capacity", default_dispatch_capacity() as i64)?
            .set_default("irq.send_timeout_ms", default_send_timeout_ms() as i64)?
            .set_default("device.port_index", default_port_index() as i64)?
            .set_default("device.host", default_switch_host())?
            .set_default("device.port", default_switch_port() as i64)?
            .set_default("device.frame_capacity", default_frame_capacity() as i64)?
            .set_default("system.startup_timeout_ms", default_startup_timeout_ms() as i64)?
            .set_default("system.stop_timeout_ms", default_stop_timeout_ms() as i64)?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // CXLEMU_IRQ__BIND_PORT=9001 overrides irq.bind_port
            .add_source(
                Environment::with_prefix("CXLEMU")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: CxlEmuConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Render the configuration as TOML
    pub fn to_toml_string(&self) -> crate::error::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.irq.device_name.trim().is_empty() {
            return Err(ConfigError::Message(
                "IRQ device_name must not be empty".to_string(),
            ));
        }

        if self.irq.bind_addr.trim().is_empty() || self.irq.target_addr.trim().is_empty() {
            return Err(ConfigError::Message(
                "IRQ bind_addr and target_addr must not be empty".to_string(),
            ));
        }

        if self.irq.target_ports.is_empty() {
            return Err(ConfigError::Message(
                "IRQ target_ports must list at least one peer".to_string(),
            ));
        }

        if self.irq.dispatch_capacity == 0 {
            return Err(ConfigError::Message(
                "IRQ dispatch_capacity must be greater than 0".to_string(),
            ));
        }

        if self.irq.send_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "IRQ send_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.device.host.trim().is_empty() {
            return Err(ConfigError::Message(
                "Device host must not be empty".to_string(),
            ));
        }

        if self.device.frame_capacity == 0 {
            return Err(ConfigError::Message(
                "Device frame_capacity must be greater than 0".to_string(),
            ));
        }

        if self.system.startup_timeout_ms == 0 || self.system.stop_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "System timeouts must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for CxlEmuConfig {
    fn default() -> Self {
        Self {
            irq: IrqConfig::default(),
            device: DeviceConfig {
                port_index: default_port_index(),
                host: default_switch_host(),
                port: default_switch_port(),
                frame_capacity: default_frame_capacity(),
            },
            system: SystemConfig {
                startup_timeout_ms: default_startup_timeout_ms(),
                stop_timeout_ms: default_stop_timeout_ms(),
            },
        }
    }
}

impl Default for IrqConfig {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            bind_addr: default_irq_bind_addr(),
            bind_port: default_irq_bind_port(),
            target_addr: default_irq_target_addr(),
            target_ports: default_irq_target_ports(),
            dispatch_capacity: default_dispatch_capacity(),
            send_timeout_ms: default_send_timeout_ms(),
        }
    }
}

// Default value functions
fn default_device_name() -> String {
    "device0".to_string()
}
fn default_irq_bind_addr() -> String {
    "127.0.0.1".to_string()
}
fn default_irq_bind_port() -> u16 {
    9000
}
fn default_irq_target_addr() -> String {
    "127.0.0.1".to_string()
}
fn default_irq_target_ports() -> Vec<u16> {
    vec![9100]
}
fn default_dispatch_capacity() -> usize {
    64
}
fn default_send_timeout_ms() -> u64 {
    2000
}

fn default_port_index() -> u32 {
    0
}
fn default_switch_host() -> String {
    "0.0.0.0".to_string()
}
fn default_switch_port() -> u16 {
    8000
}
fn default_frame_capacity() -> usize {
    256
}

fn default_startup_timeout_ms() -> u64 {
    5000
}
fn default_stop_timeout_ms() -> u64 {
    10000
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = CxlEmuConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.irq.bind_address(), "127.0.0.1:9000");
        assert_eq!(config.irq.target_ports, vec![9100]);
        assert_eq!(config.device.port, 8000);
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cxl-emu.toml");
        std::fs::write(
            &path,
            r#"
[irq]
device_name = "accel1"
bind_port = 9101
target_ports = [9000, 9001]

[device]
port_index = 3
"#,
        )
        .unwrap();

        let config = CxlEmuConfig::load_from_file(&path).unwrap();

        assert_eq!(config.irq.device_name, "accel1");
        assert_eq!(config.irq.bind_port, 9101);
        assert_eq!(config.irq.target_ports, vec![9000, 9001]);
        assert_eq!(config.device.port_index, 3);
        // Untouched values fall back to defaults
        assert_eq!(config.irq.bind_addr, "127.0.0.1");
        assert_eq!(config.system.stop_timeout_ms, 10000);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = CxlEmuConfig::load_from_file(dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.irq.dispatch_capacity, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_environment_variable_override() {
        env::set_var("CXLEMU_SYSTEM__STARTUP_TIMEOUT_MS", "1234");

        let dir = TempDir::new().unwrap();
        let config = CxlEmuConfig::load_from_file(dir.path().join("absent.toml")).unwrap();
        env::remove_var("CXLEMU_SYSTEM__STARTUP_TIMEOUT_MS");

        assert_eq!(config.system.startup_timeout_ms, 1234);
    }

    #[test]
    fn test_config_validation() {
        let mut config = CxlEmuConfig::default();

        config.irq.target_ports.clear();
        assert!(config.validate().is_err());

        config.irq.target_ports = vec![9100];
        config.irq.dispatch_capacity = 0;
        assert!(config.validate().is_err());

        config.irq.dispatch_capacity = 8;
        config.system.stop_timeout_ms = 0;
        assert!(config.validate().is_err());

        config.system.stop_timeout_ms = 100;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_serializes_to_toml() {
        let rendered = CxlEmuConfig::default().to_toml_string().unwrap();

        assert!(rendered.contains("[irq]"));
        assert!(rendered.contains("target_ports"));
        assert!(rendered.contains("[system]"));

        // The rendered file loads back to the same values
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rendered.toml");
        std::fs::write(&path, &rendered).unwrap();
        let loaded = CxlEmuConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.irq.target_ports, vec![9100]);
        assert_eq!(loaded.device.frame_capacity, 256);
    }
}
