use crate::error::CxlEmuError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

/// Width of an interrupt on the wire, in bytes
pub const IRQ_WIDTH: usize = 1;

/// Interrupts exchanged between a host and its devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum Irq {
    /// Host-side file ready to be read by the device over CXL.cache
    HostReady = 0x01,
    /// Device-side results ready to be read by the host over CXL.mem
    AccelReady = 0x02,
    /// Host finished writing the file to the device over CXL.mem
    HostSent = 0x03,
}

impl Irq {
    pub const ALL: [Irq; 3] = [Irq::HostReady, Irq::AccelReady, Irq::HostSent];

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Irq::HostReady => "host-ready",
            Irq::AccelReady => "accel-ready",
            Irq::HostSent => "host-sent",
        }
    }
}

impl TryFrom<u8> for Irq {
    type Error = CxlEmuError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Irq::HostReady),
            0x02 => Ok(Irq::AccelReady),
            0x03 => Ok(Irq::HostSent),
            _ => Err(CxlEmuError::InvalidInterrupt { value }),
        }
    }
}

impl FromStr for Irq {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Irq::ALL
            .into_iter()
            .find(|irq| irq.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                format!("unknown interrupt '{}' (expected host-ready, accel-ready or host-sent)", s)
            })
    }
}

impl fmt::Display for Irq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02x})", self.name(), self.as_byte())
    }
}

/// A received interrupt waiting for dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqEvent {
    pub irq: Irq,
    pub received_at: SystemTime,
}

impl IrqEvent {
    pub fn new(irq: Irq) -> Self {
        Self {
            irq,
            received_at: SystemTime::now(),
        }
    }
}
