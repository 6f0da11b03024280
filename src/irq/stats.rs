use super::types::Irq;
use std::time::SystemTime;

/// Interrupt listener statistics
#[derive(Debug, Clone, Default)]
pub struct IrqStats {
    pub connections_accepted: u64,
    pub empty_connections: u64,
    pub invalid_interrupts: u64,
    pub host_ready_received: u64,
    pub accel_ready_received: u64,
    pub host_sent_received: u64,
    pub dispatched: u64,
    pub callback_panics: u64,
    pub last_interrupt_time: Option<SystemTime>,
}

impl IrqStats {
    pub fn record_connection(&mut self) {
        self.connections_accepted += 1;
    }

    pub fn record_empty_connection(&mut self) {
        self.empty_connections += 1;
    }

    pub fn record_invalid(&mut self) {
        self.invalid_interrupts += 1;
    }

    pub fn record_received(&mut self, irq: Irq) {
        match irq {
            Irq::HostReady => self.host_ready_received += 1,
            Irq::AccelReady => self.accel_ready_received += 1,
            Irq::HostSent => self.host_sent_received += 1,
        }
        self.last_interrupt_time = Some(SystemTime::now());
    }

    pub fn record_dispatched(&mut self) {
        self.dispatched += 1;
    }

    pub fn record_callback_panic(&mut self) {
        self.callback_panics += 1;
    }

    pub fn received(&self, irq: Irq) -> u64 {
        match irq {
            Irq::HostReady => self.host_ready_received,
            Irq::AccelReady => self.accel_ready_received,
            Irq::HostSent => self.host_sent_received,
        }
    }

    pub fn total_received(&self) -> u64 {
        self.host_ready_received + self.accel_ready_received + self.host_sent_received
    }
}
