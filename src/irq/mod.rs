//! Out-of-band interrupt signaling between emulated CXL participants.
//!
//! Each interrupt is a single byte on its own TCP connection. The
//! [`IrqHandler`] listens for interrupts from its peer and dispatches them to
//! registered callbacks, and sends interrupts to the peer's listener.

mod dispatch;
mod handler;
mod stats;
mod types;


pub use handler::{IrqCallback, IrqHandler};
pub use stats::IrqStats;
pub use types::{Irq, IrqEvent, IRQ_WIDTH};
