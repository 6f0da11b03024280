use super::handler::IrqCallback;
use super::stats::IrqStats;
use super::types::{Irq, IrqEvent};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Registrations frozen when the listener starts serving
pub(super) type Registrations = Arc<HashMap<Irq, IrqCallback>>;

/// Deliver queued interrupts to their callbacks, one at a time, in arrival order.
///
/// Returns once every sender is dropped and the queue is drained.
pub(super) async fn run_dispatch(
    mut receiver: mpsc::Receiver<IrqEvent>,
    registrations: Registrations,
    stats: Arc<Mutex<IrqStats>>,
) {
    while let Some(event) = receiver.recv().await {
        let Some(callback) = registrations.get(&event.irq) else {
            warn!("No handler registered for {}", event.irq);
            continue;
        };

        debug!(
            "Dispatching {} after {:?} in queue",
            event.irq,
            event.received_at.elapsed().unwrap_or_default()
        );

        // A panicking callback must not stop dispatch
        match panic::catch_unwind(AssertUnwindSafe(|| callback())) {
            Ok(()) => stats.lock().record_dispatched(),
            Err(payload) => {
                stats.lock().record_callback_panic();
                error!(
                    "Handler for {} panicked: {}",
                    event.irq,
                    panic_message(payload.as_ref())
                );
            }
        }
    }

    debug!("Irq dispatch loop finished");
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
