use crate::error::{CxlEmuError, Result};
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Opaque handle to the CXL transport between a switch connection client and
/// a device engine.
///
/// Frames are carried as raw bytes in both directions; their encoding belongs
/// to the protocol layers on either end. Cloning shares the same queues;
/// the handle keeps both ends of each queue, so the queues never close.
#[derive(Clone)]
pub struct CxlConnection {
    queues: Arc<ConnectionQueues>,
}

struct ConnectionQueues {
    to_switch: mpsc::Sender<Bytes>,
    to_switch_rx: Mutex<mpsc::Receiver<Bytes>>,
    from_switch: mpsc::Sender<Bytes>,
    from_switch_rx: Mutex<mpsc::Receiver<Bytes>>,
}

impl CxlConnection {
    pub fn new(capacity: usize) -> Self {
        let (to_switch, to_switch_rx) = mpsc::channel(capacity.max(1));
        let (from_switch, from_switch_rx) = mpsc::channel(capacity.max(1));

        Self {
            queues: Arc::new(ConnectionQueues {
                to_switch,
                to_switch_rx: Mutex::new(to_switch_rx),
                from_switch,
                from_switch_rx: Mutex::new(from_switch_rx),
            }),
        }
    }

    /// Queue a frame from the device towards the switch
    pub async fn send_to_switch(&self, frame: Bytes) -> Result<()> {
        self.queues
            .to_switch
            .send(frame)
            .await
            .map_err(|_| CxlEmuError::system("CXL connection closed"))
    }

    /// Next frame queued by the device, for the connection client to forward
    pub async fn recv_from_device(&self) -> Option<Bytes> {
        self.queues.to_switch_rx.lock().await.recv().await
    }

    /// Queue a frame received from the switch towards the device
    pub async fn send_to_device(&self, frame: Bytes) -> Result<()> {
        self.queues
            .from_switch
            .send(frame)
            .await
            .map_err(|_| CxlEmuError::system("CXL connection closed"))
    }

    /// Next frame received from the switch
    pub async fn recv_from_switch(&self) -> Option<Bytes> {
        self.queues.from_switch_rx.lock().await.recv().await
    }
}

impl std::fmt::Debug for CxlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CxlConnection").finish_non_exhaustive()
    }
}
