use tokio::sync::mpsc;
use tracing::debug;

/// System shutdown reason
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownReason {
    Signal(String),
    Error(String),
    ComponentExited(String),
    UserRequest,
}

/// Cloneable handle for requesting a supervisor shutdown from elsewhere
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: mpsc::Sender<ShutdownReason>,
}

impl ShutdownHandle {
    pub(super) fn new(sender: mpsc::Sender<ShutdownReason>) -> Self {
        Self { sender }
    }

    /// Queue a shutdown request. Only the first request is acted upon.
    pub fn request(&self, reason: ShutdownReason) {
        if let Err(e) = self.sender.try_send(reason) {
            debug!("Shutdown request dropped: {}", e);
        }
    }
}
