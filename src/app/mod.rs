//! Process-level supervision of the emulator's components.

mod runtime;
mod shutdown;
mod startup;
mod state;
mod supervisor;
mod types;

#[cfg(test)]
mod tests;

pub use supervisor::Supervisor;
pub use types::{ShutdownHandle, ShutdownReason};
