//! Lifecycle runtime shared by every long-lived unit of the emulator.
//!
//! A component moves through [`ComponentStatus::NotRunning`],
//! [`ComponentStatus::Running`], [`ComponentStatus::Stopping`] and
//! [`ComponentStatus::Stopped`] exactly once. The transitions are owned by a
//! [`Lifecycle`] embedded in the component; the [`RunnableComponent`] trait
//! supplies `run()`/`stop()` on top of the component's own body.

mod lifecycle;
mod runnable;
mod types;


pub use lifecycle::Lifecycle;
pub use runnable::{default_stop, stop_all, RunnableComponent};
pub use types::{ComponentStatus, StatusTransition};
