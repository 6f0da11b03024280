use std::fmt;

/// Component lifecycle states, ordered by progression
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComponentStatus {
    NotRunning,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComponentStatus::NotRunning => "not-running",
            ComponentStatus::Running => "running",
            ComponentStatus::Stopping => "stopping",
            ComponentStatus::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// A single observed status change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTransition {
    pub label: String,
    pub from: ComponentStatus,
    pub to: ComponentStatus,
}
