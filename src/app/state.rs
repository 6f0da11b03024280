use super::Supervisor;
use crate::component::ComponentStatus;
use std::collections::HashMap;

impl Supervisor {
    /// Current status of one component
    pub fn component_state(&self, label: &str) -> Option<ComponentStatus> {
        self.components
            .iter()
            .find(|c| c.label() == label)
            .map(|c| c.lifecycle().status())
    }

    /// Current status of every component, keyed by label
    pub fn component_states(&self) -> HashMap<String, ComponentStatus> {
        self.components
            .iter()
            .map(|c| (c.label().to_string(), c.lifecycle().status()))
            .collect()
    }
}
