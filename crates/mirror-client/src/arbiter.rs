//! Decides whether the remote video may be shown.

use crate::orchestrator::{ConnectionState, OrchestratorEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VisibilityInputs {
    pub local_presence: bool,
    pub remote_presence: bool,
    pub remote_stream_available: bool,
    pub link_state: ConnectionState,
}

/// Visible only while both people are present, the remote stream exists and
/// the link is connected.
pub fn decide(inputs: &VisibilityInputs) -> bool {
    inputs.local_presence
        && inputs.remote_presence
        && inputs.remote_stream_available
        && inputs.link_state.is_connected()
}

/// Edge-triggered wrapper around [`decide`]. Every setter returns the new
/// visibility only when it differs from the last one reported.
#[derive(Debug, Default)]
pub struct VisibilityArbiter {
    inputs: VisibilityInputs,
    visible: bool,
}

impl VisibilityArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn inputs(&self) -> VisibilityInputs {
        self.inputs
    }

    pub fn set_local_presence(&mut self, present: bool) -> Option<bool> {
        self.inputs.local_presence = present;
        self.reevaluate()
    }

    pub fn set_remote_presence(&mut self, present: bool) -> Option<bool> {
        self.inputs.remote_presence = present;
        self.reevaluate()
    }

    pub fn set_remote_stream(&mut self, available: bool) -> Option<bool> {
        self.inputs.remote_stream_available = available;
        self.reevaluate()
    }

    pub fn set_link_state(&mut self, state: ConnectionState) -> Option<bool> {
        self.inputs.link_state = state;
        self.reevaluate()
    }

    pub fn apply(&mut self, event: &OrchestratorEvent) -> Option<bool> {
        match *event {
            OrchestratorEvent::LinkState(state) => self.set_link_state(state),
            OrchestratorEvent::RemoteStreamAvailable(available) => {
                self.set_remote_stream(available)
            }
        }
    }

    fn reevaluate(&mut self) -> Option<bool> {
        let next = decide(&self.inputs);
        if next == self.visible {
            return None;
        }
        self.visible = next;
        Some(next)
    }
}
