//! Listener lifecycle state machine.
//!
//! `Stopped -> Starting -> Listening -> Stopped`. At most one listener runs
//! per server; a start request while starting or listening is refused and
//! leaves the running listener alone.

/// Listener lifecycle - NO I/O, just state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListenerState {
    /// Not listening.
    #[default]
    Stopped,
    /// Binding the listening socket.
    Starting,
    /// Accept loop running.
    Listening,
}

impl ListenerState {
    /// Create a new state machine in the Stopped state.
    pub fn new() -> Self {
        Self::Stopped
    }

    /// Process an event and return the new state plus actions to execute.
    pub fn on_event(self, event: ListenerEvent) -> (Self, Vec<ListenerAction>) {
        match (self, event) {
            // From Stopped
            (Self::Stopped, ListenerEvent::StartRequested) => (
                Self::Starting,
                vec![ListenerAction::CancelDiscovery, ListenerAction::Bind],
            ),

            // Singleton run state
            (state @ (Self::Starting | Self::Listening), ListenerEvent::StartRequested) => {
                (state, vec![ListenerAction::RejectAlreadyRunning])
            }

            // From Starting
            (Self::Starting, ListenerEvent::Bound) => {
                (Self::Listening, vec![ListenerAction::SpawnAcceptLoop])
            }
            (Self::Starting, ListenerEvent::BindFailed) => {
                (Self::Stopped, vec![ListenerAction::RejectBindFailed])
            }

            // From Listening
            (Self::Listening, ListenerEvent::StopRequested) => (
                Self::Stopped,
                vec![
                    ListenerAction::ClearRunFlag,
                    ListenerAction::InterruptAcceptLoop,
                ],
            ),
            (Self::Listening, ListenerEvent::AcceptLoopExited) => (Self::Stopped, vec![]),

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Whether a listener is starting or running.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Stopped)
    }

    /// Whether the accept loop is running.
    pub fn is_listening(&self) -> bool {
        matches!(self, Self::Listening)
    }
}

/// Inputs to the listener state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerEvent {
    /// Caller asked to start listening.
    StartRequested,
    /// Listening socket bound.
    Bound,
    /// Listening socket could not be created.
    BindFailed,
    /// Caller asked to stop.
    StopRequested,
    /// The accept loop ended on its own.
    AcceptLoopExited,
}

/// Actions for the server to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerAction {
    /// Cancel any discovery session before binding.
    CancelDiscovery,
    /// Bind the listening socket on the service id.
    Bind,
    /// Spawn the background accept loop.
    SpawnAcceptLoop,
    /// Fail the start call with `AlreadyRunning`.
    RejectAlreadyRunning,
    /// Fail the start call with `BindFailed`.
    RejectBindFailed,
    /// Clear the run flag checked by the accept loop.
    ClearRunFlag,
    /// Wake the accept loop out of its bounded wait.
    InterruptAcceptLoop,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_cancels_discovery_then_binds() {
        let (state, actions) = ListenerState::new().on_event(ListenerEvent::StartRequested);
        assert_eq!(state, ListenerState::Starting);
        assert_eq!(
            actions,
            vec![ListenerAction::CancelDiscovery, ListenerAction::Bind]
        );
    }

    #[test]
    fn bound_starts_accept_loop() {
        let (state, actions) = ListenerState::Starting.on_event(ListenerEvent::Bound);
        assert!(state.is_listening());
        assert_eq!(actions, vec![ListenerAction::SpawnAcceptLoop]);
    }

    #[test]
    fn bind_failure_returns_to_stopped() {
        let (state, actions) = ListenerState::Starting.on_event(ListenerEvent::BindFailed);
        assert_eq!(state, ListenerState::Stopped);
        assert_eq!(actions, vec![ListenerAction::RejectBindFailed]);
    }

    #[test]
    fn second_start_is_rejected_without_disturbing_listener() {
        let (state, actions) = ListenerState::Listening.on_event(ListenerEvent::StartRequested);
        assert_eq!(state, ListenerState::Listening);
        assert_eq!(actions, vec![ListenerAction::RejectAlreadyRunning]);

        let (state, actions) = ListenerState::Starting.on_event(ListenerEvent::StartRequested);
        assert_eq!(state, ListenerState::Starting);
        assert_eq!(actions, vec![ListenerAction::RejectAlreadyRunning]);
    }

    #[test]
    fn stop_clears_flag_and_interrupts() {
        let (state, actions) = ListenerState::Listening.on_event(ListenerEvent::StopRequested);
        assert_eq!(state, ListenerState::Stopped);
        assert!(actions.contains(&ListenerAction::ClearRunFlag));
        assert!(actions.contains(&ListenerAction::InterruptAcceptLoop));
    }

    #[test]
    fn stop_when_stopped_is_noop() {
        let (state, actions) = ListenerState::Stopped.on_event(ListenerEvent::StopRequested);
        assert_eq!(state, ListenerState::Stopped);
        assert!(actions.is_empty());
    }

    #[test]
    fn loop_exit_stops_listener() {
        let (state, _) = ListenerState::Listening.on_event(ListenerEvent::AcceptLoopExited);
        assert!(!state.is_active());
    }

    #[test]
    fn full_lifecycle_can_restart() {
        let (state, _) = ListenerState::new().on_event(ListenerEvent::StartRequested);
        let (state, _) = state.on_event(ListenerEvent::Bound);
        let (state, _) = state.on_event(ListenerEvent::StopRequested);
        let (state, actions) = state.on_event(ListenerEvent::StartRequested);
        assert_eq!(state, ListenerState::Starting);
        assert!(actions.contains(&ListenerAction::Bind));
    }
}
