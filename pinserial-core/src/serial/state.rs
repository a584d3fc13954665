//! Connection state machine
//!
//! The link between a peripheral and its driver connection is explicit,
//! finite and deterministic. Destruction is tracked by the peripheral
//! base, not here, because teardown already in flight must still finish.

/// Link states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    /// No connection exists
    #[default]
    Closed,
    /// Connection created, waiting for the driver's open completion
    Opening,
    /// Connection ready for I/O
    Open,
    /// Close requested, waiting for the driver to confirm
    Closing,
}

/// Events that drive the link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkEvent {
    /// Caller asked for the port to be opened
    OpenRequested,
    /// Driver finished opening
    Opened,
    /// Driver could not open the device
    OpenFailed,
    /// Caller asked for the port to be closed
    CloseRequested,
    /// Driver finished closing (or the connection ended on its own)
    Closed,
}

impl LinkState {
    /// Check if reads and writes are allowed
    pub fn is_open(&self) -> bool {
        matches!(self, LinkState::Open)
    }

    /// Check if a driver transition is outstanding
    pub fn is_transitioning(&self) -> bool {
        matches!(self, LinkState::Opening | LinkState::Closing)
    }

    /// Process an event and return the next state
    pub fn transition(self, event: LinkEvent) -> Self {
        use LinkEvent::*;
        use LinkState::*;

        match (self, event) {
            (LinkState::Closed, OpenRequested) => Opening,

            (Opening, Opened) => Open,
            (Opening, OpenFailed) => LinkState::Closed,
            (Opening, LinkEvent::Closed) => LinkState::Closed,

            (Open, CloseRequested) => Closing,
            // Device went away without being asked to
            (Open, LinkEvent::Closed) => LinkState::Closed,

            (Closing, LinkEvent::Closed) => LinkState::Closed,

            // Default: stay in current state
            _ => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_close_cycle() {
        let state = LinkState::default();
        assert_eq!(state, LinkState::Closed);

        let state = state.transition(LinkEvent::OpenRequested);
        assert_eq!(state, LinkState::Opening);
        assert!(!state.is_open());

        let state = state.transition(LinkEvent::Opened);
        assert!(state.is_open());

        let state = state.transition(LinkEvent::CloseRequested);
        assert_eq!(state, LinkState::Closing);
        assert!(!state.is_open());
        assert!(state.is_transitioning());

        let state = state.transition(LinkEvent::Closed);
        assert_eq!(state, LinkState::Closed);
    }

    #[test]
    fn test_open_failure_returns_to_closed() {
        let state = LinkState::Opening.transition(LinkEvent::OpenFailed);
        assert_eq!(state, LinkState::Closed);
    }

    #[test]
    fn test_ignored_events() {
        assert_eq!(LinkState::Closed.transition(LinkEvent::CloseRequested), LinkState::Closed);
        assert_eq!(LinkState::Open.transition(LinkEvent::OpenRequested), LinkState::Open);
        assert_eq!(LinkState::Closing.transition(LinkEvent::Opened), LinkState::Closing);
        assert_eq!(LinkState::Opening.transition(LinkEvent::CloseRequested), LinkState::Opening);
    }

    #[test]
    fn test_unexpected_close() {
        assert_eq!(LinkState::Open.transition(LinkEvent::Closed), LinkState::Closed);
    }
}
