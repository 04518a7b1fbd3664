use crate::models::BookingStatus;

/// Events that move a booking through its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingEvent {
    Accept,
    Reject,
    Cancel,
    Complete,
}

impl std::fmt::Display for BookingEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BookingEvent::Accept => "ACCEPT",
            BookingEvent::Reject => "REJECT",
            BookingEvent::Cancel => "CANCEL",
            BookingEvent::Complete => "COMPLETE",
        };
        f.write_str(s)
    }
}

/// Booking lifecycle transition table. The guard here is the compare-and-swap
/// point: a transition from a non-matching status fails and performs no side
/// effect, so a concurrent second attempt simply loses.
pub struct BookingStateMachine;

impl BookingStateMachine {
    /// Resolve the target status for an event against the current status.
    pub fn next(
        current: BookingStatus,
        event: BookingEvent,
    ) -> Result<BookingStatus, TransitionError> {
        match (current, event) {
            (BookingStatus::Pending, BookingEvent::Accept) => Ok(BookingStatus::Accepted),
            (BookingStatus::Pending, BookingEvent::Reject) => Ok(BookingStatus::Rejected),
            (BookingStatus::Pending, BookingEvent::Cancel)
            | (BookingStatus::Accepted, BookingEvent::Cancel) => Ok(BookingStatus::Cancelled),
            (BookingStatus::Accepted, BookingEvent::Complete) => Ok(BookingStatus::Completed),
            (from, event) => Err(TransitionError::InvalidTransition { from, event }),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    #[error("invalid transition: {event} not allowed from {from}")]
    InvalidTransition {
        from: BookingStatus,
        event: BookingEvent,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_edges() {
        use BookingEvent::*;
        use BookingStatus::*;

        assert_eq!(BookingStateMachine::next(Pending, Accept).unwrap(), Accepted);
        assert_eq!(BookingStateMachine::next(Pending, Reject).unwrap(), Rejected);
        assert_eq!(BookingStateMachine::next(Pending, Cancel).unwrap(), Cancelled);
        assert_eq!(BookingStateMachine::next(Accepted, Cancel).unwrap(), Cancelled);
        assert_eq!(
            BookingStateMachine::next(Accepted, Complete).unwrap(),
            Completed
        );
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        use BookingEvent::*;
        use BookingStatus::*;

        for from in [Rejected, Cancelled, Completed] {
            for event in [Accept, Reject, Cancel, Complete] {
                assert!(BookingStateMachine::next(from, event).is_err());
            }
        }
    }

    #[test]
    fn test_no_accept_from_accepted() {
        let err =
            BookingStateMachine::next(BookingStatus::Accepted, BookingEvent::Accept).unwrap_err();
        assert!(matches!(
            err,
            TransitionError::InvalidTransition {
                from: BookingStatus::Accepted,
                event: BookingEvent::Accept
            }
        ));
    }

    #[test]
    fn test_no_complete_from_pending() {
        assert!(BookingStateMachine::next(BookingStatus::Pending, BookingEvent::Complete).is_err());
    }
}
