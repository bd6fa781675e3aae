//! Submission lifecycle transitions
//!
//! ```text
//! unsubmitted/queued --accepted--> processing <--polled--+
//!        |                          ^  |  |              |
//!        |               resumed ---+  |  +--------------+
//!        +--rejected--+                +--terminal--+
//!                     v                             v
//!                success | partial_error | fatal_error
//! ```
//!
//! `processing` covers a job the endpoint still lists as queued: from the
//! batch's side it has been handed over either way.
//!
//! Pure: no I/O, no clock. The driver feeds observations in and carries out
//! the returned [`Action`].

use super::{PollStatus, TerminalOutcome};
use seqbatch_common::types::{BatchStatus, ErrorEntry};
use thiserror::Error;

/// Something learned from the endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Accepted,
    Rejected(TerminalOutcome),
    /// A later run picked up a job that was already submitted
    Resumed,
    Polled(PollStatus),
}

impl Event {
    fn name(&self) -> &'static str {
        match self {
            Event::Accepted => "accepted",
            Event::Rejected(_) => "rejected",
            Event::Resumed => "resumed",
            Event::Polled(PollStatus::Queued) => "polled queued",
            Event::Polled(PollStatus::Processing) => "polled processing",
            Event::Polled(PollStatus::Terminal(_)) => "polled terminal",
        }
    }
}

/// What the driver must do next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Wait, then poll the job again
    Poll,

    /// The batch reached a terminal state
    Settle(Settlement),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// Mark the batch done
    Accept,

    /// Mark the batch partially failed and derive a correction batch
    Revise(Vec<ErrorEntry>),

    /// Stop the whole run
    Halt(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub status: BatchStatus,
    pub action: Action,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot apply '{event}' to a batch in state {from}")]
pub struct TransitionError {
    pub from: BatchStatus,
    pub event: &'static str,
}

/// Apply `event` to a batch currently in `from`
pub fn step(from: BatchStatus, event: Event) -> Result<Step, TransitionError> {
    use BatchStatus::*;

    let invalid = |event: &Event| TransitionError {
        from,
        event: event.name(),
    };

    match (from, event) {
        (Unsubmitted | Queued, Event::Accepted)
        | (Processing, Event::Resumed)
        | (Processing, Event::Polled(PollStatus::Queued | PollStatus::Processing)) => Ok(Step {
            status: Processing,
            action: Action::Poll,
        }),
        (Unsubmitted | Queued, Event::Rejected(outcome)) => Ok(settle(outcome)),
        (Processing, Event::Polled(PollStatus::Terminal(outcome))) => Ok(settle(outcome)),
        (_, event) => Err(invalid(&event)),
    }
}

fn settle(outcome: TerminalOutcome) -> Step {
    match outcome {
        TerminalOutcome::Success => Step {
            status: BatchStatus::Success,
            action: Action::Settle(Settlement::Accept),
        },
        TerminalOutcome::PartialError(errors) => Step {
            status: BatchStatus::PartialError,
            action: Action::Settle(Settlement::Revise(errors)),
        },
        TerminalOutcome::FatalError(reason) => Step {
            status: BatchStatus::FatalError,
            action: Action::Settle(Settlement::Halt(reason)),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_then_polled_to_success() {
        let s = step(BatchStatus::Queued, Event::Accepted).unwrap();
        assert_eq!(s.status, BatchStatus::Processing);
        assert_eq!(s.action, Action::Poll);

        let s = step(s.status, Event::Polled(PollStatus::Queued)).unwrap();
        assert_eq!(s.status, BatchStatus::Processing);
        let s = step(s.status, Event::Polled(PollStatus::Processing)).unwrap();
        assert_eq!(s.status, BatchStatus::Processing);

        let s = step(s.status, Event::Polled(PollStatus::Terminal(TerminalOutcome::Success))).unwrap();
        assert_eq!(s.status, BatchStatus::Success);
        assert_eq!(s.action, Action::Settle(Settlement::Accept));
    }

    #[test]
    fn test_partial_error_carries_entries() {
        let errors = vec![ErrorEntry::new("r3", "bad").with_field("host")];
        let s = step(
            BatchStatus::Processing,
            Event::Polled(PollStatus::Terminal(TerminalOutcome::PartialError(errors.clone()))),
        )
        .unwrap();
        assert_eq!(s.status, BatchStatus::PartialError);
        assert_eq!(s.action, Action::Settle(Settlement::Revise(errors)));
    }

    #[test]
    fn test_rejected_without_job_is_terminal() {
        let s = step(
            BatchStatus::Unsubmitted,
            Event::Rejected(TerminalOutcome::FatalError("Unauthorized".to_string())),
        )
        .unwrap();
        assert_eq!(s.status, BatchStatus::FatalError);
        assert_eq!(s.action, Action::Settle(Settlement::Halt("Unauthorized".to_string())));
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        for from in [BatchStatus::Success, BatchStatus::PartialError, BatchStatus::FatalError] {
            let err = step(from, Event::Accepted).unwrap_err();
            assert_eq!(err.from, from);
            assert!(step(from, Event::Polled(PollStatus::Queued)).is_err());
        }
    }

    #[test]
    fn test_resumed_job_is_polled_not_resubmitted() {
        let s = step(BatchStatus::Processing, Event::Resumed).unwrap();
        assert_eq!(s.status, BatchStatus::Processing);
        assert_eq!(s.action, Action::Poll);

        assert!(step(BatchStatus::Queued, Event::Resumed).is_err());
        assert!(step(BatchStatus::Processing, Event::Rejected(TerminalOutcome::Success)).is_err());
    }

    #[test]
    fn test_cannot_poll_before_submission() {
        let err = step(BatchStatus::Unsubmitted, Event::Polled(PollStatus::Processing)).unwrap_err();
        assert_eq!(err.to_string(), "cannot apply 'polled processing' to a batch in state unsubmitted");
        assert!(step(BatchStatus::Processing, Event::Accepted).is_err());
        assert!(step(BatchStatus::Queued, Event::Polled(PollStatus::Queued)).is_err());
    }
}
