//! State of one interactive position check.
//!
//! Ready → Pending (capture in flight) → Done (verdict shown) → Ready via
//! `reset` ("go back"). Capture is only offered in Ready.

use crate::types::PositionVerdict;
use thiserror::Error;

pub const MSG_PLEASE_WAIT: &str = "Please wait...";
pub const MSG_ADJUST: &str = "Please adjust your face position for proper validation.";
pub const MSG_SUCCESS: &str = "You're in home.";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    #[error("a capture is already in progress")]
    Busy,
    #[error("check already complete; go back before capturing again")]
    AlreadyDone,
    #[error("no capture in progress")]
    NotPending,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SessionState {
    #[default]
    Ready,
    Pending,
    Done(PositionVerdict),
}

#[derive(Debug, Default)]
pub struct CheckSession {
    state: SessionState,
}

impl CheckSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the capture action should be offered.
    pub fn can_capture(&self) -> bool {
        matches!(self.state, SessionState::Ready)
    }

    /// Start a capture.
    pub fn begin(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Ready => {
                self.state = SessionState::Pending;
                Ok(())
            }
            SessionState::Pending => Err(SessionError::Busy),
            SessionState::Done(_) => Err(SessionError::AlreadyDone),
        }
    }

    /// Record the verdict of the capture in flight.
    pub fn complete(&mut self, verdict: PositionVerdict) -> Result<(), SessionError> {
        if self.state != SessionState::Pending {
            return Err(SessionError::NotPending);
        }
        tracing::debug!(positioned = verdict.positioned, "check complete");
        self.state = SessionState::Done(verdict);
        Ok(())
    }

    /// Drop the capture in flight, e.g. after a detector failure.
    pub fn abandon(&mut self) {
        if self.state == SessionState::Pending {
            self.state = SessionState::Ready;
        }
    }

    /// "Go back": clear any verdict and offer capture again.
    pub fn reset(&mut self) {
        self.state = SessionState::Ready;
    }

    /// The proceed action is only unlocked by a positive verdict.
    pub fn can_proceed(&self) -> bool {
        matches!(self.state, SessionState::Done(v) if v.positioned)
    }

    pub fn message(&self) -> &'static str {
        match self.state {
            SessionState::Pending => MSG_PLEASE_WAIT,
            SessionState::Done(v) if v.positioned => MSG_SUCCESS,
            _ => MSG_ADJUST,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passing() -> PositionVerdict {
        PositionVerdict {
            positioned: true,
            centered: true,
            visible: true,
            offset_px: Some(3.0),
            confidence: Some(0.9),
        }
    }

    #[test]
    fn test_initial_state() {
        let session = CheckSession::new();
        assert!(session.can_capture());
        assert!(!session.can_proceed());
        assert_eq!(session.message(), MSG_ADJUST);
    }

    #[test]
    fn test_successful_check() {
        let mut session = CheckSession::new();
        session.begin().unwrap();
        assert_eq!(session.message(), MSG_PLEASE_WAIT);
        assert!(!session.can_capture());

        session.complete(passing()).unwrap();
        assert_eq!(session.message(), MSG_SUCCESS);
        assert!(session.can_proceed());
        assert!(!session.can_capture());
    }

    #[test]
    fn test_failed_check_keeps_proceed_locked() {
        let mut session = CheckSession::new();
        session.begin().unwrap();
        session.complete(PositionVerdict::default()).unwrap();
        assert_eq!(session.message(), MSG_ADJUST);
        assert!(!session.can_proceed());
    }

    #[test]
    fn test_begin_while_pending_is_busy() {
        let mut session = CheckSession::new();
        session.begin().unwrap();
        assert_eq!(session.begin(), Err(SessionError::Busy));
    }

    #[test]
    fn test_begin_after_done_requires_reset() {
        let mut session = CheckSession::new();
        session.begin().unwrap();
        session.complete(passing()).unwrap();
        assert_eq!(session.begin(), Err(SessionError::AlreadyDone));

        session.reset();
        assert!(session.can_capture());
        assert!(!session.can_proceed());
        assert!(session.begin().is_ok());
    }

    #[test]
    fn test_complete_without_begin() {
        let mut session = CheckSession::new();
        assert_eq!(session.complete(passing()), Err(SessionError::NotPending));
    }

    #[test]
    fn test_abandon_returns_to_ready() {
        let mut session = CheckSession::new();
        session.begin().unwrap();
        session.abandon();
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn test_abandon_keeps_verdict() {
        let mut session = CheckSession::new();
        session.begin().unwrap();
        session.complete(passing()).unwrap();
        session.abandon();
        assert!(session.can_proceed());
    }
}
