use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a gateway session.
///
/// `starting -> active -> closing -> closed`, never backwards. A session
/// whose bridge fails to spawn may skip straight from `starting` to
/// `closing`/`closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Starting,
    Active,
    Closing,
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Starting => "starting",
            SessionState::Active => "active",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        }
    }

    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Starting, Active) | (Starting, Closing) | (Starting, Closed) | (Active, Closing) | (Closing, Closed)
        )
    }

    /// Starting or active: the session still accepts frames
    pub fn is_live(&self) -> bool {
        matches!(self, SessionState::Starting | SessionState::Active)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::SessionState::*;

    #[test]
    fn test_transitions_are_monotonic() {
        assert!(Starting.can_transition_to(Active));
        assert!(Active.can_transition_to(Closing));
        assert!(Closing.can_transition_to(Closed));
        assert!(Starting.can_transition_to(Closed));

        assert!(!Active.can_transition_to(Starting));
        assert!(!Closed.can_transition_to(Active));
        assert!(!Closing.can_transition_to(Active));
        assert!(!Active.can_transition_to(Closed));
        assert!(!Active.can_transition_to(Active));
    }
}
