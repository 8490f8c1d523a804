use crate::session::types::{SessionEvent, SessionState};

/// IVR_PROMPT -> IVR_WAIT -> CONVERSING -> ENDED. Hangup ends any state;
/// nothing leaves ENDED and no transition goes backwards.
pub fn next_session_state(state: SessionState, event: SessionEvent) -> SessionState {
    use SessionEvent::*;
    use SessionState::*;

    match (state, event) {
        (Ended, _) => Ended,
        (_, Hangup) => Ended,
        (IvrPrompt, PromptScheduled) => IvrWait,
        (IvrWait, IvrActivity | IvrTimeout) => Conversing,
        (current, _) => current,
    }
}

/// Pure session state machine: transitions only, no I/O.
#[derive(Debug)]
pub struct SessionStateMachine {
    state: SessionState,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStateMachine {
    pub fn new() -> Self {
        Self {
            state: SessionState::IvrPrompt,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Applies `event`; returns the new state if it changed.
    pub fn advance(&mut self, event: SessionEvent) -> Option<SessionState> {
        let next = next_session_state(self.state, event);
        if next == self.state {
            return None;
        }
        self.state = next;
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path() {
        let mut sm = SessionStateMachine::new();
        assert_eq!(sm.state(), SessionState::IvrPrompt);
        assert_eq!(sm.advance(SessionEvent::PromptScheduled), Some(SessionState::IvrWait));
        assert_eq!(sm.advance(SessionEvent::IvrTimeout), Some(SessionState::Conversing));
        assert_eq!(sm.advance(SessionEvent::Hangup), Some(SessionState::Ended));
    }

    #[test]
    fn ivr_outcome_only_counts_while_waiting() {
        let mut sm = SessionStateMachine::new();
        assert_eq!(sm.advance(SessionEvent::IvrActivity), None);
        assert_eq!(sm.state(), SessionState::IvrPrompt);
        sm.advance(SessionEvent::PromptScheduled);
        sm.advance(SessionEvent::IvrActivity);
        assert_eq!(sm.advance(SessionEvent::IvrTimeout), None);
        assert_eq!(sm.advance(SessionEvent::PromptScheduled), None);
        assert_eq!(sm.state(), SessionState::Conversing);
    }

    #[test]
    fn ended_is_terminal() {
        for event in [
            SessionEvent::PromptScheduled,
            SessionEvent::IvrActivity,
            SessionEvent::IvrTimeout,
            SessionEvent::Hangup,
        ] {
            assert_eq!(next_session_state(SessionState::Ended, event), SessionState::Ended);
        }
        assert_eq!(
            next_session_state(SessionState::IvrWait, SessionEvent::Hangup),
            SessionState::Ended
        );
    }
}
