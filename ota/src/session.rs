// Licensed under the Apache-2.0 license

use smlang::statemachine;

statemachine! {
    derive_states: [Clone, Copy, Debug],
    transitions: {
        // syntax: CurrentState Event [guard] / action = NextState

        *Idle + StartRequested = Receiving,

        // end-of-transfer marker seen and the staged image flushed
        Receiving + TransferComplete = Verifying,

        // all integrity checks passed and the commit plan is loaded in RAM
        Verifying + ImageAccepted = Committing,

        // any pre-commit failure; Idle is re-entered only via reset
        Receiving + Fault = Failed,
        Verifying + Fault = Failed,
        Committing + Fault = Failed,
    }
}

/// State machine extended variables.
pub(crate) struct Context {
    pub chunks_accepted: u32,
    pub bytes_received: u32,
}

impl Context {
    pub(crate) fn new() -> Context {
        Context {
            chunks_accepted: 0,
            bytes_received: 0,
        }
    }
}

impl StateMachineContext for Context {}

/// The single update session. Construction does not claim the global
/// session slot; `quiesce::try_begin` does, so a duplicate start request
/// is a no-op before a session object ever exists.
pub struct UpdateSession {
    sm: StateMachine<Context>,
}

impl UpdateSession {
    pub fn new() -> UpdateSession {
        UpdateSession {
            sm: StateMachine::new(Context::new()),
        }
    }

    pub fn state(&self) -> States {
        *self.sm.state()
    }

    pub fn start(&mut self) {
        let _ = self.sm.process_event(Events::StartRequested);
    }

    pub fn transfer_complete(&mut self) {
        let _ = self.sm.process_event(Events::TransferComplete);
    }

    pub fn image_accepted(&mut self) {
        let _ = self.sm.process_event(Events::ImageAccepted);
    }

    pub fn fault(&mut self) {
        let _ = self.sm.process_event(Events::Fault);
    }

    pub fn chunks_accepted(&self) -> u32 {
        self.sm.context().chunks_accepted
    }

    pub fn bytes_received(&self) -> u32 {
        self.sm.context().bytes_received
    }

    pub(crate) fn note_chunk(&mut self, payload_len: usize) {
        let context = self.sm.context_mut();
        context.chunks_accepted += 1;
        context.bytes_received += payload_len as u32;
    }
}

impl Default for UpdateSession {
    fn default() -> Self {
        UpdateSession::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_lifecycle_happy_path() {
        let mut session = UpdateSession::new();
        assert!(matches!(session.state(), States::Idle));
        session.start();
        assert!(matches!(session.state(), States::Receiving));
        session.transfer_complete();
        assert!(matches!(session.state(), States::Verifying));
        session.image_accepted();
        assert!(matches!(session.state(), States::Committing));
    }

    #[test]
    fn test_fault_is_terminal_without_reset() {
        let mut session = UpdateSession::new();
        session.start();
        session.fault();
        assert!(matches!(session.state(), States::Failed));
        // no software transition leaves Failed
        session.start();
        assert!(matches!(session.state(), States::Failed));
        session.transfer_complete();
        assert!(matches!(session.state(), States::Failed));
    }

    #[test]
    fn test_counters_track_accepted_chunks() {
        let mut session = UpdateSession::new();
        session.start();
        session.note_chunk(256);
        session.note_chunk(100);
        assert_eq!(session.chunks_accepted(), 2);
        assert_eq!(session.bytes_received(), 356);
    }
}
