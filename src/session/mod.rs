pub mod conversation;
pub mod coordinator;
pub mod ivr;
pub mod manager;
pub(crate) mod playback;
pub mod state_machine;
pub mod types;

pub use conversation::{Conversation, TranscriptEntry};
pub use coordinator::{Collaborators, Session};
pub use manager::SessionManager;
pub use state_machine::{next_session_state, SessionStateMachine};
pub use types::{CallId, CallSetup, SessionEvent, SessionState, SessionStats};
