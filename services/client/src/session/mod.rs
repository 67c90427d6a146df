pub mod chat;
pub mod events;
pub mod playback_task;
pub mod state;
pub mod status;

pub use chat::{ChatSession, SendOutcome, Services, UploadSummary};
pub use events::SessionEvent;
pub use playback_task::playback_process;
pub use state::{SessionState, StatusLine};
