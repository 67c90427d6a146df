pub mod dictation;
pub mod recorder;

pub use dictation::Dictation;
pub use recorder::{RecorderState, VoiceRecorder};
