pub mod backend;
pub mod chat_llm;
pub mod documents;
pub mod microphone;
pub mod playback;
pub mod recognizer;
pub mod sst;
pub mod tts;

pub use backend::BackendClient;
pub use chat_llm::BackendChatAdapter;
pub use documents::{load_document, BackendDocumentAdapter};
pub use microphone::CommandAudioInput;
pub use playback::{CommandAudioOutput, NullAudioOutput};
pub use recognizer::CommandSpeechRecognizer;
pub use sst::BackendSstAdapter;
pub use tts::BackendTtsAdapter;
