pub mod catalog;
pub mod domain;
pub mod ports;

pub use catalog::{model_label, Preset, GREETING, IDLE_STATUS, MODEL_NAMES};
pub use domain::{
    AudioClip, ChatReply, ChatRequest, ConversationMessage, DocumentUpload, GenerationSettings,
    HistoryEntry, PresetSelection, RecognitionEvent, Sender, Source, TranscriptionReply,
    UploadReceipt, VoicePreferences,
};
pub use ports::{
    AudioInput, AudioOutput, AudioStream, ChatCompletionService, DocumentService, PortError,
    PortResult, RecognitionStream, SpeechRecognizer, SpeechToTextService, TextToSpeechService,
};
