pub mod chat;

pub use chat::{
    ChatForm, ChatRequest, ChatResponse, PreferencesForm, TranscriptResponse, TurnDto,
    MAX_MESSAGE_CHARS,
};
