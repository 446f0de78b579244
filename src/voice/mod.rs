//! Voice module
//!
//! Picks the reply voice and hosts the speech adapters: transcription of
//! the incoming utterance and synthesis of the generated reply.

mod selector;
pub mod stt;
pub mod tts;

pub use selector::{
    DEFAULT_SCOLD_KEYWORDS, Tier, VoiceChoice, VoiceProfile, VoiceSelector, VoiceTier,
    is_placeholder,
};
pub use stt::SpeechToText;
pub use tts::TextToSpeech;
