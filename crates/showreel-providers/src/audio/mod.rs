pub mod elevenlabs;
pub mod openai_tts;
pub mod stubs;

pub use elevenlabs::ElevenLabsProvider;
pub use openai_tts::OpenAiTtsProvider;
pub use stubs::StubAudioProvider;
