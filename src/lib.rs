pub mod config;
pub mod error;
pub mod llm;
pub mod playback;
pub mod script;
pub mod server;
pub mod session;
pub mod setup;
pub mod state;
pub mod tts;
