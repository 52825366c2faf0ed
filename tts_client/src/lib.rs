//! Blocking client for the streaming text-to-speech websocket API.
//!
//! Text is split into sentence chunks that fit the service limit, each chunk
//! is synthesized over its own websocket connection, and the audio comes back
//! as a lazy sequence of buffers in chunk order.
//!
//! ```rust,no_run
//! use tts_client::config::load_config;
//! use tts_client::VolcTts;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config()?;
//! let tts = VolcTts::from_config(&config)?;
//! let defaults = config.request_defaults();
//!
//! for audio in tts.synthesize("Hello there. How are you?", &config.voice, &defaults) {
//!     let audio = audio?;
//!     println!("Received {} bytes", audio.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod mock_server;
pub mod orchestrator;
pub mod segmenter;
pub mod session;
pub mod transport;
pub mod tts;
pub mod types;

// Re-export common types
pub use error::{Result, TtsError};
pub use orchestrator::AudioStream;
pub use segmenter::split_sentences;
pub use session::{SessionState, SynthesisSession};
pub use transport::{Connection, Transport, WebSocketTransport};
pub use tts::VolcTts;
pub use types::{Endpoint, RequestDefaults};
