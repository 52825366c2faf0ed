//! # TTS Protocol
//!
//! Binary frame codec for the streaming text-to-speech websocket protocol.
//!
//! This crate provides:
//! - The 4-byte frame [`Header`] and its nibble-packed enums
//! - Client request encoding ([`encode_request`]) and server frame decoding
//!   ([`decode_response`])
//! - The JSON request body ([`SynthesisRequest`])
//!
//! It performs no I/O; frames are handed to and taken from a transport by the
//! caller.
//!
//! ## Example Usage
//!
//! ```rust
//! use tts_protocol::{decode_response, encode_audio_response, ServerMessage};
//!
//! # fn main() -> Result<(), tts_protocol::ProtocolError> {
//! let frame = encode_audio_response(-1, &[0u8; 16])?;
//! match decode_response(&frame)? {
//!     ServerMessage::Audio { data, is_final, .. } => {
//!         assert!(is_final);
//!         assert_eq!(data.len(), 16);
//!     }
//!     other => panic!("unexpected {:?}", other),
//! }
//! # Ok(())
//! # }
//! ```

pub mod protocol;
pub mod request;

// Re-export commonly used types
pub use protocol::{
    decode_request, decode_response, encode_ack, encode_audio_response, encode_error_response,
    encode_frontend_response, encode_request, ClientRequest, Compression, Header, MessageType,
    ProtocolError, SequenceFlags, Serialization, ServerMessage,
};
pub use request::{AppInfo, AudioParams, RequestParams, SynthesisRequest, UserInfo};
