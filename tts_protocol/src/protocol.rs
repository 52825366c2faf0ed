use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Write};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub const PROTOCOL_VERSION: u8 = 0b0001;

/// Header size is expressed in words of this many bytes
pub const HEADER_WORD: usize = 4;

/// Sanity bound for a single frame (16MB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Message types carried in the high nibble of header byte 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    FullClientRequest,
    AudioOnlyResponse,
    FrontendResponse,
    ErrorResponse,
    Other(u8),
}

impl From<u8> for MessageType {
    fn from(value: u8) -> Self {
        match value & 0x0f {
            0x1 => MessageType::FullClientRequest,
            0xb => MessageType::AudioOnlyResponse,
            0xc => MessageType::FrontendResponse,
            0xf => MessageType::ErrorResponse,
            other => MessageType::Other(other),
        }
    }
}

impl MessageType {
    pub fn as_u8(self) -> u8 {
        match self {
            MessageType::FullClientRequest => 0x1,
            MessageType::AudioOnlyResponse => 0xb,
            MessageType::FrontendResponse => 0xc,
            MessageType::ErrorResponse => 0xf,
            MessageType::Other(value) => value & 0x0f,
        }
    }
}

/// Message-type-specific flags as used by audio responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceFlags {
    /// No sequence number, the frame is an acknowledgement
    None,
    /// Sequence number > 0, more data follows
    Positive,
    /// Last message from server
    LastMessage,
    /// Sequence number < 0, final audio frame
    Negative,
    Other(u8),
}

impl From<u8> for SequenceFlags {
    fn from(value: u8) -> Self {
        match value & 0x0f {
            0 => SequenceFlags::None,
            1 => SequenceFlags::Positive,
            2 => SequenceFlags::LastMessage,
            3 => SequenceFlags::Negative,
            other => SequenceFlags::Other(other),
        }
    }
}

impl SequenceFlags {
    pub fn as_u8(self) -> u8 {
        match self {
            SequenceFlags::None => 0,
            SequenceFlags::Positive => 1,
            SequenceFlags::LastMessage => 2,
            SequenceFlags::Negative => 3,
            SequenceFlags::Other(value) => value & 0x0f,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Serialization {
    None,
    Json,
    Custom,
    Other(u8),
}

impl From<u8> for Serialization {
    fn from(value: u8) -> Self {
        match value & 0x0f {
            0 => Serialization::None,
            1 => Serialization::Json,
            0xf => Serialization::Custom,
            other => Serialization::Other(other),
        }
    }
}

impl Serialization {
    pub fn as_u8(self) -> u8 {
        match self {
            Serialization::None => 0,
            Serialization::Json => 1,
            Serialization::Custom => 0xf,
            Serialization::Other(value) => value & 0x0f,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Custom,
    Other(u8),
}

impl From<u8> for Compression {
    fn from(value: u8) -> Self {
        match value & 0x0f {
            0 => Compression::None,
            1 => Compression::Gzip,
            0xf => Compression::Custom,
            other => Compression::Other(other),
        }
    }
}

impl Compression {
    pub fn as_u8(self) -> u8 {
        match self {
            Compression::None => 0,
            Compression::Gzip => 1,
            Compression::Custom => 0xf,
            Compression::Other(value) => value & 0x0f,
        }
    }
}

/// The 4-byte frame header.
///
/// Layout, one nibble per field unless noted:
///
/// ```text
/// byte 0: version | header size (in 4-byte words)
/// byte 1: message type | message-type-specific flags
/// byte 2: serialization | compression
/// byte 3: reserved
/// ```
///
/// A header size above 1 means extension words follow the fixed 4 bytes;
/// they are skipped by the decoder and zero-filled by the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    version: u8,
    header_size: u8,
    message_type: MessageType,
    flags: u8,
    serialization: Serialization,
    compression: Compression,
    reserved: u8,
}

impl Header {
    /// Single-word header with the current protocol version
    pub fn new(
        message_type: MessageType,
        flags: u8,
        serialization: Serialization,
        compression: Compression,
    ) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            header_size: 1,
            message_type,
            flags: flags & 0x0f,
            serialization,
            compression,
            reserved: 0,
        }
    }

    /// Header for a full client request with a JSON payload
    pub fn client_request(compress: bool) -> Self {
        let compression = if compress {
            Compression::Gzip
        } else {
            Compression::None
        };
        Self::new(
            MessageType::FullClientRequest,
            0,
            Serialization::Json,
            compression,
        )
    }

    /// Parse the header at the start of `frame`.
    ///
    /// Fails when the frame is shorter than the header claims to be.
    pub fn parse(frame: &[u8]) -> Result<Self, ProtocolError> {
        if frame.len() < HEADER_WORD {
            return Err(ProtocolError::MalformedFrame(format!(
                "frame of {} bytes is shorter than a header",
                frame.len()
            )));
        }

        let header = Self {
            version: frame[0] >> 4,
            header_size: frame[0] & 0x0f,
            message_type: MessageType::from(frame[1] >> 4),
            flags: frame[1] & 0x0f,
            serialization: Serialization::from(frame[2] >> 4),
            compression: Compression::from(frame[2] & 0x0f),
            reserved: frame[3],
        };

        if header.header_size == 0 {
            return Err(ProtocolError::MalformedFrame(
                "header size field is zero".to_string(),
            ));
        }
        if header.payload_offset() > frame.len() {
            return Err(ProtocolError::MalformedFrame(format!(
                "header declares {} bytes but frame has {}",
                header.payload_offset(),
                frame.len()
            )));
        }

        Ok(header)
    }

    /// Write the header, including zeroed extension words, to `buffer`
    pub fn write_to(&self, buffer: &mut Vec<u8>) {
        buffer.push((self.version << 4) | self.header_size);
        buffer.push((self.message_type.as_u8() << 4) | self.flags);
        buffer.push((self.serialization.as_u8() << 4) | self.compression.as_u8());
        buffer.push(self.reserved);
        buffer.resize(buffer.len() + self.payload_offset() - HEADER_WORD, 0);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.payload_offset());
        self.write_to(&mut bytes);
        bytes
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// Header size in 4-byte words
    pub fn header_size(&self) -> u8 {
        self.header_size
    }

    /// Byte offset at which the payload starts
    pub fn payload_offset(&self) -> usize {
        self.header_size as usize * HEADER_WORD
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// Raw message-type-specific flags nibble
    pub fn flags(&self) -> u8 {
        self.flags
    }

    pub fn sequence_flags(&self) -> SequenceFlags {
        SequenceFlags::from(self.flags)
    }

    pub fn serialization(&self) -> Serialization {
        self.serialization
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    pub fn reserved(&self) -> u8 {
        self.reserved
    }
}

/// A decoded server frame
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Nothing to append; keep reading. Frontend frames carry their metadata.
    Continue { metadata: Option<Vec<u8>> },
    /// Audio bytes; `is_final` is set when the sequence number is negative
    Audio {
        sequence: i32,
        data: Vec<u8>,
        is_final: bool,
    },
    /// Server-reported failure
    Error { code: u32, message: String },
}

/// A full client request as seen by the server
#[derive(Debug, Clone)]
pub struct ClientRequest {
    pub header: Header,
    /// JSON body, already decompressed
    pub payload: Vec<u8>,
}

impl ClientRequest {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

/// Encode a full client request frame:
/// `[header][u32 BE payload length][payload]`, payload = JSON, gzipped if `compress`.
pub fn encode_request<T: Serialize>(request: &T, compress: bool) -> Result<Vec<u8>, ProtocolError> {
    let json = serde_json::to_vec(request)?;
    let payload = if compress { gzip_compress(&json)? } else { json };

    let header = Header::client_request(compress);
    let mut frame = Vec::with_capacity(header.payload_offset() + 4 + payload.len());
    header.write_to(&mut frame);
    write_sized(&mut frame, &payload)?;

    Ok(frame)
}

/// Decode a full client request frame back into its header and JSON body
pub fn decode_request(frame: &[u8]) -> Result<ClientRequest, ProtocolError> {
    check_frame_size(frame)?;
    let header = Header::parse(frame)?;

    if header.message_type() != MessageType::FullClientRequest {
        return Err(ProtocolError::MalformedFrame(format!(
            "expected a full client request, got {:?}",
            header.message_type()
        )));
    }

    let mut reader = &frame[header.payload_offset()..];
    let body = read_sized(&mut reader, "request payload")?;
    let payload = match header.compression() {
        Compression::Gzip => gzip_decompress(body, "request payload")?,
        _ => body.to_vec(),
    };

    Ok(ClientRequest { header, payload })
}

/// Decode one server frame.
///
/// Only the lengths declared inside the frame are trusted; anything shorter
/// is reported as [`ProtocolError::MalformedFrame`].
pub fn decode_response(frame: &[u8]) -> Result<ServerMessage, ProtocolError> {
    check_frame_size(frame)?;
    let header = Header::parse(frame)?;
    let mut reader = &frame[header.payload_offset()..];

    match header.message_type() {
        MessageType::AudioOnlyResponse => {
            if header.sequence_flags() == SequenceFlags::None {
                debug!("📥 Audio ACK (no sequence number)");
                return Ok(ServerMessage::Continue { metadata: None });
            }

            let sequence = read_i32(&mut reader, "sequence number")?;
            let data = read_sized(&mut reader, "audio payload")?;
            if !reader.is_empty() {
                debug!("Ignoring {} bytes past declared audio size", reader.len());
            }

            Ok(ServerMessage::Audio {
                sequence,
                data: data.to_vec(),
                is_final: sequence < 0,
            })
        }
        MessageType::ErrorResponse => {
            let code = read_u32(&mut reader, "error code")?;
            let raw = read_sized(&mut reader, "error message")?;
            let message = match header.compression() {
                Compression::Gzip => gzip_decompress(raw, "error message")?,
                _ => raw.to_vec(),
            };

            Ok(ServerMessage::Error {
                code,
                message: String::from_utf8_lossy(&message).into_owned(),
            })
        }
        MessageType::FrontendResponse => {
            let raw = read_sized(&mut reader, "frontend payload")?;
            let metadata = match header.compression() {
                Compression::Gzip => gzip_decompress(raw, "frontend payload")?,
                _ => raw.to_vec(),
            };

            Ok(ServerMessage::Continue {
                metadata: Some(metadata),
            })
        }
        other => {
            debug!("Skipping frame with message type {:?}", other);
            Ok(ServerMessage::Continue { metadata: None })
        }
    }
}

/// Audio acknowledgement frame without a sequence number
pub fn encode_ack() -> Vec<u8> {
    Header::new(
        MessageType::AudioOnlyResponse,
        SequenceFlags::None.as_u8(),
        Serialization::None,
        Compression::None,
    )
    .to_bytes()
}

/// Audio frame. A negative `sequence` marks the final frame of a session.
pub fn encode_audio_response(sequence: i32, audio: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let flags = if sequence < 0 {
        SequenceFlags::Negative
    } else {
        SequenceFlags::Positive
    };
    let header = Header::new(
        MessageType::AudioOnlyResponse,
        flags.as_u8(),
        Serialization::None,
        Compression::None,
    );

    let mut frame = header.to_bytes();
    frame.extend_from_slice(&sequence.to_be_bytes());
    write_sized(&mut frame, audio)?;
    Ok(frame)
}

pub fn encode_error_response(
    code: u32,
    message: &str,
    compress: bool,
) -> Result<Vec<u8>, ProtocolError> {
    let (compression, body) = if compress {
        (Compression::Gzip, gzip_compress(message.as_bytes())?)
    } else {
        (Compression::None, message.as_bytes().to_vec())
    };
    let header = Header::new(
        MessageType::ErrorResponse,
        0,
        Serialization::Json,
        compression,
    );

    let mut frame = header.to_bytes();
    frame.extend_from_slice(&code.to_be_bytes());
    write_sized(&mut frame, &body)?;
    Ok(frame)
}

pub fn encode_frontend_response(metadata: &[u8], compress: bool) -> Result<Vec<u8>, ProtocolError> {
    let (compression, body) = if compress {
        (Compression::Gzip, gzip_compress(metadata)?)
    } else {
        (Compression::None, metadata.to_vec())
    };
    let header = Header::new(
        MessageType::FrontendResponse,
        0,
        Serialization::Json,
        compression,
    );

    let mut frame = header.to_bytes();
    write_sized(&mut frame, &body)?;
    Ok(frame)
}

pub fn gzip_compress(data: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decompress a gzip body. Failures are frame errors, not I/O errors.
pub fn gzip_decompress(data: &[u8], what: &str) -> Result<Vec<u8>, ProtocolError> {
    let mut decoded = Vec::new();
    GzDecoder::new(data)
        .take(MAX_FRAME_SIZE as u64 + 1)
        .read_to_end(&mut decoded)
        .map_err(|e| ProtocolError::MalformedFrame(format!("failed to decompress {}: {}", what, e)))?;

    if decoded.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::MalformedFrame(format!(
            "decompressed {} exceeds {} bytes",
            what, MAX_FRAME_SIZE
        )));
    }
    Ok(decoded)
}

fn check_frame_size(frame: &[u8]) -> Result<(), ProtocolError> {
    if frame.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::MalformedFrame(format!(
            "frame of {} bytes exceeds {} bytes",
            frame.len(),
            MAX_FRAME_SIZE
        )));
    }
    Ok(())
}

// Helpers for reading/writing big-endian fields

fn write_sized(buffer: &mut Vec<u8>, bytes: &[u8]) -> Result<(), ProtocolError> {
    if bytes.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::MalformedFrame(format!(
            "payload of {} bytes exceeds {} bytes",
            bytes.len(),
            MAX_FRAME_SIZE
        )));
    }
    buffer.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    buffer.extend_from_slice(bytes);
    Ok(())
}

fn read_word(reader: &mut &[u8], what: &str) -> Result<[u8; 4], ProtocolError> {
    if reader.len() < 4 {
        return Err(ProtocolError::MalformedFrame(format!(
            "{} needs 4 bytes, {} left",
            what,
            reader.len()
        )));
    }
    let word = [reader[0], reader[1], reader[2], reader[3]];
    *reader = &reader[4..];
    Ok(word)
}

fn read_u32(reader: &mut &[u8], what: &str) -> Result<u32, ProtocolError> {
    read_word(reader, what).map(u32::from_be_bytes)
}

fn read_i32(reader: &mut &[u8], what: &str) -> Result<i32, ProtocolError> {
    read_word(reader, what).map(i32::from_be_bytes)
}

/// Read a u32 size prefix followed by exactly that many bytes
fn read_sized<'a>(reader: &mut &'a [u8], what: &str) -> Result<&'a [u8], ProtocolError> {
    let len = read_u32(reader, what)? as usize;

    if reader.len() < len {
        return Err(ProtocolError::MalformedFrame(format!(
            "{} declares {} bytes but only {} present",
            what,
            len,
            reader.len()
        )));
    }

    let bytes = &reader[..len];
    *reader = &reader[len..];
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{AppInfo, AudioParams, RequestParams, SynthesisRequest, UserInfo};

    fn sample_request() -> SynthesisRequest {
        SynthesisRequest {
            app: AppInfo {
                appid: "appid".to_string(),
                token: "token".to_string(),
                cluster: "volcano_tts".to_string(),
            },
            user: UserInfo {
                uid: "uid".to_string(),
            },
            audio: AudioParams::new("BV001_streaming", "mp3"),
            request: RequestParams::submit("reqid", "你好，世界。"),
        }
    }

    #[test]
    fn test_header_size_from_first_byte() {
        let header = Header::parse(&[0x11, 0xb3, 0x00, 0x00]).unwrap();
        assert_eq!(header.version(), 1);
        assert_eq!(header.header_size(), 1);
        assert_eq!(header.payload_offset(), 4);
        assert_eq!(header.message_type(), MessageType::AudioOnlyResponse);
        assert_eq!(header.sequence_flags(), SequenceFlags::Negative);
    }

    #[test]
    fn test_client_request_header_bytes() {
        assert_eq!(Header::client_request(true).to_bytes(), vec![0x11, 0x10, 0x11, 0x00]);
        assert_eq!(Header::client_request(false).to_bytes(), vec![0x11, 0x10, 0x10, 0x00]);
    }

    #[test]
    fn test_header_rejects_bad_sizes() {
        assert!(matches!(
            Header::parse(&[0x11, 0xb0]),
            Err(ProtocolError::MalformedFrame(_))
        ));
        assert!(matches!(
            Header::parse(&[0x10, 0xb0, 0x00, 0x00]),
            Err(ProtocolError::MalformedFrame(_))
        ));
        // Two words declared, one present
        assert!(matches!(
            Header::parse(&[0x12, 0xb0, 0x00, 0x00, 0x00]),
            Err(ProtocolError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_extended_header_is_skipped() {
        let mut frame = vec![0x12, 0xb1, 0x00, 0x00, 0xde, 0xad, 0xbe, 0xef];
        frame.extend_from_slice(&5i32.to_be_bytes());
        frame.extend_from_slice(&2u32.to_be_bytes());
        frame.extend_from_slice(&[7, 8]);

        let message = decode_response(&frame).unwrap();
        assert_eq!(
            message,
            ServerMessage::Audio {
                sequence: 5,
                data: vec![7, 8],
                is_final: false
            }
        );
    }

    #[test]
    fn test_encode_request_round_trip() {
        for compress in [true, false] {
            let request = sample_request();
            let frame = encode_request(&request, compress).unwrap();

            let decoded = decode_request(&frame).unwrap();
            assert_eq!(decoded.header, Header::client_request(compress));
            assert_eq!(&frame[..4], decoded.header.to_bytes().as_slice());

            let declared = u32::from_be_bytes([frame[4], frame[5], frame[6], frame[7]]) as usize;
            assert_eq!(declared, frame.len() - 8);

            let json: SynthesisRequest = decoded.json().unwrap();
            assert_eq!(json, request);
        }
    }

    #[test]
    fn test_audio_ack_is_continue() {
        let message = decode_response(&encode_ack()).unwrap();
        assert_eq!(message, ServerMessage::Continue { metadata: None });
    }

    #[test]
    fn test_audio_frames() {
        let frame = encode_audio_response(1, &[1, 2, 3]).unwrap();
        assert_eq!(frame[1], 0xb1);
        assert_eq!(
            decode_response(&frame).unwrap(),
            ServerMessage::Audio {
                sequence: 1,
                data: vec![1, 2, 3],
                is_final: false
            }
        );

        let last = encode_audio_response(-1, &[4]).unwrap();
        assert_eq!(last[1], 0xb3);
        assert_eq!(
            decode_response(&last).unwrap(),
            ServerMessage::Audio {
                sequence: -1,
                data: vec![4],
                is_final: true
            }
        );
    }

    #[test]
    fn test_short_audio_payload_is_malformed() {
        let mut frame = encode_audio_response(2, &[1, 2, 3, 4]).unwrap();
        frame.truncate(frame.len() - 1);
        assert!(matches!(
            decode_response(&frame),
            Err(ProtocolError::MalformedFrame(_))
        ));

        // Sequence number cut off
        assert!(matches!(
            decode_response(&[0x11, 0xb1, 0x00, 0x00, 0x00, 0x00]),
            Err(ProtocolError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_error_frame_plain_and_gzip() {
        for compress in [false, true] {
            let frame = encode_error_response(45000001, "invalid token", compress).unwrap();
            assert_eq!(
                decode_response(&frame).unwrap(),
                ServerMessage::Error {
                    code: 45000001,
                    message: "invalid token".to_string()
                }
            );
        }
    }

    #[test]
    fn test_error_frame_bad_gzip_is_malformed() {
        let mut frame = Header::new(
            MessageType::ErrorResponse,
            0,
            Serialization::Json,
            Compression::Gzip,
        )
        .to_bytes();
        frame.extend_from_slice(&3001u32.to_be_bytes());
        frame.extend_from_slice(&4u32.to_be_bytes());
        frame.extend_from_slice(b"nope");

        match decode_response(&frame) {
            Err(ProtocolError::MalformedFrame(msg)) => assert!(msg.contains("error message")),
            other => panic!("expected malformed frame, got {:?}", other),
        }
    }

    #[test]
    fn test_frontend_frame_carries_metadata() {
        let metadata = br#"{"phonemes":[]}"#;
        let frame = encode_frontend_response(metadata, true).unwrap();
        assert_eq!(
            decode_response(&frame).unwrap(),
            ServerMessage::Continue {
                metadata: Some(metadata.to_vec())
            }
        );
    }

    #[test]
    fn test_unknown_message_type_is_continue() {
        let frame = [0x11, 0x90, 0x10, 0x00, 0xff];
        assert_eq!(
            decode_response(&frame).unwrap(),
            ServerMessage::Continue { metadata: None }
        );
    }

    #[test]
    fn test_decode_request_rejects_server_frames() {
        let frame = encode_audio_response(1, &[0]).unwrap();
        assert!(decode_request(&frame).is_err());
    }
}
