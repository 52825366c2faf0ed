use crate::config::TtsConfig;
use crate::error::{Result, TtsError};
use crate::orchestrator::AudioStream;
use crate::transport::{Transport, WebSocketTransport};
use crate::types::{Endpoint, RequestDefaults};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Short phrase synthesized to check that credentials are accepted
pub const PROBE_TEXT: &str = "Hello!";

/// Streaming text-to-speech client for the binary websocket API
pub struct VolcTts<T: Transport = WebSocketTransport> {
    transport: T,
    endpoint: Endpoint,
}

impl VolcTts<WebSocketTransport> {
    pub fn new(endpoint: Endpoint) -> Self {
        Self::with_transport(endpoint, WebSocketTransport::new())
    }

    pub fn from_config(config: &TtsConfig) -> Result<Self> {
        Ok(Self::new(config.endpoint()?))
    }
}

impl<T: Transport> VolcTts<T> {
    pub fn with_transport(endpoint: Endpoint, transport: T) -> Self {
        Self {
            transport,
            endpoint,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Synthesize `text`, yielding one audio buffer per sentence chunk.
    ///
    /// Nothing touches the network until the stream is iterated.
    pub fn synthesize(
        &self,
        text: &str,
        voice: &str,
        defaults: &RequestDefaults,
    ) -> AudioStream<'_, T> {
        AudioStream::new(&self.transport, &self.endpoint, text, voice, defaults)
    }

    /// Stream all audio for `text` into `writer`, returning the bytes written
    pub fn synthesize_to_writer<W: Write>(
        &self,
        text: &str,
        voice: &str,
        defaults: &RequestDefaults,
        writer: &mut W,
    ) -> Result<usize> {
        let mut written = 0;
        for audio in self.synthesize(text, voice, defaults) {
            let audio = audio?;
            writer.write_all(&audio)?;
            written += audio.len();
        }
        writer.flush()?;
        Ok(written)
    }

    /// Save audio to file. The file is removed again if synthesis fails.
    pub fn save_audio(
        &self,
        text: &str,
        voice: &str,
        defaults: &RequestDefaults,
        path: impl AsRef<Path>,
    ) -> Result<usize> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);

        match self.synthesize_to_writer(text, voice, defaults, &mut writer) {
            Ok(written) => {
                log::info!("💾 Saved {} bytes of audio to {}", written, path.display());
                Ok(written)
            }
            Err(e) => {
                drop(writer);
                if let Err(remove_err) = std::fs::remove_file(path) {
                    log::warn!("Failed to remove {}: {}", path.display(), remove_err);
                }
                Err(e)
            }
        }
    }

    /// Check credentials by synthesizing a short probe phrase
    pub fn validate_credentials(&self, voice: &str, defaults: &RequestDefaults) -> Result<()> {
        log::info!("🔑 Validating credentials with voice {}", voice);

        for audio in self.synthesize(PROBE_TEXT, voice, defaults) {
            audio.map_err(|e| TtsError::CredentialsInvalid(e.to_string()))?;
        }

        log::info!("✅ Credentials accepted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::{audio_script, defaults, endpoint, ScriptedTransport};
    use tts_protocol::encode_error_response;

    #[test]
    fn test_synthesize_to_writer_concatenates_chunks() {
        let transport = ScriptedTransport::new(vec![
            audio_script(&[&b"ab"[..], &b"c"[..]]),
            audio_script(&[&b"def"[..]]),
        ]);
        let tts = VolcTts::with_transport(endpoint(), transport);
        let mut defaults = defaults();
        defaults.max_chunk_chars = 4;

        let mut out = Vec::new();
        let written = tts
            .synthesize_to_writer("One. Two.", "voice", &defaults, &mut out)
            .unwrap();

        assert_eq!(written, 6);
        assert_eq!(out, b"abcdef".to_vec());
    }

    #[test]
    fn test_validate_credentials_maps_failure() {
        let transport = ScriptedTransport::new(vec![vec![
            encode_error_response(45000001, "invalid token", false).unwrap(),
        ]]);
        let tts = VolcTts::with_transport(endpoint(), transport);

        match tts.validate_credentials("voice", &defaults()) {
            Err(TtsError::CredentialsInvalid(msg)) => {
                assert!(msg.contains("45000001"));
                assert!(msg.contains("invalid token"));
            }
            other => panic!("expected credentials error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_credentials_success() {
        let transport = ScriptedTransport::new(vec![audio_script(&[&b"hello"[..]])]);
        let tts = VolcTts::with_transport(endpoint(), transport);

        assert!(tts.validate_credentials("voice", &defaults()).is_ok());
        assert_eq!(tts.transport().log.borrow().connects, 1);
    }
}
