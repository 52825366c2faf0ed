use crate::error::{Result, TtsError};
use crate::transport::{Connection, ConnectionGuard, Transport};
use crate::types::Endpoint;
use tts_protocol::{decode_response, encode_request, ServerMessage, SynthesisRequest};

/// Lifecycle of one synthesis exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Sending,
    Receiving,
    Done,
    Failed,
}

/// One request/response exchange that turns a single text chunk into audio.
///
/// The session opens its own connection, sends one full client request and
/// drains frames until the final audio frame or an error. Audio is returned
/// only on success; on failure the accumulated bytes are dropped.
pub struct SynthesisSession<'a, T: Transport> {
    transport: &'a T,
    endpoint: &'a Endpoint,
    compress: bool,
    state: SessionState,
}

impl<'a, T: Transport> SynthesisSession<'a, T> {
    pub fn new(transport: &'a T, endpoint: &'a Endpoint, compress: bool) -> Self {
        Self {
            transport,
            endpoint,
            compress,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the exchange to completion. A session runs at most once.
    pub fn run(&mut self, request: &SynthesisRequest) -> Result<Vec<u8>> {
        if self.state != SessionState::Idle {
            return Err(TtsError::Config(format!(
                "synthesis session already ran (state {:?})",
                self.state
            )));
        }

        match self.exchange(request) {
            Ok(audio) => {
                self.state = SessionState::Done;
                log::debug!(
                    "✅ Session {} done: {} bytes of audio",
                    request.request.reqid,
                    audio.len()
                );
                Ok(audio)
            }
            Err(e) => {
                self.state = SessionState::Failed;
                log::warn!("❌ Session {} failed: {}", request.request.reqid, e);
                Err(e)
            }
        }
    }

    fn exchange(&mut self, request: &SynthesisRequest) -> Result<Vec<u8>> {
        self.state = SessionState::Sending;
        let frame = encode_request(request, self.compress)?;

        let connection = self
            .transport
            .connect(self.endpoint.url(), &self.endpoint.headers())?;
        let mut connection = ConnectionGuard::new(connection);

        log::debug!(
            "📤 Sending request {} ({} bytes)",
            request.request.reqid,
            frame.len()
        );
        connection.send(frame)?;

        self.state = SessionState::Receiving;
        let mut audio = Vec::new();
        let mut frames = 0usize;

        loop {
            let frame = connection.receive()?;
            frames += 1;

            match decode_response(&frame)? {
                ServerMessage::Continue { metadata } => {
                    if let Some(metadata) = metadata {
                        log::debug!("📥 Frontend metadata: {} bytes", metadata.len());
                    }
                }
                ServerMessage::Audio {
                    sequence,
                    data,
                    is_final,
                } => {
                    log::debug!(
                        "📥 Audio frame {} (seq {}): {} bytes",
                        frames,
                        sequence,
                        data.len()
                    );
                    audio.extend_from_slice(&data);
                    if is_final {
                        break;
                    }
                }
                ServerMessage::Error { code, message } => {
                    log::error!("❌ Server error {}: {}", code, message);
                    return Err(TtsError::Server { code, message });
                }
            }
        }

        // The audio is complete at this point; a failed close does not void it
        if let Err(e) = connection.close() {
            log::warn!("Failed to close connection cleanly: {}", e);
        }

        Ok(audio)
    }
}
