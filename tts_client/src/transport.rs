use crate::error::{Result, TtsError};
use http::header::{HeaderName, HeaderValue};
use std::net::TcpStream;
use std::ops::{Deref, DerefMut};
use tungstenite::client::IntoClientRequest;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

/// Opens message-oriented connections to the synthesis service
pub trait Transport {
    type Connection: Connection;

    fn connect(&self, url: &str, headers: &[(String, String)]) -> Result<Self::Connection>;
}

/// One open, blocking, frame-oriented connection
pub trait Connection {
    fn send(&mut self, frame: Vec<u8>) -> Result<()>;

    /// Block until the next binary frame arrives.
    /// A connection closed by the peer is an error.
    fn receive(&mut self) -> Result<Vec<u8>>;

    fn close(&mut self) -> Result<()>;
}

/// Closes the wrapped connection when dropped unless it was closed explicitly
pub struct ConnectionGuard<C: Connection> {
    inner: C,
    closed: bool,
}

impl<C: Connection> ConnectionGuard<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            closed: false,
        }
    }

    pub fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.inner.close()
    }
}

impl<C: Connection> Deref for ConnectionGuard<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.inner
    }
}

impl<C: Connection> DerefMut for ConnectionGuard<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.inner
    }
}

impl<C: Connection> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            if let Err(e) = self.inner.close() {
                log::warn!("Failed to close connection: {}", e);
            }
        }
    }
}

/// Blocking WebSocket transport using tungstenite (not tokio-tungstenite)
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;

    fn connect(&self, url: &str, headers: &[(String, String)]) -> Result<WebSocketConnection> {
        let mut request = url.into_client_request()?;

        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TtsError::Config(format!("Invalid header name '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TtsError::Config(format!("Invalid value for header {}: {}", name.as_str(), e)))?;
            request.headers_mut().insert(name, value);
        }

        log::debug!("🔗 Connecting to TTS WebSocket: {}", url);
        let (ws, response) = tungstenite::connect(request)
            .map_err(|e| TtsError::Transport(format!("Failed to connect to {}: {}", url, e)))?;
        log::debug!("✅ WebSocket connected, status: {}", response.status());

        Ok(WebSocketConnection { ws })
    }
}

pub struct WebSocketConnection {
    ws: WebSocket<MaybeTlsStream<TcpStream>>,
}

impl Connection for WebSocketConnection {
    fn send(&mut self, frame: Vec<u8>) -> Result<()> {
        let len = frame.len();
        self.ws
            .send(Message::Binary(frame))
            .map_err(|e| TtsError::Transport(format!("Send failed: {}", e)))?;
        log::trace!("📤 Sent {} bytes", len);
        Ok(())
    }

    fn receive(&mut self) -> Result<Vec<u8>> {
        loop {
            match self.ws.read() {
                Ok(Message::Binary(data)) => {
                    log::trace!("📥 Received {} bytes", data.len());
                    return Ok(data);
                }
                Ok(Message::Text(text)) => {
                    log::debug!("📨 Ignoring text message: {}", text);
                }
                Ok(Message::Close(frame)) => {
                    log::info!("🔚 Server closed WebSocket connection");
                    return Err(TtsError::Transport(match frame {
                        Some(frame) => format!(
                            "connection closed by server ({}): {}",
                            frame.code, frame.reason
                        ),
                        None => "connection closed by server".to_string(),
                    }));
                }
                Ok(_) => {
                    // Ping/pong; tungstenite queues pong replies itself
                }
                Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                    return Err(TtsError::Transport(
                        "connection closed before final frame".to_string(),
                    ));
                }
                Err(e) => {
                    log::warn!("❌ WebSocket read error: {}", e);
                    return Err(TtsError::Transport(format!("Read failed: {}", e)));
                }
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        match self.ws.close(None) {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed)
            | Err(tungstenite::Error::AlreadyClosed) => {
                log::debug!("🔚 WebSocket closed");
                Ok(())
            }
            Err(e) => Err(TtsError::Transport(format!("Close failed: {}", e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingConnection {
        closes: Arc<AtomicUsize>,
    }

    impl Connection for CountingConnection {
        fn send(&mut self, _frame: Vec<u8>) -> Result<()> {
            Ok(())
        }

        fn receive(&mut self) -> Result<Vec<u8>> {
            Err(TtsError::Transport("nothing to read".to_string()))
        }

        fn close(&mut self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_guard_closes_on_drop() {
        let closes = Arc::new(AtomicUsize::new(0));
        {
            let _guard = ConnectionGuard::new(CountingConnection {
                closes: Arc::clone(&closes),
            });
        }
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_guard_closes_once_after_explicit_close() {
        let closes = Arc::new(AtomicUsize::new(0));
        {
            let mut guard = ConnectionGuard::new(CountingConnection {
                closes: Arc::clone(&closes),
            });
            guard.send(vec![1]).unwrap();
            guard.close().unwrap();
        }
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_connect_refused_is_transport_failure() {
        // Port 1 on localhost is not listening
        let result = WebSocketTransport::new().connect("ws://127.0.0.1:1/api", &[]);
        assert!(matches!(result, Err(TtsError::Transport(_))));
    }
}
