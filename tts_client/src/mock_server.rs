//! Scripted WebSocket server speaking the binary TTS protocol.
//!
//! Used by integration tests and the `mock_tts_server` binary to exercise the
//! client without the real service. Connections are served one at a time.

use log::{debug, info, warn};
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tts_protocol::{
    decode_request, encode_ack, encode_audio_response, encode_frontend_response, Header,
    SynthesisRequest,
};
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::Message;

/// Produces the reply frames for a request, given the 0-based connection index
pub type Responder = Arc<dyn Fn(usize, &SynthesisRequest) -> Vec<Vec<u8>> + Send + Sync>;

/// A request as received by the mock server
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub authorization: Option<String>,
    pub header: Header,
    pub request: SynthesisRequest,
}

/// Replies with an ACK, a frontend frame and the request text's bytes as
/// "audio", split over two frames with the last one marked final.
pub fn echo_responder() -> Responder {
    Arc::new(|_: usize, request: &SynthesisRequest| {
        let audio = request.request.text.as_bytes();
        let mid = audio.len() / 2;

        let mut frames = vec![encode_ack()];
        if let Ok(frame) = encode_frontend_response(br#"{"duration":0}"#, true) {
            frames.push(frame);
        }
        for (sequence, part) in [(1, &audio[..mid]), (-2, &audio[mid..])] {
            if let Ok(frame) = encode_audio_response(sequence, part) {
                frames.push(frame);
            }
        }
        frames
    })
}

pub struct MockTtsServer {
    listener: TcpListener,
    responder: Responder,
}

impl MockTtsServer {
    /// Bind to `address` (use "127.0.0.1:0" for a random port)
    pub fn bind(address: &str, responder: Responder) -> io::Result<Self> {
        let listener = TcpListener::bind(address)?;
        Ok(Self {
            listener,
            responder,
        })
    }

    /// Start serving on a background thread
    pub fn start(self) -> io::Result<MockServerHandle> {
        let address = self.listener.local_addr()?;
        let should_stop = Arc::new(AtomicBool::new(false));
        let connections = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let thread_stop = Arc::clone(&should_stop);
        let thread_connections = Arc::clone(&connections);
        let thread_requests = Arc::clone(&requests);
        let listener = self.listener;
        let responder = self.responder;

        let handle = thread::spawn(move || {
            info!("🎙️ Mock TTS server listening on {}", address);

            for stream in listener.incoming() {
                if thread_stop.load(Ordering::SeqCst) {
                    break;
                }
                match stream {
                    Ok(stream) => {
                        let index = thread_connections.fetch_add(1, Ordering::SeqCst);
                        if let Err(e) =
                            handle_client(stream, index, &responder, &thread_requests)
                        {
                            warn!("❌ Mock client {} error: {}", index, e);
                        }
                    }
                    Err(e) => warn!("❌ Accept error: {}", e),
                }
            }

            info!("🛑 Mock TTS server stopped");
        });

        Ok(MockServerHandle {
            address,
            should_stop,
            connections,
            requests,
            handle: Some(handle),
        })
    }
}

fn handle_client(
    stream: TcpStream,
    index: usize,
    responder: &Responder,
    requests: &Mutex<Vec<RecordedRequest>>,
) -> Result<(), String> {
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .map_err(|e| e.to_string())?;

    let mut authorization = None;
    let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        authorization = request
            .headers()
            .get("Authorization")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        Ok(response)
    };
    let mut ws = tungstenite::accept_hdr(stream, callback).map_err(|e| e.to_string())?;

    let frame = loop {
        match ws.read().map_err(|e| e.to_string())? {
            Message::Binary(frame) => break frame,
            Message::Close(_) => return Ok(()),
            _ => continue,
        }
    };

    let client_request = decode_request(&frame).map_err(|e| e.to_string())?;
    let request: SynthesisRequest = client_request.json().map_err(|e| e.to_string())?;
    debug!(
        "📥 Mock request {}: '{}'",
        request.request.reqid, request.request.text
    );

    let replies = responder(index, &request);
    if let Ok(mut recorded) = requests.lock() {
        recorded.push(RecordedRequest {
            authorization,
            header: client_request.header,
            request,
        });
    }

    for reply in replies {
        ws.send(Message::Binary(reply)).map_err(|e| e.to_string())?;
    }

    // Hang up; a client still waiting for a final frame sees the close
    if let Err(e) = ws.close(None) {
        debug!("Mock server close failed: {}", e);
    }
    while ws.read().is_ok() {}
    Ok(())
}

/// Running mock server; stops when dropped
pub struct MockServerHandle {
    address: SocketAddr,
    should_stop: Arc<AtomicBool>,
    connections: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: Option<JoinHandle<()>>,
}

impl MockServerHandle {
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Host string for [`crate::types::Endpoint::new`]
    pub fn host(&self) -> String {
        format!("ws://{}", self.address)
    }

    /// Connections accepted so far
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|recorded| recorded.clone())
            .unwrap_or_default()
    }

    pub fn stop(&mut self) {
        self.should_stop.store(true, Ordering::SeqCst);
        // Wake the accept loop
        let _ = TcpStream::connect(self.address);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MockServerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
