use crate::error::{Result, TtsError};
use secrecy::{ExposeSecret, SecretBox};
use tts_protocol::{AppInfo, AudioParams, RequestParams, SynthesisRequest, UserInfo};
use url::Url;

/// Path of the binary websocket API under the endpoint host
pub const TTS_WS_PATH: &str = "/api/v1/tts/ws_binary";

/// Where and how to connect: websocket URL plus bearer token
#[derive(Debug)]
pub struct Endpoint {
    url: Url,
    token: SecretBox<String>,
}

impl Endpoint {
    /// Build the endpoint from a host such as `wss://openspeech.bytedance.com`
    pub fn new(host: &str, token: &str) -> Result<Self> {
        let url = Url::parse(&format!("{}{}", host.trim_end_matches('/'), TTS_WS_PATH))
            .map_err(|e| TtsError::Config(format!("Invalid endpoint host '{}': {}", host, e)))?;

        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(TtsError::Config(format!(
                    "Endpoint scheme must be ws or wss, got '{}'",
                    other
                )))
            }
        }

        Ok(Self {
            url,
            token: SecretBox::new(Box::new(token.to_string())),
        })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Handshake headers. The vendor expects `Bearer;` with a semicolon.
    pub fn headers(&self) -> Vec<(String, String)> {
        vec![(
            "Authorization".to_string(),
            format!("Bearer; {}", self.token.expose_secret()),
        )]
    }
}

/// Everything a request needs besides the voice and the text itself
#[derive(Debug, Clone)]
pub struct RequestDefaults {
    pub app: AppInfo,
    /// Stable user id; a random one is generated per synthesis call when unset
    pub uid: Option<String>,
    pub encoding: String,
    pub speed_ratio: f64,
    pub volume_ratio: f64,
    pub pitch_ratio: f64,
    /// Maximum characters per text chunk
    pub max_chunk_chars: usize,
    /// Gzip the request payload
    pub compress: bool,
}

impl RequestDefaults {
    pub fn new(app: AppInfo) -> Self {
        Self {
            app,
            uid: None,
            encoding: "mp3".to_string(),
            speed_ratio: 1.0,
            volume_ratio: 1.0,
            pitch_ratio: 1.0,
            max_chunk_chars: 1024,
            compress: true,
        }
    }

    /// Build the request for one chunk with a fresh request id
    pub fn build_request(&self, voice: &str, uid: &str, text: &str) -> SynthesisRequest {
        let mut audio = AudioParams::new(voice, self.encoding.as_str());
        audio.speed_ratio = self.speed_ratio;
        audio.volume_ratio = self.volume_ratio;
        audio.pitch_ratio = self.pitch_ratio;

        SynthesisRequest {
            app: self.app.clone(),
            user: UserInfo {
                uid: uid.to_string(),
            },
            audio,
            request: RequestParams::submit(uuid::Uuid::new_v4().to_string(), text),
        }
    }
}
