use serde::{Deserialize, Serialize};

pub const TEXT_TYPE_PLAIN: &str = "plain";
pub const OPERATION_SUBMIT: &str = "submit";

/// JSON body of a full client request.
///
/// Built fresh for every text chunk and dropped once encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisRequest {
    pub app: AppInfo,
    pub user: UserInfo,
    pub audio: AudioParams,
    pub request: RequestParams,
}

/// Application identity issued by the vendor console
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppInfo {
    pub appid: String,
    pub token: String,
    pub cluster: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub uid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioParams {
    pub voice_type: String,
    pub encoding: String,
    pub speed_ratio: f64,
    pub volume_ratio: f64,
    pub pitch_ratio: f64,
}

impl AudioParams {
    /// Audio parameters with neutral speed, volume and pitch
    pub fn new(voice_type: impl Into<String>, encoding: impl Into<String>) -> Self {
        Self {
            voice_type: voice_type.into(),
            encoding: encoding.into(),
            speed_ratio: 1.0,
            volume_ratio: 1.0,
            pitch_ratio: 1.0,
        }
    }
}

/// Per-chunk fields of the request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestParams {
    pub reqid: String,
    pub text: String,
    pub text_type: String,
    pub operation: String,
}

impl RequestParams {
    /// Plain-text submit operation for one chunk
    pub fn submit(reqid: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            reqid: reqid.into(),
            text: text.into(),
            text_type: TEXT_TYPE_PLAIN.to_string(),
            operation: OPERATION_SUBMIT.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serializes_to_vendor_layout() {
        let request = SynthesisRequest {
            app: AppInfo {
                appid: "app".to_string(),
                token: "tok".to_string(),
                cluster: "volcano_tts".to_string(),
            },
            user: UserInfo {
                uid: "user-1".to_string(),
            },
            audio: AudioParams::new("BV001_streaming", "mp3"),
            request: RequestParams::submit("req-1", "Hello."),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "app": {"appid": "app", "token": "tok", "cluster": "volcano_tts"},
                "user": {"uid": "user-1"},
                "audio": {
                    "voice_type": "BV001_streaming",
                    "encoding": "mp3",
                    "speed_ratio": 1.0,
                    "volume_ratio": 1.0,
                    "pitch_ratio": 1.0
                },
                "request": {
                    "reqid": "req-1",
                    "text": "Hello.",
                    "text_type": "plain",
                    "operation": "submit"
                }
            })
        );
    }
}
