use thiserror::Error;
use tts_protocol::ProtocolError;

#[derive(Error, Debug)]
pub enum TtsError {
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Server error {code}: {message}")]
    Server { code: u32, message: String },

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Credentials validation failed: {0}")]
    CredentialsInvalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TtsError>;

impl From<ProtocolError> for TtsError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::MalformedFrame(msg) => TtsError::MalformedFrame(msg),
            ProtocolError::Serialization(e) => TtsError::Serialization(e.to_string()),
            ProtocolError::Io(e) => TtsError::Io(e),
        }
    }
}

impl From<tungstenite::Error> for TtsError {
    fn from(err: tungstenite::Error) -> Self {
        TtsError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_errors_keep_their_kind() {
        let io = ProtocolError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "gzip encoder failed",
        ));
        assert!(matches!(TtsError::from(io), TtsError::Io(_)));

        let json = serde_json::from_str::<u32>("not json").unwrap_err();
        assert!(matches!(
            TtsError::from(ProtocolError::Serialization(json)),
            TtsError::Serialization(_)
        ));

        let malformed = ProtocolError::MalformedFrame("short".to_string());
        assert!(matches!(TtsError::from(malformed), TtsError::MalformedFrame(_)));
    }
}
