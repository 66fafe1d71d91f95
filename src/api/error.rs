use thiserror::Error;

/// Fallback shown when the credential endpoint rejects without a message.
pub const CREDENTIAL_DENIED_FALLBACK: &str = "获取上传凭证失败";
/// Fallback shown when the save endpoint rejects without a message.
pub const RECORD_DENIED_FALLBACK: &str = "保存文件信息失败";

#[derive(Error, Debug)]
pub enum UploadError {
    /// No usable response from the backend.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Credential denied ({code}): {message}")]
    CredentialDenied { code: i64, message: String },

    #[error("Record denied ({code}): {message}")]
    RecordDenied { code: i64, message: String },

    #[error("token expired")]
    AuthExpired,

    #[error("Store transfer error: {0}")]
    StoreTransfer(String),
}

impl UploadError {
    /// Text shown after `失败: ` on the failed task's progress row.
    pub fn detail(&self) -> String {
        match self {
            UploadError::Transport(msg) | UploadError::StoreTransfer(msg) => msg.clone(),
            UploadError::CredentialDenied { message, .. } => {
                non_empty_or(message, CREDENTIAL_DENIED_FALLBACK)
            }
            UploadError::RecordDenied { message, .. } => non_empty_or(message, RECORD_DENIED_FALLBACK),
            UploadError::AuthExpired => "token expired".to_string(),
        }
    }

    /// Auth expiry ends the whole batch, every other error only the task.
    pub fn is_pipeline_fatal(&self) -> bool {
        matches!(self, UploadError::AuthExpired)
    }
}

fn non_empty_or(message: &str, fallback: &str) -> String {
    if message.is_empty() {
        fallback.to_string()
    } else {
        message.to_string()
    }
}

impl From<reqwest::Error> for UploadError {
    fn from(e: reqwest::Error) -> Self {
        UploadError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denied_detail_is_backend_message_verbatim() {
        let err = UploadError::CredentialDenied {
            code: 5001,
            message: "quota exceeded".to_string(),
        };
        assert_eq!(err.detail(), "quota exceeded");
    }

    #[test]
    fn test_denied_detail_falls_back_when_empty() {
        let credential = UploadError::CredentialDenied {
            code: 1,
            message: String::new(),
        };
        let record = UploadError::RecordDenied {
            code: 1,
            message: String::new(),
        };
        assert_eq!(credential.detail(), CREDENTIAL_DENIED_FALLBACK);
        assert_eq!(record.detail(), RECORD_DENIED_FALLBACK);
    }

    #[test]
    fn test_only_auth_expired_is_fatal() {
        assert!(UploadError::AuthExpired.is_pipeline_fatal());
        assert!(!UploadError::Transport("down".into()).is_pipeline_fatal());
        assert!(!UploadError::StoreTransfer("reset".into()).is_pipeline_fatal());
    }
}
