use crate::api::{ApiResult, BackendClient, UploadError};
use crate::models::{UploadCredential, UploadTokenRequest};
use async_trait::async_trait;

pub const UPLOAD_TOKEN_PATH: &str = "/material/upload-token";

/// Obtains a scoped, single-object write credential from the backend.
#[async_trait]
pub trait CredentialRequester: Send + Sync {
    async fn request_credential(
        &self,
        file_name: &str,
        file_size: u64,
        content_type: &str,
        auth_token: &str,
    ) -> Result<UploadCredential, UploadError>;
}

pub struct HttpCredentialRequester {
    client: BackendClient,
}

impl HttpCredentialRequester {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CredentialRequester for HttpCredentialRequester {
    async fn request_credential(
        &self,
        file_name: &str,
        file_size: u64,
        content_type: &str,
        auth_token: &str,
    ) -> Result<UploadCredential, UploadError> {
        let body = UploadTokenRequest {
            file_name,
            file_size,
            content_type,
        };

        let envelope = self
            .client
            .post_json(UPLOAD_TOKEN_PATH, auth_token, &body)
            .await?;

        match envelope.classify::<UploadCredential>() {
            Ok(ApiResult::Ok(credential)) => {
                tracing::debug!(
                    "Credential issued for {} -> {}/{}",
                    file_name,
                    credential.bucket,
                    credential.object_key
                );
                Ok(credential)
            }
            Ok(ApiResult::AuthExpired) => Err(UploadError::AuthExpired),
            Ok(ApiResult::BusinessError { code, message }) => {
                tracing::warn!("Credential denied for {}: {} ({})", file_name, message, code);
                Err(UploadError::CredentialDenied { code, message })
            }
            Err(e) => Err(UploadError::Transport(format!(
                "invalid upload credential: {}",
                e
            ))),
        }
    }
}
