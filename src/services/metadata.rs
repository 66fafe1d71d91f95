use crate::api::{ApiResult, BackendClient, UploadError};
use crate::models::{SaveMaterialRequest, SaveMaterialResponse};
use async_trait::async_trait;

pub const SAVE_MATERIAL_PATH: &str = "/material/save";

/// Where an uploaded object lives and what it is.
#[derive(Debug, Clone)]
pub struct MaterialRecord<'a> {
    pub file_name: &'a str,
    pub file_size: u64,
    pub content_type: &'a str,
    pub bucket: &'a str,
    pub object_key: &'a str,
    pub url: &'a str,
}

/// Registers a stored object as a material so it shows up in the gallery.
#[async_trait]
pub trait MetadataRecorder: Send + Sync {
    /// Returns the backend's material id.
    async fn record(&self, record: &MaterialRecord<'_>, auth_token: &str) -> Result<u64, UploadError>;
}

pub struct HttpMetadataRecorder {
    client: BackendClient,
}

impl HttpMetadataRecorder {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MetadataRecorder for HttpMetadataRecorder {
    async fn record(&self, record: &MaterialRecord<'_>, auth_token: &str) -> Result<u64, UploadError> {
        let body = SaveMaterialRequest {
            file_name: record.file_name,
            file_size: record.file_size,
            content_type: record.content_type,
            bucket: record.bucket,
            key: record.object_key,
            url: record.url,
        };

        let envelope = self
            .client
            .post_json(SAVE_MATERIAL_PATH, auth_token, &body)
            .await?;

        match envelope.classify::<SaveMaterialResponse>() {
            Ok(ApiResult::Ok(saved)) => Ok(saved.material_id),
            Ok(ApiResult::AuthExpired) => Err(UploadError::AuthExpired),
            Ok(ApiResult::BusinessError { code, message }) => {
                // The object is already in the store and stays there unregistered.
                tracing::warn!(
                    "Material record denied for {}/{}: {} ({})",
                    record.bucket,
                    record.object_key,
                    message,
                    code
                );
                Err(UploadError::RecordDenied { code, message })
            }
            Err(e) => Err(UploadError::Transport(format!(
                "invalid save response: {}",
                e
            ))),
        }
    }
}
