use crate::api::{ApiResult, BackendClient, UploadError};
use crate::models::{MaterialInfo, MaterialListResponse};
use crate::services::session::SessionHandler;
use async_trait::async_trait;
use std::sync::Arc;

pub const MATERIAL_LIST_PATH: &str = "/material/list";

/// Collaborating gallery view, told to reload after a batch finishes.
#[async_trait]
pub trait GalleryRefresher: Send + Sync {
    async fn refresh(&self);
}

/// Reloads the material listing from the backend.
pub struct MaterialGallery {
    client: BackendClient,
    session: Arc<dyn SessionHandler>,
}

impl MaterialGallery {
    pub fn new(client: BackendClient, session: Arc<dyn SessionHandler>) -> Self {
        Self { client, session }
    }

    pub async fn list(&self) -> Result<Vec<MaterialInfo>, UploadError> {
        let token = self.session.token().ok_or(UploadError::AuthExpired)?;
        let envelope = self.client.get_json(MATERIAL_LIST_PATH, &token).await?;

        match envelope.classify::<MaterialListResponse>() {
            Ok(ApiResult::Ok(list)) => Ok(list.materials),
            Ok(ApiResult::AuthExpired) => Err(UploadError::AuthExpired),
            Ok(ApiResult::BusinessError { code, message }) => Err(UploadError::Transport(format!(
                "material list rejected ({}): {}",
                code, message
            ))),
            Err(e) => Err(UploadError::Transport(format!(
                "invalid material list: {}",
                e
            ))),
        }
    }
}

#[async_trait]
impl GalleryRefresher for MaterialGallery {
    async fn refresh(&self) {
        match self.list().await {
            Ok(materials) => tracing::info!("🖼️  Gallery refreshed: {} material(s)", materials.len()),
            Err(UploadError::AuthExpired) => {
                let login_url = self.session.expire();
                tracing::warn!("Gallery refresh needs a new login at {}", login_url);
            }
            Err(e) => tracing::error!("Gallery refresh failed: {}", e),
        }
    }
}
