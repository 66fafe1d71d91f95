use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use uuid::Uuid;

/// A file selected for upload. The content type is whatever the caller
/// declared; it is never checked against the bytes.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, content_type: Option<String>, body: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type,
            body: body.into(),
        }
    }

    /// Reads a file from disk. The declared content type is sniffed from the
    /// leading bytes with `infer`; unknown formats stay undeclared.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let content_type = infer::get(&data).map(|k| k.mime_type().to_string());
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self::new(name, content_type, data))
    }

    pub fn size(&self) -> u64 {
        self.body.len() as u64
    }

    /// Declared content type, or `fallback` when none was declared.
    pub fn content_type_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        match self.content_type.as_deref() {
            Some(ct) if !ct.is_empty() => ct,
            _ => fallback,
        }
    }
}

/// Write-scoped object store credential for exactly one object.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadCredential {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub bucket: String,
    #[serde(rename = "key")]
    pub object_key: String,
    pub endpoint: String,
}

impl UploadCredential {
    /// Public location of the object, as stored in the material record.
    pub fn object_url(&self) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint.trim_end_matches('/'),
            self.bucket,
            self.object_key
        )
    }
}

impl fmt::Debug for UploadCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadCredential")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("object_key", &self.object_key)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Store-side acknowledgement of a completed write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreReceipt {
    pub e_tag: Option<String>,
    pub version_id: Option<String>,
}

/// Byte counts reported while a transfer is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub loaded: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TaskStatus {
    Pending,
    RequestingCredential,
    Transferring,
    Recording,
    Succeeded,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }

    /// True while one of the three network steps owns the task.
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            TaskStatus::RequestingCredential | TaskStatus::Transferring | TaskStatus::Recording
        )
    }
}

/// One file's progression through the upload pipeline.
#[derive(Debug)]
pub struct UploadTask {
    pub id: Uuid,
    pub file: UploadFile,
    pub status: TaskStatus,
    pub progress_percent: u8,
    pub status_message: String,
    pub credential: Option<UploadCredential>,
    pub material_id: Option<u64>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl UploadTask {
    pub fn new(file: UploadFile) -> Self {
        Self {
            id: Uuid::new_v4(),
            file,
            status: TaskStatus::Pending,
            progress_percent: 0,
            status_message: String::new(),
            credential: None,
            material_id: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            id: self.id,
            file_name: self.file.name.clone(),
            file_size: self.file.size(),
            status: self.status,
            progress_percent: self.progress_percent,
            status_message: self.status_message.clone(),
        }
    }
}

/// Read-only view of a task handed to progress sinks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSnapshot {
    pub id: Uuid,
    pub file_name: String,
    pub file_size: u64,
    pub status: TaskStatus,
    pub progress_percent: u8,
    pub status_message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTokenRequest<'a> {
    pub file_name: &'a str,
    pub file_size: u64,
    pub content_type: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveMaterialRequest<'a> {
    pub file_name: &'a str,
    pub file_size: u64,
    pub content_type: &'a str,
    pub bucket: &'a str,
    pub key: &'a str,
    pub url: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveMaterialResponse {
    pub material_id: u64,
}

/// Material as listed by the gallery endpoint.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MaterialInfo {
    pub id: u64,
    pub file_name: String,
    pub file_size: i64,
    pub content_type: String,
    pub url: String,
    pub cover_url: String,
    pub cover_preview_url: String,
    pub download_url: String,
    pub preview_url: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MaterialListResponse {
    pub materials: Vec<MaterialInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential() -> UploadCredential {
        UploadCredential {
            access_key_id: "AK".to_string(),
            secret_access_key: "very-secret".to_string(),
            session_token: "session".to_string(),
            bucket: "materials".to_string(),
            object_key: "u1/photo.png".to_string(),
            endpoint: "http://minio:9000/".to_string(),
        }
    }

    #[test]
    fn test_object_url_trims_endpoint_slash() {
        assert_eq!(
            credential().object_url(),
            "http://minio:9000/materials/u1/photo.png"
        );
    }

    #[test]
    fn test_credential_debug_redacts_secrets() {
        let rendered = format!("{:?}", credential());
        assert!(!rendered.contains("very-secret"));
        assert!(!rendered.contains("\"session\""));
        assert!(rendered.contains("materials"));
    }

    #[test]
    fn test_credential_deserializes_backend_shape() {
        let json = r#"{"accessKeyId":"a","secretAccessKey":"s","sessionToken":"t","bucket":"b","key":"k","endpoint":"http://e"}"#;
        let cred: UploadCredential = serde_json::from_str(json).unwrap();
        assert_eq!(cred.object_key, "k");
        assert_eq!(cred.session_token, "t");
    }

    #[test]
    fn test_content_type_fallback() {
        let declared = UploadFile::new("a.png", Some("image/png".to_string()), vec![1u8]);
        let empty = UploadFile::new("a.bin", Some(String::new()), vec![1u8]);
        let missing = UploadFile::new("a.bin", None, vec![1u8]);
        assert_eq!(declared.content_type_or("application/octet-stream"), "image/png");
        assert_eq!(empty.content_type_or("application/octet-stream"), "application/octet-stream");
        assert_eq!(missing.content_type_or("application/octet-stream"), "application/octet-stream");
    }

    #[test]
    fn test_new_task_is_pending_at_zero() {
        let task = UploadTask::new(UploadFile::new("a.txt", None, b"hi".to_vec()));
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.progress_percent, 0);
        assert!(task.credential.is_none());
        assert!(!task.status.is_terminal());
        assert!(!task.status.is_in_flight());
    }

    #[tokio::test]
    async fn test_from_path_sniffs_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pixel.png");
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        tokio::fs::write(&path, png).await.unwrap();

        let file = UploadFile::from_path(&path).await.unwrap();
        assert_eq!(file.name, "pixel.png");
        assert_eq!(file.size(), 12);
        assert_eq!(file.content_type.as_deref(), Some("image/png"));
    }
}
