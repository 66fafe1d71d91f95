use crate::api::UploadError;
use crate::config::{MIN_PART_SIZE, UploaderConfig};
use crate::models::{StoreReceipt, TransferProgress, UploadCredential};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region, RequestChecksumCalculation};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Size of the frames handed to the HTTP client; one progress event per frame.
pub const PROGRESS_FRAME_SIZE: usize = 64 * 1024;

/// Callback receiving cumulative byte counts during a transfer.
pub type ProgressFn<'a> = dyn FnMut(TransferProgress) + Send + 'a;

/// Writes one payload to the object store using a scoped credential.
/// Exactly one attempt is made; a failure means the whole payload has to be
/// sent again by a new task.
#[async_trait]
pub trait ObjectStoreUploader: Send + Sync {
    async fn upload(
        &self,
        credential: &UploadCredential,
        body: Bytes,
        content_type: &str,
        on_progress: &mut ProgressFn<'_>,
    ) -> Result<StoreReceipt, UploadError>;
}

/// In-memory request body that reports the running byte count, offset by
/// the bytes already sent in earlier parts, as each frame is polled.
#[derive(Debug)]
struct ProgressBody {
    remaining: Bytes,
    sent: u64,
    progress: mpsc::UnboundedSender<u64>,
}

impl ProgressBody {
    fn byte_stream(body: Bytes, offset: u64, progress: mpsc::UnboundedSender<u64>) -> ByteStream {
        ByteStream::from_body_1_x(Self {
            remaining: body,
            sent: offset,
            progress,
        })
    }
}

impl Body for ProgressBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        if this.remaining.is_empty() {
            return Poll::Ready(None);
        }

        let frame = this
            .remaining
            .split_to(PROGRESS_FRAME_SIZE.min(this.remaining.len()));
        this.sent += frame.len() as u64;
        // The receiver is gone once the request future has been dropped.
        let _ = this.progress.send(this.sent);
        Poll::Ready(Some(Ok(Frame::data(frame))))
    }

    fn is_end_stream(&self) -> bool {
        self.remaining.is_empty()
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.remaining.len() as u64)
    }
}

/// Polls `request` to completion while forwarding the byte counts its body
/// reports, so progress is delivered on the caller's task.
async fn with_progress<F, T>(
    request: F,
    mut sent: mpsc::UnboundedReceiver<u64>,
    total: u64,
    on_progress: &mut ProgressFn<'_>,
) -> T
where
    F: Future<Output = T>,
{
    tokio::pin!(request);
    let out = loop {
        tokio::select! {
            out = &mut request => break out,
            Some(loaded) = sent.recv() => on_progress(TransferProgress { loaded, total }),
        }
    };
    while let Ok(loaded) = sent.try_recv() {
        on_progress(TransferProgress { loaded, total });
    }
    out
}

pub struct S3ObjectStoreUploader {
    region: String,
    part_size: usize,
}

impl S3ObjectStoreUploader {
    pub fn new(region: impl Into<String>, part_size: usize) -> Self {
        Self {
            region: region.into(),
            part_size: part_size.max(MIN_PART_SIZE),
        }
    }

    pub fn from_config(config: &UploaderConfig) -> Self {
        Self::new(config.store_region.clone(), config.part_size)
    }

    #[cfg(test)]
    fn with_part_size_unchecked(region: &str, part_size: usize) -> Self {
        Self {
            region: region.to_string(),
            part_size,
        }
    }

    // A fresh client per credential: credentials are never shared between tasks.
    async fn client_for(&self, credential: &UploadCredential) -> Client {
        let aws_config = aws_config::from_env()
            .endpoint_url(&credential.endpoint)
            .region(Region::new(self.region.clone()))
            .credentials_provider(Credentials::new(
                credential.access_key_id.clone(),
                credential.secret_access_key.clone(),
                Some(credential.session_token.clone()),
                None,
                "material-upload-token",
            ))
            .load()
            .await;

        // Request checksums only where an operation requires one.
        let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
            .force_path_style(true)
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .build();

        Client::from_conf(s3_config)
    }

    async fn put_single(
        &self,
        client: &Client,
        credential: &UploadCredential,
        body: Bytes,
        content_type: &str,
        on_progress: &mut ProgressFn<'_>,
    ) -> Result<StoreReceipt, UploadError> {
        let total = body.len() as u64;
        let (tx, rx) = mpsc::unbounded_channel();
        let request = client
            .put_object()
            .bucket(&credential.bucket)
            .key(&credential.object_key)
            .content_type(content_type)
            .content_length(total as i64)
            .body(ProgressBody::byte_stream(body, 0, tx))
            .send();
        let res = with_progress(request, rx, total, on_progress)
            .await
            .map_err(|e| store_error("put_object", e))?;

        Ok(StoreReceipt {
            e_tag: res.e_tag().map(str::to_string),
            version_id: res.version_id().map(str::to_string),
        })
    }

    async fn put_multipart(
        &self,
        client: &Client,
        credential: &UploadCredential,
        body: Bytes,
        content_type: &str,
        on_progress: &mut ProgressFn<'_>,
    ) -> Result<StoreReceipt, UploadError> {
        let multipart_upload_res = client
            .create_multipart_upload()
            .bucket(&credential.bucket)
            .key(&credential.object_key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| store_error("create_multipart_upload", e))?;

        let upload_id = multipart_upload_res
            .upload_id()
            .ok_or_else(|| UploadError::StoreTransfer("No upload ID".to_string()))?
            .to_string();

        match self
            .upload_parts(client, credential, &upload_id, body, on_progress)
            .await
        {
            Ok(receipt) => Ok(receipt),
            Err(e) => {
                if let Err(abort_err) = client
                    .abort_multipart_upload()
                    .bucket(&credential.bucket)
                    .key(&credential.object_key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    tracing::warn!(
                        "Failed to abort multipart upload {} for {}: {}",
                        upload_id,
                        credential.object_key,
                        DisplayErrorContext(&abort_err)
                    );
                }
                Err(e)
            }
        }
    }

    async fn upload_parts(
        &self,
        client: &Client,
        credential: &UploadCredential,
        upload_id: &str,
        body: Bytes,
        on_progress: &mut ProgressFn<'_>,
    ) -> Result<StoreReceipt, UploadError> {
        let total = body.len() as u64;
        let mut completed_parts = Vec::new();

        for (index, start) in (0..body.len()).step_by(self.part_size).enumerate() {
            let part_number = index as i32 + 1;
            let end = (start + self.part_size).min(body.len());
            let chunk = body.slice(start..end);

            let (tx, rx) = mpsc::unbounded_channel();
            let request = client
                .upload_part()
                .bucket(&credential.bucket)
                .key(&credential.object_key)
                .upload_id(upload_id)
                .part_number(part_number)
                .content_length((end - start) as i64)
                .body(ProgressBody::byte_stream(chunk, start as u64, tx))
                .send();
            let upload_part_res = with_progress(request, rx, total, on_progress)
                .await
                .map_err(|e| store_error("upload_part", e))?;

            completed_parts.push(
                CompletedPart::builder()
                    .e_tag(upload_part_res.e_tag().unwrap_or_default())
                    .part_number(part_number)
                    .build(),
            );
        }

        let completed_multipart_upload = CompletedMultipartUpload::builder()
            .set_parts(Some(completed_parts))
            .build();

        let res = client
            .complete_multipart_upload()
            .bucket(&credential.bucket)
            .key(&credential.object_key)
            .upload_id(upload_id)
            .multipart_upload(completed_multipart_upload)
            .send()
            .await
            .map_err(|e| store_error("complete_multipart_upload", e))?;

        Ok(StoreReceipt {
            e_tag: res.e_tag().map(str::to_string),
            version_id: res.version_id().map(str::to_string),
        })
    }
}

fn store_error<E>(operation: &str, e: E) -> UploadError
where
    E: std::error::Error,
{
    let detail = DisplayErrorContext(&e).to_string();
    // The pipeline reports the task failure; this only keeps the SDK context.
    tracing::warn!("S3 {} failed: {}", operation, detail);
    UploadError::StoreTransfer(detail)
}

#[async_trait]
impl ObjectStoreUploader for S3ObjectStoreUploader {
    async fn upload(
        &self,
        credential: &UploadCredential,
        body: Bytes,
        content_type: &str,
        on_progress: &mut ProgressFn<'_>,
    ) -> Result<StoreReceipt, UploadError> {
        let client = self.client_for(credential).await;
        let total = body.len() as u64;

        if body.len() <= self.part_size {
            let receipt = self
                .put_single(&client, credential, body, content_type, on_progress)
                .await?;
            on_progress(TransferProgress {
                loaded: total,
                total,
            });
            Ok(receipt)
        } else {
            self.put_multipart(&client, credential, body, content_type, on_progress)
                .await
        }
    }
}
