use crate::api::{BackendClient, UploadError};
use crate::config::{ConfigError, UploaderConfig};
use crate::models::{TaskStatus, TransferProgress, UploadFile, UploadTask};
use crate::services::credential::{CredentialRequester, HttpCredentialRequester};
use crate::services::gallery::{GalleryRefresher, MaterialGallery};
use crate::services::metadata::{HttpMetadataRecorder, MaterialRecord, MetadataRecorder};
use crate::services::progress::{
    MSG_FAILED_PREFIX, MSG_INITIALIZING_TRANSFER, MSG_RECORDING, MSG_REQUESTING_CREDENTIAL,
    MSG_SUCCEEDED, MSG_TRANSFERRED, MSG_TRANSFERRING, ProgressSink, Step, band,
};
use crate::services::session::SessionHandler;
use crate::services::storage::{ObjectStoreUploader, S3ObjectStoreUploader};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Ordered tasks of one submission plus the index of the task currently
/// owned by a network step. Owned by the caller and threaded through `run`.
#[derive(Debug, Default)]
pub struct PipelineState {
    tasks: Vec<UploadTask>,
    in_flight: Option<usize>,
}

impl PipelineState {
    pub fn new(files: impl IntoIterator<Item = UploadFile>) -> Self {
        Self {
            tasks: files.into_iter().map(UploadTask::new).collect(),
            in_flight: None,
        }
    }

    pub fn tasks(&self) -> &[UploadTask] {
        &self.tasks
    }

    pub fn in_flight(&self) -> Option<usize> {
        self.in_flight
    }

    pub fn into_tasks(self) -> Vec<UploadTask> {
        self.tasks
    }

    fn count(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }
}

#[derive(Debug)]
pub struct BatchReport {
    pub state: PipelineState,
    /// The backend reported an expired session and the batch was abandoned.
    pub session_expired: bool,
    /// Post-batch gallery refresh, still running in the background.
    pub gallery_refresh: Option<JoinHandle<()>>,
}

impl BatchReport {
    pub fn tasks(&self) -> &[UploadTask] {
        self.state.tasks()
    }

    pub fn succeeded(&self) -> usize {
        self.state.count(TaskStatus::Succeeded)
    }

    pub fn failed(&self) -> usize {
        self.state.count(TaskStatus::Failed)
    }

    /// Tasks never started because the session expired first.
    pub fn abandoned(&self) -> usize {
        self.state.count(TaskStatus::Pending)
    }

    pub fn all_succeeded(&self) -> bool {
        !self.session_expired && self.succeeded() == self.state.tasks.len()
    }

    /// Waits for the gallery refresh. Callers about to shut the runtime down
    /// must do this, or the refresh is cancelled with it.
    pub async fn wait_for_refresh(&mut self) {
        if let Some(handle) = self.gallery_refresh.take() {
            if let Err(e) = handle.await {
                tracing::warn!("Gallery refresh task did not finish: {}", e);
            }
        }
    }
}

/// Black-box collaborators the pipeline calls.
#[derive(Clone)]
pub struct PipelineServices {
    pub credentials: Arc<dyn CredentialRequester>,
    pub store: Arc<dyn ObjectStoreUploader>,
    pub recorder: Arc<dyn MetadataRecorder>,
    pub gallery: Arc<dyn GalleryRefresher>,
}

/// Drives files through credential → transfer → record, one file at a time.
pub struct UploadOrchestrator {
    services: PipelineServices,
    session: Arc<dyn SessionHandler>,
    sink: Arc<dyn ProgressSink>,
    default_content_type: String,
    panel_hide_delay: Duration,
}

impl UploadOrchestrator {
    pub fn new(
        services: PipelineServices,
        session: Arc<dyn SessionHandler>,
        sink: Arc<dyn ProgressSink>,
        config: &UploaderConfig,
    ) -> Self {
        Self {
            services,
            session,
            sink,
            default_content_type: config.default_content_type.clone(),
            panel_hide_delay: config.panel_hide_delay,
        }
    }

    /// Wires the HTTP backend and S3 store collaborators from configuration.
    pub fn from_config(
        config: &UploaderConfig,
        session: Arc<dyn SessionHandler>,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<Self, ConfigError> {
        let client = BackendClient::new(config.api_base()?.as_str());
        let services = PipelineServices {
            credentials: Arc::new(HttpCredentialRequester::new(client.clone())),
            store: Arc::new(S3ObjectStoreUploader::from_config(config)),
            recorder: Arc::new(HttpMetadataRecorder::new(client.clone())),
            gallery: Arc::new(MaterialGallery::new(client, session.clone())),
        };
        Ok(Self::new(services, session, sink, config))
    }

    pub async fn submit(&self, files: Vec<UploadFile>) -> BatchReport {
        self.run(PipelineState::new(files)).await
    }

    /// Runs every pending task to a terminal state in submission order.
    /// A failed task does not stop the batch; an expired session does.
    pub async fn run(&self, mut state: PipelineState) -> BatchReport {
        let rows: Vec<_> = state.tasks.iter().map(UploadTask::snapshot).collect();
        self.sink.show_panel(&rows);

        let mut session_expired = false;
        let mut gallery_refresh = None;
        for index in 0..state.tasks.len() {
            if state.tasks[index].status != TaskStatus::Pending {
                continue;
            }

            state.in_flight = Some(index);
            let outcome = self.run_task(&mut state.tasks[index]).await;
            state.in_flight = None;

            if let Err(e) = outcome {
                if e.is_pipeline_fatal() {
                    let login_url = self.session.expire();
                    self.sink.session_expired(&login_url);
                    session_expired = true;
                    break;
                }
            }
        }

        if session_expired {
            tracing::warn!(
                "🔒 Batch abandoned after session expiry, {} task(s) not started",
                state.count(TaskStatus::Pending)
            );
        } else {
            tracing::info!(
                "📊 Batch finished: {} succeeded, {} failed",
                state.count(TaskStatus::Succeeded),
                state.count(TaskStatus::Failed)
            );

            let gallery = Arc::clone(&self.services.gallery);
            gallery_refresh = Some(tokio::spawn(async move {
                gallery.refresh().await;
            }));

            tokio::time::sleep(self.panel_hide_delay).await;
            self.sink.hide_panel();
        }

        BatchReport {
            state,
            session_expired,
            gallery_refresh,
        }
    }

    async fn run_task(&self, task: &mut UploadTask) -> Result<(), UploadError> {
        task.started_at = Some(Utc::now());
        tracing::info!("🚀 Uploading {} ({} bytes)", task.file.name, task.file.size());

        let result = self.drive(task).await;
        task.finished_at = Some(Utc::now());

        match result {
            Ok(material_id) => {
                task.material_id = Some(material_id);
                self.transition(task, TaskStatus::Succeeded, band(Step::Record).end, MSG_SUCCEEDED);
                tracing::info!("✅ {} recorded as material {}", task.file.name, material_id);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Upload of {} failed: {}", task.file.name, e);
                // An expired session redirects; the row is left as it was.
                self.fail(task, &e, !e.is_pipeline_fatal());
                Err(e)
            }
        }
    }

    async fn drive(&self, task: &mut UploadTask) -> Result<u64, UploadError> {
        let token = self.session.token().ok_or(UploadError::AuthExpired)?;
        let content_type = task.file.content_type_or(&self.default_content_type).to_string();
        let file_name = task.file.name.clone();
        let file_size = task.file.size();

        self.transition(
            task,
            TaskStatus::RequestingCredential,
            band(Step::Credential).start,
            MSG_REQUESTING_CREDENTIAL,
        );
        let issued = self
            .services
            .credentials
            .request_credential(&file_name, file_size, &content_type, &token)
            .await?;
        task.credential = Some(issued);

        self.transition(
            task,
            TaskStatus::Transferring,
            band(Step::Credential).midpoint(),
            MSG_INITIALIZING_TRANSFER,
        );
        // The transfer consumes the credential; it never outlives this task.
        let credential = task
            .credential
            .take()
            .ok_or_else(|| UploadError::Transport("upload credential missing".to_string()))?;

        self.advance(task, band(Step::Transfer).start, MSG_TRANSFERRING);
        let body = task.file.body.clone();
        let receipt = {
            let sink = &self.sink;
            let transfer = band(Step::Transfer);
            let row = &mut *task;
            let mut on_progress = |progress: TransferProgress| {
                let percent = transfer.scale(progress);
                if percent > row.progress_percent {
                    row.progress_percent = percent;
                    row.status_message = MSG_TRANSFERRING.to_string();
                    sink.update(&row.snapshot());
                }
            };
            self.services
                .store
                .upload(&credential, body, &content_type, &mut on_progress)
                .await?
        };
        tracing::debug!("Stored {} (etag {:?})", credential.object_key, receipt.e_tag);
        self.advance(task, band(Step::Record).midpoint(), MSG_TRANSFERRED);

        self.transition(
            task,
            TaskStatus::Recording,
            band(Step::Record).midpoint(),
            MSG_RECORDING,
        );
        let url = credential.object_url();
        let record = MaterialRecord {
            file_name: &file_name,
            file_size,
            content_type: &content_type,
            bucket: &credential.bucket,
            object_key: &credential.object_key,
            url: &url,
        };
        self.services.recorder.record(&record, &token).await
    }

    fn transition(&self, task: &mut UploadTask, status: TaskStatus, percent: u8, message: &str) {
        task.status = status;
        self.advance(task, percent, message);
    }

    fn advance(&self, task: &mut UploadTask, percent: u8, message: &str) {
        task.progress_percent = task.progress_percent.max(percent);
        task.status_message = message.to_string();
        self.sink.update(&task.snapshot());
    }

    fn fail(&self, task: &mut UploadTask, error: &UploadError, notify: bool) {
        task.status = TaskStatus::Failed;
        task.progress_percent = 0;
        task.status_message = format!("{}{}", MSG_FAILED_PREFIX, error.detail());
        task.credential = None;
        if notify {
            self.sink.update(&task.snapshot());
        }
    }
}
