pub mod api;
pub mod config;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::api::UploadError;
pub use crate::config::UploaderConfig;
pub use crate::models::{TaskSnapshot, TaskStatus, UploadFile, UploadTask};
pub use crate::services::orchestrator::{BatchReport, PipelineServices, PipelineState, UploadOrchestrator};
