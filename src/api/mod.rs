pub mod client;
pub mod error;
pub mod result;

pub use client::BackendClient;
pub use error::UploadError;
pub use result::{AUTH_EXPIRED_CODE, ApiEnvelope, ApiResult};
