pub mod credential;
pub mod gallery;
pub mod metadata;
pub mod orchestrator;
pub mod progress;
pub mod session;
pub mod storage;
