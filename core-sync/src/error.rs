use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("A sync run is already in progress")]
    RunInProgress,

    #[error("Background scheduling failed: {0}")]
    Scheduling(String),

    #[error("Photo source error: {0}")]
    Source(#[from] core_library::LibraryError),
}

pub type Result<T> = std::result::Result<T, SyncError>;
