use comfybatch_comfyui::execution::ExecutionError;
use comfybatch_core::error::CoreError;

/// Any failure that aborts a batch run.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("Failed to save image to {path}: {reason}")]
    Persist { path: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}
