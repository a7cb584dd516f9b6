//! Lifecycle of one prompt submission.
//!
//! An [`Execution`] moves linearly through
//! `Idle -> Submitted -> AwaitingCompletion -> Completed`. It owns the
//! `prompt_id` for exactly one submit/await/fetch cycle and decides,
//! message by message, whether the completion signal has arrived.

use std::time::Duration;

use crate::api::ComfyUIApiError;
use crate::messages::ComfyUIMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Idle,
    Submitted,
    AwaitingCompletion,
    Completed,
}

/// Correlation state for one submission.
#[derive(Debug)]
pub struct Execution {
    prompt_id: String,
    state: ExecutionState,
}

impl Execution {
    /// Start a new execution with a fresh `prompt_id` (UUID v4).
    pub fn new() -> Self {
        Self::with_prompt_id(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_prompt_id(prompt_id: String) -> Self {
        Self {
            prompt_id,
            state: ExecutionState::Idle,
        }
    }

    pub fn prompt_id(&self) -> &str {
        &self.prompt_id
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    pub fn into_prompt_id(self) -> String {
        self.prompt_id
    }

    /// The server accepted the prompt.
    pub fn mark_submitted(&mut self) {
        self.advance(ExecutionState::Idle, ExecutionState::Submitted);
    }

    /// Start listening for the completion signal.
    pub fn begin_awaiting(&mut self) {
        self.advance(ExecutionState::Submitted, ExecutionState::AwaitingCompletion);
    }

    /// Feed one notification. Returns `true` once the execution is complete.
    ///
    /// Only an `executing` message with a null or empty node and this execution's
    /// `prompt_id` completes it; every other message leaves the state
    /// unchanged.
    pub fn observe(&mut self, msg: &ComfyUIMessage) -> bool {
        if self.state != ExecutionState::AwaitingCompletion {
            return self.state == ExecutionState::Completed;
        }

        match msg {
            ComfyUIMessage::Executing(data) if data.completes(&self.prompt_id) => {
                self.advance(ExecutionState::AwaitingCompletion, ExecutionState::Completed);
            }
            ComfyUIMessage::Executing(data) => {
                tracing::debug!(
                    prompt_id = ?data.prompt_id,
                    node = ?data.node,
                    "Executing node",
                );
            }
            ComfyUIMessage::Progress(data) => {
                tracing::debug!(
                    value = data.value,
                    max = data.max,
                    percent = data.percent(),
                    "Generation progress",
                );
            }
            ComfyUIMessage::ExecutionError(data) if data.prompt_id == self.prompt_id => {
                tracing::error!(
                    prompt_id = %data.prompt_id,
                    node_id = ?data.node_id,
                    error_type = %data.exception_type,
                    error_message = %data.exception_message,
                    "Execution error reported by ComfyUI",
                );
            }
            ComfyUIMessage::Status(data) => {
                tracing::debug!(
                    queue_remaining = data.status.exec_info.queue_remaining,
                    "ComfyUI queue status",
                );
            }
            other => {
                tracing::trace!(notification = ?other, "Ignoring notification");
            }
        }

        self.state == ExecutionState::Completed
    }

    fn advance(&mut self, from: ExecutionState, to: ExecutionState) {
        debug_assert_eq!(self.state, from, "invalid execution transition to {to:?}");
        tracing::debug!(prompt_id = %self.prompt_id, ?from, ?to, "Execution state change");
        self.state = to;
    }
}

impl Default for Execution {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors from submitting, awaiting, and collecting a prompt.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// `POST /prompt` failed or returned a non-2xx status.
    #[error("Failed to submit workflow: {0}")]
    SubmissionFailed(#[source] ComfyUIApiError),

    /// The notification channel could not be opened, failed, or closed.
    #[error("Notification channel error: {0}")]
    Channel(String),

    /// The configured completion deadline expired.
    #[error("Prompt {prompt_id} did not complete within {after:?}")]
    CompletionTimedOut { prompt_id: String, after: Duration },

    /// The history request itself failed.
    #[error("Failed to fetch history for prompt {prompt_id}: {source}")]
    HistoryRequest {
        prompt_id: String,
        #[source]
        source: ComfyUIApiError,
    },

    /// No history record exists for a prompt that reported completion.
    #[error("No history found for prompt {0}")]
    HistoryNotFound(String),

    /// The history record does not have the expected shape.
    #[error("Malformed history for prompt {prompt_id}: {reason}")]
    MalformedHistory { prompt_id: String, reason: String },

    /// Downloading a produced image failed.
    #[error("Failed to download '{filename}': {source}")]
    ArtifactDownload {
        filename: String,
        #[source]
        source: ComfyUIApiError,
    },
}
