//! Submit a job graph and block until ComfyUI reports it finished.

use std::time::Duration;

use comfybatch_core::workflow::JobGraph;

use crate::api::ComfyUIApi;
use crate::client::{ComfyUIClient, ComfyUIStream};
use crate::execution::{Execution, ExecutionError};
use crate::processor::await_completion;

/// Drives submissions against one ComfyUI instance.
///
/// The notification channel is opened on first use and kept for every
/// later submission. It is always open before a prompt is posted, so
/// the completion signal cannot be missed.
pub struct ExecutionClient {
    client: ComfyUIClient,
    api: ComfyUIApi,
    channel: Option<ComfyUIStream>,
    completion_timeout: Option<Duration>,
}

impl ExecutionClient {
    pub fn new(client: ComfyUIClient) -> Self {
        let api = ComfyUIApi::new(client.api_url().to_string());
        Self {
            client,
            api,
            channel: None,
            completion_timeout: None,
        }
    }

    /// Bound the wait for each completion signal. `None` waits forever.
    pub fn with_completion_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.completion_timeout = timeout;
        self
    }

    pub fn client_id(&self) -> &str {
        self.client.client_id()
    }

    pub fn api(&self) -> &ComfyUIApi {
        &self.api
    }

    /// Submit `graph` and wait for its completion signal.
    ///
    /// Returns the `prompt_id` the execution ran under, for use with
    /// [`ArtifactFetcher`](crate::artifacts::ArtifactFetcher).
    pub async fn submit_and_await(&mut self, graph: &JobGraph) -> Result<String, ExecutionError> {
        let mut execution = Execution::new();
        self.channel().await?;

        let response = self
            .api
            .submit_workflow(graph, self.client.client_id(), execution.prompt_id())
            .await
            .map_err(ExecutionError::SubmissionFailed)?;
        execution.mark_submitted();

        tracing::info!(
            client_id = %self.client.client_id(),
            prompt_id = %execution.prompt_id(),
            queue_number = response.number,
            "Workflow submitted to ComfyUI",
        );
        if response.prompt_id != execution.prompt_id() {
            tracing::warn!(
                requested = %execution.prompt_id(),
                returned = %response.prompt_id,
                "ComfyUI queued the prompt under a different ID",
            );
        }

        execution.begin_awaiting();
        let prompt_id = execution.prompt_id().to_string();
        let timeout = self.completion_timeout;
        let ws_stream = self.channel().await?;
        let waiting = await_completion(ws_stream, &mut execution);

        let outcome = match timeout {
            Some(limit) => tokio::time::timeout(limit, waiting).await.map_err(|_| {
                ExecutionError::CompletionTimedOut {
                    prompt_id: prompt_id.clone(),
                    after: limit,
                }
            })?,
            None => waiting.await,
        };
        outcome?;

        Ok(execution.into_prompt_id())
    }

    /// The open notification channel, connecting on first call.
    async fn channel(&mut self) -> Result<&mut ComfyUIStream, ExecutionError> {
        if self.channel.is_none() {
            let ws_stream = self
                .client
                .connect()
                .await
                .map_err(|e| ExecutionError::Channel(e.to_string()))?;
            self.channel = Some(ws_stream);
        }

        self.channel
            .as_mut()
            .ok_or_else(|| ExecutionError::Channel("notification channel unavailable".into()))
    }
}
