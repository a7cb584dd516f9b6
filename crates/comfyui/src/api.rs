//! REST API client for the ComfyUI HTTP endpoints.
//!
//! Wraps workflow submission, history retrieval and output download
//! using [`reqwest`].

use serde::{Deserialize, Serialize};

use comfybatch_core::workflow::JobGraph;

/// HTTP client for a single ComfyUI instance.
pub struct ComfyUIApi {
    client: reqwest::Client,
    api_url: String,
}

/// Body of a `POST /prompt` request.
#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    prompt: &'a JobGraph,
    client_id: &'a str,
    prompt_id: &'a str,
}

/// Response returned by the ComfyUI `/prompt` endpoint after
/// successfully queuing a workflow.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Identifier the server queued the prompt under.
    pub prompt_id: String,
    /// Position in the execution queue.
    #[serde(default)]
    pub number: i64,
}

/// One produced file as listed in a history record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageRef {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    /// Storage folder type (`output`, `temp`, ...).
    #[serde(rename = "type")]
    pub folder_type: String,
}

/// Errors from the ComfyUI REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// ComfyUI returned a non-2xx status code.
    #[error("ComfyUI API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl ComfyUIApi {
    /// Create a new API client for a ComfyUI instance.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8188`.
    pub fn new(api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
        }
    }

    /// Submit a workflow for execution.
    ///
    /// Sends `POST /prompt` with the job graph, the process `client_id`
    /// (so notifications reach our WebSocket) and a caller-chosen
    /// `prompt_id`.
    pub async fn submit_workflow(
        &self,
        workflow: &JobGraph,
        client_id: &str,
        prompt_id: &str,
    ) -> Result<SubmitResponse, ComfyUIApiError> {
        let body = SubmitRequest {
            prompt: workflow,
            client_id,
            prompt_id,
        };

        let response = self
            .client
            .post(format!("{}/prompt", self.api_url))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Retrieve execution history for a specific prompt.
    ///
    /// Sends a `GET /history/{prompt_id}` request. The server answers
    /// with an object keyed by prompt ID, empty when the prompt is unknown.
    pub async fn get_history(&self, prompt_id: &str) -> Result<serde_json::Value, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.api_url, prompt_id))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Download the raw bytes of one produced file via `GET /view`.
    pub async fn view_image(&self, image: &ImageRef) -> Result<Vec<u8>, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/view", self.api_url))
            .query(&[
                ("filename", image.filename.as_str()),
                ("subfolder", image.subfolder.as_str()),
                ("type", image.folder_type.as_str()),
            ])
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`ComfyUIApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ComfyUIApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ComfyUIApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ComfyUIApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn submit_request_shape() {
        let graph = JobGraph::from_json(r#"{"5": {"inputs": {"text": "a cat"}}}"#).unwrap();
        let body = SubmitRequest {
            prompt: &graph,
            client_id: "client-1",
            prompt_id: "prompt-1",
        };

        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "prompt": {"5": {"inputs": {"text": "a cat"}}},
                "client_id": "client-1",
                "prompt_id": "prompt-1",
            })
        );
    }

    #[test]
    fn submit_response_tolerates_extra_fields() {
        let resp: SubmitResponse = serde_json::from_value(json!({
            "prompt_id": "p", "number": 4, "node_errors": {}
        }))
        .unwrap();
        assert_eq!(resp.prompt_id, "p");
        assert_eq!(resp.number, 4);
    }

    #[test]
    fn image_ref_reads_type_field() {
        let image: ImageRef = serde_json::from_value(json!({
            "filename": "ComfyUI_00001_.png", "subfolder": "", "type": "output"
        }))
        .unwrap();
        assert_eq!(image.folder_type, "output");
        assert_eq!(image.subfolder, "");
    }
}
