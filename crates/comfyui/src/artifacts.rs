//! Collect the images a completed prompt produced.
//!
//! `GET /history/{prompt_id}` returns
//! `{ <prompt_id>: { "outputs": { <node_id>: { "images": [ImageRef, ...] } } } }`.
//! Every output node becomes one entry of the [`ArtifactSet`], in the
//! order the server lists them; nodes without `images` get an empty
//! entry.

use serde::Deserialize;
use serde_json::Value;

use crate::api::{ComfyUIApi, ImageRef};
use crate::execution::ExecutionError;

/// Images produced by one output node, in server order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeArtifacts {
    pub node_id: String,
    pub images: Vec<Vec<u8>>,
}

/// Everything one completed submission produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactSet {
    nodes: Vec<NodeArtifacts>,
}

impl ArtifactSet {
    pub fn new(nodes: Vec<NodeArtifacts>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[NodeArtifacts] {
        &self.nodes
    }

    /// Total number of images across all nodes.
    pub fn image_count(&self) -> usize {
        self.nodes.iter().map(|n| n.images.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over `(node_id, image bytes)` pairs.
    pub fn images(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.nodes.iter().flat_map(|node| {
            node.images
                .iter()
                .map(move |image| (node.node_id.as_str(), image.as_slice()))
        })
    }
}

/// List the output images recorded for `prompt_id` in a history response.
pub fn output_images(
    history: &Value,
    prompt_id: &str,
) -> Result<Vec<(String, Vec<ImageRef>)>, ExecutionError> {
    let record = history
        .get(prompt_id)
        .ok_or_else(|| ExecutionError::HistoryNotFound(prompt_id.to_string()))?;

    let malformed = |reason: String| ExecutionError::MalformedHistory {
        prompt_id: prompt_id.to_string(),
        reason,
    };

    let outputs = record
        .get("outputs")
        .and_then(Value::as_object)
        .ok_or_else(|| malformed("missing 'outputs' object".to_string()))?;

    outputs
        .iter()
        .map(|(node_id, output)| -> Result<_, ExecutionError> {
            let images = match output.get("images") {
                Some(list) => Vec::<ImageRef>::deserialize(list)
                    .map_err(|e| malformed(format!("node {node_id}: {e}")))?,
                None => Vec::new(),
            };
            Ok((node_id.clone(), images))
        })
        .collect()
}

/// Downloads a completed prompt's outputs.
pub struct ArtifactFetcher<'a> {
    api: &'a ComfyUIApi,
}

impl<'a> ArtifactFetcher<'a> {
    pub fn new(api: &'a ComfyUIApi) -> Self {
        Self { api }
    }

    /// Look up the history for `prompt_id` and download every listed image.
    pub async fn fetch(&self, prompt_id: &str) -> Result<ArtifactSet, ExecutionError> {
        let history = self.api.get_history(prompt_id).await.map_err(|source| {
            ExecutionError::HistoryRequest {
                prompt_id: prompt_id.to_string(),
                source,
            }
        })?;

        let mut nodes = Vec::new();
        for (node_id, refs) in output_images(&history, prompt_id)? {
            let mut images = Vec::with_capacity(refs.len());
            for image in &refs {
                let data = self.api.view_image(image).await.map_err(|source| {
                    ExecutionError::ArtifactDownload {
                        filename: image.filename.clone(),
                        source,
                    }
                })?;
                tracing::info!(
                    prompt_id,
                    node_id = %node_id,
                    filename = %image.filename,
                    bytes = data.len(),
                    "Downloaded output image",
                );
                images.push(data);
            }
            nodes.push(NodeArtifacts { node_id, images });
        }

        Ok(ArtifactSet { nodes })
    }
}
