//! Batch orchestration.
//!
//! Items run strictly one after another. For each item a fresh copy of
//! the template is read, generic overrides are written, then the item's
//! own overrides, and the result goes through submit -> await -> fetch
//! -> persist. The first error aborts the whole batch.

use std::path::{Path, PathBuf};

use comfybatch_comfyui::artifacts::ArtifactFetcher;
use comfybatch_comfyui::client::ComfyUIClient;
use comfybatch_comfyui::executor::ExecutionClient;
use comfybatch_core::batch::{BatchSpec, Overrides};
use comfybatch_core::binding::{OverrideLayer, TemplateApplier};
use comfybatch_core::error::CoreError;
use comfybatch_core::workflow::JobGraph;

use crate::config::RunnerConfig;
use crate::error::BatchError;
use crate::writer::ArtifactWriter;

/// Summary of a finished batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub items: usize,
    pub images_saved: usize,
}

/// What happened when a batch file was run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(BatchReport),
    /// The batch file does not exist; nothing was contacted.
    BatchFileMissing(PathBuf),
}

/// Build the job graph for one item from a freshly loaded template.
pub fn prepare_job(spec: &BatchSpec, item: &Overrides) -> Result<JobGraph, CoreError> {
    let mut graph = JobGraph::load(&spec.template_path)?;
    let applier = TemplateApplier::new(&spec.bindings);

    if let Some(generic) = &spec.generic_overrides {
        applier.apply(&mut graph, pairs(generic), OverrideLayer::Generic)?;
    }
    applier.apply(&mut graph, pairs(item), OverrideLayer::Item)?;

    Ok(graph)
}

fn pairs(overrides: &Overrides) -> impl Iterator<Item = (&str, &serde_json::Value)> {
    overrides.iter().map(|(name, value)| (name.as_str(), value))
}

/// Runs every item of a [`BatchSpec`] against one ComfyUI server.
pub struct BatchRunner {
    spec: BatchSpec,
    executor: ExecutionClient,
}

impl BatchRunner {
    pub fn new(spec: BatchSpec, executor: ExecutionClient) -> Self {
        Self { spec, executor }
    }

    /// Execute all items in order.
    pub async fn run(&mut self) -> Result<BatchReport, BatchError> {
        let total = self.spec.items.len();
        tracing::info!(
            items = total,
            bindings = self.spec.bindings.len(),
            template = %self.spec.template_path.display(),
            client_id = %self.executor.client_id(),
            "Starting batch",
        );

        let mut images_saved = 0;
        for (index, item) in self.spec.items.iter().enumerate() {
            tracing::info!(item = index + 1, total, overrides = ?item, "Processing batch item");

            let graph = prepare_job(&self.spec, item)?;

            tracing::info!(item = index + 1, "Generating images");
            let prompt_id = self.executor.submit_and_await(&graph).await?;

            let artifacts = ArtifactFetcher::new(self.executor.api())
                .fetch(&prompt_id)
                .await?;

            let written = ArtifactWriter::new(&self.spec.save).persist(&artifacts)?;
            images_saved += written.len();
        }

        let report = BatchReport {
            items: total,
            images_saved,
        };
        tracing::info!(items = report.items, images_saved = report.images_saved, "Batch complete");
        Ok(report)
    }
}

/// Load the batch file at `path` and run it.
///
/// A missing batch file is reported and returns
/// [`RunOutcome::BatchFileMissing`] before any connection is attempted.
pub async fn run_batch_file(path: &Path, config: &RunnerConfig) -> Result<RunOutcome, BatchError> {
    if !path.exists() {
        tracing::warn!("Batch file '{}' not found.", path.display());
        return Ok(RunOutcome::BatchFileMissing(path.to_path_buf()));
    }

    let spec = BatchSpec::load(path)?;
    let client = ComfyUIClient::new(config.ws_url(), config.api_url());
    let executor = ExecutionClient::new(client).with_completion_timeout(config.completion_timeout);

    let report = BatchRunner::new(spec, executor).run().await?;
    Ok(RunOutcome::Completed(report))
}
