//! Persist downloaded images to disk.
//!
//! Each payload is decoded and re-encoded as PNG under
//! [`SaveConfig::output_directory`], named by
//! [`random_output_filename`]. Two images saved in the same second
//! with the same random suffix overwrite each other.

use std::path::{Path, PathBuf};

use image::ImageFormat;
use rand::Rng;

use comfybatch_comfyui::artifacts::ArtifactSet;
use comfybatch_core::batch::SaveConfig;
use comfybatch_core::naming::random_output_filename;

use crate::error::BatchError;

pub struct ArtifactWriter<'a> {
    config: &'a SaveConfig,
}

impl<'a> ArtifactWriter<'a> {
    pub fn new(config: &'a SaveConfig) -> Self {
        Self { config }
    }

    /// Save every image in `artifacts`, returning the paths written.
    ///
    /// Does nothing when saving is disabled.
    pub fn persist(&self, artifacts: &ArtifactSet) -> Result<Vec<PathBuf>, BatchError> {
        self.persist_with_rng(artifacts, &mut rand::rng())
    }

    pub fn persist_with_rng<R: Rng + ?Sized>(
        &self,
        artifacts: &ArtifactSet,
        rng: &mut R,
    ) -> Result<Vec<PathBuf>, BatchError> {
        if !self.config.enabled {
            tracing::debug!(
                images = artifacts.image_count(),
                "Image saving disabled, discarding outputs",
            );
            return Ok(Vec::new());
        }

        let dir = &self.config.output_directory;
        std::fs::create_dir_all(dir).map_err(|e| persist_error(dir, e))?;

        let mut written = Vec::with_capacity(artifacts.image_count());
        for (node_id, bytes) in artifacts.images() {
            let decoded = image::load_from_memory(bytes).map_err(|e| BatchError::Persist {
                path: dir.display().to_string(),
                reason: format!("cannot decode output of node {node_id}: {e}"),
            })?;

            let path = dir.join(random_output_filename(&self.config.filename_prefix, rng));
            decoded
                .save_with_format(&path, ImageFormat::Png)
                .map_err(|e| persist_error(&path, e))?;

            tracing::info!(node_id, path = %path.display(), "Saved image");
            written.push(path);
        }

        Ok(written)
    }
}

fn persist_error(path: &Path, e: impl std::fmt::Display) -> BatchError {
    BatchError::Persist {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}
