// Artifact Storage for Completed Runs
//
// One JSON artifact per run at <artifact_dir>/<run_id>.json, written
// atomically so readers never observe a partial file.

use crate::error::{VisionError, VisionResult};
use crate::types::{FrameAnalysis, VisualSummary};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunArtifact<'a> {
    run_id: &'a str,
    generated_at: String,
    frame_analyses: &'a [FrameAnalysis],
    visual_summary: &'a VisualSummary,
}

/// Writes run artifacts under one directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Artifact location for `run_id`; characters unsafe in file names become `_`
    pub fn artifact_path(&self, run_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_run_id(run_id)))
    }

    /// Persist the summary and its frame analyses
    ///
    /// # Returns
    /// * Path of the written artifact
    pub async fn persist(&self, run_id: &str, summary: &VisualSummary) -> VisionResult<PathBuf> {
        let artifact = RunArtifact {
            run_id,
            generated_at: chrono::Utc::now().to_rfc3339(),
            frame_analyses: &summary.frame_analyses,
            visual_summary: summary,
        };
        let bytes = serde_json::to_vec_pretty(&artifact)?;

        let path = self.artifact_path(run_id);
        let target = path.clone();
        tokio::task::spawn_blocking(move || brandlens_common::config::write_atomic(&target, &bytes))
            .await
            .map_err(|e| VisionError::Persistence(format!("artifact write task: {}", e)))?
            .map_err(|e| VisionError::Persistence(format!("{}: {}", path.display(), e)))?;

        info!(run_id, path = %path.display(), "Analysis artifact persisted");
        Ok(path)
    }
}

pub(crate) fn sanitize_run_id(run_id: &str) -> String {
    let cleaned: String = run_id
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "run".to_string()
    } else {
        cleaned.to_string()
    }
}
