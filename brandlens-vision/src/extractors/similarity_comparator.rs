//! Similarity Comparator (Tier 1)
//!
//! Compares frames against operator-supplied reference product images using
//! an external embedding process. Reference embeddings are generated once at
//! run start and cached to disk; every frame is then scored against each
//! cached embedding and the best match is kept.
//!
//! Pessimistic by default: embedding generation is expensive, so the first
//! missing-dependency failure disables the comparator for the rest of the
//! run (`retry_on_failure = false`).
//!
//! # Protocol
//! - `<program> <args..> embed <image_path>` → `{"embedding": [...], "dimension": n}`
//! - `<program> <args..> compare <frame_path> <embedding_file>`
//!   → `{"similarity": 0.41, "match": true, "confidence": "medium"}`

use super::{
    process, AvailabilityTracker, Capability, CapabilityError, ReferenceEmbedder,
    SimilarityRequest,
};
use crate::config::CapabilityConfig;
use crate::types::{CapabilityState, ReferenceEmbedding, SimilarityBucket, SimilarityResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::Path;
use tracing::{debug, info};

/// Minimum similarity for a frame to count as a reference match
pub const MATCH_THRESHOLD: f64 = 0.30;

#[derive(Debug, Serialize, Deserialize)]
struct EmbeddingArtifact {
    embedding: Vec<f64>,
    #[serde(default)]
    dimension: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct CompareResponse {
    similarity: f64,
    #[serde(default, rename = "match")]
    is_match: Option<bool>,
    #[serde(default)]
    confidence: Option<String>,
}

/// External embedding-similarity client
pub struct SimilarityComparator {
    config: CapabilityConfig,
    tracker: AvailabilityTracker,
}

impl SimilarityComparator {
    pub const NAME: &'static str = "similarity_comparator";

    pub fn new(config: CapabilityConfig) -> Self {
        let tracker = if config.enabled {
            AvailabilityTracker::new(Self::NAME, config.retry_on_failure)
        } else {
            AvailabilityTracker::disabled(Self::NAME)
        };
        Self { config, tracker }
    }

    async fn embed(
        &self,
        image: &Path,
        index: usize,
        cache_dir: &Path,
    ) -> Result<ReferenceEmbedding, CapabilityError> {
        if !self.config.enabled {
            return Err(CapabilityError::Disabled);
        }

        let response =
            process::run_json(&self.config, &[OsStr::new("embed"), image.as_os_str()]).await?;
        let mut artifact: EmbeddingArtifact = serde_json::from_value(response)
            .map_err(|e| CapabilityError::Parse(format!("embed response: {}", e)))?;

        if artifact.embedding.is_empty() {
            return Err(CapabilityError::Parse("empty embedding".to_string()));
        }
        let dimension = artifact.embedding.len();
        artifact.dimension = Some(dimension);

        let embedding_path = cache_dir.join(format!("reference_{}.json", index));
        let bytes = serde_json::to_vec(&artifact)
            .map_err(|e| CapabilityError::Cache(format!("serialize embedding: {}", e)))?;
        let target = embedding_path.clone();
        tokio::task::spawn_blocking(move || brandlens_common::config::write_atomic(&target, &bytes))
            .await
            .map_err(|e| CapabilityError::Cache(format!("cache write task: {}", e)))?
            .map_err(|e| CapabilityError::Cache(e.to_string()))?;

        Ok(ReferenceEmbedding {
            index,
            source_image: image.to_path_buf(),
            embedding_path,
            dimension,
        })
    }

    async fn compare(
        &self,
        frame: &Path,
        reference: &ReferenceEmbedding,
    ) -> Result<SimilarityResult, CapabilityError> {
        let response = process::run_json(
            &self.config,
            &[
                OsStr::new("compare"),
                frame.as_os_str(),
                reference.embedding_path.as_os_str(),
            ],
        )
        .await?;
        let parsed: CompareResponse = serde_json::from_value(response)
            .map_err(|e| CapabilityError::Parse(format!("compare response: {}", e)))?;

        similarity_from_response(parsed, reference.index)
    }
}

fn similarity_from_response(
    response: CompareResponse,
    reference_index: usize,
) -> Result<SimilarityResult, CapabilityError> {
    if !response.similarity.is_finite() {
        return Err(CapabilityError::Parse(format!(
            "non-finite similarity {}",
            response.similarity
        )));
    }

    let similarity = response.similarity.clamp(0.0, 1.0);
    let confidence_bucket = response
        .confidence
        .as_deref()
        .and_then(SimilarityBucket::parse)
        .unwrap_or_else(|| SimilarityBucket::from_score(similarity));

    Ok(SimilarityResult {
        similarity,
        is_match: response.is_match.unwrap_or(similarity >= MATCH_THRESHOLD),
        confidence_bucket,
        reference_image_index: Some(reference_index),
    })
}

#[async_trait]
impl ReferenceEmbedder for SimilarityComparator {
    async fn embed_reference(
        &self,
        image: &Path,
        index: usize,
        cache_dir: &Path,
    ) -> Option<ReferenceEmbedding> {
        if !self.tracker.should_attempt() {
            return None;
        }

        match self.embed(image, index, cache_dir).await {
            Ok(reference) => {
                self.tracker.record_success();
                info!(
                    reference = %image.display(),
                    index,
                    dimension = reference.dimension,
                    "Reference embedding cached"
                );
                Some(reference)
            }
            Err(e) => {
                self.tracker.record_failure(&e);
                None
            }
        }
    }
}

#[async_trait]
impl Capability for SimilarityComparator {
    type Input = SimilarityRequest;
    type Output = Option<SimilarityResult>;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn state(&self) -> CapabilityState {
        self.tracker.state()
    }

    async fn analyze(&self, request: &SimilarityRequest) -> Option<SimilarityResult> {
        let mut best: Option<SimilarityResult> = None;

        // One comparison process at a time keeps the per-frame process count bounded
        for reference in request.references.iter() {
            if !self.config.enabled || !self.tracker.should_attempt() {
                break;
            }

            match self.compare(&request.frame_path, reference).await {
                Ok(result) => {
                    self.tracker.record_success();
                    let better = best
                        .as_ref()
                        .map_or(true, |current| result.similarity > current.similarity);
                    if better {
                        best = Some(result);
                    }
                }
                Err(e) => self.tracker.record_failure(&e),
            }
        }

        if let Some(result) = &best {
            debug!(
                frame = %request.frame_path.display(),
                similarity = result.similarity,
                is_match = result.is_match,
                reference = ?result.reference_image_index,
                "Best reference similarity"
            );
        }

        best
    }
}
