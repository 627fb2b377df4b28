//! Run workflow for visual brand analysis
//!
//! One `VisionEngine::analyze` call processes one video:
//! 1. Clamp out-of-range request values and resolve the run identifier
//! 2. Parse the brand/product vocabulary
//! 3. Embed reference images into the run's cache (before any frame)
//! 4. Analyze frames sequentially in timestamp order
//! 5. Aggregate into a `VisualSummary`
//! 6. Persist the run artifact (failure is logged, never fatal)
//!
//! Frames are never analyzed in parallel, which bounds the number of live
//! external processes to one per capability.
//!
//! Capability availability lives inside the engine's clients, so construct
//! one engine per run when runs must not share availability state.

pub mod storage;

pub use storage::ArtifactStore;

use crate::aggregation::{AggregationContext, CrossFrameAggregator};
use crate::config::VisionConfig;
use crate::error::{VisionError, VisionResult};
use crate::extractors::{
    ObjectDetection, ObjectDetector, ReferenceEmbedder, SimilarityCapability, SimilarityComparator,
    TextExtraction, TextExtractor,
};
use crate::fusion::{parse_brand_and_products, FrameAnalyzer};
use crate::types::{AnalysisRequest, Frame, ReferenceEmbedding, VisualSummary};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Frame interval assumed when none is given and timestamps cannot tell
pub const DEFAULT_FRAME_INTERVAL_SECONDS: f64 = 1.0;

/// Visual brand analysis engine
pub struct VisionEngine {
    analyzer: FrameAnalyzer,
    aggregator: CrossFrameAggregator,
    store: ArtifactStore,
    cache_dir: PathBuf,
}

impl VisionEngine {
    pub fn new(
        analyzer: FrameAnalyzer,
        aggregator: CrossFrameAggregator,
        store: ArtifactStore,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            analyzer,
            aggregator,
            store,
            cache_dir: cache_dir.into(),
        }
    }

    /// Engine backed by the external capability processes in `config`
    pub fn from_config(config: &VisionConfig) -> Self {
        let object_detector: Arc<ObjectDetection> = Arc::new(ObjectDetector::new(
            config.object_detector.clone(),
            config.detection_threshold,
        ));
        let text_extractor: Arc<TextExtraction> =
            Arc::new(TextExtractor::new(config.text_extractor.clone()));
        let similarity: Arc<dyn SimilarityCapability> =
            Arc::new(SimilarityComparator::new(config.similarity.clone()));

        Self::new(
            FrameAnalyzer::new(object_detector, text_extractor, similarity),
            CrossFrameAggregator::new(
                config.aggregation.min_brand_confidence,
                Arc::new(config.sentiment.clone()),
            ),
            ArtifactStore::new(config.storage.artifact_dir.clone()),
            config.storage.cache_dir.clone(),
        )
    }

    pub fn analyzer(&self) -> &FrameAnalyzer {
        &self.analyzer
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Analyze one video's frames
    ///
    /// Always produces a summary: out-of-range request values are clamped,
    /// and every capability, frame or persistence failure degrades to less
    /// evidence.
    pub async fn analyze(&self, request: AnalysisRequest) -> VisualSummary {
        let request = sanitize_request(request);

        let started = Instant::now();
        let run_id = request
            .run_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let terms = parse_brand_and_products(&request.target_brand, &request.product_names);
        info!(
            run_id = %run_id,
            frames = request.frames.len(),
            target = %terms.full_target,
            terms = terms.all_terms.len(),
            references = request.reference_images.len(),
            "Starting visual analysis"
        );

        let references = self
            .embed_references(&request.reference_images, &run_id)
            .await;

        let mut frames = request.frames;
        frames.sort_by(|a, b| a.timestamp_seconds.total_cmp(&b.timestamp_seconds));

        let frame_interval_seconds = if request.frame_interval_seconds > 0.0 {
            request.frame_interval_seconds
        } else {
            let inferred = infer_frame_interval(&frames);
            debug!(interval = inferred, "Frame interval inferred from timestamps");
            inferred
        };

        let mut analyses = Vec::with_capacity(frames.len());
        for (index, frame) in frames.iter().enumerate() {
            debug!(index, total = frames.len(), "Analyzing frame");
            analyses.push(self.analyzer.analyze_frame(frame, &terms, &references).await);
        }

        let context = AggregationContext {
            frame_interval_seconds,
            video_duration_seconds: request.video_duration_seconds,
            target_brand: request.target_brand,
            product_names: request.product_names,
        };
        let summary = self.aggregator.aggregate(&analyses, &context);

        if let Err(e) = self.store.persist(&run_id, &summary).await {
            warn!(run_id = %run_id, error = %e, "Failed to persist analysis artifact");
        }

        for (capability, state) in self.analyzer.capability_states() {
            debug!(capability, state = ?state, "Capability state at end of run");
        }
        info!(
            run_id = %run_id,
            detected = summary.target_brand_confirmation.detected,
            confidence = summary.target_brand_confirmation.confidence,
            sentiment = ?summary.visual_sentiment.sentiment,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Visual analysis complete"
        );

        summary
    }

    /// Embed every reference image once, sequentially, before frame processing
    async fn embed_references(
        &self,
        images: &[PathBuf],
        run_id: &str,
    ) -> Arc<[ReferenceEmbedding]> {
        if images.is_empty() {
            return Arc::from(Vec::new());
        }

        let cache_dir = self.cache_dir.join(storage::sanitize_run_id(run_id));
        let mut embeddings = Vec::with_capacity(images.len());
        for (index, image) in images.iter().enumerate() {
            let is_file = tokio::fs::metadata(image)
                .await
                .map(|meta| meta.is_file())
                .unwrap_or(false);
            if !is_file {
                warn!(reference = %image.display(), "Reference image missing, skipped");
                continue;
            }
            if let Some(embedding) = self
                .analyzer
                .similarity()
                .embed_reference(image, index, &cache_dir)
                .await
            {
                embeddings.push(embedding);
            }
        }

        if embeddings.is_empty() {
            warn!(
                references = images.len(),
                "No reference embeddings available, similarity disabled for this run"
            );
        }
        Arc::from(embeddings)
    }
}

/// Load an `AnalysisRequest` from a JSON manifest
///
/// Relative frame and reference paths are resolved against the manifest's
/// directory.
pub fn load_request(manifest: &Path) -> VisionResult<AnalysisRequest> {
    let content = std::fs::read_to_string(manifest)
        .map_err(|e| VisionError::Manifest(format!("{}: {}", manifest.display(), e)))?;
    let mut request: AnalysisRequest = serde_json::from_str(&content)
        .map_err(|e| VisionError::Manifest(format!("{}: {}", manifest.display(), e)))?;

    let base = manifest.parent().unwrap_or_else(|| Path::new(""));
    for frame in &mut request.frames {
        if frame.path.is_relative() {
            frame.path = base.join(&frame.path);
        }
    }
    for image in &mut request.reference_images {
        if image.is_relative() {
            *image = base.join(&*image);
        }
    }

    debug!(
        manifest = %manifest.display(),
        frames = request.frames.len(),
        "Analysis request loaded"
    );
    Ok(request)
}

/// Clamp request values the engine cannot use
///
/// Negative or non-finite durations and intervals become 0 (an interval of 0
/// is then inferred from timestamps); frames with non-finite timestamps are
/// dropped. An empty target simply matches nothing.
fn sanitize_request(mut request: AnalysisRequest) -> AnalysisRequest {
    if !request.video_duration_seconds.is_finite() || request.video_duration_seconds < 0.0 {
        warn!(
            duration = request.video_duration_seconds,
            "Invalid video duration, treating as 0s"
        );
        request.video_duration_seconds = 0.0;
    }
    if !request.frame_interval_seconds.is_finite() || request.frame_interval_seconds < 0.0 {
        warn!(
            interval = request.frame_interval_seconds,
            "Invalid frame interval, inferring from timestamps"
        );
        request.frame_interval_seconds = 0.0;
    }

    let before = request.frames.len();
    request.frames.retain(|f| f.timestamp_seconds.is_finite());
    if request.frames.len() < before {
        warn!(
            dropped = before - request.frames.len(),
            "Frames with non-finite timestamps skipped"
        );
    }

    if request.target_brand.trim().is_empty() {
        warn!("Empty target brand, nothing can be confirmed");
    }
    request
}

/// Median positive gap between sorted frame timestamps
pub fn infer_frame_interval(frames: &[Frame]) -> f64 {
    let mut gaps: Vec<f64> = frames
        .windows(2)
        .map(|pair| pair[1].timestamp_seconds - pair[0].timestamp_seconds)
        .filter(|gap| *gap > 0.0)
        .collect();
    if gaps.is_empty() {
        return DEFAULT_FRAME_INTERVAL_SECONDS;
    }

    gaps.sort_by(f64::total_cmp);
    let mid = gaps.len() / 2;
    if gaps.len() % 2 == 0 {
        (gaps[mid - 1] + gaps[mid]) / 2.0
    } else {
        gaps[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(target: &str, duration: f64) -> AnalysisRequest {
        AnalysisRequest {
            run_id: None,
            frames: Vec::new(),
            video_duration_seconds: duration,
            frame_interval_seconds: 0.0,
            target_brand: target.to_string(),
            product_names: Vec::new(),
            reference_images: Vec::new(),
        }
    }

    #[test]
    fn test_sanitize_request_clamps() {
        let mut raw = request("Acme", -1.0);
        raw.frame_interval_seconds = f64::INFINITY;
        raw.frames = vec![Frame::new("/a.jpg", 0.0), Frame::new("/b.jpg", f64::NAN)];

        let clean = sanitize_request(raw);

        assert_eq!(clean.video_duration_seconds, 0.0);
        assert_eq!(clean.frame_interval_seconds, 0.0);
        assert_eq!(clean.frames.len(), 1);
        assert_eq!(sanitize_request(request("Acme", f64::NAN)).video_duration_seconds, 0.0);
        assert_eq!(sanitize_request(request("Acme", 12.5)).video_duration_seconds, 12.5);
    }

    #[test]
    fn test_infer_frame_interval() {
        let frames: Vec<Frame> = [0.0, 2.0, 4.0, 7.0]
            .iter()
            .map(|t| Frame::new("/f.jpg", *t))
            .collect();
        assert_eq!(infer_frame_interval(&frames), 2.0);

        let even: Vec<Frame> = [0.0, 1.0, 4.0]
            .iter()
            .map(|t| Frame::new("/f.jpg", *t))
            .collect();
        assert_eq!(infer_frame_interval(&even), 2.0);
    }

    #[test]
    fn test_infer_frame_interval_fallback() {
        assert_eq!(infer_frame_interval(&[]), DEFAULT_FRAME_INTERVAL_SECONDS);
        assert_eq!(
            infer_frame_interval(&[Frame::new("/a.jpg", 3.0), Frame::new("/b.jpg", 3.0)]),
            DEFAULT_FRAME_INTERVAL_SECONDS
        );
    }
}
