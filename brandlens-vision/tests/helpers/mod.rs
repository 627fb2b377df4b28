//! Test Helper Utilities
//!
//! Shared fixtures for brandlens-vision integration tests: frame files on
//! disk, engines wired to canned capabilities, and shell-script capabilities.

#![allow(dead_code)]

use brandlens_vision::aggregation::{CrossFrameAggregator, HeuristicSentimentPolicy};
use brandlens_vision::config::CapabilityConfig;
use brandlens_vision::extractors::{
    ObjectDetection, SimilarityCapability, SimilarityRequest, StaticCapability, TextExtraction,
};
use brandlens_vision::fusion::FrameAnalyzer;
use brandlens_vision::types::{
    AnalysisRequest, BrandDetection, Frame, FrameAnalysis, SimilarityBucket, SimilarityResult,
};
use brandlens_vision::workflow::{ArtifactStore, VisionEngine};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub type CannedObjects = StaticCapability<Path, Vec<String>>;
pub type CannedText = StaticCapability<Path, String>;
pub type CannedSimilarity = StaticCapability<SimilarityRequest, Option<SimilarityResult>>;

/// Engine over canned capabilities, with handles for call-count assertions
pub struct CannedEngine {
    pub engine: VisionEngine,
    pub objects: Arc<CannedObjects>,
    pub text: Arc<CannedText>,
    pub similarity: Arc<CannedSimilarity>,
}

/// Build an engine whose artifacts and caches live under `dir`
pub fn canned_engine(
    dir: &Path,
    objects: CannedObjects,
    text: CannedText,
    similarity: CannedSimilarity,
) -> CannedEngine {
    canned_engine_with_store(dir.join("artifacts"), dir.join("cache"), objects, text, similarity)
}

pub fn canned_engine_with_store(
    artifact_dir: PathBuf,
    cache_dir: PathBuf,
    objects: CannedObjects,
    text: CannedText,
    similarity: CannedSimilarity,
) -> CannedEngine {
    let objects = Arc::new(objects);
    let text = Arc::new(text);
    let similarity = Arc::new(similarity);

    let object_capability: Arc<ObjectDetection> = objects.clone();
    let text_capability: Arc<TextExtraction> = text.clone();
    let similarity_capability: Arc<dyn SimilarityCapability> = similarity.clone();

    let engine = VisionEngine::new(
        FrameAnalyzer::new(object_capability, text_capability, similarity_capability),
        CrossFrameAggregator::new(0.5, Arc::new(HeuristicSentimentPolicy::default())),
        ArtifactStore::new(artifact_dir),
        cache_dir,
    );

    CannedEngine {
        engine,
        objects,
        text,
        similarity,
    }
}

pub fn no_objects() -> CannedObjects {
    StaticCapability::new("objects", Vec::new())
}

pub fn no_text() -> CannedText {
    StaticCapability::new("text", String::new())
}

pub fn no_similarity() -> CannedSimilarity {
    StaticCapability::new("similarity", None)
}

/// Write placeholder frame images at the given timestamps
pub fn write_frames(dir: &Path, timestamps: &[f64]) -> Vec<Frame> {
    timestamps
        .iter()
        .enumerate()
        .map(|(i, ts)| {
            let path = dir.join(format!("frame_{:03}.jpg", i));
            std::fs::write(&path, b"not really a jpeg").unwrap();
            Frame::new(path, *ts)
        })
        .collect()
}

pub fn request(frames: Vec<Frame>, duration: f64, interval: f64, target: &str) -> AnalysisRequest {
    AnalysisRequest {
        run_id: Some("test-run".to_string()),
        frames,
        video_duration_seconds: duration,
        frame_interval_seconds: interval,
        target_brand: target.to_string(),
        product_names: Vec::new(),
        reference_images: Vec::new(),
    }
}

pub fn similarity(score: f64) -> SimilarityResult {
    SimilarityResult {
        similarity: score,
        is_match: score >= 0.3,
        confidence_bucket: SimilarityBucket::from_score(score),
        reference_image_index: Some(0),
    }
}

pub fn frame_analysis(timestamp: f64, objects: &[&str], brands: &[(&str, f64)]) -> FrameAnalysis {
    FrameAnalysis {
        timestamp,
        objects: objects.iter().map(|s| s.to_string()).collect(),
        brands: brands
            .iter()
            .map(|(name, confidence)| BrandDetection::new(*name, *confidence))
            .collect(),
        similarity: None,
    }
}

/// Capability config running `script` through `sh`
///
/// Scripts are never executed directly, which avoids "text file busy"
/// races between writing a script and spawning it.
pub fn script_capability(
    dir: &Path,
    name: &str,
    body: &str,
    timeout_secs: u64,
    retry_on_failure: bool,
) -> CapabilityConfig {
    let script = dir.join(format!("{}.sh", name));
    std::fs::write(&script, body).unwrap();
    CapabilityConfig {
        enabled: true,
        program: "sh".to_string(),
        args: vec![script.to_string_lossy().to_string()],
        timeout_secs,
        retry_on_failure,
    }
}

pub fn temp_dir() -> TempDir {
    TempDir::new().unwrap()
}
