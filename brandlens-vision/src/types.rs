//! Core Types for brandlens-vision
//!
//! Data model shared by the three analysis tiers:
//! - **Tier 1:** Capability clients (object detection, text extraction, similarity)
//! - **Tier 2:** Per-frame fusion (`FrameAnalysis`)
//! - **Tier 3:** Cross-frame aggregation (`VisualSummary`)
//!
//! Everything that leaves the crate serializes with camelCase field names.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Fused confidence score (0.0-1.0)
pub type Confidence = f64;

/// Upper bound for any fused brand confidence
pub const MAX_BRAND_CONFIDENCE: Confidence = 0.95;

// ============================================================================
// Inputs
// ============================================================================

/// One extracted video frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    /// Path to the frame image file
    pub path: PathBuf,
    /// Position of the frame in the video (seconds)
    pub timestamp_seconds: f64,
}

impl Frame {
    pub fn new(path: impl Into<PathBuf>, timestamp_seconds: f64) -> Self {
        Self {
            path: path.into(),
            timestamp_seconds,
        }
    }
}

/// Everything needed for one analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    /// Identifier the persisted artifact is keyed by
    #[serde(default)]
    pub run_id: Option<String>,
    /// Extracted frames (any order; sorted by timestamp before analysis)
    pub frames: Vec<Frame>,
    /// Total video duration (seconds)
    pub video_duration_seconds: f64,
    /// Sampling interval between frames (seconds); 0 means infer from timestamps
    #[serde(default)]
    pub frame_interval_seconds: f64,
    /// Target brand, optionally comma-separated for multi-brand targets
    pub target_brand: String,
    /// Additional product names to search for
    #[serde(default)]
    pub product_names: Vec<String>,
    /// Operator-supplied reference product images
    #[serde(default)]
    pub reference_images: Vec<PathBuf>,
}

// ============================================================================
// Tier 1: Capability evidence
// ============================================================================

/// Availability of one external analysis capability
///
/// Scoped to one engine instance; never reset mid-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapabilityState {
    /// Not attempted yet
    Unknown,
    /// Last attempt succeeded
    Available,
    /// Last attempt failed (sticky only for capabilities that do not retry)
    Unavailable,
}

/// Similarity confidence bucket reported by the comparator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityBucket {
    High,
    Medium,
    Low,
    None,
}

impl SimilarityBucket {
    /// Bucket thresholds used by the comparator
    pub const HIGH_THRESHOLD: f64 = 0.45;
    pub const MEDIUM_THRESHOLD: f64 = 0.35;
    pub const LOW_THRESHOLD: f64 = 0.30;

    /// Derive the bucket from a raw similarity score
    pub fn from_score(similarity: f64) -> Self {
        if similarity >= Self::HIGH_THRESHOLD {
            Self::High
        } else if similarity >= Self::MEDIUM_THRESHOLD {
            Self::Medium
        } else if similarity >= Self::LOW_THRESHOLD {
            Self::Low
        } else {
            Self::None
        }
    }

    /// Parse the comparator's bucket label (case-insensitive)
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            "none" => Some(Self::None),
            _ => None,
        }
    }
}

/// Best reference-image similarity for one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityResult {
    /// Cosine similarity clamped to 0.0-1.0
    pub similarity: f64,
    pub is_match: bool,
    pub confidence_bucket: SimilarityBucket,
    /// Index into the request's reference images
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_image_index: Option<usize>,
}

/// Cached embedding of one reference image, valid for a single run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceEmbedding {
    /// Index into the request's reference images
    pub index: usize,
    pub source_image: PathBuf,
    /// On-disk JSON artifact holding the embedding vector
    pub embedding_path: PathBuf,
    pub dimension: usize,
}

// ============================================================================
// Tier 2: Per-frame results
// ============================================================================

/// One brand/product detected in a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandDetection {
    pub name: String,
    /// Fused confidence (0.0-0.95), never a raw sub-signal
    pub confidence: Confidence,
}

impl BrandDetection {
    pub fn new(name: impl Into<String>, confidence: Confidence) -> Self {
        Self {
            name: name.into(),
            confidence: confidence.clamp(0.0, MAX_BRAND_CONFIDENCE),
        }
    }
}

/// Analysis of a single frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameAnalysis {
    pub timestamp: f64,
    /// Distinct lowercase object labels
    pub objects: Vec<String>,
    /// Sorted by confidence, highest first
    pub brands: Vec<BrandDetection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<SimilarityResult>,
}

impl FrameAnalysis {
    /// Frame with no evidence at all
    pub fn empty(timestamp: f64) -> Self {
        Self {
            timestamp,
            objects: Vec::new(),
            brands: Vec::new(),
            similarity: None,
        }
    }
}

// ============================================================================
// Tier 3: Video-level summary
// ============================================================================

/// Cross-frame aggregate for one brand name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandAggregate {
    pub name: String,
    pub avg_confidence: Confidence,
    pub total_frames: usize,
    /// Clamped to the video duration
    pub total_visible_seconds: f64,
}

/// Verdict on whether the target brand is visible anywhere in the video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandConfirmation {
    pub detected: bool,
    pub confidence: Confidence,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_brand: Option<String>,
    pub frames_detected: usize,
    pub visible_seconds: f64,
    pub message: String,
}

/// Visual sentiment classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

/// Heuristic verdict on how favorably the visuals depict the brand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualSentiment {
    pub sentiment: Sentiment,
    /// Normalized score in -1.0..=1.0
    pub score: f64,
    pub confidence: Confidence,
    pub reasoning: String,
}

/// Reference-image similarity across the video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilaritySummary {
    pub average_similarity: f64,
    pub max_similarity: f64,
    pub matching_frames: usize,
    pub total_frames: usize,
    /// Clamped to the video duration
    pub visible_seconds: f64,
}

/// Video-level visual analysis result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualSummary {
    pub unique_objects: Vec<String>,
    pub brands_detected: Vec<BrandAggregate>,
    pub target_brand_confirmation: BrandConfirmation,
    pub visual_sentiment: VisualSentiment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual_similarity_summary: Option<SimilaritySummary>,
    pub frame_analyses: Vec<FrameAnalysis>,
}
