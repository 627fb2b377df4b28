// Frame Analyzer - Per-Frame Multi-Signal Brand Detection
//
// Runs the three capability clients concurrently for one frame, then fuses
// textual, contextual and similarity evidence into brand detections.

use crate::extractors::{
    filter_false_positives, Capability, ObjectDetection, SimilarityCapability, SimilarityRequest,
    TextExtraction,
};
use crate::fusion::terms::BrandTerms;
use crate::fusion::text_matcher::match_term;
use crate::types::{
    BrandDetection, CapabilityState, Confidence, Frame, FrameAnalysis, ReferenceEmbedding,
    SimilarityResult, MAX_BRAND_CONFIDENCE,
};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

/// Object labels that corroborate on-package branding
pub const BRAND_CONTEXT_KEYWORDS: &[&str] = &[
    "bottle", "box", "can", "cup", "bag", "package", "wrapper", "carton", "chocolate", "snack",
    "candy", "cookie",
];

const TEXT_BASE_CONFIDENCE: Confidence = 0.5;
const OCCURRENCE_BOOST: Confidence = 0.05;
const MAX_OCCURRENCE_BOOST: Confidence = 0.2;
const UPPERCASE_BOOST: Confidence = 0.2;
const FULL_TARGET_BOOST: Confidence = 0.15;
const PRIMARY_BRAND_BOOST: Confidence = 0.1;
const PRODUCT_BOOST: Confidence = 0.1;
const CONTEXT_BOOST: Confidence = 0.1;

/// Weight of existing confidence when fusing in a similarity match
const FUSION_TEXT_WEIGHT: f64 = 0.6;
const FUSION_SIMILARITY_WEIGHT: f64 = 0.4;
/// Scale applied to similarity when it is the only evidence
const SIMILARITY_ONLY_WEIGHT: f64 = 0.8;
/// Similarity-only detections below this are discarded
const SIMILARITY_ONLY_FLOOR: Confidence = 0.3;

/// Per-frame analyzer over the three capability clients
pub struct FrameAnalyzer {
    object_detector: Arc<ObjectDetection>,
    text_extractor: Arc<TextExtraction>,
    similarity: Arc<dyn SimilarityCapability>,
}

impl FrameAnalyzer {
    pub fn new(
        object_detector: Arc<ObjectDetection>,
        text_extractor: Arc<TextExtraction>,
        similarity: Arc<dyn SimilarityCapability>,
    ) -> Self {
        Self {
            object_detector,
            text_extractor,
            similarity,
        }
    }

    /// Comparator that also produces the run's reference embeddings
    pub fn similarity(&self) -> &Arc<dyn SimilarityCapability> {
        &self.similarity
    }

    /// Current availability of every capability, by name
    pub fn capability_states(&self) -> [(&'static str, CapabilityState); 3] {
        [
            (self.object_detector.name(), self.object_detector.state()),
            (self.text_extractor.name(), self.text_extractor.state()),
            (self.similarity.name(), self.similarity.state()),
        ]
    }

    /// Analyze one frame
    ///
    /// A missing or unreadable frame file yields an all-empty analysis.
    /// Otherwise the three capability calls run concurrently and all of them
    /// settle before fusion starts.
    pub async fn analyze_frame(
        &self,
        frame: &Frame,
        terms: &BrandTerms,
        references: &Arc<[ReferenceEmbedding]>,
    ) -> FrameAnalysis {
        if let Err(e) = tokio::fs::File::open(&frame.path).await {
            debug!(
                frame = %frame.path.display(),
                error = %e,
                "Frame unreadable, no evidence for this frame"
            );
            return FrameAnalysis::empty(frame.timestamp_seconds);
        }

        let request = SimilarityRequest {
            frame_path: frame.path.clone(),
            references: Arc::clone(references),
        };
        let similarity_call = async {
            if request.references.is_empty() {
                None
            } else {
                self.similarity.analyze(&request).await
            }
        };

        let (objects, text, similarity) = tokio::join!(
            self.object_detector.analyze(frame.path.as_path()),
            self.text_extractor.analyze(frame.path.as_path()),
            similarity_call,
        );

        let objects = filter_false_positives(objects, &text);
        let brands = detect_brands(&text, &objects, terms, similarity.as_ref());

        debug!(
            frame = %frame.path.display(),
            timestamp = frame.timestamp_seconds,
            objects = objects.len(),
            brands = brands.len(),
            similarity = similarity.as_ref().map(|s| s.similarity),
            "Frame analyzed"
        );

        FrameAnalysis {
            timestamp: frame.timestamp_seconds,
            objects,
            brands,
            similarity,
        }
    }
}

/// Fuse text, object context and similarity evidence into brand detections
///
/// # Arguments
/// * `text` - Raw extracted text for the frame
/// * `objects` - Filtered object labels for the frame
/// * `terms` - Parsed brand/product vocabulary
/// * `similarity` - Best reference similarity for the frame, if any
///
/// # Returns
/// * Detections sorted by confidence (highest first), then name
pub fn detect_brands(
    text: &str,
    objects: &[String],
    terms: &BrandTerms,
    similarity: Option<&SimilarityResult>,
) -> Vec<BrandDetection> {
    let mut detections = text_detections(text, terms);

    let has_brand_context = objects
        .iter()
        .any(|label| BRAND_CONTEXT_KEYWORDS.iter().any(|k| label.contains(k)));
    if has_brand_context {
        for detection in &mut detections {
            detection.confidence = capped(detection.confidence + CONTEXT_BOOST);
        }
    }

    if let Some(result) = similarity.filter(|s| s.is_match) {
        if detections.is_empty() {
            let confidence = SIMILARITY_ONLY_WEIGHT * result.similarity;
            if confidence >= SIMILARITY_ONLY_FLOOR && !terms.primary_brand.is_empty() {
                detections.push(BrandDetection::new(terms.primary_brand.clone(), confidence));
            }
        } else {
            for detection in &mut detections {
                detection.confidence = capped(
                    FUSION_TEXT_WEIGHT * detection.confidence
                        + FUSION_SIMILARITY_WEIGHT * result.similarity,
                );
            }
        }
    }

    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    detections
}

fn text_detections(text: &str, terms: &BrandTerms) -> Vec<BrandDetection> {
    let mut detections = Vec::new();
    if text.trim().is_empty() {
        return detections;
    }

    // `all_terms` always carries the full target, so a full-target match is
    // recorded here with its own boost
    for term in &terms.all_terms {
        let matched = match_term(term, text);
        if !matched.found {
            continue;
        }

        let mut confidence = TEXT_BASE_CONFIDENCE
            + (OCCURRENCE_BOOST * matched.occurrences as f64).min(MAX_OCCURRENCE_BOOST);
        if matched.has_uppercase {
            confidence += UPPERCASE_BOOST;
        }
        if terms.is_full_target(term) {
            confidence += FULL_TARGET_BOOST;
        }
        if terms.is_primary(term) {
            confidence += PRIMARY_BRAND_BOOST;
        }
        if terms.is_product(term) {
            confidence += PRODUCT_BOOST;
        }
        detections.push(BrandDetection::new(term.clone(), capped(confidence)));
    }

    detections
}

fn capped(confidence: Confidence) -> Confidence {
    confidence.min(MAX_BRAND_CONFIDENCE)
}
