//! Tier 3 Cross-Frame Aggregation
//!
//! Turns the ordered `FrameAnalysis` list into one `VisualSummary`:
//! unique objects, per-brand aggregates, the target confirmation verdict,
//! visual sentiment and the similarity summary.
//!
//! Aggregation is a pure function of its inputs. Ordered collections are
//! used throughout so repeated runs serialize identically.

pub mod confirmation;
pub mod sentiment;

pub use confirmation::confirm_target_brand;
pub use sentiment::{HeuristicSentimentPolicy, SentimentPolicy};

use crate::fusion::parse_brand_and_products;
use crate::types::{BrandAggregate, Confidence, FrameAnalysis, SimilaritySummary, VisualSummary};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

/// Video-level parameters the aggregator needs besides the frames
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationContext {
    pub frame_interval_seconds: f64,
    pub video_duration_seconds: f64,
    pub target_brand: String,
    pub product_names: Vec<String>,
}

/// `frames × interval`, clamped to `[0, duration]`
pub fn visible_seconds(
    frames: usize,
    frame_interval_seconds: f64,
    video_duration_seconds: f64,
) -> f64 {
    let raw = frames as f64 * frame_interval_seconds;
    raw.min(video_duration_seconds).max(0.0)
}

/// Builds the video-level summary
pub struct CrossFrameAggregator {
    min_brand_confidence: Confidence,
    sentiment_policy: Arc<dyn SentimentPolicy>,
}

impl CrossFrameAggregator {
    pub fn new(
        min_brand_confidence: Confidence,
        sentiment_policy: Arc<dyn SentimentPolicy>,
    ) -> Self {
        Self {
            min_brand_confidence,
            sentiment_policy,
        }
    }

    pub fn aggregate(
        &self,
        frames: &[FrameAnalysis],
        context: &AggregationContext,
    ) -> VisualSummary {
        let terms = parse_brand_and_products(&context.target_brand, &context.product_names);

        let unique_objects: Vec<String> = frames
            .iter()
            .flat_map(|frame| frame.objects.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let brands_detected = self.brand_aggregates(frames, context);

        let target_brand_confirmation = confirm_target_brand(
            &brands_detected,
            frames,
            &terms,
            context.frame_interval_seconds,
            context.video_duration_seconds,
        );

        let visual_sentiment = self.sentiment_policy.assess(frames);
        let visual_similarity_summary = similarity_summary(frames, context);

        debug!(
            frames = frames.len(),
            unique_objects = unique_objects.len(),
            brands = brands_detected.len(),
            detected = target_brand_confirmation.detected,
            "Cross-frame aggregation complete"
        );

        VisualSummary {
            unique_objects,
            brands_detected,
            target_brand_confirmation,
            visual_sentiment,
            visual_similarity_summary,
            frame_analyses: frames.to_vec(),
        }
    }

    fn brand_aggregates(
        &self,
        frames: &[FrameAnalysis],
        context: &AggregationContext,
    ) -> Vec<BrandAggregate> {
        // name -> (confidence sum, frame count)
        let mut totals: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
        for frame in frames {
            let mut seen_in_frame = BTreeSet::new();
            for detection in &frame.brands {
                if !seen_in_frame.insert(detection.name.as_str()) {
                    continue;
                }
                let entry = totals.entry(detection.name.as_str()).or_insert((0.0, 0));
                entry.0 += detection.confidence;
                entry.1 += 1;
            }
        }

        let mut aggregates: Vec<BrandAggregate> = totals
            .into_iter()
            .map(|(name, (sum, count))| BrandAggregate {
                name: name.to_string(),
                avg_confidence: sum / count as f64,
                total_frames: count,
                total_visible_seconds: visible_seconds(
                    count,
                    context.frame_interval_seconds,
                    context.video_duration_seconds,
                ),
            })
            .filter(|aggregate| aggregate.avg_confidence >= self.min_brand_confidence)
            .collect();

        aggregates.sort_by(|a, b| {
            b.avg_confidence
                .partial_cmp(&a.avg_confidence)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
        aggregates
    }
}

fn similarity_summary(
    frames: &[FrameAnalysis],
    context: &AggregationContext,
) -> Option<SimilaritySummary> {
    let results: Vec<_> = frames.iter().filter_map(|f| f.similarity.as_ref()).collect();
    if results.is_empty() {
        return None;
    }

    let total = results.iter().map(|r| r.similarity).sum::<f64>();
    let max_similarity = results.iter().map(|r| r.similarity).fold(0.0, f64::max);
    let matching_frames = results.iter().filter(|r| r.is_match).count();

    Some(SimilaritySummary {
        average_similarity: total / results.len() as f64,
        max_similarity,
        matching_frames,
        total_frames: results.len(),
        visible_seconds: visible_seconds(
            matching_frames,
            context.frame_interval_seconds,
            context.video_duration_seconds,
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BrandDetection, SimilarityBucket, SimilarityResult};

    fn aggregator() -> CrossFrameAggregator {
        CrossFrameAggregator::new(0.5, Arc::new(HeuristicSentimentPolicy::default()))
    }

    fn context(interval: f64, duration: f64) -> AggregationContext {
        AggregationContext {
            frame_interval_seconds: interval,
            video_duration_seconds: duration,
            target_brand: "Acme".to_string(),
            product_names: Vec::new(),
        }
    }

    fn frame(timestamp: f64, objects: &[&str], brands: &[(&str, f64)]) -> FrameAnalysis {
        FrameAnalysis {
            timestamp,
            objects: objects.iter().map(|s| s.to_string()).collect(),
            brands: brands
                .iter()
                .map(|(name, c)| BrandDetection::new(*name, *c))
                .collect(),
            similarity: None,
        }
    }

    #[test]
    fn test_visible_seconds_clamped() {
        assert_eq!(visible_seconds(3, 2.0, 9.0), 6.0);
        assert_eq!(visible_seconds(5, 2.0, 9.0), 9.0);
        assert_eq!(visible_seconds(0, 2.0, 9.0), 0.0);
    }

    #[test]
    fn test_brand_aggregates_averaged_and_filtered() {
        let frames = vec![
            frame(0.0, &[], &[("Acme", 0.9), ("Noise", 0.3)]),
            frame(2.0, &[], &[("Acme", 0.7)]),
        ];

        let summary = aggregator().aggregate(&frames, &context(2.0, 10.0));

        assert_eq!(summary.brands_detected.len(), 1);
        let acme = &summary.brands_detected[0];
        assert_eq!(acme.name, "Acme");
        assert!((acme.avg_confidence - 0.8).abs() < 1e-9);
        assert_eq!(acme.total_frames, 2);
        assert_eq!(acme.total_visible_seconds, 4.0);
    }

    #[test]
    fn test_unique_objects_sorted() {
        let frames = vec![
            frame(0.0, &["person", "bottle"], &[]),
            frame(1.0, &["bottle", "cup"], &[]),
        ];

        let summary = aggregator().aggregate(&frames, &context(1.0, 2.0));
        assert_eq!(summary.unique_objects, vec!["bottle", "cup", "person"]);
    }

    #[test]
    fn test_similarity_summary() {
        let mut frames = vec![frame(0.0, &[], &[]), frame(1.0, &[], &[]), frame(2.0, &[], &[])];
        frames[0].similarity = Some(SimilarityResult {
            similarity: 0.5,
            is_match: true,
            confidence_bucket: SimilarityBucket::High,
            reference_image_index: Some(0),
        });
        frames[1].similarity = Some(SimilarityResult {
            similarity: 0.1,
            is_match: false,
            confidence_bucket: SimilarityBucket::None,
            reference_image_index: Some(0),
        });

        let summary = aggregator().aggregate(&frames, &context(1.0, 3.0));
        let similarity = summary.visual_similarity_summary.unwrap();

        assert!((similarity.average_similarity - 0.3).abs() < 1e-9);
        assert_eq!(similarity.max_similarity, 0.5);
        assert_eq!(similarity.matching_frames, 1);
        assert_eq!(similarity.total_frames, 2);
        assert_eq!(similarity.visible_seconds, 1.0);
    }

    #[test]
    fn test_no_similarity_summary_without_results() {
        let summary = aggregator().aggregate(&[frame(0.0, &[], &[])], &context(1.0, 1.0));
        assert!(summary.visual_similarity_summary.is_none());
    }

    #[test]
    fn test_empty_input() {
        let summary = aggregator().aggregate(&[], &context(1.0, 0.0));

        assert!(summary.unique_objects.is_empty());
        assert!(summary.brands_detected.is_empty());
        assert!(!summary.target_brand_confirmation.detected);
        assert!(summary.target_brand_confirmation.message.starts_with("No, "));
    }
}
