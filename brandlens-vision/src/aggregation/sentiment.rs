//! Visual sentiment policies
//!
//! The heuristic weights are tuning constants, not derived values; they live
//! in a replaceable policy (configurable from the `[sentiment]` TOML section)
//! so callers can swap in a different assessment.

use crate::types::{FrameAnalysis, Sentiment, VisualSentiment};
use serde::{Deserialize, Serialize};

/// Scores how favorably a video's frames depict the target brand
pub trait SentimentPolicy: Send + Sync {
    fn assess(&self, frames: &[FrameAnalysis]) -> VisualSentiment;
}

/// Keyword-and-weight heuristic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicSentimentPolicy {
    /// Object labels that read as favorable context
    pub positive_labels: Vec<String>,
    /// Object labels that read as unfavorable context
    pub negative_labels: Vec<String>,
    pub brand_present_weight: f64,
    pub brand_absent_weight: f64,
    pub positive_context_weight: f64,
    pub negative_context_weight: f64,
    /// Normalized score beyond which a verdict is positive or negative
    pub classification_threshold: f64,
}

impl Default for HeuristicSentimentPolicy {
    fn default() -> Self {
        Self {
            positive_labels: ["person", "food", "snack"].map(String::from).to_vec(),
            negative_labels: ["trash", "damage", "garbage", "broken"]
                .map(String::from)
                .to_vec(),
            brand_present_weight: 0.4,
            brand_absent_weight: -0.1,
            positive_context_weight: 0.2,
            negative_context_weight: -0.3,
            classification_threshold: 0.2,
        }
    }
}

/// Frames over which one unit of normalization is spread
const NORMALIZATION_FRAME_FACTOR: f64 = 0.1;

impl HeuristicSentimentPolicy {
    fn has_label(objects: &[String], keywords: &[String]) -> bool {
        objects
            .iter()
            .any(|label| keywords.iter().any(|k| label.contains(k.as_str())))
    }
}

impl SentimentPolicy for HeuristicSentimentPolicy {
    fn assess(&self, frames: &[FrameAnalysis]) -> VisualSentiment {
        let mut raw = 0.0;
        let mut brand_frames = 0usize;
        let mut positive_frames = 0usize;
        let mut negative_frames = 0usize;

        for frame in frames {
            if frame.brands.is_empty() {
                raw += self.brand_absent_weight;
            } else {
                raw += self.brand_present_weight;
                brand_frames += 1;
            }
            if Self::has_label(&frame.objects, &self.positive_labels) {
                raw += self.positive_context_weight;
                positive_frames += 1;
            }
            if Self::has_label(&frame.objects, &self.negative_labels) {
                raw += self.negative_context_weight;
                negative_frames += 1;
            }
        }

        let divisor = (frames.len() as f64 * NORMALIZATION_FRAME_FACTOR).max(1.0);
        let score = (raw / divisor).clamp(-1.0, 1.0);

        let sentiment = if score > self.classification_threshold {
            Sentiment::Positive
        } else if score < -self.classification_threshold {
            Sentiment::Negative
        } else {
            Sentiment::Neutral
        };
        let confidence = (score.abs() * 0.8 + 0.2).clamp(0.5, 0.95);

        let mut reasons = Vec::new();
        if frames.is_empty() {
            reasons.push("No frames analyzed".to_string());
        } else if brand_frames > 0 {
            reasons.push(format!(
                "Brand visible in {} of {} frames",
                brand_frames,
                frames.len()
            ));
        } else {
            reasons.push("Brand not visible in any frame".to_string());
        }
        if positive_frames > 0 {
            reasons.push(format!("favorable context in {} frame(s)", positive_frames));
        }
        if negative_frames > 0 {
            reasons.push(format!("unfavorable context in {} frame(s)", negative_frames));
        }

        VisualSentiment {
            sentiment,
            score,
            confidence,
            reasoning: reasons.join("; "),
        }
    }
}
