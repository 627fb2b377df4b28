//! Object Detector (Tier 1)
//!
//! Runs the external object detection process on a frame image and returns
//! distinct lowercase labels. Optimistic: every frame is attempted, since the
//! detector's dependencies may be installed mid-run.
//!
//! Protocol: `<program> <args..> <image_path> <confidence_threshold>`
//! → `{"objects": ["person", "bottle", ...]}`

use super::{process, AvailabilityTracker, Capability, CapabilityError};
use crate::config::CapabilityConfig;
use crate::types::CapabilityState;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::Path;
use tracing::debug;

/// Words that mark food in OCR text or other labels
const FOOD_CONTEXT_KEYWORDS: &[&str] = &[
    "food", "snack", "chocolate", "candy", "cookie", "cookies", "chips", "cereal", "bar",
    "drink", "juice", "soda", "coffee", "tea", "milk", "sandwich", "pizza", "donut", "cake",
    "banana", "apple", "orange", "broccoli", "carrot",
];

/// Words that mark retail packaging in OCR text or other labels
const PACKAGING_CONTEXT_KEYWORDS: &[&str] = &[
    "box", "package", "packaging", "pack", "wrapper", "bag", "carton", "can", "bottle",
    "cup", "bowl", "ingredients", "nutrition", "calories", "net", "wt",
];

/// Labels the detector confuses with boxed or wrapped products
const PACKAGING_CONFUSED_LABELS: &[&str] = &["book"];

/// Labels the detector confuses with flat snack packaging
const FOOD_CONFUSED_LABELS: &[&str] = &["laptop", "keyboard"];

#[derive(Debug, Deserialize)]
struct DetectorResponse {
    objects: Vec<String>,
}

/// External object detector client
pub struct ObjectDetector {
    config: CapabilityConfig,
    confidence_threshold: f64,
    tracker: AvailabilityTracker,
}

impl ObjectDetector {
    pub const NAME: &'static str = "object_detector";

    pub fn new(config: CapabilityConfig, confidence_threshold: f64) -> Self {
        let tracker = if config.enabled {
            AvailabilityTracker::new(Self::NAME, config.retry_on_failure)
        } else {
            AvailabilityTracker::disabled(Self::NAME)
        };
        Self {
            config,
            confidence_threshold,
            tracker,
        }
    }

    async fn detect(&self, image: &Path) -> Result<Vec<String>, CapabilityError> {
        if !self.config.enabled {
            return Err(CapabilityError::Disabled);
        }

        let args = [
            image.as_os_str().to_os_string(),
            OsString::from(format!("{}", self.confidence_threshold)),
        ];
        let response = process::run_json(&self.config, &args).await?;
        let parsed: DetectorResponse = serde_json::from_value(response)
            .map_err(|e| CapabilityError::Parse(format!("objects response: {}", e)))?;

        Ok(normalize_labels(parsed.objects))
    }
}

#[async_trait]
impl Capability for ObjectDetector {
    type Input = Path;
    type Output = Vec<String>;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn state(&self) -> CapabilityState {
        self.tracker.state()
    }

    async fn analyze(&self, image: &Path) -> Vec<String> {
        if !self.tracker.should_attempt() {
            return Vec::new();
        }

        match self.detect(image).await {
            Ok(labels) => {
                self.tracker.record_success();
                debug!(frame = %image.display(), count = labels.len(), "Objects detected");
                labels
            }
            Err(e) => {
                self.tracker.record_failure(&e);
                Vec::new()
            }
        }
    }
}

/// Lowercase, trim and de-duplicate labels, keeping first-seen order
pub fn normalize_labels<I>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    labels
        .into_iter()
        .map(|label| label.trim().to_lowercase())
        .filter(|label| !label.is_empty())
        .filter(|label| seen.insert(label.clone()))
        .collect()
}

/// Drop labels the detector routinely misreads on food packaging
///
/// - `book` is dropped when food or packaging context is present
/// - `laptop` / `keyboard` are dropped when food context is present
///
/// Context comes from the extracted text and the other detected labels.
pub fn filter_false_positives(labels: Vec<String>, extracted_text: &str) -> Vec<String> {
    let text_words: Vec<String> = extracted_text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();

    let has_context = |keywords: &[&str], exclude: &str| {
        let in_text = text_words.iter().any(|w| keywords.contains(&w.as_str()));
        let in_labels = labels
            .iter()
            .filter(|label| label.as_str() != exclude)
            .flat_map(|label| label.split_whitespace())
            .any(|w| keywords.contains(&w));
        in_text || in_labels
    };

    let mut dropped = Vec::new();
    let kept: Vec<String> = labels
        .iter()
        .filter(|label| {
            let food = has_context(FOOD_CONTEXT_KEYWORDS, label.as_str());
            let packaging = food || has_context(PACKAGING_CONTEXT_KEYWORDS, label.as_str());
            let drop = (packaging && PACKAGING_CONFUSED_LABELS.contains(&label.as_str()))
                || (food && FOOD_CONFUSED_LABELS.contains(&label.as_str()));
            if drop {
                dropped.push(label.to_string());
            }
            !drop
        })
        .cloned()
        .collect();

    if !dropped.is_empty() {
        debug!(dropped = ?dropped, "Filtered false-positive object labels");
    }

    kept
}
