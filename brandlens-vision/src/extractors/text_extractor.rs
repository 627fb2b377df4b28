//! Text Extractor (Tier 1)
//!
//! Runs the external OCR process on a frame image. Optimistic, like the
//! object detector: every frame is attempted regardless of earlier failures.
//!
//! Protocol: `<program> <args..> <image_path>` → `{"text": "..."}`

use super::{process, AvailabilityTracker, Capability, CapabilityError};
use crate::config::CapabilityConfig;
use crate::types::CapabilityState;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct OcrResponse {
    #[serde(default)]
    text: Option<String>,
}

/// External OCR client
pub struct TextExtractor {
    config: CapabilityConfig,
    tracker: AvailabilityTracker,
}

impl TextExtractor {
    pub const NAME: &'static str = "text_extractor";

    pub fn new(config: CapabilityConfig) -> Self {
        let tracker = if config.enabled {
            AvailabilityTracker::new(Self::NAME, config.retry_on_failure)
        } else {
            AvailabilityTracker::disabled(Self::NAME)
        };
        Self { config, tracker }
    }

    async fn extract(&self, image: &Path) -> Result<String, CapabilityError> {
        if !self.config.enabled {
            return Err(CapabilityError::Disabled);
        }

        let response = process::run_json(&self.config, &[image.as_os_str()]).await?;
        let parsed: OcrResponse = serde_json::from_value(response)
            .map_err(|e| CapabilityError::Parse(format!("text response: {}", e)))?;

        parsed
            .text
            .map(|text| text.trim().to_string())
            .ok_or_else(|| CapabilityError::Parse("missing `text` field".to_string()))
    }
}

#[async_trait]
impl Capability for TextExtractor {
    type Input = Path;
    type Output = String;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn state(&self) -> CapabilityState {
        self.tracker.state()
    }

    async fn analyze(&self, image: &Path) -> String {
        if !self.tracker.should_attempt() {
            return String::new();
        }

        match self.extract(image).await {
            Ok(text) => {
                self.tracker.record_success();
                debug!(frame = %image.display(), chars = text.len(), "Text extracted");
                text
            }
            Err(e) => {
                self.tracker.record_failure(&e);
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_program_yields_empty_text() {
        let mut config = CapabilityConfig::text_extractor_default();
        config.program = "brandlens-missing-ocr-binary".to_string();
        let extractor = TextExtractor::new(config);

        let text = extractor.analyze(Path::new("/nonexistent.jpg")).await;

        assert!(text.is_empty());
        assert_eq!(extractor.state(), CapabilityState::Unavailable);
    }

    #[tokio::test]
    async fn test_optimistic_extractor_retries_after_failure() {
        let mut config = CapabilityConfig::text_extractor_default();
        config.program = "brandlens-missing-ocr-binary".to_string();
        let extractor = TextExtractor::new(config);

        extractor.analyze(Path::new("/a.jpg")).await;
        assert!(extractor.tracker.should_attempt());
    }
}
