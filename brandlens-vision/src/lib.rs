//! brandlens-vision library interface
//!
//! Multi-signal visual brand detection over extracted video frames:
//! - **Tier 1** `extractors`: external capability clients (objects, text, similarity)
//! - **Tier 2** `fusion`: per-frame term matching and confidence fusion
//! - **Tier 3** `aggregation`: video-level confirmation, sentiment and similarity summary
//!
//! `workflow::VisionEngine` drives one run end to end.

pub mod aggregation;
pub mod config;
pub mod error;
pub mod extractors;
pub mod fusion;
pub mod types;
pub mod workflow;

pub use crate::config::VisionConfig;
pub use crate::error::{VisionError, VisionResult};
pub use crate::types::{AnalysisRequest, Frame, FrameAnalysis, VisualSummary};
pub use crate::workflow::VisionEngine;
