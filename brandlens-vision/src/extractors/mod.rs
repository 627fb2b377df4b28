//! Tier 1 Capability Clients
//!
//! Each client wraps one optional external analysis process and exposes a
//! uniform `analyze(input) -> evidence` contract. Failures never cross this
//! boundary: a missing executable, non-zero exit, timeout, malformed output
//! or explicit `{"error": ...}` payload all become the signal's empty value
//! (`[]`, `""` or `None`).
//!
//! # Clients
//! 1. **object_detector** - object labels (`{"objects": [...]}`)
//! 2. **text_extractor** - OCR text (`{"text": "..."}`)
//! 3. **similarity_comparator** - reference-image similarity (`embed` / `compare`)
//!
//! # Availability
//! Every client owns an [`AvailabilityTracker`]. Clients configured with
//! `retry_on_failure = true` attempt every frame and only use the state to
//! log transitions once. Clients with `retry_on_failure = false` stop
//! attempting for the rest of the run after a missing-dependency failure.

pub mod object_detector;
pub mod process;
pub mod similarity_comparator;
pub mod static_capability;
pub mod text_extractor;

pub use object_detector::{filter_false_positives, ObjectDetector};
pub use similarity_comparator::SimilarityComparator;
pub use static_capability::StaticCapability;
pub use text_extractor::TextExtractor;

use crate::types::{CapabilityState, ReferenceEmbedding, SimilarityResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// One external analysis capability
///
/// Implementations must never fail: errors degrade to an empty `Output`.
#[async_trait]
pub trait Capability: Send + Sync {
    /// What one call analyzes (a frame path, or a similarity request)
    type Input: ?Sized + Sync;
    /// Evidence produced; its empty value means "no evidence"
    type Output: Send;

    /// Capability name for logging
    fn name(&self) -> &'static str;

    /// Current availability
    fn state(&self) -> CapabilityState;

    /// Analyze one input
    async fn analyze(&self, input: &Self::Input) -> Self::Output;
}

/// Object detection over a frame image
pub type ObjectDetection = dyn Capability<Input = Path, Output = Vec<String>>;

/// Text extraction over a frame image
pub type TextExtraction = dyn Capability<Input = Path, Output = String>;

/// Frame-vs-references similarity request
#[derive(Debug, Clone)]
pub struct SimilarityRequest {
    pub frame_path: PathBuf,
    /// Embeddings cached at run start; read-only afterwards
    pub references: Arc<[ReferenceEmbedding]>,
}

/// Produces the per-run reference embedding cache
#[async_trait]
pub trait ReferenceEmbedder: Send + Sync {
    /// Embed one reference image into `cache_dir`
    ///
    /// Returns `None` when the embedding could not be produced.
    async fn embed_reference(
        &self,
        image: &Path,
        index: usize,
        cache_dir: &Path,
    ) -> Option<ReferenceEmbedding>;
}

/// Similarity comparator: embeds references, then scores frames against them
pub trait SimilarityCapability:
    Capability<Input = SimilarityRequest, Output = Option<SimilarityResult>> + ReferenceEmbedder
{
}

impl<T> SimilarityCapability for T where
    T: Capability<Input = SimilarityRequest, Output = Option<SimilarityResult>> + ReferenceEmbedder
{
}

/// Capability call failure (never propagated past the client)
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// Disabled in configuration
    #[error("Capability disabled by configuration")]
    Disabled,

    /// Executable or runtime dependency missing
    #[error("Dependency not installed: {0}")]
    NotInstalled(String),

    /// Process exceeded its timeout and was killed
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Process could not be started
    #[error("Failed to spawn process: {0}")]
    Spawn(String),

    /// Process exited unsuccessfully without an error payload
    #[error("Process exited with code {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },

    /// Process reported `{"error": ...}`
    #[error("Capability reported error: {0}")]
    Reported(String),

    /// Output was not the expected JSON shape
    #[error("Malformed response: {0}")]
    Parse(String),

    /// Reference embedding could not be cached
    #[error("Embedding cache error: {0}")]
    Cache(String),
}

/// Substrings in error text that mean a dependency is missing
const MISSING_DEPENDENCY_MARKERS: &[&str] = &[
    "not installed",
    "no module named",
    "not in your path",
    "command not found",
];

impl CapabilityError {
    /// Whether this failure indicates missing tooling rather than a bad frame
    pub fn is_missing_dependency(&self) -> bool {
        match self {
            CapabilityError::NotInstalled(_) | CapabilityError::Disabled => true,
            CapabilityError::Reported(message) => mentions_missing_dependency(message),
            CapabilityError::Failed { stderr, .. } => mentions_missing_dependency(stderr),
            CapabilityError::Timeout(_)
            | CapabilityError::Spawn(_)
            | CapabilityError::Parse(_)
            | CapabilityError::Cache(_) => false,
        }
    }
}

fn mentions_missing_dependency(message: &str) -> bool {
    let lower = message.to_lowercase();
    MISSING_DEPENDENCY_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
}

const STATE_UNKNOWN: u8 = 0;
const STATE_AVAILABLE: u8 = 1;
const STATE_UNAVAILABLE: u8 = 2;

fn decode_state(raw: u8) -> CapabilityState {
    match raw {
        STATE_AVAILABLE => CapabilityState::Available,
        STATE_UNAVAILABLE => CapabilityState::Unavailable,
        _ => CapabilityState::Unknown,
    }
}

fn encode_state(state: CapabilityState) -> u8 {
    match state {
        CapabilityState::Unknown => STATE_UNKNOWN,
        CapabilityState::Available => STATE_AVAILABLE,
        CapabilityState::Unavailable => STATE_UNAVAILABLE,
    }
}

/// Tri-state availability of one capability, scoped to one client instance
#[derive(Debug)]
pub struct AvailabilityTracker {
    name: &'static str,
    retry_on_failure: bool,
    state: AtomicU8,
}

impl AvailabilityTracker {
    pub fn new(name: &'static str, retry_on_failure: bool) -> Self {
        Self {
            name,
            retry_on_failure,
            state: AtomicU8::new(STATE_UNKNOWN),
        }
    }

    /// Tracker for a capability disabled in configuration
    pub fn disabled(name: &'static str) -> Self {
        debug!(capability = name, "Capability disabled by configuration");
        Self {
            name,
            retry_on_failure: false,
            state: AtomicU8::new(STATE_UNAVAILABLE),
        }
    }

    pub fn state(&self) -> CapabilityState {
        decode_state(self.state.load(Ordering::Acquire))
    }

    pub fn retries_on_failure(&self) -> bool {
        self.retry_on_failure
    }

    /// Whether the next frame should invoke the capability
    pub fn should_attempt(&self) -> bool {
        self.retry_on_failure || self.state() != CapabilityState::Unavailable
    }

    fn transition(&self, next: CapabilityState) -> CapabilityState {
        decode_state(self.state.swap(encode_state(next), Ordering::AcqRel))
    }

    /// Record a successful call, logging the transition once
    pub fn record_success(&self) {
        let previous = self.transition(CapabilityState::Available);
        if previous != CapabilityState::Available {
            info!(capability = self.name, "Capability available");
        }
    }

    /// Record a failed call
    ///
    /// Only a missing dependency marks the capability `Unavailable`; for a
    /// non-retrying capability that is final for the run. Any other failure
    /// empties this frame's evidence and leaves the state alone.
    pub fn record_failure(&self, error: &CapabilityError) {
        if !error.is_missing_dependency() {
            debug!(
                capability = self.name,
                error = %error,
                "Capability call failed, evidence empty for this frame"
            );
            return;
        }

        let previous = self.transition(CapabilityState::Unavailable);
        if previous == CapabilityState::Unavailable {
            debug!(
                capability = self.name,
                error = %error,
                "Capability still unavailable"
            );
        } else if self.retry_on_failure {
            warn!(
                capability = self.name,
                error = %error,
                "Capability unavailable, will keep retrying each frame"
            );
        } else {
            warn!(
                capability = self.name,
                error = %error,
                "Capability unavailable, disabled for the rest of the run"
            );
        }
    }
}
