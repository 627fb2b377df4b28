//! In-process capability returning canned results
//!
//! Lets the fusion and aggregation tiers run without any external tooling.
//! Results are keyed by frame path; unknown frames get the fallback value.

use super::{Capability, ReferenceEmbedder, SimilarityRequest};
use crate::types::{CapabilityState, ReferenceEmbedding, SimilarityResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Inputs a canned capability can look results up by
pub trait CannedKey: Sync {
    fn frame_path(&self) -> &Path;
}

impl CannedKey for Path {
    fn frame_path(&self) -> &Path {
        self
    }
}

impl CannedKey for SimilarityRequest {
    fn frame_path(&self) -> &Path {
        &self.frame_path
    }
}

/// Canned-result capability
pub struct StaticCapability<I: ?Sized, O> {
    name: &'static str,
    responses: HashMap<PathBuf, O>,
    fallback: O,
    calls: AtomicUsize,
    embeddings: AtomicUsize,
    _input: PhantomData<fn(&I)>,
}

impl<I: ?Sized, O> StaticCapability<I, O> {
    /// Capability answering `fallback` for every frame
    pub fn new(name: &'static str, fallback: O) -> Self {
        Self {
            name,
            responses: HashMap::new(),
            fallback,
            calls: AtomicUsize::new(0),
            embeddings: AtomicUsize::new(0),
            _input: PhantomData,
        }
    }

    /// Answer `output` for `frame`
    pub fn with_response(mut self, frame: impl Into<PathBuf>, output: O) -> Self {
        self.responses.insert(frame.into(), output);
        self
    }

    /// Number of `analyze` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of `embed_reference` calls so far
    pub fn embeddings(&self) -> usize {
        self.embeddings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<I, O> Capability for StaticCapability<I, O>
where
    I: CannedKey + ?Sized,
    O: Clone + Send + Sync,
{
    type Input = I;
    type Output = O;

    fn name(&self) -> &'static str {
        self.name
    }

    fn state(&self) -> CapabilityState {
        CapabilityState::Available
    }

    async fn analyze(&self, input: &I) -> O {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .get(input.frame_path())
            .unwrap_or(&self.fallback)
            .clone()
    }
}

#[async_trait]
impl ReferenceEmbedder for StaticCapability<SimilarityRequest, Option<SimilarityResult>> {
    async fn embed_reference(
        &self,
        image: &Path,
        index: usize,
        cache_dir: &Path,
    ) -> Option<ReferenceEmbedding> {
        self.embeddings.fetch_add(1, Ordering::SeqCst);
        Some(ReferenceEmbedding {
            index,
            source_image: image.to_path_buf(),
            embedding_path: cache_dir.join(format!("reference_{}.json", index)),
            dimension: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_canned_response_by_frame() {
        let capability: StaticCapability<Path, Vec<String>> =
            StaticCapability::new("objects", Vec::new())
                .with_response("/frames/1.jpg", vec!["bottle".to_string()]);

        assert_eq!(
            capability.analyze(Path::new("/frames/1.jpg")).await,
            vec!["bottle".to_string()]
        );
        assert!(capability.analyze(Path::new("/frames/2.jpg")).await.is_empty());
        assert_eq!(capability.calls(), 2);
    }
}
