//! Capability client tests against real child processes
//!
//! Each capability is a small shell script speaking the JSON protocol, so
//! these tests only run on Unix.

#![cfg(unix)]

mod helpers;

use brandlens_vision::extractors::{
    Capability, ObjectDetector, ReferenceEmbedder, SimilarityComparator, SimilarityRequest,
    TextExtractor,
};
use brandlens_vision::types::{CapabilityState, ReferenceEmbedding, SimilarityBucket};
use brandlens_vision::{VisionConfig, VisionEngine};
use helpers::*;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

const SIMILARITY_SCRIPT: &str = r#"
case "$1" in
  embed) echo '{"embedding": [0.1, 0.2, 0.3], "dimension": 3}' ;;
  compare) echo '{"similarity": 0.41, "match": true, "confidence": "medium"}' ;;
  *) echo '{"error": "unknown command"}'; exit 1 ;;
esac
"#;

#[tokio::test]
async fn test_detector_parses_labels_and_passes_threshold() {
    let dir = temp_dir();
    let config = script_capability(
        dir.path(),
        "detect",
        r#"echo "loading model"
printf '{"objects": ["Person", "bottle", "person", "threshold %s"]}\n' "$2"
"#,
        10,
        true,
    );
    let detector = ObjectDetector::new(config, 0.4);

    let labels = detector.analyze(Path::new("/frames/f1.jpg")).await;

    assert_eq!(labels, vec!["person", "bottle", "threshold 0.4"]);
    assert_eq!(detector.state(), CapabilityState::Available);
}

#[tokio::test]
async fn test_text_extractor_error_payload_degrades_to_empty() {
    let dir = temp_dir();
    let config = script_capability(
        dir.path(),
        "ocr",
        r#"echo '{"error": "easyocr not installed. Run: pip install easyocr"}'
exit 1
"#,
        10,
        true,
    );
    let extractor = TextExtractor::new(config);

    assert_eq!(extractor.analyze(Path::new("/frames/f1.jpg")).await, "");
    assert_eq!(extractor.state(), CapabilityState::Unavailable);
}

#[tokio::test]
async fn test_text_extractor_recovers_when_tooling_appears() {
    let dir = temp_dir();
    let marker = dir.path().join("installed");
    let body = format!(
        r#"if [ -f '{}' ]; then
  echo '{{"text": "  ACME  "}}'
else
  echo "No module named 'easyocr'" >&2
  exit 1
fi
"#,
        marker.display()
    );
    let extractor = TextExtractor::new(script_capability(dir.path(), "ocr", &body, 10, true));

    assert_eq!(extractor.analyze(Path::new("/frames/f1.jpg")).await, "");
    assert_eq!(extractor.state(), CapabilityState::Unavailable);

    std::fs::write(&marker, b"").unwrap();
    assert_eq!(extractor.analyze(Path::new("/frames/f2.jpg")).await, "ACME");
    assert_eq!(extractor.state(), CapabilityState::Available);
}

#[tokio::test]
async fn test_detector_stays_available_after_bad_frame() {
    let dir = temp_dir();
    let config = script_capability(
        dir.path(),
        "detect",
        r#"case "$1" in
  */f1.jpg) echo '{"objects": ["person"]}' ;;
  *) echo 'Segmentation fault (core dumped)' ;;
esac
"#,
        10,
        true,
    );
    let detector = ObjectDetector::new(config, 0.25);

    assert_eq!(detector.analyze(Path::new("/frames/f1.jpg")).await, vec!["person"]);
    assert_eq!(detector.state(), CapabilityState::Available);

    // Unparseable output is a per-frame failure, not missing tooling
    assert!(detector.analyze(Path::new("/frames/f2.jpg")).await.is_empty());
    assert_eq!(detector.state(), CapabilityState::Available);
}

#[tokio::test]
async fn test_hung_process_times_out() {
    let dir = temp_dir();
    let config = script_capability(dir.path(), "hang", "exec sleep 30\n", 1, true);
    let detector = ObjectDetector::new(config, 0.25);

    let started = Instant::now();
    let labels = detector.analyze(Path::new("/frames/f1.jpg")).await;

    assert!(labels.is_empty());
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_similarity_embed_and_compare() {
    let dir = temp_dir();
    let comparator = SimilarityComparator::new(script_capability(
        dir.path(),
        "clip",
        SIMILARITY_SCRIPT,
        10,
        false,
    ));
    let cache_dir = dir.path().join("cache");

    let reference = comparator
        .embed_reference(Path::new("/refs/pack.png"), 0, &cache_dir)
        .await
        .unwrap();
    assert_eq!(reference.dimension, 3);
    assert_eq!(reference.embedding_path, cache_dir.join("reference_0.json"));
    assert!(reference.embedding_path.is_file());

    let result = comparator
        .analyze(&SimilarityRequest {
            frame_path: "/frames/f1.jpg".into(),
            references: Arc::from(vec![reference]),
        })
        .await
        .unwrap();

    assert_eq!(result.similarity, 0.41);
    assert!(result.is_match);
    assert_eq!(result.confidence_bucket, SimilarityBucket::Medium);
    assert_eq!(result.reference_image_index, Some(0));
}

#[tokio::test]
async fn test_similarity_keeps_best_reference() {
    let dir = temp_dir();
    let comparator = SimilarityComparator::new(script_capability(
        dir.path(),
        "clip",
        r#"case "$1" in
  embed) echo '{"embedding": [0.5, 0.5], "dimension": 2}' ;;
  compare)
    case "$3" in
      *reference_1.json) echo '{"similarity": 0.62, "match": true}' ;;
      *) echo '{"similarity": 0.33, "match": true}' ;;
    esac
    ;;
esac
"#,
        10,
        false,
    ));
    let cache_dir = dir.path().join("cache");

    let mut references = Vec::new();
    for (index, image) in ["/refs/a.png", "/refs/b.png", "/refs/c.png"].iter().enumerate() {
        let reference = comparator
            .embed_reference(Path::new(image), index, &cache_dir)
            .await
            .unwrap();
        references.push(reference);
    }

    let result = comparator
        .analyze(&SimilarityRequest {
            frame_path: "/frames/f1.jpg".into(),
            references: Arc::from(references),
        })
        .await
        .unwrap();

    assert_eq!(result.similarity, 0.62);
    assert_eq!(result.reference_image_index, Some(1));
}

#[tokio::test]
async fn test_similarity_missing_dependency_is_sticky() {
    let dir = temp_dir();
    let calls = dir.path().join("calls");
    let body = format!(
        r#"echo call >> '{}'
echo '{{"error": "CLIP dependencies not installed"}}'
exit 1
"#,
        calls.display()
    );
    let comparator =
        SimilarityComparator::new(script_capability(dir.path(), "clip", &body, 10, false));

    let embedded = comparator
        .embed_reference(Path::new("/refs/pack.png"), 0, &dir.path().join("cache"))
        .await;
    assert!(embedded.is_none());
    assert_eq!(comparator.state(), CapabilityState::Unavailable);

    let reference = ReferenceEmbedding {
        index: 0,
        source_image: "/refs/pack.png".into(),
        embedding_path: dir.path().join("cache/reference_0.json"),
        dimension: 3,
    };
    for frame in ["/frames/f1.jpg", "/frames/f2.jpg"] {
        let result = comparator
            .analyze(&SimilarityRequest {
                frame_path: frame.into(),
                references: Arc::from(vec![reference.clone()]),
            })
            .await;
        assert!(result.is_none());
    }

    let invocations = std::fs::read_to_string(&calls).unwrap();
    assert_eq!(invocations.lines().count(), 1);
}

#[tokio::test]
async fn test_engine_from_config_with_script_capabilities() {
    let dir = temp_dir();
    let detect = script_capability(
        dir.path(),
        "detect",
        r#"echo '{"objects": ["person", "bottle"]}'"#,
        10,
        true,
    );
    let ocr = script_capability(
        dir.path(),
        "ocr",
        r#"echo '{"text": "ACME Widget"}'"#,
        10,
        true,
    );
    let toml = format!(
        r#"
        [storage]
        artifact_dir = '{artifacts}'
        cache_dir = '{cache}'

        [object_detector]
        program = "sh"
        args = ['{detect}']

        [text_extractor]
        program = "sh"
        args = ['{ocr}']

        [similarity]
        enabled = false
        "#,
        artifacts = dir.path().join("artifacts").display(),
        cache = dir.path().join("cache").display(),
        detect = detect.args[0],
        ocr = ocr.args[0],
    );
    let config = VisionConfig::from_toml_str(&toml).unwrap();
    let engine = VisionEngine::from_config(&config);

    let frames = write_frames(dir.path(), &[0.0, 1.0]);
    let summary = engine
        .analyze(request(frames, 2.0, 1.0, "Acme Widget"))
        .await;

    assert_eq!(summary.unique_objects, vec!["bottle", "person"]);
    assert!(summary.target_brand_confirmation.detected);
    assert_eq!(summary.brands_detected[0].total_frames, 2);
    assert!(dir.path().join("artifacts").join("test-run.json").is_file());

    let states = engine.analyzer().capability_states();
    assert_eq!(states[0].1, CapabilityState::Available);
    assert_eq!(states[1].1, CapabilityState::Available);
    assert_eq!(states[2].1, CapabilityState::Unavailable);
}
