//! Target brand confirmation
//!
//! Decides whether the target brand was visible anywhere in the video. Three
//! lookups, strongest first:
//! 1. An aggregated brand whose name equals a parsed term (case-insensitive)
//! 2. An aggregated brand whose name contains, or is contained in, a term
//! 3. Frames whose own detections mention a term, which still counts brands
//!    that never cleared the aggregation threshold

use super::visible_seconds;
use crate::fusion::BrandTerms;
use crate::types::{BrandAggregate, BrandConfirmation, Confidence, FrameAnalysis};

/// Confidence reported when only per-frame evidence confirms the brand
pub const FALLBACK_CONFIDENCE: Confidence = 0.6;

/// Display name used in messages when the target is empty
const UNNAMED_TARGET: &str = "the target brand";

fn contains_either_way(name: &str, term: &str) -> bool {
    let name = name.to_lowercase();
    let term = term.to_lowercase();
    !term.is_empty() && !name.is_empty() && (name.contains(&term) || term.contains(&name))
}

fn matches_any_term(name: &str, terms: &BrandTerms) -> bool {
    terms
        .all_terms
        .iter()
        .any(|term| term.eq_ignore_ascii_case(name) || contains_either_way(name, term))
}

/// Build the confirmation verdict
///
/// `aggregates` must already be filtered and ordered; the first qualifying
/// aggregate wins.
pub fn confirm_target_brand(
    aggregates: &[BrandAggregate],
    frames: &[FrameAnalysis],
    terms: &BrandTerms,
    frame_interval_seconds: f64,
    video_duration_seconds: f64,
) -> BrandConfirmation {
    let display_name = if terms.full_target.is_empty() {
        UNNAMED_TARGET
    } else {
        terms.full_target.as_str()
    };

    let matched = aggregates
        .iter()
        .find(|aggregate| terms.contains_term(&aggregate.name))
        .or_else(|| {
            aggregates.iter().find(|aggregate| {
                terms
                    .all_terms
                    .iter()
                    .any(|term| contains_either_way(&aggregate.name, term))
            })
        });

    if let Some(aggregate) = matched {
        return BrandConfirmation {
            detected: true,
            confidence: aggregate.avg_confidence,
            matched_brand: Some(aggregate.name.clone()),
            frames_detected: aggregate.total_frames,
            visible_seconds: aggregate.total_visible_seconds,
            message: found_message(
                display_name,
                aggregate.total_frames,
                aggregate.total_visible_seconds,
            ),
        };
    }

    let fallback_frames = frames
        .iter()
        .filter(|frame| {
            frame
                .brands
                .iter()
                .any(|detection| matches_any_term(&detection.name, terms))
        })
        .count();

    if fallback_frames > 0 {
        let seconds =
            visible_seconds(fallback_frames, frame_interval_seconds, video_duration_seconds);
        return BrandConfirmation {
            detected: true,
            confidence: FALLBACK_CONFIDENCE,
            matched_brand: None,
            frames_detected: fallback_frames,
            visible_seconds: seconds,
            message: found_message(display_name, fallback_frames, seconds),
        };
    }

    BrandConfirmation {
        detected: false,
        confidence: 0.0,
        matched_brand: None,
        frames_detected: 0,
        visible_seconds: 0.0,
        message: format!(
            "No, {} was not detected in any of the {} analyzed frames.",
            display_name,
            frames.len()
        ),
    }
}

fn found_message(name: &str, frames: usize, seconds: f64) -> String {
    format!(
        "Yes, it shows {} (detected in {} frame(s), visible for {}s).",
        name,
        frames,
        format_seconds(seconds)
    )
}

/// One decimal place, dropping a trailing ".0"
fn format_seconds(seconds: f64) -> String {
    let formatted = format!("{:.1}", seconds);
    formatted
        .strip_suffix(".0")
        .map(str::to_string)
        .unwrap_or(formatted)
}
