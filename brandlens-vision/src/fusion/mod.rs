// Fusion Module - Tier 2 Per-Frame Evidence Fusion
//
// Term parsing and text matching feed the frame analyzer, which combines
// Tier 1 capability evidence into one FrameAnalysis per frame.

pub mod frame_analyzer;
pub mod terms;
pub mod text_matcher;

pub use frame_analyzer::{detect_brands, FrameAnalyzer};
pub use terms::{parse_brand_and_products, BrandTerms};
pub use text_matcher::{match_term, normalize_text, TextMatch};
