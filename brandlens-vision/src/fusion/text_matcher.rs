// Text Matcher - Noise-Tolerant Term Search over OCR Text
//
// Strategies, in order (later ones only run while nothing has matched):
// 1. Word-boundary match, counting occurrences
// 2. Plain substring containment (1 occurrence)
// 3. Multi-word chain with bounded gaps between consecutive words
// 4. Compound overlap between the term and a single long word

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Maximum distance between the starts of consecutive words of a multi-word term
const MAX_WORD_GAP_CHARS: usize = 50;

/// Shortest term or text word considered for compound matching
const MIN_COMPOUND_LEN: usize = 4;

/// Fraction of the term length a compound overlap must cover
const COMPOUND_OVERLAP_RATIO: f64 = 0.7;

/// Result of matching one term against one text blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextMatch {
    pub found: bool,
    pub occurrences: usize,
    /// Term appears verbatim or in capitals in the raw text
    pub has_uppercase: bool,
}

/// Strip punctuation to spaces, collapse whitespace and lowercase
pub fn normalize_text(text: &str) -> String {
    let spaced: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    spaced
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Match `term` against raw extracted `text`
pub fn match_term(term: &str, text: &str) -> TextMatch {
    let has_uppercase = {
        let trimmed = term.trim();
        !trimmed.is_empty() && (text.contains(trimmed) || text.contains(&trimmed.to_uppercase()))
    };

    let needle = normalize_text(term);
    let haystack = normalize_text(text);
    if needle.is_empty() || haystack.is_empty() {
        return TextMatch {
            found: false,
            occurrences: 0,
            has_uppercase: false,
        };
    }

    let mut occurrences = count_word_boundary(&needle, &haystack);

    if occurrences == 0 && haystack.contains(&needle) {
        occurrences = 1;
    }

    if occurrences == 0 && needle.contains(' ') && chained_words_match(&needle, &haystack) {
        occurrences = 1;
    }

    if occurrences == 0 && compound_match(&needle, &haystack) {
        occurrences = 1;
    }

    TextMatch {
        found: occurrences > 0,
        occurrences,
        has_uppercase,
    }
}

fn count_word_boundary(needle: &str, haystack: &str) -> usize {
    Regex::new(&format!(r"\b{}\b", regex::escape(needle)))
        .map(|re| re.find_iter(haystack).count())
        .unwrap_or(0)
}

/// Every word appears, each starting within the gap limit after the previous one
fn chained_words_match(needle: &str, haystack: &str) -> bool {
    let mut words = needle.split(' ');
    let Some(first) = words.next() else {
        return false;
    };
    let Some(mut previous_start) = haystack.find(first) else {
        return false;
    };
    let mut previous_len = first.len();

    for word in words {
        let search_from = previous_start + previous_len;
        let Some(offset) = haystack.get(search_from..).and_then(|rest| rest.find(word)) else {
            return false;
        };
        let start = search_from + offset;
        if start - previous_start > MAX_WORD_GAP_CHARS {
            return false;
        }
        previous_start = start;
        previous_len = word.len();
    }

    true
}

/// Merged or split spellings, e.g. "brandco" against "brand"
fn compound_match(needle: &str, haystack: &str) -> bool {
    let term_len = needle.chars().count();
    if term_len < MIN_COMPOUND_LEN {
        return false;
    }
    let required = (MIN_COMPOUND_LEN as f64).max(COMPOUND_OVERLAP_RATIO * term_len as f64);

    haystack
        .split(' ')
        .filter(|word| word.chars().count() >= MIN_COMPOUND_LEN)
        .any(|word| {
            let overlap = if needle.contains(word) {
                word.chars().count()
            } else if word.contains(needle) {
                term_len
            } else {
                0
            };
            overlap as f64 >= required
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Hello,\nWORLD!!  x-y "), "hello world x y");
    }

    #[test]
    fn test_uppercase_word_match() {
        let result = match_term("brand", "I love BRAND X");
        assert!(result.found);
        assert!(result.has_uppercase);
        assert_eq!(result.occurrences, 1);
    }

    #[test]
    fn test_occurrences_counted() {
        let result = match_term("acme", "Acme snacks. ACME! acme-approved");
        assert_eq!(result.occurrences, 3);
    }

    #[test]
    fn test_substring_counts_once() {
        let result = match_term("acme", "SuperAcmeBar");
        assert!(result.found);
        assert_eq!(result.occurrences, 1);
        assert!(!result.has_uppercase);
    }

    #[test]
    fn test_multi_word_with_ocr_gap() {
        let result = match_term("Widget Pro", "WIDGET\n** new **\nPRO edition");
        assert!(result.found);
        assert_eq!(result.occurrences, 1);
    }

    #[test]
    fn test_multi_word_gap_too_large() {
        let filler = "x".repeat(60);
        let result = match_term("widget pro", &format!("widget {} pro", filler));
        assert!(!result.found);
    }

    #[test]
    fn test_compound_match_boundary() {
        // 5 shared chars against a threshold of max(4, 0.7 * 7 = 4.9)
        assert!(match_term("brandco", "brand co official").found);
        // 5 shared chars against a threshold of max(4, 0.7 * 9 = 6.3)
        assert!(!match_term("brandcola", "brand co official").found);
    }

    #[test]
    fn test_no_match_on_empty_text() {
        let result = match_term("acme", "");
        assert!(!result.found);
        assert_eq!(result.occurrences, 0);
    }
}
