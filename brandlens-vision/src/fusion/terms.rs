// Term Parser - Searchable Brand/Product Vocabulary
//
// Turns the operator's target string (optionally comma-separated) and product
// list into the deduplicated term set the text matcher searches for.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Minimum character count for a derived sub-word to become a term
const MIN_WORD_LEN: usize = 3;

/// Parsed brand/product vocabulary for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandTerms {
    /// First brand of the target
    pub primary_brand: String,
    /// Every independent brand name in the target
    pub brands: Vec<String>,
    /// Default product phrases plus caller-supplied product names
    pub products: Vec<String>,
    /// Deduplicated, trimmed, non-empty search terms
    pub all_terms: Vec<String>,
    /// Target string as supplied (trimmed; comma lists rejoined with ", ")
    pub full_target: String,
}

impl BrandTerms {
    pub fn is_full_target(&self, term: &str) -> bool {
        self.full_target.eq_ignore_ascii_case(term)
    }

    pub fn is_primary(&self, term: &str) -> bool {
        self.primary_brand.eq_ignore_ascii_case(term)
    }

    pub fn is_product(&self, term: &str) -> bool {
        self.products.iter().any(|p| p.eq_ignore_ascii_case(term))
    }

    /// Whether `name` equals any parsed term, ignoring case
    pub fn contains_term(&self, name: &str) -> bool {
        self.all_terms.iter().any(|t| t.eq_ignore_ascii_case(name))
    }
}

/// Parse the target brand string and product names into search terms
///
/// # Arguments
/// * `target_brand` - "Brand Product Words" or "BrandA, BrandB"
/// * `product_names` - Extra product names supplied by the caller
pub fn parse_brand_and_products(target_brand: &str, product_names: &[String]) -> BrandTerms {
    let trimmed = target_brand.trim();

    let (full_target, brands, default_products) = if trimmed.contains(',') {
        let brands: Vec<String> = trimmed
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        // Stray separators never reach the display name
        (brands.join(", "), brands, Vec::new())
    } else {
        let (brands, products) = split_brand_and_product(trimmed);
        (trimmed.to_string(), brands, products)
    };

    let primary_brand = brands.first().cloned().unwrap_or_default();

    let products = dedupe(
        default_products
            .into_iter()
            .chain(product_names.iter().map(|p| p.trim().to_string())),
    );

    let words: Vec<String> = brands
        .iter()
        .chain(products.iter())
        .flat_map(|phrase| phrase.split_whitespace())
        .filter(|word| word.chars().count() >= MIN_WORD_LEN)
        .map(str::to_string)
        .collect();

    let all_terms = dedupe(
        brands
            .iter()
            .cloned()
            .chain(std::iter::once(primary_brand.clone()))
            .chain(std::iter::once(full_target.clone()))
            .chain(products.iter().cloned())
            .chain(words),
    );

    BrandTerms {
        primary_brand,
        brands,
        products,
        all_terms,
        full_target,
    }
}

/// First token is the brand; the remainder is the default product phrase
fn split_brand_and_product(target: &str) -> (Vec<String>, Vec<String>) {
    let tokens: Vec<&str> = target.split_whitespace().collect();
    let Some((brand, rest)) = tokens.split_first() else {
        return (Vec::new(), Vec::new());
    };

    let mut products = Vec::new();
    if !rest.is_empty() {
        products.push(rest.join(" "));
    }
    if rest.len() > 2 {
        products.extend(rest.windows(2).map(|pair| pair.join(" ")));
    }

    (vec![brand.to_string()], products)
}

/// Trim, drop empties and remove case-insensitive duplicates, keeping first occurrence
fn dedupe<I>(terms: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    terms
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_lowercase()))
        .collect()
}
