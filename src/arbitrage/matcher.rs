//! Title matching between sourcing and resale listings.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument};

use crate::listing::Listing;
use crate::metrics;

/// Multi-word marketing phrases removed before tokenizing.
static MARKETING_PHRASES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:free shipping|fast shipping|fast ship|hot sale|brand new|high quality|us stock|usa seller|ships from usa|new arrival)\b",
    )
    .expect("valid regex")
});

/// Tokens that say nothing about the product.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "or", "the", "for", "with", "of", "in", "on", "to", "new", "sale", "best",
    "top", "hot", "free", "shipping", "wholesale", "lot", "factory", "direct", "brand", "genuine",
    "original", "2024", "2025", "2026",
];

/// Normalize a title into its product tokens.
///
/// Lowercases, drops marketing phrases, replaces punctuation with spaces and
/// removes stopwords.
pub fn normalize_title(title: &str) -> Vec<String> {
    let lowered = title.to_lowercase();
    let stripped = MARKETING_PHRASES.replace_all(&lowered, " ");
    let cleaned: String = stripped
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    cleaned
        .split_whitespace()
        .filter(|token| !STOPWORDS.contains(token))
        .map(str::to_string)
        .collect()
}

/// Token set of a normalized title.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TitleTokens(BTreeSet<String>);

impl TitleTokens {
    /// Tokenize a title.
    pub fn from_title(title: &str) -> Self {
        Self(normalize_title(title).into_iter().collect())
    }

    /// Whether no product tokens survived normalization.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Jaccard similarity of two token sets, in [0, 1].
    ///
    /// Two empty sets score 0: a title with no product tokens matches nothing.
    pub fn jaccard(&self, other: &TitleTokens) -> f64 {
        let intersection = self.0.intersection(&other.0).count();
        let union = self.0.union(&other.0).count();
        if union == 0 {
            0.0
        } else {
            intersection as f64 / union as f64
        }
    }
}

/// Similarity between two titles. Symmetric and bounded in [0, 1].
pub fn similarity(a: &str, b: &str) -> f64 {
    TitleTokens::from_title(a).jaccard(&TitleTokens::from_title(b))
}

/// A scored pairing of a sourcing listing and a resale listing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchCandidate<'a> {
    /// Listing the item would be sold as.
    pub resale: &'a Listing,
    /// Listing the item would be bought from.
    pub sourcing: &'a Listing,
    /// Title similarity in [0, 1].
    pub similarity: f64,
}

/// Pair every sourcing listing with every resale listing scoring at least
/// `threshold`.
///
/// Matching is one-to-many: a sourcing listing may match several resale
/// listings and all of them are kept. Output is sourcing-major, both sides in
/// input order. A threshold of zero admits every pair.
pub fn match_listings<'a>(
    resale: &'a [Listing],
    sourcing: &'a [Listing],
    threshold: f64,
) -> Vec<MatchCandidate<'a>> {
    let resale: Vec<&Listing> = resale.iter().collect();
    let sourcing: Vec<&Listing> = sourcing.iter().collect();
    match_refs(&resale, &sourcing, threshold)
}

/// [`match_listings`] over already-selected listings.
#[instrument(skip(resale, sourcing), fields(resale = resale.len(), sourcing = sourcing.len()))]
pub fn match_refs<'a>(
    resale: &[&'a Listing],
    sourcing: &[&'a Listing],
    threshold: f64,
) -> Vec<MatchCandidate<'a>> {
    let resale_tokens: Vec<TitleTokens> = resale
        .iter()
        .map(|l| TitleTokens::from_title(&l.title))
        .collect();

    let mut candidates = Vec::new();
    for source in sourcing {
        let source_tokens = TitleTokens::from_title(&source.title);
        for (target, tokens) in resale.iter().zip(&resale_tokens) {
            let score = source_tokens.jaccard(tokens);
            if score >= threshold {
                candidates.push(MatchCandidate {
                    resale: *target,
                    sourcing: *source,
                    similarity: score,
                });
            }
        }
    }

    metrics::inc_match_candidates(candidates.len() as u64);
    debug!(candidates = candidates.len(), threshold, "Matched listings");

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::{Condition, Currency, ListingStatus, Marketplace};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn listing(title: &str, source: Marketplace) -> Listing {
        Listing {
            title: title.to_string(),
            raw_price_text: "$10".to_string(),
            price: dec!(10),
            currency: Currency::Usd,
            shipping: dec!(0),
            condition: Condition::Unknown,
            status: ListingStatus::Unknown,
            source,
            url: String::new(),
            orders: None,
            rating: None,
        }
    }

    #[test]
    fn normalize_title_strips_marketing() {
        assert_eq!(
            normalize_title("HOT SALE!! Brand New Apple Watch S9 45mm - Free Shipping"),
            vec!["apple", "watch", "s9", "45mm"]
        );
    }

    #[test]
    fn normalize_title_of_pure_marketing_is_empty() {
        assert!(normalize_title("New! Free Shipping, Best Sale").is_empty());
    }

    #[test]
    fn similarity_of_watch_titles() {
        let score = similarity("Apple Watch Series 9 45mm", "Apple Watch S9 45mm Aluminum");
        assert!((score - 3.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn identical_titles_score_one() {
        assert_eq!(similarity("LED Desk Lamp", "led desk lamp!"), 1.0);
    }

    #[test]
    fn empty_titles_score_zero() {
        assert_eq!(similarity("", ""), 0.0);
        assert_eq!(similarity("new sale", "lamp"), 0.0);
    }

    #[test]
    fn matching_is_one_to_many() {
        let resale = vec![
            listing("LED Desk Lamp Black", Marketplace::Resale),
            listing("LED Desk Lamp White", Marketplace::Resale),
            listing("Garden Hose 50ft", Marketplace::Resale),
        ];
        let sourcing = vec![listing("LED Desk Lamp", Marketplace::Sourcing)];

        let candidates = match_listings(&resale, &sourcing, 0.5);

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].resale.title, "LED Desk Lamp Black");
        assert_eq!(candidates[1].resale.title, "LED Desk Lamp White");
        assert!(candidates.iter().all(|c| c.sourcing.title == "LED Desk Lamp"));
    }

    #[test]
    fn output_is_sourcing_major() {
        let resale = vec![
            listing("Desk Lamp", Marketplace::Resale),
            listing("Floor Lamp", Marketplace::Resale),
        ];
        let sourcing = vec![
            listing("Floor Lamp", Marketplace::Sourcing),
            listing("Desk Lamp", Marketplace::Sourcing),
        ];

        let candidates = match_listings(&resale, &sourcing, 0.0);
        let pairs: Vec<(&str, &str)> = candidates
            .iter()
            .map(|c| (c.sourcing.title.as_str(), c.resale.title.as_str()))
            .collect();

        assert_eq!(
            pairs,
            vec![
                ("Floor Lamp", "Desk Lamp"),
                ("Floor Lamp", "Floor Lamp"),
                ("Desk Lamp", "Desk Lamp"),
                ("Desk Lamp", "Floor Lamp"),
            ]
        );
    }

    #[test]
    fn zero_threshold_admits_every_pair() {
        let resale = vec![
            listing("Garden Hose", Marketplace::Resale),
            listing("Desk Lamp", Marketplace::Resale),
        ];
        let sourcing = vec![
            listing("Phone Case", Marketplace::Sourcing),
            listing("Dog Bandana", Marketplace::Sourcing),
            listing("Yoga Mat", Marketplace::Sourcing),
        ];
        assert_eq!(match_listings(&resale, &sourcing, 0.0).len(), 6);
    }

    #[test]
    fn empty_inputs_produce_no_candidates() {
        let resale = vec![listing("Desk Lamp", Marketplace::Resale)];
        assert!(match_listings(&resale, &[], 0.0).is_empty());
        assert!(match_listings(&[], &resale, 0.0).is_empty());
    }

    proptest! {
        #[test]
        fn similarity_is_symmetric(
            a in "[A-Za-z0-9 ,.!?'/()&-]{0,40}",
            b in "[A-Za-z0-9 ,.!?'/()&-]{0,40}",
        ) {
            prop_assert_eq!(similarity(&a, &b), similarity(&b, &a));
        }

        #[test]
        fn similarity_ignores_case_and_edge_punctuation(
            a in "[A-Za-z0-9 ,.!?'/()&-]{0,40}",
            b in "[A-Za-z0-9 ,.!?'/()&-]{0,40}",
        ) {
            let shouted = format!("({})!", a.to_uppercase());
            prop_assert_eq!(similarity(&a, &b), similarity(&shouted, &b));
        }

        #[test]
        fn similarity_is_bounded(a in ".{0,30}", b in ".{0,30}") {
            let score = similarity(&a, &b);
            prop_assert!((0.0..=1.0).contains(&score));
        }

        #[test]
        fn raising_threshold_never_adds_candidates(
            resale_titles in prop::collection::vec("[a-d]{1,2}( [a-d]{1,2}){0,3}", 0..6),
            sourcing_titles in prop::collection::vec("[a-d]{1,2}( [a-d]{1,2}){0,3}", 0..6),
            low in 0.0f64..1.0,
            bump in 0.0f64..1.0,
        ) {
            let resale: Vec<Listing> = resale_titles.iter().map(|t| listing(t, Marketplace::Resale)).collect();
            let sourcing: Vec<Listing> = sourcing_titles.iter().map(|t| listing(t, Marketplace::Sourcing)).collect();

            let loose = match_listings(&resale, &sourcing, low).len();
            let strict = match_listings(&resale, &sourcing, low + bump).len();
            prop_assert!(strict <= loose);
        }
    }
}
