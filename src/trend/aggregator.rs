//! Summary statistics over margin results.

use std::collections::BTreeMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::arbitrage::MarginResult;

/// Beyond this many buckets the histogram lists only non-empty ones.
const MAX_CONTIGUOUS_BUCKETS: i64 = 200;

/// How to summarize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryOptions {
    /// Number of results to keep in `top_n`.
    pub top_n: usize,
    /// Width of each net-margin histogram bucket. Must be positive.
    pub bucket_width: Decimal,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            top_n: 10,
            bucket_width: Decimal::TEN,
        }
    }
}

/// Count of results whose net margin falls in `[lower, upper)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramBucket {
    /// Inclusive lower bound.
    pub lower: Decimal,
    /// Exclusive upper bound.
    pub upper: Decimal,
    /// Results in the bucket.
    pub count: usize,
}

/// Aggregate view of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary<'a> {
    /// Number of margin results.
    pub count: usize,
    /// Mean net margin. `None` with no results, or if the total overflows.
    pub mean_margin: Option<Decimal>,
    /// Mean ROI over results with a defined ROI.
    pub mean_roi: Option<Decimal>,
    /// Sum of net margins. `None` if the sum overflows.
    pub total_margin: Option<Decimal>,
    /// Results whose ROI is undefined (zero sourcing cost).
    pub undefined_roi_count: usize,
    /// Best results by net margin, descending; equal margins keep input order.
    pub top_n: Vec<MarginResult<'a>>,
    /// Net-margin histogram, ascending.
    pub histogram: Vec<HistogramBucket>,
    /// Raw records dropped during normalization.
    pub dropped_count: usize,
    /// Candidates rejected by the margin step.
    pub rejected_count: usize,
    /// Candidates produced by the matcher.
    pub candidate_count: usize,
}

impl<'a> Summary<'a> {
    /// Whether any result was summarized.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Summarize margin results. Pure and deterministic.
///
/// The pipeline-level counters (`dropped_count`, `rejected_count`,
/// `candidate_count`) start at zero and are filled in by the caller.
pub fn summarize<'a>(results: &[MarginResult<'a>], options: &SummaryOptions) -> Summary<'a> {
    let count = results.len();
    let total_margin = checked_sum(results.iter().map(|r| r.net_margin));
    let mean_margin = checked_mean(total_margin, count);

    let rois: Vec<Decimal> = results.iter().filter_map(|r| r.roi).collect();
    let mean_roi = checked_mean(checked_sum(rois.iter().copied()), rois.len());
    if total_margin.is_none() || (!rois.is_empty() && mean_roi.is_none()) {
        debug!(count, "Summary totals overflowed");
    }

    Summary {
        count,
        mean_margin,
        mean_roi,
        total_margin,
        undefined_roi_count: count - rois.len(),
        top_n: rank_by_margin(results, options.top_n),
        histogram: histogram(results, options.bucket_width),
        dropped_count: 0,
        rejected_count: 0,
        candidate_count: 0,
    }
}

fn checked_sum(values: impl Iterator<Item = Decimal>) -> Option<Decimal> {
    values.fold(Some(Decimal::ZERO), |acc, v| acc?.checked_add(v))
}

fn checked_mean(total: Option<Decimal>, count: usize) -> Option<Decimal> {
    if count == 0 {
        return None;
    }
    total?.checked_div(Decimal::from(count))
}

/// Results sorted by net margin descending, truncated to `n`.
/// The sort is stable, so ties keep their input order.
pub fn rank_by_margin<'a>(results: &[MarginResult<'a>], n: usize) -> Vec<MarginResult<'a>> {
    let mut ranked = results.to_vec();
    ranked.sort_by(|a, b| b.net_margin.cmp(&a.net_margin));
    ranked.truncate(n);
    ranked
}

/// Best `k` results for each sourcing listing, groups in order of first
/// appearance.
///
/// Library helper for callers that present one-to-many matches grouped by
/// sourcing item; the pipeline report and its views rank globally.
pub fn top_k_per_sourcing<'a>(results: &[MarginResult<'a>], k: usize) -> Vec<MarginResult<'a>> {
    let mut groups: Vec<Vec<MarginResult<'a>>> = Vec::new();
    for result in results {
        let sourcing = result.candidate.sourcing;
        match groups
            .iter_mut()
            .find(|g| std::ptr::eq(g[0].candidate.sourcing, sourcing))
        {
            Some(group) => group.push(*result),
            None => groups.push(vec![*result]),
        }
    }

    groups
        .iter()
        .flat_map(|group| rank_by_margin(group, k))
        .collect()
}

fn histogram(results: &[MarginResult<'_>], width: Decimal) -> Vec<HistogramBucket> {
    if results.is_empty() || width <= Decimal::ZERO {
        return Vec::new();
    }

    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for result in results {
        let Some(index) = result
            .net_margin
            .checked_div(width)
            .and_then(|q| q.floor().to_i64())
        else {
            continue;
        };
        *counts.entry(index).or_default() += 1;
    }

    let (Some(&first), Some(&last)) = (counts.keys().next(), counts.keys().next_back()) else {
        return Vec::new();
    };

    let bucket = |index: i64, count: usize| {
        let lower = Decimal::from(index).checked_mul(width)?;
        let upper = lower.checked_add(width)?;
        Some(HistogramBucket {
            lower,
            upper,
            count,
        })
    };

    if last.checked_sub(first).is_some_and(|span| span < MAX_CONTIGUOUS_BUCKETS) {
        (first..=last)
            .filter_map(|i| bucket(i, counts.get(&i).copied().unwrap_or(0)))
            .collect()
    } else {
        debug!(first, last, "Histogram range too wide, listing non-empty buckets only");
        counts.into_iter().filter_map(|(i, c)| bucket(i, c)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitrage::{compute, MatchCandidate};
    use crate::listing::{Condition, Currency, Listing, ListingStatus, Marketplace};
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn test_listing(title: &str, price: Decimal) -> Listing {
        Listing {
            title: title.to_string(),
            raw_price_text: price.to_string(),
            price,
            currency: Currency::Usd,
            shipping: Decimal::ZERO,
            condition: Condition::New,
            status: ListingStatus::Active,
            source: Marketplace::Resale,
            url: String::new(),
            orders: None,
            rating: None,
        }
    }

    fn results<'a>(resale: &'a [Listing], sourcing: &'a Listing) -> Vec<MarginResult<'a>> {
        resale
            .iter()
            .map(|r| {
                let candidate = MatchCandidate {
                    resale: r,
                    sourcing,
                    similarity: 1.0,
                };
                compute(candidate, Decimal::ZERO, Decimal::ZERO).unwrap()
            })
            .collect()
    }

    #[test]
    fn summarize_empty() {
        let summary = summarize(&[], &SummaryOptions::default());
        assert!(summary.is_empty());
        assert_eq!(summary.mean_margin, None);
        assert_eq!(summary.mean_roi, None);
        assert_eq!(summary.total_margin, Some(Decimal::ZERO));
        assert!(summary.top_n.is_empty());
        assert!(summary.histogram.is_empty());
    }

    #[test]
    fn summarize_means_and_totals() {
        let sourcing = test_listing("Lamp", dec!(10));
        let resale = vec![test_listing("A", dec!(20)), test_listing("B", dec!(40))];
        let results = results(&resale, &sourcing);

        let summary = summarize(&results, &SummaryOptions::default());

        assert_eq!(summary.count, 2);
        assert_eq!(summary.total_margin, Some(dec!(40)));
        assert_eq!(summary.mean_margin, Some(dec!(20)));
        // ROI 1.0 and 3.0
        assert_eq!(summary.mean_roi, Some(dec!(2)));
        assert_eq!(summary.undefined_roi_count, 0);
    }

    #[test]
    fn mean_roi_skips_undefined() {
        let free = test_listing("Sticker", Decimal::ZERO);
        let paid = test_listing("Lamp", dec!(10));
        let resale = vec![test_listing("A", dec!(20))];

        let mut all = results(&resale, &free);
        all.extend(results(&resale, &paid));

        let summary = summarize(&all, &SummaryOptions::default());
        assert_eq!(summary.undefined_roi_count, 1);
        assert_eq!(summary.mean_roi, Some(dec!(1)));
    }

    #[test]
    fn top_n_is_descending_and_stable() {
        let sourcing = test_listing("Lamp", dec!(10));
        let resale = vec![
            test_listing("A", dec!(20)),
            test_listing("B", dec!(50)),
            test_listing("C", dec!(20)),
            test_listing("D", dec!(30)),
        ];
        let results = results(&resale, &sourcing);

        let summary = summarize(
            &results,
            &SummaryOptions {
                top_n: 3,
                bucket_width: dec!(10),
            },
        );

        let titles: Vec<&str> = summary
            .top_n
            .iter()
            .map(|r| r.candidate.resale.title.as_str())
            .collect();
        assert_eq!(titles, vec!["B", "D", "A"]);
    }

    #[test]
    fn histogram_buckets_are_contiguous() {
        let sourcing = test_listing("Lamp", dec!(10));
        // net margins: -5, 5, 8, 35
        let resale = vec![
            test_listing("A", dec!(5)),
            test_listing("B", dec!(15)),
            test_listing("C", dec!(18)),
            test_listing("D", dec!(45)),
        ];
        let results = results(&resale, &sourcing);

        let summary = summarize(&results, &SummaryOptions::default());

        let expected = vec![
            HistogramBucket { lower: dec!(-10), upper: dec!(0), count: 1 },
            HistogramBucket { lower: dec!(0), upper: dec!(10), count: 2 },
            HistogramBucket { lower: dec!(10), upper: dec!(20), count: 0 },
            HistogramBucket { lower: dec!(20), upper: dec!(30), count: 0 },
            HistogramBucket { lower: dec!(30), upper: dec!(40), count: 1 },
        ];
        assert_eq!(summary.histogram, expected);
    }

    #[test]
    fn top_k_per_sourcing_groups_in_order() {
        let lamp = test_listing("Lamp", dec!(10));
        let hose = test_listing("Hose", dec!(5));
        let resale = vec![
            test_listing("A", dec!(20)),
            test_listing("B", dec!(40)),
            test_listing("C", dec!(30)),
        ];

        let mut all = results(&resale, &lamp);
        all.extend(results(&resale, &hose));

        let best = top_k_per_sourcing(&all, 2);
        let pairs: Vec<(&str, &str)> = best
            .iter()
            .map(|r| (r.candidate.sourcing.title.as_str(), r.candidate.resale.title.as_str()))
            .collect();

        assert_eq!(
            pairs,
            vec![("Lamp", "B"), ("Lamp", "C"), ("Hose", "B"), ("Hose", "C")]
        );
    }

    #[test]
    fn overflowing_total_leaves_mean_and_total_undefined() {
        let sourcing = test_listing("Lamp", dec!(1));
        let resale = vec![
            test_listing("A", dec!(70000000000000000000000000000)),
            test_listing("B", dec!(70000000000000000000000000000)),
        ];
        let results = results(&resale, &sourcing);

        let summary = summarize(&results, &SummaryOptions::default());

        assert_eq!(summary.count, 2);
        assert_eq!(summary.total_margin, None);
        assert_eq!(summary.mean_margin, None);
        assert_eq!(summary.mean_roi, None);
        assert_eq!(summary.top_n.len(), 2);
    }

    #[test]
    fn tiny_bucket_width_skips_unrepresentable_buckets() {
        let sourcing = test_listing("Lamp", dec!(10));
        let resale = vec![
            test_listing("A", dec!(70000000000000000000000000000)),
            test_listing("B", dec!(15)),
        ];
        let results = results(&resale, &sourcing);

        let summary = summarize(
            &results,
            &SummaryOptions {
                top_n: 10,
                bucket_width: dec!(0.0000000000000000000000000001),
            },
        );

        assert_eq!(summary.histogram.len(), 0);
    }
}
