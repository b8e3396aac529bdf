use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One bin of an empirical distribution, as stored in a model document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionBin {
    /// Smallest value observed in the bin
    #[serde(rename = "min")]
    pub observed_min: f64,
    /// Largest value observed in the bin
    #[serde(rename = "max")]
    pub observed_max: f64,
    #[serde(rename = "proba")]
    pub probability: f64,
}

/// A non-empty fixed-width bin, before it is turned into a `DistributionBin`
#[derive(Debug, Clone, PartialEq)]
pub struct Bin {
    /// Inclusive lower bound
    pub start: f64,
    /// Exclusive upper bound
    pub end: f64,
    pub count: usize,
    pub observed_min: f64,
    pub observed_max: f64,
}

/// Split the values into half-open bins of width `width`, starting at
/// `floor(min / width) * width`. Only the non-empty bins are returned, in increasing order.
pub fn histogram(values: &[f64], width: f64) -> Result<Vec<Bin>> {
    if !(width.is_finite() && width > 0.) {
        return Err(Error::Configuration(format!(
            "Bin width must be positive (got {width})"
        )));
    }
    if values.is_empty() {
        return Err(Error::InputValidation(
            "Cannot build a distribution from an empty series".to_string(),
        ));
    }
    if let Some(v) = values.iter().find(|v| !v.is_finite()) {
        return Err(Error::InputValidation(format!(
            "Cannot build a distribution from a non-finite value ({v})"
        )));
    }

    // only the non-empty bins are stored, keyed by their absolute index
    let mut bins: BTreeMap<i64, Bin> = BTreeMap::new();
    for &v in values {
        let index = (v / width).floor() as i64;
        bins.entry(index)
            .and_modify(|bin| {
                bin.count += 1;
                bin.observed_min = bin.observed_min.min(v);
                bin.observed_max = bin.observed_max.max(v);
            })
            .or_insert_with(|| {
                let start = index as f64 * width;
                Bin {
                    start,
                    end: start + width,
                    count: 1,
                    observed_min: v,
                    observed_max: v,
                }
            });
    }
    Ok(bins.into_values().collect())
}

/// Build the empirical distribution of a series. Bins are sorted by decreasing probability (ties
/// keep the increasing bin order).
pub fn distribution(values: &[f64], width: f64) -> Result<Vec<DistributionBin>> {
    let total = values.len() as f64;
    let mut dist: Vec<DistributionBin> = histogram(values, width)?
        .into_iter()
        .map(|b| DistributionBin {
            observed_min: b.observed_min,
            observed_max: b.observed_max,
            probability: b.count as f64 / total,
        })
        .collect();
    dist.sort_by(|a, b| b.probability.total_cmp(&a.probability));
    log::trace!("{} bins of width {width}", dist.len());
    Ok(dist)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_coverage() {
        let values = [3., 7., 12., 12.5, 19.99, 41.];
        let width = 5.;
        let bins = histogram(&values, width).unwrap();
        // the first bin starts at floor(min / width) * width
        assert_eq!(bins[0].start, 0.);
        assert!(bins.last().unwrap().end > 41.);
        assert!(bins.last().unwrap().start <= 41.);
        // every value lies in exactly one bin
        for v in values {
            let containing = bins.iter().filter(|b| b.start <= v && v < b.end).count();
            assert_eq!(containing, 1, "value {v}");
        }
        // bins are disjoint and ordered
        for w in bins.windows(2) {
            assert!(w[0].end <= w[1].start);
            assert!(((w[0].end - w[0].start) - width).abs() < 1e-12);
        }
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), values.len());
    }

    #[test]
    fn test_empty_bins_dropped() {
        let bins = histogram(&[1., 2., 100.], 10.).unwrap();
        assert_eq!(bins.len(), 2);
        assert_eq!(bins[0].count, 2);
        assert_eq!(bins[1].start, 100.);
    }

    #[test]
    fn test_sparse_wide_range() {
        let bins = histogram(&[0., 1e18, 0.5], 1.).unwrap();
        assert_eq!(bins.len(), 2);
        assert_eq!(bins[0].count, 2);
        assert_eq!(bins[1].count, 1);
        assert_eq!(bins[1].observed_min, 1e18);
    }

    #[test]
    fn test_negative_values() {
        let bins = histogram(&[-7., -2., 3.], 5.).unwrap();
        assert_eq!(bins[0].start, -10.);
        assert_eq!(bins.len(), 3);
    }

    #[test]
    fn test_distribution_probabilities() {
        let values: Vec<f64> = (0..1000).map(|i| ((i * 37) % 1500) as f64).collect();
        let dist = distribution(&values, 100.).unwrap();
        let total: f64 = dist.iter().map(|b| b.probability).sum();
        assert!((total - 1.).abs() < 1e-9);
        for w in dist.windows(2) {
            assert!(w[0].probability >= w[1].probability);
        }
        for b in dist.iter() {
            assert!(b.observed_min <= b.observed_max);
        }
    }

    #[test]
    fn test_distribution_observed_bounds() {
        let dist = distribution(&[100., 100., 150., 180., 420.], 100.).unwrap();
        assert_eq!(dist.len(), 2);
        assert_eq!(dist[0].observed_min, 100.);
        assert_eq!(dist[0].observed_max, 180.);
        assert!((dist[0].probability - 0.8).abs() < 1e-12);
        assert_eq!(dist[1].observed_min, 420.);
        assert_eq!(dist[1].observed_max, 420.);
    }

    #[test]
    fn test_distribution_errors() {
        assert!(matches!(distribution(&[], 1.), Err(Error::InputValidation(_))));
        assert!(matches!(distribution(&[1.], 0.), Err(Error::Configuration(_))));
        assert!(matches!(
            distribution(&[1.], f64::NAN),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_json_field_names() {
        let json = serde_json::to_value(DistributionBin {
            observed_min: 1.,
            observed_max: 2.,
            probability: 0.5,
        })
        .unwrap();
        assert_eq!(json["min"], 1.);
        assert_eq!(json["max"], 2.);
        assert_eq!(json["proba"], 0.5);
    }
}
