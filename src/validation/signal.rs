use crate::error::{Error, Result};
use crate::models::SummaryStats;
use crate::structs::Packet;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// What a throughput signal accumulates in each time bin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Bits,
    Packets,
}

/// Largest throughput signal that can be built
pub const MAX_BINS: usize = 10_000_000;

/// Discretize a trace into bins of `interval` seconds, starting at its first packet. There are
/// `floor(span / interval) + 1` bins, so the last packet is always counted.
pub fn throughput_signal(packets: &[Packet], interval: f64, kind: SignalKind) -> Result<Vec<f64>> {
    if !(interval.is_finite() && interval > 0.) {
        return Err(Error::Configuration(format!(
            "Sampling interval must be positive (got {interval})"
        )));
    }
    let start = packets
        .iter()
        .map(|p| p.timestamp)
        .min_by(f64::total_cmp)
        .ok_or_else(|| {
            Error::InputValidation("Cannot build the throughput signal of an empty trace".to_string())
        })?;
    let end = packets
        .iter()
        .map(|p| p.timestamp)
        .max_by(f64::total_cmp)
        .unwrap_or(start);
    let bins = ((end - start) / interval).floor() + 1.;
    if !(bins <= MAX_BINS as f64) {
        return Err(Error::InputValidation(format!(
            "A {} s trace sampled every {interval} s needs {bins} bins (at most {MAX_BINS})",
            end - start
        )));
    }
    let bin_count = bins as usize;
    let mut signal = vec![0.; bin_count];
    for p in packets {
        let index = (((p.timestamp - start) / interval).floor() as usize).min(bin_count - 1);
        signal[index] += match kind {
            SignalKind::Bits => p.size as f64 * 8.,
            SignalKind::Packets => 1.,
        };
    }
    Ok(signal)
}

/// Zero mean and unit (population) variance
pub fn standardize(signal: &[f64]) -> Result<Vec<f64>> {
    if signal.is_empty() {
        return Err(Error::InputValidation(
            "Cannot standardize an empty signal".to_string(),
        ));
    }
    let stats = SummaryStats::from_values(signal)?;
    if stats.stddev == 0. {
        return Err(Error::InputValidation(format!(
            "A constant signal (value {}, {} bins) cannot be standardized",
            stats.mean,
            signal.len()
        )));
    }
    Ok(signal
        .iter()
        .map(|v| (v - stats.mean) / stats.stddev)
        .collect())
}

/// Σ a[i + lag] b[i], over the indices where both terms exist
fn correlation_at(a: &[f64], b: &[f64], lag: isize) -> f64 {
    b.iter()
        .enumerate()
        .filter_map(|(i, y)| {
            let k = i as isize + lag;
            (k >= 0 && (k as usize) < a.len()).then(|| a[k as usize] * y)
        })
        .sum()
}

/// Autocorrelation for the lags -max_lag..=max_lag, divided by its largest absolute value
pub fn autocorrelation(signal: &[f64], max_lag: usize) -> Vec<f64> {
    let max_lag = max_lag as isize;
    let mut corr: Vec<f64> = (-max_lag..=max_lag)
        .map(|lag| correlation_at(signal, signal, lag))
        .collect();
    let norm = corr.iter().fold(0., |m: f64, c| m.max(c.abs()));
    if norm > 0. {
        corr.iter_mut().for_each(|c| *c /= norm);
    }
    corr
}

/// Mean squared error between the normalized autocorrelations of two standardized signals.
/// Returns the lag window actually used along with the error.
pub fn autocorrelation_mse(a: &[f64], b: &[f64], max_lag: Option<usize>) -> Result<(usize, f64)> {
    let shortest = a.len().min(b.len());
    if shortest == 0 {
        return Err(Error::InputValidation(
            "Cannot compare the autocorrelation of an empty signal".to_string(),
        ));
    }
    let max_lag = match max_lag {
        Some(l) if l >= shortest => {
            log::warn!(
                "Maximum lag {l} is too large for a {shortest}-bin signal, using {}",
                shortest - 1
            );
            shortest - 1
        }
        Some(l) => l,
        None => shortest / 2,
    };
    let ca = autocorrelation(a, max_lag);
    let cb = autocorrelation(b, max_lag);
    let mse = ca
        .iter()
        .zip(cb.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        / ca.len() as f64;
    Ok((max_lag, mse))
}

/// Similarity of two throughput signals based on their cross-correlation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossCorrelation {
    /// Peak of the cross-correlation of the standardized signals, divided by the first signal length
    pub similarity_score: f64,
    /// Shift of the first signal relatively to the second one at the peak, in bins
    pub best_lag: i64,
    /// Average value per bin of the first signal
    pub throughput_original: f64,
    pub throughput_generated: f64,
    pub throughput_difference_percent: f64,
}

impl CrossCorrelation {
    pub fn new(original: &[f64], generated: &[f64]) -> Result<Self> {
        let a = standardize(original)?;
        let b = standardize(generated)?;
        let lags = -(b.len() as isize - 1)..=(a.len() as isize - 1);
        let (best_lag, peak) = lags
            .map(|lag| (lag, correlation_at(&a, &b, lag)))
            .fold((0, f64::NEG_INFINITY), |best, cur| {
                if cur.1 > best.1 {
                    cur
                } else {
                    best
                }
            });
        let throughput_original = original.iter().sum::<f64>() / original.len() as f64;
        let throughput_generated = generated.iter().sum::<f64>() / generated.len() as f64;
        let average = (throughput_original + throughput_generated) / 2.;
        let throughput_difference_percent = if average == 0. {
            0.
        } else {
            (throughput_original - throughput_generated).abs() / average * 100.
        };
        Ok(CrossCorrelation {
            similarity_score: peak / a.len() as f64,
            best_lag: best_lag as i64,
            throughput_original,
            throughput_generated,
            throughput_difference_percent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::Label;

    fn packets(times_sizes: &[(f64, u64)]) -> Vec<Packet> {
        times_sizes
            .iter()
            .map(|&(t, s)| Packet::new(t, s, Label::from("0")))
            .collect()
    }

    #[test]
    fn test_bits_signal() {
        let p = packets(&[(10.0, 100), (10.5, 50), (11.2, 10), (13.0, 1)]);
        let s = throughput_signal(&p, 1., SignalKind::Bits).unwrap();
        assert_eq!(s, vec![1200., 80., 0., 8.]);
        let s = throughput_signal(&p, 1., SignalKind::Packets).unwrap();
        assert_eq!(s, vec![2., 1., 0., 1.]);
    }

    #[test]
    fn test_signal_counts_every_packet() {
        let p = packets(&[(0.0, 1), (0.3, 1), (0.9, 1), (2.7, 1)]);
        let s = throughput_signal(&p, 0.3, SignalKind::Packets).unwrap();
        assert_eq!(s.iter().sum::<f64>(), 4.);
    }

    #[test]
    fn test_signal_errors() {
        assert!(matches!(
            throughput_signal(&[], 1., SignalKind::Bits),
            Err(Error::InputValidation(_))
        ));
        let p = packets(&[(0.0, 1)]);
        assert!(matches!(
            throughput_signal(&p, 0., SignalKind::Bits),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_signal_too_long() {
        let p = packets(&[(0.0, 1), (1e9, 1)]);
        assert!(matches!(
            throughput_signal(&p, 1e-3, SignalKind::Bits),
            Err(Error::InputValidation(_))
        ));
        let s = throughput_signal(&p, 1e3, SignalKind::Packets).unwrap();
        assert_eq!(s.len(), 1_000_001);
    }

    #[test]
    fn test_standardize() {
        let s = standardize(&[1., 2., 3., 4.]).unwrap();
        let mean: f64 = s.iter().sum::<f64>() / 4.;
        let var: f64 = s.iter().map(|v| v * v).sum::<f64>() / 4.;
        assert!(mean.abs() < 1e-12);
        assert!((var - 1.).abs() < 1e-12);
        assert!(matches!(
            standardize(&[3., 3., 3.]),
            Err(Error::InputValidation(_))
        ));
    }

    #[test]
    fn test_autocorrelation_is_symmetric() {
        let s = standardize(&[1., 5., 2., 8., 3., 0., 4.]).unwrap();
        let c = autocorrelation(&s, 3);
        assert_eq!(c.len(), 7);
        assert!((c[3] - 1.).abs() < 1e-12);
        for k in 0..3 {
            assert!((c[k] - c[6 - k]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_mse_of_identical_signals() {
        let s = standardize(&[1., 5., 2., 8., 3., 0., 4., 4.]).unwrap();
        let (lag, mse) = autocorrelation_mse(&s, &s, None).unwrap();
        assert_eq!(lag, 4);
        assert!(mse.abs() < 1e-12);
        let other = standardize(&[8., 0., 8., 0., 8., 0., 8., 0.]).unwrap();
        let (_, mse) = autocorrelation_mse(&s, &other, Some(100)).unwrap();
        assert!(mse > 0.);
    }

    #[test]
    fn test_cross_correlation_finds_shift() {
        let a = [0., 0., 1., 5., 1., 0., 0., 0.];
        let b = [1., 5., 1., 0., 0., 0., 0., 0.];
        let cc = CrossCorrelation::new(&a, &b).unwrap();
        assert_eq!(cc.best_lag, 2);
        assert!(cc.throughput_difference_percent.abs() < 1e-12);

        let same = CrossCorrelation::new(&a, &a).unwrap();
        assert_eq!(same.best_lag, 0);
        assert!((same.similarity_score - 1.).abs() < 1e-12);
    }
}
