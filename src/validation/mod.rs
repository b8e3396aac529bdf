use crate::error::{Error, Result};
use crate::models::SummaryStats;
use crate::structs::*;
use serde::{Deserialize, Serialize};

/// Two-sample goodness-of-fit test
pub mod ks;
/// Throughput signals and their correlations
pub mod signal;

pub use ks::{ks_2samp, KsResult};
pub use signal::{CrossCorrelation, SignalKind};

/// Validation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationParams {
    /// Width of the throughput bins, in seconds
    pub sampling_interval: f64,
    pub signal: SignalKind,
    /// Half-width of the autocorrelation window, in bins. Defaults to half the shortest signal.
    pub max_lag: Option<usize>,
}

impl Default for ValidationParams {
    fn default() -> Self {
        ValidationParams {
            sampling_interval: 1.,
            signal: SignalKind::Bits,
            max_lag: None,
        }
    }
}

/// Comparison of the throughput signals of two traces
#[derive(Debug, Clone, Serialize)]
pub struct ThroughputComparison {
    pub signal: SignalKind,
    pub sampling_interval: f64,
    pub original: SummaryStats,
    pub generated: SummaryStats,
    pub max_lag: usize,
    /// Mean squared error between the normalized autocorrelations
    pub autocorrelation_mse: f64,
    pub cross_correlation: CrossCorrelation,
}

/// Everything the validator measures. No accept/reject decision is taken.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub packet_sizes: KsResult,
    /// On inter-packet times in milliseconds
    pub inter_packet_times: KsResult,
    pub throughput: ThroughputComparison,
}

impl ComparisonReport {
    pub fn log(&self) {
        log::info!(
            "Packet sizes: KS statistic {:.4}, p-value {:.4}",
            self.packet_sizes.statistic,
            self.packet_sizes.p_value
        );
        log::info!(
            "Inter-packet times: KS statistic {:.4}, p-value {:.4}",
            self.inter_packet_times.statistic,
            self.inter_packet_times.p_value
        );
        let t = &self.throughput;
        for (name, s) in [("Original", &t.original), ("Generated", &t.generated)] {
            log::info!(
                "{name} throughput: min {} max {} mean {:.2} stddev {:.2}",
                s.min,
                s.max,
                s.mean,
                s.stddev
            );
        }
        log::info!(
            "Autocorrelation MSE over ±{} bins: {:.4}",
            t.max_lag,
            t.autocorrelation_mse
        );
        log::info!(
            "Cross-correlation similarity {:.4} at lag {}, throughput difference {:.2}%",
            t.cross_correlation.similarity_score,
            t.cross_correlation.best_lag,
            t.cross_correlation.throughput_difference_percent
        );
    }
}

fn chronological(table: &PacketTable, name: &str) -> Result<PacketTable> {
    if table.len() < 2 {
        return Err(Error::InputValidation(format!(
            "The {name} trace must contain at least two packets (got {})",
            table.len()
        )));
    }
    let mut sorted = table.clone();
    sorted.sort();
    Ok(sorted)
}

/// Compare an original trace with a generated one
pub fn compare(
    original: &PacketTable,
    generated: &PacketTable,
    params: &ValidationParams,
) -> Result<ComparisonReport> {
    log::trace!("Start validation");
    let original = chronological(original, "original")?;
    let generated = chronological(generated, "generated")?;

    let packet_sizes = ks_2samp(&original.sizes(), &generated.sizes())?;
    let inter_packet_times = ks_2samp(
        &original.inter_packet_times(),
        &generated.inter_packet_times(),
    )?;

    let signal_o = signal::throughput_signal(
        &original.packets,
        params.sampling_interval,
        params.signal,
    )?;
    let signal_g = signal::throughput_signal(
        &generated.packets,
        params.sampling_interval,
        params.signal,
    )?;
    log::debug!(
        "Throughput signals of {} and {} bins",
        signal_o.len(),
        signal_g.len()
    );
    let (max_lag, autocorrelation_mse) = signal::autocorrelation_mse(
        &signal::standardize(&signal_o)?,
        &signal::standardize(&signal_g)?,
        params.max_lag,
    )?;
    let cross_correlation = CrossCorrelation::new(&signal_o, &signal_g)?;

    Ok(ComparisonReport {
        packet_sizes,
        inter_packet_times,
        throughput: ThroughputComparison {
            signal: params.signal,
            sampling_interval: params.sampling_interval,
            original: SummaryStats::from_values(&signal_o)?,
            generated: SummaryStats::from_values(&signal_g)?,
            max_lag,
            autocorrelation_mse,
            cross_correlation,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace(n: usize, period: f64, phase: usize) -> PacketTable {
        PacketTable::new(
            (0..n)
                .map(|i| {
                    let size = if (i + phase) % 5 == 0 { 1400 } else { 80 + (i % 3) as u64 };
                    Packet::new(i as f64 * period, size, Label::from("0"))
                })
                .collect(),
        )
    }

    #[test]
    fn test_compare_with_itself() {
        let t = trace(400, 0.13, 0);
        let report = compare(&t, &t, &ValidationParams::default()).unwrap();
        assert!(report.packet_sizes.statistic.abs() < 1e-12);
        assert!((report.packet_sizes.p_value - 1.).abs() < 1e-6);
        assert!(report.inter_packet_times.statistic.abs() < 1e-12);
        assert!(report.throughput.autocorrelation_mse.abs() < 1e-12);
        assert_eq!(report.throughput.cross_correlation.best_lag, 0);
        assert_eq!(report.throughput.original, report.throughput.generated);
    }

    #[test]
    fn test_unsorted_input() {
        let t = trace(300, 0.07, 1);
        let mut shuffled = t.clone();
        shuffled.packets.reverse();
        let a = compare(&t, &t, &ValidationParams::default()).unwrap();
        let b = compare(&shuffled, &t, &ValidationParams::default()).unwrap();
        assert_eq!(
            a.inter_packet_times.statistic,
            b.inter_packet_times.statistic
        );
    }

    #[test]
    fn test_packets_signal_and_lag() {
        let params = ValidationParams {
            sampling_interval: 0.5,
            signal: SignalKind::Packets,
            max_lag: Some(3),
        };
        let report = compare(&trace(200, 0.11, 0), &trace(150, 0.09, 2), &params).unwrap();
        assert_eq!(report.throughput.max_lag, 3);
        assert!(report.throughput.original.mean > 0.);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["throughput"]["signal"], "packets");
        assert!(json["packet_sizes"]["p_value"].is_number());
    }

    #[test]
    fn test_too_short_trace() {
        let t = trace(10, 0.1, 0);
        let short = trace(1, 0.1, 0);
        assert!(matches!(
            compare(&t, &short, &ValidationParams::default()),
            Err(Error::InputValidation(_))
        ));
    }
}
