use crate::error::{Error, Result};
use crate::models::{DistributionBin, SubModel, SummaryStats};
use rand_core::*;
use rand_distr::weighted::WeightedIndex;
use rand_distr::{Distribution, Exp, Gamma, LogNormal, Normal, Uniform};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// Number of draws before a truncated normal falls back to clamping
const MAX_ATTEMPTS: usize = 1000;

/// How the values of a field are drawn from its model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SamplingMode {
    /// Pick a bin according to its probability, then a value uniformly inside it
    EmpiricalDistribution,
    Uniform,
    Exponential,
    /// Normal distribution truncated to the observed range
    Normal,
    LogNormal,
    Gamma,
}

impl FromStr for SamplingMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "empirical-distribution" | "distribution" | "dist" => {
                Ok(SamplingMode::EmpiricalDistribution)
            }
            "uniform" | "uni" => Ok(SamplingMode::Uniform),
            "exponential" | "exp" => Ok(SamplingMode::Exponential),
            "normal" | "norm" | "gaussian" => Ok(SamplingMode::Normal),
            "log-normal" | "lognormal" | "lognorm" => Ok(SamplingMode::LogNormal),
            "gamma" => Ok(SamplingMode::Gamma),
            _ => Err(Error::Configuration(format!(
                "Unknown sampling mode \"{s}\". Valid modes: empirical-distribution (dist), uniform (uni), exponential (exp), normal (norm), log-normal (lognorm), gamma"
            ))),
        }
    }
}

impl TryFrom<String> for SamplingMode {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl Display for SamplingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SamplingMode::EmpiricalDistribution => "empirical-distribution",
            SamplingMode::Uniform => "uniform",
            SamplingMode::Exponential => "exponential",
            SamplingMode::Normal => "normal",
            SamplingMode::LogNormal => "log-normal",
            SamplingMode::Gamma => "gamma",
        };
        write!(f, "{name}")
    }
}

impl From<SamplingMode> for String {
    fn from(mode: SamplingMode) -> Self {
        mode.to_string()
    }
}

/// One bin of an empirical sampler
#[derive(Debug, Clone)]
pub enum BinSampler {
    Point(f64),
    Range(Uniform<f64>),
}

/// A ready-to-use sampling strategy, built once per field and per sub-flow
#[derive(Debug, Clone)]
pub enum Sampler {
    /// Degenerate distribution
    Constant(f64),
    Empirical {
        index: WeightedIndex<f64>,
        bins: Vec<BinSampler>,
    },
    Uniform(Uniform<f64>),
    Exponential(Exp<f64>),
    TruncatedNormal {
        normal: Normal<f64>,
        min: f64,
        max: f64,
    },
    LogNormal(LogNormal<f64>),
    Gamma(Gamma<f64>),
}

impl Sampler {
    /// Build the sampler of a sub-model. `context` names the field and the sub-flow in error
    /// messages.
    pub fn new(mode: SamplingMode, model: &SubModel, context: &str) -> Result<Self> {
        match (mode, model) {
            (SamplingMode::EmpiricalDistribution, SubModel::Distribution(bins)) => {
                Sampler::empirical(bins, context)
            }
            (SamplingMode::EmpiricalDistribution, SubModel::Stats(_)) => {
                Err(Error::Configuration(format!(
                    "{context}: mode {mode} needs a distribution model, but the model holds statistics"
                )))
            }
            (_, SubModel::Distribution(_)) => Err(Error::Configuration(format!(
                "{context}: mode {mode} needs a statistics model, but the model holds a distribution"
            ))),
            (SamplingMode::Uniform, SubModel::Stats(s)) => Sampler::uniform(s, context),
            (SamplingMode::Exponential, SubModel::Stats(s)) => Sampler::exponential(s, context),
            (SamplingMode::Normal, SubModel::Stats(s)) => Sampler::normal(s, context),
            (SamplingMode::LogNormal, SubModel::Stats(s)) => Sampler::log_normal(s, context),
            (SamplingMode::Gamma, SubModel::Stats(s)) => Sampler::gamma(s, context),
        }
    }

    fn empirical(bins: &[DistributionBin], context: &str) -> Result<Self> {
        let index = WeightedIndex::new(bins.iter().map(|b| b.probability)).map_err(|e| {
            Error::Configuration(format!("{context}: invalid bin probabilities ({e})"))
        })?;
        let bins = bins
            .iter()
            .map(|b| {
                if b.observed_min == b.observed_max {
                    Ok(BinSampler::Point(b.observed_min))
                } else {
                    Uniform::new(b.observed_min, b.observed_max)
                        .map(BinSampler::Range)
                        .map_err(|e| {
                            Error::Configuration(format!(
                                "{context}: invalid bin [{}, {}) ({e})",
                                b.observed_min, b.observed_max
                            ))
                        })
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Sampler::Empirical { index, bins })
    }

    fn uniform(s: &SummaryStats, context: &str) -> Result<Self> {
        if s.min == s.max {
            return Ok(Sampler::Constant(s.min));
        }
        Uniform::new(s.min, s.max).map(Sampler::Uniform).map_err(|e| {
            Error::NumericDomain(format!(
                "{context}: uniform over [{}, {}) ({e})",
                s.min, s.max
            ))
        })
    }

    fn exponential(s: &SummaryStats, context: &str) -> Result<Self> {
        if s.mean == 0. {
            return Ok(Sampler::Constant(0.));
        }
        if s.mean < 0. {
            return Err(Error::NumericDomain(format!(
                "{context}: exponential with negative mean {}",
                s.mean
            )));
        }
        Exp::new(1. / s.mean)
            .map(Sampler::Exponential)
            .map_err(|e| Error::NumericDomain(format!("{context}: exponential ({e})")))
    }

    fn normal(s: &SummaryStats, context: &str) -> Result<Self> {
        if s.stddev == 0. {
            return Ok(Sampler::Constant(s.mean));
        }
        if s.min > s.max {
            return Err(Error::NumericDomain(format!(
                "{context}: empty range [{}, {}]",
                s.min, s.max
            )));
        }
        let normal = Normal::new(s.mean, s.stddev).map_err(|e| {
            Error::NumericDomain(format!(
                "{context}: normal with mean {} and stddev {} ({e})",
                s.mean, s.stddev
            ))
        })?;
        Ok(Sampler::TruncatedNormal {
            normal,
            min: s.min,
            max: s.max,
        })
    }

    fn log_normal(s: &SummaryStats, context: &str) -> Result<Self> {
        if s.stddev == 0. {
            return Ok(Sampler::Constant(s.mean));
        }
        if s.mean <= 0. {
            return Err(Error::NumericDomain(format!(
                "{context}: log-normal needs a positive mean (got {})",
                s.mean
            )));
        }
        // moments of the underlying normal distribution
        let sigma2 = (1. + s.stddev * s.stddev / (s.mean * s.mean)).ln();
        let mu = s.mean.ln() - sigma2 / 2.;
        LogNormal::new(mu, sigma2.sqrt())
            .map(Sampler::LogNormal)
            .map_err(|e| Error::NumericDomain(format!("{context}: log-normal ({e})")))
    }

    fn gamma(s: &SummaryStats, context: &str) -> Result<Self> {
        if s.mean < 0. || s.variance < 0. {
            return Err(Error::NumericDomain(format!(
                "{context}: gamma needs a non-negative mean and variance (got mean {} and variance {})",
                s.mean, s.variance
            )));
        }
        if s.mean == 0. {
            return Ok(Sampler::Constant(0.));
        }
        if s.variance == 0. {
            return Ok(Sampler::Constant(s.mean));
        }
        let shape = s.mean * s.mean / s.variance;
        let scale = s.variance / s.mean;
        Gamma::new(shape, scale)
            .map(Sampler::Gamma)
            .map_err(|e| Error::NumericDomain(format!("{context}: gamma ({e})")))
    }

    pub fn sample(&self, rng: &mut impl RngCore) -> f64 {
        match self {
            Sampler::Constant(v) => *v,
            Sampler::Empirical { index, bins } => match &bins[index.sample(rng)] {
                BinSampler::Point(v) => *v,
                BinSampler::Range(u) => u.sample(rng),
            },
            Sampler::Uniform(u) => u.sample(rng),
            Sampler::Exponential(e) => e.sample(rng),
            Sampler::TruncatedNormal { normal, min, max } => {
                for _ in 0..MAX_ATTEMPTS {
                    let v = normal.sample(rng);
                    if *min <= v && v <= *max {
                        return v;
                    }
                }
                normal.sample(rng).clamp(*min, *max)
            }
            Sampler::LogNormal(l) => l.sample(rng),
            Sampler::Gamma(g) => g.sample(rng),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_pcg::Pcg32;

    fn stats(min: f64, max: f64, mean: f64, stddev: f64) -> SubModel {
        SubModel::Stats(SummaryStats {
            min,
            max,
            mean,
            mean_of_squares: mean * mean + stddev * stddev,
            stddev,
            variance: stddev * stddev,
            coef_of_variation: if mean == 0. { None } else { Some(stddev / mean) },
        })
    }

    fn mean_of(sampler: &Sampler, n: usize) -> f64 {
        let mut rng = Pcg32::seed_from_u64(0);
        (0..n).map(|_| sampler.sample(&mut rng)).sum::<f64>() / n as f64
    }

    #[test]
    fn test_mode_names() {
        assert_eq!(
            "dist".parse::<SamplingMode>().unwrap(),
            SamplingMode::EmpiricalDistribution
        );
        assert_eq!("uni".parse::<SamplingMode>().unwrap(), SamplingMode::Uniform);
        assert_eq!("exp".parse::<SamplingMode>().unwrap(), SamplingMode::Exponential);
        assert_eq!("norm".parse::<SamplingMode>().unwrap(), SamplingMode::Normal);
        assert_eq!("log-normal".parse::<SamplingMode>().unwrap(), SamplingMode::LogNormal);
        assert_eq!("Gamma".parse::<SamplingMode>().unwrap(), SamplingMode::Gamma);
        assert!(matches!(
            "poisson".parse::<SamplingMode>(),
            Err(Error::Configuration(_))
        ));
        for mode in [SamplingMode::EmpiricalDistribution, SamplingMode::LogNormal] {
            assert_eq!(mode.to_string().parse::<SamplingMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_zero_stddev_is_constant() {
        let model = stats(5., 5., 5., 0.);
        for mode in [SamplingMode::Normal, SamplingMode::LogNormal] {
            let s = Sampler::new(mode, &model, "test").unwrap();
            let mut rng = Pcg32::seed_from_u64(1);
            assert!((0..10).all(|_| s.sample(&mut rng) == 5.));
        }
    }

    #[test]
    fn test_truncated_normal_stays_in_range() {
        let s = Sampler::new(SamplingMode::Normal, &stats(90., 110., 100., 50.), "test").unwrap();
        let mut rng = Pcg32::seed_from_u64(2);
        for _ in 0..1000 {
            let v = s.sample(&mut rng);
            assert!((90. ..=110.).contains(&v));
        }
    }

    #[test]
    fn test_parametric_means() {
        let model = stats(0., 100., 20., 10.);
        for mode in [
            SamplingMode::Exponential,
            SamplingMode::LogNormal,
            SamplingMode::Gamma,
        ] {
            let s = Sampler::new(mode, &model, "test").unwrap();
            let m = mean_of(&s, 20000);
            assert!((m - 20.).abs() < 1., "{mode}: mean {m}");
        }
        let s = Sampler::new(SamplingMode::Uniform, &model, "test").unwrap();
        assert!((mean_of(&s, 20000) - 50.).abs() < 2.);
    }

    #[test]
    fn test_gamma_domain() {
        let mut model = stats(0., 1., -1., 1.);
        assert!(matches!(
            Sampler::new(SamplingMode::Gamma, &model, "test"),
            Err(Error::NumericDomain(_))
        ));
        if let SubModel::Stats(s) = &mut model {
            s.mean = 0.;
        }
        let s = Sampler::new(SamplingMode::Gamma, &model, "test").unwrap();
        assert_eq!(s.sample(&mut Pcg32::seed_from_u64(3)), 0.);
        let s = Sampler::new(SamplingMode::Gamma, &stats(7., 7., 7., 0.), "test").unwrap();
        assert_eq!(s.sample(&mut Pcg32::seed_from_u64(3)), 7.);
    }

    #[test]
    fn test_log_normal_needs_positive_mean() {
        assert!(matches!(
            Sampler::new(SamplingMode::LogNormal, &stats(-2., 0., -1., 1.), "test"),
            Err(Error::NumericDomain(_))
        ));
    }

    #[test]
    fn test_empirical_bins() {
        let model = SubModel::Distribution(vec![
            DistributionBin {
                observed_min: 100.,
                observed_max: 150.,
                probability: 0.75,
            },
            DistributionBin {
                observed_min: 1500.,
                observed_max: 1500.,
                probability: 0.25,
            },
        ]);
        let s = Sampler::new(SamplingMode::EmpiricalDistribution, &model, "test").unwrap();
        let mut rng = Pcg32::seed_from_u64(4);
        let n = 10000;
        let mut large = 0;
        for _ in 0..n {
            let v = s.sample(&mut rng);
            if v == 1500. {
                large += 1;
            } else {
                assert!((100. ..150.).contains(&v));
            }
        }
        let freq = large as f64 / n as f64;
        assert!((freq - 0.25).abs() < 0.02);
    }

    #[test]
    fn test_mode_mismatch() {
        assert!(matches!(
            Sampler::new(
                SamplingMode::EmpiricalDistribution,
                &stats(0., 1., 0.5, 0.1),
                "test"
            ),
            Err(Error::Configuration(_))
        ));
        let model = SubModel::Distribution(vec![DistributionBin {
            observed_min: 1.,
            observed_max: 2.,
            probability: 1.,
        }]);
        assert!(matches!(
            Sampler::new(SamplingMode::Normal, &model, "test"),
            Err(Error::Configuration(_))
        ));
    }
}
