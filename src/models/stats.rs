use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Summary statistics of a numeric series. Variance and standard deviation are the population
/// ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub mean_of_squares: f64,
    pub stddev: f64,
    pub variance: f64,
    /// stddev / mean, undefined when the mean is zero
    pub coef_of_variation: Option<f64>,
}

impl SummaryStats {
    pub fn from_values(values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(Error::InputValidation(
                "Cannot compute statistics over an empty series".to_string(),
            ));
        }
        let mean = values.mean();
        let stddev = values.population_std_dev();
        Ok(SummaryStats {
            min: values.min(),
            max: values.max(),
            mean,
            mean_of_squares: values.iter().map(|v| v * v).mean(),
            stddev,
            variance: values.population_variance(),
            coef_of_variation: if mean != 0. { Some(stddev / mean) } else { None },
        })
    }
}
