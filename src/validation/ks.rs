use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Outcome of a two-sample Kolmogorov-Smirnov test
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KsResult {
    /// Largest distance between the two empirical distribution functions
    pub statistic: f64,
    pub p_value: f64,
}

fn sorted_sample(values: &[f64], name: &str) -> Result<Vec<f64>> {
    if values.is_empty() {
        return Err(Error::InputValidation(format!(
            "The {name} sample of a KS test is empty"
        )));
    }
    if values.iter().any(|v| v.is_nan()) {
        return Err(Error::InputValidation(format!(
            "The {name} sample of a KS test contains NaN"
        )));
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Ok(sorted)
}

/// Two-sample Kolmogorov-Smirnov test. The p-value is the asymptotic one.
pub fn ks_2samp(a: &[f64], b: &[f64]) -> Result<KsResult> {
    let a = sorted_sample(a, "first")?;
    let b = sorted_sample(b, "second")?;
    let (n1, n2) = (a.len() as f64, b.len() as f64);

    let mut statistic: f64 = 0.;
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let x = a[i].min(b[j]);
        // consume every tie at once so both functions are evaluated at the same point
        while i < a.len() && a[i] <= x {
            i += 1;
        }
        while j < b.len() && b[j] <= x {
            j += 1;
        }
        statistic = statistic.max((i as f64 / n1 - j as f64 / n2).abs());
    }

    let en = (n1 * n2 / (n1 + n2)).sqrt();
    let p_value = kolmogorov_survival((en + 0.12 + 0.11 / en) * statistic);
    log::trace!("KS test: D = {statistic}, p = {p_value}");
    Ok(KsResult { statistic, p_value })
}

/// Survival function of the Kolmogorov distribution, Q(λ) = 2 Σ (-1)^(j-1) exp(-2 j² λ²)
fn kolmogorov_survival(lambda: f64) -> f64 {
    let a2 = -2. * lambda * lambda;
    let mut sign = 2.;
    let mut sum = 0.;
    let mut previous_term: f64 = 0.;
    for j in 1..=100 {
        let j = j as f64;
        let term = sign * (a2 * j * j).exp();
        sum += term;
        if term.abs() <= 0.001 * previous_term || term.abs() <= 1e-8 * sum {
            return sum.clamp(0., 1.);
        }
        sign = -sign;
        previous_term = term.abs();
    }
    // the series does not converge for tiny λ, where the distributions are indistinguishable
    1.
}
