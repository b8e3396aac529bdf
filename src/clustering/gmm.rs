use crate::error::{Error, Result};
use std::f64::consts::PI;

const MAX_ITER: usize = 100;
const TOLERANCE: f64 = 1e-3;
const REG_VARIANCE: f64 = 1e-6;
const KMEANS_ITER: usize = 100;

/// A fitted one-dimensional Gaussian mixture
#[derive(Debug, Clone)]
pub struct GaussianMixture {
    pub weights: Vec<f64>,
    pub means: Vec<f64>,
    pub variances: Vec<f64>,
    /// Total log-likelihood of the data the mixture was fitted on
    pub log_likelihood: f64,
    pub sample_count: usize,
}

fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

/// Deterministic initial centers: k-means started from evenly spaced quantiles
fn kmeans_centers(data: &[f64], k: usize) -> Vec<f64> {
    let mut sorted = data.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    let mut centers: Vec<f64> = (0..k)
        .map(|j| sorted[(((j as f64 + 0.5) / k as f64) * n as f64) as usize % n])
        .collect();
    for _ in 0..KMEANS_ITER {
        let mut sums = vec![0.; k];
        let mut counts = vec![0usize; k];
        for &x in data {
            let j = nearest(&centers, x);
            sums[j] += x;
            counts[j] += 1;
        }
        let mut moved = false;
        for j in 0..k {
            if counts[j] > 0 {
                let c = sums[j] / counts[j] as f64;
                moved |= c != centers[j];
                centers[j] = c;
            }
        }
        if !moved {
            break;
        }
    }
    centers
}

fn nearest(centers: &[f64], x: f64) -> usize {
    let mut best = 0;
    for (j, c) in centers.iter().enumerate() {
        if (x - c).abs() < (x - centers[best]).abs() {
            best = j;
        }
    }
    best
}

impl GaussianMixture {
    /// Fit a mixture of `k` components with the EM algorithm
    pub fn fit(data: &[f64], k: usize) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::InputValidation(
                "Cannot fit a mixture on an empty series".to_string(),
            ));
        }
        if k == 0 || k > data.len() {
            return Err(Error::Configuration(format!(
                "Cannot fit {k} components on {} points",
                data.len()
            )));
        }
        let n = data.len() as f64;

        // initial parameters from a hard k-means partition
        let centers = kmeans_centers(data, k);
        let mut resp = vec![vec![0.; k]; data.len()];
        for (i, &x) in data.iter().enumerate() {
            resp[i][nearest(&centers, x)] = 1.;
        }
        let mut mixture = GaussianMixture {
            weights: vec![1. / k as f64; k],
            means: centers,
            variances: vec![1.; k],
            log_likelihood: f64::NEG_INFINITY,
            sample_count: data.len(),
        };
        mixture.maximization(data, &resp);

        let mut previous = f64::NEG_INFINITY;
        for iteration in 0..MAX_ITER {
            let ll = mixture.expectation(data, &mut resp);
            if (ll - previous) / n < TOLERANCE && iteration > 0 {
                break;
            }
            previous = ll;
            mixture.maximization(data, &resp);
        }
        mixture.log_likelihood = mixture.expectation(data, &mut resp);
        log::trace!(
            "GMM with {k} components: log-likelihood {:.3}",
            mixture.log_likelihood
        );
        Ok(mixture)
    }

    fn component_log_densities(&self, x: f64, out: &mut [f64]) {
        for (j, o) in out.iter_mut().enumerate() {
            let var = self.variances[j];
            *o = self.weights[j].ln()
                - 0.5 * (2. * PI * var).ln()
                - (x - self.means[j]).powi(2) / (2. * var);
        }
    }

    /// Compute the responsibilities and return the total log-likelihood
    fn expectation(&self, data: &[f64], resp: &mut [Vec<f64>]) -> f64 {
        let mut ll = 0.;
        let mut log_p = vec![0.; self.means.len()];
        for (i, &x) in data.iter().enumerate() {
            self.component_log_densities(x, &mut log_p);
            let lse = log_sum_exp(&log_p);
            for (r, lp) in resp[i].iter_mut().zip(log_p.iter()) {
                *r = (lp - lse).exp();
            }
            ll += lse;
        }
        ll
    }

    fn maximization(&mut self, data: &[f64], resp: &[Vec<f64>]) {
        let n = data.len() as f64;
        for j in 0..self.means.len() {
            let nk: f64 = resp.iter().map(|r| r[j]).sum::<f64>() + 10. * f64::EPSILON;
            let mean = data
                .iter()
                .zip(resp.iter())
                .map(|(x, r)| r[j] * x)
                .sum::<f64>()
                / nk;
            let var = data
                .iter()
                .zip(resp.iter())
                .map(|(x, r)| r[j] * (x - mean).powi(2))
                .sum::<f64>()
                / nk;
            self.weights[j] = nk / n;
            self.means[j] = mean;
            self.variances[j] = var + REG_VARIANCE;
        }
    }

    pub fn n_components(&self) -> usize {
        self.means.len()
    }

    /// Free parameters: means, variances and weights (which sum to one)
    pub fn n_parameters(&self) -> usize {
        3 * self.n_components() - 1
    }

    /// Bayesian Information Criterion. The lower, the better.
    pub fn bic(&self) -> f64 {
        -2. * self.log_likelihood + self.n_parameters() as f64 * (self.sample_count as f64).ln()
    }

    /// Index of the component with the highest posterior probability for each value
    pub fn predict(&self, data: &[f64]) -> Vec<usize> {
        let mut log_p = vec![0.; self.n_components()];
        data.iter()
            .map(|&x| {
                self.component_log_densities(x, &mut log_p);
                let mut best = 0;
                for j in 1..log_p.len() {
                    if log_p[j] > log_p[best] {
                        best = j;
                    }
                }
                best
            })
            .collect()
    }
}

/// Fit mixtures with 1 to `max_components` components and keep the one with the lowest BIC.
/// Ties are won by the smallest component count.
pub fn select_model(data: &[f64], max_components: usize) -> Result<GaussianMixture> {
    if max_components == 0 {
        return Err(Error::Configuration(
            "max_components must be at least 1".to_string(),
        ));
    }
    if let Some(v) = data.iter().find(|v| !v.is_finite()) {
        return Err(Error::InputValidation(format!(
            "Cannot cluster a non-finite value ({v})"
        )));
    }
    let mut best: Option<GaussianMixture> = None;
    for k in 1..=max_components.min(data.len()) {
        let gmm = GaussianMixture::fit(data, k)?;
        log::debug!("{k} components: BIC = {:.3}", gmm.bic());
        if best.as_ref().map_or(true, |b| gmm.bic() < b.bic()) {
            best = Some(gmm);
        }
    }
    best.ok_or_else(|| {
        Error::InputValidation("Cannot fit a mixture on an empty series".to_string())
    })
}

/// Reassign the members of small clusters (fewer than `min_cluster_size` members, empty
/// components included) to the nearest cluster mean that is not small. Cluster sizes are counted
/// once, before any reassignment, and the points are processed in input order.
pub fn merge_small_clusters(
    data: &[f64],
    labels: &mut [usize],
    means: &[f64],
    min_cluster_size: usize,
) -> Result<()> {
    if data.len() != labels.len() {
        return Err(Error::InputValidation(format!(
            "{} labels for {} points",
            labels.len(),
            data.len()
        )));
    }
    let mut sizes = vec![0usize; means.len()];
    for &l in labels.iter() {
        match sizes.get_mut(l) {
            Some(s) => *s += 1,
            None => {
                return Err(Error::InputValidation(format!(
                    "Cluster {l} has no mean ({} clusters)",
                    means.len()
                )))
            }
        }
    }
    let small: Vec<bool> = sizes.iter().map(|&s| s < min_cluster_size).collect();
    if !labels.iter().any(|&l| small[l]) {
        return Ok(());
    }
    if small.iter().all(|&s| s) {
        return Err(Error::Convergence(format!(
            "Every cluster has fewer than {min_cluster_size} members (sizes: {sizes:?}), no cluster can absorb the others"
        )));
    }

    let mut moved = 0;
    for (i, label) in labels.iter_mut().enumerate() {
        if !small[*label] {
            continue;
        }
        let mut distances: Vec<f64> = means.iter().map(|m| (data[i] - m).abs()).collect();
        // at most one exclusion per cluster, so this ends
        loop {
            let mut nearest = 0;
            for j in 1..distances.len() {
                if distances[j] < distances[nearest] {
                    nearest = j;
                }
            }
            if distances[nearest] == f64::INFINITY {
                return Err(Error::Convergence(format!(
                    "No cluster can absorb the point {}",
                    data[i]
                )));
            }
            if small[nearest] {
                distances[nearest] = f64::INFINITY;
            } else {
                *label = nearest;
                moved += 1;
                break;
            }
        }
    }
    log::debug!("{moved} points of small clusters have been reassigned");
    Ok(())
}

/// Model-based clustering: best mixture by BIC, hard assignment, then small-cluster merge
pub fn gmm(values: &[f64], max_components: usize, min_cluster_size: usize) -> Result<Vec<i64>> {
    let mixture = select_model(values, max_components)?;
    log::info!("Optimal number of clusters: {}", mixture.n_components());
    let mut labels = mixture.predict(values);
    merge_small_clusters(values, &mut labels, &mixture.means, min_cluster_size)?;
    Ok(labels.into_iter().map(|l| l as i64).collect())
}
