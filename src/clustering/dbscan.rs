use crate::error::{Error, Result};

/// Density-based clustering of one-dimensional values.
///
/// A point is a core point if at least `min_samples` points (itself included) lie at a distance
/// of at most `eps`. Clusters are numbered from 0 in order of discovery, scanning the points in
/// input order; a border point belongs to the first cluster reaching it. Points reachable from
/// no core point are labelled -1.
pub fn dbscan(values: &[f64], eps: f64, min_samples: usize) -> Result<Vec<i64>> {
    if !(eps.is_finite() && eps > 0.) {
        return Err(Error::Configuration(format!(
            "DBSCAN eps must be positive (got {eps})"
        )));
    }
    if min_samples == 0 {
        return Err(Error::Configuration(
            "DBSCAN min_samples must be at least 1".to_string(),
        ));
    }
    if let Some(v) = values.iter().find(|v| v.is_nan()) {
        return Err(Error::InputValidation(format!(
            "Cannot cluster a non-numeric value ({v})"
        )));
    }

    // In one dimension, the neighbourhood of a point is a contiguous range of the sorted values
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    let sorted: Vec<f64> = order.iter().map(|&i| values[i]).collect();
    let neighbourhoods: Vec<(usize, usize)> = values
        .iter()
        .map(|&v| {
            let lo = sorted.partition_point(|&x| v - x > eps);
            let hi = sorted.partition_point(|&x| x - v <= eps);
            (lo, hi)
        })
        .collect();
    let is_core: Vec<bool> = neighbourhoods
        .iter()
        .map(|(lo, hi)| hi - lo >= min_samples)
        .collect();

    const UNASSIGNED: i64 = -1;
    let mut labels = vec![UNASSIGNED; values.len()];
    let mut cluster: i64 = 0;
    let mut stack: Vec<usize> = vec![];
    for start in 0..values.len() {
        if labels[start] != UNASSIGNED || !is_core[start] {
            continue;
        }
        stack.push(start);
        while let Some(i) = stack.pop() {
            if labels[i] != UNASSIGNED {
                continue;
            }
            labels[i] = cluster;
            if is_core[i] {
                let (lo, hi) = neighbourhoods[i];
                stack.extend(
                    order[lo..hi]
                        .iter()
                        .copied()
                        .filter(|&n| labels[n] == UNASSIGNED),
                );
            }
        }
        cluster += 1;
    }

    let noise = labels.iter().filter(|&&l| l == UNASSIGNED).count();
    if cluster == 0 {
        log::warn!(
            "No cluster found with eps={eps} and min_samples={min_samples}: all points are noise"
        );
    } else {
        log::debug!("DBSCAN: {cluster} clusters, {noise} noise points");
    }
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_clusters_and_noise() {
        let labels = dbscan(&[100., 100., 150., 5000., 5000.], 40., 2).unwrap();
        assert_eq!(labels, vec![0, 0, -1, 1, 1]);
    }

    #[test]
    fn test_border_point_joins_cluster() {
        // 50 and 150 are within eps of the core points at 100, but have only 3 neighbours
        let labels = dbscan(&[50., 100., 100., 150., 5000., 5000.], 60., 4).unwrap();
        assert_eq!(labels, vec![0, 0, 0, 0, -1, -1]);
    }

    #[test]
    fn test_chain_is_density_connected() {
        let labels = dbscan(&[0., 10., 20., 30., 40., 200.], 10., 2).unwrap();
        assert_eq!(labels, vec![0, 0, 0, 0, 0, -1]);
    }

    #[test]
    fn test_cluster_order_follows_input() {
        let labels = dbscan(&[5000., 100., 5000., 100.], 10., 2).unwrap();
        assert_eq!(labels, vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_all_noise() {
        let labels = dbscan(&[1., 100., 1000.], 5., 2).unwrap();
        assert_eq!(labels, vec![-1, -1, -1]);
    }

    #[test]
    fn test_deterministic() {
        let values: Vec<f64> = (0..200).map(|i| ((i * 7919) % 311) as f64).collect();
        assert_eq!(
            dbscan(&values, 3., 3).unwrap(),
            dbscan(&values, 3., 3).unwrap()
        );
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(dbscan(&[1.], 0., 2), Err(Error::Configuration(_))));
        assert!(matches!(dbscan(&[1.], 1., 0), Err(Error::Configuration(_))));
    }
}
