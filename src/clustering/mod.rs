use crate::error::{Error, Result};
use crate::structs::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Density-based clustering
pub mod dbscan;
/// Model-based clustering with Gaussian mixtures
pub mod gmm;

/// The clustering algorithm used to split a flow into sub-flows, with its parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClusteringAlgorithm {
    Dbscan { eps: f64, min_samples: usize },
    Gmm {
        max_components: usize,
        min_cluster_size: usize,
    },
}

/// Compute one label per value, in the same order
pub fn cluster(values: &[f64], algorithm: &ClusteringAlgorithm) -> Result<Vec<Label>> {
    log::trace!("Start clustering with {algorithm:?}");
    let ids = match *algorithm {
        ClusteringAlgorithm::Dbscan { eps, min_samples } => {
            dbscan::dbscan(values, eps, min_samples)?
        }
        ClusteringAlgorithm::Gmm {
            max_components,
            min_cluster_size,
        } => gmm::gmm(values, max_components, min_cluster_size)?,
    };
    Ok(ids.into_iter().map(Label::from).collect())
}

/// Label every packet of the table according to its size
pub fn cluster_table(table: &mut PacketTable, algorithm: &ClusteringAlgorithm) -> Result<()> {
    if table.is_empty() {
        return Err(Error::InputValidation(
            "Cannot cluster an empty packet table".to_string(),
        ));
    }
    let labels = cluster(&table.sizes(), algorithm)?;
    table.relabel(labels)?;
    for (label, count) in cluster_sizes(&table.packets) {
        if label.is_noise() {
            log::info!("Cluster {label} (noise): {count} elements");
        } else {
            log::info!("Cluster {label}: {count} elements");
        }
    }
    Ok(())
}

/// Numeric labels first, in numeric order, then the other labels as text
fn label_order(a: &Label, b: &Label) -> Ordering {
    match (a.as_str().parse::<i64>(), b.as_str().parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Member count of each label, sorted by label
pub fn cluster_sizes(packets: &[Packet]) -> Vec<(Label, usize)> {
    let mut counts: HashMap<&Label, usize> = HashMap::new();
    for p in packets {
        *counts.entry(&p.label).or_default() += 1;
    }
    let mut sizes: Vec<(Label, usize)> = counts.into_iter().map(|(l, c)| (l.clone(), c)).collect();
    sizes.sort_by(|a, b| label_order(&a.0, &b.0));
    sizes
}

/// How often packet sizes occur in a flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizeOccurrences {
    pub distinct_sizes: usize,
    /// (size, count) of the sizes seen more than once, by decreasing count
    pub repeated: Vec<(u64, usize)>,
}

/// Count the distinct packet sizes and the sizes that appear more than once
pub fn size_occurrences(packets: &[Packet]) -> SizeOccurrences {
    let mut counts: HashMap<u64, usize> = HashMap::new();
    for p in packets {
        *counts.entry(p.size).or_default() += 1;
    }
    let distinct_sizes = counts.len();
    let mut repeated: Vec<(u64, usize)> = counts.into_iter().filter(|(_, c)| *c > 1).collect();
    repeated.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    SizeOccurrences {
        distinct_sizes,
        repeated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(sizes: &[u64]) -> PacketTable {
        PacketTable::new(
            sizes
                .iter()
                .enumerate()
                .map(|(i, &s)| Packet::new(i as f64 * 0.1, s, Label::from("0")))
                .collect(),
        )
    }

    #[test]
    fn test_cluster_table_dbscan() {
        let mut t = table(&[100, 100, 150, 5000, 5000]);
        cluster_table(
            &mut t,
            &ClusteringAlgorithm::Dbscan {
                eps: 40.,
                min_samples: 2,
            },
        )
        .unwrap();
        let labels: Vec<&str> = t.packets.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["0", "0", "-1", "1", "1"]);
        let sizes = cluster_sizes(&t.packets);
        assert_eq!(
            sizes,
            vec![
                (Label::from("-1"), 1),
                (Label::from("0"), 2),
                (Label::from("1"), 2)
            ]
        );
    }

    #[test]
    fn test_cluster_table_gmm() {
        let sizes: Vec<u64> = (0..60)
            .map(|i| if i % 2 == 0 { 100 + (i % 7) } else { 4000 + (i % 5) })
            .collect();
        let mut t = table(&sizes);
        cluster_table(
            &mut t,
            &ClusteringAlgorithm::Gmm {
                max_components: 4,
                min_cluster_size: 2,
            },
        )
        .unwrap();
        let census = cluster_sizes(&t.packets);
        assert!(census.iter().all(|(_, c)| *c >= 2));
        // small and large messages never share a label
        for a in t.packets.iter() {
            for b in t.packets.iter() {
                if (a.size < 1000) != (b.size < 1000) {
                    assert_ne!(a.label, b.label);
                }
            }
        }
    }

    #[test]
    fn test_cluster_empty_table() {
        let mut t = PacketTable::default();
        let algo = ClusteringAlgorithm::Dbscan {
            eps: 1.,
            min_samples: 1,
        };
        assert!(matches!(
            cluster_table(&mut t, &algo),
            Err(Error::InputValidation(_))
        ));
    }

    #[test]
    fn test_census_numeric_order() {
        let packets: Vec<Packet> = ["10", "2", "-1", "2", "x", "0"]
            .iter()
            .map(|&l| Packet::new(0., 1, Label::from(l)))
            .collect();
        let labels: Vec<String> = cluster_sizes(&packets)
            .into_iter()
            .map(|(l, _)| l.to_string())
            .collect();
        assert_eq!(labels, vec!["-1", "0", "2", "10", "x"]);
    }

    #[test]
    fn test_size_occurrences() {
        let t = table(&[10, 20, 10, 30, 20, 10]);
        let occ = size_occurrences(&t.packets);
        assert_eq!(occ.distinct_sizes, 3);
        assert_eq!(occ.repeated, vec![(10, 3), (20, 2)]);
    }
}
