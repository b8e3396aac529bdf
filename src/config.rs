use crate::clustering::ClusteringAlgorithm;
use crate::error::{Error, Result};
use crate::generation::GenerationConfig;
use crate::models::ModelingParams;
use crate::validation::ValidationParams;
use serde::Deserialize;
use std::str::FromStr;

/// Name of a clustering algorithm, as written in the configuration or on the command line
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlgorithmName {
    Gmm,
    Dbscan,
}

impl FromStr for AlgorithmName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "gmm" => Ok(AlgorithmName::Gmm),
            "dbscan" => Ok(AlgorithmName::Dbscan),
            _ => Err(Error::Configuration(format!(
                "Unknown clustering algorithm \"{s}\". Valid algorithms: gmm, dbscan"
            ))),
        }
    }
}

/// The [clustering] table. Parameters of both algorithms may be given; only the ones of the
/// selected algorithm are used.
#[derive(Deserialize, Debug, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct ClusteringConfig {
    pub algorithm: AlgorithmName,
    pub max_components: usize,
    pub min_cluster_size: usize,
    pub eps: f64,
    pub min_samples: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        ClusteringConfig {
            algorithm: AlgorithmName::Gmm,
            max_components: 10,
            min_cluster_size: 2,
            eps: 100.,
            min_samples: 5,
        }
    }
}

impl ClusteringConfig {
    pub fn algorithm(&self) -> ClusteringAlgorithm {
        match self.algorithm {
            AlgorithmName::Gmm => ClusteringAlgorithm::Gmm {
                max_components: self.max_components,
                min_cluster_size: self.min_cluster_size,
            },
            AlgorithmName::Dbscan => ClusteringAlgorithm::Dbscan {
                eps: self.eps,
                min_samples: self.min_samples,
            },
        }
    }
}

/// The whole configuration. Every table is optional.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub clustering: ClusteringConfig,
    pub modeling: ModelingParams,
    pub generation: GenerationConfig,
    pub validation: ValidationParams,
}

/// Parse a TOML configuration. Missing values take their default.
pub fn import_config(config: &str) -> Result<Config> {
    let config: Config = toml::from_str(config)
        .map_err(|e| Error::Configuration(format!("Ill-formed configuration file: {e}")))?;
    log::info!("Configuration loaded");
    log::debug!("{config:?}");
    Ok(config)
}
