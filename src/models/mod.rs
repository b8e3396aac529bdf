use crate::error::{Error, Result};
use crate::structs::*;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Empirical distributions
pub mod distribution;
/// Summary statistics
pub mod stats;

pub use distribution::DistributionBin;
pub use stats::SummaryStats;

/// How a sub-flow is described
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Summary statistics, to be used with parametric samplers
    Stats,
    /// Binned empirical distributions, to be used with empirical resampling
    Distribution,
}

/// The model of one numeric series of a sub-flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubModel {
    Stats(SummaryStats),
    Distribution(Vec<DistributionBin>),
}

impl SubModel {
    fn kind(&self) -> ModelKind {
        match self {
            SubModel::Stats(_) => ModelKind::Stats,
            SubModel::Distribution(_) => ModelKind::Distribution,
        }
    }
}

/// The model of a sub-flow. Inter-packet times are in milliseconds and packet sizes in bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowModel {
    pub label: Label,
    #[serde(rename = "type")]
    pub kind: ModelKind,
    #[serde(rename = "inter-packet-times")]
    pub inter_packet_times: SubModel,
    #[serde(rename = "packet-sizes")]
    pub packet_sizes: SubModel,
}

impl FlowModel {
    /// Check that both sub-models match the declared kind
    pub fn check(&self) -> Result<()> {
        for (name, sub) in [
            ("inter-packet-times", &self.inter_packet_times),
            ("packet-sizes", &self.packet_sizes),
        ] {
            if sub.kind() != self.kind {
                return Err(Error::Configuration(format!(
                    "Sub-flow {}: \"{name}\" is a {:?} model but the sub-flow is declared as {:?}",
                    self.label,
                    sub.kind(),
                    self.kind
                )));
            }
            if let SubModel::Distribution(bins) = sub {
                if bins.is_empty() {
                    return Err(Error::Configuration(format!(
                        "Sub-flow {}: \"{name}\" has no bin",
                        self.label
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A model document: the models of all the sub-flows of a trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDocument {
    #[serde(rename = "sub-flows")]
    pub sub_flows: Vec<FlowModel>,
}

impl ModelDocument {
    /// Parse and check a JSON model document
    pub fn from_json(s: &str) -> Result<Self> {
        let doc: ModelDocument = serde_json::from_str(s)
            .map_err(|e| Error::Configuration(format!("Ill-formed model document: {e}")))?;
        for m in doc.sub_flows.iter() {
            m.check()?;
        }
        log::debug!("{} sub-flow models loaded", doc.sub_flows.len());
        Ok(doc)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Modeling parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelingParams {
    pub kind: ModelKind,
    /// Bin width of inter-packet times, in milliseconds
    pub time_bin: f64,
    /// Bin width of packet sizes, in bytes
    pub size_bin: f64,
}

impl Default for ModelingParams {
    fn default() -> Self {
        ModelingParams {
            kind: ModelKind::Stats,
            time_bin: 100.,
            size_bin: 100.,
        }
    }
}

/// Build the model of one flow
pub fn model_flow(flow: &Flow, params: &ModelingParams) -> Result<FlowModel> {
    if flow.len() < 2 {
        return Err(Error::InputValidation(format!(
            "Sub-flow {} must contain at least two packets to compute inter-packet times (got {})",
            flow.label,
            flow.len()
        )));
    }
    let times = flow.inter_packet_times();
    let sizes = flow.sizes();
    let (inter_packet_times, packet_sizes) = match params.kind {
        ModelKind::Stats => (
            SubModel::Stats(SummaryStats::from_values(&times)?),
            SubModel::Stats(SummaryStats::from_values(&sizes)?),
        ),
        ModelKind::Distribution => (
            SubModel::Distribution(distribution::distribution(&times, params.time_bin)?),
            SubModel::Distribution(distribution::distribution(&sizes, params.size_bin)?),
        ),
    };
    log::debug!(
        "Sub-flow {}: {:?} model built from {} packets",
        flow.label,
        params.kind,
        flow.len()
    );
    Ok(FlowModel {
        label: flow.label.clone(),
        kind: params.kind,
        inter_packet_times,
        packet_sizes,
    })
}

/// Model every sub-flow of a labelled table
pub fn model_sub_flows(table: &PacketTable, params: &ModelingParams) -> Result<ModelDocument> {
    let sub_flows = table
        .sub_flows()
        .iter()
        .map(|f| model_flow(f, params))
        .collect::<Result<Vec<_>>>()?;
    log::info!("{} sub-flows modeled", sub_flows.len());
    Ok(ModelDocument { sub_flows })
}

/// Model a single sub-flow of a labelled table
pub fn model_sub_flow(
    table: &PacketTable,
    label: &Label,
    params: &ModelingParams,
) -> Result<ModelDocument> {
    let flows = table.sub_flows();
    match flows.iter().find(|f| &f.label == label) {
        Some(flow) => Ok(ModelDocument {
            sub_flows: vec![model_flow(flow, params)?],
        }),
        None => {
            let available: Vec<&str> = flows.iter().map(|f| f.label.as_str()).collect();
            Err(Error::InputValidation(format!(
                "Invalid sub-flow {label}. Available sub-flows: {available:?}"
            )))
        }
    }
}

/// Model the whole table as one flow, regardless of its labels
pub fn model_overall(table: &PacketTable, params: &ModelingParams) -> Result<ModelDocument> {
    let flow = table.as_single_flow(Label::from(0i64));
    Ok(ModelDocument {
        sub_flows: vec![model_flow(&flow, params)?],
    })
}
