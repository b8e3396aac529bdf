use clap::{Parser, Subcommand};
use flowsynth::config::AlgorithmName;
use flowsynth::generation::SamplingMode;
use flowsynth::models::ModelKind;
use flowsynth::validation::SignalKind;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Split an application flow into sub-flows by clustering its packet sizes
    Cluster {
        #[arg(short, long, help = "Packet table (csv) with Time and Size columns")]
        input: PathBuf,
        #[arg(short, long, help = "Output packet table (csv) with a Label column")]
        output: PathBuf,
        #[arg(short, long, default_value = None, help = "Path to the configuration file (toml)")]
        config: Option<PathBuf>,
        #[arg(long, help = "Clustering algorithm: gmm or dbscan")]
        algorithm: Option<AlgorithmName>,
        #[arg(long, help = "Largest number of mixture components to try (gmm)")]
        max_components: Option<usize>,
        #[arg(long, help = "Clusters with fewer packets are merged into their nearest neighbour (gmm)")]
        min_cluster_size: Option<usize>,
        #[arg(long, help = "Neighbourhood radius, in bytes (dbscan)")]
        eps: Option<f64>,
        #[arg(long, help = "Neighbours needed to be a core point, itself included (dbscan)")]
        min_samples: Option<usize>,
    },
    /// Build the models of the sub-flows of a labelled packet table
    Model {
        #[arg(short, long, help = "Packet table (csv)")]
        input: PathBuf,
        #[arg(short, long, help = "Output model document (json)")]
        output: PathBuf,
        #[arg(short, long, default_value = None, help = "Path to the configuration file (toml)")]
        config: Option<PathBuf>,
        #[arg(long, help = "Kind of model")]
        kind: Option<ModelKind>,
        #[arg(long, help = "Bin width of inter-packet times, in ms")]
        time_bin: Option<f64>,
        #[arg(long, help = "Bin width of packet sizes, in bytes")]
        size_bin: Option<f64>,
        #[arg(long, help = "Only model this sub-flow")]
        sub_flow: Option<String>,
        #[arg(
            long,
            default_value_t = false,
            conflicts_with = "sub_flow",
            help = "Model the whole table as a single flow, ignoring labels"
        )]
        overall: bool,
    },
    /// Synthesize a packet trace from a model document
    Generate {
        #[arg(short, long, help = "Model document (json)")]
        input: PathBuf,
        #[arg(short, long, help = "Output packet table (csv)")]
        output: PathBuf,
        #[arg(short, long, default_value = None, help = "Path to the configuration file (toml)")]
        config: Option<PathBuf>,
        #[arg(short, long, help = "Duration of the trace, in seconds")]
        duration: Option<f64>,
        #[arg(long, help = "Sampling mode of packet sizes: dist, uni, exp, norm, lognorm or gamma")]
        size_mode: Option<SamplingMode>,
        #[arg(long, help = "Sampling mode of inter-packet times: dist, uni, exp, norm, lognorm or gamma")]
        time_mode: Option<SamplingMode>,
        #[arg(short, long, help = "Seed for random number generation")]
        seed: Option<u64>,
    },
    /// Compare a generated trace with the original one
    Validate {
        #[arg(long, help = "Original packet table (csv)")]
        original: PathBuf,
        #[arg(long, help = "Generated packet table (csv)")]
        generated: PathBuf,
        #[arg(short, long, default_value = None, help = "Path to the configuration file (toml)")]
        config: Option<PathBuf>,
        #[arg(long, help = "Width of the throughput bins, in seconds")]
        interval: Option<f64>,
        #[arg(long, help = "Throughput signal")]
        signal: Option<SignalKind>,
        #[arg(long, help = "Half-width of the autocorrelation window, in bins")]
        max_lag: Option<usize>,
        #[arg(short, long, default_value = None, help = "Output report (json)")]
        output: Option<PathBuf>,
    },
    /// Summarize the packet sizes of a trace, to help choosing clustering parameters
    Sizes {
        #[arg(short, long, help = "Packet table (csv)")]
        input: PathBuf,
        #[arg(short, long, default_value = None, help = "Output summary (json)")]
        output: Option<PathBuf>,
    },
}
