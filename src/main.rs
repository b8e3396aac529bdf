use flowsynth::config::{self, Config};
use flowsynth::structs::*;
use flowsynth::*;
mod cmd;

use clap::Parser;
use std::fs;
use std::path::Path;
use std::process;

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => config::import_config(&fs::read_to_string(p)?),
        None => Ok(Config::default()),
    }
}

/// The entry point of the application.
///
/// Any error is logged and ends the process with a non-zero status.
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = cmd::Args::parse();
    if let Err(e) = run(args.command) {
        log::error!("{e}");
        process::exit(1);
    }
}

fn run(command: cmd::Command) -> Result<()> {
    match command {
        cmd::Command::Cluster {
            input,
            output,
            config,
            algorithm,
            max_components,
            min_cluster_size,
            eps,
            min_samples,
        } => {
            let mut c = load_config(config.as_deref())?.clustering;
            // command line overrides the configuration file
            c.algorithm = algorithm.unwrap_or(c.algorithm);
            c.max_components = max_components.unwrap_or(c.max_components);
            c.min_cluster_size = min_cluster_size.unwrap_or(c.min_cluster_size);
            c.eps = eps.unwrap_or(c.eps);
            c.min_samples = min_samples.unwrap_or(c.min_samples);

            let mut table = export::read_packet_table(&input)?;
            clustering::cluster_table(&mut table, &c.algorithm())?;
            export::write_packet_table(&output, &table)
        }
        cmd::Command::Model {
            input,
            output,
            config,
            kind,
            time_bin,
            size_bin,
            sub_flow,
            overall,
        } => {
            let mut params = load_config(config.as_deref())?.modeling;
            params.kind = kind.unwrap_or(params.kind);
            params.time_bin = time_bin.unwrap_or(params.time_bin);
            params.size_bin = size_bin.unwrap_or(params.size_bin);

            let table = export::read_packet_table(&input)?;
            let doc = if overall {
                models::model_overall(&table, &params)?
            } else if let Some(label) = sub_flow {
                models::model_sub_flow(&table, &Label::new(label), &params)?
            } else {
                models::model_sub_flows(&table, &params)?
            };
            export::write_models(&output, &doc)
        }
        cmd::Command::Generate {
            input,
            output,
            config,
            duration,
            size_mode,
            time_mode,
            seed,
        } => {
            let mut params = load_config(config.as_deref())?.generation;
            params.duration = duration.unwrap_or(params.duration);
            params.packet_size_mode = size_mode.unwrap_or(params.packet_size_mode);
            params.inter_time_mode = time_mode.unwrap_or(params.inter_time_mode);
            params.seed = seed.or(params.seed);
            log::info!(
                "Generating {} s of traffic (sizes: {}, inter-packet times: {})",
                params.duration,
                params.packet_size_mode,
                params.inter_time_mode
            );

            let doc = export::read_models(&input)?;
            // nothing is written unless every sub-flow was generated
            let table = generation::generate(&doc.sub_flows, &params)?;
            if table.is_empty() {
                log::warn!("No packet generated: the duration is too small");
            }
            export::write_packet_table(&output, &table)
        }
        cmd::Command::Validate {
            original,
            generated,
            config,
            interval,
            signal,
            max_lag,
            output,
        } => {
            let mut params = load_config(config.as_deref())?.validation;
            params.sampling_interval = interval.unwrap_or(params.sampling_interval);
            params.signal = signal.unwrap_or(params.signal);
            params.max_lag = max_lag.or(params.max_lag);

            let original = export::read_packet_table(&original)?;
            let generated = export::read_packet_table(&generated)?;
            let report = validation::compare(&original, &generated, &params)?;
            report.log();
            match output {
                Some(path) => export::write_json(&path, &report),
                None => Ok(()),
            }
        }
        cmd::Command::Sizes { input, output } => {
            let table = export::read_packet_table(&input)?;
            let occurrences = clustering::size_occurrences(&table.packets);
            log::info!(
                "{} packets, {} distinct sizes, {} of them seen more than once",
                table.len(),
                occurrences.distinct_sizes,
                occurrences.repeated.len()
            );
            for (size, count) in occurrences.repeated.iter() {
                log::info!("Size {size}: {count} packets");
            }
            match output {
                Some(path) => export::write_json(&path, &occurrences),
                None => Ok(()),
            }
        }
    }
}
