use crate::error::{Error, Result};
use crate::models::FlowModel;
use crate::structs::*;
use crossbeam_channel::{bounded, Sender};
use rand_core::*;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use std::thread;

/// Sampling strategies
pub mod sampler;

pub use sampler::{Sampler, SamplingMode};

/// Consecutive unusable inter-arrival draws before a worker gives up
const MAX_REDRAWS: usize = 1000;

/// Generation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationConfig {
    /// Length of the generated trace, in seconds
    pub duration: f64,
    pub packet_size_mode: SamplingMode,
    pub inter_time_mode: SamplingMode,
    /// Master seed. Without it, the trace is not reproducible.
    pub seed: Option<u64>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig {
            duration: 60.,
            packet_size_mode: SamplingMode::Normal,
            inter_time_mode: SamplingMode::Normal,
            seed: None,
        }
    }
}

/// Simulate one sub-flow from time 0 to the configured duration. Timestamps are strictly
/// increasing and never exceed the duration.
pub fn simulate_flow(
    model: &FlowModel,
    config: &GenerationConfig,
    rng: &mut impl RngCore,
) -> Result<Vec<Packet>> {
    let sizes = Sampler::new(
        config.packet_size_mode,
        &model.packet_sizes,
        &format!("Packet sizes of sub-flow {}", model.label),
    )?;
    let times = Sampler::new(
        config.inter_time_mode,
        &model.inter_packet_times,
        &format!("Inter-packet times of sub-flow {}", model.label),
    )?;

    let mut packets = vec![];
    let mut now = 0.;
    loop {
        let size = sizes.sample(rng).max(0.) as u64;
        let mut redraws = 0;
        // inter-packet times are in ms
        let next = loop {
            let next = now + times.sample(rng) / 1000.;
            if next > now {
                break next;
            }
            redraws += 1;
            if redraws == MAX_REDRAWS {
                return Err(Error::NumericDomain(format!(
                    "Sub-flow {}: {MAX_REDRAWS} consecutive non-positive inter-packet times with mode {}",
                    model.label, config.inter_time_mode
                )));
            }
        };
        if next > config.duration {
            break;
        }
        now = next;
        packets.push(Packet::new(now, size, model.label.clone()));
    }
    log::debug!(
        "Sub-flow {}: {} packets generated",
        model.label,
        packets.len()
    );
    Ok(packets)
}

/// Body of a generation worker: simulate its sub-flow and hand the packets over
fn run_worker(
    seeded: SeededData<&FlowModel>,
    config: &GenerationConfig,
    tx: &Sender<Vec<Packet>>,
) -> Result<()> {
    let mut rng = Pcg32::seed_from_u64(seeded.seed);
    let packets = simulate_flow(seeded.data, config, &mut rng)?;
    // capacity is the number of workers, so this never blocks
    tx.send(packets)
        .map_err(|_| Error::ChannelClosed(seeded.data.label.to_string()))
}

/// Generate a trace with one worker per sub-flow. The trace is returned sorted by timestamp, and
/// only if every worker succeeded.
pub fn generate(models: &[FlowModel], config: &GenerationConfig) -> Result<PacketTable> {
    if !(config.duration.is_finite() && config.duration > 0.) {
        return Err(Error::Configuration(format!(
            "Duration must be positive (got {})",
            config.duration
        )));
    }
    if models.is_empty() {
        return Err(Error::InputValidation(
            "The model document contains no sub-flow".to_string(),
        ));
    }
    let mut master_rng = match config.seed {
        Some(s) => {
            log::info!("Generating with seed {s}");
            Pcg32::seed_from_u64(s)
        }
        None => Pcg32::from_os_rng(),
    };
    log::trace!("Starting {} generation workers", models.len());

    let (tx, rx) = bounded::<Vec<Packet>>(models.len());
    let outcomes: Vec<(Label, thread::Result<Result<()>>)> = thread::scope(|scope| {
        let mut workers = vec![];
        for model in models {
            let seeded = SeededData {
                seed: master_rng.next_u64(),
                data: model,
            };
            let tx = tx.clone();
            let builder = thread::Builder::new().name(format!("Generator-{}", model.label));
            let handle = builder.spawn_scoped(scope, move || run_worker(seeded, config, &tx));
            workers.push((model.label.clone(), handle));
        }
        workers
            .into_iter()
            .map(|(label, handle)| match handle {
                Ok(h) => (label, h.join()),
                Err(e) => (label, Ok(Err(Error::Io(e)))),
            })
            .collect()
    });
    drop(tx);

    // all the workers are joined: report the first failure, if any
    for (label, outcome) in outcomes {
        match outcome {
            Ok(Ok(())) => (),
            Ok(Err(e)) => {
                log::error!("Generation of sub-flow {label} failed");
                return Err(e);
            }
            Err(_) => return Err(Error::Worker(label.to_string())),
        }
    }

    let mut table = PacketTable::new(rx.try_iter().flatten().collect());
    table.sort();
    log::info!(
        "{} packets generated over {} s",
        table.len(),
        config.duration
    );
    Ok(table)
}
