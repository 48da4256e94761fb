use clap::{Parser, Subcommand};
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::{Path, PathBuf};
use std::process::Command;

use brunel_snn::core::config::{Regime, SimulationConfig};
use brunel_snn::core::network::Network;
use brunel_snn::error::SNNError;
use brunel_snn::simulator::reporter::{
    time_precision, MembraneTraceWriter, Reporter, SpikeArrivalLogger, SpikeEvent, SpikeEventWriter,
};
use brunel_snn::simulator::simulator::Simulation;

#[derive(Parser, Debug)]
#[command(name = "brunel", about = "Simulate the Brunel network of leaky integrate-and-fire neurons")]
struct Args {
    /// Also write the log to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    /// Log the simulation progress
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    scenario: Scenario,
}

#[derive(Subcommand, Debug)]
enum Scenario {
    /// A single neuron driven by a constant input, with its membrane potential traced at every step
    Single {
        /// The constant input of the neuron
        #[arg(long)]
        input: f64,
        /// The stop time (ms)
        #[arg(long, default_value = "1200.0")]
        stop_time: f64,
        /// The membrane trace file
        #[arg(long, default_value = "membrane_trace.txt")]
        output: PathBuf,
    },
    /// A neuron driven by a constant input and connected to a second, silent one
    Pair {
        /// The constant input of the first neuron
        #[arg(long)]
        input: f64,
        /// The stop time (ms)
        #[arg(long, default_value = "1200.0")]
        stop_time: f64,
    },
    /// The full network driven by external Poisson noise
    Network {
        /// A JSON configuration file; missing fields take their default value
        #[arg(long)]
        config: Option<PathBuf>,
        /// One of the reference regimes A, B, C, D (sets g and the noise rate)
        #[arg(long)]
        regime: Option<Regime>,
        /// The relative strength of inhibition
        #[arg(short, long)]
        g: Option<f64>,
        /// The mean number of external spikes per neuron and step
        #[arg(long)]
        noise_rate: Option<f64>,
        /// The seed of the random source
        #[arg(long)]
        seed: Option<u64>,
        /// Reuse the connectivity of a previously saved network
        #[arg(long)]
        load_network: Option<PathBuf>,
        /// Save the network right after its connections are drawn
        #[arg(long)]
        save_network: Option<PathBuf>,
        /// The spike event log
        #[arg(long, default_value = "Spike_time.txt")]
        output: PathBuf,
        /// A plotting script launched on the event log at the end of the run
        #[arg(long)]
        plot: Option<PathBuf>,
    },
}

/// Logs every spike.
struct SpikeLogger;

impl Reporter for SpikeLogger {
    fn on_spike(&mut self, event: &SpikeEvent) -> Result<(), SNNError> {
        log::info!("Neuron {} spiked at {:.1} ms", event.neuron_id, event.time);
        Ok(())
    }
}

fn init_logging(log_file: Option<&Path>, verbose: bool) -> Result<(), SNNError> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let console = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d(%H:%M:%S)} {l} - {m}\n")))
        .build();
    let mut builder =
        Config::builder().appender(Appender::builder().build("console", Box::new(console)));
    let mut root = Root::builder().appender("console");

    if let Some(path) = log_file {
        let logfile = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new("{l} - {m}\n")))
            .build(path)
            .map_err(|e| SNNError::IOError(e.to_string()))?;
        builder = builder.appender(Appender::builder().build("logfile", Box::new(logfile)));
        root = root.appender("logfile");
    }

    let config = builder
        .build(root.build(level))
        .map_err(|e| SNNError::IOError(e.to_string()))?;
    log4rs::init_config(config).map_err(|e| SNNError::IOError(e.to_string()))?;
    Ok(())
}

/// Launch the plotting script without waiting for it.
fn launch_plot(script: &Path, event_log: &Path) {
    match Command::new("python3").arg(script).arg(event_log).spawn() {
        Ok(child) => log::info!("Plotting started (pid {})", child.id()),
        Err(e) => log::warn!("Could not launch {}: {}", script.display(), e),
    }
}

fn run_single(input: f64, stop_time: f64, output: &Path) -> Result<(), SNNError> {
    let config = SimulationConfig {
        stop_time,
        ..SimulationConfig::single_neuron(input)
    };
    let precision = time_precision(config.step_size).max(4);
    let mut simulation = Simulation::build(config)?;
    let mut reporter = (
        SpikeLogger,
        MembraneTraceWriter::create(output, 0)?.with_precision(precision),
    );
    simulation.run(&mut reporter)?;
    log::info!("Membrane potential written to {}", output.display());
    Ok(())
}

fn run_pair(input: f64, stop_time: f64) -> Result<(), SNNError> {
    let config = SimulationConfig {
        stop_time,
        ..SimulationConfig::neuron_pair()
    };
    let mut simulation = Simulation::build(config)?;
    simulation.network_mut().connect(0, 1)?;
    simulation.network_mut().set_external_input(0, input)?;
    simulation.run(&mut (SpikeLogger, SpikeArrivalLogger::new(1)))?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_network(
    config: Option<&Path>,
    regime: Option<Regime>,
    g: Option<f64>,
    noise_rate: Option<f64>,
    seed: Option<u64>,
    load_network: Option<&Path>,
    save_network: Option<&Path>,
    output: &Path,
    plot: Option<&Path>,
) -> Result<(), SNNError> {
    let mut config = match config {
        Some(path) => SimulationConfig::load_from(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(regime) = regime {
        config = config.with_regime(regime);
    }
    if let Some(g) = g {
        config.amplitude_ratio_g = g;
    }
    if let Some(noise_rate) = noise_rate {
        config.noise_rate = noise_rate;
    }
    if seed.is_some() {
        config.seed = seed;
    }
    log::info!("{:?}", config);

    let mut simulation = match load_network {
        Some(path) => {
            let network = Network::load_from(path)?;
            log::info!("Network loaded from {}", path.display());
            Simulation::from_network(config, network)?
        }
        None => {
            let mut simulation = Simulation::build(config)?;
            simulation.connect_randomly()?;
            simulation
        }
    };

    if let Some(path) = save_network {
        simulation.network().save_to(path)?;
        log::info!("Network saved to {}", path.display());
    }

    let mut writer =
        SpikeEventWriter::create(output)?.with_precision(time_precision(simulation.config().step_size));
    let summary = simulation.run(&mut writer)?;
    log::info!(
        "{} spike events written to {} (spikes per neuron between {} and {})",
        writer.num_events(),
        output.display(),
        summary.spike_count_range.0,
        summary.spike_count_range.1
    );

    if let Some(script) = plot {
        launch_plot(script, output);
    }
    Ok(())
}

fn main() -> Result<(), SNNError> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref(), args.verbose)?;

    match args.scenario {
        Scenario::Single {
            input,
            stop_time,
            output,
        } => run_single(input, stop_time, &output)?,
        Scenario::Pair { input, stop_time } => run_pair(input, stop_time)?,
        Scenario::Network {
            config,
            regime,
            g,
            noise_rate,
            seed,
            load_network,
            save_network,
            output,
            plot,
        } => run_network(
            config.as_deref(),
            regime,
            g,
            noise_rate,
            seed,
            load_network.as_deref(),
            save_network.as_deref(),
            &output,
            plot.as_deref(),
        )?,
    }

    log::info!("Simulation done");
    Ok(())
}
