//! This module contains the simulation driver of the Brunel network.
use itertools::{Itertools, MinMaxResult};
use serde::Serialize;

use crate::core::config::SimulationConfig;
use crate::core::connectivity::ConnectivityBuilder;
use crate::core::network::Network;
use crate::core::neuron::NeuronUnit;
use crate::core::random::RandomSource;
use crate::error::SNNError;

use super::reporter::{Reporter, SpikeEvent};

/// The stream of the random source reserved for the external noise.
const NOISE_STREAM: u64 = 1;

/// Statistics of a simulation run.
#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct RunSummary {
    /// The number of steps simulated.
    pub num_steps: u64,
    /// The simulated duration (ms).
    pub duration: f64,
    /// The total number of spikes.
    pub num_spikes: u64,
    /// The mean firing rate of a neuron (Hz).
    pub mean_rate: f64,
    /// The smallest and largest number of spikes of a single neuron.
    pub spike_count_range: (u64, u64),
}

/// Drives a network in fixed time steps, with external Poisson noise, until the stop time.
#[derive(Debug)]
pub struct Simulation {
    config: SimulationConfig,
    network: Network,
    /// Draws the connectivity.
    random: RandomSource,
    /// Draws the external noise, on its own stream so that reusing a saved network replays the same noise.
    noise_source: RandomSource,
    /// The number of steps simulated so far.
    step: u64,
    noise: Vec<f64>,
}

impl Simulation {
    /// Create a simulation of an unconnected network from a configuration.
    /// The configuration is validated before any neuron is created.
    pub fn build(config: SimulationConfig) -> Result<Self, SNNError> {
        let network = Network::from_config(&config)?;
        Self::from_network(config, network)
    }

    /// Create a simulation of an existing network, e.g., loaded from a file.
    /// The network must match the population and membrane parameters of the configuration.
    pub fn from_network(config: SimulationConfig, network: Network) -> Result<Self, SNNError> {
        config.validate()?;
        if network.num_neurons() != config.population_size
            || network.num_excitatory() != config.num_excitatory()
        {
            return Err(SNNError::InvalidParameters(format!(
                "The network ({} excitatory, {} inhibitory) does not match the configured population ({} excitatory, {} inhibitory)",
                network.num_excitatory(),
                network.num_inhibitory(),
                config.num_excitatory(),
                config.num_inhibitory()
            )));
        }
        if *network.params() != config.membrane_params() {
            return Err(SNNError::InvalidParameters(
                "The network membrane parameters do not match the configuration".to_string(),
            ));
        }

        let random = RandomSource::new(config.seed);
        log::info!("Random source seeded with {}", random.seed());
        let noise_source = random.fork(NOISE_STREAM);

        let noise = vec![0.0; network.num_neurons()];
        Ok(Simulation {
            config,
            network,
            random,
            noise_source,
            step: 0,
            noise,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    /// A mutable reference to the network, e.g., to wire connections by hand or set individual inputs.
    pub fn network_mut(&mut self) -> &mut Network {
        &mut self.network
    }

    pub fn random_mut(&mut self) -> &mut RandomSource {
        &mut self.random
    }

    /// Returns the number of steps simulated so far.
    pub fn current_step(&self) -> u64 {
        self.step
    }

    /// Returns the elapsed simulated time (ms).
    pub fn time(&self) -> f64 {
        self.step as f64 * self.config.step_size
    }

    /// Draw the configured random connections. Must be called once, before running.
    pub fn connect_randomly(&mut self) -> Result<(), SNNError> {
        ConnectivityBuilder::new(
            self.config.excitatory_in_degree,
            self.config.inhibitory_in_degree,
        )
        .build(&mut self.network, &mut self.random)
    }

    /// Simulate one step: draw the noise of every neuron in index order, update the whole network,
    /// then report the spikes in index order. Returns the number of spikes of the step.
    pub fn step<R: Reporter + ?Sized>(&mut self, reporter: &mut R) -> Result<usize, SNNError> {
        let params = *self.network.params();
        for noise in self.noise.iter_mut() {
            *noise = NeuronUnit::generate_noise(self.config.noise_rate, &mut self.noise_source, &params)?;
        }

        let spiking = self
            .network
            .step(1, &self.noise, self.config.amplitude_ratio_g)?;

        for &neuron_id in spiking.iter() {
            if let Some(time) = self
                .network
                .neuron_ref(neuron_id)
                .and_then(|neuron| neuron.last_spike_time(params.step_size))
            {
                reporter.on_spike(&SpikeEvent { time, neuron_id })?;
            }
        }

        self.step += 1;
        reporter.on_step(self.time(), &self.network)?;
        Ok(spiking.len())
    }

    /// Run the simulation until the stop time.
    pub fn run<R: Reporter + ?Sized>(&mut self, reporter: &mut R) -> Result<RunSummary, SNNError> {
        let num_steps = self.config.num_steps();
        log::info!(
            "Starting simulation of {} neurons for {} steps...",
            self.network.num_neurons(),
            num_steps.saturating_sub(self.step)
        );

        let log_interval = (num_steps / 10).max(1);
        while self.step < num_steps {
            self.step(reporter)?;

            if self.step % log_interval == 0 {
                log::debug!(
                    "Simulation progress: {:.0}% (Time: {:.1}/{:.1}, {} spikes)",
                    100.0 * self.step as f64 / num_steps as f64,
                    self.time(),
                    self.config.stop_time,
                    self.network.num_spikes()
                );
            }
        }
        reporter.finish()?;

        let summary = self.summary();
        log::info!(
            "Simulation completed: {} spikes, mean rate {:.2} Hz",
            summary.num_spikes,
            summary.mean_rate
        );
        Ok(summary)
    }

    /// Returns the statistics of the run so far.
    pub fn summary(&self) -> RunSummary {
        let duration = self.time();
        let num_spikes = self.network.num_spikes();
        let mean_rate = if duration > 0.0 {
            num_spikes as f64 / self.network.num_neurons() as f64 / (duration / 1000.0)
        } else {
            0.0
        };
        let spike_count_range = match self
            .network
            .neurons_iter()
            .map(|neuron| neuron.num_spikes())
            .minmax()
        {
            MinMaxResult::NoElements => (0, 0),
            MinMaxResult::OneElement(count) => (count, count),
            MinMaxResult::MinMax(min, max) => (min, max),
        };

        RunSummary {
            num_steps: self.step,
            duration,
            num_spikes,
            mean_rate,
            spike_count_range,
        }
    }
}
