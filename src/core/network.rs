//! The network: an arena of neurons addressed by index.
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::core::config::SimulationConfig;
use crate::core::neuron::{MembraneParams, NeuronRole, NeuronUnit, SpikeEmission};
use crate::core::MIN_NEURONS_PAR;
use crate::error::SNNError;

/// A fixed population of neurons: the first `num_excitatory` neurons are excitatory, the others inhibitory.
/// Connections are stored as indices into the population, on their source neuron.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Network {
    neurons: Vec<NeuronUnit>,
    num_excitatory: usize,
    params: MembraneParams,
}

impl Network {
    /// Create an unconnected network of neurons at rest.
    pub fn new(num_excitatory: usize, num_inhibitory: usize, params: MembraneParams) -> Self {
        let neurons = (0..num_excitatory + num_inhibitory)
            .map(|neuron_id| {
                let role = if neuron_id < num_excitatory {
                    NeuronRole::Excitatory
                } else {
                    NeuronRole::Inhibitory
                };
                NeuronUnit::new(role, params.delay_steps)
            })
            .collect();

        Network {
            neurons,
            num_excitatory,
            params,
        }
    }

    /// Create an unconnected network from a configuration, which is validated first.
    pub fn from_config(config: &SimulationConfig) -> Result<Self, SNNError> {
        config.validate()?;
        let mut network = Network::new(
            config.num_excitatory(),
            config.num_inhibitory(),
            config.membrane_params(),
        );
        network.set_external_input_all(config.external_input);
        log::info!(
            "Network initialized: {} excitatory and {} inhibitory neurons",
            network.num_excitatory(),
            network.num_inhibitory()
        );
        Ok(network)
    }

    /// Returns the parameters of the membrane equation.
    pub fn params(&self) -> &MembraneParams {
        &self.params
    }

    /// Returns the number of neurons in the network.
    pub fn num_neurons(&self) -> usize {
        self.neurons.len()
    }

    pub fn num_excitatory(&self) -> usize {
        self.num_excitatory
    }

    pub fn num_inhibitory(&self) -> usize {
        self.neurons.len() - self.num_excitatory
    }

    /// Returns the number of connections in the network.
    pub fn num_connections(&self) -> usize {
        self.neurons.iter().map(|neuron| neuron.targets().len()).sum()
    }

    /// Returns the total number of spikes emitted so far.
    pub fn num_spikes(&self) -> u64 {
        self.neurons.iter().map(|neuron| neuron.num_spikes()).sum()
    }

    /// A reference to a specific neuron in the network.
    /// Returns `None` if the neuron is not found.
    pub fn neuron_ref(&self, neuron_id: usize) -> Option<&NeuronUnit> {
        self.neurons.get(neuron_id)
    }

    /// An iterator over the neurons in the network, in index order.
    pub fn neurons_iter(&self) -> impl Iterator<Item = &NeuronUnit> + '_ {
        self.neurons.iter()
    }

    /// Set the constant input of a specific neuron.
    pub fn set_external_input(&mut self, neuron_id: usize, external_input: f64) -> Result<(), SNNError> {
        let num_neurons = self.num_neurons();
        self.neurons
            .get_mut(neuron_id)
            .ok_or_else(|| {
                SNNError::OutOfBounds(format!("Neuron {} not in a network of {}", neuron_id, num_neurons))
            })?
            .set_external_input(external_input);
        Ok(())
    }

    /// Set the constant input of every neuron.
    pub fn set_external_input_all(&mut self, external_input: f64) {
        self.neurons
            .iter_mut()
            .for_each(|neuron| neuron.set_external_input(external_input));
    }

    /// Add a connection from the source to the target neuron.
    /// The target records an input of the source's role.
    pub fn connect(&mut self, source_id: usize, target_id: usize) -> Result<(), SNNError> {
        if source_id >= self.num_neurons() {
            return Err(SNNError::OutOfBounds(format!(
                "Source neuron {} not in a network of {}",
                source_id,
                self.num_neurons()
            )));
        }
        if target_id >= self.num_neurons() {
            return Err(SNNError::OutOfBounds(format!(
                "Target neuron {} not in a network of {}",
                target_id,
                self.num_neurons()
            )));
        }

        let source_role = self.neurons[source_id].role();
        self.neurons[source_id].add_target(target_id);
        self.neurons[target_id].record_input(source_role);
        Ok(())
    }

    /// Update a single neuron and, if it spikes, write its amplitude into its targets' delay buffers.
    /// Returns true if the neuron spiked.
    pub fn update_neuron(
        &mut self,
        neuron_id: usize,
        step_increment: u64,
        noise: f64,
        g: f64,
    ) -> Result<bool, SNNError> {
        let params = self.params;
        let num_neurons = self.num_neurons();
        let neuron = self.neurons.get_mut(neuron_id).ok_or_else(|| {
            SNNError::OutOfBounds(format!("Neuron {} not in a network of {}", neuron_id, num_neurons))
        })?;

        match neuron.update(step_increment, noise, g, &params) {
            Some(emission) => {
                self.deliver(neuron_id, emission);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Advance every neuron by one step, with one noise value per neuron.
    /// Returns the indices of the neurons which spiked, in increasing order.
    ///
    /// Large networks are updated in parallel, see [`Network::step_parallel`].
    pub fn step(&mut self, step_increment: u64, noise: &[f64], g: f64) -> Result<Vec<usize>, SNNError> {
        if self.num_neurons() >= MIN_NEURONS_PAR {
            self.step_parallel(step_increment, noise, g)
        } else {
            self.step_sequential(step_increment, noise, g)
        }
    }

    /// Advance every neuron by one step, one after the other in index order.
    pub fn step_sequential(
        &mut self,
        step_increment: u64,
        noise: &[f64],
        g: f64,
    ) -> Result<Vec<usize>, SNNError> {
        self.check_noise(noise)?;

        let mut spiking = vec![];
        for (neuron_id, &noise) in noise.iter().enumerate() {
            if self.update_neuron(neuron_id, step_increment, noise, g)? {
                spiking.push(neuron_id);
            }
        }
        Ok(spiking)
    }

    /// Advance every neuron by one step, updating the neurons in parallel and delivering the spikes afterwards.
    ///
    /// A spike emitted at clock `t` lands in the slot read at `t + D`, never in the slot read at `t`.
    /// Deferring the deliveries after all updates is therefore equivalent to the sequential order.
    pub fn step_parallel(
        &mut self,
        step_increment: u64,
        noise: &[f64],
        g: f64,
    ) -> Result<Vec<usize>, SNNError> {
        self.check_noise(noise)?;

        let params = self.params;
        let emissions: Vec<Option<SpikeEmission>> = self
            .neurons
            .par_iter_mut()
            .zip(noise.par_iter())
            .map(|(neuron, &noise)| neuron.update(step_increment, noise, g, &params))
            .collect();

        let mut spiking = vec![];
        for (neuron_id, emission) in emissions.into_iter().enumerate() {
            if let Some(emission) = emission {
                self.deliver(neuron_id, emission);
                spiking.push(neuron_id);
            }
        }
        Ok(spiking)
    }

    fn check_noise(&self, noise: &[f64]) -> Result<(), SNNError> {
        if noise.len() != self.num_neurons() {
            return Err(SNNError::InvalidParameters(format!(
                "Expected {} noise values, got {}",
                self.num_neurons(),
                noise.len()
            )));
        }
        Ok(())
    }

    /// Add the emission of a neuron to the delay buffer of each of its targets.
    fn deliver(&mut self, source_id: usize, emission: SpikeEmission) {
        for k in 0..self.neurons[source_id].targets().len() {
            let target_id = self.neurons[source_id].targets()[k];
            self.neurons[target_id]
                .buffer_mut()
                .deposit(emission.slot, emission.amplitude);
        }
    }

    /// Save the network to a file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), SNNError> {
        let file = File::create(path).map_err(|e| SNNError::IOError(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self).map_err(|e| SNNError::IOError(e.to_string()))?;
        writer.flush().map_err(|e| SNNError::IOError(e.to_string()))
    }

    /// Load a network from a file.
    /// The file is rejected if its neurons are not a consistent population, see [`Network::check_consistency`].
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, SNNError> {
        let file = File::open(path).map_err(|e| SNNError::IOError(e.to_string()))?;
        let reader = BufReader::new(file);
        let network: Network =
            serde_json::from_reader(reader).map_err(|e| SNNError::IOError(e.to_string()))?;
        network.check_consistency()?;
        Ok(network)
    }

    /// Check that the network can be simulated: the excitatory block fits in the population, every neuron
    /// has the role of its block, every target is a neuron of the network, and every delay buffer has
    /// `D + 1` slots for a delay `D` of at least one step.
    pub fn check_consistency(&self) -> Result<(), SNNError> {
        let num_neurons = self.num_neurons();
        if self.num_excitatory > num_neurons {
            return Err(SNNError::InvalidParameters(format!(
                "{} excitatory neurons in a network of {}",
                self.num_excitatory, num_neurons
            )));
        }
        if self.params.delay_steps == 0 {
            return Err(SNNError::InvalidParameters(
                "The delay must be at least one step".to_string(),
            ));
        }

        for (neuron_id, neuron) in self.neurons.iter().enumerate() {
            if neuron.role().is_excitatory() != (neuron_id < self.num_excitatory) {
                return Err(SNNError::InvalidParameters(format!(
                    "Neuron {} is {:?} but lies in the {} block",
                    neuron_id,
                    neuron.role(),
                    if neuron_id < self.num_excitatory {
                        "excitatory"
                    } else {
                        "inhibitory"
                    }
                )));
            }
            if let Some(&target_id) = neuron.targets().iter().find(|&&target_id| target_id >= num_neurons) {
                return Err(SNNError::InvalidParameters(format!(
                    "Neuron {} targets neuron {}, not in a network of {}",
                    neuron_id, target_id, num_neurons
                )));
            }
            if neuron.buffer().len() != self.params.delay_steps + 1 {
                return Err(SNNError::InvalidParameters(format!(
                    "Neuron {} has a delay buffer of {} slots, expected {}",
                    neuron_id,
                    neuron.buffer().len(),
                    self.params.delay_steps + 1
                )));
            }
        }
        Ok(())
    }
}
