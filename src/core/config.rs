//! Configuration of a Brunel network simulation.
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use crate::core::neuron::MembraneParams;
use crate::error::SNNError;

/// The four reference regimes of the Brunel model, given by the relative strength of inhibition `g`
/// and the external noise rate.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Regime {
    /// Synchronous regular firing.
    A,
    /// Asynchronous irregular firing, fast oscillations.
    B,
    /// Asynchronous irregular firing.
    C,
    /// Synchronous irregular firing, slow oscillations.
    D,
}

impl Regime {
    /// Returns the pair `(g, noise_rate)` of the regime.
    pub fn parameters(&self) -> (f64, f64) {
        match self {
            Regime::A => (3.0, 2.0),
            Regime::B => (6.0, 4.0),
            Regime::C => (5.0, 2.0),
            Regime::D => (4.5, 0.9),
        }
    }
}

impl FromStr for Regime {
    type Err = SNNError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Ok(Regime::A),
            "B" => Ok(Regime::B),
            "C" => Ok(Regime::C),
            "D" => Ok(Regime::D),
            _ => Err(SNNError::InvalidParameters(format!(
                "Unknown regime {}: must be one of A, B, C, D",
                s
            ))),
        }
    }
}

/// The constants of a simulation run. Times are in milliseconds, potentials in millivolts.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimulationConfig {
    /// Duration of a time step.
    pub step_size: f64,
    /// Time at which the simulation stops.
    pub stop_time: f64,
    /// Membrane time constant.
    pub tau: f64,
    /// Duration of the refractory period.
    pub tau_refractory: f64,
    /// Firing threshold.
    pub threshold: f64,
    /// Potential held during the refractory period.
    pub reset_potential: f64,
    /// Total number of neurons.
    pub population_size: usize,
    /// Fraction of excitatory neurons in the population.
    pub excitatory_fraction: f64,
    /// Number of excitatory connections received by every neuron.
    pub excitatory_in_degree: usize,
    /// Number of inhibitory connections received by every neuron.
    pub inhibitory_in_degree: usize,
    /// Amplitude `J_e` of an excitatory spike.
    pub synaptic_amplitude: f64,
    /// Transmission delay, in steps.
    pub delay_steps: usize,
    /// Mean number of external spikes received by a neuron during one step.
    pub noise_rate: f64,
    /// Ratio `g` between inhibitory and excitatory amplitudes.
    pub amplitude_ratio_g: f64,
    /// Membrane resistance.
    pub membrane_resistance: f64,
    /// Constant input received by every neuron.
    pub external_input: f64,
    /// Seed of the random source; drawn from entropy when absent.
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            step_size: 0.1,
            stop_time: 1200.0,
            tau: 20.0,
            tau_refractory: 2.0,
            threshold: 20.0,
            reset_potential: 0.0,
            population_size: 12_500,
            excitatory_fraction: 0.8,
            excitatory_in_degree: 1000,
            inhibitory_in_degree: 250,
            synaptic_amplitude: 0.1,
            delay_steps: 15,
            noise_rate: 2.0,
            amplitude_ratio_g: 5.0,
            membrane_resistance: 20.0,
            external_input: 0.0,
            seed: None,
        }
    }
}

impl SimulationConfig {
    /// A single excitatory neuron driven by a constant input, without connections nor noise.
    pub fn single_neuron(external_input: f64) -> Self {
        SimulationConfig {
            population_size: 1,
            excitatory_fraction: 1.0,
            excitatory_in_degree: 0,
            inhibitory_in_degree: 0,
            noise_rate: 0.0,
            external_input,
            ..Default::default()
        }
    }

    /// Two excitatory neurons without random connections nor noise; the caller wires them.
    pub fn neuron_pair() -> Self {
        SimulationConfig {
            population_size: 2,
            excitatory_fraction: 1.0,
            excitatory_in_degree: 0,
            inhibitory_in_degree: 0,
            noise_rate: 0.0,
            ..Default::default()
        }
    }

    /// Set `g` and the noise rate to those of a reference regime.
    pub fn with_regime(mut self, regime: Regime) -> Self {
        let (g, noise_rate) = regime.parameters();
        self.amplitude_ratio_g = g;
        self.noise_rate = noise_rate;
        self
    }

    /// Returns the number of excitatory neurons (the first block of the population).
    pub fn num_excitatory(&self) -> usize {
        let num_excitatory = (self.population_size as f64 * self.excitatory_fraction).round() as usize;
        num_excitatory.min(self.population_size)
    }

    /// Returns the number of inhibitory neurons (the remainder of the population).
    pub fn num_inhibitory(&self) -> usize {
        self.population_size - self.num_excitatory()
    }

    /// Returns the number of steps of a run.
    pub fn num_steps(&self) -> u64 {
        (self.stop_time / self.step_size).round() as u64
    }

    /// Returns the duration of the refractory period, in steps.
    pub fn refractory_steps(&self) -> u64 {
        (self.tau_refractory / self.step_size).round() as u64
    }

    /// Returns the parameters of the membrane equation.
    pub fn membrane_params(&self) -> MembraneParams {
        MembraneParams::new(
            self.step_size,
            self.tau,
            self.membrane_resistance,
            self.threshold,
            self.reset_potential,
            self.refractory_steps(),
            self.delay_steps,
            self.synaptic_amplitude,
        )
    }

    /// Check the configuration before any neuron is built.
    pub fn validate(&self) -> Result<(), SNNError> {
        if !(self.step_size.is_finite() && self.step_size > 0.0) {
            return Err(SNNError::InvalidParameters(
                "The step size must be positive and finite".to_string(),
            ));
        }
        if !(self.stop_time.is_finite() && self.stop_time >= 0.0) {
            return Err(SNNError::InvalidParameters(
                "The stop time must be non-negative and finite".to_string(),
            ));
        }
        if !(self.tau.is_finite() && self.tau > 0.0) {
            return Err(SNNError::InvalidParameters(
                "The membrane time constant must be positive and finite".to_string(),
            ));
        }
        if !(self.tau_refractory.is_finite() && self.tau_refractory >= 0.0) {
            return Err(SNNError::InvalidParameters(
                "The refractory period must be non-negative and finite".to_string(),
            ));
        }
        if !(self.reset_potential < self.threshold) {
            return Err(SNNError::InvalidParameters(
                "The reset potential must be below the firing threshold".to_string(),
            ));
        }
        if self.population_size == 0 {
            return Err(SNNError::InvalidParameters(
                "The population must contain at least one neuron".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.excitatory_fraction) {
            return Err(SNNError::InvalidParameters(
                "The excitatory fraction must lie in [0, 1]".to_string(),
            ));
        }
        if self.excitatory_in_degree > self.num_excitatory() {
            return Err(SNNError::InvalidParameters(format!(
                "The excitatory in-degree {} exceeds the number of excitatory neurons {}",
                self.excitatory_in_degree,
                self.num_excitatory()
            )));
        }
        if self.inhibitory_in_degree > self.num_inhibitory() {
            return Err(SNNError::InvalidParameters(format!(
                "The inhibitory in-degree {} exceeds the number of inhibitory neurons {}",
                self.inhibitory_in_degree,
                self.num_inhibitory()
            )));
        }
        if self.delay_steps == 0 {
            return Err(SNNError::InvalidParameters(
                "The delay must be at least one step".to_string(),
            ));
        }
        if !(self.noise_rate.is_finite() && self.noise_rate >= 0.0) {
            return Err(SNNError::InvalidParameters(
                "The noise rate must be non-negative and finite".to_string(),
            ));
        }
        if !(self.amplitude_ratio_g.is_finite() && self.amplitude_ratio_g >= 0.0) {
            return Err(SNNError::InvalidParameters(
                "The amplitude ratio g must be non-negative and finite".to_string(),
            ));
        }
        if !(self.synaptic_amplitude.is_finite() && self.membrane_resistance.is_finite()) {
            return Err(SNNError::InvalidParameters(
                "The synaptic amplitude and membrane resistance must be finite".to_string(),
            ));
        }
        Ok(())
    }

    /// Load a configuration from a JSON file. Missing fields take their default value.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, SNNError> {
        let file = File::open(path).map_err(|e| SNNError::IOError(e.to_string()))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| SNNError::IOError(e.to_string()))
    }

    /// Save the configuration to a JSON file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), SNNError> {
        let file = File::create(path).map_err(|e| SNNError::IOError(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| SNNError::IOError(e.to_string()))?;
        writer.flush().map_err(|e| SNNError::IOError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_config() {
        let config = SimulationConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.num_excitatory(), 10_000);
        assert_eq!(config.num_inhibitory(), 2_500);
        assert_eq!(config.num_steps(), 12_000);
        assert_eq!(config.refractory_steps(), 20);

        let params = config.membrane_params();
        assert_relative_eq!(params.decay, (-0.005_f64).exp());
        assert_relative_eq!(params.input_gain, 20.0 * (1.0 - (-0.005_f64).exp()));
        assert_eq!(params, MembraneParams::default());
    }

    #[test]
    fn test_demonstration_configs() {
        let config = SimulationConfig::single_neuron(1.01);
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.num_excitatory(), 1);
        assert_eq!(config.num_inhibitory(), 0);

        let config = SimulationConfig::neuron_pair();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.num_excitatory(), 2);
    }

    #[test]
    fn test_regimes() {
        let config = SimulationConfig::default().with_regime(Regime::D);
        assert_eq!(config.amplitude_ratio_g, 4.5);
        assert_eq!(config.noise_rate, 0.9);
        assert_eq!("b".parse::<Regime>(), Ok(Regime::B));
        assert!("E".parse::<Regime>().is_err());
    }

    #[test]
    fn test_invalid_configs() {
        let invalid = [
            SimulationConfig {
                step_size: 0.0,
                ..Default::default()
            },
            SimulationConfig {
                tau: -1.0,
                ..Default::default()
            },
            SimulationConfig {
                population_size: 0,
                ..Default::default()
            },
            SimulationConfig {
                excitatory_fraction: 1.5,
                ..Default::default()
            },
            SimulationConfig {
                excitatory_in_degree: 10_001,
                ..Default::default()
            },
            SimulationConfig {
                population_size: 100,
                ..Default::default()
            },
            SimulationConfig {
                delay_steps: 0,
                ..Default::default()
            },
            SimulationConfig {
                noise_rate: -2.0,
                ..Default::default()
            },
            SimulationConfig {
                reset_potential: 25.0,
                ..Default::default()
            },
            SimulationConfig {
                stop_time: f64::NAN,
                ..Default::default()
            },
        ];
        for config in invalid.iter() {
            assert!(
                matches!(config.validate(), Err(SNNError::InvalidParameters(_))),
                "{:?} should be rejected",
                config
            );
        }
    }

    #[test]
    fn test_json_fields() {
        let config: SimulationConfig = serde_json::from_str(
            r#"{"populationSize": 1250, "excitatoryInDegree": 100, "inhibitoryInDegree": 25, "amplitudeRatioG": 6.0, "seed": 3}"#,
        )
        .unwrap();
        assert_eq!(config.population_size, 1250);
        assert_eq!(config.num_excitatory(), 1000);
        assert_eq!(config.amplitude_ratio_g, 6.0);
        assert_eq!(config.seed, Some(3));
        assert_eq!(config.step_size, 0.1);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = SimulationConfig::default().with_regime(Regime::A);
        config.save_to(&path).unwrap();
        assert_eq!(SimulationConfig::load_from(&path).unwrap(), config);
        assert!(matches!(
            SimulationConfig::load_from(dir.path().join("missing.json")),
            Err(SNNError::IOError(_))
        ));
    }
}
