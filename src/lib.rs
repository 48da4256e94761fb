//! This crate simulates the Brunel network of leaky integrate-and-fire neurons in discrete time.
//!
//! A population of excitatory and inhibitory neurons is randomly connected with fixed in-degrees.
//! Every neuron receives external Poisson noise and possibly a constant input. Spikes reach their
//! targets after a fixed transmission delay.
//!
//! # A Single Neuron
//!
//! ```rust
//! use brunel_snn::core::config::SimulationConfig;
//! use brunel_snn::simulator::reporter::SpikeRecorder;
//! use brunel_snn::simulator::simulator::Simulation;
//!
//! let config = SimulationConfig {
//!     stop_time: 200.0,
//!     ..SimulationConfig::single_neuron(1.01)
//! };
//! let mut simulation = Simulation::build(config).unwrap();
//! let mut recorder = SpikeRecorder::new();
//! simulation.run(&mut recorder).unwrap();
//!
//! // The neuron first reaches the threshold after 92.4 ms
//! let times = recorder.firing_times(0);
//! assert_eq!(times.len(), 2);
//! assert!((times[0] - 92.4).abs() < 1e-6);
//! ```
//!
//! # A Small Random Network
//!
//! ```rust
//! use brunel_snn::core::config::SimulationConfig;
//! use brunel_snn::simulator::reporter::SpikeEventWriter;
//! use brunel_snn::simulator::simulator::Simulation;
//!
//! let config = SimulationConfig {
//!     population_size: 500,
//!     excitatory_in_degree: 40,
//!     inhibitory_in_degree: 10,
//!     stop_time: 20.0,
//!     seed: Some(42),
//!     ..Default::default()
//! };
//! let mut simulation = Simulation::build(config).unwrap();
//! simulation.connect_randomly().unwrap();
//! assert_eq!(simulation.network().num_connections(), 500 * 50);
//!
//! // Write the spike events into memory
//! let mut writer = SpikeEventWriter::new(Vec::new());
//! let summary = simulation.run(&mut writer).unwrap();
//! assert_eq!(summary.num_steps, 200);
//! assert_eq!(writer.num_events() as u64, summary.num_spikes);
//! ```
pub mod core;
pub mod error;
pub mod simulator;
