//! Simulation framework for the Brunel network.
//!
//! This module provides two main components:
//! - `simulator`: Drives the network step by step until the stop time.
//! - `reporter`: Persists what happens during a run (spike events, membrane traces).
//!
//! # Example
//! ```rust
//! use brunel_snn::core::config::SimulationConfig;
//! use brunel_snn::simulator::reporter::SpikeRecorder;
//! use brunel_snn::simulator::simulator::Simulation;
//!
//! // A single neuron driven by a constant input of 1.01 during 100 ms
//! let config = SimulationConfig {
//!     stop_time: 100.0,
//!     ..SimulationConfig::single_neuron(1.01)
//! };
//! let mut simulation = Simulation::build(config).unwrap();
//! let mut recorder = SpikeRecorder::new();
//! let summary = simulation.run(&mut recorder).unwrap();
//!
//! assert_eq!(summary.num_spikes, 1);
//! assert_eq!(recorder.events()[0].neuron_id, 0);
//! ```

pub mod reporter;
pub mod simulator;
