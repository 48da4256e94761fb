//! Core module defining the components of the Brunel network.
//!
//! It consists of the following components:
//!
//! - [`random`]: The random source shared by connectivity sampling and external noise
//! - [`neuron`]: The leaky integrate-and-fire neuron and its delay line
//! - [`connectivity`]: The random connectivity with fixed in-degrees
//! - [`network`]: The population of neurons and its per-step update
//! - [`config`]: The constants of a simulation run
//!
//! # Examples
//!
//! ```
//! use brunel_snn::core::connectivity::ConnectivityBuilder;
//! use brunel_snn::core::network::Network;
//! use brunel_snn::core::neuron::MembraneParams;
//! use brunel_snn::core::random::RandomSource;
//!
//! // Create a network of 80 excitatory and 20 inhibitory neurons
//! let mut network = Network::new(80, 20, MembraneParams::default());
//!
//! // Each neuron receives 8 excitatory and 2 inhibitory connections
//! let mut random = RandomSource::new(Some(42));
//! ConnectivityBuilder::new(8, 2).build(&mut network, &mut random).unwrap();
//!
//! assert_eq!(network.num_connections(), 100 * 10);
//! assert!(network.neurons_iter().all(|neuron| neuron.num_excitatory_inputs() == 8));
//! ```
pub mod config;
pub mod connectivity;
pub mod network;
pub mod neuron;
pub mod random;

/// Minimum number of neurons to update a network in parallel.
pub const MIN_NEURONS_PAR: usize = 1000;
