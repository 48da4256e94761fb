//! Random connectivity with fixed excitatory and inhibitory in-degrees.
use std::ops::Range;

use crate::core::network::Network;
use crate::core::random::RandomSource;
use crate::error::SNNError;

/// Draws, for every neuron, a fixed number of excitatory and inhibitory sources.
///
/// Sources are drawn uniformly with replacement from their pool, so self-connections and multiple
/// connections between the same pair are possible. Each edge is stored on its source, as an outbound target.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct ConnectivityBuilder {
    /// The number of excitatory connections received by every neuron.
    excitatory_in_degree: usize,
    /// The number of inhibitory connections received by every neuron.
    inhibitory_in_degree: usize,
}

impl ConnectivityBuilder {
    pub fn new(excitatory_in_degree: usize, inhibitory_in_degree: usize) -> Self {
        ConnectivityBuilder {
            excitatory_in_degree,
            inhibitory_in_degree,
        }
    }

    pub fn excitatory_in_degree(&self) -> usize {
        self.excitatory_in_degree
    }

    pub fn inhibitory_in_degree(&self) -> usize {
        self.inhibitory_in_degree
    }

    /// Add the random connections to the network.
    /// Building twice on the same network adds a second set of connections.
    pub fn build(&self, network: &mut Network, random: &mut RandomSource) -> Result<(), SNNError> {
        let num_excitatory = network.num_excitatory();
        let num_neurons = network.num_neurons();

        let excitatory_pool =
            source_pool(0..num_excitatory, self.excitatory_in_degree, "excitatory")?;
        let inhibitory_pool = source_pool(
            num_excitatory..num_neurons,
            self.inhibitory_in_degree,
            "inhibitory",
        )?;

        log::info!(
            "Drawing {} excitatory and {} inhibitory inputs for each of {} neurons...",
            self.excitatory_in_degree,
            self.inhibitory_in_degree,
            num_neurons
        );

        for target_id in 0..num_neurons {
            if let Some(pool) = &excitatory_pool {
                for _ in 0..self.excitatory_in_degree {
                    network.connect(random.uniform_index(pool.clone()), target_id)?;
                }
            }
            if let Some(pool) = &inhibitory_pool {
                for _ in 0..self.inhibitory_in_degree {
                    network.connect(random.uniform_index(pool.clone()), target_id)?;
                }
            }
        }

        log::info!("Connections added: {} in total", network.num_connections());
        Ok(())
    }
}

/// Returns the pool of sources, if any source has to be drawn from it.
fn source_pool(
    pool: Range<usize>,
    in_degree: usize,
    role: &str,
) -> Result<Option<Range<usize>>, SNNError> {
    if in_degree == 0 {
        return Ok(None);
    }
    if pool.is_empty() {
        return Err(SNNError::InvalidParameters(format!(
            "Cannot draw {} {} inputs from an empty pool",
            in_degree, role
        )));
    }
    Ok(Some(pool))
}
