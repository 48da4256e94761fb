//! Module implementing the leaky integrate-and-fire neuron with its delay line.
use serde::{Deserialize, Serialize};

use crate::core::random::RandomSource;
use crate::error::SNNError;

/// The role of a neuron, which determines the sign and magnitude of the amplitude it emits.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum NeuronRole {
    Excitatory,
    Inhibitory,
}

impl NeuronRole {
    /// Returns the amplitude delivered to each target when a neuron with this role spikes:
    /// `j_e` for excitatory neurons and `-g * j_e` for inhibitory ones.
    pub fn amplitude(&self, j_e: f64, g: f64) -> f64 {
        match self {
            NeuronRole::Excitatory => j_e,
            NeuronRole::Inhibitory => -g * j_e,
        }
    }

    pub fn is_excitatory(&self) -> bool {
        matches!(self, NeuronRole::Excitatory)
    }
}

/// The two states of the neuron dynamics.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum NeuronState {
    /// The membrane potential follows the membrane equation.
    Integrating,
    /// The membrane potential is held at the reset potential.
    Refractory,
}

/// Parameters of the discretized membrane equation, shared by all neurons of a network.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct MembraneParams {
    /// The duration of a time step (ms).
    pub step_size: f64,
    /// The decay factor `exp(-h / tau)` of the potential over one step.
    pub decay: f64,
    /// The gain `R * (1 - decay)` applied to the external input.
    pub input_gain: f64,
    /// The firing threshold (mV).
    pub threshold: f64,
    /// The potential held during the refractory period (mV).
    pub reset_potential: f64,
    /// The duration of the refractory period, in steps.
    pub refractory_steps: u64,
    /// The transmission delay of a spike, in steps.
    pub delay_steps: usize,
    /// The amplitude `J_e` of an excitatory spike (mV).
    pub synaptic_amplitude: f64,
}

impl MembraneParams {
    /// Compute the membrane parameters from physical constants.
    /// Time constants are in the same unit as the step size.
    pub fn new(
        step_size: f64,
        tau: f64,
        resistance: f64,
        threshold: f64,
        reset_potential: f64,
        refractory_steps: u64,
        delay_steps: usize,
        synaptic_amplitude: f64,
    ) -> Self {
        let decay = (-step_size / tau).exp();
        MembraneParams {
            step_size,
            decay,
            input_gain: resistance * (1.0 - decay),
            threshold,
            reset_potential,
            refractory_steps,
            delay_steps,
            synaptic_amplitude,
        }
    }
}

impl Default for MembraneParams {
    fn default() -> Self {
        MembraneParams::new(0.1, 20.0, 20.0, 20.0, 0.0, 20, 15, 0.1)
    }
}

/// A ring of `D + 1` accumulators holding the amplitudes scheduled for future steps.
///
/// Slot `i` accumulates every amplitude to be integrated at a local clock congruent to `i` modulo `D + 1`.
/// A spike emitted at clock `t` is written to `(t + D) % (D + 1)` while the integration at `t` reads
/// `t % (D + 1)`; the two never coincide for `D > 0`.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct DelayBuffer {
    slots: Vec<f64>,
}

impl DelayBuffer {
    /// Create a zeroed delay buffer for the given delay (in steps).
    pub fn new(delay_steps: usize) -> Self {
        DelayBuffer {
            slots: vec![0.0; delay_steps + 1],
        }
    }

    /// Returns the number of slots of the buffer.
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns the delay (in steps) implemented by the buffer.
    pub fn delay(&self) -> usize {
        self.slots.len() - 1
    }

    /// Returns the slot integrated at the given clock.
    pub fn read_slot(&self, clock: u64) -> usize {
        (clock % self.slots.len() as u64) as usize
    }

    /// Returns the slot written by a spike emitted at the given clock.
    pub fn write_slot(&self, clock: u64) -> usize {
        ((clock + self.delay() as u64) % self.slots.len() as u64) as usize
    }

    /// Returns the amplitude accumulated in a slot.
    pub fn get(&self, slot: usize) -> f64 {
        self.slots[slot]
    }

    /// Add an amplitude to a slot; amplitudes from distinct sources accumulate.
    pub fn deposit(&mut self, slot: usize, amplitude: f64) {
        assert!(
            slot < self.slots.len(),
            "Delay slot {} out of range for a buffer of {} slots",
            slot,
            self.slots.len()
        );
        self.slots[slot] += amplitude;
    }

    /// Read a slot and clear it.
    pub fn take(&mut self, slot: usize) -> f64 {
        assert!(
            slot < self.slots.len(),
            "Delay slot {} out of range for a buffer of {} slots",
            slot,
            self.slots.len()
        );
        std::mem::replace(&mut self.slots[slot], 0.0)
    }
}

/// The amplitude a spiking neuron sends to its targets, and the slot of their buffers it goes to.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct SpikeEmission {
    pub slot: usize,
    pub amplitude: f64,
}

/// A leaky integrate-and-fire neuron of the Brunel network.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct NeuronUnit {
    role: NeuronRole,
    potential: f64,
    num_spikes: u64,
    /// Local clock value at the most recent spike.
    last_spike_step: Option<u64>,
    spiked: bool,
    /// Local clock, in steps.
    clock: u64,
    state: NeuronState,
    /// Constant direct-current input.
    external_input: f64,
    buffer: DelayBuffer,
    /// Indices (in the owning network) of the neurons notified on spike.
    targets: Vec<usize>,
    num_excitatory_inputs: usize,
    num_inhibitory_inputs: usize,
}

impl NeuronUnit {
    /// Create a neuron at rest, integrating, with a zeroed delay buffer.
    pub fn new(role: NeuronRole, delay_steps: usize) -> Self {
        NeuronUnit {
            role,
            potential: 0.0,
            num_spikes: 0,
            last_spike_step: None,
            spiked: false,
            clock: 0,
            state: NeuronState::Integrating,
            external_input: 0.0,
            buffer: DelayBuffer::new(delay_steps),
            targets: vec![],
            num_excitatory_inputs: 0,
            num_inhibitory_inputs: 0,
        }
    }

    pub fn role(&self) -> NeuronRole {
        self.role
    }

    /// Returns the membrane potential (mV).
    pub fn potential(&self) -> f64 {
        self.potential
    }

    /// Returns the number of spikes emitted so far.
    pub fn num_spikes(&self) -> u64 {
        self.num_spikes
    }

    /// Returns the local clock at the last spike, if any.
    pub fn last_spike_step(&self) -> Option<u64> {
        self.last_spike_step
    }

    /// Returns the time of the last spike, if any.
    pub fn last_spike_time(&self, step_size: f64) -> Option<f64> {
        self.last_spike_step.map(|step| step as f64 * step_size)
    }

    /// Returns true if the neuron spiked during its last update.
    pub fn has_spiked(&self) -> bool {
        self.spiked
    }

    /// Returns the local clock, in steps.
    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn state(&self) -> NeuronState {
        self.state
    }

    pub fn is_refractory(&self) -> bool {
        self.state == NeuronState::Refractory
    }

    pub fn external_input(&self) -> f64 {
        self.external_input
    }

    pub fn set_external_input(&mut self, external_input: f64) {
        self.external_input = external_input;
    }

    pub fn buffer(&self) -> &DelayBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut DelayBuffer {
        &mut self.buffer
    }

    /// Returns the indices of the neurons notified when this neuron spikes.
    pub fn targets(&self) -> &[usize] {
        &self.targets
    }

    /// Returns the number of excitatory connections received by the neuron.
    pub fn num_excitatory_inputs(&self) -> usize {
        self.num_excitatory_inputs
    }

    /// Returns the number of inhibitory connections received by the neuron.
    pub fn num_inhibitory_inputs(&self) -> usize {
        self.num_inhibitory_inputs
    }

    pub(crate) fn add_target(&mut self, target_id: usize) {
        self.targets.push(target_id);
    }

    pub(crate) fn record_input(&mut self, source_role: NeuronRole) {
        match source_role {
            NeuronRole::Excitatory => self.num_excitatory_inputs += 1,
            NeuronRole::Inhibitory => self.num_inhibitory_inputs += 1,
        }
    }

    /// Draw the external noise for one step: `J_e` times a Poisson sample of the given rate.
    pub fn generate_noise(
        rate: f64,
        random: &mut RandomSource,
        params: &MembraneParams,
    ) -> Result<f64, SNNError> {
        Ok(params.synaptic_amplitude * random.poisson(rate)?)
    }

    /// Advance the neuron by one step.
    ///
    /// If the potential is above threshold, the neuron spikes, enters its refractory period and returns the
    /// emission its targets must receive. While refractory, the potential is held at the reset value;
    /// otherwise it follows `V = decay * V + input_gain * I + buffered + noise`. In every case the slot read
    /// at the current clock is cleared and the clock advances by `step_increment`.
    pub fn update(
        &mut self,
        step_increment: u64,
        noise: f64,
        g: f64,
        params: &MembraneParams,
    ) -> Option<SpikeEmission> {
        self.spiked = false;

        let emission = if self.state == NeuronState::Integrating && self.potential > params.threshold {
            self.fire(params);
            Some(SpikeEmission {
                slot: self.buffer.write_slot(self.clock),
                amplitude: self.role.amplitude(params.synaptic_amplitude, g),
            })
        } else {
            None
        };

        let buffered = self.buffer.take(self.buffer.read_slot(self.clock));

        match (self.state, self.last_spike_step) {
            (NeuronState::Refractory, Some(last))
                if self.clock - last < params.refractory_steps =>
            {
                self.potential = params.reset_potential;
            }
            _ => {
                self.state = NeuronState::Integrating;
                self.potential = params.decay * self.potential
                    + params.input_gain * self.external_input
                    + buffered
                    + noise;
            }
        }

        self.clock += step_increment;
        emission
    }

    fn fire(&mut self, params: &MembraneParams) {
        self.num_spikes += 1;
        self.last_spike_step = Some(self.clock);
        self.spiked = true;
        self.state = NeuronState::Refractory;
        self.potential = params.reset_potential;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn run_until(neuron: &mut NeuronUnit, clock: u64, params: &MembraneParams) {
        while neuron.clock() < clock {
            neuron.update(1, 0.0, 5.0, params);
        }
    }

    #[test]
    fn test_role_amplitude() {
        assert_eq!(NeuronRole::Excitatory.amplitude(0.1, 5.0), 0.1);
        assert_eq!(NeuronRole::Inhibitory.amplitude(0.1, 5.0), -0.5);
    }

    #[test]
    fn test_delay_buffer_slots() {
        let mut buffer = DelayBuffer::new(15);
        assert_eq!(buffer.len(), 16);
        assert_eq!(buffer.delay(), 15);
        for clock in 0..100 {
            assert_ne!(buffer.read_slot(clock), buffer.write_slot(clock));
            assert!(buffer.write_slot(clock) < buffer.len());
            // a spike written at `clock` is read exactly D steps later
            assert_eq!(buffer.write_slot(clock), buffer.read_slot(clock + 15));
        }

        buffer.deposit(3, 0.1);
        buffer.deposit(3, -0.5);
        assert_relative_eq!(buffer.get(3), -0.4);
        assert_relative_eq!(buffer.take(3), -0.4);
        assert_eq!(buffer.get(3), 0.0);
    }

    #[test]
    #[should_panic]
    fn test_delay_buffer_out_of_range() {
        let mut buffer = DelayBuffer::new(2);
        buffer.deposit(3, 0.1);
    }

    #[test]
    fn test_positive_potential() {
        let params = MembraneParams::default();
        let mut neuron = NeuronUnit::new(NeuronRole::Excitatory, params.delay_steps);
        neuron.set_external_input(1.0);
        neuron.update(1, 0.0, 5.0, &params);
        assert_relative_eq!(neuron.potential(), 20.0 * (1.0 - (-0.1_f64 / 20.0).exp()), epsilon = 1e-12);
        assert_relative_eq!(neuron.potential(), params.input_gain, epsilon = 1e-12);
    }

    #[test]
    fn test_negative_potential() {
        let params = MembraneParams::default();
        let mut neuron = NeuronUnit::new(NeuronRole::Excitatory, params.delay_steps);
        neuron.set_external_input(-1.0);
        neuron.update(1, 0.0, 5.0, &params);
        assert_relative_eq!(neuron.potential(), -20.0 * (1.0 - (-0.1_f64 / 20.0).exp()), epsilon = 1e-12);
    }

    #[test]
    fn test_null_potential() {
        let params = MembraneParams::default();
        let mut neuron = NeuronUnit::new(NeuronRole::Excitatory, params.delay_steps);
        for _ in 0..1000 {
            neuron.update(1, 0.0, 5.0, &params);
            assert_eq!(neuron.potential(), 0.0);
        }
        assert_eq!(neuron.num_spikes(), 0);
        assert_eq!(neuron.last_spike_time(params.step_size), None);
    }

    #[test]
    fn test_spike_time() {
        let params = MembraneParams::default();
        let mut neuron = NeuronUnit::new(NeuronRole::Excitatory, params.delay_steps);
        neuron.set_external_input(1.01);

        run_until(&mut neuron, 924, &params);
        assert_eq!(neuron.num_spikes(), 0);
        assert_relative_eq!(neuron.potential(), 20.0, epsilon = 1e-3);
        assert!(neuron.potential() > params.threshold);

        let emission = neuron.update(1, 0.0, 5.0, &params);
        assert!(neuron.has_spiked());
        assert_eq!(neuron.num_spikes(), 1);
        assert_eq!(neuron.last_spike_step(), Some(924));
        assert_relative_eq!(neuron.last_spike_time(params.step_size).unwrap(), 92.4);
        assert_eq!(neuron.potential(), 0.0);
        assert!(neuron.is_refractory());
        assert_eq!(
            emission,
            Some(SpikeEmission {
                slot: (924 + 15) % 16,
                amplitude: 0.1
            })
        );

        // the flag only reflects the last update
        neuron.update(1, 0.0, 5.0, &params);
        assert!(!neuron.has_spiked());
    }

    #[test]
    fn test_refractory_period() {
        let params = MembraneParams::default();
        let mut random = RandomSource::new(Some(11));
        let mut neuron = NeuronUnit::new(NeuronRole::Excitatory, params.delay_steps);
        neuron.set_external_input(1.01);
        run_until(&mut neuron, 925, &params);
        assert_eq!(neuron.num_spikes(), 1);

        let noise = NeuronUnit::generate_noise(2.0, &mut random, &params).unwrap();
        for _ in 0..params.refractory_steps {
            assert_eq!(neuron.potential(), 0.0);
            assert!(neuron.is_refractory());
            neuron.update(1, noise, 5.0, &params);
        }
        assert_eq!(neuron.state(), NeuronState::Integrating);
        assert_relative_eq!(neuron.potential(), noise + params.input_gain * 1.01, epsilon = 1e-12);
    }

    #[test]
    fn test_refractory_period_ignores_buffered_input() {
        let params = MembraneParams::default();
        let mut neuron = NeuronUnit::new(NeuronRole::Excitatory, params.delay_steps);
        neuron.set_external_input(1.01);
        run_until(&mut neuron, 925, &params);

        let slot = neuron.buffer().read_slot(neuron.clock());
        neuron.buffer_mut().deposit(slot, 0.1);
        neuron.update(1, 0.0, 5.0, &params);
        assert_eq!(neuron.potential(), 0.0);
        assert_eq!(neuron.buffer().get(slot), 0.0);
    }

    #[test]
    fn test_generate_noise_is_scaled_poisson() {
        let params = MembraneParams::default();
        let mut random = RandomSource::new(Some(5));
        let mut reference = RandomSource::new(Some(5));
        for _ in 0..100 {
            let noise = NeuronUnit::generate_noise(2.0, &mut random, &params).unwrap();
            assert_eq!(noise, 0.1 * reference.poisson(2.0).unwrap());
        }
        assert_eq!(NeuronUnit::generate_noise(0.0, &mut random, &params), Ok(0.0));
    }

    #[test]
    fn test_input_counters() {
        let mut neuron = NeuronUnit::new(NeuronRole::Inhibitory, 15);
        neuron.record_input(NeuronRole::Excitatory);
        neuron.record_input(NeuronRole::Excitatory);
        neuron.record_input(NeuronRole::Inhibitory);
        assert_eq!(neuron.num_excitatory_inputs(), 2);
        assert_eq!(neuron.num_inhibitory_inputs(), 1);
    }
}
