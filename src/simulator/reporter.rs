//! Sinks receiving the spike events and the per-step state of a simulation.
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::core::network::Network;
use crate::error::SNNError;

/// A spike emitted by a neuron of the network.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct SpikeEvent {
    /// The time of the spike (ms).
    pub time: f64,
    /// The index of the spiking neuron.
    pub neuron_id: usize,
}

/// The largest number of decimals used to write times.
const MAX_TIME_PRECISION: usize = 9;

/// Returns the number of decimals needed to write every multiple of the step size without merging distinct steps,
/// e.g., 1 for 0.1 ms and 2 for 0.05 ms.
pub fn time_precision(step_size: f64) -> usize {
    (0..MAX_TIME_PRECISION)
        .find(|&precision| {
            let scaled = step_size * 10f64.powi(precision as i32);
            (scaled - scaled.round()).abs() < 1e-6
        })
        .unwrap_or(MAX_TIME_PRECISION)
}

/// Receives what happens during a simulation.
/// A failing reporter stops the simulation with its error.
pub trait Reporter {
    /// Called for every spike, in emission order.
    fn on_spike(&mut self, _event: &SpikeEvent) -> Result<(), SNNError> {
        Ok(())
    }

    /// Called at the end of every step with the elapsed time.
    fn on_step(&mut self, _time: f64, _network: &Network) -> Result<(), SNNError> {
        Ok(())
    }

    /// Called once when the simulation reaches its stop time.
    fn finish(&mut self) -> Result<(), SNNError> {
        Ok(())
    }
}

impl<R: Reporter + ?Sized> Reporter for &mut R {
    fn on_spike(&mut self, event: &SpikeEvent) -> Result<(), SNNError> {
        (**self).on_spike(event)
    }

    fn on_step(&mut self, time: f64, network: &Network) -> Result<(), SNNError> {
        (**self).on_step(time, network)
    }

    fn finish(&mut self) -> Result<(), SNNError> {
        (**self).finish()
    }
}

/// Forward everything to both reporters, the first one first.
impl<A: Reporter, B: Reporter> Reporter for (A, B) {
    fn on_spike(&mut self, event: &SpikeEvent) -> Result<(), SNNError> {
        self.0.on_spike(event)?;
        self.1.on_spike(event)
    }

    fn on_step(&mut self, time: f64, network: &Network) -> Result<(), SNNError> {
        self.0.on_step(time, network)?;
        self.1.on_step(time, network)
    }

    fn finish(&mut self) -> Result<(), SNNError> {
        self.0.finish()?;
        self.1.finish()
    }
}

/// Keeps the spike events in memory.
#[derive(Debug, Default, PartialEq, Clone)]
pub struct SpikeRecorder {
    events: Vec<SpikeEvent>,
}

impl SpikeRecorder {
    pub fn new() -> Self {
        SpikeRecorder { events: vec![] }
    }

    /// Returns the recorded events, in emission order.
    pub fn events(&self) -> &[SpikeEvent] {
        &self.events
    }

    /// Returns the spike times of a specific neuron.
    pub fn firing_times(&self, neuron_id: usize) -> Vec<f64> {
        self.events
            .iter()
            .filter(|event| event.neuron_id == neuron_id)
            .map(|event| event.time)
            .collect()
    }
}

impl Reporter for SpikeRecorder {
    fn on_spike(&mut self, event: &SpikeEvent) -> Result<(), SNNError> {
        self.events.push(*event);
        Ok(())
    }
}

/// Writes one `time<TAB>neuron_id` line per spike event, in emission order.
/// Times have one decimal by default; use [`time_precision`] for step sizes below 0.1 ms.
#[derive(Debug)]
pub struct SpikeEventWriter<W: Write> {
    writer: W,
    /// Number of decimals of the spike times.
    precision: usize,
    num_events: usize,
}

impl<W: Write> SpikeEventWriter<W> {
    pub fn new(writer: W) -> Self {
        SpikeEventWriter {
            writer,
            precision: 1,
            num_events: 0,
        }
    }

    /// Set the number of decimals of the written spike times.
    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    /// Returns the number of events written so far.
    pub fn num_events(&self) -> usize {
        self.num_events
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl SpikeEventWriter<BufWriter<File>> {
    /// Create (or truncate) the event log at the given path.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, SNNError> {
        let file = File::create(path).map_err(|e| SNNError::IOError(e.to_string()))?;
        Ok(SpikeEventWriter::new(BufWriter::new(file)))
    }
}

impl<W: Write> Reporter for SpikeEventWriter<W> {
    fn on_spike(&mut self, event: &SpikeEvent) -> Result<(), SNNError> {
        writeln!(
            self.writer,
            "{:.*}\t{}",
            self.precision, event.time, event.neuron_id
        )
        .map_err(|e| SNNError::IOError(e.to_string()))?;
        self.num_events += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SNNError> {
        self.writer
            .flush()
            .map_err(|e| SNNError::IOError(e.to_string()))
    }
}

/// Writes one `time<TAB>potential` line per step for one neuron, with four decimals for the time by default.
#[derive(Debug)]
pub struct MembraneTraceWriter<W: Write> {
    writer: W,
    neuron_id: usize,
    precision: usize,
}

impl<W: Write> MembraneTraceWriter<W> {
    pub fn new(writer: W, neuron_id: usize) -> Self {
        MembraneTraceWriter {
            writer,
            neuron_id,
            precision: 4,
        }
    }

    /// Set the number of decimals of the written times.
    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl MembraneTraceWriter<BufWriter<File>> {
    /// Create (or truncate) the trace file at the given path.
    pub fn create<P: AsRef<Path>>(path: P, neuron_id: usize) -> Result<Self, SNNError> {
        let file = File::create(path).map_err(|e| SNNError::IOError(e.to_string()))?;
        Ok(MembraneTraceWriter::new(BufWriter::new(file), neuron_id))
    }
}

impl<W: Write> Reporter for MembraneTraceWriter<W> {
    fn on_step(&mut self, time: f64, network: &Network) -> Result<(), SNNError> {
        let neuron = network.neuron_ref(self.neuron_id).ok_or_else(|| {
            SNNError::OutOfBounds(format!(
                "Traced neuron {} not in a network of {}",
                self.neuron_id,
                network.num_neurons()
            ))
        })?;
        writeln!(self.writer, "{:.*}\t{}", self.precision, time, neuron.potential())
            .map_err(|e| SNNError::IOError(e.to_string()))
    }

    fn finish(&mut self) -> Result<(), SNNError> {
        self.writer
            .flush()
            .map_err(|e| SNNError::IOError(e.to_string()))
    }
}

/// Logs the amplitudes a neuron finds in its delay buffer, i.e., the spikes it receives.
///
/// After every step, the slot the neuron integrates at its next update is inspected; an arrival is reported
/// at the time of that update.
#[derive(Debug, Default, PartialEq, Clone)]
pub struct SpikeArrivalLogger {
    neuron_id: usize,
    /// The time and total amplitude of every arrival.
    arrivals: Vec<(f64, f64)>,
}

impl SpikeArrivalLogger {
    pub fn new(neuron_id: usize) -> Self {
        SpikeArrivalLogger {
            neuron_id,
            arrivals: vec![],
        }
    }

    /// Returns the time and total amplitude of every arrival so far.
    pub fn arrivals(&self) -> &[(f64, f64)] {
        &self.arrivals
    }
}

impl Reporter for SpikeArrivalLogger {
    fn on_step(&mut self, _time: f64, network: &Network) -> Result<(), SNNError> {
        let neuron = network.neuron_ref(self.neuron_id).ok_or_else(|| {
            SNNError::OutOfBounds(format!(
                "Watched neuron {} not in a network of {}",
                self.neuron_id,
                network.num_neurons()
            ))
        })?;
        let buffer = neuron.buffer();
        let amplitude = buffer.get(buffer.read_slot(neuron.clock()));
        if amplitude != 0.0 {
            let time = neuron.clock() as f64 * network.params().step_size;
            log::info!(
                "Neuron {} receives {} mV at {:.1} ms",
                self.neuron_id,
                amplitude,
                time
            );
            self.arrivals.push((time, amplitude));
        }
        Ok(())
    }
}
