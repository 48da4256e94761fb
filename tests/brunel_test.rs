use std::fs;
use std::path::Path;

use brunel_snn::core::config::{Regime, SimulationConfig};
use brunel_snn::core::network::Network;
use brunel_snn::error::SNNError;
use brunel_snn::simulator::reporter::{time_precision, SpikeEventWriter, SpikeRecorder};
use brunel_snn::simulator::simulator::Simulation;

fn small_config(seed: u64) -> SimulationConfig {
    SimulationConfig {
        population_size: 1250,
        excitatory_in_degree: 100,
        inhibitory_in_degree: 25,
        stop_time: 50.0,
        seed: Some(seed),
        ..SimulationConfig::default().with_regime(Regime::A)
    }
}

fn parse_event_log(path: &Path) -> Vec<(f64, usize)> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| {
            let (time, neuron_id) = line.split_once('\t').unwrap();
            (time.parse().unwrap(), neuron_id.parse().unwrap())
        })
        .collect()
}

#[test]
fn test_full_connectivity() {
    let mut simulation = Simulation::build(SimulationConfig {
        seed: Some(0),
        ..Default::default()
    })
    .unwrap();
    simulation.connect_randomly().unwrap();

    let network = simulation.network();
    assert_eq!(network.num_excitatory(), 10_000);
    assert_eq!(network.num_inhibitory(), 2_500);
    assert_eq!(network.num_connections(), 12_500 * 1_250);
    assert!(network
        .neurons_iter()
        .all(|neuron| neuron.num_excitatory_inputs() == 1000
            && neuron.num_inhibitory_inputs() == 250));
}

#[test]
fn test_connecting_twice_doubles_the_in_degrees() {
    let mut simulation = Simulation::build(small_config(3)).unwrap();
    simulation.connect_randomly().unwrap();
    simulation.connect_randomly().unwrap();

    assert_eq!(simulation.network().num_connections(), 2 * 1250 * 125);
    assert!(simulation
        .network()
        .neurons_iter()
        .all(|neuron| neuron.num_excitatory_inputs() == 200
            && neuron.num_inhibitory_inputs() == 50));
}

#[test]
fn test_event_log() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Spike_time.txt");

    let mut simulation = Simulation::build(small_config(42)).unwrap();
    simulation.connect_randomly().unwrap();
    let mut writer = SpikeEventWriter::create(&path).unwrap();
    let summary = simulation.run(&mut writer).unwrap();

    assert_eq!(summary.num_steps, 500);
    assert_eq!(writer.num_events() as u64, summary.num_spikes);

    let events = parse_event_log(&path);
    assert_eq!(events.len() as u64, summary.num_spikes);
    assert!(events
        .iter()
        .all(|&(time, neuron_id)| time > 0.0 && time <= 50.0 && neuron_id < 1250));
    // Emission order: non-decreasing times, increasing indices within a step
    for pair in events.windows(2) {
        assert!(pair[0].0 < pair[1].0 || (pair[0].0 == pair[1].0 && pair[0].1 < pair[1].1));
    }
}

#[test]
fn test_event_log_with_a_fine_step() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Spike_time.txt");
    let config = SimulationConfig {
        step_size: 0.05,
        stop_time: 400.0,
        ..SimulationConfig::single_neuron(1.01)
    };

    let mut simulation = Simulation::build(config).unwrap();
    let mut writer = SpikeEventWriter::create(&path)
        .unwrap()
        .with_precision(time_precision(0.05));
    let mut recorder = SpikeRecorder::new();
    simulation.run(&mut (&mut writer, &mut recorder)).unwrap();

    let events = parse_event_log(&path);
    assert!(events.len() > 1);
    assert_eq!(events.len(), recorder.events().len());
    for (&(time, _), event) in events.iter().zip(recorder.events()) {
        assert!((time - event.time).abs() < 1e-9);
    }
}

#[test]
fn test_seeded_runs_are_identical() {
    let dir = tempfile::tempdir().unwrap();
    let paths = [dir.path().join("run_1.txt"), dir.path().join("run_2.txt")];

    for path in paths.iter() {
        let mut simulation = Simulation::build(small_config(11)).unwrap();
        simulation.connect_randomly().unwrap();
        simulation
            .run(&mut SpikeEventWriter::create(path).unwrap())
            .unwrap();
    }

    assert_eq!(
        fs::read_to_string(&paths[0]).unwrap(),
        fs::read_to_string(&paths[1]).unwrap()
    );
}

#[test]
fn test_saved_network_replays_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let network_path = dir.path().join("network.json");

    let mut simulation = Simulation::build(small_config(5)).unwrap();
    simulation.connect_randomly().unwrap();
    simulation.network().save_to(&network_path).unwrap();
    let mut recorder = SpikeRecorder::new();
    simulation.run(&mut recorder).unwrap();

    // The noise does not depend on the connectivity draws: the same seed replays the same spikes
    let network = Network::load_from(&network_path).unwrap();
    assert_eq!(network.num_connections(), 1250 * 125);
    let mut replay = Simulation::from_network(small_config(5), network).unwrap();
    let mut replay_recorder = SpikeRecorder::new();
    replay.run(&mut replay_recorder).unwrap();

    assert!(!recorder.events().is_empty());
    assert_eq!(recorder.events(), replay_recorder.events());
}

#[test]
fn test_saved_default_network_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let network_path = dir.path().join("network.json");
    let config = SimulationConfig {
        population_size: 100,
        excitatory_in_degree: 8,
        inhibitory_in_degree: 2,
        ..Default::default()
    };

    let mut simulation = Simulation::build(config.clone()).unwrap();
    simulation.connect_randomly().unwrap();
    simulation.network().save_to(&network_path).unwrap();

    let network = Network::load_from(&network_path).unwrap();
    assert_eq!(&network, simulation.network());
    assert!(Simulation::from_network(config, network).is_ok());
}

#[test]
fn test_load_partial_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(
        &path,
        r#"{ "amplitudeRatioG": 6.0, "noiseRate": 4.0, "stopTime": 100.0, "seed": 8 }"#,
    )
    .unwrap();

    let expected = SimulationConfig {
        stop_time: 100.0,
        seed: Some(8),
        ..SimulationConfig::default().with_regime(Regime::B)
    };
    assert_eq!(SimulationConfig::load_from(&path).unwrap(), expected);
}

#[test]
fn test_invalid_config_builds_nothing() {
    let config = SimulationConfig {
        population_size: 100,
        ..Default::default()
    };
    assert!(matches!(
        Simulation::build(config),
        Err(SNNError::InvalidParameters(_))
    ));
}
