use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use approx::assert_abs_diff_eq;
use rand::prelude::*;
use rand_pcg::Pcg64;

use replay_compute::host::{HostConfig, PowerProfile, Pstate};
use replay_energy::config::{PlatformConfig, PstateChange, ReplayConfig};
use replay_energy::error::{ReplayError, Result};
use replay_energy::monitor::{CsvEnergyWriter, EnergyRecord, EnergySink, MemoryEnergySink};
use replay_energy::service::ServiceDescriptor;
use replay_energy::trace::InMemoryTraceSource;
use replay_energy::workload::WorkloadState;
use replay_energy::{Replay, RunSummary};

const IDLE: f64 = 50.;
const MIN: f64 = 100.;
const MAX: f64 = 200.;

fn host(name: &str, cores: u32) -> HostConfig {
    HostConfig {
        name: name.to_string(),
        cores,
        pstates: vec![
            Pstate {
                speed: 100.,
                power: PowerProfile {
                    idle: IDLE,
                    min: MIN,
                    max: MAX,
                },
            },
            Pstate {
                speed: 50.,
                power: PowerProfile {
                    idle: IDLE / 2.,
                    min: MIN / 2.,
                    max: MAX / 2.,
                },
            },
        ],
        initial_pstate: 0,
    }
}

fn platform(cores: u32) -> PlatformConfig {
    PlatformConfig::new(vec![host("host1", cores), host("host3", 1)])
}

fn service(name: &str, core_count: u32) -> ServiceDescriptor {
    ServiceDescriptor {
        name: name.to_string(),
        core_count,
        memory: 1024,
    }
}

fn config(observation_budget: f64) -> ReplayConfig {
    ReplayConfig {
        sample_period: 5.,
        tick_interval: 1.,
        observation_budget,
    }
}

fn run(
    config: &ReplayConfig,
    platform: &PlatformConfig,
    services: Vec<ServiceDescriptor>,
    traces: &InMemoryTraceSource,
) -> RunSummary {
    Replay::new(config, platform, services, traces, Box::new(MemoryEnergySink::new()))
        .unwrap()
        .run()
        .unwrap()
}

#[test]
fn test_samples_are_played_at_fixed_period() {
    let traces = InMemoryTraceSource::new().with_trace("carts", vec![2., 4.]);
    let summary = run(&config(0.), &platform(4), vec![service("carts", 4)], &traces);

    assert_eq!(summary.workloads.len(), 1);
    let report = &summary.workloads[0];
    assert_eq!(report.service, "carts");
    assert_eq!(report.samples_played, 2);
    assert!(report.drift.is_empty());
    assert_abs_diff_eq!(report.finished_at, 10., epsilon = 1e-9);
    assert_abs_diff_eq!(summary.end_time, 10., epsilon = 1e-9);

    // 250 and 500 flops on one of four cores at 100 flop/s: busy for 2.5 s and 5 s
    let busy_power = MIN + (MAX - MIN) * 0.25;
    assert_abs_diff_eq!(summary.final_energy, busy_power * 7.5 + IDLE * 2.5, epsilon = 1e-6);
}

#[test]
fn test_samples_are_clamped_to_core_count() {
    let traces = InMemoryTraceSource::new().with_trace("orders", vec![8., 3.5]);
    let summary = run(&config(0.), &platform(2), vec![service("orders", 8)], &traces);

    // both samples load both cores fully, so each computation lasts exactly one period
    let report = &summary.workloads[0];
    assert!(report.drift.is_empty());
    assert_abs_diff_eq!(report.finished_at, 10., epsilon = 1e-9);
}

#[test]
fn test_overloaded_host_produces_drift() {
    let mut traces = InMemoryTraceSource::new();
    let mut services = Vec::new();
    for name in ["a", "b", "c"] {
        traces = traces.with_trace(name, vec![4., 4.]);
        services.push(service(name, 4));
    }
    let summary = run(&config(0.), &platform(2), services, &traces);

    // three computations of 500 flops share two cores and last 7.5 s
    assert_eq!(summary.drift_count(), 6);
    for report in &summary.workloads {
        assert_eq!(report.samples_played, 2);
        assert_eq!(report.drift.len(), 2);
        assert_abs_diff_eq!(report.drift[0].start_time, 0.);
        assert_abs_diff_eq!(report.drift[0].overrun, 2.5, epsilon = 1e-9);
        // the next sample starts right after the overrun, not at the next period
        assert_abs_diff_eq!(report.drift[1].start_time, 7.5, epsilon = 1e-9);
        assert_abs_diff_eq!(report.finished_at, 15., epsilon = 1e-9);
    }
    assert_abs_diff_eq!(summary.end_time, 15., epsilon = 1e-9);
}

#[test]
fn test_exact_period_computation_records_no_drift() {
    // 0.7 s is not representable, so run times may exceed the period by float noise only
    let config = ReplayConfig {
        sample_period: 0.7,
        tick_interval: 1.,
        observation_budget: 0.,
    };
    let traces = InMemoryTraceSource::new().with_trace("carts", vec![4.; 10]);
    let summary = run(&config, &platform(4), vec![service("carts", 4)], &traces);

    let report = &summary.workloads[0];
    assert_eq!(report.samples_played, 10);
    assert!(report.drift.is_empty());
    assert_eq!(summary.drift_count(), 0);
    assert_abs_diff_eq!(report.finished_at, 7., epsilon = 1e-9);
}

#[test]
fn test_monitor_records_every_tick() {
    let traces = InMemoryTraceSource::new();
    let summary = run(&config(300.), &platform(4), vec![], &traces);

    assert_eq!(summary.records.len(), 301);
    for (i, record) in summary.records.iter().enumerate() {
        assert_abs_diff_eq!(record.t, i as f64);
        assert_abs_diff_eq!(record.total_energy, IDLE * i as f64, epsilon = 1e-9);
    }
    assert_abs_diff_eq!(summary.end_time, 301.);
}

#[test]
fn test_workloads_continue_after_monitor_stops() {
    let traces = InMemoryTraceSource::new().with_trace("carts", vec![1.; 4]);
    let summary = run(&config(7.), &platform(4), vec![service("carts", 1)], &traces);

    assert_eq!(summary.records.len(), 8);
    assert_abs_diff_eq!(summary.end_time, 20., epsilon = 1e-9);
    assert_eq!(summary.workloads[0].samples_played, 4);
}

#[test]
fn test_empty_trace_completes_immediately() {
    let traces = InMemoryTraceSource::new()
        .with_trace("idle", vec![])
        .with_trace("carts", vec![]);
    let summary = run(
        &config(10.),
        &platform(4),
        vec![service("idle", 2), service("carts", 1)],
        &traces,
    );

    for report in &summary.workloads {
        assert_eq!(report.samples_played, 0);
        assert_eq!(report.finished_at, 0.);
    }
    for record in &summary.records {
        assert_abs_diff_eq!(record.total_energy, IDLE * record.t, epsilon = 1e-9);
    }
}

#[test]
fn test_actors_are_created_by_descending_core_count() {
    let traces = InMemoryTraceSource::new()
        .with_trace("small", vec![1.])
        .with_trace("large", vec![1.])
        .with_trace("medium", vec![1.]);
    let replay = Replay::new(
        &config(0.),
        &platform(4),
        vec![service("small", 1), service("large", 8), service("medium", 2)],
        &traces,
        Box::new(MemoryEnergySink::new()),
    )
    .unwrap();

    let names: Vec<String> = replay.workloads().iter().map(|w| w.service().to_string()).collect();
    assert_eq!(names, vec!["large", "medium", "small"]);
    let workloads = replay.workloads().to_vec();
    assert!(workloads.iter().all(|w| w.state() == WorkloadState::Idle));

    let summary = replay.run().unwrap();
    assert!(workloads.iter().all(|w| w.state() == WorkloadState::Done));
    let reported: Vec<&str> = summary.workloads.iter().map(|w| w.service.as_str()).collect();
    assert_eq!(reported, vec!["large", "medium", "small"]);
}

#[test]
fn test_pstate_schedule_slows_down_computation() {
    let mut platform = platform(4);
    platform.pstate_schedule.push(PstateChange {
        time: 2.,
        host: "host1".to_string(),
        pstate: 1,
    });
    let traces = InMemoryTraceSource::new().with_trace("carts", vec![4.]);
    let summary = run(&config(0.), &platform, vec![service("carts", 4)], &traces);

    // 200 of 500 flops are done at full speed, the rest at half speed
    let report = &summary.workloads[0];
    assert_eq!(report.drift.len(), 1);
    assert_abs_diff_eq!(report.drift[0].run_time, 8., epsilon = 1e-9);
    assert_abs_diff_eq!(report.drift[0].overrun, 3., epsilon = 1e-9);
    let busy_power = MIN + (MAX - MIN) * 0.25;
    assert_abs_diff_eq!(summary.final_energy, busy_power * 2. + busy_power / 2. * 6., epsilon = 1e-6);
}

#[test]
fn test_energy_series_is_monotonic() {
    let mut rng = Pcg64::seed_from_u64(123);
    let mut traces = InMemoryTraceSource::new();
    let mut services = Vec::new();
    for i in 0..5 {
        let name = format!("service{}", i);
        let samples = (0..rng.gen_range(0..80)).map(|_| rng.gen_range(0.0..6.0)).collect();
        traces = traces.with_trace(&name, samples);
        services.push(service(&name, rng.gen_range(1..=4)));
    }
    let summary = run(&config(300.), &platform(4), services, &traces);

    assert_eq!(summary.records.len(), 301);
    for pair in summary.records.windows(2) {
        assert!(pair[1].t > pair[0].t);
        assert!(pair[1].total_energy >= pair[0].total_energy);
    }
    for report in &summary.workloads {
        let mut last_start = 0.;
        for drift in &report.drift {
            assert!(drift.start_time >= last_start);
            assert!(drift.overrun > 0.);
            last_start = drift.start_time;
        }
        assert!(report.finished_at >= report.samples_played as f64 * 5. - 1e-6);
    }
}

#[derive(Clone, Default)]
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn run_to_csv(seed: u64) -> String {
    let mut rng = Pcg64::seed_from_u64(seed);
    let mut traces = InMemoryTraceSource::new();
    let mut services = Vec::new();
    for i in 0..4 {
        let name = format!("service{}", i);
        let samples = (0..40).map(|_| rng.gen_range(0.0..8.0)).collect();
        traces = traces.with_trace(&name, samples);
        services.push(service(&name, 2));
    }
    let buffer = SharedBuffer::default();
    let sink = CsvEnergyWriter::new(buffer.clone(), std::path::Path::new("energy.data")).unwrap();
    Replay::new(&config(300.), &platform(2), services, &traces, Box::new(sink))
        .unwrap()
        .run()
        .unwrap();
    let output = buffer.0.borrow().clone();
    String::from_utf8(output).unwrap()
}

#[test]
fn test_identical_inputs_produce_identical_output() {
    let first = run_to_csv(42);
    let second = run_to_csv(42);
    assert!(first.starts_with("t,total_energy\n"));
    assert_eq!(first.lines().count(), 302);
    assert_eq!(first, second);
}

struct FailingSink {
    appended: usize,
}

impl EnergySink for FailingSink {
    fn append(&mut self, _record: &EnergyRecord) -> Result<()> {
        self.appended += 1;
        if self.appended > 3 {
            return Err(ReplayError::Io {
                path: "energy.data".into(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk is full"),
            });
        }
        Ok(())
    }
}

#[test]
fn test_sink_failure_aborts_run() {
    let traces = InMemoryTraceSource::new().with_trace("carts", vec![1.; 100]);
    let result = Replay::new(
        &config(300.),
        &platform(4),
        vec![service("carts", 1)],
        &traces,
        Box::new(FailingSink { appended: 0 }),
    )
    .unwrap()
    .run();
    assert!(matches!(result, Err(ReplayError::Io { .. })));
}

#[test]
fn test_configuration_errors() {
    let traces = InMemoryTraceSource::new().with_trace("host1", vec![1.]);
    let result = Replay::new(
        &config(0.),
        &platform(4),
        vec![service("host1", 1)],
        &traces,
        Box::new(MemoryEnergySink::new()),
    );
    assert!(matches!(result, Err(ReplayError::Config(_))));

    let result = Replay::new(
        &config(0.),
        &platform(4),
        vec![service("carts", 1)],
        &traces,
        Box::new(MemoryEnergySink::new()),
    );
    assert!(matches!(result, Err(ReplayError::Config(_))));

    let mut bad_platform = platform(4);
    bad_platform.monitored_host = "host9".to_string();
    let result = Replay::new(
        &config(0.),
        &bad_platform,
        vec![],
        &traces,
        Box::new(MemoryEnergySink::new()),
    );
    assert!(matches!(result, Err(ReplayError::Config(_))));
}
