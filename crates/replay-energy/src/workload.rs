//! Playback of a service CPU usage trace.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::Serialize;

use replay_compute::host::Host;
use replay_core::{log_debug, log_info, log_warn, SimulationContext};

use crate::trace::Trace;

// Overruns below this value are considered floating-point noise.
const DRIFT_TOLERANCE: f64 = 1e-9;

/// Playback state of a workload actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkloadState {
    /// Not started yet.
    Idle,
    /// Computing the sample with given index.
    Playing(usize),
    /// Waiting for the end of the sample period of the sample with given index.
    Sleeping(usize),
    /// All samples are played.
    Done,
}

/// Computation of a sample took longer than the sample period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftEvent {
    /// Index of the sample in the trace.
    pub sample_index: usize,
    /// Time when the sample computation started.
    pub start_time: f64,
    /// Actual duration of the computation.
    pub run_time: f64,
    /// Excess of the duration over the sample period.
    pub overrun: f64,
}

/// Outcome of a trace playback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkloadReport {
    /// Service name.
    pub service: String,
    /// Number of played samples.
    pub samples_played: usize,
    /// Samples which overran their period.
    pub drift: Vec<DriftEvent>,
    /// Time when the playback finished.
    pub finished_at: f64,
}

impl WorkloadReport {
    /// Returns the total time the playback fell behind its schedule.
    pub fn total_overrun(&self) -> f64 {
        self.drift.iter().map(|d| d.overrun).sum()
    }
}

/// Actor replaying the CPU usage trace of one service on a host.
///
/// Each sample `s` is turned into computation of `sample_period * min(s, cores) / cores * speed` flops, where
/// `cores` and `speed` are read from the host at the start of the sample. After the computation the actor sleeps
/// for the rest of the sample period. If the computation overruns the period, the actor does not sleep and starts
/// the next sample right away, so it falls behind schedule and the overrun is reported as drift.
pub struct WorkloadActor {
    host: Rc<RefCell<Host>>,
    trace: Trace,
    sample_period: f64,
    state: Cell<WorkloadState>,
    ctx: SimulationContext,
}

impl WorkloadActor {
    /// Creates actor playing `trace` on `host`.
    pub fn new(host: Rc<RefCell<Host>>, trace: Trace, sample_period: f64, ctx: SimulationContext) -> Self {
        assert!(sample_period > 0., "Sample period must be positive");
        Self {
            host,
            trace,
            sample_period,
            state: Cell::new(WorkloadState::Idle),
            ctx,
        }
    }

    /// Returns service name.
    pub fn service(&self) -> &str {
        self.ctx.name()
    }

    /// Returns current playback state.
    pub fn state(&self) -> WorkloadState {
        self.state.get()
    }

    /// Plays the whole trace.
    pub async fn run(&self) -> WorkloadReport {
        let mut drift = Vec::new();
        let mut samples_played = 0;
        if self.trace.is_empty() {
            log_debug!(self.ctx, "trace is empty");
        }
        for (index, sample) in self.trace.iter().enumerate() {
            self.state.set(WorkloadState::Playing(index));
            let start = self.ctx.time();
            let (cores, speed) = {
                let host = self.host.borrow();
                (host.core_count() as f64, host.current_speed())
            };
            let load = sample.min(cores);
            let cpu_fraction = load / cores;
            let flops = self.sample_period * cpu_fraction * speed;
            log_info!(
                self.ctx,
                "run a computation of {:.0e} flops, should run for {:.3} seconds",
                flops,
                self.sample_period * cpu_fraction
            );

            let execution = self.host.borrow_mut().execute(flops);
            execution.await;
            let run_time = self.ctx.time() - start;
            samples_played += 1;
            {
                let host = self.host.borrow();
                let (min_power, max_power) = host.power_bounds_at_current_pstate();
                log_info!(
                    self.ctx,
                    "computation done (duration: {:.2} s, cpu load given: {:.5}). current peak speed={:.0e} flop/s; \
                     current consumption: from {:.0}W to {:.0}W depending on load; energy dissipated={:.0} J",
                    run_time,
                    load,
                    host.current_speed(),
                    min_power,
                    max_power,
                    host.consumed_energy()
                );
            }

            self.state.set(WorkloadState::Sleeping(index));
            let overrun = run_time - self.sample_period;
            if overrun > DRIFT_TOLERANCE {
                log_warn!(
                    self.ctx,
                    "sample {} overran its period by {:.6} s (run time {:.6} s), next sample starts late",
                    index,
                    overrun,
                    run_time
                );
                drift.push(DriftEvent {
                    sample_index: index,
                    start_time: start,
                    run_time,
                    overrun,
                });
            }
            self.ctx.sleep((self.sample_period - run_time).max(0.)).await;
        }
        self.state.set(WorkloadState::Done);
        WorkloadReport {
            service: self.service().to_string(),
            samples_played,
            drift,
            finished_at: self.ctx.time(),
        }
    }
}
