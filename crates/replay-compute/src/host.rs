//! Multi-core host with performance states.

use serde::{Deserialize, Serialize};
use sugars::boxed;

use replay_core::async_mode::promise::{self, Promise, PromiseFuture};
use replay_core::{cast, log_debug, Event, EventHandler, EventId, Id, SimulationContext};

use crate::energy::EnergyMeter;
use crate::fair_sharing::FairShareModel;
use crate::power::{HostPowerModel, LinearCpuPowerModel};

// Computations finishing within this distance from the current time are completed together.
const COMPLETION_TOLERANCE: f64 = 1e-9;

/// Power consumption of a host in a performance state, in W.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PowerProfile {
    /// Consumption when no computation is running.
    pub idle: f64,
    /// Consumption when the host is loaded but all cores are idle except a vanishingly small share.
    pub min: f64,
    /// Consumption when all cores are busy.
    pub max: f64,
}

/// Performance state of a host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pstate {
    /// Per-core speed in flop/s.
    pub speed: f64,
    /// Power consumption at this speed.
    pub power: PowerProfile,
}

/// Static description of a host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Unique host name, also used as component name.
    pub name: String,
    /// Number of cores.
    pub cores: u32,
    /// Performance states, at least one.
    pub pstates: Vec<Pstate>,
    /// Index of the performance state at the simulation start.
    #[serde(default)]
    pub initial_pstate: usize,
}

impl HostConfig {
    /// Checks that the description is consistent, returns the description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("host name is empty".to_string());
        }
        if self.cores == 0 {
            return Err(format!("host {} has no cores", self.name));
        }
        if self.pstates.is_empty() {
            return Err(format!("host {} has no pstates", self.name));
        }
        if self.initial_pstate >= self.pstates.len() {
            return Err(format!(
                "host {} initial pstate {} is out of range (pstate count is {})",
                self.name,
                self.initial_pstate,
                self.pstates.len()
            ));
        }
        for (i, pstate) in self.pstates.iter().enumerate() {
            if !(pstate.speed.is_finite() && pstate.speed > 0.) {
                return Err(format!("host {} pstate {} has non-positive speed", self.name, i));
            }
            let power = &pstate.power;
            if [power.idle, power.min, power.max]
                .iter()
                .any(|p| !p.is_finite() || *p < 0.)
            {
                return Err(format!("host {} pstate {} has invalid power values", self.name, i));
            }
            if power.min > power.max {
                return Err(format!(
                    "host {} pstate {} has min power {} greater than max power {}",
                    self.name, i, power.min, power.max
                ));
            }
        }
        Ok(())
    }
}

/// Result of a completed computation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExecutionInfo {
    /// Computation id, unique within the host.
    pub id: u64,
    /// Amount of work in flops.
    pub flops: f64,
    /// Time when the computation was requested.
    pub start_time: f64,
    /// Time when the computation completed.
    pub finish_time: f64,
}

#[derive(Clone, Serialize)]
struct CompletionCheck {}

struct RunningExecution {
    id: u64,
    flops: f64,
    start_time: f64,
    promise: Promise<ExecutionInfo>,
}

/// Simulated host which runs computations and accounts consumed energy.
///
/// Concurrent computations share the cores fairly (see [`FairShareModel`]). The power consumption is
/// `idle` when nothing runs and `min + (max - min) * utilization` otherwise, where utilization is the share of
/// busy cores and the power values come from the current performance state.
///
/// The host must be registered as event handler under the same name as its context.
pub struct Host {
    cores: u32,
    pstates: Vec<Pstate>,
    pstate: usize,
    power_models: Vec<HostPowerModel>,
    computations: FairShareModel<RunningExecution>,
    energy_meter: EnergyMeter,
    next_execution_id: u64,
    completion_check: Option<EventId>,
    ctx: SimulationContext,
}

impl Host {
    /// Creates host from its description.
    ///
    /// Panics if the description is not valid (see [`HostConfig::validate`]).
    pub fn new(config: &HostConfig, ctx: SimulationContext) -> Self {
        if let Err(message) = config.validate() {
            panic!("Invalid host config: {}", message);
        }
        let power_models = config
            .pstates
            .iter()
            .map(|pstate| {
                HostPowerModel::new(boxed!(LinearCpuPowerModel::new(pstate.power.min, pstate.power.max)))
                    .with_idle_power(pstate.power.idle)
            })
            .collect::<Vec<_>>();
        let pstate = config.initial_pstate;
        let idle_power = power_models[pstate].get_power(0.);
        Self {
            cores: config.cores,
            pstates: config.pstates.clone(),
            pstate,
            power_models,
            computations: FairShareModel::new(config.cores, config.pstates[pstate].speed),
            energy_meter: EnergyMeter::new(ctx.time(), idle_power),
            next_execution_id: 0,
            completion_check: None,
            ctx,
        }
    }

    /// Returns component id of the host.
    pub fn id(&self) -> Id {
        self.ctx.id()
    }

    /// Returns host name.
    pub fn name(&self) -> &str {
        self.ctx.name()
    }

    /// Returns the number of cores.
    pub fn core_count(&self) -> u32 {
        self.cores
    }

    /// Returns the per-core speed at the current performance state.
    pub fn current_speed(&self) -> f64 {
        self.pstates[self.pstate].speed
    }

    /// Returns the index of the current performance state.
    pub fn pstate(&self) -> usize {
        self.pstate
    }

    /// Returns the number of performance states.
    pub fn pstate_count(&self) -> usize {
        self.pstates.len()
    }

    /// Returns the min and max power consumption at the current performance state.
    pub fn power_bounds_at_current_pstate(&self) -> (f64, f64) {
        let power = &self.pstates[self.pstate].power;
        (power.min, power.max)
    }

    /// Returns the number of running computations.
    pub fn running_executions(&self) -> usize {
        self.computations.len()
    }

    /// Returns the share of busy cores.
    pub fn utilization(&self) -> f64 {
        self.computations.busy_cores() as f64 / self.cores as f64
    }

    /// Returns the current power consumption in W.
    pub fn current_power(&self) -> f64 {
        self.power_models[self.pstate].get_power(self.utilization())
    }

    /// Returns the energy in J consumed since the host creation up to the current time.
    ///
    /// Reading does not change the host state.
    pub fn consumed_energy(&self) -> f64 {
        self.energy_meter.energy_at(self.ctx.time())
    }

    /// Starts computation of `flops` flops, the returned future completes when the computation finishes.
    ///
    /// Computation of zero flops completes immediately. Panics if `flops` is negative or not finite.
    pub fn execute(&mut self, flops: f64) -> PromiseFuture<ExecutionInfo> {
        assert!(
            flops.is_finite() && flops >= 0.,
            "Computation size must be a finite non-negative number, got {}",
            flops
        );
        let id = self.next_execution_id;
        self.next_execution_id += 1;
        let now = self.ctx.time();
        if flops == 0. {
            return promise::ready(ExecutionInfo {
                id,
                flops,
                start_time: now,
                finish_time: now,
            });
        }
        let (promise, future) = promise::contract();
        self.computations.insert(
            now,
            flops,
            RunningExecution {
                id,
                flops,
                start_time: now,
                promise,
            },
        );
        log_debug!(
            self.ctx,
            "started computation {} of {:.3} flops, running: {}",
            id,
            flops,
            self.computations.len()
        );
        self.on_load_change();
        future
    }

    /// Switches the host to performance state `pstate`.
    ///
    /// Running computations keep the progress made so far and continue at the new speed.
    /// Panics if `pstate` is out of range.
    pub fn set_pstate(&mut self, pstate: usize) {
        assert!(
            pstate < self.pstates.len(),
            "Pstate {} is out of range for host {} with {} pstates",
            pstate,
            self.ctx.name(),
            self.pstates.len()
        );
        if pstate == self.pstate {
            return;
        }
        let now = self.ctx.time();
        self.computations.set_speed(now, self.pstates[pstate].speed);
        self.pstate = pstate;
        log_debug!(
            self.ctx,
            "switched to pstate {} with speed {:.3}",
            pstate,
            self.current_speed()
        );
        self.on_load_change();
    }

    fn on_load_change(&mut self) {
        self.energy_meter.update(self.ctx.time(), self.current_power());
        self.schedule_completion_check();
    }

    fn schedule_completion_check(&mut self) {
        if let Some(event_id) = self.completion_check.take() {
            self.ctx.cancel_event(event_id);
        }
        if let Some((finish_time, _)) = self.computations.peek() {
            let delay = (finish_time - self.ctx.time()).max(0.);
            self.completion_check = Some(self.ctx.emit_self(CompletionCheck {}, delay));
        }
    }

    fn complete_finished(&mut self) {
        let now = self.ctx.time();
        let mut completed = 0;
        while let Some((finish_time, _)) = self.computations.peek() {
            if finish_time > now + COMPLETION_TOLERANCE {
                break;
            }
            if let Some((_, execution)) = self.computations.pop() {
                log_debug!(
                    self.ctx,
                    "completed computation {} of {:.3} flops started at {:.3}",
                    execution.id,
                    execution.flops,
                    execution.start_time
                );
                execution.promise.complete(ExecutionInfo {
                    id: execution.id,
                    flops: execution.flops,
                    start_time: execution.start_time,
                    finish_time: now,
                });
                completed += 1;
            }
        }
        if completed > 0 {
            self.energy_meter.update(now, self.current_power());
        }
        self.schedule_completion_check();
    }
}

impl EventHandler for Host {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            CompletionCheck {} => {
                self.completion_check = None;
                self.complete_finished();
            }
        })
    }
}
