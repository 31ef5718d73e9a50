//! Replay assembly and execution.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::rc::Rc;

use serde::Serialize;
use sugars::{rc, refcell};

use replay_compute::host::Host;
use replay_core::{log_info, log_warn, Simulation, SimulationContext};

use crate::config::{PlatformConfig, ReplayConfig, RunConfig};
use crate::error::{ReplayError, Result};
use crate::governor::{PstateGovernor, ScheduledPstate};
use crate::monitor::{CsvEnergyWriter, EnergyMonitorActor, EnergyRecord, EnergySink};
use crate::service::{order_for_creation, ServiceDescriptor};
use crate::trace::{FileTraceSource, InMemoryTraceSource, TraceSource};
use crate::workload::{WorkloadActor, WorkloadReport};

const MONITOR_NAME: &str = "energy_monitor";
const GOVERNOR_NAME: &str = "pstate_governor";
const DRIVER_NAME: &str = "replay";

/// Outcome of a replay run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Simulation time when the last actor finished.
    pub end_time: f64,
    /// Energy records made by the monitor.
    pub records: Vec<EnergyRecord>,
    /// Energy consumed by the monitored host during the whole run.
    pub final_energy: f64,
    /// Playback reports in actor creation order.
    pub workloads: Vec<WorkloadReport>,
}

impl RunSummary {
    /// Returns the total number of overrun samples.
    pub fn drift_count(&self) -> usize {
        self.workloads.iter().map(|w| w.drift.len()).sum()
    }
}

/// Replay run ready to be executed.
pub struct Replay {
    sim: Simulation,
    monitored_host: Rc<RefCell<Host>>,
    workloads: Vec<Rc<WorkloadActor>>,
    monitor: Rc<EnergyMonitorActor>,
    reports: Rc<RefCell<Vec<Option<WorkloadReport>>>>,
    failure: Rc<RefCell<Option<ReplayError>>>,
    ctx: SimulationContext,
}

impl Replay {
    /// Builds hosts from the platform, loads traces of all services and spawns the actors.
    ///
    /// Workload actors are created in [`order_for_creation`], the energy monitor is created last.
    pub fn new(
        config: &ReplayConfig,
        platform: &PlatformConfig,
        services: Vec<ServiceDescriptor>,
        traces: &dyn TraceSource,
        sink: Box<dyn EnergySink>,
    ) -> Result<Self> {
        config.validate()?;
        platform.validate()?;

        let mut reserved: HashSet<&str> = platform.hosts.iter().map(|h| h.name.as_str()).collect();
        reserved.extend([MONITOR_NAME, GOVERNOR_NAME, DRIVER_NAME]);
        let mut names = HashSet::new();
        for service in &services {
            if reserved.contains(service.name.as_str()) {
                return Err(ReplayError::Config(format!(
                    "service name {} clashes with a platform component",
                    service.name
                )));
            }
            if !names.insert(service.name.as_str()) {
                return Err(ReplayError::Config(format!("duplicate service name {}", service.name)));
            }
        }

        let services = order_for_creation(services);
        let traces = services
            .iter()
            .map(|service| traces.load(&service.name))
            .collect::<Result<Vec<_>>>()?;

        let mut sim = Simulation::new();
        let ctx = sim.create_context(DRIVER_NAME);
        let mut hosts = HashMap::new();
        for host_config in &platform.hosts {
            let host = rc!(refcell!(Host::new(host_config, sim.create_context(&host_config.name))));
            sim.add_handler(&host_config.name, host.clone());
            hosts.insert(host_config.name.clone(), host);
        }
        let host_by_name = |name: &str| {
            hosts
                .get(name)
                .cloned()
                .ok_or_else(|| ReplayError::Config(format!("host {} is not defined", name)))
        };
        let workload_host = host_by_name(&platform.workload_host)?;
        let monitored_host = host_by_name(&platform.monitored_host)?;

        let failure = rc!(refcell!(None));
        let reports = rc!(refcell!(vec![None; services.len()]));
        let mut workloads = Vec::with_capacity(services.len());
        for (index, (service, trace)) in services.iter().zip(traces).enumerate() {
            log_info!(
                ctx,
                "creating actor {} ({} cores, {} samples) on host {}",
                service.name,
                service.core_count,
                trace.len(),
                platform.workload_host
            );
            let actor = rc!(WorkloadActor::new(
                workload_host.clone(),
                trace,
                config.sample_period,
                sim.create_context(&service.name),
            ));
            let actor_clone = actor.clone();
            let reports = reports.clone();
            sim.spawn(async move {
                let report = actor_clone.run().await;
                reports.borrow_mut()[index] = Some(report);
            });
            workloads.push(actor);
        }

        if !platform.pstate_schedule.is_empty() {
            let mut schedule = Vec::with_capacity(platform.pstate_schedule.len());
            for change in &platform.pstate_schedule {
                schedule.push(ScheduledPstate {
                    time: change.time,
                    host: host_by_name(&change.host)?,
                    pstate: change.pstate,
                });
            }
            let governor = PstateGovernor::new(schedule, sim.create_context(GOVERNOR_NAME));
            sim.spawn(async move {
                governor.run().await;
            });
        }

        log_info!(
            ctx,
            "creating actor {} on host {} monitoring host {}",
            MONITOR_NAME,
            platform.monitor_host,
            platform.monitored_host
        );
        let monitor = rc!(EnergyMonitorActor::new(
            monitored_host.clone(),
            sink,
            config.tick_interval,
            config.observation_budget,
            sim.create_context(MONITOR_NAME),
        ));
        let monitor_clone = monitor.clone();
        let monitor_failure = failure.clone();
        sim.spawn(async move {
            if let Err(e) = monitor_clone.run().await {
                *monitor_failure.borrow_mut() = Some(e);
            }
        });

        Ok(Self {
            sim,
            monitored_host,
            workloads,
            monitor,
            reports,
            failure,
            ctx,
        })
    }

    /// Returns workload actors in creation order.
    pub fn workloads(&self) -> &[Rc<WorkloadActor>] {
        &self.workloads
    }

    /// Runs the simulation until every actor finishes.
    pub fn run(mut self) -> Result<RunSummary> {
        loop {
            if let Some(e) = self.failure.borrow_mut().take() {
                return Err(e);
            }
            if !self.sim.step() {
                break;
            }
        }
        if let Some(e) = self.failure.borrow_mut().take() {
            return Err(e);
        }

        let workloads: Vec<WorkloadReport> = self.reports.borrow_mut().drain(..).flatten().collect();
        let summary = RunSummary {
            end_time: self.sim.time(),
            records: self.monitor.records(),
            final_energy: self.monitored_host.borrow().consumed_energy(),
            workloads,
        };
        log_info!(self.ctx, "total simulation time: {:.3}", summary.end_time);
        for report in &summary.workloads {
            if !report.drift.is_empty() {
                log_warn!(
                    self.ctx,
                    "service {} fell behind schedule on {} of {} samples, total overrun {:.3} s",
                    report.service,
                    report.drift.len(),
                    report.samples_played,
                    report.total_overrun()
                );
            }
        }
        Ok(summary)
    }
}

/// Runs replay with inputs and outputs located by `run`.
///
/// Platform is read from `platform_path`, timing parameters from `config_path` (defaults are used if it is not
/// given). All inputs are read before the output file is created.
pub fn run_from_files(run: &RunConfig, config_path: Option<&Path>, platform_path: &Path) -> Result<RunSummary> {
    let config = match config_path {
        Some(path) => ReplayConfig::from_file(path)?,
        None => ReplayConfig::default(),
    };
    let platform = PlatformConfig::from_file(platform_path)?;
    let services = ServiceDescriptor::from_file(&run.descriptor_path())?;
    let traces = InMemoryTraceSource::preload(
        &FileTraceSource::new(run),
        services.iter().map(|service| service.name.as_str()),
    )?;
    let sink = CsvEnergyWriter::create(&run.energy_output_path())?;
    Replay::new(&config, &platform, services, &traces, Box::new(sink))?.run()
}
