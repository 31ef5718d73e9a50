//! Replay of recorded service CPU usage traces on a simulated host with energy monitoring.
//!
//! Every service of the recorded system is played by a [`workload::WorkloadActor`], which turns trace samples
//! into computations on the workload host. An [`monitor::EnergyMonitorActor`] periodically records the
//! cumulative energy consumption of the monitored host. [`driver::Replay`] wires them together.

#![warn(missing_docs)]

pub mod config;
pub mod driver;
pub mod error;
pub mod governor;
pub mod monitor;
pub mod service;
pub mod trace;
pub mod workload;

pub use config::{PlatformConfig, ReplayConfig, RunConfig};
pub use driver::{run_from_files, Replay, RunSummary};
pub use error::ReplayError;
