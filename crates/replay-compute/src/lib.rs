//! Model of a simulated compute host for workload replay.
//!
//! - [`host::Host`]: multi-core host with performance states, runs computations requested by actors and
//! accounts its energy consumption.
//! - [`fair_sharing::FairShareModel`]: fair sharing of host cores between concurrent computations.
//! - [`power`]: power consumption models.
//! - [`energy::EnergyMeter`]: integration of piecewise-constant power over virtual time.

#![warn(missing_docs)]

pub mod energy;
pub mod fair_sharing;
pub mod host;
pub mod power;
