//! Power consumption models.

use dyn_clone::{clone_trait_object, DynClone};

/// A model for estimating the power consumption of CPU based on its utilization.
/// Can also be used to model the power consumption of a whole host based on CPU utilization.
pub trait CpuPowerModel: DynClone {
    /// Returns CPU power consumption in W.
    ///
    /// CPU utilization should be passed as a float in 0.0-1.0 range.
    fn get_power(&self, utilization: f64) -> f64;
}

clone_trait_object!(CpuPowerModel);

/// A power model based on linear interpolation between the minimum and maximum power consumption values.
#[derive(Clone)]
pub struct LinearCpuPowerModel {
    min_power: f64,
    factor: f64,
}

impl LinearCpuPowerModel {
    /// Creates a linear power model.
    ///
    /// * `min_power` - The minimum power consumption in W (at the smallest non-zero utilization).
    /// * `max_power` - The maximum power consumption in W (at 100% utilization).
    pub fn new(min_power: f64, max_power: f64) -> Self {
        Self {
            min_power,
            factor: max_power - min_power,
        }
    }
}

impl CpuPowerModel for LinearCpuPowerModel {
    fn get_power(&self, utilization: f64) -> f64 {
        self.min_power + self.factor * utilization
    }
}

/// Computes the host power consumption from its CPU utilization.
///
/// If idle power is set, it is used when the host is completely idle (utilization is exactly 0),
/// otherwise the CPU model is used for all utilization values.
#[derive(Clone)]
pub struct HostPowerModel {
    cpu_power_model: Box<dyn CpuPowerModel>,
    idle_power: Option<f64>,
}

impl HostPowerModel {
    /// Creates host power model driven by the given CPU model.
    pub fn new(cpu_power_model: Box<dyn CpuPowerModel>) -> Self {
        Self {
            cpu_power_model,
            idle_power: None,
        }
    }

    /// Sets the power consumption of idle host.
    pub fn with_idle_power(mut self, idle_power: f64) -> Self {
        self.idle_power = Some(idle_power);
        self
    }

    /// Returns the host power consumption in W.
    pub fn get_power(&self, utilization: f64) -> f64 {
        match self.idle_power {
            Some(idle_power) if utilization == 0. => idle_power,
            _ => self.cpu_power_model.get_power(utilization),
        }
    }
}
