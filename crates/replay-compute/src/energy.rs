//! Energy meter calculates the host energy consumption.

/// Integrates piecewise-constant power over virtual time.
#[derive(Debug, Clone)]
pub struct EnergyMeter {
    energy_consumed: f64,
    current_power: f64,
    prev_time: f64,
}

impl EnergyMeter {
    /// Creates a meter starting at `time` with the given power.
    pub fn new(time: f64, power: f64) -> Self {
        Self {
            energy_consumed: 0.,
            current_power: power,
            prev_time: time,
        }
    }

    /// Invoked each time the host power consumption is changed to update the total energy consumption.
    pub fn update(&mut self, time: f64, power: f64) {
        self.energy_consumed = self.energy_at(time);
        self.current_power = power;
        self.prev_time = self.prev_time.max(time);
    }

    /// Returns the energy consumed up to the last update.
    pub fn energy_consumed(&self) -> f64 {
        self.energy_consumed
    }

    /// Returns the energy consumed up to `time`, assuming the power has not changed since the last update.
    pub fn energy_at(&self, time: f64) -> f64 {
        self.energy_consumed + (time - self.prev_time).max(0.) * self.current_power
    }

    /// Returns the power set by the last update.
    pub fn current_power(&self) -> f64 {
        self.current_power
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::EnergyMeter;

    #[test]
    fn test_piecewise_integration() {
        let mut meter = EnergyMeter::new(0., 100.);
        assert_abs_diff_eq!(meter.energy_at(2.), 200.);
        meter.update(2., 150.);
        assert_abs_diff_eq!(meter.energy_consumed(), 200.);
        assert_abs_diff_eq!(meter.energy_at(4.), 500.);
        meter.update(5., 0.);
        assert_abs_diff_eq!(meter.energy_consumed(), 650.);
        assert_abs_diff_eq!(meter.energy_at(100.), 650.);
    }

    #[test]
    fn test_reading_does_not_change_state() {
        let meter = EnergyMeter::new(1., 10.);
        assert_abs_diff_eq!(meter.energy_at(3.), 20.);
        assert_abs_diff_eq!(meter.energy_at(3.), 20.);
        assert_abs_diff_eq!(meter.energy_at(0.5), 0.);
        assert_eq!(meter.energy_consumed(), 0.);
    }
}
