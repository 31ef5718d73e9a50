//! Run configuration.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use replay_compute::host::HostConfig;

use crate::error::{ReplayError, Result};

/// Identifies a replay run and builds the paths of its inputs and outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Tested system, e.g. `sockshop`.
    pub system: String,
    /// Load scenario.
    pub scenario: String,
    /// Number of users.
    pub users: String,
    /// Repetition of the recorded experiment.
    pub repetition: String,
    /// Replay run.
    pub run: String,
    /// Root directory of recorded traces.
    pub traces_root: PathBuf,
    /// Root directory of replay outputs.
    pub output_root: PathBuf,
}

impl RunConfig {
    /// Creates run config with default `traces` and `outputs` roots.
    pub fn new(system: &str, scenario: &str, users: &str, repetition: &str, run: &str) -> Self {
        Self {
            system: system.to_string(),
            scenario: scenario.to_string(),
            users: users.to_string(),
            repetition: repetition.to_string(),
            run: run.to_string(),
            traces_root: PathBuf::from("traces"),
            output_root: PathBuf::from("outputs"),
        }
    }

    /// Sets the root directory of recorded traces.
    pub fn with_traces_root(mut self, traces_root: impl Into<PathBuf>) -> Self {
        self.traces_root = traces_root.into();
        self
    }

    /// Sets the root directory of replay outputs.
    pub fn with_output_root(mut self, output_root: impl Into<PathBuf>) -> Self {
        self.output_root = output_root.into();
        self
    }

    fn experiment_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.system)
            .join(&self.scenario)
            .join(&self.users)
            .join(&self.repetition)
    }

    /// Returns the path of the service descriptor file.
    pub fn descriptor_path(&self) -> PathBuf {
        self.experiment_dir(&self.traces_root).join("services-overview.data")
    }

    /// Returns the path of the CPU usage trace of a service.
    pub fn trace_path(&self, service: &str) -> PathBuf {
        self.experiment_dir(&self.traces_root)
            .join("services")
            .join(format!("{}_cpu_usage.data", service))
    }

    /// Returns the directory where outputs of this run are stored.
    pub fn output_dir(&self) -> PathBuf {
        self.experiment_dir(&self.output_root).join(&self.run)
    }

    /// Returns the path of the energy output series.
    pub fn energy_output_path(&self) -> PathBuf {
        self.output_dir().join("energy.data")
    }

    /// Returns the default platform description path.
    pub fn default_platform_path(&self) -> PathBuf {
        self.traces_root.join("platform.yaml")
    }
}

fn read_yaml<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).map_err(|e| ReplayError::io(path, e))?;
    serde_yaml::from_str(&text).map_err(|e| ReplayError::Yaml {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Holds raw replay config parsed from YAML file.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize, Clone)]
struct RawReplayConfig {
    pub sample_period: Option<f64>,
    pub tick_interval: Option<f64>,
    pub observation_budget: Option<f64>,
}

/// Timing parameters of workload playback and energy monitoring.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct ReplayConfig {
    /// Virtual duration in seconds represented by one trace sample.
    pub sample_period: f64,
    /// Interval in seconds between energy records.
    pub tick_interval: f64,
    /// Virtual time in seconds after which the energy monitor stops.
    pub observation_budget: f64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self::from_raw(RawReplayConfig::default())
    }
}

impl ReplayConfig {
    fn from_raw(raw: RawReplayConfig) -> Self {
        Self {
            sample_period: raw.sample_period.unwrap_or(5.),
            tick_interval: raw.tick_interval.unwrap_or(1.),
            observation_budget: raw.observation_budget.unwrap_or(300.),
        }
    }

    /// Creates replay config by reading parameter values from YAML file
    /// (uses default values if some parameters are absent).
    pub fn from_file(path: &Path) -> Result<Self> {
        let config = Self::from_raw(read_yaml(path)?);
        config.validate()?;
        Ok(config)
    }

    /// Checks that all durations are positive (the observation budget may be zero).
    pub fn validate(&self) -> Result<()> {
        if !(self.sample_period.is_finite() && self.sample_period > 0.) {
            return Err(ReplayError::Config(format!(
                "sample period must be positive, got {}",
                self.sample_period
            )));
        }
        if !(self.tick_interval.is_finite() && self.tick_interval > 0.) {
            return Err(ReplayError::Config(format!(
                "tick interval must be positive, got {}",
                self.tick_interval
            )));
        }
        if !(self.observation_budget.is_finite() && self.observation_budget >= 0.) {
            return Err(ReplayError::Config(format!(
                "observation budget must be non-negative, got {}",
                self.observation_budget
            )));
        }
        Ok(())
    }
}

/// Switch of host performance state at a given time.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct PstateChange {
    /// Virtual time of the switch.
    pub time: f64,
    /// Host name.
    pub host: String,
    /// New performance state index.
    pub pstate: usize,
}

/// Holds raw platform description parsed from YAML file.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
struct RawPlatformConfig {
    pub hosts: Option<Vec<HostConfig>>,
    pub workload_host: Option<String>,
    pub monitor_host: Option<String>,
    pub monitored_host: Option<String>,
    pub pstate_schedule: Option<Vec<PstateChange>>,
}

/// Simulated platform: hosts and placement of actors.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct PlatformConfig {
    /// Host descriptions.
    pub hosts: Vec<HostConfig>,
    /// Host where workload actors run their computations.
    pub workload_host: String,
    /// Host where the energy monitor actor is placed.
    pub monitor_host: String,
    /// Host whose energy consumption is recorded.
    pub monitored_host: String,
    /// Performance state switches applied during the run.
    pub pstate_schedule: Vec<PstateChange>,
}

impl PlatformConfig {
    /// Creates platform with given hosts and default actor placement.
    pub fn new(hosts: Vec<HostConfig>) -> Self {
        Self::from_raw(RawPlatformConfig {
            hosts: Some(hosts),
            workload_host: None,
            monitor_host: None,
            monitored_host: None,
            pstate_schedule: None,
        })
    }

    fn from_raw(raw: RawPlatformConfig) -> Self {
        Self {
            hosts: raw.hosts.unwrap_or_default(),
            workload_host: raw.workload_host.unwrap_or_else(|| "host1".to_string()),
            monitor_host: raw.monitor_host.unwrap_or_else(|| "host3".to_string()),
            monitored_host: raw.monitored_host.unwrap_or_else(|| "host1".to_string()),
            pstate_schedule: raw.pstate_schedule.unwrap_or_default(),
        }
    }

    /// Reads platform description from YAML file and validates it.
    pub fn from_file(path: &Path) -> Result<Self> {
        let platform = Self::from_raw(read_yaml(path)?);
        platform.validate()?;
        Ok(platform)
    }

    /// Parses platform description from YAML string and validates it.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let raw = serde_yaml::from_str(text).map_err(|e| ReplayError::Yaml {
            path: PathBuf::from("<string>"),
            source: e,
        })?;
        let platform = Self::from_raw(raw);
        platform.validate()?;
        Ok(platform)
    }

    /// Returns the description of host with given name.
    pub fn host(&self, name: &str) -> Option<&HostConfig> {
        self.hosts.iter().find(|host| host.name == name)
    }

    /// Checks host descriptions and that all referenced hosts exist.
    pub fn validate(&self) -> Result<()> {
        if self.hosts.is_empty() {
            return Err(ReplayError::Config("platform has no hosts".to_string()));
        }
        let mut names = HashSet::new();
        for host in &self.hosts {
            host.validate().map_err(ReplayError::Config)?;
            if !names.insert(host.name.as_str()) {
                return Err(ReplayError::Config(format!("duplicate host name {}", host.name)));
            }
        }
        for (role, name) in [
            ("workload", &self.workload_host),
            ("monitor", &self.monitor_host),
            ("monitored", &self.monitored_host),
        ] {
            if self.host(name).is_none() {
                return Err(ReplayError::Config(format!("{} host {} is not defined", role, name)));
            }
        }
        for change in &self.pstate_schedule {
            let host = self.host(&change.host).ok_or_else(|| {
                ReplayError::Config(format!("pstate change refers to unknown host {}", change.host))
            })?;
            if change.pstate >= host.pstates.len() {
                return Err(ReplayError::Config(format!(
                    "pstate {} is out of range for host {}",
                    change.pstate, change.host
                )));
            }
            if !(change.time.is_finite() && change.time >= 0.) {
                return Err(ReplayError::Config(format!(
                    "pstate change time must be non-negative, got {}",
                    change.time
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLATFORM: &str = r#"
hosts:
  - name: host1
    cores: 4
    pstates:
      - speed: 1.0e9
        power: {idle: 100.0, min: 120.0, max: 200.0}
  - name: host3
    cores: 1
    pstates:
      - speed: 1.0e9
        power: {idle: 10.0, min: 10.0, max: 20.0}
"#;

    #[test]
    fn test_paths() {
        let run = RunConfig::new("sockshop", "A", "100", "1", "2")
            .with_traces_root("/data/traces")
            .with_output_root("/data/outputs");
        assert_eq!(
            run.descriptor_path(),
            PathBuf::from("/data/traces/sockshop/A/100/1/services-overview.data")
        );
        assert_eq!(
            run.trace_path("carts"),
            PathBuf::from("/data/traces/sockshop/A/100/1/services/carts_cpu_usage.data")
        );
        assert_eq!(
            run.energy_output_path(),
            PathBuf::from("/data/outputs/sockshop/A/100/1/2/energy.data")
        );
    }

    #[test]
    fn test_replay_config_defaults() {
        let config = ReplayConfig::default();
        assert_eq!(config.sample_period, 5.);
        assert_eq!(config.tick_interval, 1.);
        assert_eq!(config.observation_budget, 300.);
        assert!(config.validate().is_ok());

        let raw: RawReplayConfig = serde_yaml::from_str("tick_interval: 0.5").unwrap();
        let config = ReplayConfig::from_raw(raw);
        assert_eq!(config.tick_interval, 0.5);
        assert_eq!(config.sample_period, 5.);
    }

    #[test]
    fn test_invalid_replay_config() {
        let config = ReplayConfig {
            sample_period: 0.,
            ..ReplayConfig::default()
        };
        assert!(matches!(config.validate(), Err(ReplayError::Config(_))));
    }

    #[test]
    fn test_platform_defaults() {
        let platform = PlatformConfig::from_yaml(PLATFORM).unwrap();
        assert_eq!(platform.hosts.len(), 2);
        assert_eq!(platform.workload_host, "host1");
        assert_eq!(platform.monitor_host, "host3");
        assert_eq!(platform.monitored_host, "host1");
        assert!(platform.pstate_schedule.is_empty());
        assert_eq!(platform.host("host1").unwrap().cores, 4);
    }

    #[test]
    fn test_platform_validation() {
        let mut platform = PlatformConfig::from_yaml(PLATFORM).unwrap();
        platform.workload_host = "host2".to_string();
        assert!(matches!(platform.validate(), Err(ReplayError::Config(_))));

        let mut platform = PlatformConfig::from_yaml(PLATFORM).unwrap();
        platform.pstate_schedule.push(PstateChange {
            time: 10.,
            host: "host1".to_string(),
            pstate: 1,
        });
        assert!(matches!(platform.validate(), Err(ReplayError::Config(_))));

        assert!(matches!(PlatformConfig::from_yaml("hosts: []"), Err(ReplayError::Config(_))));
        assert!(matches!(PlatformConfig::from_yaml("hosts: 5"), Err(ReplayError::Yaml { .. })));
    }
}
