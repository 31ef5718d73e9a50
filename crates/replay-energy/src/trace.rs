//! CPU usage traces of services.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::config::RunConfig;
use crate::error::{ReplayError, Result};

/// Ordered sequence of CPU load samples of one service.
///
/// Each sample is the number of cores used on average during one sample period.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trace {
    samples: Vec<f64>,
}

impl Trace {
    /// Creates trace from samples.
    ///
    /// Panics if some sample is negative or not finite.
    pub fn new(samples: Vec<f64>) -> Self {
        assert!(
            samples.iter().all(|s| s.is_finite() && *s >= 0.),
            "Trace samples must be finite non-negative numbers"
        );
        Self { samples }
    }

    /// Parses trace with one sample per line, `origin` is used in error messages.
    pub fn parse<R: BufRead>(reader: R, origin: &Path) -> Result<Self> {
        let mut samples = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line_number = i as u64 + 1;
            let line = line.map_err(|e| ReplayError::io(origin, e))?;
            let value = line.trim();
            if value.is_empty() {
                return Err(ReplayError::parse(origin, line_number, "empty line"));
            }
            let sample = value
                .parse::<f64>()
                .map_err(|e| ReplayError::parse(origin, line_number, format!("invalid sample {:?}: {}", value, e)))?;
            if !sample.is_finite() || sample < 0. {
                return Err(ReplayError::parse(
                    origin,
                    line_number,
                    format!("sample must be a finite non-negative number, got {}", value),
                ));
            }
            samples.push(sample);
        }
        Ok(Self { samples })
    }

    /// Reads trace from file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| ReplayError::io(path, e))?;
        Self::parse(BufReader::new(file), path)
    }

    /// Returns the number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the trace has no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Iterates over samples in playback order.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }

    /// Returns the samples.
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }
}

/// Provides traces of services.
pub trait TraceSource {
    /// Loads trace of the service with given name.
    fn load(&self, service: &str) -> Result<Trace>;
}

/// Reads traces from the recorded experiment directory.
pub struct FileTraceSource {
    run: RunConfig,
}

impl FileTraceSource {
    /// Creates source reading traces of the given run.
    pub fn new(run: &RunConfig) -> Self {
        Self { run: run.clone() }
    }

    /// Returns the trace path of a service.
    pub fn path(&self, service: &str) -> PathBuf {
        self.run.trace_path(service)
    }
}

impl TraceSource for FileTraceSource {
    fn load(&self, service: &str) -> Result<Trace> {
        Trace::from_file(&self.path(service))
    }
}

/// Keeps traces in memory.
#[derive(Default)]
pub struct InMemoryTraceSource {
    traces: HashMap<String, Trace>,
}

impl InMemoryTraceSource {
    /// Creates empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds trace of a service, replacing the previous one.
    pub fn insert(&mut self, service: &str, trace: Trace) {
        self.traces.insert(service.to_string(), trace);
    }

    /// Adds trace of a service.
    pub fn with_trace(mut self, service: &str, samples: Vec<f64>) -> Self {
        self.insert(service, Trace::new(samples));
        self
    }

    /// Loads traces of all given services from another source.
    pub fn preload<'a>(source: &dyn TraceSource, services: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut result = Self::new();
        for service in services {
            result.insert(service, source.load(service)?);
        }
        Ok(result)
    }
}

impl TraceSource for InMemoryTraceSource {
    fn load(&self, service: &str) -> Result<Trace> {
        self.traces
            .get(service)
            .cloned()
            .ok_or_else(|| ReplayError::Config(format!("no trace for service {}", service)))
    }
}
