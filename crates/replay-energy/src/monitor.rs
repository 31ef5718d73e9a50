//! Periodic recording of host energy consumption.

use std::cell::RefCell;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::Serialize;

use replay_compute::host::Host;
use replay_core::{log_debug, log_warn, SimulationContext};

use crate::error::{ReplayError, Result};

/// Cumulative energy consumption of the monitored host at some moment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnergyRecord {
    /// Virtual seconds since the monitor start.
    pub t: f64,
    /// Energy in J consumed since the simulation start.
    pub total_energy: f64,
}

/// Destination of energy records.
pub trait EnergySink {
    /// Appends record, it must be persisted before returning.
    fn append(&mut self, record: &EnergyRecord) -> Result<()>;
}

/// Writes energy records as CSV with `t,total_energy` header.
pub struct CsvEnergyWriter<W: Write> {
    writer: csv::Writer<W>,
    path: PathBuf,
}

impl<W: Write> CsvEnergyWriter<W> {
    /// Creates writer and writes the header, `path` is used in error messages.
    pub fn new(inner: W, path: &Path) -> Result<Self> {
        let mut writer = Self {
            writer: csv::Writer::from_writer(inner),
            path: path.to_path_buf(),
        };
        writer.write_row(["t", "total_energy"])?;
        Ok(writer)
    }

    fn write_row<I, T>(&mut self, row: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.writer.write_record(row).map_err(|e| ReplayError::Csv {
            path: self.path.clone(),
            source: e,
        })?;
        self.writer.flush().map_err(|e| ReplayError::io(&self.path, e))
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        let path = self.path;
        self.writer
            .into_inner()
            .map_err(|e| ReplayError::io(path, e.into_error()))
    }
}

impl CsvEnergyWriter<File> {
    /// Creates file (and its parent directories) and writes the header.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| ReplayError::io(dir, e))?;
        }
        let file = File::create(path).map_err(|e| ReplayError::io(path, e))?;
        Self::new(file, path)
    }
}

impl<W: Write> EnergySink for CsvEnergyWriter<W> {
    fn append(&mut self, record: &EnergyRecord) -> Result<()> {
        self.write_row([format!("{:.6}", record.t), format!("{:.6}", record.total_energy)])
    }
}

/// Keeps energy records in memory.
#[derive(Clone, Default)]
pub struct MemoryEnergySink {
    records: Rc<RefCell<Vec<EnergyRecord>>>,
}

impl MemoryEnergySink {
    /// Creates empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns records appended so far, including those appended through clones of this sink.
    pub fn records(&self) -> Vec<EnergyRecord> {
        self.records.borrow().clone()
    }
}

impl EnergySink for MemoryEnergySink {
    fn append(&mut self, record: &EnergyRecord) -> Result<()> {
        self.records.borrow_mut().push(*record);
        Ok(())
    }
}

/// Actor recording energy consumption of a host every `tick_interval` seconds.
///
/// The monitor stops once more than `observation_budget` seconds have passed since its start, so with the
/// budget being a multiple of the interval the last record is made exactly at the budget.
pub struct EnergyMonitorActor {
    host: Rc<RefCell<Host>>,
    sink: RefCell<Box<dyn EnergySink>>,
    records: RefCell<Vec<EnergyRecord>>,
    tick_interval: f64,
    observation_budget: f64,
    ctx: SimulationContext,
}

impl EnergyMonitorActor {
    /// Creates monitor of `host` writing records to `sink`.
    pub fn new(
        host: Rc<RefCell<Host>>,
        sink: Box<dyn EnergySink>,
        tick_interval: f64,
        observation_budget: f64,
        ctx: SimulationContext,
    ) -> Self {
        assert!(tick_interval > 0., "Tick interval must be positive");
        Self {
            host,
            sink: RefCell::new(sink),
            records: RefCell::new(Vec::new()),
            tick_interval,
            observation_budget,
            ctx,
        }
    }

    /// Returns records made so far.
    pub fn records(&self) -> Vec<EnergyRecord> {
        self.records.borrow().clone()
    }

    /// Records energy until the observation budget is exhausted.
    ///
    /// Stops at the first sink failure.
    pub async fn run(&self) -> Result<()> {
        let start = self.ctx.time();
        log_debug!(self.ctx, "monitoring host {}", self.host.borrow().name());
        loop {
            let tick_start = self.ctx.time();
            let elapsed = tick_start - start;
            if elapsed > self.observation_budget {
                break;
            }
            let record = EnergyRecord {
                t: elapsed,
                total_energy: self.host.borrow().consumed_energy(),
            };
            self.sink.borrow_mut().append(&record)?;
            self.records.borrow_mut().push(record);

            let sleep_duration = self.tick_interval - (self.ctx.time() - tick_start);
            if sleep_duration < 0. {
                log_warn!(self.ctx, "tick overran the interval by {:.6} s", -sleep_duration);
            }
            self.ctx.sleep(sleep_duration.max(0.)).await;
        }
        log_debug!(self.ctx, "finished after {} records", self.records.borrow().len());
        Ok(())
    }
}
