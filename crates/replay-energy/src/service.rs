//! Service descriptors.

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};

use crate::error::{ReplayError, Result};

/// Service of the recorded system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Service name, unique within the run.
    pub name: String,
    /// Number of cores allocated to the service.
    pub core_count: u32,
    /// Allocated memory.
    pub memory: u64,
}

impl ServiceDescriptor {
    /// Parses descriptors from lines of the form `<name> <core_count> <memory>`.
    pub fn parse<R: Read>(reader: R, origin: &Path) -> Result<Vec<Self>> {
        let mut reader = ReaderBuilder::new()
            .delimiter(b' ')
            .has_headers(false)
            .trim(Trim::All)
            .from_reader(reader);
        let mut services: Vec<Self> = Vec::new();
        let mut names = HashSet::new();
        let mut record = StringRecord::new();
        loop {
            let has_record = reader.read_record(&mut record).map_err(|e| {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                ReplayError::parse(origin, line, e.to_string())
            })?;
            if !has_record {
                break;
            }
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            let service: Self = record
                .deserialize(None)
                .map_err(|e| ReplayError::parse(origin, line, e.to_string()))?;
            if service.core_count == 0 {
                return Err(ReplayError::parse(
                    origin,
                    line,
                    format!("service {} has zero cores", service.name),
                ));
            }
            if service.memory == 0 {
                return Err(ReplayError::parse(
                    origin,
                    line,
                    format!("service {} has zero memory", service.name),
                ));
            }
            if !names.insert(service.name.clone()) {
                return Err(ReplayError::Config(format!("duplicate service name {}", service.name)));
            }
            services.push(service);
        }
        Ok(services)
    }

    /// Reads descriptors from file.
    pub fn from_file(path: &Path) -> Result<Vec<Self>> {
        let file = File::open(path).map_err(|e| ReplayError::io(path, e))?;
        Self::parse(file, path)
    }
}

/// Orders services for actor creation: by core count, largest first, keeping file order for equal counts.
pub fn order_for_creation(mut services: Vec<ServiceDescriptor>) -> Vec<ServiceDescriptor> {
    services.sort_by(|a, b| b.core_count.cmp(&a.core_count));
    services
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Vec<ServiceDescriptor>> {
        ServiceDescriptor::parse(text.as_bytes(), Path::new("services-overview.data"))
    }

    #[test]
    fn test_parse() {
        let services = parse("carts 2 1024\norders 4 2048\n").unwrap();
        assert_eq!(
            services,
            vec![
                ServiceDescriptor {
                    name: "carts".to_string(),
                    core_count: 2,
                    memory: 1024,
                },
                ServiceDescriptor {
                    name: "orders".to_string(),
                    core_count: 4,
                    memory: 2048,
                },
            ]
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse("carts two 1024\n"), Err(ReplayError::Parse { line: 1, .. })));
        assert!(matches!(parse("carts 2 1024\norders 0 10\n"), Err(ReplayError::Parse { line: 2, .. })));
        assert!(matches!(parse("carts 2 1024\ncarts 4 10\n"), Err(ReplayError::Config(_))));
        assert!(matches!(parse("a 1 0\n"), Err(ReplayError::Parse { line: 1, .. })));
        assert!(matches!(parse("carts 2 1024\norders 1 0\n"), Err(ReplayError::Parse { line: 2, .. })));
    }

    #[test]
    fn test_creation_order_is_stable() {
        let services = parse("a 1 1\nb 4 1\nc 2 1\nd 4 1\ne 1 1\n").unwrap();
        let names: Vec<String> = order_for_creation(services).into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["b", "d", "c", "a", "e"]);
    }
}
