// SPDX-License-Identifier: GPL-2.0
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! Per-processor capability records, read from `proc/cpuinfo`.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Capability flag advertised by hyperthreading-capable processors.
const HT_FLAG: &str = "ht";

/// One logical processor as reported by `proc/cpuinfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Processor {
    id: usize,
    capabilities: Vec<String>,
}

impl Processor {
    /// Get the ID of this processor.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Get the capability flags of this processor.
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }
}

/// The machine's logical processors in the order the kernel reported them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuInfo {
    processors: Vec<Processor>,
}

impl CpuInfo {
    /// Read CPU info from the `proc/` tree under `root`.
    pub fn from_sys_root(root: &Path) -> Result<CpuInfo> {
        let path = root.join("proc/cpuinfo");
        let raw = fs::read_to_string(&path).map_err(|e| Error::input(&path, e))?;
        CpuInfo::parse(&raw)
    }

    fn parse(raw: &str) -> Result<CpuInfo> {
        let mut processors = Vec::new();
        for block in raw.split("\n\n") {
            let mut id = None;
            let mut capabilities = Vec::new();
            for line in block.lines() {
                let Some((key, value)) = line.split_once(':') else {
                    continue;
                };
                match key.trim() {
                    "processor" => {
                        id = Some(value.trim().parse::<usize>().map_err(|_| {
                            Error::parse(format!(
                                "invalid processor id {:?} in cpuinfo",
                                value.trim()
                            ))
                        })?);
                    }
                    "flags" => {
                        capabilities = value.split_whitespace().map(str::to_owned).collect();
                    }
                    _ => {}
                }
            }
            // Blocks without a processor key are trailers, not processors.
            if let Some(id) = id {
                processors.push(Processor { id, capabilities });
            }
        }

        Ok(CpuInfo { processors })
    }

    /// Get the processors, in raw kernel order.
    pub fn processors(&self) -> &[Processor] {
        &self.processors
    }

    /// Whether hyperthreading is active on this machine.
    ///
    /// Capability flags cannot be disabled per processor, only system wide,
    /// so the first reported processor stands in for the whole machine.
    /// Per-core SMT state differences are not detected.
    pub fn smt_active(&self) -> Result<bool> {
        let first = self
            .processors
            .first()
            .ok_or_else(|| Error::internal("no processor data in CPU info"))?;
        Ok(first.capabilities.iter().any(|cap| cap == HT_FLAG))
    }
}
