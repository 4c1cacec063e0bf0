// SPDX-License-Identifier: GPL-2.0
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! Hardware inventory access.
//!
//! The partitioner only ever sees [`CpuInfo`] and [`Topology`] values, so
//! where they come from is a capability behind the [`Inventory`] trait:
//! [`Snapshot`] serves a captured `sysinfo.tgz` archive, [`LiveHost`] the
//! running machine's `/proc` and `/sys` trees.

use flate2::read::GzDecoder;
use log::debug;
use std::fs::File;
use std::path::Path;
use tempfile::TempDir;

use crate::cpuinfo::CpuInfo;
use crate::error::{Error, Result};
use crate::topology::Topology;

/// A source of CPU and topology information.
pub trait Inventory {
    /// Directory under which the `proc/` and `sys/` trees live.
    fn root(&self) -> &Path;

    /// Read the per-processor capability records.
    fn cpu_info(&self) -> Result<CpuInfo> {
        CpuInfo::from_sys_root(self.root())
    }

    /// Read and normalize the machine topology.
    fn topology(&self) -> Result<Topology> {
        Topology::from_sys_root(self.root())
    }
}

/// Inventory of the machine this process runs on.
#[derive(Debug, Default)]
pub struct LiveHost;

impl Inventory for LiveHost {
    fn root(&self) -> &Path {
        Path::new("/")
    }
}

/// Inventory captured in a gzipped tar snapshot of `proc/` and `sys/`.
///
/// The archive is unpacked into a private temporary directory that lives
/// as long as this value.
#[derive(Debug)]
pub struct Snapshot {
    unpacked: TempDir,
}

impl Snapshot {
    /// Unpack the `sysinfo.tgz` style archive at `path`.
    pub fn unpack(path: &Path) -> Result<Snapshot> {
        let file = File::open(path).map_err(|e| Error::input(path, e))?;
        let unpacked = TempDir::new().map_err(|e| Error::input(path, e))?;

        tar::Archive::new(GzDecoder::new(file))
            .unpack(unpacked.path())
            .map_err(|e| {
                Error::parse(format!("malformed snapshot {}: {}", path.display(), e))
            })?;
        debug!("unpacked snapshot {:?} into {:?}", path, unpacked.path());

        Ok(Snapshot { unpacked })
    }
}

impl Inventory for Snapshot {
    fn root(&self) -> &Path {
        self.unpacked.path()
    }
}
