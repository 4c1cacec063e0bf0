// SPDX-License-Identifier: GPL-2.0
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! Must-gather archive resolution and object loading.
//!
//! A top-level must-gather directory holds one image directory named after
//! the collector, e.g.
//! `must-gather/quay-io-...-performance-addon-operator-must-gather-sha256-<sha>`,
//! and everything this tool needs lives inside it: cluster-scoped Node and
//! MachineConfigPool YAML objects plus one `sysinfo.tgz` hardware snapshot
//! per node. Resolution never guesses, zero or multiple candidates for a
//! path is a lookup failure.

use glob::glob;
use log::debug;
use serde::de::DeserializeOwned;
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::k8s::{MachineConfigPool, Node};

/// Subpath holding cluster-scoped definitions saved by must-gather.
pub const CLUSTER_SCOPED_RESOURCES: &str = "cluster-scoped-resources";
/// Subpath, relative to [`CLUSTER_SCOPED_RESOURCES`], holding Node objects.
pub const CORE_NODES: &str = "core/nodes";
/// Subpath, relative to [`CLUSTER_SCOPED_RESOURCES`], holding the machine
/// config pool definitions.
pub const MC_POOLS: &str = "machineconfiguration.openshift.io/machineconfigpools";
/// Extension of the YAML files saved by must-gather.
pub const YAML_SUFFIX: &str = ".yaml";
/// Subpath, relative to the image directory, holding per-node data.
pub const NODES: &str = "nodes";
/// Name of the per-node hardware snapshot archive.
pub const SYS_INFO_FILE_NAME: &str = "sysinfo.tgz";

/// The image directory is matched by substring, whatever registry prefix
/// and SHA the collector image carries.
const IMAGE_DIR_GLOB: &str = "*performance-addon-operator-must-gather*";

/// Resolve `suffix` inside the single image directory under `root`.
pub fn full_path(root: &Path, suffix: &str) -> Result<PathBuf> {
    let pattern = format!("{}/{}/{}", root.display(), IMAGE_DIR_GLOB, suffix);
    let mut paths: Vec<PathBuf> = glob(&pattern)
        .map_err(|e| Error::internal(format!("bad glob pattern {}: {}", pattern, e)))?
        .filter_map(std::result::Result::ok)
        .collect();

    match paths.len() {
        0 => Err(Error::lookup(format!(
            "no match for must-gather path {:?} and suffix {:?}",
            root, suffix
        ))),
        1 => {
            let path = paths.remove(0);
            debug!("resolved {:?} to {:?}", suffix, path);
            Ok(path)
        }
        n => Err(Error::lookup(format!(
            "{} matches for must-gather path {:?} and suffix {:?}, expected exactly one {} directory",
            n, root, suffix, IMAGE_DIR_GLOB
        ))),
    }
}

/// Load the Node object named `node_name`.
pub fn node(root: &Path, node_name: &str) -> Result<Node> {
    let suffix = format!("{}/{}/{}", CLUSTER_SCOPED_RESOURCES, CORE_NODES, node_name);
    load_yaml(&full_path(root, &suffix)?)
}

/// Load every Node object saved in the must-gather, sorted by file name so
/// the sequence is deterministic.
pub fn node_list(root: &Path) -> Result<Vec<Node>> {
    let suffix = format!("{}/{}", CLUSTER_SCOPED_RESOURCES, CORE_NODES);
    let dir = full_path(root, &suffix)?;

    let mut names = Vec::new();
    for entry in fs::read_dir(&dir).map_err(|e| Error::input(&dir, e))? {
        let entry = entry.map_err(|e| Error::input(&dir, e))?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();

    names.iter().map(|name| load_yaml(&dir.join(name))).collect()
}

/// Load the MachineConfigPool object named `mcp_name`.
pub fn machine_config_pool(root: &Path, mcp_name: &str) -> Result<MachineConfigPool> {
    let suffix = format!(
        "{}/{}/{}{}",
        CLUSTER_SCOPED_RESOURCES, MC_POOLS, mcp_name, YAML_SUFFIX
    );
    load_yaml(&full_path(root, &suffix)?)
}

/// Resolve the hardware snapshot archive collected for `node_name`.
pub fn snapshot_path(root: &Path, node_name: &str) -> Result<PathBuf> {
    let dir = full_path(root, NODES)?;
    let path = dir.join(node_name).join(SYS_INFO_FILE_NAME);
    fs::metadata(&path).map_err(|e| Error::input(&path, e))?;
    Ok(path)
}

fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| Error::input(path, e))?;
    serde_yaml::from_reader(file)
        .map_err(|e| Error::parse(format!("{}: {}", path.display(), e)))
}
