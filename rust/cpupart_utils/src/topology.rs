// SPDX-License-Identifier: GPL-2.0
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! # Topology
//!
//! Models a machine's CPU hierarchy for partitioning purposes. A Topology
//! is comprised of one or more NUMA [`Node`] objects, each holding one or
//! more physical [`Core`] objects, each exposing one or more logical
//! processors (more than one when hyperthreading is active).
//!
//! Topologies are normalized at construction into one deterministic total
//! order: nodes ascending by id, logical processors ascending within each
//! core, and cores within a node ascending by their lowest logical
//! processor id. Everything downstream (most importantly the partitioner's
//! assignment walk) relies on that order, so a `Topology` is read-only once
//! built. Loaders may hand in nodes and cores in any order.

use glob::glob;
use log::debug;
use sscanf::sscanf;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::cpumask::{read_cpulist, Cpumask};
use crate::error::{Error, Result};

/// One physical core and the logical processors it exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Core {
    id: usize,
    logical_processors: Vec<usize>,
}

impl Core {
    pub fn new(id: usize, logical_processors: Vec<usize>) -> Core {
        Core {
            id,
            logical_processors,
        }
    }

    /// Get the ID of this Core.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Get the logical processor ids of this Core, ascending once the
    /// owning Topology is built.
    pub fn logical_processors(&self) -> &[usize] {
        &self.logical_processors
    }
}

/// One NUMA node and the cores it contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    id: usize,
    cores: Vec<Core>,
}

impl Node {
    pub fn new(id: usize, cores: Vec<Core>) -> Node {
        Node { id, cores }
    }

    /// Get the ID of this NUMA node.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Get the cores inside this NUMA node.
    pub fn cores(&self) -> &[Core] {
        &self.cores
    }
}

/// A validated, normalized machine topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    nodes: Vec<Node>,
    span: Cpumask,
    nr_cpus: usize,
}

impl Topology {
    /// Build a Topology from arbitrarily-ordered nodes.
    ///
    /// Rejects topologies with no nodes, nodes with no cores, cores with no
    /// logical processors and logical processor ids that appear more than
    /// once. Accepted input is reordered into the canonical order described
    /// in the module docs; construction is idempotent, so rebuilding from
    /// an already-normalized node list yields an identical value.
    pub fn new(mut nodes: Vec<Node>) -> Result<Topology> {
        if nodes.is_empty() {
            return Err(Error::validation("topology has no NUMA nodes"));
        }

        let mut span = Cpumask::new();
        let mut nr_cpus = 0;
        for node in &nodes {
            if node.cores.is_empty() {
                return Err(Error::validation(format!(
                    "NUMA node {} has no cores",
                    node.id
                )));
            }
            for core in &node.cores {
                if core.logical_processors.is_empty() {
                    return Err(Error::validation(format!(
                        "core {} on NUMA node {} has no logical processors",
                        core.id, node.id
                    )));
                }
                for &cpu in &core.logical_processors {
                    if span.test_cpu(cpu) {
                        return Err(Error::validation(format!(
                            "logical processor {} appears more than once in the topology",
                            cpu
                        )));
                    }
                    span.set_cpu(cpu);
                    nr_cpus += 1;
                }
            }
        }

        nodes.sort_by_key(|node| node.id);
        for node in nodes.iter_mut() {
            for core in node.cores.iter_mut() {
                core.logical_processors.sort_unstable();
            }
            node.cores
                .sort_by_key(|core| core.logical_processors[0]);
        }

        Ok(Topology {
            nodes,
            span,
            nr_cpus,
        })
    }

    /// Read the topology from the `sys/` tree under `root`.
    ///
    /// `root` is `/` for the live host or the unpacked snapshot directory.
    /// NUMA membership comes from `sys/devices/system/node/node*`, reading
    /// each node's `cpulist` file when present and falling back to the
    /// per-CPU directory entries otherwise. Hosts without NUMA directories
    /// degrade to a single synthetic node 0 spanning every CPU.
    pub fn from_sys_root(root: &Path) -> Result<Topology> {
        let mut nodes = Vec::new();

        let node_pattern = root.join("sys/devices/system/node/node[0-9]*");
        for node_path in glob_paths(&node_pattern)? {
            let name = file_name(&node_path);
            let node_id = sscanf!(name.as_str(), "node{usize}")
                .map_err(|_| Error::parse(format!("failed to parse NUMA node ID {:?}", name)))?;

            let cpu_ids = node_cpu_ids(&node_path)?;
            nodes.push(Node::new(node_id, cores_of(root, &cpu_ids)?));
        }

        if nodes.is_empty() {
            // No NUMA information exposed, treat the machine as one node.
            debug!("no NUMA nodes under {:?}, assuming a single node", root);
            let cpu_pattern = root.join("sys/devices/system/cpu/cpu[0-9]*");
            let mut cpu_ids = Vec::new();
            for cpu_path in glob_paths(&cpu_pattern)? {
                cpu_ids.push(parse_cpu_dir(&cpu_path)?);
            }
            nodes.push(Node::new(0, cores_of(root, &cpu_ids)?));
        }

        Topology::new(nodes)
    }

    /// Get a slice of the NUMA nodes, ascending by id.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Get the number of logical processors in the topology.
    pub fn nr_cpus(&self) -> usize {
        self.nr_cpus
    }

    /// Get a Cpumask of every logical processor in the topology.
    pub fn span(&self) -> Cpumask {
        self.span.clone()
    }
}

fn glob_paths(pattern: &Path) -> Result<Vec<std::path::PathBuf>> {
    let pattern = pattern.to_string_lossy();
    let mut paths: Vec<_> = glob(pattern.as_ref())
        .map_err(|e| Error::internal(format!("bad glob pattern {}: {}", pattern, e)))?
        .filter_map(std::result::Result::ok)
        .collect();
    paths.sort();
    Ok(paths)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn parse_cpu_dir(cpu_path: &Path) -> Result<usize> {
    let name = file_name(cpu_path);
    sscanf!(name.as_str(), "cpu{usize}")
        .map_err(|_| Error::parse(format!("failed to parse cpu ID {:?}", name)))
}

/// The logical processors belonging to one NUMA node directory.
fn node_cpu_ids(node_path: &Path) -> Result<Vec<usize>> {
    let cpulist = node_path.join("cpulist");
    if cpulist.is_file() {
        let raw = fs::read_to_string(&cpulist).map_err(|e| Error::input(&cpulist, e))?;
        return read_cpulist(raw.trim());
    }

    // Snapshots taken without the cpulist file still carry the cpuN entries.
    let mut cpu_ids = Vec::new();
    for cpu_path in glob_paths(&node_path.join("cpu[0-9]*"))? {
        cpu_ids.push(parse_cpu_dir(&cpu_path)?);
    }
    Ok(cpu_ids)
}

/// Group logical processors into physical cores via their sysfs core_id.
fn cores_of(root: &Path, cpu_ids: &[usize]) -> Result<Vec<Core>> {
    let mut by_core: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for &cpu in cpu_ids {
        let path = root.join(format!("sys/devices/system/cpu/cpu{}/topology/core_id", cpu));
        // Offline CPUs may not expose a core_id, fold each into its own core.
        let core_id = read_file_usize(&path).unwrap_or(cpu);
        by_core.entry(core_id).or_default().push(cpu);
    }

    Ok(by_core
        .into_iter()
        .map(|(id, logical_processors)| Core::new(id, logical_processors))
        .collect())
}

fn read_file_usize(path: &Path) -> Result<usize> {
    let val = fs::read_to_string(path).map_err(|e| Error::input(path, e))?;
    let val = val.trim_end_matches('\0');

    val.trim()
        .parse::<usize>()
        .map_err(|_| Error::parse(format!("failed to parse {:?} from {:?}", val.trim(), path)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn shuffled_nodes() -> Vec<Node> {
        vec![
            Node::new(
                1,
                vec![Core::new(3, vec![7, 6]), Core::new(2, vec![4, 5])],
            ),
            Node::new(
                0,
                vec![Core::new(1, vec![3, 2]), Core::new(0, vec![1, 0])],
            ),
        ]
    }

    #[test]
    fn normalizes_nodes_cores_and_processors() {
        let topo = Topology::new(shuffled_nodes()).unwrap();

        let node_ids: Vec<_> = topo.nodes().iter().map(Node::id).collect();
        assert_eq!(node_ids, vec![0, 1]);

        let first_lps: Vec<_> = topo.nodes()[0]
            .cores()
            .iter()
            .map(|core| core.logical_processors().to_vec())
            .collect();
        assert_eq!(first_lps, vec![vec![0, 1], vec![2, 3]]);

        let second_lps: Vec<_> = topo.nodes()[1]
            .cores()
            .iter()
            .map(|core| core.logical_processors().to_vec())
            .collect();
        assert_eq!(second_lps, vec![vec![4, 5], vec![6, 7]]);

        assert_eq!(topo.nr_cpus(), 8);
        assert_eq!(topo.span().to_string(), "0-7");
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = Topology::new(shuffled_nodes()).unwrap();
        let twice = Topology::new(once.nodes().to_vec()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn cores_ordered_by_lowest_processor_not_core_id() {
        // Core id 9 holds the lowest processors and must come first.
        let topo = Topology::new(vec![Node::new(
            0,
            vec![Core::new(0, vec![2, 3]), Core::new(9, vec![0, 1])],
        )])
        .unwrap();

        let core_ids: Vec<_> = topo.nodes()[0].cores().iter().map(Core::id).collect();
        assert_eq!(core_ids, vec![9, 0]);
    }

    #[test]
    fn rejects_empty_topology() {
        assert!(matches!(
            Topology::new(Vec::new()),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn rejects_node_without_cores() {
        assert!(matches!(
            Topology::new(vec![Node::new(0, Vec::new())]),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn rejects_core_without_processors() {
        let nodes = vec![Node::new(0, vec![Core::new(0, Vec::new())])];
        assert!(matches!(Topology::new(nodes), Err(Error::Validation(_))));
    }

    #[test]
    fn rejects_duplicate_processor() {
        let nodes = vec![
            Node::new(0, vec![Core::new(0, vec![0, 1])]),
            Node::new(1, vec![Core::new(0, vec![1, 2])]),
        ];
        assert!(matches!(Topology::new(nodes), Err(Error::Validation(_))));
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn stage_cpu(root: &Path, cpu: usize, core_id: usize) {
        write(
            root,
            &format!("sys/devices/system/cpu/cpu{}/topology/core_id", cpu),
            &format!("{}\n", core_id),
        );
    }

    #[test]
    fn reads_numa_tree_from_cpulist_files() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();

        write(root, "sys/devices/system/node/node1/cpulist", "4-7\n");
        write(root, "sys/devices/system/node/node0/cpulist", "0-3\n");
        for cpu in 0..8 {
            // SMT pairs: (0,1), (2,3), ...
            stage_cpu(root, cpu, cpu / 2);
        }

        let topo = Topology::from_sys_root(root).unwrap();
        assert_eq!(topo.nodes().len(), 2);
        assert_eq!(topo.nodes()[0].id(), 0);
        assert_eq!(topo.nodes()[0].cores().len(), 2);
        assert_eq!(topo.nodes()[0].cores()[0].logical_processors(), &[0, 1]);
        assert_eq!(topo.nodes()[1].cores()[1].logical_processors(), &[6, 7]);
        assert_eq!(topo.span().to_string(), "0-7");
    }

    #[test]
    fn reads_node_members_from_cpu_entries_without_cpulist() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();

        for cpu in 0..4 {
            fs::create_dir_all(root.join(format!("sys/devices/system/node/node0/cpu{}", cpu)))
                .unwrap();
            stage_cpu(root, cpu, cpu);
        }

        let topo = Topology::from_sys_root(root).unwrap();
        assert_eq!(topo.nodes().len(), 1);
        assert_eq!(topo.nodes()[0].cores().len(), 4);
        assert_eq!(topo.span().to_string(), "0-3");
    }

    #[test]
    fn synthesizes_single_node_without_numa_dirs() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();

        for cpu in 0..4 {
            stage_cpu(root, cpu, cpu / 2);
        }

        let topo = Topology::from_sys_root(root).unwrap();
        assert_eq!(topo.nodes().len(), 1);
        assert_eq!(topo.nodes()[0].id(), 0);
        assert_eq!(topo.nodes()[0].cores().len(), 2);
        assert_eq!(topo.span().to_string(), "0-3");
    }

    #[test]
    fn missing_core_id_falls_back_to_own_core() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();

        write(root, "sys/devices/system/node/node0/cpulist", "0-1\n");
        // No topology/core_id staged for either CPU.

        let topo = Topology::from_sys_root(root).unwrap();
        assert_eq!(topo.nodes()[0].cores().len(), 2);
    }
}
