// SPDX-License-Identifier: GPL-2.0
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! End-to-end pipeline over a fabricated must-gather tree: resolve the
//! archive, select nodes through the MachineConfigPool, unpack the
//! hardware snapshot and partition the CPUs.

use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::fs::File;
use std::path::Path;
use tempfile::TempDir;

use cpupart_utils::{
    matched_nodes, mustgather, reserved_and_isolated, Inventory, Snapshot,
};

const IMAGE_DIR: &str =
    "quay-io-openshift-kni-performance-addon-operator-must-gather-sha256-0f3c";

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Stage a two-NUMA-node machine, four CPUs per node, no hyperthreading,
/// and pack it the way the collector stores `sysinfo.tgz`.
fn pack_sysinfo(archive: &Path) {
    let staged = TempDir::new().unwrap();

    let mut cpuinfo = String::new();
    for cpu in 0..8 {
        cpuinfo.push_str(&format!(
            "processor\t: {}\nflags\t\t: fpu tsc msr pae\n\n",
            cpu
        ));
    }
    write(staged.path(), "proc/cpuinfo", &cpuinfo);
    write(
        staged.path(),
        "sys/devices/system/node/node0/cpulist",
        "0-3\n",
    );
    write(
        staged.path(),
        "sys/devices/system/node/node1/cpulist",
        "4-7\n",
    );
    for cpu in 0..8 {
        write(
            staged.path(),
            &format!("sys/devices/system/cpu/cpu{}/topology/core_id", cpu),
            &format!("{}\n", cpu % 4),
        );
    }

    let encoder = GzEncoder::new(File::create(archive).unwrap(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.append_dir_all(".", staged.path()).unwrap();
    builder.into_inner().unwrap().finish().unwrap();
}

fn stage_must_gather(root: &Path) {
    write(
        root,
        &format!(
            "{}/cluster-scoped-resources/core/nodes/worker-0",
            IMAGE_DIR
        ),
        "apiVersion: v1\n\
         kind: Node\n\
         metadata:\n\
         \x20 name: worker-0\n\
         \x20 labels:\n\
         \x20   node-role.kubernetes.io/worker-cnf: \"\"\n",
    );
    write(
        root,
        &format!(
            "{}/cluster-scoped-resources/core/nodes/infra-0",
            IMAGE_DIR
        ),
        "apiVersion: v1\n\
         kind: Node\n\
         metadata:\n\
         \x20 name: infra-0\n\
         \x20 labels:\n\
         \x20   node-role.kubernetes.io/infra: \"\"\n",
    );
    write(
        root,
        &format!(
            "{}/cluster-scoped-resources/machineconfiguration.openshift.io/machineconfigpools/worker-cnf.yaml",
            IMAGE_DIR
        ),
        "apiVersion: machineconfiguration.openshift.io/v1\n\
         kind: MachineConfigPool\n\
         metadata:\n\
         \x20 name: worker-cnf\n\
         spec:\n\
         \x20 machineConfigSelector:\n\
         \x20   matchExpressions:\n\
         \x20     - key: machineconfiguration.openshift.io/role\n\
         \x20       operator: In\n\
         \x20       values: [worker, worker-cnf]\n\
         \x20 nodeSelector:\n\
         \x20   matchLabels:\n\
         \x20     node-role.kubernetes.io/worker-cnf: \"\"\n",
    );

    let archive_dir = root.join(IMAGE_DIR).join("nodes/worker-0");
    fs::create_dir_all(&archive_dir).unwrap();
    pack_sysinfo(&archive_dir.join("sysinfo.tgz"));
}

#[test]
fn partitions_the_pool_nodes_from_a_must_gather() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    stage_must_gather(root);

    let mcp = mustgather::machine_config_pool(root, "worker-cnf").unwrap();
    assert!(mcp.spec.machine_config_selector.is_some());
    let selector = mcp.spec.node_selector.unwrap();

    let nodes = mustgather::node_list(root).unwrap();
    assert_eq!(nodes.len(), 2);

    let matched = matched_nodes(&nodes, &selector);
    let names: Vec<_> = matched.iter().map(|n| n.metadata.name.as_str()).collect();
    assert_eq!(names, vec!["worker-0"]);

    let archive = mustgather::snapshot_path(root, "worker-0").unwrap();
    let snapshot = Snapshot::unpack(&archive).unwrap();

    let cpu_info = snapshot.cpu_info().unwrap();
    assert!(!cpu_info.smt_active().unwrap());
    assert_eq!(cpu_info.processors().len(), 8);

    let topo = snapshot.topology().unwrap();
    assert_eq!(topo.nr_cpus(), 8);

    let partition = reserved_and_isolated(&topo, 4, true, false).unwrap();
    assert_eq!(partition.reserved.to_string(), "0-1,4-5");
    assert_eq!(partition.isolated.to_string(), "2-3,6-7");
    assert!(partition.warnings.is_empty());

    // Same archive, same request, byte-identical output.
    let again = reserved_and_isolated(&topo, 4, true, false).unwrap();
    assert_eq!(again.reserved.to_string(), partition.reserved.to_string());
    assert_eq!(again.isolated.to_string(), partition.isolated.to_string());
}
