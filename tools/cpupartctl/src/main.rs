// SPDX-License-Identifier: GPL-2.0
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};

use cpupart_utils::{
    matched_nodes, mustgather, reserved_and_isolated, Inventory, LiveHost, Snapshot,
};

/// cpupartctl: compute reserved and isolated CPU pools.
///
/// Reads the Node and MachineConfigPool objects plus the per-node hardware
/// snapshots stored in a must-gather archive, then splits each targeted
/// node's logical CPUs into a reserved pool for housekeeping and an
/// isolated pool for latency-sensitive workloads. The resulting CPU lists
/// are printed in kernel cpulist notation, ready to be pasted into a
/// performance profile.
#[derive(Debug, Parser)]
struct Opts {
    /// Path to the top-level must-gather directory.
    #[clap(long, required_unless_present = "live")]
    must_gather_dir_path: Option<PathBuf>,

    /// Name of the MachineConfigPool whose nodes are partitioned.
    #[clap(long, default_value = "worker-cnf")]
    mcp_name: String,

    /// Number of logical CPUs to reserve for housekeeping.
    #[clap(long)]
    reserved_cpu_count: i64,

    /// Spread the reserved CPUs evenly across NUMA nodes instead of
    /// packing them from the lowest-numbered CPUs.
    #[clap(long, action = clap::ArgAction::SetTrue)]
    split_reserved_cpus_across_numa: bool,

    /// Partition the live host instead of a must-gather snapshot.
    #[clap(long, action = clap::ArgAction::SetTrue, conflicts_with = "must_gather_dir_path")]
    live: bool,

    /// Enable verbose output.
    #[clap(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn partition_inventory(opts: &Opts, name: &str, inventory: &dyn Inventory) -> Result<()> {
    let cpu_info = inventory
        .cpu_info()
        .with_context(|| format!("reading CPU info for {}", name))?;
    let smt_enabled = cpu_info.smt_active()?;
    info!(
        "{}: hyperthreading {}",
        name,
        if smt_enabled { "enabled" } else { "disabled" }
    );

    let topo = inventory
        .topology()
        .with_context(|| format!("reading topology for {}", name))?;
    let partition = reserved_and_isolated(
        &topo,
        opts.reserved_cpu_count,
        opts.split_reserved_cpus_across_numa,
        smt_enabled,
    )?;

    for warning in &partition.warnings {
        warn!("{}: {}", name, warning);
    }
    if partition.isolated.is_empty() {
        warn!("{}: every CPU is reserved, no isolated pool remains", name);
    }
    info!(
        "{}: reserved {} CPUs, isolated {} CPUs of {}",
        name,
        partition.reserved.weight(),
        partition.isolated.weight(),
        topo.nr_cpus()
    );
    println!("{}: reserved={} isolated={}", name, partition.reserved, partition.isolated);
    Ok(())
}

fn run_must_gather(opts: &Opts, root: &Path) -> Result<()> {
    let mcp = mustgather::machine_config_pool(root, &opts.mcp_name)
        .with_context(|| format!("loading MachineConfigPool {}", opts.mcp_name))?;
    let selector = mcp.spec.node_selector.unwrap_or_default();

    let nodes = mustgather::node_list(root).context("loading node objects")?;
    let matched = matched_nodes(&nodes, &selector);
    if matched.is_empty() {
        bail!(
            "no node matches the node selector of MachineConfigPool {}",
            opts.mcp_name
        );
    }
    info!(
        "MachineConfigPool {} targets {} of {} nodes",
        opts.mcp_name,
        matched.len(),
        nodes.len()
    );

    for node in matched {
        let name = node.metadata.name.as_str();
        let archive = mustgather::snapshot_path(root, name)?;
        let snapshot = Snapshot::unpack(&archive)
            .with_context(|| format!("unpacking hardware snapshot for {}", name))?;
        partition_inventory(opts, name, &snapshot)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let opts = Opts::parse();

    let llv = match opts.verbose {
        0 => simplelog::LevelFilter::Info,
        1 => simplelog::LevelFilter::Debug,
        _ => simplelog::LevelFilter::Trace,
    };
    let mut lcfg = simplelog::ConfigBuilder::new();
    lcfg.set_time_level(simplelog::LevelFilter::Error)
        .set_location_level(simplelog::LevelFilter::Off)
        .set_target_level(simplelog::LevelFilter::Off)
        .set_thread_level(simplelog::LevelFilter::Off);
    simplelog::TermLogger::init(
        llv,
        lcfg.build(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )?;

    match &opts.must_gather_dir_path {
        Some(root) => run_must_gather(&opts, root),
        None => partition_inventory(&opts, "localhost", &LiveHost),
    }
}
