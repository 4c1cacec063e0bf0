// SPDX-License-Identifier: GPL-2.0
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! # cpupart
//!
//! Computes, for the nodes of a cluster, a partition of each machine's
//! logical CPUs into a reserved pool (system and housekeeping workloads)
//! and an isolated pool (latency-sensitive workloads), from the hardware
//! snapshots collected in a must-gather archive.
//!
//! The pipeline: resolve files inside the must-gather tree
//! ([`mustgather`]), pick the target nodes through a MachineConfigPool's
//! selector ([`matched_nodes`]), unpack the per-node `sysinfo.tgz`
//! snapshot ([`Snapshot`]), model and normalize the CPU topology
//! ([`Topology`]), detect hyperthreading ([`CpuInfo::smt_active`]) and
//! finally split the CPUs ([`reserved_and_isolated`]). The computation is
//! offline and deterministic: the same archive and request always produce
//! the same two canonical CPU-list strings.

mod cpuinfo;
pub use cpuinfo::CpuInfo;
pub use cpuinfo::Processor;

mod cpumask;
pub use cpumask::read_cpulist;
pub use cpumask::Cpumask;

mod error;
pub use error::Error;
pub use error::Result;

mod inventory;
pub use inventory::Inventory;
pub use inventory::LiveHost;
pub use inventory::Snapshot;

pub mod k8s;

pub mod mustgather;

mod partition;
pub use partition::reserved_and_isolated;
pub use partition::Partition;

mod selector;
pub use selector::matched_nodes;

mod topology;
pub use topology::Core;
pub use topology::Node;
pub use topology::Topology;
