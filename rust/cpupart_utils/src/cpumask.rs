// SPDX-License-Identifier: GPL-2.0
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! # Cpumask
//!
//! A set of logical processor ids backed by a `BitVec`, along with helpers
//! for building, combining and reading such sets.
//!
//! The mask grows on demand, so it never needs to know the number of
//! possible CPUs up front. Its canonical text form is the kernel cpulist
//! notation, ascending ranges and singletons separated by commas:
//!
//!```
//!     use cpupart_utils::Cpumask;
//!     let mut mask = Cpumask::new();
//!     mask.set_cpu(0);
//!     mask.set_cpu(1);
//!     mask.set_cpu(5);
//!     assert_eq!(mask.to_string(), "0-1,5");
//!```
//!
//! An empty mask serializes to the empty string. Two masks holding the same
//! ids always serialize identically, whatever order the ids were set in.

use bitvec::prelude::*;
use sscanf::sscanf;
use std::fmt;

use crate::error::{Error, Result};

/// Parse a kernel cpulist string ("0-2,5,9-11") into the ids it covers.
pub fn read_cpulist(cpulist: &str) -> Result<Vec<usize>> {
    let cpulist = cpulist.trim_end_matches('\0');
    let mut cpu_ids = vec![];
    for group in cpulist.split(',') {
        let (min, max) = match sscanf!(group.trim(), "{usize}-{usize}") {
            Ok((x, y)) => (x, y),
            Err(_) => match sscanf!(group.trim(), "{usize}") {
                Ok(x) => (x, x),
                Err(_) => {
                    return Err(Error::parse(format!(
                        "failed to parse cpulist element {:?}",
                        group.trim()
                    )));
                }
            },
        };
        if min > max {
            return Err(Error::parse(format!(
                "cpulist range {}-{} is descending",
                min, max
            )));
        }
        for i in min..(max + 1) {
            cpu_ids.push(i);
        }
    }

    Ok(cpu_ids)
}

#[derive(Debug, Clone, Default)]
pub struct Cpumask {
    mask: BitVec<u64, Lsb0>,
}

impl Cpumask {
    /// Build a new empty Cpumask.
    pub fn new() -> Cpumask {
        Cpumask::default()
    }

    /// Build a Cpumask from a kernel cpulist string.
    pub fn from_cpulist(cpulist: &str) -> Result<Cpumask> {
        let mut mask = Cpumask::new();
        for cpu_id in read_cpulist(cpulist)? {
            mask.set_cpu(cpu_id);
        }

        Ok(mask)
    }

    /// Set a bit in the Cpumask, growing it as needed.
    pub fn set_cpu(&mut self, cpu: usize) {
        if cpu >= self.mask.len() {
            self.mask.resize(cpu + 1, false);
        }
        self.mask.set(cpu, true);
    }

    /// Clear a bit from the Cpumask. Clearing beyond the mask is a no-op.
    pub fn clear_cpu(&mut self, cpu: usize) {
        if cpu < self.mask.len() {
            self.mask.set(cpu, false);
        }
    }

    /// Test whether the specified CPU bit is set in the Cpumask.
    pub fn test_cpu(&self, cpu: usize) -> bool {
        match self.mask.get(cpu) {
            Some(bit) => *bit,
            None => false,
        }
    }

    /// Count the number of bits set in the Cpumask.
    pub fn weight(&self) -> usize {
        self.mask.count_ones()
    }

    /// Return true if the Cpumask has no bit set.
    pub fn is_empty(&self) -> bool {
        self.mask.count_ones() == 0
    }

    /// Create a Cpumask holding the bits of `self` that are not in `other`.
    pub fn difference(&self, other: &Cpumask) -> Cpumask {
        let mut new = self.clone();
        for cpu in other.iter() {
            new.clear_cpu(cpu);
        }
        new
    }

    /// Iterate over the set bits in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.mask.iter_ones()
    }
}

impl PartialEq for Cpumask {
    fn eq(&self, other: &Self) -> bool {
        // Trailing capacity is not content.
        self.iter().eq(other.iter())
    }
}

impl Eq for Cpumask {}

impl fmt::Display for Cpumask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut iter = self.iter().peekable();
        let mut first = true;
        while let Some(start) = iter.next() {
            let mut end = start;
            while iter.peek() == Some(&(end + 1)) {
                end = iter.next().unwrap();
            }
            if !first {
                write!(f, ",")?;
            }
            if start == end {
                write!(f, "{}", start)?;
            } else {
                write!(f, "{}-{}", start, end)?;
            }
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpulist_single() {
        assert_eq!(read_cpulist("3").unwrap(), vec![3]);
    }

    #[test]
    fn cpulist_ranges() {
        assert_eq!(
            read_cpulist("0-2,5,9-11").unwrap(),
            vec![0, 1, 2, 5, 9, 10, 11]
        );
    }

    #[test]
    fn cpulist_trailing_nul() {
        assert_eq!(read_cpulist("0-1\0").unwrap(), vec![0, 1]);
    }

    #[test]
    fn cpulist_garbage() {
        assert!(matches!(read_cpulist("0-"), Err(Error::Parse(_))));
        assert!(matches!(read_cpulist(""), Err(Error::Parse(_))));
        assert!(matches!(read_cpulist("3-1"), Err(Error::Parse(_))));
    }

    #[test]
    fn display_empty() {
        assert_eq!(Cpumask::new().to_string(), "");
    }

    #[test]
    fn display_ranges() {
        let mask = Cpumask::from_cpulist("0-3,8,10-11").unwrap();
        assert_eq!(mask.to_string(), "0-3,8,10-11");
    }

    #[test]
    fn display_insertion_order_independent() {
        let mut a = Cpumask::new();
        for cpu in [5, 0, 1] {
            a.set_cpu(cpu);
        }
        let mut b = Cpumask::new();
        for cpu in [1, 5, 0] {
            b.set_cpu(cpu);
        }
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "0-1,5");
    }

    #[test]
    fn difference() {
        let total = Cpumask::from_cpulist("0-7").unwrap();
        let reserved = Cpumask::from_cpulist("0-1,4-5").unwrap();
        let isolated = total.difference(&reserved);
        assert_eq!(isolated.to_string(), "2-3,6-7");
        assert_eq!(isolated.weight(), 4);
    }

    #[test]
    fn equality_ignores_capacity() {
        let mut a = Cpumask::new();
        a.set_cpu(1);
        let mut b = Cpumask::new();
        b.set_cpu(1);
        b.set_cpu(63);
        b.clear_cpu(63);
        assert_eq!(a, b);
    }
}
