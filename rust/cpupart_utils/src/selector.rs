// SPDX-License-Identifier: GPL-2.0
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! Node label-selector matching.

use std::collections::BTreeMap;

use crate::k8s::{LabelSelector, LabelSelectorRequirement, Node, Operator};

/// Return the nodes targeted by `selector`, preserving input order.
///
/// The selector's `match_labels` equalities are lowered to single-valued
/// `In` requirements, so the whole selector evaluates as one term whose
/// requirements are ANDed, the usual node-affinity semantics. An empty
/// selector matches every node; no match yields an empty vector.
pub fn matched_nodes<'a>(nodes: &'a [Node], selector: &LabelSelector) -> Vec<&'a Node> {
    let requirements = requirements_of(selector);
    nodes
        .iter()
        .filter(|node| {
            requirements
                .iter()
                .all(|req| matches(&node.metadata.labels, req))
        })
        .collect()
}

fn requirements_of(selector: &LabelSelector) -> Vec<LabelSelectorRequirement> {
    let mut requirements: Vec<_> = selector
        .match_labels
        .iter()
        .map(|(key, value)| LabelSelectorRequirement {
            key: key.clone(),
            operator: Operator::In,
            values: vec![value.clone()],
        })
        .collect();
    requirements.extend(selector.match_expressions.iter().cloned());
    requirements
}

fn matches(labels: &BTreeMap<String, String>, req: &LabelSelectorRequirement) -> bool {
    let value = labels.get(&req.key);
    match req.operator {
        Operator::In => value.is_some_and(|v| req.values.iter().any(|want| want == v)),
        // A missing key satisfies NotIn.
        Operator::NotIn => value.map_or(true, |v| !req.values.iter().any(|want| want == v)),
        Operator::Exists => value.is_some(),
        Operator::DoesNotExist => value.is_none(),
    }
}
