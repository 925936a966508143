//! Flat package validation
//!
//! Structural checks for packages read from outside the process, before they
//! are nested or built.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::error::{PackageError, PackageResult};
use crate::types::{FlatPackage, NAME_PROPERTY, PARENT_PROPERTY};

/// Shape summary of a flat package
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageStats {
    pub node_count: usize,
    /// Depth of the deepest node reachable from the root (root is 0)
    pub max_depth: usize,
    pub classes: BTreeMap<String, usize>,
    /// Object links other than `Parent`
    pub ref_properties: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub stats: PackageStats,
    pub issues: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    /// The stats, or a corrupt-package error listing every issue
    pub fn into_result(self) -> PackageResult<PackageStats> {
        if self.is_valid() {
            Ok(self.stats)
        } else {
            Err(PackageError::corrupt(self.issues.join("; ")))
        }
    }
}

/// Check a flat package for structural problems
pub fn validate_flat(package: &FlatPackage) -> ValidationReport {
    let mut report = ValidationReport::default();
    let issues = &mut report.issues;
    let stats = &mut report.stats;

    stats.node_count = package.tree.len();

    match package.root() {
        None => issues.push(format!("root {} is not in the tree", package.root_ref)),
        Some(root) => {
            if root.parent_ref().is_some() {
                issues.push(format!("root {} has a Parent", package.root_ref));
            }
        }
    }

    for (reference, node) in package.tree.iter() {
        *stats.classes.entry(node.class_name.clone()).or_default() += 1;

        if node.reference != *reference {
            issues.push(format!("{reference} is keyed under a different Ref {}", node.reference));
        }
        if node.properties.contains_key(NAME_PROPERTY) {
            issues.push(format!("{reference} stores Name as a property"));
        }

        for (name, property) in &node.properties {
            if !property.is_ref() {
                continue;
            }
            if name != PARENT_PROPERTY {
                stats.ref_properties += 1;
            }
            match property.ref_target() {
                Some(target) if package.tree.contains_key(target) => {}
                Some(target) => issues.push(format!("{reference}.{name} points at missing {target}")),
                None => issues.push(format!("{reference}.{name} has a malformed Ref value")),
            }
        }
    }

    if !package.refs.is_empty() {
        if package.refs.len() != package.tree.len() {
            issues.push(format!(
                "{} Refs recorded for {} nodes",
                package.refs.len(),
                package.tree.len()
            ));
        }
        let mut seen = HashSet::new();
        for reference in package.refs.values() {
            if !seen.insert(reference) {
                issues.push(format!("{reference} is recorded for more than one object"));
            }
            if !package.tree.contains_key(reference.as_str()) {
                issues.push(format!("recorded Ref {reference} has no node"));
            }
        }
    }

    if package.root().is_some() {
        check_parent_chains(package, issues, &mut stats.max_depth);
    }

    report
}

/// Every non-root node must reach the root by following `Parent`
fn check_parent_chains(package: &FlatPackage, issues: &mut Vec<String>, max_depth: &mut usize) {
    for (reference, _) in package.tree.iter() {
        if *reference == package.root_ref {
            continue;
        }

        let mut visited = HashSet::new();
        let mut current = reference.as_str();
        let mut depth = 0;
        loop {
            if current == package.root_ref.as_str() {
                *max_depth = (*max_depth).max(depth);
                break;
            }
            if !visited.insert(current) {
                issues.push(format!("{reference} is in a Parent cycle"));
                break;
            }
            match package.tree.get(current).and_then(|n| n.parent_ref()) {
                Some(parent) => {
                    current = parent;
                    depth += 1;
                }
                None => {
                    issues.push(format!("{reference} does not reach the root"));
                    break;
                }
            }
        }
    }
}
