//! Strahler-based pruning.

use std::collections::{BTreeSet, HashSet};

use tracing::{debug, info, instrument};

use crate::application::strahler::strahler_index;
use crate::domain::{ConnectorId, DomainError, DomainResult, NodeId, StrahlerMethod, TreeArena};

/// Which Strahler indices to remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PruneTarget {
    Indices(BTreeSet<u32>),
    /// Inclusive on both ends
    Range { min: u32, max: u32 },
    /// Keep the `n` highest indices present, remove the rest
    KeepTop(usize),
}

impl PruneTarget {
    fn resolve(&self, present: &BTreeSet<u32>) -> BTreeSet<u32> {
        match self {
            PruneTarget::Indices(set) => set.clone(),
            PruneTarget::Range { min, max } => (*min..=*max).collect(),
            PruneTarget::KeepTop(n) => present.iter().rev().skip(*n).copied().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PruneOptions {
    pub target: PruneTarget,
    pub method: StrahlerMethod,
    pub reroot_soma: bool,
    /// Move connectors of removed nodes to the nearest surviving ancestor
    /// instead of dropping them
    pub relocate_connectors: bool,
    pub force_strahler_update: bool,
}

impl PruneOptions {
    pub fn new(target: PruneTarget) -> Self {
        Self {
            target,
            method: StrahlerMethod::Standard,
            reroot_soma: true,
            relocate_connectors: false,
            force_strahler_update: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub removed_nodes: usize,
    pub relocated_connectors: usize,
    pub dropped_connectors: usize,
    /// Survivors whose parent was removed
    pub new_roots: Vec<NodeId>,
}

/// Remove every node whose Strahler index falls in the target set.
///
/// Surviving nodes keep their Strahler indices, so pruning again with the
/// same target removes nothing.
#[instrument(level = "debug", skip(tree, opts), fields(skeleton_id = ?tree.skeleton_id))]
pub fn prune_by_strahler(tree: &mut TreeArena, opts: &PruneOptions) -> DomainResult<PruneReport> {
    if opts.reroot_soma {
        tree.reroot_to_soma()?;
    }
    let missing = tree.nodes().any(|n| n.derived.strahler_index.is_none());
    if opts.force_strahler_update || missing {
        strahler_index(tree, opts.method)?;
    }

    let present: BTreeSet<u32> = tree.nodes().filter_map(|n| n.derived.strahler_index).collect();
    let target = opts.target.resolve(&present);
    let remove: HashSet<NodeId> = tree
        .nodes()
        .filter(|n| n.derived.strahler_index.is_some_and(|i| target.contains(&i)))
        .map(|n| n.id)
        .collect();

    if remove.is_empty() {
        debug!("nothing to prune for {:?}", target);
        return Ok(PruneReport::default());
    }
    if remove.len() == tree.len() {
        return Err(DomainError::EmptyResult(format!(
            "pruning {:?} would remove all {} nodes",
            target,
            tree.len()
        )));
    }

    let mut report = PruneReport {
        removed_nodes: remove.len(),
        ..PruneReport::default()
    };

    let moves: Vec<(ConnectorId, Option<NodeId>)> = tree
        .connectors()
        .filter(|c| remove.contains(&c.treenode_id))
        .map(|c| {
            let target = if opts.relocate_connectors {
                surviving_ancestor(tree, c.treenode_id, &remove)
            } else {
                None
            };
            (c.id, target)
        })
        .collect();
    let connectors = tree.connectors_mut();
    for (id, target) in moves {
        match target {
            Some(node) => {
                if let Some(c) = connectors.get_mut(&id) {
                    c.treenode_id = node;
                }
                report.relocated_connectors += 1;
            }
            None => {
                connectors.remove(&id);
                report.dropped_connectors += 1;
            }
        }
    }

    let mut new_roots: Vec<NodeId> = tree
        .nodes()
        .filter(|n| !remove.contains(&n.id))
        .filter(|n| n.parent_id.is_some_and(|p| remove.contains(&p)))
        .map(|n| n.id)
        .collect();
    new_roots.sort_unstable();
    for &root in &new_roots {
        tree.set_parent_unchecked(root, None);
    }
    report.new_roots = new_roots;

    tree.remove_nodes(&remove);
    tree.structure_changed(true);
    tree.classify()?;

    info!(
        "pruned {} nodes ({} connectors relocated, {} dropped)",
        report.removed_nodes, report.relocated_connectors, report.dropped_connectors
    );
    Ok(report)
}

fn surviving_ancestor(tree: &TreeArena, node: NodeId, removed: &HashSet<NodeId>) -> Option<NodeId> {
    let mut current = tree.parent_of(node);
    while let Some(id) = current {
        if !removed.contains(&id) {
            return Some(id);
        }
        current = tree.parent_of(id);
    }
    None
}
