//! Merging skeleton fragments into one tree.

use std::collections::HashSet;

use itertools::Itertools;
use tracing::{debug, info, instrument};

use crate::domain::{DomainError, DomainResult, NodeId, StitchMethod, TreeArena};

/// Merge `trees` into the first one.
///
/// `StitchMethod::None` only concatenates. `All` and `Leafs` join each
/// further tree at the closest pair of candidate nodes, preferring the
/// `preferred` ids when both sides contain some of them.
#[instrument(level = "debug", skip(trees, preferred), fields(n = trees.len()))]
pub fn stitch(
    trees: Vec<TreeArena>,
    method: StitchMethod,
    preferred: &[NodeId],
) -> DomainResult<TreeArena> {
    if trees.len() < 2 {
        return Err(DomainError::AmbiguousInput(format!(
            "stitching needs at least 2 trees, got {}",
            trees.len()
        )));
    }
    let preferred: HashSet<NodeId> = preferred.iter().copied().collect();
    let mut trees = trees.into_iter();
    let mut base = trees.next().ok_or_else(|| DomainError::EmptyResult("no trees".to_string()))?;
    if method != StitchMethod::None {
        base.single_root()?;
    }

    for mut incoming in trees {
        if method == StitchMethod::None {
            base.absorb(incoming)?;
            continue;
        }
        if incoming.is_empty() {
            continue;
        }
        let mut near = present(&base, &preferred);
        let mut far = present(&incoming, &preferred);
        if near.is_empty() || far.is_empty() {
            near = candidates(&base, method);
            far = candidates(&incoming, method);
        }
        let (a, b, dist) = closest_pair(&base, &near, &incoming, &far)?;
        debug!("joining {} -> {} ({:.1} apart)", b, a, dist);

        incoming.reroot(b)?;
        let roots = incoming.roots();
        base.absorb(incoming)?;
        for root in roots {
            base.set_parent(root, Some(a))?;
        }
    }

    base.classify()?;
    info!("stitched into {} nodes, {} roots", base.len(), base.roots().len());
    Ok(base)
}

fn present(tree: &TreeArena, ids: &HashSet<NodeId>) -> Vec<NodeId> {
    let mut out: Vec<NodeId> = ids.iter().copied().filter(|id| tree.contains(*id)).collect();
    out.sort_unstable();
    out
}

fn candidates(tree: &TreeArena, method: StitchMethod) -> Vec<NodeId> {
    match method {
        StitchMethod::Leafs => {
            let mut leafs = tree.roots();
            leafs.extend(tree.end_nodes());
            leafs.sort_unstable();
            leafs.dedup();
            leafs
        }
        _ => tree.node_ids(),
    }
}

/// Closest pair by Euclidean distance, smaller ids on ties.
fn closest_pair(
    base: &TreeArena,
    near: &[NodeId],
    incoming: &TreeArena,
    far: &[NodeId],
) -> DomainResult<(NodeId, NodeId, f64)> {
    let mut best: Option<(NodeId, NodeId, f64)> = None;
    for (&a, &b) in near.iter().cartesian_product(far) {
        let d = base.position(a)?.distance(&incoming.position(b)?);
        if best.map_or(true, |(_, _, bd)| d < bd) {
            best = Some((a, b, d));
        }
    }
    best.ok_or_else(|| DomainError::EmptyResult("no candidate nodes to join".to_string()))
}
