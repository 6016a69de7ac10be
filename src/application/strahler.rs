//! Strahler ordering by bottom-up propagation from the end nodes.
//!
//! Each frontier node derives its index from its children and hands it to
//! the unbranched chain above it, stopping below the next branch point. A
//! branch point joins the next frontier once all of its children are done.

use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument};

use crate::domain::{Computed, DomainError, DomainResult, NodeId, StrahlerMethod, TreeArena};

/// Compute `strahler_index` for every node.
#[instrument(level = "debug", skip(tree), fields(nodes = tree.len()))]
pub fn strahler_index(tree: &mut TreeArena, method: StrahlerMethod) -> DomainResult<()> {
    tree.validate()?;

    let mut indices: HashMap<NodeId, u32> = HashMap::with_capacity(tree.len());
    let mut processed: HashSet<NodeId> = HashSet::with_capacity(tree.len());
    let mut frontier = tree.end_nodes();
    let mut rounds = 0usize;

    while !frontier.is_empty() {
        rounds += 1;
        let mut next = Vec::new();

        for start in frontier {
            let child_indices: Vec<u32> = tree
                .children_of(start)
                .iter()
                .map(|c| indices.get(c).copied())
                .collect::<Option<_>>()
                .ok_or_else(|| DomainError::malformed(start, "child not processed before parent"))?;
            let index = converge(&child_indices, method);

            // Walk the spine up to the next branch point
            let mut current = start;
            indices.insert(current, index);
            processed.insert(current);
            while let Some(parent) = tree.parent_of(current) {
                if tree.is_branch_point(parent) {
                    let ready = tree.children_of(parent).iter().all(|c| processed.contains(c));
                    if ready {
                        next.push(parent);
                    }
                    break;
                }
                current = parent;
                indices.insert(current, index);
                processed.insert(current);
            }
        }
        frontier = next;
    }

    if indices.len() != tree.len() {
        return Err(DomainError::malformed(
            tree.roots().first().copied().unwrap_or_default(),
            format!("{} nodes unreachable from any end node", tree.len() - indices.len()),
        ));
    }

    for (node, index) in indices {
        if let Some(d) = tree.derived_mut(node) {
            d.strahler_index = Some(index);
        }
    }
    tree.memo_mut().record(Computed::Strahler(method));
    debug!("strahler indices assigned in {} rounds", rounds);
    Ok(())
}

/// Index of a node given the indices of its children.
fn converge(children: &[u32], method: StrahlerMethod) -> u32 {
    match children {
        [] => 1,
        [only] => *only,
        _ => {
            let max = children.iter().copied().max().unwrap_or(1);
            let at_max = children.iter().filter(|&&i| i == max).count();
            if at_max >= 2 || method == StrahlerMethod::Greedy {
                max + 1
            } else {
                max
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converge_standard_only_increases_on_shared_maximum() {
        assert_eq!(converge(&[], StrahlerMethod::Standard), 1);
        assert_eq!(converge(&[3], StrahlerMethod::Standard), 3);
        assert_eq!(converge(&[2, 1], StrahlerMethod::Standard), 2);
        assert_eq!(converge(&[2, 2, 1], StrahlerMethod::Standard), 3);
    }

    #[test]
    fn test_converge_greedy_increases_at_every_convergence() {
        assert_eq!(converge(&[2, 1], StrahlerMethod::Greedy), 3);
        assert_eq!(converge(&[1], StrahlerMethod::Greedy), 1);
    }
}
