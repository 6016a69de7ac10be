//! Geometry along the skeleton: cable length, distance to root, dotprops
//! and downsampling.

use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument};

use crate::domain::{Computed, DomainError, DomainResult, NodeId, Point3, TreeArena};

/// Sum of all parent-edge lengths.
pub fn cable_length(tree: &TreeArena) -> f64 {
    tree.nodes()
        .filter_map(|n| {
            let parent = tree.node(n.parent_id?)?;
            Some(n.position.distance(&parent.position))
        })
        .sum()
}

/// Geodesic distance from each node to its root.
pub fn distances_to_root(tree: &TreeArena) -> DomainResult<HashMap<NodeId, f64>> {
    tree.validate()?;
    let mut dist: HashMap<NodeId, f64> = HashMap::with_capacity(tree.len());
    for node in tree.iter() {
        let value = match tree.parent_of(node) {
            None => 0.0,
            Some(p) => {
                let edge = tree.position(node)?.distance(&tree.position(p)?);
                dist.get(&p).copied().unwrap_or(0.0) + edge
            }
        };
        dist.insert(node, value);
    }
    Ok(dist)
}

/// Store [`distances_to_root`] as the derived `dist_to_root` attribute.
#[instrument(level = "debug", skip(tree), fields(nodes = tree.len()))]
pub fn dist_to_root(tree: &mut TreeArena) -> DomainResult<()> {
    let dist = distances_to_root(tree)?;
    for (node, value) in dist {
        if let Some(d) = tree.derived_mut(node) {
            d.dist_to_root = Some(value);
        }
    }
    tree.memo_mut().record(Computed::DistToRoot);
    Ok(())
}

/// Tangent of one child-parent edge.
#[derive(Debug, Clone, PartialEq)]
pub struct DotProp {
    pub node: NodeId,
    /// Edge midpoint
    pub point: Point3,
    /// Child to parent
    pub vector: Point3,
    pub length: f64,
}

pub fn dotprops(tree: &TreeArena) -> Vec<DotProp> {
    let mut out: Vec<DotProp> = tree
        .nodes()
        .filter_map(|n| {
            let parent = tree.node(n.parent_id?)?;
            Some(DotProp {
                node: n.id,
                point: n.position.midpoint(&parent.position),
                vector: n.position.towards(&parent.position),
                length: n.position.distance(&parent.position),
            })
        })
        .collect();
    out.sort_by_key(|d| d.node);
    out
}

/// Drop slab nodes, keeping every `factor`-th one along each segment.
///
/// Roots, branch points, ends, synapse-bearing and tagged nodes and the ids
/// in `keep` always survive. Parent links are bridged over removed nodes.
/// Returns the number of removed nodes.
#[instrument(level = "debug", skip(tree, keep), fields(nodes = tree.len()))]
pub fn downsample(tree: &mut TreeArena, factor: usize, keep: &HashSet<NodeId>) -> DomainResult<usize> {
    if factor <= 1 {
        return Ok(0);
    }
    tree.validate()?;

    let synapse_nodes: HashSet<NodeId> = tree.connectors().map(|c| c.treenode_id).collect();
    let tagged: HashSet<NodeId> = tree.tags().values().flatten().copied().collect();
    let fixed = |tree: &TreeArena, id: NodeId| {
        tree.parent_of(id).is_none()
            || tree.children_of(id).len() != 1
            || synapse_nodes.contains(&id)
            || tagged.contains(&id)
            || keep.contains(&id)
    };

    let mut counter: HashMap<NodeId, usize> = HashMap::with_capacity(tree.len());
    // Nearest surviving node at or above each node
    let mut survivor: HashMap<NodeId, NodeId> = HashMap::with_capacity(tree.len());
    let mut relink: Vec<(NodeId, Option<NodeId>)> = Vec::new();
    let mut removed: HashSet<NodeId> = HashSet::new();

    for node in tree.iter() {
        let parent = tree.parent_of(node);
        let count = if fixed(tree, node) {
            0
        } else {
            parent.and_then(|p| counter.get(&p)).copied().unwrap_or(0) + 1
        };
        counter.insert(node, count);

        let above = parent.and_then(|p| survivor.get(&p).copied());
        if count % factor == 0 {
            survivor.insert(node, node);
            if above != parent {
                relink.push((node, above));
            }
        } else {
            let above = above.ok_or_else(|| DomainError::malformed(node, "slab node without surviving ancestor"))?;
            survivor.insert(node, above);
            removed.insert(node);
        }
    }

    for (node, parent) in relink {
        tree.set_parent_unchecked(node, parent);
    }
    tree.remove_nodes(&removed);
    tree.structure_changed(false);
    tree.classify()?;
    debug!("downsampled by {}: removed {} nodes", factor, removed.len());
    Ok(removed.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Node, TreeBuilder};

    fn straight_chain(n: i64) -> TreeArena {
        TreeBuilder::new()
            .nodes((1..=n).map(|id| {
                let parent = if id == 1 { None } else { Some(id - 1) };
                Node::new(id, parent, Point3::new(id as f64, 0.0, 0.0))
            }))
            .build()
            .unwrap()
    }

    #[test]
    fn test_downsample_keeps_every_nth_slab_and_bridges() {
        let mut tree = straight_chain(8);

        let removed = downsample(&mut tree, 3, &HashSet::new()).unwrap();

        // slabs 2..=7 count 1..=6, keeping 4 and 7; 8 is the end
        assert_eq!(tree.node_ids(), vec![1, 4, 7, 8]);
        assert_eq!(removed, 4);
        assert_eq!(tree.parent_of(4), Some(1));
        assert_eq!(tree.parent_of(7), Some(4));
        assert_eq!(tree.parent_of(8), Some(7));
    }

    #[test]
    fn test_downsample_keeps_requested_nodes() {
        let mut tree = straight_chain(6);

        downsample(&mut tree, 10, &HashSet::from([3])).unwrap();

        assert_eq!(tree.node_ids(), vec![1, 3, 6]);
        assert_eq!(tree.parent_of(6), Some(3));
    }

    #[test]
    fn test_dotprops_point_from_child_to_parent() {
        let tree = straight_chain(2);
        let dps = dotprops(&tree);
        assert_eq!(dps.len(), 1);
        assert_eq!(dps[0].node, 2);
        assert_eq!(dps[0].vector, Point3::new(-1.0, 0.0, 0.0));
        assert_eq!(dps[0].point, Point3::new(1.5, 0.0, 0.0));
        assert_eq!(dps[0].length, 1.0);
    }
}
