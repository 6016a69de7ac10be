//! Distal-count aggregation: how many query nodes lie below each cut node.
//!
//! A node is distal to itself. Instead of walking every query node to the
//! root, each node remembers its nearest cut ancestor and each cut node the
//! next cut node above it, so a query only visits the cut nodes it counts
//! towards.

use std::collections::{HashMap, HashSet};

use tracing::instrument;

use crate::domain::{DomainError, DomainResult, NodeId, TreeArena};

/// Precomputed cut-ancestor chains for one tree and one set of cut nodes.
#[derive(Debug)]
pub struct DistalAggregator {
    /// Nearest cut node at or above each node
    nearest: HashMap<NodeId, Option<NodeId>>,
    /// Next cut node strictly above each cut node
    above: HashMap<NodeId, Option<NodeId>>,
    cuts: Vec<NodeId>,
}

impl DistalAggregator {
    #[instrument(level = "debug", skip(tree, cuts), fields(nodes = tree.len()))]
    pub fn new(tree: &TreeArena, cuts: impl IntoIterator<Item = NodeId>) -> DomainResult<Self> {
        let cut_set: HashSet<NodeId> = cuts.into_iter().collect();
        if let Some(missing) = cut_set.iter().find(|c| !tree.contains(**c)) {
            return Err(DomainError::UnknownNode(*missing));
        }

        let mut nearest: HashMap<NodeId, Option<NodeId>> = HashMap::with_capacity(tree.len());
        let mut above: HashMap<NodeId, Option<NodeId>> = HashMap::with_capacity(cut_set.len());

        // Pre-order guarantees the parent is resolved before its children
        for node in tree.iter() {
            let inherited = tree
                .parent_of(node)
                .and_then(|p| nearest.get(&p).copied().flatten());
            if cut_set.contains(&node) {
                above.insert(node, inherited);
                nearest.insert(node, Some(node));
            } else {
                nearest.insert(node, inherited);
            }
        }

        if nearest.len() != tree.len() {
            return Err(DomainError::malformed(
                tree.roots().first().copied().unwrap_or_default(),
                "nodes unreachable from any root",
            ));
        }

        let mut cuts: Vec<NodeId> = cut_set.into_iter().collect();
        cuts.sort_unstable();
        Ok(Self { nearest, above, cuts })
    }

    pub fn cuts(&self) -> &[NodeId] {
        &self.cuts
    }

    /// Weighted number of query nodes distal to each cut node. Every cut
    /// node appears in the result, with zero if nothing lies below it.
    pub fn count(
        &self,
        queries: impl IntoIterator<Item = (NodeId, u64)>,
    ) -> DomainResult<HashMap<NodeId, u64>> {
        let mut counts: HashMap<NodeId, u64> = self.cuts.iter().map(|&c| (c, 0)).collect();
        for (query, weight) in queries {
            let mut current = *self
                .nearest
                .get(&query)
                .ok_or(DomainError::UnknownNode(query))?;
            while let Some(cut) = current {
                *counts.entry(cut).or_insert(0) += weight;
                current = self.above.get(&cut).copied().flatten();
            }
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::testing::seven_node_tree;

    #[test]
    fn test_counts_include_the_cut_node_itself() {
        let tree = seven_node_tree();
        let agg = DistalAggregator::new(&tree, [1, 2, 4]).unwrap();

        let counts = agg.count([(4, 1), (5, 1), (7, 1)]).unwrap();

        assert_eq!(counts[&4], 1);
        assert_eq!(counts[&2], 2);
        assert_eq!(counts[&1], 3);
    }

    #[test]
    fn test_weights_are_summed() {
        let tree = seven_node_tree();
        let agg = DistalAggregator::new(&tree, [3]).unwrap();

        let counts = agg.count([(6, 2), (7, 3), (4, 10)]).unwrap();

        assert_eq!(counts[&3], 5);
    }

    #[test]
    fn test_unknown_query_node_errors() {
        let tree = seven_node_tree();
        let agg = DistalAggregator::new(&tree, [1]).unwrap();
        assert_eq!(agg.count([(99, 1)]).unwrap_err(), DomainError::UnknownNode(99));
    }
}
