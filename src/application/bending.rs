//! Bending flow: synapse paths that turn from one child branch of a branch
//! point into a sibling branch.

use std::collections::{BTreeSet, HashMap};

use itertools::Itertools;
use tracing::{debug, info, instrument};

use crate::application::distal::DistalAggregator;
use crate::application::flow::{polypre_weights, synapse_nodes, warn_if_not_soma_rooted};
use crate::domain::{Computed, DomainError, DomainResult, FlowMethod, NodeId, Relation, TreeArena};

/// Bending flow at every branch point (roots included when they branch),
/// stored as `flow_centrality`. Other nodes are marked "not computed".
#[instrument(level = "debug", skip(tree), fields(skeleton_id = ?tree.skeleton_id))]
pub fn bending_flow(tree: &mut TreeArena, polypre: bool) -> DomainResult<()> {
    info!("calculating bending flow centrality");
    warn_if_not_soma_rooted(tree);

    let flow = bending_values(tree, polypre)?;

    for node in tree.node_ids() {
        if let Some(d) = tree.derived_mut(node) {
            d.flow_centrality = flow.get(&node).copied();
        }
    }
    tree.memo_mut().record(Computed::Flow {
        method: FlowMethod::Bending,
        polypre,
    });
    Ok(())
}

/// Bending flow per branch point:
/// `sum over ordered sibling pairs (l, r) of distal_post[l] * distal_pre[r]`.
pub fn bending_values(tree: &TreeArena, polypre: bool) -> DomainResult<HashMap<NodeId, i64>> {
    tree.validate()?;

    // One count per connector, not per node
    let pre = connector_counts(tree, Relation::Presynaptic);
    let post = connector_counts(tree, Relation::Postsynaptic);
    if pre.is_empty() || post.is_empty() {
        return Err(DomainError::MissingAnnotation(format!(
            "bending flow needs pre- and postsynapses, found {} pre / {} post nodes",
            pre.len(),
            post.len()
        )));
    }
    let pre: HashMap<NodeId, u64> = if polypre {
        let pre_nodes: BTreeSet<NodeId> = synapse_nodes(tree, Relation::Presynaptic);
        let weights = polypre_weights(tree, &pre_nodes)?;
        pre.into_iter()
            .map(|(n, count)| (n, count * weights.get(&n).copied().unwrap_or(1)))
            .collect()
    } else {
        pre
    };

    let branch_points = tree.branch_points();
    let children: Vec<NodeId> = branch_points
        .iter()
        .flat_map(|bp| tree.children_of(*bp).iter().copied())
        .collect();

    let aggregator = DistalAggregator::new(tree, children)?;
    let distal_pre = aggregator.count(pre)?;
    let distal_post = aggregator.count(post)?;

    let mut flow = HashMap::with_capacity(branch_points.len());
    for bp in branch_points {
        let value: u64 = tree
            .children_of(bp)
            .iter()
            .permutations(2)
            .map(|pair| distal_post[pair[0]] * distal_pre[pair[1]])
            .sum();
        flow.insert(bp, value as i64);
    }
    debug!("bending flow at {} branch points", flow.len());
    Ok(flow)
}

fn connector_counts(tree: &TreeArena, relation: Relation) -> HashMap<NodeId, u64> {
    tree.connectors()
        .filter(|c| c.relation == relation)
        .fold(HashMap::new(), |mut acc, c| {
            *acc.entry(c.treenode_id).or_insert(0) += 1;
            acc
        })
}
