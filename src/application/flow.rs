//! Synapse flow centrality (centrifugal, centripetal and their sum).
//!
//! Flow is evaluated at branch points (roots included when they branch) and
//! at every synapse-bearing node. All other nodes are marked "not computed".

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info, instrument, warn};

use crate::application::bending::bending_flow;
use crate::application::distal::DistalAggregator;
use crate::domain::{Computed, DomainError, DomainResult, FlowMethod, NodeId, Relation, TreeArena};

/// Per-node flow values of one evaluation, before they are stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowValues {
    pub centrifugal: HashMap<NodeId, i64>,
    pub centripetal: HashMap<NodeId, i64>,
}

impl FlowValues {
    pub fn get(&self, method: FlowMethod, node: NodeId) -> Option<i64> {
        match method {
            FlowMethod::Centrifugal => self.centrifugal.get(&node).copied(),
            FlowMethod::Centripetal => self.centripetal.get(&node).copied(),
            FlowMethod::Sum => Some(
                self.centrifugal.get(&node).copied()? + self.centripetal.get(&node).copied()?,
            ),
            FlowMethod::Bending => None,
        }
    }
}

/// Compute flow centrality with `method` and store it as the nodes'
/// `flow_centrality`. `Bending` delegates to [`bending_flow`].
#[instrument(level = "debug", skip(tree), fields(skeleton_id = ?tree.skeleton_id))]
pub fn flow_centrality(tree: &mut TreeArena, method: FlowMethod, polypre: bool) -> DomainResult<()> {
    if method == FlowMethod::Bending {
        return bending_flow(tree, polypre);
    }
    info!("calculating {} flow centrality", method);
    warn_if_not_soma_rooted(tree);

    let values = flow_values(tree, polypre)?;
    let calc_nodes: Vec<NodeId> = values.centrifugal.keys().copied().collect();

    for node in tree.node_ids() {
        if let Some(d) = tree.derived_mut(node) {
            d.flow_centrality = None;
        }
    }
    for node in calc_nodes {
        let value = values.get(method, node);
        if let Some(d) = tree.derived_mut(node) {
            d.flow_centrality = value;
        }
    }
    tree.memo_mut().record(Computed::Flow { method, polypre });
    Ok(())
}

/// Centrifugal and centripetal flow at every calculation node.
///
/// `centripetal` reuses `total_post` where `total_pre` might be expected;
/// the formula is kept as is.
pub fn flow_values(tree: &TreeArena, polypre: bool) -> DomainResult<FlowValues> {
    tree.validate()?;

    let pre_nodes = synapse_nodes(tree, Relation::Presynaptic);
    let post_nodes = synapse_nodes(tree, Relation::Postsynaptic);
    if pre_nodes.is_empty() || post_nodes.is_empty() {
        return Err(DomainError::MissingAnnotation(format!(
            "flow needs pre- and postsynapses, found {} pre / {} post nodes",
            pre_nodes.len(),
            post_nodes.len()
        )));
    }

    let pre_weights: HashMap<NodeId, u64> = if polypre {
        polypre_weights(tree, &pre_nodes)?
    } else {
        pre_nodes.iter().map(|&n| (n, 1)).collect()
    };
    let total_pre: u64 = pre_weights.values().sum();
    let total_post = post_nodes.len() as i64;

    let mut calc_nodes: BTreeSet<NodeId> = tree.branch_points().into_iter().collect();
    calc_nodes.extend(pre_nodes.iter().copied());
    calc_nodes.extend(post_nodes.iter().copied());

    let aggregator = DistalAggregator::new(tree, calc_nodes.iter().copied())?;
    let distal_pre = aggregator.count(pre_weights.iter().map(|(&n, &w)| (n, w)))?;
    let distal_post = aggregator.count(post_nodes.iter().map(|&n| (n, 1)))?;

    let mut values = FlowValues::default();
    for node in calc_nodes {
        let dpre = distal_pre.get(&node).copied().unwrap_or(0) as i64;
        let dpost = distal_post.get(&node).copied().unwrap_or(0) as i64;
        values.centrifugal.insert(node, (total_post - dpost) * dpre);
        values.centripetal.insert(node, dpost * (total_post - dpre));
    }
    debug!(
        "flow over {} calculation nodes (total pre {}, total post {})",
        values.centrifugal.len(),
        total_pre,
        total_post
    );
    Ok(values)
}

/// Distinct treenodes carrying at least one connector of `relation`.
pub(crate) fn synapse_nodes(tree: &TreeArena, relation: Relation) -> BTreeSet<NodeId> {
    tree.connectors()
        .filter(|c| c.relation == relation)
        .map(|c| c.treenode_id)
        .collect()
}

/// Weight of each presynaptic node: the number of postsynaptic partners
/// of its connectors, at least one.
pub(crate) fn polypre_weights(
    tree: &TreeArena,
    pre_nodes: &BTreeSet<NodeId>,
) -> DomainResult<HashMap<NodeId, u64>> {
    let presynaptic: Vec<_> = tree.connectors().filter(|c| c.is_presynaptic()).collect();
    if presynaptic.iter().all(|c| c.partner_node_ids.is_empty()) {
        return Err(DomainError::MissingAnnotation(
            "polypre weighting needs connector partner detail".to_string(),
        ));
    }
    let mut partners: HashMap<NodeId, BTreeSet<NodeId>> = HashMap::new();
    for c in presynaptic {
        partners
            .entry(c.treenode_id)
            .or_default()
            .extend(c.partner_node_ids.iter().copied());
    }
    Ok(pre_nodes
        .iter()
        .map(|n| {
            let count = partners.get(n).map(BTreeSet::len).unwrap_or(0) as u64;
            (*n, count.max(1))
        })
        .collect())
}

pub(crate) fn warn_if_not_soma_rooted(tree: &TreeArena) {
    if let Some(soma) = tree.soma() {
        if tree.parent_of(soma).is_some() {
            warn!("neuron {:?} is not rooted to its soma", tree.skeleton_id);
        }
    }
}
