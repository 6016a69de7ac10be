//! Axon/dendrite separation at the node of maximal flow.

use std::collections::HashSet;

use tracing::{debug, info, instrument};

use crate::application::batch::Neurons;
use crate::application::cable::distances_to_root;
use crate::application::flow::flow_centrality;
use crate::domain::{Computed, DomainError, DomainResult, FlowMethod, NodeId, TreeArena};

#[derive(Debug, Clone, PartialEq)]
pub struct SplitOptions {
    pub method: FlowMethod,
    pub polypre: bool,
    pub reroot_soma: bool,
    /// Separate the root-to-cut path when the cut sits on a branch point
    pub primary_neurite: bool,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            method: FlowMethod::Centrifugal,
            polypre: false,
            reroot_soma: true,
            primary_neurite: true,
        }
    }
}

/// Fragments of a split neuron.
#[derive(Debug, Clone)]
pub struct SplitResult {
    pub cut: NodeId,
    pub axon: TreeArena,
    pub dendrite: TreeArena,
    pub primary_neurite: Option<TreeArena>,
}

impl SplitResult {
    pub fn fragments(&self) -> Vec<&TreeArena> {
        let mut out = vec![&self.axon, &self.dendrite];
        if let Some(pn) = &self.primary_neurite {
            out.push(pn);
        }
        out
    }

    pub fn into_fragments(self) -> Vec<TreeArena> {
        let mut out = vec![self.axon, self.dendrite];
        out.extend(self.primary_neurite);
        out
    }
}

/// Node with the highest flow. Reroots onto the soma and computes flow
/// first when needed; ties go to the node nearest its root, then the
/// smaller id.
#[instrument(level = "debug", skip(tree, opts), fields(skeleton_id = ?tree.skeleton_id))]
pub fn find_cut_point(tree: &mut TreeArena, opts: &SplitOptions) -> DomainResult<NodeId> {
    if opts.reroot_soma && tree.reroot_to_soma()? {
        info!("rerooted neuron {:?} onto its soma", tree.skeleton_id);
    }
    tree.single_root()?;

    let wanted = Computed::Flow {
        method: opts.method,
        polypre: opts.polypre,
    };
    if !tree.memo().contains(wanted) {
        flow_centrality(tree, opts.method, opts.polypre)?;
    }

    let dist = distances_to_root(tree)?;
    let best = tree
        .nodes()
        .filter_map(|n| n.derived.flow_centrality.map(|f| (n.id, f)))
        .max_by(|(a, fa), (b, fb)| {
            let da = dist.get(a).copied().unwrap_or(f64::INFINITY);
            let db = dist.get(b).copied().unwrap_or(f64::INFINITY);
            fa.cmp(fb).then(db.total_cmp(&da)).then(b.cmp(a))
        });

    let (cut, flow) = best.ok_or_else(|| {
        DomainError::MissingAnnotation("no node carries a flow value".to_string())
    })?;
    debug!("cut point {} with flow {}", cut, flow);
    Ok(cut)
}

/// Split into axon, dendrite and (optionally) primary neurite.
///
/// Mutates `tree` only by rerooting and storing flow; the fragments are
/// new trees.
#[instrument(level = "debug", skip(tree, opts), fields(skeleton_id = ?tree.skeleton_id))]
pub fn split_axon_dendrite(tree: &mut TreeArena, opts: &SplitOptions) -> DomainResult<SplitResult> {
    let cut = find_cut_point(tree, opts)?;
    split_at(tree, cut, opts.primary_neurite)
}

/// Split a copy of the one neuron in `neurons`. Collections are rejected
/// with `AmbiguousInput`; use [`Neurons::run`] to split each member.
pub fn split_neuron(neurons: &Neurons, opts: &SplitOptions) -> DomainResult<SplitResult> {
    let mut tree = neurons.single()?.clone();
    split_axon_dendrite(&mut tree, opts)
}

/// Partition `tree` at `cut` and label the fragments.
///
/// With `primary_neurite` and a branching cut, the path from the root down
/// to the cut's parent becomes its own fragment; the cut's subtree and the
/// remaining side branches become axon and dendrite.
pub fn split_at(tree: &TreeArena, cut: NodeId, primary_neurite: bool) -> DomainResult<SplitResult> {
    let (a, b, primary) = match tree.parent_of(cut) {
        Some(_) if primary_neurite && tree.degree(cut) > 2 => {
            match isolate_primary_neurite(tree, cut)? {
                Some((a, b, pn)) => (a, b, Some(pn)),
                None => {
                    let (a, b) = tree.cut(cut)?;
                    (a, b, None)
                }
            }
        }
        Some(_) => {
            let (a, b) = tree.cut(cut)?;
            (a, b, None)
        }
        None => {
            let side = heaviest_child(tree, cut)?;
            let (a, b) = tree.cut(side)?;
            (a, b, None)
        }
    };

    // Axons carry the outputs
    let (mut axon, mut dendrite) = if a.n_presynapses() < b.n_presynapses() {
        (b, a)
    } else {
        (a, b)
    };
    axon.name = format!("{}_axon", tree.name);
    dendrite.name = format!("{}_dendrite", tree.name);
    axon.classify()?;
    dendrite.classify()?;

    let primary_neurite = match primary {
        Some(mut pn) => {
            pn.name = format!("{}_primary_neurite", tree.name);
            pn.classify()?;
            Some(pn)
        }
        None => None,
    };

    info!(
        "split at {}: axon {} nodes / {} pre, dendrite {} nodes / {} pre",
        cut,
        axon.len(),
        axon.n_presynapses(),
        dendrite.len(),
        dendrite.n_presynapses()
    );
    Ok(SplitResult {
        cut,
        axon,
        dendrite,
        primary_neurite,
    })
}

/// (cut subtree, side branches, root-to-parent path). `None` when the path
/// carries no side branches, leaving nothing to pair with the cut subtree.
fn isolate_primary_neurite(
    tree: &TreeArena,
    cut: NodeId,
) -> DomainResult<Option<(TreeArena, TreeArena, TreeArena)>> {
    let path: HashSet<NodeId> = tree.path_to_root(cut)?.into_iter().skip(1).collect();
    let distal: HashSet<NodeId> = tree.iter_subtree(cut).collect();
    let rest: HashSet<NodeId> = tree
        .node_ids()
        .into_iter()
        .filter(|n| !path.contains(n) && !distal.contains(n))
        .collect();
    if rest.is_empty() {
        debug!("no side branches above {}, splitting in two", cut);
        return Ok(None);
    }
    Ok(Some((tree.extract(&distal), tree.extract(&rest), tree.extract(&path))))
}

/// Child of `node` whose subtree holds the most presynapses, smaller id on
/// ties.
fn heaviest_child(tree: &TreeArena, node: NodeId) -> DomainResult<NodeId> {
    let pre_nodes: Vec<NodeId> = tree
        .connectors()
        .filter(|c| c.is_presynaptic())
        .map(|c| c.treenode_id)
        .collect();

    let mut best: Option<(NodeId, usize)> = None;
    for &child in tree.children_of(node) {
        let subtree: HashSet<NodeId> = tree.iter_subtree(child).collect();
        let count = pre_nodes.iter().filter(|n| subtree.contains(n)).count();
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((child, count));
        }
    }
    best.map(|(child, _)| child).ok_or_else(|| {
        DomainError::EmptyResult(format!("node {} has no children to split off", node))
    })
}
