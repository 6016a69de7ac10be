//! Terminal rendering of a skeleton's collapsed topology.
//!
//! Only roots, branch points and ends are shown; each label counts the slab
//! nodes folded into the segment above it.

use std::collections::HashMap;

use termtree::Tree;
use tracing::instrument;

use crate::domain::{NodeId, NodeType, TreeArena};

pub trait TopologyView {
    fn to_tree_string(&self) -> Tree<String>;
}

impl TopologyView for TreeArena {
    #[instrument(level = "debug", skip(self), fields(nodes = self.len()))]
    fn to_tree_string(&self) -> Tree<String> {
        let title = match (self.skeleton_id, self.name.as_str()) {
            (Some(id), "") => format!("neuron {}", id),
            (Some(id), name) => format!("{} ({})", name, id),
            (None, "") => "neuron".to_string(),
            (None, name) => name.to_string(),
        };
        if self.is_empty() {
            return Tree::new(format!("{} (empty)", title));
        }

        // Nearest shown ancestor and folded slab count per node
        let mut anchor: HashMap<NodeId, NodeId> = HashMap::new();
        let mut folded: HashMap<NodeId, usize> = HashMap::new();
        for id in self.iter() {
            let Ok(kind) = self.node_type(id) else { continue };
            let parent = self.parent_of(id);
            let (up, slabs) = match parent {
                None => (id, 0),
                Some(p) => {
                    let up = anchor.get(&p).copied().unwrap_or(p);
                    let slabs = if self.node_type(p).ok() == Some(NodeType::Slab) {
                        folded.get(&p).copied().unwrap_or(0) + 1
                    } else {
                        0
                    };
                    (up, slabs)
                }
            };
            if kind == NodeType::Slab {
                anchor.insert(id, up);
                folded.insert(id, slabs);
            } else {
                anchor.insert(id, id);
                folded.insert(id, slabs);
            }
        }

        let mut pending: HashMap<NodeId, Vec<Tree<String>>> = HashMap::new();
        let mut roots: Vec<Tree<String>> = Vec::new();
        for id in self.iter_postorder() {
            let Ok(kind) = self.node_type(id) else { continue };
            if kind == NodeType::Slab {
                continue;
            }
            let slabs = folded.get(&id).copied().unwrap_or(0);
            let label = if slabs > 0 {
                format!("{} [{}] +{} slab", id, kind, slabs)
            } else {
                format!("{} [{}]", id, kind)
            };
            let leaves = pending.remove(&id).unwrap_or_default();
            let node = Tree::new(label).with_leaves(leaves);

            let shown_parent = self.parent_of(id).and_then(|p| anchor.get(&p).copied());
            match shown_parent {
                Some(p) => pending.entry(p).or_default().push(node),
                None => roots.push(node),
            }
        }
        Tree::new(title).with_leaves(roots)
    }
}
