//! Arena-backed neuron skeleton.
//!
//! Nodes live in a generational arena and reference each other only by
//! [`NodeId`]. The child index is derived lazily from the parent links and
//! thrown away whenever the structure changes.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;

use generational_arena::{Arena, Index};
use tracing::{debug, instrument};

use crate::domain::entities::{Connector, ConnectorId, Derived, Node, NodeId, NodeType, Point3};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::memo::{Computed, Memo};

/// Tag marking the soma unless configured otherwise.
pub const DEFAULT_SOMA_TAG: &str = "soma";

/// One neuron: treenodes, connectors, tags and the memo of derived results.
#[derive(Debug, Clone)]
pub struct TreeArena {
    pub skeleton_id: Option<i64>,
    pub name: String,
    arena: Arena<Node>,
    index: HashMap<NodeId, Index>,
    connectors: BTreeMap<ConnectorId, Connector>,
    tags: BTreeMap<String, Vec<NodeId>>,
    soma_tag: String,
    children: OnceLock<HashMap<NodeId, Vec<NodeId>>>,
    memo: Memo,
}

impl Default for TreeArena {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeArena {
    pub fn new() -> Self {
        Self {
            skeleton_id: None,
            name: String::new(),
            arena: Arena::new(),
            index: HashMap::new(),
            connectors: BTreeMap::new(),
            tags: BTreeMap::new(),
            soma_tag: DEFAULT_SOMA_TAG.to_string(),
            children: OnceLock::new(),
            memo: Memo::default(),
        }
    }

    /// Empty tree carrying the same identity and soma tag as `self`.
    pub fn empty_like(&self) -> Self {
        Self {
            skeleton_id: self.skeleton_id,
            name: self.name.clone(),
            soma_tag: self.soma_tag.clone(),
            ..Self::new()
        }
    }

    // ------------------------------------------------------------
    // Construction and mutation
    // ------------------------------------------------------------

    /// Insert a node. Parent references are not checked here; `classify`
    /// validates them.
    pub fn insert_node(&mut self, node: Node) -> DomainResult<()> {
        if self.index.contains_key(&node.id) {
            return Err(DomainError::malformed(node.id, "duplicate treenode id"));
        }
        let id = node.id;
        let idx = self.arena.insert(node);
        self.index.insert(id, idx);
        self.children = OnceLock::new();
        self.memo.clear();
        Ok(())
    }

    pub fn insert_connector(&mut self, connector: Connector) -> DomainResult<()> {
        if !self.index.contains_key(&connector.treenode_id) {
            return Err(DomainError::malformed(
                connector.treenode_id,
                format!("connector {} references unknown treenode", connector.id),
            ));
        }
        if self.connectors.contains_key(&connector.id) {
            return Err(DomainError::malformed(
                connector.treenode_id,
                format!("duplicate connector id {}", connector.id),
            ));
        }
        self.connectors.insert(connector.id, connector);
        Ok(())
    }

    pub fn add_tag(&mut self, tag: &str, node: NodeId) {
        let ids = self.tags.entry(tag.to_string()).or_default();
        if !ids.contains(&node) {
            ids.push(node);
        }
    }

    pub fn set_soma_tag(&mut self, tag: &str) {
        self.soma_tag = tag.to_string();
    }

    /// Point `node` at a new parent (or make it a root).
    pub fn set_parent(&mut self, node: NodeId, parent: Option<NodeId>) -> DomainResult<()> {
        if let Some(p) = parent {
            if !self.contains(p) {
                return Err(DomainError::UnknownNode(p));
            }
        }
        let idx = *self.index.get(&node).ok_or(DomainError::UnknownNode(node))?;
        if let Some(n) = self.arena.get_mut(idx) {
            n.parent_id = parent;
        }
        self.structure_changed(false);
        Ok(())
    }

    /// Rewrite a parent link without checks or invalidation. Callers batch
    /// these and call `structure_changed` once at the end.
    pub(crate) fn set_parent_unchecked(&mut self, node: NodeId, parent: Option<NodeId>) {
        if let Some(n) = self.index.get(&node).and_then(|&idx| self.arena.get_mut(idx)) {
            n.parent_id = parent;
        }
    }

    /// Remove the given nodes. Connectors and dangling parent links are left
    /// for the caller to repair.
    pub(crate) fn remove_nodes(&mut self, ids: &HashSet<NodeId>) {
        for id in ids {
            if let Some(idx) = self.index.remove(id) {
                self.arena.remove(idx);
            }
        }
        for nodes in self.tags.values_mut() {
            nodes.retain(|n| !ids.contains(n));
        }
        self.tags.retain(|_, nodes| !nodes.is_empty());
    }

    pub(crate) fn connectors_mut(&mut self) -> &mut BTreeMap<ConnectorId, Connector> {
        &mut self.connectors
    }

    pub fn derived_mut(&mut self, node: NodeId) -> Option<&mut Derived> {
        let idx = *self.index.get(&node)?;
        self.arena.get_mut(idx).map(|n| &mut n.derived)
    }

    pub fn memo(&self) -> &Memo {
        &self.memo
    }

    pub(crate) fn memo_mut(&mut self) -> &mut Memo {
        &mut self.memo
    }

    /// Drop the child index and derived attributes after a structural edit.
    ///
    /// Pruning keeps the Strahler indices it pruned by, so repeated pruning
    /// with the same target is stable.
    pub(crate) fn structure_changed(&mut self, keep_strahler: bool) {
        self.children = OnceLock::new();
        let strahler = self.memo.strahler_method();
        self.memo.clear();
        for (_, node) in self.arena.iter_mut() {
            let kept = node.derived.strahler_index;
            node.derived = Derived::default();
            if keep_strahler {
                node.derived.strahler_index = kept;
            }
        }
        if keep_strahler {
            if let Some(m) = strahler {
                self.memo.record(Computed::Strahler(m));
            }
        }
    }

    /// Move every node, connector and tag of `other` into `self`.
    pub fn absorb(&mut self, other: TreeArena) -> DomainResult<()> {
        if let Some(dup) = other.index.keys().find(|id| self.index.contains_key(id)) {
            return Err(DomainError::malformed(*dup, "treenode present in both trees"));
        }
        if let Some(dup) = other.connectors.keys().find(|id| self.connectors.contains_key(id)) {
            return Err(DomainError::malformed(
                other.connectors[dup].treenode_id,
                format!("connector {} present in both trees", dup),
            ));
        }
        for (tag, nodes) in other.tags {
            for n in nodes {
                self.add_tag(&tag, n);
            }
        }
        for node in other.arena {
            let id = node.id;
            let idx = self.arena.insert(node);
            self.index.insert(id, idx);
        }
        self.connectors.extend(other.connectors);
        self.structure_changed(false);
        Ok(())
    }

    // ------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.index.get(&id).and_then(|&idx| self.arena.get(idx))
    }

    pub fn get(&self, id: NodeId) -> DomainResult<&Node> {
        self.node(id).ok_or(DomainError::UnknownNode(id))
    }

    pub fn position(&self, id: NodeId) -> DomainResult<Point3> {
        self.get(id).map(|n| n.position)
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent_id)
    }

    /// Nodes in arena order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.arena.iter().map(|(_, n)| n)
    }

    /// Node ids in ascending order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.index.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn connectors(&self) -> impl Iterator<Item = &Connector> {
        self.connectors.values()
    }

    pub fn connector(&self, id: ConnectorId) -> Option<&Connector> {
        self.connectors.get(&id)
    }

    pub fn n_connectors(&self) -> usize {
        self.connectors.len()
    }

    pub fn n_presynapses(&self) -> usize {
        self.connectors().filter(|c| c.is_presynaptic()).count()
    }

    pub fn n_postsynapses(&self) -> usize {
        self.connectors().filter(|c| c.is_postsynaptic()).count()
    }

    pub fn tags(&self) -> &BTreeMap<String, Vec<NodeId>> {
        &self.tags
    }

    pub fn soma_tag(&self) -> &str {
        &self.soma_tag
    }

    /// First existing node carrying the soma tag.
    pub fn soma(&self) -> Option<NodeId> {
        self.tags
            .get(&self.soma_tag)
            .and_then(|ids| ids.iter().copied().find(|id| self.contains(*id)))
    }

    // ------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------

    /// Child lists keyed by parent id, children in ascending id order.
    pub fn children_index(&self) -> &HashMap<NodeId, Vec<NodeId>> {
        self.children.get_or_init(|| {
            let mut map: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
            for (_, node) in self.arena.iter() {
                if let Some(p) = node.parent_id {
                    map.entry(p).or_default().push(node.id);
                }
            }
            for children in map.values_mut() {
                children.sort_unstable();
            }
            map
        })
    }

    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        self.children_index()
            .get(&id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Children count plus one if the node has a parent.
    pub fn degree(&self, id: NodeId) -> usize {
        let up = usize::from(self.parent_of(id).is_some());
        self.children_of(id).len() + up
    }

    /// Root ids in ascending order.
    pub fn roots(&self) -> Vec<NodeId> {
        let mut roots: Vec<NodeId> = self
            .nodes()
            .filter(|n| n.parent_id.is_none())
            .map(|n| n.id)
            .collect();
        roots.sort_unstable();
        roots
    }

    /// The only root, or `MalformedTree` for a multi-rooted (or empty) tree.
    pub fn single_root(&self) -> DomainResult<NodeId> {
        let roots = self.roots();
        match roots.as_slice() {
            [root] => Ok(*root),
            [] => Err(DomainError::EmptyResult("tree has no nodes".to_string())),
            [first, ..] => Err(DomainError::malformed(
                *first,
                format!("expected one root, found {}", roots.len()),
            )),
        }
    }

    /// Topological class derived from the current parent links.
    pub fn node_type(&self, id: NodeId) -> DomainResult<NodeType> {
        let node = self.get(id)?;
        let n_children = self.children_of(id).len();
        Ok(match (node.parent_id, n_children) {
            (None, _) => NodeType::Root,
            (Some(_), 0) => NodeType::End,
            (Some(_), 1) => NodeType::Slab,
            (Some(_), _) => NodeType::Branch,
        })
    }

    /// Any node with two or more children, roots included.
    pub fn is_branch_point(&self, id: NodeId) -> bool {
        self.children_of(id).len() >= 2
    }

    /// Branch points in ascending order, roots included when they branch.
    pub fn branch_points(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .children_index()
            .iter()
            .filter(|(p, c)| c.len() >= 2 && self.contains(**p))
            .map(|(p, _)| *p)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn end_nodes(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .nodes()
            .filter(|n| self.children_of(n.id).is_empty())
            .map(|n| n.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Check parent references and detect cycles without recursion.
    #[instrument(level = "debug", skip(self), fields(nodes = self.len()))]
    pub fn validate(&self) -> DomainResult<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            OnPath,
            Done,
        }
        let mut marks: HashMap<NodeId, Mark> = HashMap::with_capacity(self.len());

        for start in self.node_ids() {
            let mut path = Vec::new();
            let mut current = start;
            loop {
                match marks.get(&current) {
                    Some(Mark::Done) => break,
                    Some(Mark::OnPath) => {
                        return Err(DomainError::malformed(current, "cycle in parent links"))
                    }
                    None => {}
                }
                marks.insert(current, Mark::OnPath);
                path.push(current);
                match self.parent_of(current) {
                    None => break,
                    Some(p) if !self.contains(p) => {
                        return Err(DomainError::malformed(
                            current,
                            format!("parent {} does not exist", p),
                        ))
                    }
                    Some(p) => current = p,
                }
            }
            for id in path {
                marks.insert(id, Mark::Done);
            }
        }
        Ok(())
    }

    /// Validate the tree and store root/slab/branch/end on every node.
    #[instrument(level = "debug", skip(self))]
    pub fn classify(&mut self) -> DomainResult<()> {
        self.validate()?;
        let types: Vec<(NodeId, NodeType)> = self
            .node_ids()
            .into_iter()
            .map(|id| self.node_type(id).map(|t| (id, t)))
            .collect::<DomainResult<_>>()?;
        for (id, t) in types {
            if let Some(d) = self.derived_mut(id) {
                d.node_type = Some(t);
            }
        }
        self.memo.record(Computed::Classification);
        debug!("classified {} nodes", self.len());
        Ok(())
    }

    /// Node ids from `id` up to and including its root.
    pub fn path_to_root(&self, id: NodeId) -> DomainResult<Vec<NodeId>> {
        self.get(id)?;
        let mut path = vec![id];
        let mut current = id;
        while let Some(p) = self.parent_of(current) {
            if !self.contains(p) {
                return Err(DomainError::malformed(current, format!("parent {} does not exist", p)));
            }
            if path.len() > self.len() {
                return Err(DomainError::malformed(id, "cycle in parent links"));
            }
            path.push(p);
            current = p;
        }
        Ok(path)
    }

    /// Pre-order walk starting at every root.
    pub fn iter(&self) -> PreOrder<'_> {
        PreOrder::new(self, self.roots())
    }

    /// Pre-order walk of the subtree below (and including) `id`.
    pub fn iter_subtree(&self, id: NodeId) -> PreOrder<'_> {
        PreOrder::new(self, vec![id])
    }

    pub fn iter_postorder(&self) -> PostOrder<'_> {
        PostOrder::new(self, self.roots())
    }

    pub fn subtree(&self, id: NodeId) -> DomainResult<Vec<NodeId>> {
        self.get(id)?;
        Ok(self.iter_subtree(id).collect())
    }

    /// Make `new_root` the root by reversing the parent links on the path
    /// from it to the current root.
    #[instrument(level = "debug", skip(self))]
    pub fn reroot(&mut self, new_root: NodeId) -> DomainResult<()> {
        let path = self.path_to_root(new_root)?;
        if path.len() == 1 {
            return Ok(());
        }
        for pair in path.windows(2) {
            let (child, parent) = (pair[0], pair[1]);
            let idx = self.index[&parent];
            if let Some(n) = self.arena.get_mut(idx) {
                n.parent_id = Some(child);
            }
        }
        let idx = self.index[&new_root];
        if let Some(n) = self.arena.get_mut(idx) {
            n.parent_id = None;
        }
        self.structure_changed(false);
        debug!("rerooted onto {} (path of {} nodes)", new_root, path.len());
        Ok(())
    }

    /// Reroot onto the soma if there is one and it is not already a root.
    /// Returns whether the tree changed.
    pub fn reroot_to_soma(&mut self) -> DomainResult<bool> {
        match self.soma() {
            Some(soma) if self.parent_of(soma).is_some() => {
                self.reroot(soma)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Copy of the nodes in `keep`, with their connectors and tags. Nodes
    /// whose parent is not kept become roots.
    pub fn extract(&self, keep: &HashSet<NodeId>) -> TreeArena {
        let mut out = self.empty_like();
        for node in self.nodes().filter(|n| keep.contains(&n.id)) {
            let mut copy = node.clone();
            copy.parent_id = copy.parent_id.filter(|p| keep.contains(p));
            copy.derived = Derived::default();
            let id = copy.id;
            let idx = out.arena.insert(copy);
            out.index.insert(id, idx);
        }
        for c in self.connectors().filter(|c| keep.contains(&c.treenode_id)) {
            out.connectors.insert(c.id, c.clone());
        }
        for (tag, nodes) in &self.tags {
            for n in nodes.iter().filter(|n| keep.contains(n)) {
                out.add_tag(tag, *n);
            }
        }
        out
    }

    /// Split at `id` into (distal, proximal). The distal fragment is the
    /// subtree rooted at `id`; the proximal fragment holds everything else.
    #[instrument(level = "debug", skip(self))]
    pub fn cut(&self, id: NodeId) -> DomainResult<(TreeArena, TreeArena)> {
        let distal: HashSet<NodeId> = self.subtree(id)?.into_iter().collect();
        let proximal: HashSet<NodeId> = self
            .index
            .keys()
            .filter(|n| !distal.contains(n))
            .copied()
            .collect();
        if proximal.is_empty() {
            return Err(DomainError::EmptyResult(format!(
                "cutting at {} leaves no proximal nodes",
                id
            )));
        }
        Ok((self.extract(&distal), self.extract(&proximal)))
    }

    /// Treenode -> connectors on it.
    pub fn connectors_by_node(&self) -> HashMap<NodeId, Vec<&Connector>> {
        let mut map: HashMap<NodeId, Vec<&Connector>> = HashMap::new();
        for c in self.connectors() {
            map.entry(c.treenode_id).or_default().push(c);
        }
        map
    }
}

/// Iterative pre-order traversal over node ids.
pub struct PreOrder<'a> {
    tree: &'a TreeArena,
    stack: Vec<NodeId>,
}

impl<'a> PreOrder<'a> {
    fn new(tree: &'a TreeArena, mut starts: Vec<NodeId>) -> Self {
        starts.retain(|id| tree.contains(*id));
        starts.reverse();
        Self { tree, stack: starts }
    }
}

impl Iterator for PreOrder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;
        // Reverse push keeps ascending child order
        for &child in self.tree.children_of(current).iter().rev() {
            self.stack.push(child);
        }
        Some(current)
    }
}

/// Iterative post-order traversal: children before their parent.
pub struct PostOrder<'a> {
    tree: &'a TreeArena,
    stack: Vec<(NodeId, bool)>,
}

impl<'a> PostOrder<'a> {
    fn new(tree: &'a TreeArena, starts: Vec<NodeId>) -> Self {
        let stack = starts
            .into_iter()
            .rev()
            .filter(|id| tree.contains(*id))
            .map(|id| (id, false))
            .collect();
        Self { tree, stack }
    }
}

impl Iterator for PostOrder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((current, visited)) = self.stack.pop() {
            if visited {
                return Some(current);
            }
            self.stack.push((current, true));
            for &child in self.tree.children_of(current).iter().rev() {
                self.stack.push((child, false));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(n: i64) -> TreeArena {
        let mut tree = TreeArena::new();
        for id in 1..=n {
            let parent = if id == 1 { None } else { Some(id - 1) };
            tree.insert_node(Node::new(id, parent, Point3::new(id as f64, 0.0, 0.0)))
                .unwrap();
        }
        tree
    }

    #[test]
    fn test_postorder_visits_children_first() {
        let tree = chain(4);
        let order: Vec<NodeId> = tree.iter_postorder().collect();
        assert_eq!(order, vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_deep_chain_walks_without_recursion() {
        let tree = chain(50_000);
        assert_eq!(tree.iter().count(), 50_000);
        assert_eq!(tree.path_to_root(50_000).unwrap().len(), 50_000);
        tree.validate().unwrap();
    }

    #[test]
    fn test_child_index_rebuilt_after_set_parent() {
        let mut tree = chain(3);
        assert_eq!(tree.children_of(1), &[2]);
        tree.set_parent(3, Some(1)).unwrap();
        assert_eq!(tree.children_of(1), &[2, 3]);
        assert!(tree.children_of(2).is_empty());
    }
}
