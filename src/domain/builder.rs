//! Tree builder: turns fetched node/connector tables into a validated tree.

use tracing::{debug, instrument};

use crate::domain::arena::TreeArena;
use crate::domain::entities::{Connector, Node, NodeId};
use crate::domain::error::{DomainError, DomainResult};

/// Constructs a [`TreeArena`] from node and connector tables.
pub struct TreeBuilder {
    nodes: Vec<Node>,
    connectors: Vec<Connector>,
    tags: Vec<(String, NodeId)>,
    skeleton_id: Option<i64>,
    name: String,
    soma_tag: Option<String>,
    soma_radius: Option<f64>,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            connectors: Vec::new(),
            tags: Vec::new(),
            skeleton_id: None,
            name: String::new(),
            soma_tag: None,
            soma_radius: None,
        }
    }

    pub fn skeleton_id(mut self, id: i64) -> Self {
        self.skeleton_id = Some(id);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn nodes(mut self, nodes: impl IntoIterator<Item = Node>) -> Self {
        self.nodes.extend(nodes);
        self
    }

    pub fn connector(mut self, connector: Connector) -> Self {
        self.connectors.push(connector);
        self
    }

    pub fn connectors(mut self, connectors: impl IntoIterator<Item = Connector>) -> Self {
        self.connectors.extend(connectors);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>, node: NodeId) -> Self {
        self.tags.push((tag.into(), node));
        self
    }

    /// Tag used to find the soma (default `soma`).
    pub fn soma_tag(mut self, tag: impl Into<String>) -> Self {
        self.soma_tag = Some(tag.into());
        self
    }

    /// Without a soma tag, tag the widest node whose radius reaches
    /// `radius` as soma.
    pub fn soma_radius(mut self, radius: Option<f64>) -> Self {
        self.soma_radius = radius;
        self
    }

    /// Build and classify the tree. Fails on duplicate ids, connectors on
    /// unknown treenodes, dangling parents and cycles.
    #[instrument(level = "debug", skip(self), fields(nodes = self.nodes.len(), connectors = self.connectors.len()))]
    pub fn build(mut self) -> DomainResult<TreeArena> {
        let mut tree = TreeArena::new();
        tree.skeleton_id = self.skeleton_id;
        tree.name = std::mem::take(&mut self.name);
        if let Some(tag) = &self.soma_tag {
            tree.set_soma_tag(tag);
        }

        for node in std::mem::take(&mut self.nodes) {
            tree.insert_node(node)?;
        }
        for connector in std::mem::take(&mut self.connectors) {
            tree.insert_connector(connector)?;
        }
        for (tag, node) in &self.tags {
            if !tree.contains(*node) {
                return Err(DomainError::UnknownNode(*node));
            }
            tree.add_tag(tag, *node);
        }

        if tree.soma().is_none() {
            if let Some(min_radius) = self.soma_radius {
                let widest = tree
                    .nodes()
                    .filter(|n| n.radius >= min_radius)
                    .max_by(|a, b| a.radius.total_cmp(&b.radius).then(b.id.cmp(&a.id)))
                    .map(|n| n.id);
                if let Some(soma) = widest {
                    debug!("tagging node {} as soma by radius", soma);
                    let tag = tree.soma_tag().to_string();
                    tree.add_tag(&tag, soma);
                }
            }
        }

        tree.classify()?;
        Ok(tree)
    }
}
