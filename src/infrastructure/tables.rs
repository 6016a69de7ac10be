//! Node and connector tables as JSON: the exchange format with the data
//! fetching side and with downstream reporting.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::domain::{Connector, Node, NodeId, NodeType, Point3, TreeArena, TreeBuilder};
use crate::infrastructure::error::{InfraError, InfraResult};
use crate::infrastructure::traits::FileSystem;

fn default_radius() -> f64 {
    -1.0
}

fn default_confidence() -> u8 {
    5
}

/// One row of the node table. Derived columns are only written on export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub parent_id: Option<NodeId>,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default = "default_radius")]
    pub radius: f64,
    #[serde(default = "default_confidence")]
    pub confidence: u8,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strahler_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_centrality: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arbor_confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dist_to_root: Option<f64>,
}

impl From<&Node> for NodeRecord {
    fn from(n: &Node) -> Self {
        Self {
            id: n.id,
            parent_id: n.parent_id,
            x: n.position.x,
            y: n.position.y,
            z: n.position.z,
            radius: n.radius,
            confidence: n.confidence,
            node_type: n.derived.node_type,
            strahler_index: n.derived.strahler_index,
            flow_centrality: n.derived.flow_centrality,
            arbor_confidence: n.derived.arbor_confidence,
            dist_to_root: n.derived.dist_to_root,
        }
    }
}

impl From<NodeRecord> for Node {
    fn from(r: NodeRecord) -> Self {
        Node::new(r.id, r.parent_id, Point3::new(r.x, r.y, r.z))
            .with_radius(r.radius)
            .with_confidence(r.confidence)
    }
}

/// Tables of one neuron.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuronTables {
    #[serde(default)]
    pub skeleton_id: Option<i64>,
    #[serde(default)]
    pub name: String,
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub connectors: Vec<Connector>,
    #[serde(default)]
    pub tags: BTreeMap<String, Vec<NodeId>>,
}

impl NeuronTables {
    /// Export a tree including its derived columns.
    pub fn from_tree(tree: &TreeArena) -> Self {
        let mut nodes: Vec<NodeRecord> = tree.nodes().map(NodeRecord::from).collect();
        nodes.sort_by_key(|n| n.id);
        Self {
            skeleton_id: tree.skeleton_id,
            name: tree.name.clone(),
            nodes,
            connectors: tree.connectors().cloned().collect(),
            tags: tree.tags().clone(),
        }
    }

    /// Build and classify the tree. Derived columns in the input are ignored.
    pub fn into_tree(self, soma_tag: &str, soma_radius: Option<f64>) -> InfraResult<TreeArena> {
        let mut builder = TreeBuilder::new()
            .name(self.name)
            .soma_tag(soma_tag)
            .soma_radius(soma_radius)
            .nodes(self.nodes.into_iter().map(Node::from))
            .connectors(self.connectors);
        if let Some(id) = self.skeleton_id {
            builder = builder.skeleton_id(id);
        }
        for (tag, ids) in self.tags {
            for id in ids {
                builder = builder.tag(tag.clone(), id);
            }
        }
        Ok(builder.build()?)
    }
}

/// A file holds one neuron or a list of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TablesFile {
    Many(Vec<NeuronTables>),
    One(NeuronTables),
}

/// Reads and writes [`NeuronTables`] through a [`FileSystem`].
#[derive(Clone)]
pub struct TableStore {
    fs: Arc<dyn FileSystem>,
}

impl TableStore {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    #[instrument(level = "debug", skip(self))]
    pub fn load(&self, path: &Path) -> InfraResult<Vec<NeuronTables>> {
        let content = self
            .fs
            .read_to_string(path)
            .map_err(|e| InfraError::io(format!("read {}", path.display()), e))?;
        let parsed: TablesFile = serde_json::from_str(&content).map_err(|e| InfraError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        let tables = match parsed {
            TablesFile::Many(many) => many,
            TablesFile::One(one) => vec![one],
        };
        debug!("loaded {} neurons from {}", tables.len(), path.display());
        Ok(tables)
    }

    /// Write one neuron as an object, several as a list.
    #[instrument(level = "debug", skip(self, tables), fields(n = tables.len()))]
    pub fn save(&self, path: &Path, tables: &[NeuronTables]) -> InfraResult<()> {
        let json = match tables {
            [one] => serde_json::to_string_pretty(one),
            many => serde_json::to_string_pretty(many),
        }
        .map_err(|e| InfraError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.fs
            .write(path, &json)
            .map_err(|e| InfraError::io(format!("write {}", path.display()), e))
    }
}
