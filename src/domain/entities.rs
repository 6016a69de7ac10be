//! Domain entities: treenodes, connectors and the modes the algorithms accept

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;

/// Treenode identifier as assigned by the annotation service.
pub type NodeId = i64;

/// Connector identifier as assigned by the annotation service.
pub type ConnectorId = i64;

/// Position of a treenode in stack space (nm).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point3) -> f64 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub fn midpoint(&self, other: &Point3) -> Point3 {
        Point3::new(
            (self.x + other.x) / 2.0,
            (self.y + other.y) / 2.0,
            (self.z + other.z) / 2.0,
        )
    }

    /// Vector pointing from `self` to `other`.
    pub fn towards(&self, other: &Point3) -> Point3 {
        Point3::new(other.x - self.x, other.y - self.y, other.z - self.z)
    }
}

impl fmt::Display for Point3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1}, {:.1})", self.x, self.y, self.z)
    }
}

/// Topological class of a treenode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// No parent
    Root,
    /// Exactly one child and a parent
    Slab,
    /// Two or more children
    Branch,
    /// No children
    End,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeType::Root => "root",
            NodeType::Slab => "slab",
            NodeType::Branch => "branch",
            NodeType::End => "end",
        };
        f.write_str(s)
    }
}

/// Attributes computed by the algorithms. `None` means "not computed",
/// which is distinct from a computed zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Derived {
    pub node_type: Option<NodeType>,
    pub strahler_index: Option<u32>,
    pub flow_centrality: Option<i64>,
    pub arbor_confidence: Option<f64>,
    pub dist_to_root: Option<f64>,
}

/// A single point of the reconstructed skeleton.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub parent_id: Option<NodeId>,
    pub position: Point3,
    pub radius: f64,
    /// Edge confidence towards the parent, 0..=5
    pub confidence: u8,
    pub derived: Derived,
}

impl Node {
    pub fn new(id: NodeId, parent_id: Option<NodeId>, position: Point3) -> Self {
        Self {
            id,
            parent_id,
            position,
            radius: -1.0,
            confidence: 5,
            derived: Derived::default(),
        }
    }

    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_confidence(mut self, confidence: u8) -> Self {
        self.confidence = confidence;
        self
    }
}

/// Synaptic relation of a connector to its treenode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    Presynaptic,
    Postsynaptic,
}

/// A synaptic contact attached to exactly one treenode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connector {
    pub id: ConnectorId,
    pub treenode_id: NodeId,
    pub relation: Relation,
    /// Postsynaptic partner treenodes, only known when connector detail
    /// was fetched
    #[serde(default)]
    pub partner_node_ids: Vec<NodeId>,
}

impl Connector {
    pub fn new(id: ConnectorId, treenode_id: NodeId, relation: Relation) -> Self {
        Self {
            id,
            treenode_id,
            relation,
            partner_node_ids: Vec::new(),
        }
    }

    pub fn with_partners(mut self, partners: Vec<NodeId>) -> Self {
        self.partner_node_ids = partners;
        self
    }

    pub fn is_presynaptic(&self) -> bool {
        self.relation == Relation::Presynaptic
    }

    pub fn is_postsynaptic(&self) -> bool {
        self.relation == Relation::Postsynaptic
    }
}

/// Tie-break policy of the Strahler engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrahlerMethod {
    /// Increase only when two or more branches share the maximum
    #[default]
    Standard,
    /// Increase at every convergence
    Greedy,
}

impl FromStr for StrahlerMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(StrahlerMethod::Standard),
            "greedy" => Ok(StrahlerMethod::Greedy),
            _ => Err(DomainError::InvalidMode {
                kind: "strahler method",
                value: s.to_string(),
            }),
        }
    }
}

/// Flavor of synapse flow used to locate the axon/dendrite boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowMethod {
    /// Proximal inputs to distal outputs
    #[default]
    Centrifugal,
    /// Distal inputs to proximal outputs
    Centripetal,
    Sum,
    /// Flow between sibling branches at branch points
    Bending,
}

impl FromStr for FlowMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "centrifugal" => Ok(FlowMethod::Centrifugal),
            "centripetal" => Ok(FlowMethod::Centripetal),
            "sum" => Ok(FlowMethod::Sum),
            "bending" => Ok(FlowMethod::Bending),
            _ => Err(DomainError::InvalidMode {
                kind: "flow method",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for FlowMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FlowMethod::Centrifugal => "centrifugal",
            FlowMethod::Centripetal => "centripetal",
            FlowMethod::Sum => "sum",
            FlowMethod::Bending => "bending",
        };
        f.write_str(s)
    }
}

/// Candidate selection when joining fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StitchMethod {
    /// Every treenode is a join candidate
    #[default]
    All,
    /// Only root and end nodes are join candidates
    Leafs,
    /// Concatenate tables without joining
    None,
}

impl FromStr for StitchMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ALL" => Ok(StitchMethod::All),
            "LEAFS" | "LEAVES" => Ok(StitchMethod::Leafs),
            "NONE" => Ok(StitchMethod::None),
            _ => Err(DomainError::InvalidMode {
                kind: "stitch method",
                value: s.to_string(),
            }),
        }
    }
}
