//! Record of which derived attributes are currently valid on a tree.

use std::collections::HashSet;

use crate::domain::entities::{FlowMethod, StrahlerMethod};

/// Derived computation keyed by algorithm and mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Computed {
    Classification,
    Strahler(StrahlerMethod),
    Flow { method: FlowMethod, polypre: bool },
    Confidence,
    DistToRoot,
}

/// Memo attached to a tree. Structural mutation clears it.
#[derive(Debug, Clone, Default)]
pub struct Memo {
    entries: HashSet<Computed>,
}

impl Memo {
    pub fn contains(&self, key: Computed) -> bool {
        self.entries.contains(&key)
    }

    /// Record `key`, replacing any entry of the same algorithm with a
    /// different mode (a tree holds one flow and one Strahler result).
    pub fn record(&mut self, key: Computed) {
        self.entries.retain(|k| !same_algorithm(k, &key));
        self.entries.insert(key);
    }

    /// Flow method currently stored on the nodes, if any.
    pub fn flow_method(&self) -> Option<FlowMethod> {
        self.entries.iter().find_map(|k| match k {
            Computed::Flow { method, .. } => Some(*method),
            _ => None,
        })
    }

    /// Whether the stored flow was weighted by presynaptic partners.
    pub fn flow_polypre(&self) -> Option<bool> {
        self.entries.iter().find_map(|k| match k {
            Computed::Flow { polypre, .. } => Some(*polypre),
            _ => None,
        })
    }

    pub fn strahler_method(&self) -> Option<StrahlerMethod> {
        self.entries.iter().find_map(|k| match k {
            Computed::Strahler(m) => Some(*m),
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn same_algorithm(a: &Computed, b: &Computed) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}
