//! Arbor confidence: downstream confidence decays with every low-confidence edge.

use tracing::{debug, instrument};

use crate::domain::{Computed, DomainError, DomainResult, NodeId, TreeArena};

/// Retention factor per edge confidence, indexed directly by confidence
/// (confidence 5 keeps everything, confidence 1 keeps a fifth).
pub const DEFAULT_CONFIDENCE_FACTORS: [f64; 6] = [1.0, 0.2, 0.4, 0.6, 0.9, 1.0];

/// Propagate `arbor_confidence` from every root (seeded at 1.0) towards the
/// leaves, multiplying by the factor of each node's edge confidence.
#[instrument(level = "debug", skip(tree), fields(nodes = tree.len()))]
pub fn arbor_confidence(tree: &mut TreeArena, factors: &[f64; 6]) -> DomainResult<()> {
    tree.validate()?;

    let mut values: Vec<(NodeId, f64)> = Vec::with_capacity(tree.len());
    let mut stack: Vec<(NodeId, f64)> = tree.roots().into_iter().map(|r| (r, 1.0)).collect();

    while let Some((node, confidence)) = stack.pop() {
        values.push((node, confidence));
        for &child in tree.children_of(node) {
            let edge = tree.get(child)?.confidence;
            let factor = factors
                .get(usize::from(edge))
                .ok_or_else(|| DomainError::malformed(child, format!("confidence {} out of range", edge)))?;
            stack.push((child, confidence * factor));
        }
    }

    for (node, confidence) in values {
        if let Some(d) = tree.derived_mut(node) {
            d.arbor_confidence = Some(confidence);
        }
    }
    tree.memo_mut().record(Computed::Confidence);
    debug!("arbor confidence assigned");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Node, Point3, TreeBuilder};

    #[test]
    fn test_confidence_multiplies_along_path() {
        let mut tree = TreeBuilder::new()
            .node(Node::new(1, None, Point3::default()))
            .node(Node::new(2, Some(1), Point3::default()).with_confidence(4))
            .node(Node::new(3, Some(2), Point3::default()).with_confidence(1))
            .node(Node::new(4, Some(1), Point3::default()))
            .build()
            .unwrap();

        arbor_confidence(&mut tree, &DEFAULT_CONFIDENCE_FACTORS).unwrap();

        let conf = |id| tree.node(id).unwrap().derived.arbor_confidence.unwrap();
        assert_eq!(conf(1), 1.0);
        assert!((conf(2) - 0.9).abs() < 1e-12);
        assert!((conf(3) - 0.18).abs() < 1e-12);
        assert_eq!(conf(4), 1.0);
    }

    #[test]
    fn test_confidence_above_five_is_malformed() {
        let mut tree = TreeBuilder::new()
            .node(Node::new(1, None, Point3::default()))
            .node(Node::new(2, Some(1), Point3::default()).with_confidence(9))
            .build()
            .unwrap();

        let err = arbor_confidence(&mut tree, &DEFAULT_CONFIDENCE_FACTORS).unwrap_err();
        assert!(matches!(err, DomainError::MalformedTree { node: 2, .. }));
    }
}
