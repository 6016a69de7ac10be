//! Tests for the segregation index

use neurite::application::segregation::{
    entropy, segregation, segregation_index, tree_segregation, SegregationOptions,
};
use neurite::application::split::{split_axon_dendrite, SplitOptions};
use neurite::application::Neurons;
use neurite::domain::{Connector, DomainError, Point3, Relation, TreeArena};
use neurite::util::testing::{bipolar_tree, chain_from, init_test_setup};

/// Two-node fragment starting at `first` with `pre` presynapses and `post`
/// postsynapses, all on its first node.
fn fragment(first: i64, pre: usize, post: usize) -> TreeArena {
    let mut tree = chain_from(first, 2, Point3::default());
    let relations = std::iter::repeat(Relation::Presynaptic)
        .take(pre)
        .chain(std::iter::repeat(Relation::Postsynaptic).take(post));
    for (k, relation) in relations.enumerate() {
        let id = first * 100 + k as i64;
        tree.insert_connector(Connector::new(id, first, relation))
            .unwrap();
    }
    tree
}

fn swapped(tree: &TreeArena) -> TreeArena {
    let mut out = chain_from(tree.node_ids()[0], 2, Point3::default());
    for c in tree.connectors() {
        let relation = match c.relation {
            Relation::Presynaptic => Relation::Postsynaptic,
            Relation::Postsynaptic => Relation::Presynaptic,
        };
        out.insert_connector(Connector::new(c.id, c.treenode_id, relation))
            .unwrap();
    }
    out
}

#[test]
fn given_fully_separated_fragments_when_indexing_then_one() {
    init_test_setup();
    let a = fragment(1, 4, 0);
    let b = fragment(10, 0, 4);

    let h = segregation_index([&a, &b]).unwrap();

    assert!((h - 1.0).abs() < 1e-12);
}

#[test]
fn given_identically_mixed_fragments_when_indexing_then_zero() {
    let a = fragment(1, 2, 2);
    let b = fragment(10, 3, 3);

    let h = segregation_index([&a, &b]).unwrap();

    assert!(h.abs() < 1e-12);
}

#[test]
fn given_partial_separation_when_indexing_then_between_zero_and_one() {
    let a = fragment(1, 1, 3);
    let b = fragment(10, 3, 1);

    let h = segregation_index([&a, &b]).unwrap();

    let expected = 1.0 - entropy(0.25) / std::f64::consts::LN_2;
    assert!((h - expected).abs() < 1e-12);
    assert!(h > 0.0 && h < 1.0);
}

#[test]
fn given_swapped_labels_when_indexing_then_index_is_unchanged() {
    let a = fragment(1, 1, 3);
    let b = fragment(10, 4, 2);

    let h = segregation_index([&a, &b]).unwrap();
    let h_swapped = segregation_index([&swapped(&a), &swapped(&b)]).unwrap();
    let h_reordered = segregation_index([&b, &a]).unwrap();

    assert!((h - h_swapped).abs() < 1e-12);
    assert!((h - h_reordered).abs() < 1e-12);
}

#[test]
fn given_fragment_without_connectors_when_indexing_then_it_is_skipped() {
    let a = fragment(1, 4, 0);
    let empty = fragment(5, 0, 0);
    let b = fragment(10, 0, 4);

    let h = segregation_index([&a, &empty, &b]).unwrap();

    assert!((h - 1.0).abs() < 1e-12);
}

#[test]
fn given_only_postsynapses_when_indexing_then_zero() {
    let a = fragment(1, 0, 2);
    let b = fragment(10, 0, 5);

    assert_eq!(segregation_index([&a, &b]).unwrap(), 0.0);
}

#[test]
fn given_no_connectors_at_all_when_indexing_then_missing_annotation() {
    let a = fragment(1, 0, 0);
    let b = fragment(10, 0, 0);

    assert!(matches!(
        segregation_index([&a, &b]),
        Err(DomainError::MissingAnnotation(_))
    ));
}

#[test]
fn given_single_fragment_when_indexing_then_ambiguous() {
    let a = fragment(1, 1, 1);

    assert!(matches!(
        segregation_index([&a]),
        Err(DomainError::AmbiguousInput(_))
    ));
}

// ============================================================
// Whole neurons
// ============================================================

#[test]
fn given_bipolar_neuron_when_computing_segregation_then_fully_segregated() {
    let tree = bipolar_tree();

    let h = tree_segregation(&tree, &SegregationOptions::default()).unwrap();

    assert!((h - 1.0).abs() < 1e-12);
    assert_eq!(tree.len(), 9, "input must not be downsampled");
    assert!(tree.nodes().all(|n| n.derived.flow_centrality.is_none()));
}

#[test]
fn given_split_fragments_when_computing_segregation_of_collection_then_same_index() {
    let mut tree = bipolar_tree();
    let split = split_axon_dendrite(&mut tree, &SplitOptions::default()).unwrap();

    let h_single = segregation(&Neurons::from(bipolar_tree()), &SegregationOptions::default()).unwrap();
    let h_fragments = segregation(
        &Neurons::from(split.into_fragments()),
        &SegregationOptions::default(),
    )
    .unwrap();

    assert!((h_single - h_fragments).abs() < 1e-12);
}
