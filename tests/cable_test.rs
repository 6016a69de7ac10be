//! Tests for cable length, distances, dotprops and downsampling

use std::collections::HashSet;

use neurite::application::cable::{cable_length, dist_to_root, distances_to_root, dotprops, downsample};
use neurite::domain::{Computed, Connector, Relation};
use neurite::util::testing::{bipolar_tree, chain, init_test_setup, seven_node_tree};

#[test]
fn given_chain_when_measuring_then_cable_is_sum_of_edges() {
    init_test_setup();
    assert_eq!(cable_length(&chain(4)), 3.0);
    assert_eq!(cable_length(&chain(1)), 0.0);
}

#[test]
fn given_seven_node_tree_when_measuring_then_diagonal_and_straight_edges_add_up() {
    let tree = seven_node_tree();

    let expected = 4.0 * std::f64::consts::SQRT_2 + 2.0;

    assert!((cable_length(&tree) - expected).abs() < 1e-12);
}

#[test]
fn given_tree_when_computing_distances_then_root_is_zero_and_paths_accumulate() {
    let tree = bipolar_tree();

    let dist = distances_to_root(&tree).unwrap();

    assert_eq!(dist[&1], 0.0);
    assert_eq!(dist[&3], 2.0);
    assert!((dist[&9] - (2.0 + 2.0 * std::f64::consts::SQRT_2)).abs() < 1e-12);
}

#[test]
fn given_tree_when_storing_dist_to_root_then_every_node_has_a_value() {
    let mut tree = chain(5);

    dist_to_root(&mut tree).unwrap();

    assert_eq!(tree.node(5).unwrap().derived.dist_to_root, Some(4.0));
    assert!(tree.memo().contains(Computed::DistToRoot));
}

#[test]
fn given_tree_when_computing_dotprops_then_one_per_edge() {
    let tree = seven_node_tree();

    let dps = dotprops(&tree);

    assert_eq!(dps.len(), 6);
    assert_eq!(dps.iter().map(|d| d.node).collect::<Vec<_>>(), vec![2, 3, 4, 5, 6, 7]);
}

#[test]
fn given_synapse_on_slab_when_downsampling_then_it_survives() {
    // Arrange
    let mut tree = chain(10);
    tree.insert_connector(Connector::new(1, 3, Relation::Postsynaptic))
        .unwrap();

    // Act
    let removed = downsample(&mut tree, 100, &HashSet::new()).unwrap();

    // Assert
    assert_eq!(tree.node_ids(), vec![1, 3, 10]);
    assert_eq!(removed, 7);
    assert_eq!(tree.parent_of(3), Some(1));
    assert_eq!(tree.parent_of(10), Some(3));
    assert_eq!(tree.connector(1).unwrap().treenode_id, 3);
}

#[test]
fn given_branched_tree_when_downsampling_then_topology_is_kept() {
    let mut tree = bipolar_tree();

    downsample(&mut tree, 5, &HashSet::new()).unwrap();

    assert_eq!(tree.branch_points(), vec![3, 4, 5]);
    assert_eq!(tree.end_nodes(), vec![6, 7, 8, 9]);
    assert_eq!(tree.parent_of(3), Some(1));
    assert_eq!(tree.n_connectors(), 4);
}

#[test]
fn given_factor_one_when_downsampling_then_nothing_is_removed() {
    let mut tree = chain(6);

    assert_eq!(downsample(&mut tree, 1, &HashSet::new()).unwrap(), 0);
    assert_eq!(tree.len(), 6);
}
