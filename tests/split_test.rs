//! Tests for cut point selection and axon/dendrite splitting

use rstest::{fixture, rstest};

use neurite::application::flow::flow_centrality;
use neurite::application::split::{
    find_cut_point, split_at, split_axon_dendrite, split_neuron, SplitOptions,
};
use neurite::application::Neurons;
use neurite::domain::{
    Computed, Connector, ConnectorId, DomainError, FlowMethod, Node, NodeId, Point3, Relation,
    TreeArena, TreeBuilder,
};
use neurite::util::testing::{bipolar_tree, init_test_setup, seven_node_tree};

#[fixture]
fn bipolar() -> TreeArena {
    init_test_setup();
    bipolar_tree()
}

/// Seven-node binary tree with the topology and synapses of
/// `seven_node_tree`, node 6 placed at `pos6`. Presynapses on 4 and 6 give
/// both a centrifugal flow of 2.
fn mirrored_tree(pos6: Point3) -> TreeArena {
    let nodes = [
        (1, None, Point3::new(0.0, 0.0, 0.0)),
        (2, Some(1), Point3::new(-1.0, 1.0, 0.0)),
        (3, Some(1), Point3::new(1.0, 1.0, 0.0)),
        (4, Some(2), Point3::new(-2.0, 2.0, 0.0)),
        (5, Some(2), Point3::new(-0.5, 2.0, 0.0)),
        (6, Some(3), pos6),
        (7, Some(3), Point3::new(0.5, 2.0, 0.0)),
    ];
    TreeBuilder::new()
        .nodes(nodes.into_iter().map(|(id, parent, pos)| Node::new(id, parent, pos)))
        .connector(Connector::new(101, 4, Relation::Presynaptic))
        .connector(Connector::new(102, 6, Relation::Presynaptic))
        .connector(Connector::new(103, 5, Relation::Postsynaptic))
        .connector(Connector::new(104, 7, Relation::Postsynaptic))
        .build()
        .unwrap()
}

/// Soma 1 - 2 - 3 branching into a dendrite (4, inputs on 6 and 7) and an
/// axon whose branch point 10 sits one node below 3:
///
/// ```text
///            1 (soma)
///            |
///            2
///            |
///            3
///          /   \
///         4     5
///        / \    |
///       6   7   10
///              /  \
///             11  12
/// ```
fn late_axon_branch_tree() -> TreeArena {
    let nodes: [(NodeId, Option<NodeId>, (f64, f64)); 10] = [
        (1, None, (0.0, 0.0)),
        (2, Some(1), (0.0, 1.0)),
        (3, Some(2), (0.0, 2.0)),
        (4, Some(3), (-1.0, 3.0)),
        (5, Some(3), (1.0, 3.0)),
        (6, Some(4), (-2.0, 4.0)),
        (7, Some(4), (-1.0, 4.0)),
        (10, Some(5), (1.0, 4.0)),
        (11, Some(10), (0.5, 5.0)),
        (12, Some(10), (1.5, 5.0)),
    ];
    TreeBuilder::new()
        .name("late")
        .nodes(
            nodes
                .into_iter()
                .map(|(id, parent, (x, y))| Node::new(id, parent, Point3::new(x, y, 0.0))),
        )
        .connector(Connector::new(301, 6, Relation::Postsynaptic))
        .connector(Connector::new(302, 7, Relation::Postsynaptic))
        .connector(Connector::new(303, 11, Relation::Presynaptic))
        .connector(Connector::new(304, 12, Relation::Presynaptic))
        .tag("soma", 1)
        .build()
        .unwrap()
}

/// `tree` with `partners` attached to connector `id`.
fn with_partners(tree: &TreeArena, id: ConnectorId, partners: Vec<NodeId>) -> TreeArena {
    let mut out = TreeArena::new();
    for n in tree.nodes() {
        out.insert_node(n.clone()).unwrap();
    }
    for c in tree.connectors() {
        let c = if c.id == id {
            c.clone().with_partners(partners.clone())
        } else {
            c.clone()
        };
        out.insert_connector(c).unwrap();
    }
    out.classify().unwrap();
    out
}

// ============================================================
// Cut point
// ============================================================

#[rstest]
fn given_bipolar_neuron_when_finding_cut_then_axon_branch_point_wins(mut bipolar: TreeArena) {
    let cut = find_cut_point(&mut bipolar, &SplitOptions::default()).unwrap();

    assert_eq!(cut, 5);
    assert!(bipolar.memo().contains(Computed::Flow {
        method: FlowMethod::Centrifugal,
        polypre: false,
    }));
}

#[rstest]
#[case::equidistant_smaller_id_wins(Point3::new(2.0, 2.0, 0.0), 4)]
#[case::nearer_to_root_wins(Point3::new(1.0, 1.5, 0.0), 6)]
fn given_equal_flow_when_finding_cut_then_nearest_then_smallest_wins(
    #[case] pos6: Point3,
    #[case] expected: NodeId,
) {
    let mut tree = mirrored_tree(pos6);

    let cut = find_cut_point(&mut tree, &SplitOptions::default()).unwrap();

    assert_eq!(cut, expected);
}

#[test]
fn given_plain_flow_cached_when_finding_cut_with_polypre_then_flow_is_recomputed() {
    // Arrange: three partners on the presynapse at 4 outweigh the one at 6
    let mut tree = with_partners(&seven_node_tree(), 101, vec![50, 51, 52]);
    flow_centrality(&mut tree, FlowMethod::Centrifugal, false).unwrap();
    let opts = SplitOptions {
        polypre: true,
        ..SplitOptions::default()
    };

    // Act
    let cut = find_cut_point(&mut tree, &opts).unwrap();

    // Assert
    assert_eq!(cut, 4);
    assert_eq!(tree.node(4).unwrap().derived.flow_centrality, Some(6));
    assert!(tree.memo().contains(Computed::Flow {
        method: FlowMethod::Centrifugal,
        polypre: true,
    }));
}

#[rstest]
fn given_soma_below_root_when_finding_cut_then_tree_is_rerooted(mut bipolar: TreeArena) {
    bipolar.reroot(9).unwrap();
    assert_eq!(bipolar.roots(), vec![9]);

    find_cut_point(&mut bipolar, &SplitOptions::default()).unwrap();

    assert_eq!(bipolar.roots(), vec![1]);
}

#[rstest]
fn given_reroot_disabled_when_finding_cut_then_root_is_kept(mut bipolar: TreeArena) {
    bipolar.reroot(9).unwrap();
    let opts = SplitOptions {
        reroot_soma: false,
        ..SplitOptions::default()
    };

    find_cut_point(&mut bipolar, &opts).unwrap();

    assert_eq!(bipolar.roots(), vec![9]);
}

#[rstest]
fn given_cached_flow_for_other_method_when_finding_cut_then_flow_is_recomputed(
    mut bipolar: TreeArena,
) {
    let opts = SplitOptions {
        method: FlowMethod::Bending,
        ..SplitOptions::default()
    };
    find_cut_point(&mut bipolar, &SplitOptions::default()).unwrap();

    let cut = find_cut_point(&mut bipolar, &opts).unwrap();

    assert_eq!(cut, 3);
    assert_eq!(bipolar.memo().flow_method(), Some(FlowMethod::Bending));
}

#[test]
fn given_two_roots_when_finding_cut_then_malformed() {
    let mut tree = seven_node_tree();
    tree.absorb(neurite::util::testing::chain_from(20, 2, Point3::default()))
        .unwrap();

    let err = find_cut_point(&mut tree, &SplitOptions::default()).unwrap_err();

    assert!(matches!(err, DomainError::MalformedTree { .. }));
}

// ============================================================
// Split
// ============================================================

#[rstest]
fn given_branching_cut_when_splitting_then_three_fragments(mut bipolar: TreeArena) {
    // Act
    let split = split_axon_dendrite(&mut bipolar, &SplitOptions::default()).unwrap();

    // Assert
    assert_eq!(split.cut, 5);
    assert_eq!(split.axon.node_ids(), vec![5, 8, 9]);
    assert_eq!(split.dendrite.node_ids(), vec![4, 6, 7]);
    let primary = split.primary_neurite.as_ref().unwrap();
    assert_eq!(primary.node_ids(), vec![1, 2, 3]);

    assert_eq!(split.axon.name, "bipolar_axon");
    assert_eq!(split.dendrite.name, "bipolar_dendrite");
    assert_eq!(primary.name, "bipolar_primary_neurite");
    assert_eq!(split.axon.n_presynapses(), 2);
    assert_eq!(split.dendrite.n_postsynapses(), 2);
}

#[rstest]
fn given_primary_neurite_disabled_when_splitting_then_two_fragments(mut bipolar: TreeArena) {
    let opts = SplitOptions {
        primary_neurite: false,
        ..SplitOptions::default()
    };

    let split = split_axon_dendrite(&mut bipolar, &opts).unwrap();

    assert!(split.primary_neurite.is_none());
    assert_eq!(split.axon.node_ids(), vec![5, 8, 9]);
    assert_eq!(split.dendrite.node_ids(), vec![1, 2, 3, 4, 6, 7]);
    assert_eq!(split.fragments().len(), 2);
}

#[rstest]
fn given_split_when_counting_fragments_then_every_node_is_kept_once(mut bipolar: TreeArena) {
    let total = bipolar.len();
    let connectors = bipolar.n_connectors();

    let split = split_axon_dendrite(&mut bipolar, &SplitOptions::default()).unwrap();

    let fragments = split.into_fragments();
    assert_eq!(fragments.iter().map(TreeArena::len).sum::<usize>(), total);
    assert_eq!(
        fragments.iter().map(TreeArena::n_connectors).sum::<usize>(),
        connectors
    );
    assert!(fragments.iter().all(|f| f.single_root().is_ok()));
}

#[test]
fn given_axon_branch_below_arbor_junction_when_splitting_then_primary_neurite_is_the_path() {
    // Arrange
    init_test_setup();
    let mut tree = late_axon_branch_tree();

    // Act
    let split = split_axon_dendrite(&mut tree, &SplitOptions::default()).unwrap();

    // Assert
    assert_eq!(split.cut, 10);
    let primary = split.primary_neurite.as_ref().unwrap();
    assert_eq!(primary.node_ids(), vec![1, 2, 3, 5]);
    assert_eq!(primary.n_connectors(), 0);
    assert_eq!(split.axon.node_ids(), vec![10, 11, 12]);
    assert_eq!(split.axon.n_presynapses(), 2);
    assert_eq!(split.dendrite.node_ids(), vec![4, 6, 7]);
    assert_eq!(split.dendrite.n_postsynapses(), 2);
}

#[test]
fn given_branching_cut_below_root_when_splitting_then_root_is_the_primary_neurite() {
    let tree = seven_node_tree();

    let split = split_at(&tree, 2, true).unwrap();

    assert_eq!(split.primary_neurite.as_ref().unwrap().node_ids(), vec![1]);
    assert_eq!(split.axon.node_ids(), vec![2, 4, 5]);
    assert_eq!(split.dendrite.node_ids(), vec![3, 6, 7]);
}

#[test]
fn given_path_without_side_branches_when_splitting_then_two_fragments() {
    // 1 - 2 - 3 < (4, 5): nothing hangs off the path above 3
    let tree = TreeBuilder::new()
        .node(Node::new(1, None, Point3::new(0.0, 0.0, 0.0)))
        .node(Node::new(2, Some(1), Point3::new(0.0, 1.0, 0.0)))
        .node(Node::new(3, Some(2), Point3::new(0.0, 2.0, 0.0)))
        .node(Node::new(4, Some(3), Point3::new(-1.0, 3.0, 0.0)))
        .node(Node::new(5, Some(3), Point3::new(1.0, 3.0, 0.0)))
        .build()
        .unwrap();

    let split = split_at(&tree, 3, true).unwrap();

    assert!(split.primary_neurite.is_none());
    assert_eq!(split.axon.node_ids(), vec![3, 4, 5]);
    assert_eq!(split.dendrite.node_ids(), vec![1, 2]);
}

#[test]
fn given_cut_at_root_when_splitting_then_heaviest_child_becomes_axon() {
    let tree = seven_node_tree();

    let split = split_at(&tree, 1, true).unwrap();

    assert!(split.primary_neurite.is_none());
    assert_eq!(split.axon.node_ids(), vec![2, 4, 5]);
    assert_eq!(split.dendrite.node_ids(), vec![1, 3, 6, 7]);
}

#[test]
fn given_equal_presynapses_when_splitting_then_distal_side_is_axon() {
    let tree = seven_node_tree();

    let split = split_at(&tree, 3, false).unwrap();

    assert_eq!(split.axon.node_ids(), vec![3, 6, 7]);
}

#[test]
fn given_leaf_root_when_splitting_at_root_then_empty_result() {
    let tree = TreeBuilder::new()
        .node(Node::new(1, None, Point3::default()))
        .build()
        .unwrap();

    assert!(matches!(split_at(&tree, 1, true), Err(DomainError::EmptyResult(_))));
}

#[rstest]
fn given_single_neuron_when_splitting_neurons_then_input_is_untouched(bipolar: TreeArena) {
    let neurons = Neurons::from(bipolar);

    let split = split_neuron(&neurons, &SplitOptions::default()).unwrap();

    assert_eq!(split.cut, 5);
    assert!(neurons.trees()[0].memo().flow_method().is_none());
}

#[test]
fn given_collection_when_splitting_neurons_then_ambiguous() {
    let neurons = Neurons::from(vec![bipolar_tree(), seven_node_tree()]);

    let err = split_neuron(&neurons, &SplitOptions::default()).unwrap_err();

    assert!(matches!(err, DomainError::AmbiguousInput(_)));
}
