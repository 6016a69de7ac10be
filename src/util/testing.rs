//! Shared test setup: tracing subscriber and small reference skeletons.

use std::env;
use std::sync::Once;

use tracing::{debug, info};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use crate::domain::{Connector, Node, NodeId, Point3, Relation, TreeArena, TreeBuilder};

static TEST_SETUP: Once = Once::new();

pub fn init_test_setup() {
    TEST_SETUP.call_once(|| {
        if env::var("RUST_LOG").is_err() {
            env::set_var("RUST_LOG", "debug");
        }
        // global logging subscriber, used by all tracing log macros
        setup_test_logging();
        info!("Test Setup complete");
    });
}

fn setup_test_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let subscriber = tracing_subscriber::registry().with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_names(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_test_writer()
            .with_filter(env_filter),
    );

    // Only set if we haven't already set a global subscriber
    if tracing::dispatcher::has_been_set() {
        debug!("Tracing subscriber already set");
    } else {
        subscriber.try_init().unwrap_or_else(|e| {
            eprintln!("Error: Failed to set up logging: {}", e);
        });
    }
}

/// Binary tree of seven nodes:
///
/// ```text
///         1
///       /   \
///      2     3
///     / \   / \
///    4   5 6   7
/// ```
///
/// Presynapses sit on 4 and 6 (connectors 101, 102), postsynapses on 5 and
/// 7 (connectors 103, 104).
pub fn seven_node_tree() -> TreeArena {
    let nodes = [
        (1, None, (0.0, 0.0, 0.0)),
        (2, Some(1), (-1.0, 1.0, 0.0)),
        (3, Some(1), (1.0, 1.0, 0.0)),
        (4, Some(2), (-2.0, 2.0, 0.0)),
        (5, Some(2), (-1.0, 2.0, 0.0)),
        (6, Some(3), (1.0, 2.0, 0.0)),
        (7, Some(3), (2.0, 2.0, 0.0)),
    ];
    TreeBuilder::new()
        .skeleton_id(7)
        .name("seven")
        .nodes(
            nodes
                .into_iter()
                .map(|(id, parent, (x, y, z))| Node::new(id, parent, Point3::new(x, y, z))),
        )
        .connector(Connector::new(101, 4, Relation::Presynaptic))
        .connector(Connector::new(102, 6, Relation::Presynaptic))
        .connector(Connector::new(103, 5, Relation::Postsynaptic))
        .connector(Connector::new(104, 7, Relation::Postsynaptic))
        .build()
        .expect("seven node tree is valid")
}

/// Neuron with a soma, a primary neurite and two arbors:
///
/// ```text
///         1 (soma)
///         |
///         2
///         |
///         3
///       /   \
///      4     5
///     / \   / \
///    6   7 8   9
/// ```
///
/// Postsynapses on 6 and 7 (201, 202), presynapses on 8 and 9 (203, 204).
pub fn bipolar_tree() -> TreeArena {
    let nodes = [
        (1, None, (0.0, 0.0, 0.0)),
        (2, Some(1), (0.0, 1.0, 0.0)),
        (3, Some(2), (0.0, 2.0, 0.0)),
        (4, Some(3), (-1.0, 3.0, 0.0)),
        (5, Some(3), (1.0, 3.0, 0.0)),
        (6, Some(4), (-2.0, 4.0, 0.0)),
        (7, Some(4), (-1.0, 4.0, 0.0)),
        (8, Some(5), (1.0, 4.0, 0.0)),
        (9, Some(5), (2.0, 4.0, 0.0)),
    ];
    TreeBuilder::new()
        .skeleton_id(9)
        .name("bipolar")
        .nodes(
            nodes
                .into_iter()
                .map(|(id, parent, (x, y, z))| Node::new(id, parent, Point3::new(x, y, z))),
        )
        .connector(Connector::new(201, 6, Relation::Postsynaptic))
        .connector(Connector::new(202, 7, Relation::Postsynaptic))
        .connector(Connector::new(203, 8, Relation::Presynaptic))
        .connector(Connector::new(204, 9, Relation::Presynaptic))
        .tag("soma", 1)
        .build()
        .expect("bipolar tree is valid")
}

/// Unbranched chain `1 - 2 - ... - n` along the x axis, rooted at 1.
pub fn chain(n: NodeId) -> TreeArena {
    chain_from(1, n, Point3::default())
}

/// Chain of ids `first..first + n` starting at `origin`, one unit apart.
pub fn chain_from(first: NodeId, n: NodeId, origin: Point3) -> TreeArena {
    TreeBuilder::new()
        .nodes((0..n).map(|k| {
            let parent = if k == 0 { None } else { Some(first + k - 1) };
            let pos = Point3::new(origin.x + k as f64, origin.y, origin.z);
            Node::new(first + k, parent, pos)
        }))
        .build()
        .expect("chain is valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_are_classified() {
        init_test_setup();
        let tree = seven_node_tree();
        assert_eq!(tree.roots(), vec![1]);
        assert_eq!(tree.end_nodes(), vec![4, 5, 6, 7]);
        assert_eq!(chain(5).end_nodes(), vec![5]);
        assert_eq!(bipolar_tree().soma(), Some(1));
    }
}
