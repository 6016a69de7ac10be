//! neurite: morphology analysis for reconstructed neuron skeletons.
//!
//! Layers, leaf first:
//! - `domain`: the arena-backed skeleton, its builder and structural queries
//! - `application`: Strahler order, flow centrality, splitting, pruning,
//!   stitching, segregation and batch fan-out
//! - `infrastructure`: JSON node/connector tables and service wiring
//! - `cli`: argument parsing and command dispatch

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod tree_traits;
pub mod util;
