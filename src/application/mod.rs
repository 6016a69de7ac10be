//! Application layer: the tree algorithms and batch fan-out
//!
//! Every algorithm works on one `TreeArena`. In-place operations take
//! `&mut TreeArena`; callers wanting a copy clone first (clones are deep)
//! or use `Neurons::run`.

pub mod batch;
pub mod bending;
pub mod cable;
pub mod confidence;
pub mod distal;
pub mod error;
pub mod flow;
pub mod prune;
pub mod segregation;
pub mod split;
pub mod stitch;
pub mod strahler;

pub use batch::{BatchFailure, BatchReport, Neurons};
pub use error::{ApplicationError, ApplicationResult};
