//! Domain layer: the skeleton model and its structural queries
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod arena;
pub mod builder;
pub mod entities;
pub mod error;
pub mod memo;

pub use arena::{PostOrder, PreOrder, TreeArena, DEFAULT_SOMA_TAG};
pub use builder::TreeBuilder;
pub use entities::*;
pub use error::{DomainError, DomainResult};
pub use memo::{Computed, Memo};
