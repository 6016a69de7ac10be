//! Infrastructure layer: table I/O and DI container
//!
//! This layer implements I/O boundary traits and wires up services.

pub mod di;
pub mod error;
pub mod tables;
pub mod traits;

pub use di::ServiceContainer;
pub use error::{InfraError, InfraResult};
pub use tables::{NeuronTables, NodeRecord, TableStore};
