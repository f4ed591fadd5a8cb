pub mod construction;
pub mod model;
pub mod serialization;
pub mod validation;

pub use construction::GraphLoader;
pub use model::{Atom, Bond, LabeledGraph, MolGraph, RawGraph};
pub use serialization::{ClusterRecord, GraphWriter, PartitionWriter};
pub use validation::{partition_valid, validate_graph};
