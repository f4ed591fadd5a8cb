pub mod error;
pub mod graph;
pub mod invariants;
pub mod partition;
pub mod pipeline;
pub mod wl;

pub use error::{ClusterError, ClusterResult, MalformedGraph, MalformedReason};
pub use graph::{
    Atom, Bond, ClusterRecord, GraphLoader, GraphWriter, LabeledGraph, MolGraph, PartitionWriter,
};
pub use invariants::{Invariant, InvariantFilter, Signature};
pub use partition::Partition;
pub use pipeline::{
    chunk_ranges, AttributeMatcher, BatchOrchestrator, BatchReport, ChemicalMatcher, ChunkReport,
    ClusterConfig, ClusterSummary, ClusterWorkflow, IsomorphismConfirmer, RefinementStrategy,
    StageTimings, WorkflowStats,
};
pub use wl::{CanonTable, ColorRefinement, RefinementOutcome, WlHashFilter};
