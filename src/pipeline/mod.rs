pub mod batch;
pub mod confirm;
pub mod workflow;

pub use batch::{chunk_ranges, BatchOrchestrator, BatchReport, ChunkReport};
pub use confirm::{AttributeMatcher, ChemicalMatcher, ConfirmStats, IsomorphismConfirmer};
pub use workflow::{
    ClusterConfig, ClusterSummary, ClusterWorkflow, RefinementStrategy, StageTimings,
    WorkflowStats,
};
