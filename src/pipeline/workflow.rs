use std::time::{Duration, Instant};

use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::MalformedGraph;
use crate::graph::{partition_valid, LabeledGraph};
use crate::invariants::{default_invariants, Invariant, InvariantFilter};
use crate::partition::Partition;
use crate::pipeline::confirm::{AttributeMatcher, ChemicalMatcher, IsomorphismConfirmer};
use crate::wl::{ColorRefinement, WlHashFilter};

/// Which pre-filter runs between the invariants and exact confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RefinementStrategy {
    ColorRefinement { max_levels: Option<usize> },
    WlHash { iterations: usize },
    Disabled,
}

impl Default for RefinementStrategy {
    fn default() -> Self {
        RefinementStrategy::ColorRefinement { max_levels: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Neighborhood radius the input graphs were extracted with; reported, never used.
    pub khop: Option<usize>,
    pub chunk_count: usize,
    pub invariants: Vec<Invariant>,
    pub refinement: RefinementStrategy,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            khop: None,
            chunk_count: 1,
            invariants: default_invariants(),
            refinement: RefinementStrategy::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StageTimings {
    pub validation: Duration,
    pub invariants: Duration,
    pub refinement: Duration,
    pub confirmation: Duration,
}

impl StageTimings {
    pub fn total(&self) -> Duration {
        self.validation + self.invariants + self.refinement + self.confirmation
    }

    /// Stage name to elapsed seconds, in pipeline order.
    pub fn as_seconds(&self) -> IndexMap<&'static str, f64> {
        IndexMap::from([
            ("validation", self.validation.as_secs_f64()),
            ("invariants", self.invariants.as_secs_f64()),
            ("refinement", self.refinement.as_secs_f64()),
            ("confirmation", self.confirmation.as_secs_f64()),
        ])
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkflowStats {
    pub input_graphs: usize,
    pub malformed: usize,
    pub invariant_groups: usize,
    pub refined_groups: usize,
    pub refinement_levels: usize,
    /// False only when the color refinement level cap was hit.
    pub refinement_converged: bool,
    /// Groups the level cap left unfinished; they still go through exact confirmation.
    pub unrefined_groups: usize,
    pub isomorphism_tests: usize,
    pub clusters: usize,
}

#[derive(Debug, Clone)]
pub struct ClusterSummary {
    pub partition: Partition,
    pub malformed: Vec<MalformedGraph>,
    pub stats: WorkflowStats,
    pub timings: StageTimings,
}

/// Validate, filter by invariants, refine, then confirm exactly.
pub struct ClusterWorkflow<M = ChemicalMatcher> {
    config: ClusterConfig,
    confirmer: IsomorphismConfirmer<M>,
}

impl ClusterWorkflow<ChemicalMatcher> {
    pub fn new(config: ClusterConfig) -> Self {
        Self::with_matcher(config, ChemicalMatcher)
    }
}

impl<M: AttributeMatcher> ClusterWorkflow<M> {
    pub fn with_matcher(config: ClusterConfig, matcher: M) -> Self {
        Self {
            config,
            confirmer: IsomorphismConfirmer::new(matcher),
        }
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Cluster `dataset`; indices in the result are positions in `dataset`.
    pub fn execute(&self, dataset: &[LabeledGraph]) -> ClusterSummary {
        let mut timings = StageTimings::default();
        let mut stats = WorkflowStats {
            input_graphs: dataset.len(),
            refinement_converged: true,
            ..WorkflowStats::default()
        };

        let start = Instant::now();
        let (valid, malformed) = partition_valid(dataset);
        stats.malformed = malformed.len();
        timings.validation = start.elapsed();

        let start = Instant::now();
        let filter = InvariantFilter::new(self.config.invariants.clone());
        let candidates = filter.split(dataset, Partition::single(valid));
        stats.invariant_groups = candidates.len();
        timings.invariants = start.elapsed();

        let start = Instant::now();
        let refined = match &self.config.refinement {
            RefinementStrategy::ColorRefinement { max_levels } => {
                let outcome = ColorRefinement::new(*max_levels).refine(dataset, candidates);
                stats.refinement_levels = outcome.levels;
                stats.refinement_converged = outcome.converged;
                stats.unrefined_groups = outcome.unrefined_groups().count();
                outcome.partition
            }
            RefinementStrategy::WlHash { iterations } => {
                stats.refinement_levels = *iterations;
                WlHashFilter::new(*iterations).split(dataset, candidates)
            }
            RefinementStrategy::Disabled => candidates,
        };
        stats.refined_groups = refined.len();
        timings.refinement = start.elapsed();

        let start = Instant::now();
        let (partition, confirm_stats) = self.confirmer.confirm(dataset, &refined);
        stats.isomorphism_tests = confirm_stats.isomorphism_tests;
        stats.clusters = partition.len();
        timings.confirmation = start.elapsed();

        debug!(
            "Clustered {} graphs (khop {:?}): invariants {} -> refined {} -> clusters {}, {} malformed",
            dataset.len(),
            self.config.khop,
            stats.invariant_groups,
            stats.refined_groups,
            stats.clusters,
            stats.malformed
        );

        ClusterSummary {
            partition,
            malformed,
            stats,
            timings,
        }
    }
}
