use std::ops::Range;
use std::time::{Duration, Instant};

use log::{debug, info};
use rayon::prelude::*;
use serde::Serialize;

use crate::error::{ClusterError, ClusterResult, MalformedGraph};
use crate::graph::LabeledGraph;
use crate::partition::Partition;
use crate::pipeline::confirm::{AttributeMatcher, ChemicalMatcher};
use crate::pipeline::workflow::{ClusterConfig, ClusterWorkflow, StageTimings, WorkflowStats};

/// Contiguous chunks of `ceil(len / chunk_count)` indices; the last may be shorter.
///
/// Fewer than `chunk_count` ranges come back when the dataset is too small to
/// fill them all.
pub fn chunk_ranges(len: usize, chunk_count: usize) -> ClusterResult<Vec<Range<usize>>> {
    if chunk_count == 0 {
        return Err(ClusterError::InvalidConfig(
            "chunk_count must be greater than zero".to_string(),
        ));
    }
    if len == 0 {
        return Ok(Vec::new());
    }
    let size = len.div_ceil(chunk_count);
    Ok((0..len)
        .step_by(size)
        .map(|start| start..(start + size).min(len))
        .collect())
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkReport {
    pub chunk: usize,
    pub range: Range<usize>,
    /// Groups of dataset-wide indices, all inside `range`.
    pub partition: Partition,
    pub malformed: Vec<MalformedGraph>,
    pub stats: WorkflowStats,
    pub timings: StageTimings,
    pub elapsed: Duration,
}

impl ChunkReport {
    pub fn cluster_count(&self) -> usize {
        self.partition.len()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub khop: Option<usize>,
    pub chunks: Vec<ChunkReport>,
}

impl BatchReport {
    /// Sum of per-chunk cluster counts; an upper bound on the dataset-wide count.
    pub fn total_clusters(&self) -> usize {
        self.chunks.iter().map(ChunkReport::cluster_count).sum()
    }

    /// Concatenation of every chunk partition, in chunk order.
    pub fn partition(&self) -> Partition {
        Partition::from_groups(
            self.chunks
                .iter()
                .flat_map(|chunk| chunk.partition.groups().iter().cloned())
                .collect(),
        )
    }

    pub fn malformed(&self) -> impl Iterator<Item = &MalformedGraph> {
        self.chunks.iter().flat_map(|chunk| chunk.malformed.iter())
    }

    pub fn total_elapsed(&self) -> Duration {
        self.chunks.iter().map(|chunk| chunk.elapsed).sum()
    }
}

/// Runs the whole workflow independently on each chunk; clusters never span chunks.
pub struct BatchOrchestrator<M = ChemicalMatcher> {
    workflow: ClusterWorkflow<M>,
}

impl BatchOrchestrator<ChemicalMatcher> {
    pub fn new(config: ClusterConfig) -> Self {
        Self {
            workflow: ClusterWorkflow::new(config),
        }
    }
}

impl<M: AttributeMatcher> BatchOrchestrator<M> {
    pub fn with_workflow(workflow: ClusterWorkflow<M>) -> Self {
        Self { workflow }
    }

    pub fn run(&self, dataset: &[LabeledGraph]) -> ClusterResult<BatchReport> {
        let config = self.workflow.config();
        let ranges = chunk_ranges(dataset.len(), config.chunk_count)?;
        info!(
            "Clustering {} graphs in {} chunks",
            dataset.len(),
            ranges.len()
        );

        let chunks: Vec<ChunkReport> = ranges
            .into_par_iter()
            .enumerate()
            .map(|(chunk, range)| self.run_chunk(dataset, chunk, range))
            .collect();

        let report = BatchReport {
            khop: config.khop,
            chunks,
        };
        info!(
            "Batch finished: {} clusters over {} chunks ({} malformed graphs)",
            report.total_clusters(),
            report.chunks.len(),
            report.malformed().count()
        );
        Ok(report)
    }

    fn run_chunk(&self, dataset: &[LabeledGraph], chunk: usize, range: Range<usize>) -> ChunkReport {
        let start = Instant::now();
        let summary = self.workflow.execute(&dataset[range.clone()]);
        let offset = range.start;
        let malformed = summary
            .malformed
            .into_iter()
            .map(|mut entry| {
                entry.index += offset;
                entry
            })
            .collect();
        let elapsed = start.elapsed();
        debug!(
            "Chunk {} [{}..{}] processed in {:?}: {} clusters",
            chunk,
            range.start,
            range.end,
            elapsed,
            summary.partition.len()
        );

        ChunkReport {
            chunk,
            partition: summary.partition.offset(offset),
            range,
            malformed,
            stats: summary.stats,
            timings: summary.timings,
            elapsed,
        }
    }
}
