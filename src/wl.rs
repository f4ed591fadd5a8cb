//! Weisfeiler–Lehman color refinement over groups of graphs.
//!
//! Colors live in an arena owned by the engine (one `Vec<Color>` per graph,
//! indexed by node index); atoms are never mutated. Every level interns its
//! keys through a fresh [`CanonTable`] per group, so colors are comparable
//! across the graphs of one group and meaningless outside it.

use std::collections::BTreeMap;
use std::hash::Hash;

use indexmap::{map::Entry, IndexMap};
use log::{debug, trace};
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use rayon::prelude::*;

use crate::graph::LabeledGraph;
use crate::partition::{split_by_key, Partition};

pub type Color = u32;

/// Per-graph color multiset as sorted `(color, count)` pairs.
pub type Histogram = Vec<(Color, u32)>;

/// Interns keys to dense colors in first-seen order.
#[derive(Debug)]
pub struct CanonTable<K> {
    ids: IndexMap<K, Color>,
}

impl<K: Hash + Eq> Default for CanonTable<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq> CanonTable<K> {
    pub fn new() -> Self {
        Self {
            ids: IndexMap::new(),
        }
    }

    pub fn intern(&mut self, key: K) -> Color {
        let next = self.ids.len() as Color;
        match self.ids.entry(key) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => *entry.insert(next),
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Level-0 key: the atom's own attributes plus its sorted incident bond orders.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct InitialKey {
    element: String,
    charge: i64,
    orders: Vec<i64>,
}

/// Refinement key: current color plus sorted `(neighbor color, bond order)` pairs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RefineKey {
    own: Color,
    neighbors: Vec<(Color, i64)>,
}

#[derive(Debug, Clone)]
pub struct RefinementOutcome {
    pub partition: Partition,
    /// Refinement steps run after level 0.
    pub levels: usize,
    /// False when the level cap stopped the loop before the group count settled.
    pub converged: bool,
    /// One flag per group of `partition`; false marks a group the level cap
    /// left unfinished. Stability is judged on the total group count, so
    /// either every group is fully refined or only singletons are.
    pub fully_refined: Vec<bool>,
    /// Group count after level 0, 1, 2, ...
    pub group_counts: Vec<usize>,
}

impl RefinementOutcome {
    /// Groups the level cap left unfinished.
    pub fn unrefined_groups(&self) -> impl Iterator<Item = &Vec<usize>> {
        self.partition
            .groups()
            .iter()
            .zip(&self.fully_refined)
            .filter(|(_, done)| !**done)
            .map(|(group, _)| group)
    }
}

/// Recursive color refinement: each level re-splits every surviving group on its own.
#[derive(Debug, Clone, Default)]
pub struct ColorRefinement {
    max_levels: Option<usize>,
}

struct GroupStep {
    colors: Vec<(usize, Vec<Color>)>,
    groups: Vec<Vec<usize>>,
}

impl ColorRefinement {
    pub fn new(max_levels: Option<usize>) -> Self {
        Self { max_levels }
    }

    pub fn max_levels(&self) -> Option<usize> {
        self.max_levels
    }

    /// Split `partition` until one level leaves the total group count unchanged.
    ///
    /// Level 1 is always computed; the count comparison starts at level 2.
    /// Equal counts between two levels mean identical membership here, since
    /// every level only splits groups. The graph-level partition can still
    /// settle while node colors keep refining, so a later level might have
    /// split further; that under-refinement is left to the exact confirmer.
    pub fn refine(&self, dataset: &[LabeledGraph], partition: Partition) -> RefinementOutcome {
        let mut colors: Vec<Vec<Color>> = vec![Vec::new(); dataset.len()];

        let steps: Vec<GroupStep> = partition
            .groups()
            .par_iter()
            .map(|group| initialize_group(dataset, group))
            .collect();
        let mut current = absorb(steps, &mut colors);
        let mut group_counts = vec![current.len()];
        trace!("WL level 0: {} groups", current.len());

        let mut levels = 0;
        let mut converged = false;
        loop {
            if current.groups().iter().all(|group| group.len() == 1) {
                converged = true;
                break;
            }
            if self.max_levels.is_some_and(|cap| levels >= cap) {
                break;
            }

            let steps: Vec<GroupStep> = current
                .groups()
                .par_iter()
                .map(|group| refine_group(dataset, &colors, group))
                .collect();
            let next = absorb(steps, &mut colors);
            levels += 1;
            trace!("WL level {}: {} groups", levels, next.len());
            group_counts.push(next.len());

            let settled = levels >= 2 && next.len() == current.len();
            current = next;
            if settled {
                converged = true;
                break;
            }
        }

        let fully_refined: Vec<bool> = current
            .groups()
            .iter()
            .map(|group| converged || group.len() == 1)
            .collect();
        debug!(
            "Color refinement: {} groups after {} levels (converged: {}, unfinished: {})",
            current.len(),
            levels,
            converged,
            fully_refined.iter().filter(|done| !**done).count()
        );
        RefinementOutcome {
            partition: current,
            levels,
            converged,
            fully_refined,
            group_counts,
        }
    }

    /// Histograms of every graph in `group` after `levels` refinement steps,
    /// sharing one table per level across the whole group.
    pub fn group_histograms(
        &self,
        dataset: &[LabeledGraph],
        group: &[usize],
        levels: usize,
    ) -> Vec<Histogram> {
        let mut table = CanonTable::new();
        let mut colors: Vec<Vec<Color>> = group
            .iter()
            .map(|&idx| initial_colors(&dataset[idx], &mut table))
            .collect();
        for _ in 0..levels {
            let mut table = CanonTable::new();
            colors = group
                .iter()
                .zip(&colors)
                .map(|(&idx, current)| refine_colors(&dataset[idx], current, &mut table))
                .collect();
        }
        colors.iter().map(|c| histogram(c)).collect()
    }
}

fn initialize_group(dataset: &[LabeledGraph], group: &[usize]) -> GroupStep {
    if group.len() < 2 {
        return GroupStep {
            colors: Vec::new(),
            groups: vec![group.to_vec()],
        };
    }
    let mut table = CanonTable::new();
    let colors: Vec<(usize, Vec<Color>)> = group
        .iter()
        .map(|&idx| (idx, initial_colors(&dataset[idx], &mut table)))
        .collect();
    split_step(group, colors)
}

fn refine_group(dataset: &[LabeledGraph], current: &[Vec<Color>], group: &[usize]) -> GroupStep {
    if group.len() < 2 {
        return GroupStep {
            colors: Vec::new(),
            groups: vec![group.to_vec()],
        };
    }
    let mut table = CanonTable::new();
    let colors: Vec<(usize, Vec<Color>)> = group
        .iter()
        .map(|&idx| (idx, refine_colors(&dataset[idx], &current[idx], &mut table)))
        .collect();
    split_step(group, colors)
}

fn split_step(group: &[usize], colors: Vec<(usize, Vec<Color>)>) -> GroupStep {
    let histograms: Vec<Histogram> = colors.iter().map(|(_, c)| histogram(c)).collect();
    GroupStep {
        groups: split_by_key(group, &histograms),
        colors,
    }
}

fn absorb(steps: Vec<GroupStep>, colors: &mut [Vec<Color>]) -> Partition {
    let mut groups = Vec::new();
    for step in steps {
        for (idx, next) in step.colors {
            colors[idx] = next;
        }
        groups.extend(step.groups);
    }
    Partition::from_groups(groups)
}

fn initial_colors(graph: &LabeledGraph, table: &mut CanonTable<InitialKey>) -> Vec<Color> {
    graph
        .graph
        .node_indices()
        .map(|node| {
            let atom = &graph.graph[node];
            let mut orders: Vec<i64> = graph
                .graph
                .edges(node)
                .map(|edge| edge.weight().order.unwrap_or_default())
                .collect();
            orders.sort_unstable();
            table.intern(InitialKey {
                element: atom.element.clone().unwrap_or_default(),
                charge: atom.charge.unwrap_or_default(),
                orders,
            })
        })
        .collect()
}

/// One synchronous step: every key is built from `current` before any color is replaced.
fn refine_colors(
    graph: &LabeledGraph,
    current: &[Color],
    table: &mut CanonTable<RefineKey>,
) -> Vec<Color> {
    graph
        .graph
        .node_indices()
        .map(|node| {
            let mut neighbors: Vec<(Color, i64)> = graph
                .graph
                .edges(node)
                .map(|edge| {
                    let other = opposite(node, edge.source(), edge.target());
                    (current[other.index()], edge.weight().order.unwrap_or_default())
                })
                .collect();
            neighbors.sort_unstable();
            table.intern(RefineKey {
                own: current[node.index()],
                neighbors,
            })
        })
        .collect()
}

fn opposite(node: NodeIndex, source: NodeIndex, target: NodeIndex) -> NodeIndex {
    if source == node {
        target
    } else {
        source
    }
}

pub fn histogram(colors: &[Color]) -> Histogram {
    let mut counts: BTreeMap<Color, u32> = BTreeMap::new();
    for &color in colors {
        *counts.entry(color).or_insert(0) += 1;
    }
    counts.into_iter().collect()
}

/// Fixed-iteration WL graph digest, grouping graphs with equal digests.
///
/// Node labels start as `element_charge`; each iteration hashes a node's label
/// with its sorted `(bond order, neighbor label)` pairs. The digest covers the
/// sorted label counts of every iteration.
#[derive(Debug, Clone)]
pub struct WlHashFilter {
    iterations: usize,
}

impl Default for WlHashFilter {
    fn default() -> Self {
        Self::new(3)
    }
}

impl WlHashFilter {
    pub fn new(iterations: usize) -> Self {
        Self { iterations }
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn graph_hash(&self, graph: &LabeledGraph) -> [u8; 32] {
        let mut labels: Vec<[u8; 32]> = graph
            .graph
            .node_weights()
            .map(|atom| {
                let mut hasher = blake3::Hasher::new();
                let element = atom.element.as_deref().unwrap_or_default();
                hasher.update(&(element.len() as u64).to_le_bytes());
                hasher.update(element.as_bytes());
                hasher.update(&atom.charge.unwrap_or_default().to_le_bytes());
                *hasher.finalize().as_bytes()
            })
            .collect();

        let mut counts: Vec<([u8; 32], usize)> = Vec::new();
        for _ in 0..self.iterations {
            labels = graph
                .graph
                .node_indices()
                .map(|node| {
                    let mut neighbors: Vec<(i64, [u8; 32])> = graph
                        .graph
                        .edges(node)
                        .map(|edge| {
                            let other = opposite(node, edge.source(), edge.target());
                            (edge.weight().order.unwrap_or_default(), labels[other.index()])
                        })
                        .collect();
                    neighbors.sort_unstable();
                    let mut hasher = blake3::Hasher::new();
                    hasher.update(&labels[node.index()]);
                    hasher.update(&(neighbors.len() as u64).to_le_bytes());
                    for (order, label) in &neighbors {
                        hasher.update(&order.to_le_bytes());
                        hasher.update(label);
                    }
                    *hasher.finalize().as_bytes()
                })
                .collect();

            let mut iteration_counts: BTreeMap<[u8; 32], usize> = BTreeMap::new();
            for label in &labels {
                *iteration_counts.entry(*label).or_insert(0) += 1;
            }
            counts.extend(iteration_counts);
        }

        let mut digest = blake3::Hasher::new();
        digest.update(&(graph.node_count() as u64).to_le_bytes());
        for (label, count) in &counts {
            digest.update(label);
            digest.update(&(*count as u64).to_le_bytes());
        }
        *digest.finalize().as_bytes()
    }

    pub fn split(&self, dataset: &[LabeledGraph], partition: Partition) -> Partition {
        let before = partition.len();
        let split = partition.refine_by_key(|idx| self.graph_hash(&dataset[idx]));
        debug!(
            "WL hash ({} iterations): {} -> {} groups",
            self.iterations,
            before,
            split.len()
        );
        split
    }
}
