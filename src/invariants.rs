//! Cheap isomorphism invariants used to pre-split a dataset.
//!
//! Every signature is computed from sorted multisets or exact counts, so node
//! and edge iteration order never influences the result. Two graphs with
//! different signatures are certainly non-isomorphic; equal signatures prove
//! nothing and are handed on to the refinement stage.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt;

use indexmap::IndexMap;
use log::debug;
use nalgebra::{DMatrix, DVector};
use petgraph::algo::connected_components;
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::graph::LabeledGraph;
use crate::partition::Partition;

const KATZ_ALPHA: f64 = 0.1;
const KATZ_BETA: f64 = 1.0;
const KATZ_QUANTUM: f64 = 1e6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Invariant {
    NodeCount,
    EdgeCount,
    ElementCounts,
    BondOrderCounts,
    DegreeSequence,
    Density,
    AverageShortestPath,
    Triangles,
    ComponentCount,
    NodeConnectivity,
    /// Sorted Katz centralities rounded to 1e-6. Rounding noise can put two
    /// isomorphic graphs on opposite sides of a boundary and split them, so
    /// this is the one invariant that may separate a true class. Opt-in only.
    KatzCentrality,
}

impl Invariant {
    pub const ALL: [Invariant; 11] = [
        Invariant::NodeCount,
        Invariant::EdgeCount,
        Invariant::ElementCounts,
        Invariant::BondOrderCounts,
        Invariant::DegreeSequence,
        Invariant::Density,
        Invariant::AverageShortestPath,
        Invariant::Triangles,
        Invariant::ComponentCount,
        Invariant::NodeConnectivity,
        Invariant::KatzCentrality,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Invariant::NodeCount => "node_count",
            Invariant::EdgeCount => "edge_count",
            Invariant::ElementCounts => "element_counts",
            Invariant::BondOrderCounts => "bond_order_counts",
            Invariant::DegreeSequence => "degree_sequence",
            Invariant::Density => "density",
            Invariant::AverageShortestPath => "average_shortest_path",
            Invariant::Triangles => "triangles",
            Invariant::ComponentCount => "component_count",
            Invariant::NodeConnectivity => "node_connectivity",
            Invariant::KatzCentrality => "katz_centrality",
        }
    }

    pub fn compute(self, graph: &LabeledGraph) -> Signature {
        match self {
            Invariant::NodeCount => Signature::Count(graph.node_count()),
            Invariant::EdgeCount => Signature::Count(graph.edge_count()),
            Invariant::ElementCounts => Signature::Elements(element_counts(graph)),
            Invariant::BondOrderCounts => Signature::BondOrders(bond_order_counts(graph)),
            Invariant::DegreeSequence => Signature::Degrees(degree_sequence(graph)),
            Invariant::Density => Signature::Ratio(density(graph)),
            Invariant::AverageShortestPath => average_shortest_path(graph)
                .map(Signature::Ratio)
                .unwrap_or(Signature::Absent),
            Invariant::Triangles => Signature::Count(triangle_count(graph)),
            Invariant::ComponentCount => Signature::Count(connected_components(&graph.graph)),
            Invariant::NodeConnectivity => Signature::Count(node_connectivity(graph)),
            Invariant::KatzCentrality => katz_centrality(graph)
                .map(Signature::Quantized)
                .unwrap_or(Signature::Absent),
        }
    }
}

/// Value of one invariant for one graph. Compared structurally, never via joined strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Signature {
    Absent,
    Count(usize),
    Ratio(Ratio),
    Elements(Vec<(String, usize)>),
    BondOrders(Vec<(i64, usize)>),
    Degrees(Vec<usize>),
    Quantized(Vec<i64>),
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signature::Absent => write!(f, "-"),
            Signature::Count(count) => write!(f, "{count}"),
            Signature::Ratio(ratio) => write!(f, "{ratio}"),
            Signature::Elements(counts) => {
                for (element, count) in counts {
                    write!(f, "{element}{count}")?;
                }
                Ok(())
            }
            Signature::BondOrders(counts) => {
                let parts: Vec<String> = counts
                    .iter()
                    .map(|(order, count)| format!("{order}:{count}"))
                    .collect();
                write!(f, "{}", parts.join(","))
            }
            Signature::Degrees(values) => write!(f, "{values:?}"),
            Signature::Quantized(values) => write!(f, "{values:?}"),
        }
    }
}

/// Exact non-negative fraction in lowest terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ratio {
    numerator: u64,
    denominator: u64,
}

impl Ratio {
    pub fn new(numerator: u64, denominator: u64) -> Self {
        if numerator == 0 || denominator == 0 {
            return Self {
                numerator: 0,
                denominator: 1,
            };
        }
        let divisor = gcd(numerator, denominator);
        Self {
            numerator: numerator / divisor,
            denominator: denominator / divisor,
        }
    }

    pub fn as_f64(self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let rem = a % b;
        a = b;
        b = rem;
    }
    a
}

/// Applies a sequence of invariants, each one refining the groups left by the previous.
#[derive(Debug, Clone)]
pub struct InvariantFilter {
    invariants: Vec<Invariant>,
}

impl Default for InvariantFilter {
    fn default() -> Self {
        Self::new(default_invariants())
    }
}

impl InvariantFilter {
    pub fn new(invariants: Vec<Invariant>) -> Self {
        Self { invariants }
    }

    pub fn invariants(&self) -> &[Invariant] {
        &self.invariants
    }

    pub fn split(&self, dataset: &[LabeledGraph], partition: Partition) -> Partition {
        let mut current = partition;
        for &invariant in &self.invariants {
            let before = current.len();
            current = current.refine_by_key(|idx| invariant.compute(&dataset[idx]));
            debug!(
                "Invariant {}: {} -> {} groups",
                invariant.name(),
                before,
                current.len()
            );
        }
        current
    }

    /// Full signature tuple of one graph under the configured invariants.
    pub fn signature(&self, graph: &LabeledGraph) -> Vec<Signature> {
        self.invariants
            .iter()
            .map(|invariant| invariant.compute(graph))
            .collect()
    }

    /// Number of distinct values each configured invariant takes over `indices`.
    pub fn division_counts(
        &self,
        dataset: &[LabeledGraph],
        indices: &[usize],
    ) -> IndexMap<Invariant, usize> {
        self.invariants
            .iter()
            .map(|&invariant| {
                let distinct: HashSet<Signature> = indices
                    .iter()
                    .map(|&idx| invariant.compute(&dataset[idx]))
                    .collect();
                (invariant, distinct.len())
            })
            .collect()
    }
}

pub fn default_invariants() -> Vec<Invariant> {
    vec![
        Invariant::ElementCounts,
        Invariant::BondOrderCounts,
        Invariant::DegreeSequence,
    ]
}

/// Canonical formula-like rendering of the element multiset, e.g. `C2H6O1`.
pub fn element_formula(graph: &LabeledGraph) -> String {
    Signature::Elements(element_counts(graph)).to_string()
}

fn element_counts(graph: &LabeledGraph) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for atom in graph.graph.node_weights() {
        let element = atom.element.clone().unwrap_or_default();
        *counts.entry(element).or_insert(0) += 1;
    }
    counts.into_iter().collect()
}

fn bond_order_counts(graph: &LabeledGraph) -> Vec<(i64, usize)> {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for bond in graph.graph.edge_weights() {
        *counts.entry(bond.order.unwrap_or_default()).or_insert(0) += 1;
    }
    counts.into_iter().collect()
}

fn degree_sequence(graph: &LabeledGraph) -> Vec<usize> {
    let mut degrees: Vec<usize> = graph
        .graph
        .node_indices()
        .map(|node| graph.degree(node))
        .collect();
    degrees.sort_unstable();
    degrees
}

fn density(graph: &LabeledGraph) -> Ratio {
    let n = graph.node_count() as u64;
    if n < 2 {
        return Ratio::new(0, 1);
    }
    Ratio::new(2 * graph.edge_count() as u64, n * (n - 1))
}

fn adjacency(graph: &LabeledGraph) -> Vec<Vec<usize>> {
    let mut adj = vec![Vec::new(); graph.node_count()];
    for edge in graph.graph.edge_references() {
        let (u, v) = (edge.source().index(), edge.target().index());
        adj[u].push(v);
        adj[v].push(u);
    }
    adj
}

/// Mean distance over ordered node pairs; absent for disconnected or trivial graphs.
fn average_shortest_path(graph: &LabeledGraph) -> Option<Ratio> {
    let n = graph.node_count();
    if n < 2 {
        return None;
    }
    let adj = adjacency(graph);
    let mut total = 0u64;
    for start in 0..n {
        let mut dist = vec![usize::MAX; n];
        let mut queue = VecDeque::new();
        dist[start] = 0;
        queue.push_back(start);
        let mut reached = 1;
        while let Some(node) = queue.pop_front() {
            for &next in &adj[node] {
                if dist[next] == usize::MAX {
                    dist[next] = dist[node] + 1;
                    total += dist[next] as u64;
                    reached += 1;
                    queue.push_back(next);
                }
            }
        }
        if reached != n {
            return None;
        }
    }
    Some(Ratio::new(total, (n * (n - 1)) as u64))
}

fn triangle_count(graph: &LabeledGraph) -> usize {
    let adj: Vec<HashSet<usize>> = adjacency(graph)
        .into_iter()
        .map(|neighbors| neighbors.into_iter().collect())
        .collect();
    let mut count = 0;
    for (u, neighbors) in adj.iter().enumerate() {
        for &v in neighbors.iter().filter(|&&v| v > u) {
            count += adj[v].iter().filter(|&&w| w > v && neighbors.contains(&w)).count();
        }
    }
    count
}

/// Minimum number of nodes whose removal disconnects the graph.
fn node_connectivity(graph: &LabeledGraph) -> usize {
    let n = graph.node_count();
    if n < 2 || connected_components(&graph.graph) > 1 {
        return 0;
    }
    let adj = adjacency(graph);
    let adjacent: HashSet<(usize, usize)> = graph
        .graph
        .edge_references()
        .flat_map(|edge| {
            let (u, v) = (edge.source().index(), edge.target().index());
            [(u, v), (v, u)]
        })
        .collect();

    let mut best = n - 1;
    for s in 0..n {
        for t in (s + 1)..n {
            if adjacent.contains(&(s, t)) {
                continue;
            }
            best = best.min(local_vertex_connectivity(&adj, s, t));
        }
    }
    best
}

/// Vertex-disjoint s-t paths via unit-capacity max flow on the split graph.
fn local_vertex_connectivity(adj: &[Vec<usize>], s: usize, t: usize) -> usize {
    let n = adj.len();
    let size = 2 * n;
    let unbounded = n as i32;
    let mut capacity = vec![vec![0i32; size]; size];
    for (v, neighbors) in adj.iter().enumerate() {
        capacity[2 * v][2 * v + 1] = if v == s || v == t { unbounded } else { 1 };
        for &w in neighbors {
            capacity[2 * v + 1][2 * w] = unbounded;
        }
    }

    let source = 2 * s + 1;
    let sink = 2 * t;
    let mut flow = 0usize;
    loop {
        let mut parent = vec![usize::MAX; size];
        parent[source] = source;
        let mut queue = VecDeque::from([source]);
        while let Some(u) = queue.pop_front() {
            if u == sink {
                break;
            }
            for v in 0..size {
                if parent[v] == usize::MAX && capacity[u][v] > 0 {
                    parent[v] = u;
                    queue.push_back(v);
                }
            }
        }
        if parent[sink] == usize::MAX {
            return flow;
        }

        let mut bottleneck = i32::MAX;
        let mut v = sink;
        while v != source {
            let u = parent[v];
            bottleneck = bottleneck.min(capacity[u][v]);
            v = u;
        }
        let mut v = sink;
        while v != source {
            let u = parent[v];
            capacity[u][v] -= bottleneck;
            capacity[v][u] += bottleneck;
            v = u;
        }
        flow += bottleneck as usize;
    }
}

/// Sorted, quantized, L2-normalized Katz centralities from solving `(I - αA) x = β1`.
///
/// Quantization keeps comparison exact; values that straddle a rounding
/// boundary because of floating point noise could in principle split
/// isomorphic graphs, so this invariant is not part of the default set.
fn katz_centrality(graph: &LabeledGraph) -> Option<Vec<i64>> {
    let n = graph.node_count();
    if n == 0 {
        return Some(Vec::new());
    }
    let mut system = DMatrix::<f64>::identity(n, n);
    for edge in graph.graph.edge_references() {
        let (u, v) = (edge.source().index(), edge.target().index());
        system[(u, v)] -= KATZ_ALPHA;
        system[(v, u)] -= KATZ_ALPHA;
    }
    let rhs = DVector::<f64>::from_element(n, KATZ_BETA);
    let solution = system.lu().solve(&rhs)?;
    let sum: f64 = solution.iter().sum();
    let norm = sum.signum() * solution.norm();
    if norm == 0.0 || !norm.is_finite() {
        return None;
    }
    let mut quantized: Vec<i64> = solution
        .iter()
        .map(|value| (value / norm * KATZ_QUANTUM).round() as i64)
        .collect();
    quantized.sort_unstable();
    Some(quantized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Atom, Bond};

    fn carbons(n: usize) -> Vec<Atom> {
        (0..n).map(|_| Atom::new("C", 0)).collect()
    }

    fn cycle4() -> LabeledGraph {
        let b = Bond::new(1);
        LabeledGraph::from_parts(carbons(4), &[(0, 1, b), (1, 2, b), (2, 3, b), (3, 0, b)])
    }

    fn path4() -> LabeledGraph {
        let b = Bond::new(1);
        LabeledGraph::from_parts(carbons(4), &[(0, 1, b), (1, 2, b), (2, 3, b)])
    }

    #[test]
    fn element_formula_is_sorted() {
        let graph = LabeledGraph::from_parts(
            vec![Atom::new("O", 0), Atom::new("C", 0), Atom::new("C", 1)],
            &[],
        );
        assert_eq!(element_formula(&graph), "C2O1");
    }

    #[test]
    fn ratio_is_reduced() {
        assert_eq!(Ratio::new(4, 8), Ratio::new(1, 2));
        assert_eq!(Ratio::new(0, 5), Ratio::new(0, 1));
        assert!((Ratio::new(3, 4).as_f64() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn cycle_and_path_differ_in_degree_sequence() {
        assert_eq!(degree_sequence(&cycle4()), vec![2, 2, 2, 2]);
        assert_eq!(degree_sequence(&path4()), vec![1, 1, 2, 2]);
    }

    #[test]
    fn average_shortest_path_is_absent_when_disconnected() {
        let graph = LabeledGraph::from_parts(carbons(3), &[(0, 1, Bond::new(1))]);
        assert_eq!(
            Invariant::AverageShortestPath.compute(&graph),
            Signature::Absent
        );
        // path of four: distances 1,2,3,1,2,1 over 6 unordered pairs
        assert_eq!(average_shortest_path(&path4()), Some(Ratio::new(10, 6)));
    }

    #[test]
    fn triangles_and_connectivity() {
        let b = Bond::new(1);
        let triangle = LabeledGraph::from_parts(carbons(3), &[(0, 1, b), (1, 2, b), (2, 0, b)]);
        assert_eq!(triangle_count(&triangle), 1);
        assert_eq!(node_connectivity(&triangle), 2);
        assert_eq!(node_connectivity(&cycle4()), 2);
        assert_eq!(node_connectivity(&path4()), 1);
        let split = LabeledGraph::from_parts(carbons(2), &[]);
        assert_eq!(node_connectivity(&split), 0);
    }

    #[test]
    fn katz_vector_is_symmetric_for_cycles() {
        let values = katz_centrality(&cycle4()).expect("solvable");
        assert_eq!(values.len(), 4);
        assert!(values.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn edgeless_graph_has_well_defined_signatures() {
        let graph = LabeledGraph::from_parts(carbons(2), &[]);
        for invariant in Invariant::ALL {
            let first = invariant.compute(&graph);
            assert_eq!(first, invariant.compute(&graph), "{}", invariant.name());
        }
        assert_eq!(
            Invariant::BondOrderCounts.compute(&graph),
            Signature::BondOrders(Vec::new())
        );
    }

    #[test]
    fn filter_splits_cycle_from_path() {
        let dataset = vec![cycle4(), path4(), cycle4()];
        let filter = InvariantFilter::default();
        let partition = filter.split(&dataset, Partition::single(vec![0, 1, 2]));
        assert_eq!(partition.groups(), &[vec![0, 2], vec![1]]);
    }

    #[test]
    fn inexact_katz_stays_out_of_defaults() {
        assert!(!default_invariants().contains(&Invariant::KatzCentrality));
        assert!(!InvariantFilter::default()
            .invariants()
            .contains(&Invariant::KatzCentrality));
    }

    #[test]
    fn division_counts_report_distinct_values() {
        let dataset = vec![cycle4(), path4(), cycle4()];
        let filter = InvariantFilter::new(vec![Invariant::NodeCount, Invariant::EdgeCount]);
        let counts = filter.division_counts(&dataset, &[0, 1, 2]);
        assert_eq!(counts[&Invariant::NodeCount], 1);
        assert_eq!(counts[&Invariant::EdgeCount], 2);
    }
}
