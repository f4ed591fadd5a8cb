use std::collections::HashSet;

use log::warn;
use petgraph::visit::EdgeRef;

use crate::error::{MalformedGraph, MalformedReason};
use crate::graph::model::LabeledGraph;

/// Check that a graph is simple and carries every attribute the matchers read.
pub fn validate_graph(graph: &LabeledGraph) -> Result<(), MalformedReason> {
    for node in graph.graph.node_indices() {
        let atom = &graph.graph[node];
        if atom.element.is_none() {
            return Err(MalformedReason::MissingElement { node: node.index() });
        }
        if atom.charge.is_none() {
            return Err(MalformedReason::MissingCharge { node: node.index() });
        }
    }

    let mut seen = HashSet::with_capacity(graph.edge_count());
    for edge in graph.graph.edge_references() {
        let (from, to) = (edge.source().index(), edge.target().index());
        if from == to {
            return Err(MalformedReason::SelfLoop { node: from });
        }
        if edge.weight().order.is_none() {
            return Err(MalformedReason::MissingOrder { from, to });
        }
        if !seen.insert((from.min(to), from.max(to))) {
            return Err(MalformedReason::ParallelEdge { from, to });
        }
    }

    Ok(())
}

/// Split dataset positions into valid indices and malformed reports.
pub fn partition_valid(dataset: &[LabeledGraph]) -> (Vec<usize>, Vec<MalformedGraph>) {
    let mut valid = Vec::with_capacity(dataset.len());
    let mut malformed = Vec::new();
    for (index, graph) in dataset.iter().enumerate() {
        match validate_graph(graph) {
            Ok(()) => valid.push(index),
            Err(reason) => {
                warn!("Excluding graph {}: {}", index, reason);
                malformed.push(MalformedGraph { index, reason });
            }
        }
    }
    (valid, malformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::model::{Atom, Bond};

    #[test]
    fn well_formed_graph_passes() {
        let graph = LabeledGraph::from_parts(
            vec![Atom::new("C", 0), Atom::new("O", 0)],
            &[(0, 1, Bond::new(2))],
        );
        assert_eq!(validate_graph(&graph), Ok(()));
    }

    #[test]
    fn missing_charge_is_reported() {
        let graph = LabeledGraph::from_parts(
            vec![
                Atom::new("C", 0),
                Atom {
                    element: Some("N".into()),
                    charge: None,
                },
            ],
            &[(0, 1, Bond::new(1))],
        );
        assert_eq!(
            validate_graph(&graph),
            Err(MalformedReason::MissingCharge { node: 1 })
        );
    }

    #[test]
    fn missing_order_and_parallel_edges_are_reported() {
        let unordered = LabeledGraph::from_parts(
            vec![Atom::new("C", 0), Atom::new("C", 0)],
            &[(0, 1, Bond { order: None })],
        );
        assert_eq!(
            validate_graph(&unordered),
            Err(MalformedReason::MissingOrder { from: 0, to: 1 })
        );

        let doubled = LabeledGraph::from_parts(
            vec![Atom::new("C", 0), Atom::new("C", 0)],
            &[(0, 1, Bond::new(1)), (1, 0, Bond::new(2))],
        );
        assert_eq!(
            validate_graph(&doubled),
            Err(MalformedReason::ParallelEdge { from: 1, to: 0 })
        );
    }

    #[test]
    fn self_loop_is_reported() {
        let looped = LabeledGraph::from_parts(vec![Atom::new("C", 0)], &[(0, 0, Bond::new(1))]);
        assert_eq!(
            validate_graph(&looped),
            Err(MalformedReason::SelfLoop { node: 0 })
        );
    }

    #[test]
    fn partition_valid_keeps_order_and_reports_indices() {
        let good = LabeledGraph::from_parts(vec![Atom::new("C", 0)], &[]);
        let bad = LabeledGraph::from_parts(vec![Atom::default()], &[]);
        let (valid, malformed) = partition_valid(&[good.clone(), bad, good]);
        assert_eq!(valid, vec![0, 2]);
        assert_eq!(malformed.len(), 1);
        assert_eq!(malformed[0].index, 1);
    }
}
