use log::debug;
use petgraph::algo::isomorphism::is_isomorphic_matching;
use rayon::prelude::*;
use serde::Serialize;

use crate::graph::{Atom, Bond, LabeledGraph};
use crate::partition::Partition;

/// Node and edge equality used by the exact isomorphism test.
pub trait AttributeMatcher: Send + Sync {
    fn atoms_match(&self, left: &Atom, right: &Atom) -> bool;
    fn bonds_match(&self, left: &Bond, right: &Bond) -> bool;
}

/// Atoms match on element and charge, bonds on order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChemicalMatcher;

impl AttributeMatcher for ChemicalMatcher {
    fn atoms_match(&self, left: &Atom, right: &Atom) -> bool {
        left.element == right.element && left.charge == right.charge
    }

    fn bonds_match(&self, left: &Bond, right: &Bond) -> bool {
        left.order == right.order
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfirmStats {
    pub groups_in: usize,
    pub groups_out: usize,
    pub isomorphism_tests: usize,
}

/// Splits candidate groups into exact isomorphism classes.
///
/// Each group is scanned in arrival order against one representative per
/// class (its first member); the first matching class wins. Groups are
/// independent and confirmed in parallel.
#[derive(Debug, Clone, Default)]
pub struct IsomorphismConfirmer<M = ChemicalMatcher> {
    matcher: M,
}

impl<M: AttributeMatcher> IsomorphismConfirmer<M> {
    pub fn new(matcher: M) -> Self {
        Self { matcher }
    }

    pub fn matcher(&self) -> &M {
        &self.matcher
    }

    /// VF2 with the configured predicates.
    pub fn is_match(&self, left: &LabeledGraph, right: &LabeledGraph) -> bool {
        if left.node_count() != right.node_count() || left.edge_count() != right.edge_count() {
            return false;
        }
        is_isomorphic_matching(
            &left.graph,
            &right.graph,
            |a: &Atom, b: &Atom| self.matcher.atoms_match(a, b),
            |a: &Bond, b: &Bond| self.matcher.bonds_match(a, b),
        )
    }

    /// Returns the classes of `group` and the number of exact tests run.
    pub fn split_group(&self, dataset: &[LabeledGraph], group: &[usize]) -> (Vec<Vec<usize>>, usize) {
        let mut classes: Vec<Vec<usize>> = Vec::new();
        let mut tests = 0;
        for &idx in group {
            let candidate = &dataset[idx];
            let mut placed = false;
            for class in classes.iter_mut() {
                tests += 1;
                if self.is_match(candidate, &dataset[class[0]]) {
                    class.push(idx);
                    placed = true;
                    break;
                }
            }
            if !placed {
                classes.push(vec![idx]);
            }
        }
        (classes, tests)
    }

    pub fn confirm(&self, dataset: &[LabeledGraph], partition: &Partition) -> (Partition, ConfirmStats) {
        let results: Vec<(Vec<Vec<usize>>, usize)> = partition
            .groups()
            .par_iter()
            .map(|group| self.split_group(dataset, group))
            .collect();

        let mut groups = Vec::new();
        let mut tests = 0;
        for (classes, group_tests) in results {
            groups.extend(classes);
            tests += group_tests;
        }
        let confirmed = Partition::from_groups(groups);
        let stats = ConfirmStats {
            groups_in: partition.len(),
            groups_out: confirmed.len(),
            isomorphism_tests: tests,
        };
        debug!(
            "Isomorphism confirmation: {} -> {} groups ({} VF2 calls)",
            stats.groups_in, stats.groups_out, stats.isomorphism_tests
        );
        (confirmed, stats)
    }
}
