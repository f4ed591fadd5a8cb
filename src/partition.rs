use std::collections::HashMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Ordered set of disjoint, non-empty groups of dataset indices.
///
/// Groups appear in the order their first member arrived and members keep
/// arrival order, so every stage is reproducible regardless of thread
/// scheduling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Partition {
    groups: Vec<Vec<usize>>,
}

impl Partition {
    /// A single group holding every index, or an empty partition for no input.
    pub fn single(indices: Vec<usize>) -> Self {
        Self::from_groups(vec![indices])
    }

    pub fn from_groups(groups: Vec<Vec<usize>>) -> Self {
        Self {
            groups: groups.into_iter().filter(|g| !g.is_empty()).collect(),
        }
    }

    pub fn groups(&self) -> &[Vec<usize>] {
        &self.groups
    }

    pub fn into_groups(self) -> Vec<Vec<usize>> {
        self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn member_count(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vec<usize>> {
        self.groups.iter()
    }

    /// Map every member to the position of its group.
    pub fn group_lookup(&self) -> HashMap<usize, usize> {
        let mut lookup = HashMap::with_capacity(self.member_count());
        for (group_idx, group) in self.groups.iter().enumerate() {
            for &member in group {
                lookup.insert(member, group_idx);
            }
        }
        lookup
    }

    /// True when the groups are disjoint and their union is exactly `expected`.
    pub fn is_disjoint_cover(&self, expected: &[usize]) -> bool {
        let mut members: Vec<usize> = self.groups.iter().flatten().copied().collect();
        let mut wanted = expected.to_vec();
        members.sort_unstable();
        wanted.sort_unstable();
        wanted.dedup();
        members == wanted && self.groups.iter().all(|g| !g.is_empty())
    }

    /// True when every group of `self` lies inside a single group of `coarser`.
    pub fn is_refinement_of(&self, coarser: &Partition) -> bool {
        let lookup = coarser.group_lookup();
        self.groups.iter().all(|group| {
            let mut owners = group.iter().map(|member| lookup.get(member));
            match owners.next() {
                Some(Some(first)) => owners.all(|owner| owner == Some(first)),
                _ => false,
            }
        })
    }

    /// Compare groupings while ignoring group and member order.
    pub fn same_grouping(&self, other: &Partition) -> bool {
        normalized(&self.groups) == normalized(&other.groups)
    }

    /// Shift every member by `offset`, used to lift chunk-local indices to dataset indices.
    pub fn offset(self, offset: usize) -> Self {
        Self {
            groups: self
                .groups
                .into_iter()
                .map(|group| group.into_iter().map(|idx| idx + offset).collect())
                .collect(),
        }
    }

    /// Split every group by a per-member key, computing keys in parallel.
    pub fn refine_by_key<K, F>(&self, key: F) -> Partition
    where
        K: Ord + Send,
        F: Fn(usize) -> K + Sync,
    {
        let groups = self
            .groups
            .par_iter()
            .map(|group| {
                let keys: Vec<K> = group.iter().map(|&idx| key(idx)).collect();
                split_by_key(group, &keys)
            })
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect();
        Partition { groups }
    }
}

impl IntoIterator for Partition {
    type Item = Vec<usize>;
    type IntoIter = std::vec::IntoIter<Vec<usize>>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.into_iter()
    }
}

/// Split `group` into runs of equal keys.
///
/// Runs are ordered by their first member's position in `group` and members
/// keep their relative order. Keys are compared by `Ord`, never hashed into a
/// map keyed by the signature itself.
pub fn split_by_key<K: Ord>(group: &[usize], keys: &[K]) -> Vec<Vec<usize>> {
    debug_assert_eq!(group.len(), keys.len());
    let mut order: Vec<usize> = (0..group.len()).collect();
    order.sort_by(|&a, &b| keys[a].cmp(&keys[b]));

    let mut runs: Vec<Vec<usize>> = Vec::new();
    let mut previous: Option<usize> = None;
    for pos in order {
        match (previous, runs.last_mut()) {
            (Some(prev), Some(run)) if keys[prev] == keys[pos] => run.push(pos),
            _ => runs.push(vec![pos]),
        }
        previous = Some(pos);
    }

    runs.sort_by_key(|run| run[0]);
    runs.into_iter()
        .map(|run| run.into_iter().map(|pos| group[pos]).collect())
        .collect()
}

fn normalized(groups: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let mut sorted: Vec<Vec<usize>> = groups
        .iter()
        .map(|group| {
            let mut group = group.clone();
            group.sort_unstable();
            group
        })
        .collect();
    sorted.sort();
    sorted
}
