#![allow(dead_code)]

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use petgraph::visit::EdgeRef;

use rciso::{Atom, Bond, LabeledGraph};

const ELEMENTS: [&str; 4] = ["C", "N", "O", "H"];

pub fn rng(seed: u64) -> Xoshiro256PlusPlus {
    Xoshiro256PlusPlus::seed_from_u64(seed)
}

pub fn carbon_chain(len: usize, orders: &[i64]) -> LabeledGraph {
    let atoms = (0..len).map(|_| Atom::new("C", 0)).collect();
    let bonds: Vec<_> = orders
        .iter()
        .enumerate()
        .map(|(i, &order)| (i, i + 1, Bond::new(order)))
        .collect();
    LabeledGraph::from_parts(atoms, &bonds)
}

pub fn carbon_cycle(len: usize) -> LabeledGraph {
    let atoms = (0..len).map(|_| Atom::new("C", 0)).collect();
    let bonds: Vec<_> = (0..len).map(|i| (i, (i + 1) % len, Bond::new(1))).collect();
    LabeledGraph::from_parts(atoms, &bonds)
}

/// Random small molecule: a spanning tree plus a few ring closures.
pub fn random_molecule(rng: &mut Xoshiro256PlusPlus, nodes: usize) -> LabeledGraph {
    let atoms: Vec<Atom> = (0..nodes)
        .map(|_| {
            let element = ELEMENTS[rng.gen_range(0..ELEMENTS.len())];
            let charge = if rng.gen_bool(0.1) { -1 } else { 0 };
            Atom::new(element, charge)
        })
        .collect();

    let mut pairs = Vec::new();
    for node in 1..nodes {
        pairs.push((rng.gen_range(0..node), node));
    }
    let extra = rng.gen_range(0..=nodes / 3);
    for _ in 0..extra {
        let a = rng.gen_range(0..nodes);
        let b = rng.gen_range(0..nodes);
        let key = (a.min(b), a.max(b));
        if a != b && !pairs.iter().any(|&(u, v)| (u.min(v), u.max(v)) == key) {
            pairs.push((a, b));
        }
    }

    let bonds: Vec<_> = pairs
        .into_iter()
        .map(|(a, b)| (a, b, Bond::new(rng.gen_range(1..=3))))
        .collect();
    LabeledGraph::from_parts(atoms, &bonds)
}

/// Same graph with shuffled node ids, edge insertion order and edge orientation.
pub fn permuted(graph: &LabeledGraph, rng: &mut Xoshiro256PlusPlus) -> LabeledGraph {
    let n = graph.node_count();
    let mut perm: Vec<usize> = (0..n).collect();
    perm.shuffle(rng);

    let mut atoms = vec![Atom::default(); n];
    for node in graph.graph.node_indices() {
        atoms[perm[node.index()]] = graph.graph[node].clone();
    }

    let mut bonds: Vec<_> = graph
        .graph
        .edge_references()
        .map(|edge| {
            let (a, b) = (perm[edge.source().index()], perm[edge.target().index()]);
            if rng.gen_bool(0.5) {
                (a, b, *edge.weight())
            } else {
                (b, a, *edge.weight())
            }
        })
        .collect();
    bonds.shuffle(rng);
    LabeledGraph::from_parts(atoms, &bonds)
}

/// Dataset of `classes` random molecules, each present `copies` times under
/// random relabelings, in shuffled order. Returns the source class of each index.
pub fn relabeled_dataset(seed: u64, classes: usize, copies: usize) -> (Vec<LabeledGraph>, Vec<usize>) {
    let mut rng = rng(seed);
    let mut entries = Vec::with_capacity(classes * copies);
    for class in 0..classes {
        let nodes = rng.gen_range(2..9);
        let base = random_molecule(&mut rng, nodes);
        for _ in 0..copies {
            entries.push((class, permuted(&base, &mut rng)));
        }
    }
    entries.shuffle(&mut rng);
    let sources = entries.iter().map(|(class, _)| *class).collect();
    let graphs = entries.into_iter().map(|(_, graph)| graph).collect();
    (graphs, sources)
}
