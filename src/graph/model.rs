use indexmap::IndexMap;
use petgraph::graph::UnGraph;
use serde::{Deserialize, Serialize};

/// Atom attributes used by every matching predicate.
///
/// Both fields are optional because the upstream extractor may omit them;
/// graphs with missing attributes are rejected by validation before any
/// filter runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Atom {
    pub element: Option<String>,
    pub charge: Option<i64>,
}

impl Atom {
    pub fn new(element: impl Into<String>, charge: i64) -> Self {
        Self {
            element: Some(element.into()),
            charge: Some(charge),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bond {
    pub order: Option<i64>,
}

impl Bond {
    pub fn new(order: i64) -> Self {
        Self { order: Some(order) }
    }
}

pub type MolGraph = UnGraph<Atom, Bond>;

#[derive(Debug, Clone, Default)]
pub struct LabeledGraph {
    pub graph: MolGraph,
    pub reaction_id: Option<String>,
    /// Neighborhood radius the producer used around the reaction center.
    pub khop: Option<usize>,
}

impl LabeledGraph {
    pub fn new(graph: MolGraph) -> Self {
        Self {
            graph,
            reaction_id: None,
            khop: None,
        }
    }

    /// Build a graph from plain atom and bond lists; bonds reference atom positions.
    pub fn from_parts(atoms: Vec<Atom>, bonds: &[(usize, usize, Bond)]) -> Self {
        let mut graph = MolGraph::with_capacity(atoms.len(), bonds.len());
        let nodes: Vec<_> = atoms.into_iter().map(|atom| graph.add_node(atom)).collect();
        for &(source, target, bond) in bonds {
            graph.add_edge(nodes[source], nodes[target], bond);
        }
        Self::new(graph)
    }

    pub fn with_reaction_id(mut self, reaction_id: impl Into<String>) -> Self {
        self.reaction_id = Some(reaction_id.into());
        self
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn degree(&self, node: petgraph::graph::NodeIndex) -> usize {
        self.graph.neighbors(node).count()
    }
}

/// JSON shape accepted by the loader, one entry per graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawGraph {
    pub nodes: Vec<RawNode>,
    pub edges: Vec<RawEdge>,
    #[serde(default)]
    pub graph_attributes: IndexMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawNode {
    pub id: String,
    #[serde(default)]
    pub attributes: IndexMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEdge {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub attributes: IndexMap<String, serde_json::Value>,
}
