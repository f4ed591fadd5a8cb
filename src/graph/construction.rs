use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;

use crate::graph::model::{Atom, Bond, LabeledGraph, MolGraph, RawGraph};

const REACTION_ID_KEYS: [&str; 3] = ["reaction_id", "R-id", "R_ID"];

/// High-level loader responsible for turning JSON representations into in-memory graphs.
///
/// Missing `element`, `charge` or `order` attributes are carried through as
/// `None`; validation decides what to do with such graphs.
#[derive(Debug, Default)]
pub struct GraphLoader;

impl GraphLoader {
    /// Parse a JSON object into a single graph.
    pub fn from_json_str(json: &str) -> Result<LabeledGraph> {
        let raw: RawGraph = serde_json::from_str(json)?;
        Self::from_raw_graph(raw)
    }

    /// Parse a JSON array of graphs into a dataset, preserving order.
    pub fn dataset_from_json_str(json: &str) -> Result<Vec<LabeledGraph>> {
        let raw: Vec<RawGraph> = serde_json::from_str(json)?;
        raw.into_iter()
            .enumerate()
            .map(|(idx, graph)| {
                Self::from_raw_graph(graph).with_context(|| format!("build graph #{idx}"))
            })
            .collect()
    }

    /// Read a dataset JSON array from a reader.
    pub fn dataset_from_reader<R: Read>(mut reader: R) -> Result<Vec<LabeledGraph>> {
        let mut buf = String::new();
        reader.read_to_string(&mut buf)?;
        Self::dataset_from_json_str(&buf)
    }

    pub fn dataset_from_path(path: &Path) -> Result<Vec<LabeledGraph>> {
        let file = File::open(path).with_context(|| format!("open dataset file {:?}", path))?;
        Self::dataset_from_reader(BufReader::new(file))
            .with_context(|| format!("parse dataset file {:?}", path))
    }

    fn from_raw_graph(raw: RawGraph) -> Result<LabeledGraph> {
        let mut graph = MolGraph::with_capacity(raw.nodes.len(), raw.edges.len());
        let mut node_lookup = IndexMap::new();

        for raw_node in raw.nodes {
            let attributes = raw_node.attributes;
            let atom = Atom {
                element: attributes.get("element").and_then(value_to_string),
                charge: attributes.get("charge").and_then(value_to_integer),
            };
            let idx = graph.add_node(atom);
            if node_lookup.insert(raw_node.id.clone(), idx).is_some() {
                return Err(anyhow!("Duplicate node id: {}", raw_node.id));
            }
        }

        for raw_edge in raw.edges {
            let source_idx = *node_lookup
                .get(&raw_edge.source)
                .ok_or_else(|| anyhow!("Unknown source node id: {}", raw_edge.source))?;
            let target_idx = *node_lookup
                .get(&raw_edge.target)
                .ok_or_else(|| anyhow!("Unknown target node id: {}", raw_edge.target))?;
            let bond = Bond {
                order: raw_edge.attributes.get("order").and_then(value_to_integer),
            };
            graph.add_edge(source_idx, target_idx, bond);
        }

        let reaction_id = REACTION_ID_KEYS
            .iter()
            .find_map(|key| raw.graph_attributes.get(*key))
            .and_then(value_to_string);
        let khop = raw
            .graph_attributes
            .get("khop")
            .and_then(value_to_integer)
            .and_then(|k| usize::try_from(k).ok());

        Ok(LabeledGraph {
            graph,
            reaction_id,
            khop,
        })
    }
}

fn value_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(num) => Some(num.to_string()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Integers may arrive as `1`, `1.0` or `"1"`; anything fractional is treated as missing.
fn value_to_integer(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(num) => num.as_i64().or_else(|| {
            num.as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64)
        }),
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}
