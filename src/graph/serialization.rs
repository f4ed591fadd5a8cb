use petgraph::visit::EdgeRef;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::graph::model::{Atom, Bond, LabeledGraph, RawEdge, RawGraph, RawNode};
use crate::partition::Partition;

/// Helper for exporting graphs back to JSON files compatible with the loader format.
pub struct GraphWriter;

impl GraphWriter {
    pub fn to_raw_graph(graph: &LabeledGraph) -> RawGraph {
        let nodes = graph
            .graph
            .node_indices()
            .map(|idx| RawNode {
                id: idx.index().to_string(),
                attributes: build_node_attributes(&graph.graph[idx]),
            })
            .collect();

        let edges = graph
            .graph
            .edge_references()
            .map(|edge_ref| RawEdge {
                source: edge_ref.source().index().to_string(),
                target: edge_ref.target().index().to_string(),
                attributes: build_edge_attributes(edge_ref.weight()),
            })
            .collect();

        let mut graph_attributes = IndexMap::new();
        if let Some(reaction_id) = &graph.reaction_id {
            graph_attributes.insert("reaction_id".to_string(), Value::from(reaction_id.clone()));
        }
        if let Some(khop) = graph.khop {
            graph_attributes.insert("khop".to_string(), Value::from(khop));
        }

        RawGraph {
            nodes,
            edges,
            graph_attributes,
        }
    }

    pub fn dataset_to_json_string(dataset: &[LabeledGraph]) -> Result<String> {
        let raw: Vec<RawGraph> = dataset.iter().map(Self::to_raw_graph).collect();
        Ok(serde_json::to_string_pretty(&raw)?)
    }

    pub fn write_dataset_to_path(dataset: &[LabeledGraph], path: &Path) -> Result<()> {
        let json = Self::dataset_to_json_string(dataset)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

/// One exported cluster: dataset indices plus the reaction ids they carry.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterRecord {
    pub cluster: usize,
    pub members: Vec<usize>,
    pub reaction_ids: Vec<Option<String>>,
}

/// Exports clusters against the dataset they were computed on.
pub struct PartitionWriter;

impl PartitionWriter {
    pub fn to_records(dataset: &[LabeledGraph], partition: &Partition) -> Vec<ClusterRecord> {
        partition
            .iter()
            .enumerate()
            .map(|(cluster, members)| ClusterRecord {
                cluster,
                members: members.clone(),
                reaction_ids: members
                    .iter()
                    .map(|&idx| dataset.get(idx).and_then(|graph| graph.reaction_id.clone()))
                    .collect(),
            })
            .collect()
    }

    pub fn to_json_string(dataset: &[LabeledGraph], partition: &Partition) -> Result<String> {
        Ok(serde_json::to_string_pretty(&Self::to_records(dataset, partition))?)
    }

    pub fn write_to_path(dataset: &[LabeledGraph], partition: &Partition, path: &Path) -> Result<()> {
        let json = Self::to_json_string(dataset, partition)?;
        let mut file =
            File::create(path).with_context(|| format!("create cluster file {:?}", path))?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

fn build_node_attributes(atom: &Atom) -> IndexMap<String, Value> {
    let mut map = IndexMap::new();
    if let Some(element) = &atom.element {
        map.insert("element".to_string(), Value::String(element.clone()));
    }
    if let Some(charge) = atom.charge {
        map.insert("charge".to_string(), Value::from(charge));
    }
    map
}

fn build_edge_attributes(bond: &Bond) -> IndexMap<String, Value> {
    let mut map = IndexMap::new();
    if let Some(order) = bond.order {
        map.insert("order".to_string(), Value::from(order));
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_carry_reaction_ids() {
        let dataset = vec![
            LabeledGraph::from_parts(vec![Atom::new("C", 0)], &[]).with_reaction_id("r0"),
            LabeledGraph::from_parts(vec![Atom::new("C", 0)], &[]),
            LabeledGraph::from_parts(vec![Atom::new("C", 0)], &[]).with_reaction_id("r2"),
        ];
        let partition = Partition::from_groups(vec![vec![0, 2], vec![1]]);
        let records = PartitionWriter::to_records(&dataset, &partition);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].members, vec![0, 2]);
        assert_eq!(
            records[0].reaction_ids,
            vec![Some("r0".to_string()), Some("r2".to_string())]
        );
        assert_eq!(records[1].reaction_ids, vec![None]);
    }

    #[test]
    fn raw_graph_omits_missing_attributes() {
        let graph = LabeledGraph::from_parts(
            vec![
                Atom::new("C", 0),
                Atom {
                    element: Some("O".into()),
                    charge: None,
                },
            ],
            &[(0, 1, Bond { order: None })],
        );
        let raw = GraphWriter::to_raw_graph(&graph);
        assert_eq!(raw.nodes[1].id, "1");
        assert!(raw.nodes[1].attributes.get("charge").is_none());
        assert!(raw.edges[0].attributes.is_empty());
        assert!(raw.graph_attributes.is_empty());
    }
}
