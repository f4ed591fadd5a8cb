mod common;

use anyhow::Result;
use rciso::{BatchOrchestrator, ClusterConfig, GraphLoader, GraphWriter, MalformedReason};

use common::relabeled_dataset;

fn reaction_centers() -> &'static str {
    r#"[
        {
            "nodes": [
                {"id": "c1", "attributes": {"element": "C", "charge": 0}},
                {"id": "o1", "attributes": {"element": "O", "charge": 0}}
            ],
            "edges": [
                {"source": "c1", "target": "o1", "attributes": {"order": 2}}
            ],
            "graph_attributes": {"R-id": "rxn-1", "khop": 1}
        },
        {
            "nodes": [
                {"id": "x", "attributes": {"element": "O", "charge": "0"}},
                {"id": "y", "attributes": {"element": "C", "charge": 0.0}}
            ],
            "edges": [
                {"source": "y", "target": "x", "attributes": {"order": 2.0}}
            ],
            "graph_attributes": {"reaction_id": "rxn-2", "khop": 1}
        },
        {
            "nodes": [
                {"id": "a", "attributes": {"element": "C"}},
                {"id": "b", "attributes": {"element": "O", "charge": 0}}
            ],
            "edges": [
                {"source": "a", "target": "b", "attributes": {"order": 2}}
            ]
        }
    ]"#
}

#[test]
fn loaded_reaction_centers_cluster_by_structure() -> Result<()> {
    let dataset = GraphLoader::dataset_from_json_str(reaction_centers())?;
    assert_eq!(dataset.len(), 3);
    assert_eq!(dataset[0].reaction_id.as_deref(), Some("rxn-1"));
    assert_eq!(dataset[1].reaction_id.as_deref(), Some("rxn-2"));
    assert_eq!(dataset[0].khop, Some(1));
    assert_eq!(dataset[2].khop, None);

    let report = BatchOrchestrator::new(ClusterConfig::default()).run(&dataset)?;
    assert_eq!(report.partition().groups(), &[vec![0, 1]]);
    let malformed: Vec<_> = report.malformed().collect();
    assert_eq!(malformed.len(), 1);
    assert_eq!(malformed[0].index, 2);
    assert_eq!(malformed[0].reason, MalformedReason::MissingCharge { node: 0 });
    Ok(())
}

#[test]
fn dangling_edge_is_a_load_error() {
    let json = r#"[{"nodes": [{"id": "a", "attributes": {}}],
                   "edges": [{"source": "a", "target": "z", "attributes": {}}]}]"#;
    let err = GraphLoader::dataset_from_json_str(json).expect_err("unknown endpoint");
    assert!(format!("{err:#}").contains("Unknown target node id: z"));
}

#[test]
fn written_dataset_reloads_into_the_same_clusters() -> Result<()> {
    let (dataset, _) = relabeled_dataset(42, 8, 3);
    let path = std::env::temp_dir().join(format!("rciso-io-{}.json", std::process::id()));
    GraphWriter::write_dataset_to_path(&dataset, &path)?;
    let reloaded = GraphLoader::dataset_from_path(&path)?;
    std::fs::remove_file(&path)?;

    assert_eq!(reloaded.len(), dataset.len());
    let config = ClusterConfig {
        chunk_count: 2,
        ..ClusterConfig::default()
    };
    let before = BatchOrchestrator::new(config.clone()).run(&dataset)?;
    let after = BatchOrchestrator::new(config).run(&reloaded)?;
    assert_eq!(before.partition(), after.partition());
    Ok(())
}
