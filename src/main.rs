use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use log::{info, warn};
use serde_json::json;

use rciso::{
    BatchOrchestrator, BatchReport, ClusterConfig, GraphLoader, LabeledGraph, PartitionWriter,
};

fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}

struct Args {
    dataset: PathBuf,
    config: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut args = env::args().skip(1);
    let dataset = args
        .next()
        .map(PathBuf::from)
        .context("usage: rciso <dataset.json> [config.json]")?;
    let config = args.next().map(PathBuf::from);
    if let Some(extra) = args.next() {
        anyhow::bail!("Unexpected extra argument: {extra}");
    }
    Ok(Args { dataset, config })
}

fn load_config(path: Option<&Path>) -> Result<ClusterConfig> {
    match path {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("read config file {:?}", path))?;
            serde_json::from_str(&json).with_context(|| format!("parse config file {:?}", path))
        }
        None => Ok(ClusterConfig::default()),
    }
}

fn main() -> Result<()> {
    init_logging();
    let args = parse_args()?;
    let config = load_config(args.config.as_deref())?;

    let load_start = Instant::now();
    let dataset = GraphLoader::dataset_from_path(&args.dataset)?;
    info!(
        "Loaded {} graphs from {:?} in {:?}",
        dataset.len(),
        args.dataset,
        load_start.elapsed()
    );
    if let Some(khop) = config.khop {
        let mismatched = dataset
            .iter()
            .filter(|graph| graph.khop.is_some_and(|k| k != khop))
            .count();
        if mismatched > 0 {
            warn!("{mismatched} graphs were extracted with a khop other than {khop}");
        }
    }

    let report = BatchOrchestrator::new(config).run(&dataset)?;
    log_report(&report);
    println!("{}", serde_json::to_string_pretty(&report_json(&dataset, &report))?);
    Ok(())
}

fn log_report(report: &BatchReport) {
    for chunk in &report.chunks {
        info!(
            "Chunk {}: {} graphs, invariant groups {}, refined {}, clusters {}, vf2 calls {}",
            chunk.chunk + 1,
            chunk.range.len(),
            chunk.stats.invariant_groups,
            chunk.stats.refined_groups,
            chunk.stats.clusters,
            chunk.stats.isomorphism_tests
        );
        info!(
            "Chunk {}: invariants {:?}, refinement {:?}, confirmation {:?}, total {:?}",
            chunk.chunk + 1,
            chunk.timings.invariants,
            chunk.timings.refinement,
            chunk.timings.confirmation,
            chunk.elapsed
        );
        if !chunk.stats.refinement_converged {
            warn!(
                "Chunk {}: refinement hit its level cap, {} groups not fully refined",
                chunk.chunk + 1,
                chunk.stats.unrefined_groups
            );
        }
    }
    for malformed in report.malformed() {
        warn!("{malformed}");
    }
    info!(
        "Total clusters {} (sum over chunks) in {:?}",
        report.total_clusters(),
        report.total_elapsed()
    );
}

fn report_json(dataset: &[LabeledGraph], report: &BatchReport) -> serde_json::Value {
    let chunks: Vec<_> = report
        .chunks
        .iter()
        .map(|chunk| {
            json!({
                "chunk": chunk.chunk,
                "range": [chunk.range.start, chunk.range.end],
                "clusters": PartitionWriter::to_records(dataset, &chunk.partition),
                "malformed": chunk.malformed,
                "stats": chunk.stats,
                "timings": chunk.timings.as_seconds(),
            })
        })
        .collect();
    json!({
        "khop": report.khop,
        "total_clusters": report.total_clusters(),
        "chunks": chunks,
    })
}
