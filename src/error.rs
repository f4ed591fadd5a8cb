use serde::Serialize;

/// Why a single input graph was excluded from clustering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum MalformedReason {
    #[error("node {node} has no element")]
    MissingElement { node: usize },

    #[error("node {node} has no charge")]
    MissingCharge { node: usize },

    #[error("bond {from}-{to} has no order")]
    MissingOrder { from: usize, to: usize },

    #[error("node {node} has a self loop")]
    SelfLoop { node: usize },

    #[error("nodes {from} and {to} are joined by more than one bond")]
    ParallelEdge { from: usize, to: usize },
}

/// A dataset position that failed validation, with the first defect found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("graph {index} is malformed: {reason}")]
pub struct MalformedGraph {
    pub index: usize,
    pub reason: MalformedReason,
}

/// Run-level failures. Malformed graphs are never one: they are reported next
/// to the clusters of their chunk.
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type ClusterResult<T> = std::result::Result<T, ClusterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bond_reasons_name_both_endpoints() {
        let missing = MalformedGraph {
            index: 3,
            reason: MalformedReason::MissingOrder { from: 0, to: 2 },
        };
        assert_eq!(missing.to_string(), "graph 3 is malformed: bond 0-2 has no order");
        assert!(std::error::Error::source(&missing.reason).is_none());

        let parallel = MalformedReason::ParallelEdge { from: 1, to: 4 };
        assert_eq!(
            parallel.to_string(),
            "nodes 1 and 4 are joined by more than one bond"
        );
    }

    #[test]
    fn invalid_config_is_descriptive() {
        let err = ClusterError::InvalidConfig("chunk_count must be greater than zero".into());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: chunk_count must be greater than zero"
        );
    }
}
