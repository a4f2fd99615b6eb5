use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("A cell network needs at least one node")]
    EmptyNetwork,

    #[error("A substrate needs at least one site")]
    EmptySubstrate,

    #[error("Node index {index} is out of range for a network of {count} nodes")]
    NodeOutOfRange { index: usize, count: usize },

    #[error("Substrate site index {index} is out of range for a substrate of {count} sites")]
    SiteOutOfRange { index: usize, count: usize },

    #[error("Node {0} cannot be linked to itself")]
    SelfLink(usize),

    #[error("Nodes {0} and {1} are already linked")]
    DuplicateLink(usize, usize),

    #[error("Node {cell} is already linked to substrate site {site}")]
    DuplicateSubstrateLink { cell: usize, site: usize },

    #[error("Expected {expected} {what}, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid link parameter '{name}': {value} is negative, non-finite or too large")]
    InvalidLinkParameter { name: &'static str, value: f64 },
}
