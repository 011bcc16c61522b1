//! Crate-wide error type.
//!
//! Filter evaluation never returns these: a malformed filter simply does not
//! match. Errors are for user edits that name something that does not exist,
//! for file I/O, and for the external server.

use crate::lock::ResourceKind;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no {group} filter with id {id}")]
    UnknownFilter { group: String, id: String },

    #[error("operator '{operator}' is not valid for {filter_type} filters")]
    InvalidOperator { filter_type: String, operator: String },

    #[error("no comment with id {0}")]
    UnknownComment(String),

    #[error("no node with id {0}")]
    UnknownNode(u64),

    #[error("no edge with id {0}")]
    UnknownEdge(u64),

    #[error("{kind} {id} is not locked by this client")]
    NotLocked { kind: ResourceKind, id: String },

    #[error("server error: {0}")]
    Server(String),
}

pub type Result<T> = std::result::Result<T, Error>;
