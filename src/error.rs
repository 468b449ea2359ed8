//! Top-level error type: every fallible surface funnels into one of these
//! variants at a crate boundary, even though individual modules mostly work
//! in terms of `anyhow::Result` internally.

use crate::graph::NodeId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("graph validation failed: {0}")]
    GraphValidation(String),

    #[error("executor for node {node_id} failed: {message}")]
    ExecutorFailure { node_id: NodeId, message: String },

    #[error("resource failure: {0}")]
    ResourceFailure(String),

    #[error("connection error on '{connection_id}': {message}")]
    ConnectionError {
        connection_id: String,
        message: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
