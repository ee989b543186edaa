use std::path::PathBuf;

use thiserror::Error;

use crate::model::ChannelType;

/// A connection record the indexer cannot turn into edges.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("connection #{index} has no source extension")]
    MissingSource { index: usize },

    #[error("connection from `{source_node}` has an unnamed {channel_type} channel")]
    MissingChannelName {
        source_node: String,
        channel_type: ChannelType,
    },

    #[error("{channel_type} channel `{channel}` from `{source_node}` has a destination without an extension")]
    MissingDestination {
        source_node: String,
        channel_type: ChannelType,
        channel: String,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MaterializeError {
    #[error("node #{index} has no name")]
    MissingName { index: usize },

    #[error("node `{name}` has no addon")]
    MissingAddon { name: String },

    #[error("node `{name}` appears more than once")]
    DuplicateNode { name: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("edge `{edge}` references unknown node `{node}`")]
    UnknownNode { edge: String, node: String },
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("addon `{0}` is not registered")]
    NotFound(String),

    #[error("addon registry unavailable: {0}")]
    Unavailable(String),
}

/// Failures of the geometry store or the node/connection backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed data in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("graph `{0}` not found")]
    UnknownGraph(String),

    #[error("no storage location available")]
    NoLocation,

    #[error("{0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no configuration directory available")]
    NoLocation,

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Encode(#[from] serde_json::Error),
}

/// Errors that abort one pipeline invocation.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Materialize(#[from] MaterializeError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("backend fetch failed: {0}")]
    Backend(#[source] StoreError),
}
