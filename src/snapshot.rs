use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{RegistryError, StoreError};
use crate::materialize::{AddonQuery, AddonRegistry};
use crate::model::{AddonInfo, ConnectionRecord, NodeRecord};
use crate::pipeline::GraphBackend;

/// Backend state captured in one JSON file: graphs by id plus the addons
/// they may reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub graphs: BTreeMap<String, GraphSnapshot>,
    #[serde(default)]
    pub addons: Vec<AddonInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub connections: Vec<ConnectionRecord>,
}

impl Snapshot {
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let contents = fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn graph(&self, graph_id: &str) -> Result<&GraphSnapshot, StoreError> {
        self.graphs
            .get(graph_id)
            .ok_or_else(|| StoreError::UnknownGraph(graph_id.to_string()))
    }
}

impl GraphBackend for Snapshot {
    async fn fetch_nodes(&self, graph_id: &str) -> Result<Vec<NodeRecord>, StoreError> {
        Ok(self.graph(graph_id)?.nodes.clone())
    }

    async fn fetch_connections(&self, graph_id: &str) -> Result<Vec<ConnectionRecord>, StoreError> {
        Ok(self.graph(graph_id)?.connections.clone())
    }
}

impl AddonRegistry for Snapshot {
    async fn resolve_addons(&self, query: &AddonQuery) -> Result<Vec<AddonInfo>, RegistryError> {
        let found: Vec<AddonInfo> = self
            .addons
            .iter()
            .filter(|addon| addon.name == query.addon_name)
            .cloned()
            .collect();
        if found.is_empty() {
            return Err(RegistryError::NotFound(query.addon_name.clone()));
        }
        Ok(found)
    }
}
