//! Node geometry persistence and reconciliation of laid out positions with
//! what was stored before.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::StoreError;
use crate::model::{GraphNode, NodeGeometry};

/// Remote geometry record, keyed by graph id. Writes replace the whole
/// record for one graph.
#[allow(async_fn_in_trait)]
pub trait GeometryStore {
    async fn get_graph_node_geometry(&self, graph_id: &str) -> Result<Vec<NodeGeometry>, StoreError>;

    async fn set_graph_node_geometry(
        &self,
        graph_id: &str,
        nodes_geometry: Vec<NodeGeometry>,
    ) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryGeometryStore {
    records: Mutex<HashMap<String, Vec<NodeGeometry>>>,
}

impl MemoryGeometryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GeometryStore for MemoryGeometryStore {
    async fn get_graph_node_geometry(&self, graph_id: &str) -> Result<Vec<NodeGeometry>, StoreError> {
        let records = self
            .records
            .lock()
            .map_err(|_| StoreError::Unavailable("geometry store poisoned".into()))?;
        Ok(records.get(graph_id).cloned().unwrap_or_default())
    }

    async fn set_graph_node_geometry(
        &self,
        graph_id: &str,
        nodes_geometry: Vec<NodeGeometry>,
    ) -> Result<(), StoreError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| StoreError::Unavailable("geometry store poisoned".into()))?;
        records.insert(graph_id.to_string(), nodes_geometry);
        Ok(())
    }
}

/// Every graph's geometry in one pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct FileGeometryStore {
    path: PathBuf,
}

impl FileGeometryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_all(&self) -> Result<BTreeMap<String, Vec<NodeGeometry>>, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        serde_json::from_str(&contents).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn write_all(&self, records: &BTreeMap<String, Vec<NodeGeometry>>) -> Result<(), StoreError> {
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let contents = serde_json::to_string_pretty(records).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, contents).map_err(write_err)
    }
}

impl GeometryStore for FileGeometryStore {
    async fn get_graph_node_geometry(&self, graph_id: &str) -> Result<Vec<NodeGeometry>, StoreError> {
        Ok(self.read_all()?.remove(graph_id).unwrap_or_default())
    }

    async fn set_graph_node_geometry(
        &self,
        graph_id: &str,
        nodes_geometry: Vec<NodeGeometry>,
    ) -> Result<(), StoreError> {
        let mut records = self.read_all()?;
        records.insert(graph_id.to_string(), nodes_geometry);
        self.write_all(&records)
    }
}

/// The geometry record entries for `nodes`, in node order.
pub fn geometry_of(nodes: &[GraphNode]) -> Vec<NodeGeometry> {
    nodes
        .iter()
        .map(|node| NodeGeometry {
            extension: node.id.clone(),
            x: node.position.x,
            y: node.position.y,
        })
        .collect()
}

/// Overwrite the stored record for `graph_id` with the given positions.
pub async fn force_local<S: GeometryStore>(
    store: &S,
    graph_id: &str,
    nodes: &[GraphNode],
) -> Result<(), StoreError> {
    force_local_geometry(store, graph_id, geometry_of(nodes)).await
}

/// [`force_local`] for callers that hold record entries rather than nodes.
pub async fn force_local_geometry<S: GeometryStore>(
    store: &S,
    graph_id: &str,
    geometry: Vec<NodeGeometry>,
) -> Result<(), StoreError> {
    let count = geometry.len();
    match store.set_graph_node_geometry(graph_id, geometry).await {
        Ok(()) => {
            tracing::info!(graph = graph_id, nodes = count, "persisted local geometry");
            Ok(())
        }
        Err(err) => {
            tracing::warn!(graph = graph_id, "failed to persist geometry: {err}");
            Err(err)
        }
    }
}

/// Outcome of a merge. `degraded` is set when the store failed and the
/// nodes carry their unmerged positions.
#[derive(Debug)]
pub struct Reconciliation {
    pub nodes: Vec<GraphNode>,
    pub degraded: Option<StoreError>,
}

impl Reconciliation {
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

/// Stored positions win for every node the store already knows; new nodes
/// keep their laid out position. The merged set is written back in full.
pub async fn merge<S: GeometryStore>(store: &S, graph_id: &str, nodes: Vec<GraphNode>) -> Reconciliation {
    let stored = match store.get_graph_node_geometry(graph_id).await {
        Ok(stored) => stored,
        Err(err) => {
            tracing::warn!(graph = graph_id, "failed to fetch geometry, keeping layout: {err}");
            return Reconciliation {
                nodes,
                degraded: Some(err),
            };
        }
    };

    let stored: HashMap<&str, &NodeGeometry> = stored.iter().map(|g| (g.extension.as_str(), g)).collect();
    let mut merged = nodes.clone();
    let mut kept = 0usize;
    for node in merged.iter_mut() {
        if let Some(geometry) = stored.get(node.id.as_str()) {
            node.position = geometry.position();
            kept += 1;
        }
    }

    if let Err(err) = store.set_graph_node_geometry(graph_id, geometry_of(&merged)).await {
        tracing::warn!(graph = graph_id, "failed to persist merged geometry: {err}");
        return Reconciliation {
            nodes,
            degraded: Some(err),
        };
    }

    tracing::debug!(
        graph = graph_id,
        stored = kept,
        fresh = merged.len() - kept,
        "merged geometry"
    );
    Reconciliation {
        nodes: merged,
        degraded: None,
    }
}
