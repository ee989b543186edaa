//! Backend records to rendered graph: index, materialize, lay out, then
//! reconcile with stored geometry.

use crate::config::Config;
use crate::error::{PipelineError, StoreError};
use crate::events::{DesignerEvent, EventBus};
use crate::geometry::{self, GeometryStore};
use crate::index::index_connections;
use crate::layout::auto_layout;
use crate::materialize::{AddonRegistry, materialize_nodes};
use crate::model::{ConnectionRecord, GraphNode, NodeRecord, RenderedGraph};

/// Source of a graph's nodes and connections.
#[allow(async_fn_in_trait)]
pub trait GraphBackend {
    async fn fetch_nodes(&self, graph_id: &str) -> Result<Vec<NodeRecord>, StoreError>;

    async fn fetch_connections(&self, graph_id: &str) -> Result<Vec<ConnectionRecord>, StoreError>;
}

#[derive(Debug)]
pub struct LoadedGraph {
    pub graph_id: String,
    pub graph: RenderedGraph,
    /// Set when geometry could not be reconciled with the store.
    pub degraded: Option<StoreError>,
}

pub struct Pipeline<B, R, S> {
    backend: B,
    registry: R,
    store: S,
    config: Config,
    events: EventBus,
}

impl<B, R, S> Pipeline<B, R, S>
where
    B: GraphBackend,
    R: AddonRegistry,
    S: GeometryStore,
{
    pub fn new(backend: B, registry: R, store: S, config: Config, events: EventBus) -> Self {
        Self {
            backend,
            registry,
            store,
            config,
            events,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Fetch, lay out and reconcile one graph. Only malformed records and
    /// backend fetch failures abort; geometry trouble degrades.
    pub async fn load_graph(&self, graph_id: &str) -> Result<LoadedGraph, PipelineError> {
        let records = self
            .backend
            .fetch_nodes(graph_id)
            .await
            .map_err(PipelineError::Backend)?;
        let connections = self
            .backend
            .fetch_connections(graph_id)
            .await
            .map_err(PipelineError::Backend)?;

        let indexed = index_connections(&connections)?;
        let nodes = materialize_nodes(
            &records,
            &indexed.addresses,
            self.config.base_dir.as_deref(),
            &self.registry,
        )
        .await?;
        let laid_out = auto_layout(nodes, indexed.edges, &self.config.layout)?;

        let reconciled = geometry::merge(&self.store, graph_id, laid_out.nodes).await;
        if let Some(err) = &reconciled.degraded {
            self.events.publish(DesignerEvent::GeometryDegraded {
                graph_id: graph_id.to_string(),
                message: err.to_string(),
            });
        }

        let graph = RenderedGraph {
            nodes: reconciled.nodes,
            edges: laid_out.edges,
        };
        self.events.publish(DesignerEvent::GraphLoaded {
            graph_id: graph_id.to_string(),
            nodes: graph.nodes.len(),
            edges: graph.edges.len(),
        });

        Ok(LoadedGraph {
            graph_id: graph_id.to_string(),
            graph,
            degraded: reconciled.degraded,
        })
    }

    /// Persist positions the user arranged by hand, replacing the record.
    pub async fn persist_positions(&self, graph_id: &str, nodes: &[GraphNode]) -> Result<(), StoreError> {
        match geometry::force_local(&self.store, graph_id, nodes).await {
            Ok(()) => {
                self.events.publish(DesignerEvent::GeometryPersisted {
                    graph_id: graph_id.to_string(),
                });
                Ok(())
            }
            Err(err) => {
                self.events.publish(DesignerEvent::GeometryDegraded {
                    graph_id: graph_id.to_string(),
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }
}
