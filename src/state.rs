use iced::{Point, Vector};

use crate::error::PipelineError;
use crate::model::{GraphNode, RenderedGraph};
use crate::pipeline::LoadedGraph;

/// Monotonic id of a graph load; only the newest one may be applied.
pub type RequestStamp = u64;

#[derive(Debug, Clone)]
pub enum DesignerMessage {
    SelectGraph { graph_id: String },
    Reload,
    GraphLoaded {
        stamp: RequestStamp,
        graph_id: String,
        graph: RenderedGraph,
        notice: Option<String>,
    },
    GraphFailed { stamp: RequestStamp, message: String },
    NodeDragged { node_id: String, delta: Vector },
    NodeDragEnded { node_id: String },
    PersistFailed { message: String },
    DismissNotice,
}

impl DesignerMessage {
    /// Wrap a finished load for the request that started it.
    pub fn from_load(stamp: RequestStamp, result: Result<LoadedGraph, PipelineError>) -> Self {
        match result {
            Ok(loaded) => DesignerMessage::GraphLoaded {
                stamp,
                graph_id: loaded.graph_id,
                graph: loaded.graph,
                notice: loaded.degraded.map(|err| format!("node positions not saved: {err}")),
            },
            Err(err) => DesignerMessage::GraphFailed {
                stamp,
                message: err.to_string(),
            },
        }
    }
}

/// Work the caller runs after an update.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    None,
    LoadGraph { stamp: RequestStamp, graph_id: String },
    PersistGeometry { graph_id: String, nodes: Vec<GraphNode> },
}

#[derive(Debug, Default)]
pub struct DesignerState {
    graph_id: Option<String>,
    graph: RenderedGraph,
    latest: RequestStamp,
    loading: bool,
    notice: Option<String>,
}

impl DesignerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn graph_id(&self) -> Option<&str> {
        self.graph_id.as_deref()
    }

    pub fn graph(&self) -> &RenderedGraph {
        &self.graph
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Non-blocking message for the user, if any.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn update(&mut self, message: DesignerMessage) -> Effect {
        match message {
            DesignerMessage::SelectGraph { graph_id } => {
                self.graph_id = Some(graph_id.clone());
                self.graph = RenderedGraph::default();
                self.begin_load(graph_id)
            }
            DesignerMessage::Reload => match self.graph_id.clone() {
                Some(graph_id) => self.begin_load(graph_id),
                None => Effect::None,
            },
            DesignerMessage::GraphLoaded {
                stamp,
                graph_id,
                graph,
                notice,
            } => {
                if stamp != self.latest || self.graph_id.as_deref() != Some(graph_id.as_str()) {
                    tracing::debug!(stamp, latest = self.latest, "dropping stale graph load");
                    return Effect::None;
                }
                self.graph = graph;
                self.loading = false;
                if notice.is_some() {
                    self.notice = notice;
                }
                Effect::None
            }
            DesignerMessage::GraphFailed { stamp, message } => {
                if stamp == self.latest {
                    self.loading = false;
                    self.notice = Some(message);
                }
                Effect::None
            }
            DesignerMessage::NodeDragged { node_id, delta } => {
                if let Some(node) = self.graph.nodes.iter_mut().find(|n| n.id == node_id) {
                    node.position = (Point::from(node.position) + delta).into();
                }
                Effect::None
            }
            DesignerMessage::NodeDragEnded { node_id } => {
                match &self.graph_id {
                    Some(graph_id) if self.graph.nodes.iter().any(|n| n.id == node_id) => Effect::PersistGeometry {
                        graph_id: graph_id.clone(),
                        nodes: self.graph.nodes.clone(),
                    },
                    _ => Effect::None,
                }
            }
            DesignerMessage::PersistFailed { message } => {
                self.notice = Some(message);
                Effect::None
            }
            DesignerMessage::DismissNotice => {
                self.notice = None;
                Effect::None
            }
        }
    }

    fn begin_load(&mut self, graph_id: String) -> Effect {
        self.latest += 1;
        self.loading = true;
        Effect::LoadGraph {
            stamp: self.latest,
            graph_id,
        }
    }
}
