//! Graph engine for a message-routing editor: turns backend node and
//! connection records into a laid out graph and keeps node positions in
//! sync with a geometry store.

pub mod config;
pub mod error;
pub mod events;
pub mod geometry;
pub mod index;
pub mod layout;
pub mod materialize;
pub mod model;
pub mod pipeline;
pub mod snapshot;
pub mod state;
pub mod telemetry;

pub use config::{Config, LayoutConfig};
pub use error::{IndexError, LayoutError, MaterializeError, PipelineError, RegistryError, StoreError};
pub use events::{DesignerEvent, EventBus, EventKind, Subscription};
pub use geometry::{FileGeometryStore, GeometryStore, MemoryGeometryStore, Reconciliation};
pub use index::{EdgeAddressMap, IndexedConnections, index_connections};
pub use layout::{LayoutResult, auto_layout};
pub use materialize::{AddonQuery, AddonRegistry, materialize_nodes};
pub use model::{
    AddonInfo, ChannelEntry, ChannelType, ConnectionRecord, Destination, GraphEdge, GraphNode, NodeGeometry,
    NodeRecord, Position, RenderedGraph,
};
pub use pipeline::{GraphBackend, LoadedGraph, Pipeline};
pub use state::{DesignerMessage, DesignerState, Effect};
