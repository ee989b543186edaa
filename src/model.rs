use iced::Point;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Independent routing plane between two extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Cmd,
    Data,
    AudioFrame,
    VideoFrame,
}

impl ChannelType {
    /// Iteration order used everywhere a record is walked per channel type.
    pub const ALL: [ChannelType; 4] = [
        ChannelType::Cmd,
        ChannelType::Data,
        ChannelType::AudioFrame,
        ChannelType::VideoFrame,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::Cmd => "cmd",
            ChannelType::Data => "data",
            ChannelType::AudioFrame => "audio_frame",
            ChannelType::VideoFrame => "video_frame",
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node as the backend reports it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub addon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<serde_json::Value>,
}

impl NodeRecord {
    pub fn new(name: impl Into<String>, addon: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            addon: addon.into(),
            ..Self::default()
        }
    }
}

/// All outgoing channels of one source extension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    #[serde(default)]
    pub extension: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<Vec<ChannelEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<ChannelEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_frame: Option<Vec<ChannelEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_frame: Option<Vec<ChannelEntry>>,
}

impl ConnectionRecord {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            ..Self::default()
        }
    }

    pub fn with_channel(mut self, channel_type: ChannelType, entry: ChannelEntry) -> Self {
        let slot = match channel_type {
            ChannelType::Cmd => &mut self.cmd,
            ChannelType::Data => &mut self.data,
            ChannelType::AudioFrame => &mut self.audio_frame,
            ChannelType::VideoFrame => &mut self.video_frame,
        };
        slot.get_or_insert_with(Vec::new).push(entry);
        self
    }

    /// Entries for one channel type; absent lists read as empty.
    pub fn entries(&self, channel_type: ChannelType) -> &[ChannelEntry] {
        let list = match channel_type {
            ChannelType::Cmd => &self.cmd,
            ChannelType::Data => &self.data,
            ChannelType::AudioFrame => &self.audio_frame,
            ChannelType::VideoFrame => &self.video_frame,
        };
        list.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelEntry {
    #[serde(default)]
    pub name: String,
    pub dest: Vec<Destination>,
}

impl ChannelEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dest: Vec::new(),
        }
    }

    pub fn to(mut self, extension: impl Into<String>) -> Self {
        self.dest.push(Destination {
            app: None,
            extension: extension.into(),
        });
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    #[serde(default)]
    pub extension: String,
}

/// Metadata the addon registry returns for one addon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddonInfo {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<serde_json::Value>,
}

/// The other end of a channel as seen from one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRef {
    pub node: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    pub channel: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSet {
    /// Peers this node sends to.
    pub as_source: Vec<PeerRef>,
    /// Peers this node receives from.
    pub as_target: Vec<PeerRef>,
}

impl ChannelSet {
    pub fn is_empty(&self) -> bool {
        self.as_source.is_empty() && self.as_target.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSets {
    pub cmd: ChannelSet,
    pub data: ChannelSet,
    pub audio_frame: ChannelSet,
    pub video_frame: ChannelSet,
}

impl ChannelSets {
    pub fn get(&self, channel_type: ChannelType) -> &ChannelSet {
        match channel_type {
            ChannelType::Cmd => &self.cmd,
            ChannelType::Data => &self.data,
            ChannelType::AudioFrame => &self.audio_frame,
            ChannelType::VideoFrame => &self.video_frame,
        }
    }

    pub fn get_mut(&mut self, channel_type: ChannelType) -> &mut ChannelSet {
        match channel_type {
            ChannelType::Cmd => &mut self.cmd,
            ChannelType::Data => &mut self.data,
            ChannelType::AudioFrame => &mut self.audio_frame,
            ChannelType::VideoFrame => &mut self.video_frame,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<Point> for Position {
    fn from(point: Point) -> Self {
        Self {
            x: point.x,
            y: point.y,
        }
    }
}

impl From<Position> for Point {
    fn from(pos: Position) -> Self {
        Point::new(pos.x, pos.y)
    }
}

/// A drawable extension instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub addon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addon_info: Option<AddonInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<serde_json::Value>,
    pub position: Position,
    pub channels: ChannelSets,
}

impl GraphNode {
    /// A stub with empty channel sets, positioned at the origin.
    pub fn from_record(record: &NodeRecord) -> Self {
        Self {
            id: record.name.clone(),
            addon: record.addon.clone(),
            addon_info: None,
            extension_group: record.extension_group.clone(),
            app: record.app.clone(),
            property: record.property.clone(),
            api: record.api.clone(),
            position: Position::default(),
            channels: ChannelSets::default(),
        }
    }
}

/// A directed, typed connection for one named channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_app: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_app: Option<String>,
    pub channel_type: ChannelType,
    pub channel_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

pub fn edge_id(source: &str, channel_name: &str, target: &str) -> String {
    format!("edge-{}-{}-{}", source, channel_name, target)
}

pub fn source_handle(node_id: &str, channel_type: ChannelType) -> String {
    format!("source-{}-{}", node_id, channel_type)
}

pub fn target_handle(node_id: &str, channel_type: ChannelType) -> String {
    format!("target-{}-{}", node_id, channel_type)
}

/// One entry of a persisted geometry record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeGeometry {
    pub extension: String,
    pub x: f32,
    pub y: f32,
}

impl NodeGeometry {
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

/// What the rendering collaborator receives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderedGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_record_parses_backend_shape() {
        let json = r#"{
            "extension": "ext_a",
            "cmd": [{"name": "greet", "dest": [{"extension": "ext_b"}]}],
            "audio_frame": [{"name": "pcm", "dest": [{"app": "http://x", "extension": "ext_c"}]}]
        }"#;
        let record: ConnectionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.extension, "ext_a");
        assert_eq!(record.entries(ChannelType::Cmd)[0].dest[0].extension, "ext_b");
        assert_eq!(
            record.entries(ChannelType::AudioFrame)[0].dest[0].app.as_deref(),
            Some("http://x")
        );
        assert!(record.entries(ChannelType::Data).is_empty());
        assert!(record.entries(ChannelType::VideoFrame).is_empty());
    }

    #[test]
    fn channel_entry_without_destinations_is_rejected() {
        let json = r#"[{"extension": "a", "cmd": [{"name": "go"}]}]"#;
        assert!(serde_json::from_str::<Vec<ConnectionRecord>>(json).is_err());

        let json = r#"[{"extension": "a", "cmd": [{"name": "go", "dest": []}]}]"#;
        assert!(serde_json::from_str::<Vec<ConnectionRecord>>(json).is_ok());
    }

    #[test]
    fn channel_type_serializes_with_backend_names() {
        let names: Vec<String> = ChannelType::ALL
            .iter()
            .map(|ty| serde_json::to_string(ty).unwrap())
            .collect();
        assert_eq!(names, ["\"cmd\"", "\"data\"", "\"audio_frame\"", "\"video_frame\""]);
    }

    #[test]
    fn handles_are_namespaced_by_channel_type() {
        assert_eq!(source_handle("a", ChannelType::Data), "source-a-data");
        assert_eq!(target_handle("b", ChannelType::VideoFrame), "target-b-video_frame");
        assert_eq!(edge_id("a", "greet", "b"), "edge-a-greet-b");
    }
}
