//! Turns the backend's flat connection list into typed edges plus a
//! per-node adjacency lookup.

use std::collections::HashMap;

use crate::error::IndexError;
use crate::model::{ChannelSet, ChannelType, ConnectionRecord, GraphEdge, PeerRef, edge_id};

/// Per channel type, node id to the peers it sends to and receives from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeAddressMap {
    buckets: HashMap<ChannelType, HashMap<String, ChannelSet>>,
}

impl EdgeAddressMap {
    pub fn as_source(&self, channel_type: ChannelType, node: &str) -> &[PeerRef] {
        self.bucket(channel_type, node)
            .map(|set| set.as_source.as_slice())
            .unwrap_or(&[])
    }

    pub fn as_target(&self, channel_type: ChannelType, node: &str) -> &[PeerRef] {
        self.bucket(channel_type, node)
            .map(|set| set.as_target.as_slice())
            .unwrap_or(&[])
    }

    pub fn channel_set(&self, channel_type: ChannelType, node: &str) -> ChannelSet {
        self.bucket(channel_type, node).cloned().unwrap_or_default()
    }

    fn bucket(&self, channel_type: ChannelType, node: &str) -> Option<&ChannelSet> {
        self.buckets.get(&channel_type)?.get(node)
    }

    fn entry(&mut self, channel_type: ChannelType, node: &str) -> &mut ChannelSet {
        self.buckets
            .entry(channel_type)
            .or_default()
            .entry(node.to_string())
            .or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexedConnections {
    pub edges: Vec<GraphEdge>,
    pub addresses: EdgeAddressMap,
}

/// One edge per (source, channel, destination). Fan-out and duplicate
/// destinations both yield one edge each.
pub fn index_connections(connections: &[ConnectionRecord]) -> Result<IndexedConnections, IndexError> {
    let mut indexed = IndexedConnections::default();

    for (index, connection) in connections.iter().enumerate() {
        if connection.extension.is_empty() {
            return Err(IndexError::MissingSource { index });
        }
        let source = connection.extension.as_str();

        for channel_type in ChannelType::ALL {
            for entry in connection.entries(channel_type) {
                if entry.name.is_empty() {
                    return Err(IndexError::MissingChannelName {
                        source_node: source.to_string(),
                        channel_type,
                    });
                }

                for dest in &entry.dest {
                    if dest.extension.is_empty() {
                        return Err(IndexError::MissingDestination {
                            source_node: source.to_string(),
                            channel_type,
                            channel: entry.name.clone(),
                        });
                    }
                    let target = dest.extension.as_str();

                    indexed.edges.push(GraphEdge {
                        id: edge_id(source, &entry.name, target),
                        source: source.to_string(),
                        target: target.to_string(),
                        source_app: connection.app.clone(),
                        target_app: dest.app.clone(),
                        channel_type,
                        channel_name: entry.name.clone(),
                        source_handle: None,
                        target_handle: None,
                    });

                    indexed.addresses.entry(channel_type, source).as_source.push(PeerRef {
                        node: target.to_string(),
                        app: dest.app.clone(),
                        channel: entry.name.clone(),
                    });
                    indexed.addresses.entry(channel_type, target).as_target.push(PeerRef {
                        node: source.to_string(),
                        app: connection.app.clone(),
                        channel: entry.name.clone(),
                    });
                }
            }
        }
    }

    tracing::debug!(
        connections = connections.len(),
        edges = indexed.edges.len(),
        "indexed connections"
    );
    Ok(indexed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChannelEntry, Destination};

    fn sample() -> Vec<ConnectionRecord> {
        vec![
            ConnectionRecord::new("ext_a")
                .with_channel(ChannelType::Cmd, ChannelEntry::new("greet").to("ext_b"))
                .with_channel(ChannelType::Data, ChannelEntry::new("text").to("ext_b").to("ext_c")),
            ConnectionRecord::new("ext_b")
                .with_channel(ChannelType::AudioFrame, ChannelEntry::new("pcm").to("ext_a")),
        ]
    }

    #[test]
    fn edge_ids_are_reproducible() {
        let first = index_connections(&sample()).unwrap();
        let second = index_connections(&sample()).unwrap();
        let ids = |indexed: &IndexedConnections| {
            indexed.edges.iter().map(|e| e.id.clone()).collect::<Vec<_>>()
        };
        assert_eq!(ids(&first), ids(&second));
        assert_eq!(
            ids(&first),
            ["edge-ext_a-greet-ext_b", "edge-ext_a-text-ext_b", "edge-ext_a-text-ext_c", "edge-ext_b-pcm-ext_a"]
        );
    }

    #[test]
    fn fan_out_produces_one_edge_per_destination() {
        let entry = ChannelEntry::new("broadcast").to("t1").to("t2").to("t3");
        let record = ConnectionRecord::new("src").with_channel(ChannelType::Data, entry);
        let indexed = index_connections(&[record]).unwrap();

        assert_eq!(indexed.edges.len(), 3);
        assert!(indexed.edges.iter().all(|e| e.source == "src" && e.channel_name == "broadcast"));
        let targets: Vec<&str> = indexed.edges.iter().map(|e| e.target.as_str()).collect();
        assert_eq!(targets, ["t1", "t2", "t3"]);
    }

    #[test]
    fn duplicate_destinations_are_kept() {
        let entry = ChannelEntry::new("ping").to("b").to("b");
        let record = ConnectionRecord::new("a").with_channel(ChannelType::Cmd, entry);
        let indexed = index_connections(&[record]).unwrap();
        assert_eq!(indexed.edges.len(), 2);
        assert_eq!(indexed.edges[0].id, indexed.edges[1].id);
    }

    #[test]
    fn address_map_holds_forward_and_reverse_entries() {
        let indexed = index_connections(&sample()).unwrap();
        let map = &indexed.addresses;

        let forward: Vec<&str> = map
            .as_source(ChannelType::Data, "ext_a")
            .iter()
            .map(|p| p.node.as_str())
            .collect();
        assert_eq!(forward, ["ext_b", "ext_c"]);

        let reverse = map.as_target(ChannelType::Cmd, "ext_b");
        assert_eq!(reverse.len(), 1);
        assert_eq!(reverse[0].node, "ext_a");
        assert_eq!(reverse[0].channel, "greet");

        assert_eq!(map.as_target(ChannelType::AudioFrame, "ext_a")[0].node, "ext_b");
        assert!(map.as_source(ChannelType::VideoFrame, "ext_a").is_empty());
        assert!(map.as_source(ChannelType::Cmd, "nobody").is_empty());
    }

    #[test]
    fn empty_channel_lists_contribute_nothing() {
        let mut record = ConnectionRecord::new("a");
        record.cmd = Some(Vec::new());
        let indexed = index_connections(&[record]).unwrap();
        assert!(indexed.edges.is_empty());
    }

    #[test]
    fn app_is_carried_onto_peers_and_edges() {
        let mut record = ConnectionRecord::new("a").with_channel(
            ChannelType::Cmd,
            ChannelEntry {
                name: "hello".into(),
                dest: vec![Destination {
                    app: Some("msgpack://remote".into()),
                    extension: "b".into(),
                }],
            },
        );
        record.app = Some("msgpack://local".into());
        let indexed = index_connections(&[record]).unwrap();

        assert_eq!(indexed.edges[0].source_app.as_deref(), Some("msgpack://local"));
        assert_eq!(indexed.edges[0].target_app.as_deref(), Some("msgpack://remote"));
        assert_eq!(
            indexed.addresses.as_source(ChannelType::Cmd, "a")[0].app.as_deref(),
            Some("msgpack://remote")
        );
    }

    #[test]
    fn missing_source_is_an_error() {
        let records = vec![ConnectionRecord::new("ok"), ConnectionRecord::new("")];
        assert_eq!(
            index_connections(&records),
            Err(IndexError::MissingSource { index: 1 })
        );
    }

    #[test]
    fn unnamed_channel_is_an_error() {
        let record = ConnectionRecord::new("a")
            .with_channel(ChannelType::Cmd, ChannelEntry::new("ok").to("b"))
            .with_channel(ChannelType::VideoFrame, ChannelEntry::new("").to("b"));
        assert_eq!(
            index_connections(&[record]),
            Err(IndexError::MissingChannelName {
                source_node: "a".into(),
                channel_type: ChannelType::VideoFrame,
            })
        );
    }

    #[test]
    fn missing_destination_is_an_error() {
        let record = ConnectionRecord::new("a").with_channel(ChannelType::Data, ChannelEntry::new("d").to(""));
        assert!(matches!(
            index_connections(&[record]),
            Err(IndexError::MissingDestination { .. })
        ));
    }
}
