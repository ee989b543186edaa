//! Builds graph nodes from backend records and attaches adjacency and addon
//! metadata.

use std::collections::{HashMap, HashSet};

use crate::error::{MaterializeError, RegistryError};
use crate::index::EdgeAddressMap;
use crate::model::{AddonInfo, ChannelType, GraphNode, NodeRecord};

/// Lookup key sent to the addon registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddonQuery {
    pub base_dir: Option<String>,
    pub addon_name: String,
}

/// Resolves addon names to their metadata.
#[allow(async_fn_in_trait)]
pub trait AddonRegistry {
    async fn resolve_addons(&self, query: &AddonQuery) -> Result<Vec<AddonInfo>, RegistryError>;
}

/// Build nodes in record order with their channel sets filled in, then
/// resolve each distinct addon once and attach it to every node using it.
pub async fn materialize_nodes<R: AddonRegistry>(
    records: &[NodeRecord],
    addresses: &EdgeAddressMap,
    base_dir: Option<&str>,
    registry: &R,
) -> Result<Vec<GraphNode>, MaterializeError> {
    let mut nodes = build_stubs(records)?;
    attach_channels(&mut nodes, addresses);
    attach_addons(&mut nodes, base_dir, registry).await;
    Ok(nodes)
}

pub fn build_stubs(records: &[NodeRecord]) -> Result<Vec<GraphNode>, MaterializeError> {
    let mut seen = HashSet::new();
    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            if record.name.is_empty() {
                return Err(MaterializeError::MissingName { index });
            }
            if record.addon.is_empty() {
                return Err(MaterializeError::MissingAddon {
                    name: record.name.clone(),
                });
            }
            if !seen.insert(record.name.as_str()) {
                return Err(MaterializeError::DuplicateNode {
                    name: record.name.clone(),
                });
            }
            Ok(GraphNode::from_record(record))
        })
        .collect()
}

pub fn attach_channels(nodes: &mut [GraphNode], addresses: &EdgeAddressMap) {
    for node in nodes.iter_mut() {
        for channel_type in ChannelType::ALL {
            *node.channels.get_mut(channel_type) = addresses.channel_set(channel_type, &node.id);
        }
    }
}

async fn attach_addons<R: AddonRegistry>(nodes: &mut [GraphNode], base_dir: Option<&str>, registry: &R) {
    // First-seen order keeps registry calls deterministic.
    let mut distinct: Vec<&str> = Vec::new();
    let mut seen = HashSet::new();
    for node in nodes.iter() {
        if seen.insert(node.addon.as_str()) {
            distinct.push(node.addon.as_str());
        }
    }

    let mut resolved: HashMap<String, AddonInfo> = HashMap::new();
    for addon_name in distinct {
        let query = AddonQuery {
            base_dir: base_dir.map(str::to_string),
            addon_name: addon_name.to_string(),
        };
        match registry.resolve_addons(&query).await {
            Ok(infos) => {
                match infos.into_iter().find(|info| info.name == addon_name) {
                    Some(info) => {
                        resolved.insert(addon_name.to_string(), info);
                    }
                    None => tracing::warn!(addon = addon_name, "addon registry returned no match"),
                }
            }
            Err(err) => tracing::warn!(addon = addon_name, "failed to resolve addon: {err}"),
        }
    }

    for node in nodes.iter_mut() {
        node.addon_info = resolved.get(&node.addon).cloned();
    }
}
