use iced::{Point, Rectangle, Size, Vector};
use std::collections::{HashMap, HashSet, VecDeque};

use crate::config::LayoutConfig;
use crate::error::LayoutError;
use crate::model::{GraphEdge, GraphNode, source_handle, target_handle};

/// Laid out graph, ready for the renderer.
#[derive(Debug, Clone)]
pub struct LayoutResult {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    /// Smallest rectangle holding every node box.
    pub bounds: Rectangle,
}

/// Auto-layout: ranks flow top to bottom, mutually connected pairs are
/// pulled into side-by-side columns.
///
/// Deterministic for a given node and edge order.
pub fn auto_layout(
    mut nodes: Vec<GraphNode>,
    mut edges: Vec<GraphEdge>,
    config: &LayoutConfig,
) -> Result<LayoutResult, LayoutError> {
    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (node.id.as_str(), i))
        .collect();

    let mut links: Vec<(usize, usize)> = Vec::with_capacity(edges.len());
    for edge in &edges {
        let lookup = |node: &str| {
            index.get(node).copied().ok_or_else(|| LayoutError::UnknownNode {
                edge: edge.id.clone(),
                node: node.to_string(),
            })
        };
        links.push((lookup(&edge.source)?, lookup(&edge.target)?));
    }

    let acyclic = break_cycles(nodes.len(), &links);
    let ranks = assign_ranks(nodes.len(), &acyclic);
    let lefts = place_in_ranks(&ranks, &acyclic, config);

    let half = Vector::new(config.node_width / 2.0, config.node_height / 2.0);
    let mut centers: Vec<Point> = ranks
        .iter()
        .zip(&lefts)
        .map(|(&rank, &left)| {
            Point::new(
                left + half.x,
                config.margin + rank as f32 * (config.node_height + config.rank_sep) + half.y,
            )
        })
        .collect();

    apply_pair_slots(&mut centers, &links, config.node_width);

    for (node, center) in nodes.iter_mut().zip(&centers) {
        node.position = (*center - half).into();
    }

    for edge in edges.iter_mut() {
        edge.source_handle = Some(source_handle(&edge.source, edge.channel_type));
        edge.target_handle = Some(target_handle(&edge.target, edge.channel_type));
    }

    let bounds = bounding_box(&nodes, config.node_size());
    tracing::debug!(
        nodes = nodes.len(),
        edges = edges.len(),
        ranks = ranks.iter().max().map_or(0, |r| r + 1),
        "layout complete"
    );

    Ok(LayoutResult { nodes, edges, bounds })
}

/// Drop self loops and reverse every edge that closes a cycle, walking
/// depth-first from each node in input order.
fn break_cycles(node_count: usize, links: &[(usize, usize)]) -> Vec<(usize, usize)> {
    let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); node_count];
    for (i, &(from, to)) in links.iter().enumerate() {
        if from != to {
            outgoing[from].push(i);
        }
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        OnStack,
        Done,
    }

    let mut marks = vec![Mark::Unvisited; node_count];
    let mut reversed: HashSet<usize> = HashSet::new();

    for root in 0..node_count {
        if marks[root] != Mark::Unvisited {
            continue;
        }
        // (node, next outgoing position)
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        marks[root] = Mark::OnStack;

        while let Some(top) = stack.last_mut() {
            let node = top.0;
            if let Some(&link) = outgoing[node].get(top.1) {
                top.1 += 1;
                let target = links[link].1;
                match marks[target] {
                    Mark::OnStack => {
                        reversed.insert(link);
                    }
                    Mark::Unvisited => {
                        marks[target] = Mark::OnStack;
                        stack.push((target, 0));
                    }
                    Mark::Done => {}
                }
            } else {
                marks[node] = Mark::Done;
                stack.pop();
            }
        }
    }

    links
        .iter()
        .enumerate()
        .filter(|(_, (from, to))| from != to)
        .map(|(i, &(from, to))| if reversed.contains(&i) { (to, from) } else { (from, to) })
        .collect()
}

/// Longest path from the sources; unconnected nodes sit in rank 0.
fn assign_ranks(node_count: usize, acyclic: &[(usize, usize)]) -> Vec<usize> {
    let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); node_count];
    let mut in_degree = vec![0usize; node_count];
    for &(from, to) in acyclic {
        outgoing[from].push(to);
        in_degree[to] += 1;
    }

    let mut ranks = vec![0usize; node_count];
    let mut queue: VecDeque<usize> = (0..node_count).filter(|&n| in_degree[n] == 0).collect();

    while let Some(node) = queue.pop_front() {
        for &target in &outgoing[node] {
            ranks[target] = ranks[target].max(ranks[node] + 1);
            in_degree[target] -= 1;
            if in_degree[target] == 0 {
                queue.push_back(target);
            }
        }
    }

    ranks
}

/// Left x of every node. Each rank is filled in order of the average x of
/// the node's parents, then rank 0 is pulled under its children.
fn place_in_ranks(ranks: &[usize], acyclic: &[(usize, usize)], config: &LayoutConfig) -> Vec<f32> {
    let mut parents: Vec<Vec<usize>> = vec![Vec::new(); ranks.len()];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); ranks.len()];
    for &(from, to) in acyclic {
        parents[to].push(from);
        children[from].push(to);
    }

    let column = config.node_width + config.node_sep;
    let max_rank = ranks.iter().copied().max().unwrap_or(0);
    let mut lefts: Vec<Option<f32>> = vec![None; ranks.len()];

    for rank in 0..=max_rank {
        let members: Vec<usize> = (0..ranks.len()).filter(|&n| ranks[n] == rank).collect();
        let mut fallback = 0usize;
        let mut desired: Vec<(usize, f32)> = members
            .iter()
            .map(|&n| {
                let placed: Vec<f32> = parents[n].iter().filter_map(|&p| lefts[p]).collect();
                let x = if placed.is_empty() {
                    let x = config.margin + fallback as f32 * column;
                    fallback += 1;
                    x
                } else {
                    placed.iter().sum::<f32>() / placed.len() as f32
                };
                (n, x)
            })
            .collect();

        desired.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut slots: Vec<(f32, f32)> = Vec::new();
        for (n, want) in desired {
            let x = find_free_x(want, config.node_width, &slots, config.node_sep, config.margin);
            lefts[n] = Some(x);
            slots.push((x, config.node_width));
        }
    }

    // Second pass over rank 0, now that everything below it is placed.
    let roots: Vec<usize> = (0..ranks.len()).filter(|&n| ranks[n] == 0).collect();
    let mut fallback = 0usize;
    let mut desired: Vec<(usize, f32)> = roots
        .iter()
        .map(|&n| {
            let below: Vec<f32> = children[n].iter().filter_map(|&c| lefts[c]).collect();
            let x = if below.is_empty() {
                let x = config.margin + fallback as f32 * column;
                fallback += 1;
                x
            } else {
                below.iter().sum::<f32>() / below.len() as f32
            };
            (n, x)
        })
        .collect();
    desired.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut slots: Vec<(f32, f32)> = Vec::new();
    for (n, want) in desired {
        let x = find_free_x(want, config.node_width, &slots, config.node_sep, config.margin);
        lefts[n] = Some(x);
        slots.push((x, config.node_width));
    }

    lefts.into_iter().map(|x| x.unwrap_or(config.margin)).collect()
}

/// Closest x to `desired` whose box keeps `gap` clear of every slot.
fn find_free_x(desired: f32, width: f32, slots: &[(f32, f32)], gap: f32, min_x: f32) -> f32 {
    let desired = desired.max(min_x);
    if slots.is_empty() {
        return desired;
    }

    let overlaps = |x: f32| -> bool {
        slots
            .iter()
            .any(|&(slot_x, slot_w)| x < slot_x + slot_w + gap && x + width + gap > slot_x)
    };

    if !overlaps(desired) {
        return desired;
    }

    let search_step = (gap / 2.0).max(5.0);
    for offset in 1..500 {
        let step = search_step * offset as f32;

        let try_right = desired + step;
        if !overlaps(try_right) {
            return try_right;
        }

        let try_left = desired - step;
        if try_left >= min_x && !overlaps(try_left) {
            return try_left;
        }
    }

    slots
        .iter()
        .map(|&(x, w)| x + w + gap)
        .fold(min_x, f32::max)
}

/// Give every A<->B pair two columns, `2 * width` apart, to the right of
/// all unpaired nodes. Pairs are taken in edge order and a node joins at
/// most one pair: once A is paired with B, a later A<->C gets no columns
/// and C keeps its rank position.
fn apply_pair_slots(centers: &mut [Point], links: &[(usize, usize)], width: f32) {
    let present: HashSet<(usize, usize)> = links.iter().copied().collect();

    let mut pairs: Vec<(usize, usize)> = Vec::new();
    let mut paired: HashSet<usize> = HashSet::new();
    for &(a, b) in links {
        if a == b || paired.contains(&a) || paired.contains(&b) {
            continue;
        }
        if present.contains(&(b, a)) {
            pairs.push((a, b));
            paired.insert(a);
            paired.insert(b);
        }
    }

    if pairs.is_empty() {
        return;
    }

    let mut next_column = centers
        .iter()
        .enumerate()
        .filter(|(i, _)| !paired.contains(i))
        .map(|(_, c)| c.x)
        .reduce(f32::max)
        .map_or(width / 2.0, |max_x| max_x + 2.0 * width);

    for (a, b) in pairs {
        centers[a].x = next_column;
        centers[b].x = next_column + 2.0 * width;
        next_column += 4.0 * width;
    }
}

fn bounding_box(nodes: &[GraphNode], size: Size) -> Rectangle {
    let Some(first) = nodes.first() else {
        return Rectangle::new(Point::ORIGIN, Size::ZERO);
    };

    let (mut min_x, mut min_y) = (first.position.x, first.position.y);
    let (mut max_x, mut max_y) = (min_x + size.width, min_y + size.height);
    for node in &nodes[1..] {
        min_x = min_x.min(node.position.x);
        min_y = min_y.min(node.position.y);
        max_x = max_x.max(node.position.x + size.width);
        max_y = max_y.max(node.position.y + size.height);
    }

    Rectangle::new(
        Point::new(min_x, min_y),
        Size::new(max_x - min_x, max_y - min_y),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChannelType, NodeRecord, edge_id};

    fn nodes(names: &[&str]) -> Vec<GraphNode> {
        names
            .iter()
            .map(|name| GraphNode::from_record(&NodeRecord::new(*name, "addon")))
            .collect()
    }

    fn edge(source: &str, target: &str, channel_type: ChannelType) -> GraphEdge {
        GraphEdge {
            id: edge_id(source, "ch", target),
            source: source.into(),
            target: target.into(),
            source_app: None,
            target_app: None,
            channel_type,
            channel_name: "ch".into(),
            source_handle: None,
            target_handle: None,
        }
    }

    fn position_of(result: &LayoutResult, id: &str) -> Point {
        result.nodes.iter().find(|n| n.id == id).unwrap().position.into()
    }

    fn assert_no_overlap(result: &LayoutResult, config: &LayoutConfig) {
        let boxes: Vec<Rectangle> = result
            .nodes
            .iter()
            .map(|n| Rectangle::new(n.position.into(), config.node_size()))
            .collect();
        for (i, a) in boxes.iter().enumerate() {
            for b in &boxes[i + 1..] {
                assert!(!a.intersects(b), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn bidirectional_pair_gets_adjacent_columns() {
        let config = LayoutConfig::default();
        let edges = vec![
            edge("a", "b", ChannelType::Cmd),
            edge("b", "a", ChannelType::Cmd),
            edge("a", "c", ChannelType::Data),
        ];
        let result = auto_layout(nodes(&["a", "b", "c"]), edges, &config).unwrap();

        let (a, b, c) = (
            position_of(&result, "a"),
            position_of(&result, "b"),
            position_of(&result, "c"),
        );
        assert_eq!(b.x - a.x, 2.0 * config.node_width);
        assert_ne!(a.x, c.x);
        assert_ne!(b.x, c.x);
        assert_no_overlap(&result, &config);
    }

    #[test]
    fn node_in_two_pairs_joins_only_the_first() {
        let config = LayoutConfig::default();
        let edges = vec![
            edge("a", "b", ChannelType::Cmd),
            edge("b", "a", ChannelType::Cmd),
            edge("a", "c", ChannelType::Data),
            edge("c", "a", ChannelType::Data),
        ];
        let result = auto_layout(nodes(&["a", "b", "c"]), edges, &config).unwrap();

        let (a, b, c) = (
            position_of(&result, "a"),
            position_of(&result, "b"),
            position_of(&result, "c"),
        );
        assert_eq!(b.x - a.x, 2.0 * config.node_width);
        // c stays in its rank, left of the pair columns.
        assert!(c.x < a.x);
        assert_no_overlap(&result, &config);
    }

    #[test]
    fn pairs_do_not_share_columns() {
        let config = LayoutConfig::default();
        let edges = vec![
            edge("a", "b", ChannelType::Cmd),
            edge("b", "a", ChannelType::Cmd),
            edge("c", "d", ChannelType::Cmd),
            edge("d", "c", ChannelType::Cmd),
        ];
        let result = auto_layout(nodes(&["a", "b", "c", "d"]), edges, &config).unwrap();

        let xs: Vec<f32> = ["a", "b", "c", "d"].iter().map(|id| position_of(&result, id).x).collect();
        let distinct: HashSet<u32> = xs.iter().map(|x| x.to_bits()).collect();
        assert_eq!(distinct.len(), 4);
        assert_eq!(xs[1] - xs[0], 2.0 * config.node_width);
        assert_eq!(xs[3] - xs[2], 2.0 * config.node_width);
        assert_no_overlap(&result, &config);
    }

    #[test]
    fn chain_flows_top_to_bottom() {
        let config = LayoutConfig::default();
        let edges = vec![edge("a", "b", ChannelType::Data), edge("b", "c", ChannelType::Data)];
        let result = auto_layout(nodes(&["c", "b", "a"]), edges, &config).unwrap();

        let (a, b, c) = (
            position_of(&result, "a"),
            position_of(&result, "b"),
            position_of(&result, "c"),
        );
        assert!(a.y < b.y && b.y < c.y);
        assert_eq!(b.y - a.y, config.node_height + config.rank_sep);
    }

    #[test]
    fn positions_are_top_left_corners() {
        let config = LayoutConfig::default();
        let result = auto_layout(nodes(&["solo"]), Vec::new(), &config).unwrap();
        assert_eq!(position_of(&result, "solo"), Point::new(config.margin, config.margin));
        assert_eq!(result.bounds.width, config.node_width);
        assert_eq!(result.bounds.height, config.node_height);
    }

    #[test]
    fn same_input_gives_same_layout() {
        let config = LayoutConfig::default();
        let names = ["a", "b", "c", "d", "e", "f"];
        let edges = || {
            vec![
                edge("a", "b", ChannelType::Cmd),
                edge("a", "c", ChannelType::Data),
                edge("c", "d", ChannelType::AudioFrame),
                edge("d", "c", ChannelType::Cmd),
                edge("b", "e", ChannelType::VideoFrame),
                edge("e", "a", ChannelType::Cmd),
            ]
        };
        let first = auto_layout(nodes(&names), edges(), &config).unwrap();
        let second = auto_layout(nodes(&names), edges(), &config).unwrap();
        assert_eq!(first.nodes, second.nodes);
        assert_eq!(first.edges, second.edges);
        assert_no_overlap(&first, &config);
    }

    #[test]
    fn wide_fan_out_does_not_overlap() {
        let config = LayoutConfig::default();
        let names = ["hub", "t1", "t2", "t3", "t4", "t5", "lone"];
        let edges = names[1..6]
            .iter()
            .map(|t| edge("hub", t, ChannelType::Data))
            .collect();
        let result = auto_layout(nodes(&names), edges, &config).unwrap();
        assert_no_overlap(&result, &config);
    }

    #[test]
    fn handles_are_namespaced_per_channel_type() {
        let config = LayoutConfig::default();
        let edges = vec![edge("a", "b", ChannelType::Cmd), edge("a", "b", ChannelType::Data)];
        let result = auto_layout(nodes(&["a", "b"]), edges, &config).unwrap();

        assert_eq!(result.edges[0].source_handle.as_deref(), Some("source-a-cmd"));
        assert_eq!(result.edges[0].target_handle.as_deref(), Some("target-b-cmd"));
        assert_eq!(result.edges[1].source_handle.as_deref(), Some("source-a-data"));
        assert_eq!(result.edges[1].target_handle.as_deref(), Some("target-b-data"));
    }

    #[test]
    fn edge_to_unknown_node_is_an_error() {
        let config = LayoutConfig::default();
        let err = auto_layout(nodes(&["a"]), vec![edge("a", "ghost", ChannelType::Cmd)], &config).unwrap_err();
        assert_eq!(
            err,
            LayoutError::UnknownNode {
                edge: "edge-a-ch-ghost".into(),
                node: "ghost".into(),
            }
        );
    }

    #[test]
    fn self_loop_is_ignored_for_ranking() {
        let config = LayoutConfig::default();
        let result = auto_layout(nodes(&["a"]), vec![edge("a", "a", ChannelType::Cmd)], &config).unwrap();
        assert_eq!(position_of(&result, "a"), Point::new(config.margin, config.margin));
    }

    #[test]
    fn free_slot_search_skips_occupied_space() {
        let slots = [(50.0, 180.0)];
        let x = find_free_x(50.0, 180.0, &slots, 180.0, 50.0);
        assert!(x >= 50.0 + 180.0 + 180.0);
    }
}
