use crate::graph::GraphSnapshot;
use std::collections::{HashMap, HashSet};
use std::fmt;
use wikigraph_stream::LinkEdge;

pub const DEFAULT_NODE_CAP: usize = 150;
pub const NODE_CAP_STEP: usize = 25;
pub const MIN_NODE_CAP: usize = 25;
pub const MAX_NODE_CAP: usize = 1000;

/// Deepest value the depth filter cycles through.
pub const MAX_DEPTH_FILTER: u32 = 3;

/// Optional cap on node depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepthFilter {
    #[default]
    All,
    Max(u32),
}

impl DepthFilter {
    pub fn admits(&self, depth: u32) -> bool {
        match self {
            DepthFilter::All => true,
            DepthFilter::Max(max) => depth <= *max,
        }
    }

    /// All -> 0 -> 1 -> 2 -> 3 -> All
    pub fn cycle(self) -> Self {
        match self {
            DepthFilter::All => DepthFilter::Max(0),
            DepthFilter::Max(d) if d >= MAX_DEPTH_FILTER => DepthFilter::All,
            DepthFilter::Max(d) => DepthFilter::Max(d + 1),
        }
    }
}

impl fmt::Display for DepthFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepthFilter::All => write!(f, "all"),
            DepthFilter::Max(d) => write!(f, "<= {}", d),
        }
    }
}

/// 24-bit color, kept free of any terminal library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Blend toward black; `opacity` 1.0 keeps the color as-is.
    pub fn with_opacity(self, opacity: f32) -> Self {
        let factor = opacity.clamp(0.0, 1.0);
        let scale = |c: u8| (c as f32 * factor).round() as u8;
        Rgb(scale(self.0), scale(self.1), scale(self.2))
    }

    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// Color for a BFS depth, bucketed as 0, 1, 2, 3+.
pub fn depth_color(depth: u32) -> Rgb {
    match depth {
        0 => Rgb(0xff, 0x44, 0x44),
        1 => Rgb(0x44, 0x44, 0xff),
        2 => Rgb(0x44, 0xff, 0x44),
        _ => Rgb(0xff, 0xaa, 0x44),
    }
}

/// Node sizing: `base - depth * step`, never below `min`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderStyle {
    pub base_size: f64,
    pub step: f64,
    pub min_size: f64,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            base_size: 8.0,
            step: 2.0,
            min_size: 3.0,
        }
    }
}

impl RenderStyle {
    pub fn size_for(&self, depth: u32) -> f64 {
        (self.base_size - depth as f64 * self.step).max(self.min_size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterParams {
    pub depth: DepthFilter,
    pub node_cap: usize,
    pub style: RenderStyle,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            depth: DepthFilter::All,
            node_cap: DEFAULT_NODE_CAP,
            style: RenderStyle::default(),
        }
    }
}

impl FilterParams {
    pub fn with_node_cap(mut self, node_cap: usize) -> Self {
        self.node_cap = node_cap;
        self
    }

    pub fn with_depth(mut self, depth: DepthFilter) -> Self {
        self.depth = depth;
        self
    }

    /// Move the cap by `steps` increments of [`NODE_CAP_STEP`], clamped.
    pub fn adjust_node_cap(&mut self, steps: i64) {
        let next = self.node_cap as i64 + steps * NODE_CAP_STEP as i64;
        self.node_cap = next.clamp(MIN_NODE_CAP as i64, MAX_NODE_CAP as i64) as usize;
    }
}

/// A node ready to paint.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderNode {
    pub id: String,
    pub label: String,
    pub depth: u32,
    pub color: Rgb,
    pub val: f64,
}

/// Bounded subgraph derived from a snapshot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilteredSubgraph {
    pub nodes: Vec<RenderNode>,
    pub edges: Vec<LinkEdge>,
    positions: HashMap<String, usize>,
}

impl FilteredSubgraph {
    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn node(&self, id: &str) -> Option<&RenderNode> {
        self.position(id).map(|i| &self.nodes[i])
    }

    pub fn node_ids(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Derive the renderable subgraph. Pure: same inputs, same output.
///
/// Nodes keep arrival order (a proxy for BFS proximity to the root) and are
/// never re-sorted. A repeated id keeps its first occurrence.
pub fn filter_snapshot(snapshot: &GraphSnapshot, params: &FilterParams) -> FilteredSubgraph {
    let mut nodes = Vec::new();
    let mut positions = HashMap::new();

    for node in snapshot.nodes().iter() {
        if nodes.len() >= params.node_cap {
            break;
        }
        if !params.depth.admits(node.depth) || positions.contains_key(&node.id) {
            continue;
        }
        positions.insert(node.id.clone(), nodes.len());
        nodes.push(RenderNode {
            id: node.id.clone(),
            label: node.display_label(),
            depth: node.depth,
            color: depth_color(node.depth),
            val: params.style.size_for(node.depth),
        });
    }

    let members: HashSet<&str> = positions.keys().map(String::as_str).collect();
    let edges = snapshot
        .edges()
        .iter()
        .filter(|edge| {
            !edge.is_self_loop()
                && members.contains(edge.source.as_str())
                && members.contains(edge.target.as_str())
        })
        .cloned()
        .collect();

    FilteredSubgraph {
        nodes,
        edges,
        positions,
    }
}
