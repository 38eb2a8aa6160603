use crate::filter::FilteredSubgraph;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet};

/// Opacity of anything outside a non-empty highlight.
pub const DIMMED_OPACITY: f32 = 0.2;

/// Hover focus: node ids plus indices into [`FilteredSubgraph::edges`].
///
/// Empty means "no focus"; everything renders at full opacity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HighlightSet {
    pub nodes: HashSet<String>,
    pub edges: HashSet<usize>,
}

impl HighlightSet {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains(id)
    }

    pub fn contains_edge(&self, index: usize) -> bool {
        self.edges.contains(&index)
    }

    pub fn node_opacity(&self, id: &str) -> f32 {
        if self.is_empty() || self.contains_node(id) {
            1.0
        } else {
            DIMMED_OPACITY
        }
    }

    pub fn edge_opacity(&self, index: usize) -> f32 {
        if self.is_empty() || self.contains_edge(index) {
            1.0
        } else {
            DIMMED_OPACITY
        }
    }
}

/// Undirected neighbor index over a filtered subgraph.
///
/// Edge weights are positions in the subgraph's edge list, so parallel edges
/// stay distinct and highlight lookups never rescan the edge list.
#[derive(Debug, Clone, Default)]
pub struct AdjacencyIndex {
    graph: UnGraph<String, usize>,
    lookup: HashMap<String, NodeIndex>,
    hovered: Option<String>,
    highlight: HighlightSet,
}

impl AdjacencyIndex {
    pub fn build(subgraph: &FilteredSubgraph) -> Self {
        let mut graph = UnGraph::with_capacity(subgraph.nodes.len(), subgraph.edges.len());
        let mut lookup = HashMap::with_capacity(subgraph.nodes.len());

        for node in &subgraph.nodes {
            lookup
                .entry(node.id.clone())
                .or_insert_with(|| graph.add_node(node.id.clone()));
        }

        for (index, edge) in subgraph.edges.iter().enumerate() {
            if let (Some(&a), Some(&b)) = (lookup.get(&edge.source), lookup.get(&edge.target)) {
                graph.add_edge(a, b, index);
            }
        }

        Self {
            graph,
            lookup,
            hovered: None,
            highlight: HighlightSet::default(),
        }
    }

    /// Replace the index, keeping focus on the hovered node if it survived.
    pub fn rebuild(&mut self, subgraph: &FilteredSubgraph) {
        let hovered = self.hovered.take();
        *self = Self::build(subgraph);
        if let Some(id) = hovered {
            self.hover_enter(&id);
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn neighbors(&self, id: &str) -> HashSet<&str> {
        match self.lookup.get(id) {
            Some(&ix) => self
                .graph
                .neighbors(ix)
                .map(|n| self.graph[n].as_str())
                .collect(),
            None => HashSet::new(),
        }
    }

    pub fn incident_edges(&self, id: &str) -> HashSet<usize> {
        match self.lookup.get(id) {
            Some(&ix) => self.graph.edges(ix).map(|e| *e.weight()).collect(),
            None => HashSet::new(),
        }
    }

    pub fn hover_enter(&mut self, id: &str) -> &HighlightSet {
        if self.lookup.contains_key(id) {
            let mut nodes: HashSet<String> =
                self.neighbors(id).into_iter().map(str::to_string).collect();
            nodes.insert(id.to_string());
            self.highlight = HighlightSet {
                nodes,
                edges: self.incident_edges(id),
            };
            self.hovered = Some(id.to_string());
        } else {
            self.hover_exit();
        }
        &self.highlight
    }

    pub fn hover_exit(&mut self) {
        self.hovered = None;
        self.highlight = HighlightSet::default();
    }

    pub fn hovered(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    pub fn highlight(&self) -> &HighlightSet {
        &self.highlight
    }
}
