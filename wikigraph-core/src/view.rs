use crate::adjacency::{AdjacencyIndex, HighlightSet};
use crate::filter::{DepthFilter, FilterParams, FilteredSubgraph, filter_snapshot};
use crate::graph::GraphSnapshot;
use crate::layout::{ForceLayoutEngine, LayoutConfig, LayoutParams};
use std::time::Instant;
use tracing::debug;

/// Everything a renderer needs, derived from the latest snapshot.
///
/// The subgraph, adjacency index and layout timer are recomputed together
/// whenever the snapshot or the filter changes, so they always agree.
#[derive(Debug, Clone)]
pub struct GraphViewModel {
    snapshot: GraphSnapshot,
    params: FilterParams,
    subgraph: FilteredSubgraph,
    adjacency: AdjacencyIndex,
    layout: ForceLayoutEngine,
    progress: usize,
    total: usize,
}

impl GraphViewModel {
    pub fn new(params: FilterParams, layout: LayoutConfig) -> Self {
        Self {
            snapshot: GraphSnapshot::default(),
            params,
            subgraph: FilteredSubgraph::default(),
            adjacency: AdjacencyIndex::default(),
            layout: ForceLayoutEngine::new(layout),
            progress: 0,
            total: 0,
        }
    }

    pub fn snapshot(&self) -> &GraphSnapshot {
        &self.snapshot
    }

    pub fn params(&self) -> &FilterParams {
        &self.params
    }

    pub fn subgraph(&self) -> &FilteredSubgraph {
        &self.subgraph
    }

    pub fn adjacency(&self) -> &AdjacencyIndex {
        &self.adjacency
    }

    pub fn highlight(&self) -> &HighlightSet {
        self.adjacency.highlight()
    }

    pub fn hovered(&self) -> Option<&str> {
        self.adjacency.hovered()
    }

    pub fn progress(&self) -> (usize, usize) {
        (self.progress, self.total)
    }

    pub fn is_settling(&self) -> bool {
        self.layout.is_settling()
    }

    /// Drop everything from a previous session.
    pub fn reset(&mut self, now: Instant) {
        self.progress = 0;
        self.total = 0;
        self.adjacency.hover_exit();
        self.set_snapshot(GraphSnapshot::default(), now);
    }

    pub fn set_progress(&mut self, progress: usize, total: usize) {
        self.progress = progress;
        self.total = total;
    }

    pub fn set_snapshot(&mut self, snapshot: GraphSnapshot, now: Instant) {
        self.snapshot = snapshot;
        self.refilter(now);
    }

    pub fn set_depth_filter(&mut self, depth: DepthFilter, now: Instant) {
        if self.params.depth != depth {
            self.params.depth = depth;
            self.refilter(now);
        }
    }

    pub fn cycle_depth_filter(&mut self, now: Instant) -> DepthFilter {
        let next = self.params.depth.cycle();
        self.set_depth_filter(next, now);
        next
    }

    pub fn adjust_node_cap(&mut self, steps: i64, now: Instant) -> usize {
        let before = self.params.node_cap;
        self.params.adjust_node_cap(steps);
        if self.params.node_cap != before {
            self.refilter(now);
        }
        self.params.node_cap
    }

    pub fn hover_enter(&mut self, id: &str) -> &HighlightSet {
        self.adjacency.hover_enter(id)
    }

    pub fn hover_exit(&mut self) {
        self.adjacency.hover_exit();
    }

    /// Layout parameters, once the subgraph has been stable long enough.
    pub fn poll_layout(&mut self, now: Instant) -> Option<LayoutParams> {
        self.layout.poll(now, &self.subgraph)
    }

    fn refilter(&mut self, now: Instant) {
        let subgraph = filter_snapshot(&self.snapshot, &self.params);
        if subgraph == self.subgraph {
            return;
        }
        debug!(
            "Subgraph now {} nodes, {} edges (of {} / {})",
            subgraph.nodes.len(),
            subgraph.edges.len(),
            self.snapshot.node_count(),
            self.snapshot.edge_count()
        );
        self.subgraph = subgraph;
        self.adjacency.rebuild(&self.subgraph);
        self.layout.subgraph_changed(now);
    }
}

impl Default for GraphViewModel {
    fn default() -> Self {
        Self::new(FilterParams::default(), LayoutConfig::default())
    }
}
