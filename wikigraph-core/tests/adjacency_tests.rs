// Tests for hover adjacency and highlighting

use std::collections::HashSet;
use wikigraph_core::adjacency::{AdjacencyIndex, DIMMED_OPACITY};
use wikigraph_core::filter::{FilterParams, FilteredSubgraph, filter_snapshot};
use wikigraph_core::graph::GraphSnapshot;
use wikigraph_stream::{LinkEdge, PageNode};

fn subgraph(ids: &[&str], edges: &[(&str, &str)], cap: usize) -> FilteredSubgraph {
    let snapshot = GraphSnapshot::from_parts(
        ids.iter().map(|id| PageNode::new(*id, *id, 1)).collect(),
        edges.iter().map(|(s, t)| LinkEdge::new(*s, *t)).collect(),
    );
    filter_snapshot(&snapshot, &FilterParams::default().with_node_cap(cap))
}

fn set(ids: &[&str]) -> HashSet<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

// ============================================================================
// Hover Tests
// ============================================================================

#[test]
fn test_hover_highlights_node_and_neighbors() {
    let sub = subgraph(&["A", "B", "C", "D"], &[("A", "B"), ("C", "A"), ("C", "D")], 10);
    let mut index = AdjacencyIndex::build(&sub);

    let highlight = index.hover_enter("A").clone();
    assert_eq!(highlight.nodes, set(&["A", "B", "C"]));
    assert_eq!(highlight.edges, [0usize, 1].into_iter().collect::<HashSet<_>>());
    for &edge in &highlight.edges {
        let e = &sub.edges[edge];
        assert!(e.source == "A" || e.target == "A");
    }
}

#[test]
fn test_hover_ignores_direction() {
    let sub = subgraph(&["A", "B"], &[("B", "A")], 10);
    let mut index = AdjacencyIndex::build(&sub);
    assert_eq!(index.hover_enter("A").nodes, set(&["A", "B"]));
    assert_eq!(index.hover_enter("B").nodes, set(&["A", "B"]));
}

#[test]
fn test_hover_exit_clears() {
    let sub = subgraph(&["A", "B"], &[("A", "B")], 10);
    let mut index = AdjacencyIndex::build(&sub);
    index.hover_enter("A");
    index.hover_exit();

    assert!(index.highlight().is_empty());
    assert_eq!(index.hovered(), None);
    assert_eq!(index.highlight().node_opacity("B"), 1.0);
}

#[test]
fn test_hover_unknown_node_is_empty() {
    let sub = subgraph(&["A", "B"], &[("A", "B")], 10);
    let mut index = AdjacencyIndex::build(&sub);
    index.hover_enter("A");
    assert!(index.hover_enter("Missing").is_empty());
    assert_eq!(index.hovered(), None);
}

#[test]
fn test_filtered_out_edges_not_indexed() {
    // C is beyond the cap, so A-C never enters the index
    let sub = subgraph(&["A", "B", "C"], &[("A", "B"), ("A", "C")], 2);
    let index = AdjacencyIndex::build(&sub);
    assert_eq!(index.neighbors("A"), ["B"].into_iter().collect::<HashSet<_>>());
    assert_eq!(index.node_count(), 2);
}

#[test]
fn test_parallel_edges_stay_distinct() {
    let sub = subgraph(&["A", "B"], &[("A", "B"), ("B", "A")], 10);
    let index = AdjacencyIndex::build(&sub);
    assert_eq!(index.incident_edges("A").len(), 2);
    assert_eq!(index.neighbors("A").len(), 1);
}

// ============================================================================
// Rebuild Tests
// ============================================================================

#[test]
fn test_rebuild_keeps_surviving_focus() {
    let before = subgraph(&["A", "B", "C"], &[("A", "B")], 10);
    let mut index = AdjacencyIndex::build(&before);
    index.hover_enter("A");

    let after = subgraph(&["A", "B", "C"], &[("A", "B"), ("A", "C")], 10);
    index.rebuild(&after);

    assert_eq!(index.hovered(), Some("A"));
    assert_eq!(index.highlight().nodes, set(&["A", "B", "C"]));
}

#[test]
fn test_rebuild_drops_vanished_focus() {
    let before = subgraph(&["A", "B", "C"], &[("A", "C")], 10);
    let mut index = AdjacencyIndex::build(&before);
    index.hover_enter("C");

    let after = subgraph(&["A", "B", "C"], &[("A", "C")], 2);
    index.rebuild(&after);

    assert_eq!(index.hovered(), None);
    assert!(index.highlight().is_empty());
}

// ============================================================================
// Opacity Tests
// ============================================================================

#[test]
fn test_opacity_dims_outside_focus() {
    let sub = subgraph(&["A", "B", "C"], &[("A", "B"), ("B", "C")], 10);
    let mut index = AdjacencyIndex::build(&sub);
    let highlight = index.hover_enter("A");

    assert_eq!(highlight.node_opacity("A"), 1.0);
    assert_eq!(highlight.node_opacity("B"), 1.0);
    assert_eq!(highlight.node_opacity("C"), DIMMED_OPACITY);
    assert_eq!(highlight.edge_opacity(0), 1.0);
    assert_eq!(highlight.edge_opacity(1), DIMMED_OPACITY);
}
