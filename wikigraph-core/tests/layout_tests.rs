// Tests for layout parameters and the view model

use std::time::{Duration, Instant};
use wikigraph_core::filter::{DepthFilter, FilterParams, filter_snapshot};
use wikigraph_core::graph::GraphSnapshot;
use wikigraph_core::layout::{ForceLayoutEngine, LayoutConfig};
use wikigraph_core::view::GraphViewModel;
use wikigraph_stream::{LinkEdge, PageNode};

fn snapshot(nodes: &[(&str, u32)], edges: &[(&str, &str)]) -> GraphSnapshot {
    GraphSnapshot::from_parts(
        nodes.iter().map(|(id, d)| PageNode::new(*id, *id, *d)).collect(),
        edges.iter().map(|(s, t)| LinkEdge::new(*s, *t)).collect(),
    )
}

// ============================================================================
// Layout Engine Tests
// ============================================================================

#[test]
fn test_collision_radius_scales_with_size() {
    let sub = filter_snapshot(
        &snapshot(&[("A", 0), ("B", 1), ("C", 4)], &[]),
        &FilterParams::default(),
    );
    let engine = ForceLayoutEngine::default();
    let params = engine.params_for(&sub);

    assert_eq!(params.collision_radii, vec![12.0, 9.0, 4.5]);
    assert!(params.charge_strength < 0.0);
    assert_eq!(params.link_distance, 30.0);
}

#[test]
fn test_params_wait_for_settle_delay() {
    let sub = filter_snapshot(&snapshot(&[("A", 0)], &[]), &FilterParams::default());
    let mut engine = ForceLayoutEngine::new(LayoutConfig::default());
    let t0 = Instant::now();

    assert!(engine.poll(t0, &sub).is_none());
    engine.subgraph_changed(t0);
    assert!(engine.poll(t0 + Duration::from_millis(299), &sub).is_none());
    assert!(engine.poll(t0 + Duration::from_millis(300), &sub).is_some());
    // applied once per change
    assert!(engine.poll(t0 + Duration::from_millis(900), &sub).is_none());
}

#[test]
fn test_burst_of_changes_applies_once() {
    let sub = filter_snapshot(&snapshot(&[("A", 0)], &[]), &FilterParams::default());
    let mut engine = ForceLayoutEngine::default();
    let t0 = Instant::now();

    engine.subgraph_changed(t0);
    engine.subgraph_changed(t0 + Duration::from_millis(200));
    assert!(engine.poll(t0 + Duration::from_millis(400), &sub).is_none());
    assert!(engine.poll(t0 + Duration::from_millis(500), &sub).is_some());
}

// ============================================================================
// View Model Tests
// ============================================================================

#[test]
fn test_view_refilters_on_snapshot() {
    let mut view = GraphViewModel::default();
    let t0 = Instant::now();

    view.set_snapshot(snapshot(&[("A", 0), ("B", 1)], &[("A", "B")]), t0);
    assert_eq!(view.subgraph().nodes.len(), 2);
    assert!(view.is_settling());
    assert!(view.poll_layout(t0 + Duration::from_secs(1)).is_some());
}

#[test]
fn test_view_same_subgraph_does_not_rearm() {
    let mut view = GraphViewModel::new(
        FilterParams::default().with_node_cap(1),
        LayoutConfig::default(),
    );
    let t0 = Instant::now();

    view.set_snapshot(snapshot(&[("A", 0)], &[]), t0);
    view.poll_layout(t0 + Duration::from_secs(1));

    // B is past the cap, the visible subgraph is unchanged
    view.set_snapshot(snapshot(&[("A", 0), ("B", 1)], &[]), t0 + Duration::from_secs(2));
    assert!(!view.is_settling());
}

#[test]
fn test_view_depth_filter_and_hover() {
    let mut view = GraphViewModel::default();
    let t0 = Instant::now();
    view.set_snapshot(
        snapshot(&[("A", 0), ("B", 1), ("C", 2)], &[("A", "B"), ("B", "C")]),
        t0,
    );

    view.hover_enter("B");
    assert_eq!(view.highlight().nodes.len(), 3);

    assert_eq!(view.cycle_depth_filter(t0), DepthFilter::Max(0));
    assert_eq!(view.subgraph().node_ids(), vec!["A"]);
    // B left the subgraph, so did the focus
    assert_eq!(view.hovered(), None);

    view.set_depth_filter(DepthFilter::Max(1), t0);
    assert_eq!(view.subgraph().node_ids(), vec!["A", "B"]);
}

#[test]
fn test_view_reset_clears_everything() {
    let mut view = GraphViewModel::default();
    let t0 = Instant::now();
    view.set_snapshot(snapshot(&[("A", 0)], &[]), t0);
    view.set_progress(1, 10);
    view.hover_enter("A");

    view.reset(t0);
    assert!(view.subgraph().is_empty());
    assert_eq!(view.progress(), (0, 0));
    assert_eq!(view.hovered(), None);
}

#[test]
fn test_view_node_cap_adjusts() {
    let mut view = GraphViewModel::default();
    let t0 = Instant::now();
    assert_eq!(view.adjust_node_cap(-1, t0), 125);
    assert_eq!(view.params().node_cap, 125);
}
