use crate::filter::FilteredSubgraph;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutConfig {
    /// Negative values repel.
    pub charge_strength: f64,
    pub link_distance: f64,
    pub link_strength: f64,
    /// Collision radius = rendered size * margin.
    pub collision_margin: f64,
    pub center_strength: f64,
    pub settle_delay: Duration,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            charge_strength: -120.0,
            link_distance: 30.0,
            link_strength: 0.4,
            collision_margin: 1.5,
            center_strength: 0.05,
            settle_delay: Duration::from_millis(300),
        }
    }
}

/// Parameters handed to the physics simulation for one subgraph.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutParams {
    pub charge_strength: f64,
    pub link_distance: f64,
    pub link_strength: f64,
    pub center_strength: f64,
    /// One radius per subgraph node, in node order.
    pub collision_radii: Vec<f64>,
}

/// Decides the simulation parameters and when to (re)apply them.
///
/// A subgraph change arms a settle timer; parameters come out of `poll`
/// only once the timer has run its course without another change.
#[derive(Debug, Clone)]
pub struct ForceLayoutEngine {
    config: LayoutConfig,
    armed_at: Option<Instant>,
}

impl ForceLayoutEngine {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            config,
            armed_at: None,
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn params_for(&self, subgraph: &FilteredSubgraph) -> LayoutParams {
        LayoutParams {
            charge_strength: self.config.charge_strength,
            link_distance: self.config.link_distance,
            link_strength: self.config.link_strength,
            center_strength: self.config.center_strength,
            collision_radii: subgraph
                .nodes
                .iter()
                .map(|n| n.val * self.config.collision_margin)
                .collect(),
        }
    }

    pub fn subgraph_changed(&mut self, now: Instant) {
        self.armed_at = Some(now);
    }

    pub fn is_settling(&self) -> bool {
        self.armed_at.is_some()
    }

    pub fn poll(&mut self, now: Instant, subgraph: &FilteredSubgraph) -> Option<LayoutParams> {
        let armed_at = self.armed_at?;
        if now.saturating_duration_since(armed_at) < self.config.settle_delay {
            return None;
        }
        self.armed_at = None;
        debug!("Applying layout parameters to {} nodes", subgraph.nodes.len());
        Some(self.params_for(subgraph))
    }
}

impl Default for ForceLayoutEngine {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}
