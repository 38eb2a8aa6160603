//! In-process force simulation driven by [`LayoutParams`].
//!
//! Velocity Verlet in the style of the usual web force layouts: every tick
//! accumulates charge, link, centering and collision impulses scaled by
//! `alpha`, damps velocities, then moves bodies. `alpha` decays toward zero
//! and the simulation stops once it falls below [`ALPHA_MIN`].

use std::collections::HashMap;
use std::f64::consts::PI;
use wikigraph_core::{FilteredSubgraph, ForceLayoutEngine, LayoutConfig, LayoutParams};

pub const ALPHA_MIN: f64 = 0.001;
const ALPHA_DECAY: f64 = 0.0228;
const VELOCITY_DECAY: f64 = 0.4;
const COLLISION_STRENGTH: f64 = 0.7;
const INITIAL_RADIUS: f64 = 10.0;
/// Heat added when nodes arrive before new parameters are applied.
const SYNC_ALPHA: f64 = 0.3;

#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
}

#[derive(Debug, Clone)]
pub struct ForceSimulation {
    bodies: Vec<Body>,
    lookup: HashMap<String, usize>,
    links: Vec<(usize, usize)>,
    radii: Vec<f64>,
    defaults: ForceLayoutEngine,
    params: Option<LayoutParams>,
    alpha: f64,
}

impl Default for ForceSimulation {
    fn default() -> Self {
        Self::new()
    }
}

impl ForceSimulation {
    pub fn new() -> Self {
        Self::with_config(LayoutConfig::default())
    }

    pub fn with_config(config: LayoutConfig) -> Self {
        Self {
            bodies: Vec::new(),
            lookup: HashMap::new(),
            links: Vec::new(),
            radii: Vec::new(),
            defaults: ForceLayoutEngine::new(config),
            params: None,
            alpha: 0.0,
        }
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn is_running(&self) -> bool {
        self.alpha >= ALPHA_MIN
    }

    pub fn position(&self, id: &str) -> Option<(f64, f64)> {
        self.lookup
            .get(id)
            .map(|&i| (self.bodies[i].x, self.bodies[i].y))
    }

    /// Match bodies to a new subgraph. Surviving ids keep their position and
    /// velocity; new ids start next to an already placed neighbor, or on a
    /// phyllotaxis spiral when they have none.
    pub fn sync(&mut self, subgraph: &FilteredSubgraph) {
        let mut previous: HashMap<String, Body> = self
            .bodies
            .drain(..)
            .map(|body| (body.id.clone(), body))
            .collect();

        let mut lookup = HashMap::with_capacity(subgraph.nodes.len());
        let mut bodies = Vec::with_capacity(subgraph.nodes.len());
        let mut fresh = Vec::new();

        for (i, node) in subgraph.nodes.iter().enumerate() {
            let body = match previous.remove(&node.id) {
                Some(body) => body,
                None => {
                    fresh.push(i);
                    let (x, y) = spiral(i);
                    Body {
                        id: node.id.clone(),
                        x,
                        y,
                        vx: 0.0,
                        vy: 0.0,
                    }
                }
            };
            lookup.insert(node.id.clone(), i);
            bodies.push(body);
        }

        let links: Vec<(usize, usize)> = subgraph
            .edges
            .iter()
            .filter_map(|e| Some((*lookup.get(&e.source)?, *lookup.get(&e.target)?)))
            .collect();

        for &i in &fresh {
            let anchor = links.iter().find_map(|&(s, t)| match (s == i, t == i) {
                (true, false) if !fresh.contains(&t) => Some(t),
                (false, true) if !fresh.contains(&s) => Some(s),
                _ => None,
            });
            if let Some(anchor) = anchor {
                let angle = i as f64 * PI * (3.0 - 5f64.sqrt());
                bodies[i].x = bodies[anchor].x + INITIAL_RADIUS * angle.cos();
                bodies[i].y = bodies[anchor].y + INITIAL_RADIUS * angle.sin();
            }
        }

        let baseline = self.defaults.params_for(subgraph);
        self.radii = baseline.collision_radii.clone();

        self.bodies = bodies;
        self.lookup = lookup;
        self.links = links;
        if self.params.is_none() && !self.bodies.is_empty() {
            self.params = Some(baseline);
            self.alpha = 1.0;
        } else if !fresh.is_empty() {
            self.alpha = self.alpha.max(SYNC_ALPHA);
        }
    }

    /// Install new parameters and reheat.
    pub fn apply(&mut self, params: LayoutParams) {
        if params.collision_radii.len() == self.bodies.len() {
            self.radii = params.collision_radii.clone();
        }
        self.params = Some(params);
        self.alpha = 1.0;
    }

    /// Advance one step. Returns false once the simulation has cooled.
    pub fn tick(&mut self) -> bool {
        if !self.is_running() || self.bodies.is_empty() {
            return false;
        }
        let Some(params) = self.params.clone() else {
            return false;
        };

        self.alpha += (0.0 - self.alpha) * ALPHA_DECAY;
        let alpha = self.alpha;
        let n = self.bodies.len();

        // charge
        for i in 0..n {
            for j in (i + 1)..n {
                let (dx, dy, l2) = separation(&self.bodies[i], &self.bodies[j], i, j);
                let w = params.charge_strength * alpha / l2;
                self.bodies[i].vx += dx * w;
                self.bodies[i].vy += dy * w;
                self.bodies[j].vx -= dx * w;
                self.bodies[j].vy -= dy * w;
            }
        }

        // links
        for &(s, t) in &self.links {
            if s == t {
                continue;
            }
            let dx = self.bodies[t].x + self.bodies[t].vx - self.bodies[s].x - self.bodies[s].vx;
            let dy = self.bodies[t].y + self.bodies[t].vy - self.bodies[s].y - self.bodies[s].vy;
            let l = (dx * dx + dy * dy).sqrt().max(1e-6);
            let k = (l - params.link_distance) / l * alpha * params.link_strength;
            let (fx, fy) = (dx * k * 0.5, dy * k * 0.5);
            self.bodies[t].vx -= fx;
            self.bodies[t].vy -= fy;
            self.bodies[s].vx += fx;
            self.bodies[s].vy += fy;
        }

        // centering
        for body in &mut self.bodies {
            body.vx -= body.x * params.center_strength * alpha;
            body.vy -= body.y * params.center_strength * alpha;
        }

        // collision
        for i in 0..n {
            for j in (i + 1)..n {
                let r = self.radii.get(i).copied().unwrap_or(0.0)
                    + self.radii.get(j).copied().unwrap_or(0.0);
                let (dx, dy, l2) = separation(&self.bodies[i], &self.bodies[j], i, j);
                if l2 >= r * r {
                    continue;
                }
                let l = l2.sqrt();
                let push = (r - l) / l * COLLISION_STRENGTH * 0.5;
                self.bodies[i].vx -= dx * push;
                self.bodies[i].vy -= dy * push;
                self.bodies[j].vx += dx * push;
                self.bodies[j].vy += dy * push;
            }
        }

        for body in &mut self.bodies {
            body.vx *= 1.0 - VELOCITY_DECAY;
            body.vy *= 1.0 - VELOCITY_DECAY;
            body.x += body.vx;
            body.y += body.vy;
        }

        true
    }

    /// Axis-aligned bounds of all bodies, if any.
    pub fn extent(&self) -> Option<(f64, f64, f64, f64)> {
        let first = self.bodies.first()?;
        Some(self.bodies.iter().fold(
            (first.x, first.x, first.y, first.y),
            |(x0, x1, y0, y1), b| (x0.min(b.x), x1.max(b.x), y0.min(b.y), y1.max(b.y)),
        ))
    }
}

/// Vector from `a` to `b` and its squared length, never zero. Coincident
/// bodies are nudged apart along a direction derived from their indices.
fn separation(a: &Body, b: &Body, i: usize, j: usize) -> (f64, f64, f64) {
    let mut dx = b.x - a.x;
    let mut dy = b.y - a.y;
    if dx == 0.0 && dy == 0.0 {
        let angle = (i * 31 + j * 17) as f64;
        dx = angle.cos() * 1e-3;
        dy = angle.sin() * 1e-3;
    }
    let l2 = (dx * dx + dy * dy).max(1.0);
    (dx, dy, l2)
}

fn spiral(i: usize) -> (f64, f64) {
    let radius = INITIAL_RADIUS * (0.5 + i as f64).sqrt();
    let angle = i as f64 * PI * (3.0 - 5f64.sqrt());
    (radius * angle.cos(), radius * angle.sin())
}
