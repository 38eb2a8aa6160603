use crate::simulation::ForceSimulation;
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::Span,
    widgets::{
        Block,
        canvas::{Canvas, Circle, Context, Line as CanvasLine},
    },
};
use wikigraph_core::{GraphViewModel, Rgb};

/// World units covered by one terminal column at zoom 1.
const UNITS_PER_COLUMN: f64 = 2.0;
/// World units covered by one terminal row at zoom 1. Rows are about twice
/// as tall as columns are wide.
const UNITS_PER_ROW: f64 = 4.0;

/// Label height in world units at zoom 1: exactly one text row.
pub const LABEL_FONT_SIZE: f64 = UNITS_PER_ROW;
/// Below this zoom only the root and focused nodes are labeled.
pub const LABEL_ZOOM: f64 = 1.5;

const MIN_ZOOM: f64 = 0.1;
const MAX_ZOOM: f64 = 20.0;
const ZOOM_STEP: f64 = 1.25;
/// Fraction of the visible span moved per pan step.
const PAN_STEP: f64 = 0.1;
const ARROW_LENGTH: f64 = 4.0;
const EDGE_COLOR: Rgb = Rgb(0x99, 0x99, 0x99);
const BORDER_COLOR: Rgb = Rgb(0xff, 0xff, 0xff);

/// Camera over the simulation's world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub center_x: f64,
    pub center_y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            center_x: 0.0,
            center_y: 0.0,
            zoom: 1.0,
        }
    }
}

impl Viewport {
    pub fn zoom_in(&mut self) {
        self.zoom = (self.zoom * ZOOM_STEP).min(MAX_ZOOM);
    }

    pub fn zoom_out(&mut self) {
        self.zoom = (self.zoom / ZOOM_STEP).max(MIN_ZOOM);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Pan by whole steps; positive `dx` moves right, positive `dy` up.
    pub fn pan(&mut self, area: Rect, dx: i32, dy: i32) {
        let (w, h) = self.span(area);
        self.center_x += dx as f64 * w * PAN_STEP;
        self.center_y += dy as f64 * h * PAN_STEP;
    }

    /// Visible width and height in world units.
    pub fn span(&self, area: Rect) -> (f64, f64) {
        (
            area.width.max(1) as f64 * UNITS_PER_COLUMN / self.zoom,
            area.height.max(1) as f64 * UNITS_PER_ROW / self.zoom,
        )
    }

    pub fn bounds(&self, area: Rect) -> ([f64; 2], [f64; 2]) {
        let (w, h) = self.span(area);
        (
            [self.center_x - w / 2.0, self.center_x + w / 2.0],
            [self.center_y - h / 2.0, self.center_y + h / 2.0],
        )
    }

    /// World point under the middle of a terminal cell. `None` outside `area`.
    pub fn screen_to_world(&self, area: Rect, column: u16, row: u16) -> Option<(f64, f64)> {
        if column < area.x
            || row < area.y
            || column >= area.x + area.width
            || row >= area.y + area.height
        {
            return None;
        }
        let ([x0, x1], [y0, y1]) = self.bounds(area);
        let fx = (column - area.x) as f64 + 0.5;
        let fy = (row - area.y) as f64 + 0.5;
        Some((
            x0 + fx / area.width as f64 * (x1 - x0),
            // canvas y grows upward
            y1 - fy / area.height as f64 * (y1 - y0),
        ))
    }

    /// World distance covered by one cell, the slack allowed when hit testing.
    pub fn cell_size(&self) -> f64 {
        UNITS_PER_COLUMN.max(UNITS_PER_ROW) / self.zoom
    }

    pub fn label_font_size(&self) -> f64 {
        LABEL_FONT_SIZE / self.zoom
    }
}

pub fn to_color(rgb: Rgb, opacity: f32) -> Color {
    let Rgb(r, g, b) = rgb.with_opacity(opacity);
    Color::Rgb(r, g, b)
}

/// Two short strokes forming an arrowhead that touches the rim of the
/// target circle.
pub fn arrowhead(
    from: (f64, f64),
    to: (f64, f64),
    target_radius: f64,
) -> [(f64, f64, f64, f64); 2] {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let len = (dx * dx + dy * dy).sqrt().max(1e-6);
    let (ux, uy) = (dx / len, dy / len);
    let tip = (to.0 - ux * target_radius, to.1 - uy * target_radius);
    let back = (tip.0 - ux * ARROW_LENGTH, tip.1 - uy * ARROW_LENGTH);
    let (px, py) = (-uy * ARROW_LENGTH * 0.5, ux * ARROW_LENGTH * 0.5);
    [
        (tip.0, tip.1, back.0 + px, back.1 + py),
        (tip.0, tip.1, back.0 - px, back.1 - py),
    ]
}

/// Id of the node nearest to `point` whose disc (plus `slack`) contains it.
pub fn hit_test(
    view: &GraphViewModel,
    sim: &ForceSimulation,
    point: (f64, f64),
    slack: f64,
) -> Option<String> {
    view.subgraph()
        .nodes
        .iter()
        .filter_map(|node| {
            let (x, y) = sim.position(&node.id)?;
            let d = ((x - point.0).powi(2) + (y - point.1).powi(2)).sqrt();
            (d <= node.val + slack).then_some((d, node.id.as_str()))
        })
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, id)| id.to_string())
}

/// Paint edges, then nodes, then labels.
pub fn render_graph(
    f: &mut Frame,
    area: Rect,
    block: Block,
    view: &GraphViewModel,
    sim: &ForceSimulation,
    viewport: &Viewport,
) {
    let inner = block.inner(area);
    let (x_bounds, y_bounds) = viewport.bounds(inner);
    let zoom = viewport.zoom;
    let font_size = viewport.label_font_size();

    let canvas = Canvas::default()
        .block(block)
        .marker(Marker::Braille)
        .x_bounds(x_bounds)
        .y_bounds(y_bounds)
        .paint(|ctx| paint(ctx, view, sim, zoom, font_size));

    f.render_widget(canvas, area);
}

fn paint(
    ctx: &mut Context,
    view: &GraphViewModel,
    sim: &ForceSimulation,
    zoom: f64,
    font_size: f64,
) {
    let subgraph = view.subgraph();
    let highlight = view.highlight();

    for (index, edge) in subgraph.edges.iter().enumerate() {
        let (Some(from), Some(to)) = (sim.position(&edge.source), sim.position(&edge.target))
        else {
            continue;
        };
        let color = to_color(EDGE_COLOR, highlight.edge_opacity(index));
        ctx.draw(&CanvasLine {
            x1: from.0,
            y1: from.1,
            x2: to.0,
            y2: to.1,
            color,
        });

        if highlight.contains_edge(index) {
            let radius = subgraph.node(&edge.target).map(|n| n.val).unwrap_or(0.0);
            for (x1, y1, x2, y2) in arrowhead(from, to, radius) {
                ctx.draw(&CanvasLine {
                    x1,
                    y1,
                    x2,
                    y2,
                    color: Color::White,
                });
            }
        }
    }

    ctx.layer();

    for node in &subgraph.nodes {
        let Some((x, y)) = sim.position(&node.id) else {
            continue;
        };
        let opacity = highlight.node_opacity(&node.id);
        let fill = to_color(node.color, opacity);

        // filled disc approximated by concentric rings
        let step = (node.val / 6.0).max(1.0 / zoom.max(MIN_ZOOM));
        let mut radius = node.val;
        while radius > 0.0 {
            ctx.draw(&Circle {
                x,
                y,
                radius,
                color: fill,
            });
            radius -= step;
        }
        ctx.draw(&Circle {
            x,
            y,
            radius: node.val + 0.5 / zoom,
            color: to_color(BORDER_COLOR, opacity),
        });
    }

    ctx.layer();

    for node in &subgraph.nodes {
        let focused = highlight.contains_node(&node.id);
        if !(focused || node.depth == 0 || zoom >= LABEL_ZOOM) {
            continue;
        }
        let Some((x, y)) = sim.position(&node.id) else {
            continue;
        };
        let white = to_color(Rgb(0xff, 0xff, 0xff), highlight.node_opacity(&node.id));
        let mut style = Style::default().fg(white);
        if view.hovered() == Some(node.id.as_str()) {
            style = style.add_modifier(Modifier::BOLD);
        }
        ctx.print(
            x - node.val,
            y - node.val - font_size,
            Span::styled(node.label.clone(), style),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screen_to_world_center() {
        let viewport = Viewport::default();
        let area = Rect::new(0, 0, 100, 50);
        let (x, y) = viewport.screen_to_world(area, 50, 25).unwrap();
        assert!((x - 1.0).abs() < 1e-9, "x = {}", x);
        assert!((y + 2.0).abs() < 1e-9, "y = {}", y);
        assert!(viewport.screen_to_world(area, 100, 10).is_none());
    }

    #[test]
    fn test_zoom_shrinks_span_and_label() {
        let mut viewport = Viewport::default();
        let area = Rect::new(0, 0, 80, 40);
        let (w, _) = viewport.span(area);
        viewport.zoom_in();
        let (zoomed, _) = viewport.span(area);
        assert!(zoomed < w);
        assert!(viewport.label_font_size() < LABEL_FONT_SIZE);

        for _ in 0..100 {
            viewport.zoom_in();
        }
        assert_eq!(viewport.zoom, MAX_ZOOM);
        viewport.reset();
        assert_eq!(viewport, Viewport::default());
    }

    #[test]
    fn test_pan_moves_center() {
        let mut viewport = Viewport::default();
        let area = Rect::new(0, 0, 100, 50);
        viewport.pan(area, 1, -1);
        assert!(viewport.center_x > 0.0);
        assert!(viewport.center_y < 0.0);
    }

    #[test]
    fn test_arrowhead_touches_rim() {
        let [(tx, ty, bx, _), (tx2, _, bx2, _)] = arrowhead((0.0, 0.0), (10.0, 0.0), 2.0);
        assert_eq!((tx, ty), (8.0, 0.0));
        assert_eq!(tx2, 8.0);
        assert!(bx < tx && bx2 < tx);
    }

    #[test]
    fn test_opacity_blends_color() {
        assert_eq!(to_color(Rgb(200, 100, 50), 1.0), Color::Rgb(200, 100, 50));
        assert_eq!(to_color(Rgb(200, 100, 50), 0.5), Color::Rgb(100, 50, 25));
    }
}
