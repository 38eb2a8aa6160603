pub mod canvas;
pub mod graph_monitor;
pub mod navigator;
pub mod simulation;

pub use canvas::{Viewport, hit_test, render_graph};
pub use graph_monitor::{GraphMonitor, MonitorOptions, create_view_channels, run_graph_view};
pub use navigator::{Navigator, SystemNavigator};
pub use simulation::ForceSimulation;
