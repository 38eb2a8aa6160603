pub mod adjacency;
pub mod config;
pub mod crawl;
pub mod filter;
pub mod graph;
pub mod layout;
pub mod report;
pub mod session;
pub mod view;

pub use adjacency::{AdjacencyIndex, DIMMED_OPACITY, HighlightSet};
pub use config::{ConfigError, Settings};
pub use crawl::{FollowOptions, FollowOutcome, follow_crawl};
pub use filter::{DepthFilter, FilterParams, FilteredSubgraph, RenderNode, Rgb, filter_snapshot};
pub use graph::{GraphAccumulator, GraphExport, GraphSnapshot};
pub use layout::{ForceLayoutEngine, LayoutConfig, LayoutParams};
pub use report::ReportFormat;
pub use session::{
    Clock, ControllerCommand, ControllerConfig, CrawlController, Notice, NoticeLevel,
    SessionFailure, SessionState, SessionUpdate, StreamSource, TokioClock,
};
pub use view::GraphViewModel;
