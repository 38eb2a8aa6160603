use crate::graph::GraphSnapshot;
use crate::session::{
    ControllerCommand, ControllerConfig, CrawlController, Notice, NoticeLevel, SessionState,
    SessionUpdate, StreamSource, TokioClock,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use wikigraph_stream::CrawlRequest;

/// Options for a headless crawl
pub struct FollowOptions {
    pub config: ControllerConfig,
    pub show_progress_bars: bool,
}

/// Callback for notices raised while following
pub type NoticeCallback = Arc<dyn Fn(&Notice) + Send + Sync>;

/// How a followed crawl ended.
#[derive(Debug, Clone)]
pub struct FollowOutcome {
    pub request: CrawlRequest,
    pub state: SessionState,
    pub snapshot: GraphSnapshot,
    pub progress: usize,
    pub total: usize,
    pub elapsed: Duration,
    pub notices: Vec<Notice>,
}

impl FollowOutcome {
    pub fn is_complete(&self) -> bool {
        self.state == SessionState::Completed
    }
}

fn progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.cyan} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

/// Run one crawl session to the end without a UI.
///
/// Cancelling `interrupt` tears the session down; the outcome then reports
/// `Cancelled` with whatever graph had arrived.
pub async fn follow_crawl<S: StreamSource>(
    source: Arc<S>,
    request: CrawlRequest,
    options: FollowOptions,
    interrupt: CancellationToken,
    notice_callback: Option<NoticeCallback>,
) -> FollowOutcome {
    let FollowOptions {
        config,
        show_progress_bars,
    } = options;

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new(request.max_pages() as u64);
        pb.set_style(progress_style());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(format!("Requesting {}", request.page()));
        Some(pb)
    } else {
        None
    };

    let (updates_tx, mut updates) = mpsc::unbounded_channel();
    let (commands, commands_rx) = mpsc::unbounded_channel();
    let controller = CrawlController::new(source, Arc::new(TokioClock), config, updates_tx);
    let runner = tokio::spawn(controller.run(commands_rx));

    let started = Instant::now();
    let mut outcome = FollowOutcome {
        request: request.clone(),
        state: SessionState::Idle,
        snapshot: GraphSnapshot::default(),
        progress: 0,
        total: 0,
        elapsed: Duration::ZERO,
        notices: Vec::new(),
    };
    let _ = commands.send(ControllerCommand::Start(request));
    let mut interrupted = false;

    loop {
        let update = tokio::select! {
            _ = interrupt.cancelled(), if !interrupted => {
                debug!("Follow interrupted");
                interrupted = true;
                let _ = commands.send(ControllerCommand::Cancel);
                continue;
            }
            update = updates.recv() => update,
        };

        let Some(update) = update else {
            break;
        };

        match update {
            SessionUpdate::Started { .. } => {}
            SessionUpdate::Graph {
                snapshot,
                progress,
                total,
            } => {
                if let Some(ref pb) = progress_bar {
                    if total > 0 {
                        pb.set_length(total as u64);
                    }
                    pb.set_position(progress as u64);
                    pb.set_message(format!(
                        "{} pages, {} links",
                        snapshot.node_count(),
                        snapshot.edge_count()
                    ));
                }
                outcome.snapshot = snapshot;
                outcome.progress = progress;
                outcome.total = total;
            }
            SessionUpdate::Notice(notice) => {
                if notice.level != NoticeLevel::Error {
                    if let Some(ref pb) = progress_bar {
                        pb.set_message(notice.message.clone());
                    }
                }
                if let Some(ref callback) = notice_callback {
                    match progress_bar {
                        Some(ref pb) => pb.suspend(|| callback(&notice)),
                        None => callback(&notice),
                    }
                }
                outcome.notices.push(notice);
            }
            SessionUpdate::State(state) => {
                if let Some(ref pb) = progress_bar {
                    pb.set_message(state.to_string());
                }
                let finished = state.is_finished();
                outcome.state = state;
                if finished {
                    break;
                }
            }
        }
    }

    let _ = commands.send(ControllerCommand::Shutdown);
    if let Err(e) = runner.await {
        warn!("Controller task ended abnormally: {}", e);
    }

    outcome.elapsed = started.elapsed();
    if let Some(pb) = progress_bar {
        match outcome.state {
            SessionState::Completed => pb.finish_with_message(format!(
                "Crawled {} pages",
                outcome.snapshot.node_count()
            )),
            _ => pb.abandon_with_message(outcome.state.to_string()),
        }
    }

    outcome
}
