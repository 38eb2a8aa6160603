//! Crawl session lifecycle.
//!
//! One [`CrawlController`] owns at most one live session. Stream pumps and
//! retry timers run as separate tasks but never touch session state: they
//! forward signals stamped with a [`Ticket`], and the controller checks the
//! ticket (cancellation token, session id, attempt id) before acting on
//! anything. A superseded or cancelled session therefore cannot mutate the
//! graph the UI is watching, however late its callbacks fire.
//!
//! ```text
//! Idle -> Requesting -> Streaming -> Completed | Failed | Cancelled
//!              ^            |
//!              |            v
//!              +------ Conflicted   (busy: stop, wait, resend same request)
//! ```

use crate::graph::{GraphAccumulator, GraphSnapshot};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wikigraph_stream::{
    CrawlRequest, StreamClient, StreamCloser, StreamError, StreamEvent, StreamHandle,
    StreamMessage,
};

/// Opens crawl streams and sends out-of-band stop signals.
pub trait StreamSource: Send + Sync + 'static {
    fn open(&self, request: &CrawlRequest) -> StreamHandle;

    /// The returned future is fire-and-forget; callers never wait on it
    /// before moving on.
    fn stop(&self) -> BoxFuture<'static, Result<(), StreamError>>;
}

impl StreamSource for StreamClient {
    fn open(&self, request: &CrawlRequest) -> StreamHandle {
        StreamClient::open(self, request)
    }

    fn stop(&self) -> BoxFuture<'static, Result<(), StreamError>> {
        let client = self.clone();
        async move { client.stop().await }.boxed()
    }
}

/// Time source for retry delays, the stream watchdog and render ticks.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        tokio::time::sleep(duration).boxed()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionFailure {
    #[error("Connection to the crawler failed: {0}")]
    Transport(String),

    #[error("{0}")]
    Server(String),

    #[error("Unreadable message from the crawler: {0}")]
    Malformed(String),

    #[error("Crawler still busy after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Requesting,
    Streaming,
    Conflicted { attempt: u32 },
    Completed,
    Failed(SessionFailure),
    Cancelled,
}

impl SessionState {
    /// Requesting, Streaming or Conflicted.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            SessionState::Requesting | SessionState::Streaming | SessionState::Conflicted { .. }
        )
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Failed(_) | SessionState::Cancelled
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Requesting => write!(f, "requesting"),
            SessionState::Streaming => write!(f, "streaming"),
            SessionState::Conflicted { attempt } => write!(f, "busy (retry {})", attempt),
            SessionState::Completed => write!(f, "complete"),
            SessionState::Failed(_) => write!(f, "failed"),
            SessionState::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warn,
    Error,
}

/// Something worth telling the user. Error notices are dismissible failures;
/// info notices are transient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// What the controller publishes to whoever renders the session.
#[derive(Debug, Clone)]
pub enum SessionUpdate {
    /// A new session now owns the display; drop whatever came before.
    Started { request: CrawlRequest },
    State(SessionState),
    Graph {
        snapshot: GraphSnapshot,
        progress: usize,
        total: usize,
    },
    Notice(Notice),
}

#[derive(Debug, Clone)]
pub enum ControllerCommand {
    Start(CrawlRequest),
    /// Start the current request again as a fresh session.
    Restart,
    Cancel,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    pub retry_delay: Duration,
    /// `None` retries a busy crawler forever.
    pub max_conflict_retries: Option<u32>,
    /// `None` waits on a silent stream forever.
    pub idle_timeout: Option<Duration>,
    /// How long shutdown waits for in-flight stop signals.
    pub stop_grace: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(2),
            max_conflict_retries: Some(20),
            idle_timeout: Some(Duration::from_secs(60)),
            stop_grace: Duration::from_secs(2),
        }
    }
}

/// Stamp carried by every signal a background task forwards.
#[derive(Debug, Clone)]
struct Ticket {
    session: u64,
    attempt: u64,
    token: CancellationToken,
}

#[derive(Debug)]
enum Signal {
    Stream(StreamEvent),
    RetryDue,
}

struct Attempt {
    id: u64,
    token: CancellationToken,
    closer: StreamCloser,
}

struct ActiveSession {
    id: u64,
    request: CrawlRequest,
    token: CancellationToken,
    attempt: Option<Attempt>,
    conflicts: u32,
    accumulator: GraphAccumulator,
    progress: usize,
    total: usize,
}

pub struct CrawlController<S: StreamSource, C: Clock> {
    source: Arc<S>,
    clock: Arc<C>,
    config: ControllerConfig,
    updates: mpsc::UnboundedSender<SessionUpdate>,
    signals_tx: mpsc::UnboundedSender<(Ticket, Signal)>,
    signals_rx: mpsc::UnboundedReceiver<(Ticket, Signal)>,
    state: SessionState,
    current: Option<ActiveSession>,
    next_session: u64,
    next_attempt: u64,
    stops: Vec<JoinHandle<()>>,
}

impl<S: StreamSource, C: Clock> CrawlController<S, C> {
    pub fn new(
        source: Arc<S>,
        clock: Arc<C>,
        config: ControllerConfig,
        updates: mpsc::UnboundedSender<SessionUpdate>,
    ) -> Self {
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        Self {
            source,
            clock,
            config,
            updates,
            signals_tx,
            signals_rx,
            state: SessionState::Idle,
            current: None,
            next_session: 1,
            next_attempt: 1,
            stops: Vec::new(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn current_request(&self) -> Option<&CrawlRequest> {
        self.current.as_ref().map(|s| &s.request)
    }

    /// Snapshot of the session that currently owns the display.
    pub fn snapshot(&mut self) -> GraphSnapshot {
        self.current
            .as_mut()
            .map(|s| s.accumulator.snapshot())
            .unwrap_or_default()
    }

    /// Begin a new session, superseding any live one first.
    pub fn start(&mut self, request: CrawlRequest) {
        self.supersede();

        let id = self.next_session;
        self.next_session += 1;
        info!("Starting crawl session {} for {}", id, request);

        self.current = Some(ActiveSession {
            id,
            request: request.clone(),
            token: CancellationToken::new(),
            attempt: None,
            conflicts: 0,
            accumulator: GraphAccumulator::new(),
            progress: 0,
            total: 0,
        });
        self.publish(SessionUpdate::Started { request });
        // the new session always announces its first state
        self.state = SessionState::Idle;
        self.open_attempt();
    }

    pub fn restart(&mut self) {
        match self.current.as_ref().map(|s| s.request.clone()) {
            Some(request) => self.start(request),
            None => debug!("Restart requested with no session"),
        }
    }

    /// Tear down the live session. Never reported as a failure.
    pub fn cancel(&mut self) {
        if !self.state.is_live() {
            return;
        }
        let Some(session) = self.current.as_mut() else {
            return;
        };

        info!("Cancelling crawl session {}", session.id);
        session.token.cancel();
        if let Some(attempt) = session.attempt.take() {
            attempt.closer.close();
        }
        self.fire_stop();
        self.set_state(SessionState::Cancelled);
    }

    /// Handle the next forwarded signal. Returns false if none can arrive.
    pub async fn step(&mut self) -> bool {
        match self.signals_rx.recv().await {
            Some((ticket, signal)) => {
                self.handle_signal(ticket, signal);
                true
            }
            None => false,
        }
    }

    /// Handle every signal already queued, without waiting.
    pub fn drain_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok((ticket, signal)) = self.signals_rx.try_recv() {
            self.handle_signal(ticket, signal);
            handled += 1;
        }
        handled
    }

    pub fn handle_command(&mut self, command: ControllerCommand) {
        match command {
            ControllerCommand::Start(request) => self.start(request),
            ControllerCommand::Restart => self.restart(),
            ControllerCommand::Cancel => self.cancel(),
            ControllerCommand::Shutdown => self.cancel(),
        }
    }

    /// Drive the controller until `Shutdown` arrives or every command sender
    /// is dropped, then tear down.
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<ControllerCommand>) {
        loop {
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(ControllerCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some((ticket, signal)) = self.signals_rx.recv() => {
                    self.handle_signal(ticket, signal);
                }
            }
        }
        self.shutdown().await;
    }

    /// Cancel, then give in-flight stop signals a bounded chance to land.
    pub async fn shutdown(mut self) {
        self.cancel();
        let stops = std::mem::take(&mut self.stops);
        let all = futures::future::join_all(stops);
        if tokio::time::timeout(self.config.stop_grace, all).await.is_err() {
            warn!("Stop signal still pending at shutdown");
        }
    }

    fn supersede(&mut self) {
        let live = self.state.is_live();
        let Some(session) = self.current.take() else {
            return;
        };

        debug!("Superseding crawl session {}", session.id);
        session.token.cancel();
        if let Some(attempt) = session.attempt {
            attempt.closer.close();
        }
        if live {
            self.fire_stop();
        }
    }

    fn open_attempt(&mut self) {
        let attempt_id = self.next_attempt;
        self.next_attempt += 1;

        let Some(session) = self.current.as_mut() else {
            return;
        };
        let token = session.token.child_token();
        let handle = self.source.open(&session.request);
        session.attempt = Some(Attempt {
            id: attempt_id,
            token: token.clone(),
            closer: handle.closer(),
        });
        let ticket = Ticket {
            session: session.id,
            attempt: attempt_id,
            token,
        };

        self.set_state(SessionState::Requesting);
        self.spawn_pump(ticket, handle);
    }

    fn spawn_pump(&self, ticket: Ticket, mut handle: StreamHandle) {
        let signals = self.signals_tx.clone();
        let clock = Arc::clone(&self.clock);
        let idle_timeout = self.config.idle_timeout;

        tokio::spawn(async move {
            loop {
                let watchdog = async {
                    match idle_timeout {
                        Some(limit) => {
                            clock.sleep(limit).await;
                            limit
                        }
                        None => std::future::pending().await,
                    }
                };

                let event = tokio::select! {
                    biased;
                    _ = ticket.token.cancelled() => break,
                    event = handle.next() => match event {
                        Some(event) => event,
                        None if handle.is_closed() => break,
                        None => StreamEvent::Transport("stream dropped by the source".to_string()),
                    },
                    limit = watchdog => StreamEvent::Transport(format!(
                        "no events received for {}s",
                        limit.as_secs()
                    )),
                };

                let terminal = event.is_terminal();
                if signals.send((ticket.clone(), Signal::Stream(event))).is_err() || terminal {
                    break;
                }
            }
        });
    }

    fn schedule_retry(&self, ticket: Ticket) {
        let sleep = self.clock.sleep(self.config.retry_delay);
        let signals = self.signals_tx.clone();

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = ticket.token.cancelled() => {}
                _ = sleep => {
                    let _ = signals.send((ticket, Signal::RetryDue));
                }
            }
        });
    }

    fn handle_signal(&mut self, ticket: Ticket, signal: Signal) {
        if ticket.token.is_cancelled() {
            debug!("Dropping signal for cancelled ticket {:?}", signal);
            return;
        }
        let Some(session) = self.current.as_ref() else {
            return;
        };
        if session.id != ticket.session {
            debug!("Dropping signal from superseded session {}", ticket.session);
            return;
        }

        match signal {
            Signal::RetryDue => {
                if matches!(self.state, SessionState::Conflicted { .. }) {
                    info!("Retrying crawl for {}", session.request);
                    self.open_attempt();
                }
            }
            Signal::Stream(event) => {
                if session.attempt.as_ref().map(|a| a.id) != Some(ticket.attempt) {
                    debug!("Dropping event from stale attempt {}", ticket.attempt);
                    return;
                }
                self.on_stream_event(event);
            }
        }
    }

    fn on_stream_event(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Message(StreamMessage::Node(fragment)) => {
                if self.state == SessionState::Requesting {
                    self.set_state(SessionState::Streaming);
                }
                let Some(session) = self.current.as_mut() else {
                    return;
                };
                debug!(
                    "Node '{}' (depth {}) with {} edge(s), {}/{}",
                    fragment.node.id,
                    fragment.node.depth,
                    fragment.edges.len(),
                    fragment.progress,
                    fragment.total
                );
                session.accumulator.append(fragment.node, fragment.edges);
                session.progress = fragment.progress;
                session.total = fragment.total;
                let update = SessionUpdate::Graph {
                    snapshot: session.accumulator.snapshot(),
                    progress: session.progress,
                    total: session.total,
                };
                self.publish(update);
            }
            StreamEvent::Message(StreamMessage::Complete) => {
                self.close_attempt();
                if let Some(session) = self.current.as_ref() {
                    info!(
                        "Crawl complete: {} pages, {} links",
                        session.accumulator.node_count(),
                        session.accumulator.edge_count()
                    );
                }
                self.set_state(SessionState::Completed);
            }
            StreamEvent::Message(StreamMessage::Busy { message }) => self.on_conflict(message),
            StreamEvent::Message(StreamMessage::Error { message }) => {
                self.fail(SessionFailure::Server(message))
            }
            StreamEvent::Transport(message) => self.fail(SessionFailure::Transport(message)),
            StreamEvent::Malformed(message) => self.fail(SessionFailure::Malformed(message)),
        }
    }

    fn on_conflict(&mut self, message: String) {
        self.close_attempt();
        self.fire_stop();

        let retry_delay = self.config.retry_delay;
        let max_retries = self.config.max_conflict_retries;
        let Some(session) = self.current.as_mut() else {
            return;
        };
        session.conflicts += 1;
        let attempt = session.conflicts;

        if let Some(max) = max_retries
            && attempt > max
        {
            self.fail(SessionFailure::RetriesExhausted { attempts: attempt });
            return;
        }

        info!("Crawler busy ({}), retry {} in {:?}", message, attempt, retry_delay);
        let ticket = Ticket {
            session: session.id,
            attempt: 0,
            token: session.token.child_token(),
        };
        self.publish(SessionUpdate::Notice(Notice::info(format!(
            "{}; retrying in {}s",
            message,
            retry_delay.as_secs_f32()
        ))));
        self.set_state(SessionState::Conflicted { attempt });
        self.schedule_retry(ticket);
    }

    fn fail(&mut self, failure: SessionFailure) {
        self.close_attempt();
        warn!("Crawl session failed: {}", failure);
        self.publish(SessionUpdate::Notice(Notice::error(failure.to_string())));
        self.set_state(SessionState::Failed(failure));
    }

    fn close_attempt(&mut self) {
        if let Some(attempt) = self.current.as_mut().and_then(|s| s.attempt.take()) {
            attempt.token.cancel();
            attempt.closer.close();
        }
    }

    fn fire_stop(&mut self) {
        self.stops.retain(|stop| !stop.is_finished());
        let stop = self.source.stop();
        self.stops.push(tokio::spawn(async move {
            if let Err(e) = stop.await {
                warn!("Stop signal failed: {}", e);
            }
        }));
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            debug!("Session state {} -> {}", self.state, state);
            self.state = state.clone();
            self.publish(SessionUpdate::State(state));
        }
    }

    fn publish(&self, update: SessionUpdate) {
        // the receiving side going away is not the controller's problem
        let _ = self.updates.send(update);
    }
}
