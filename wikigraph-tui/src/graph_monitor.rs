use crate::canvas::{Viewport, hit_test, render_graph};
use crate::navigator::Navigator;
use crate::simulation::ForceSimulation;
use anyhow::Result;
use chrono::{DateTime, Local};
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
};
use std::io;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use wikigraph_core::{
    ControllerCommand, FilterParams, GraphViewModel, LayoutConfig, Notice, NoticeLevel,
    SessionState, SessionUpdate,
};
use wikigraph_stream::CrawlRequest;

/// Render cadence of the monitor loop.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(30);
/// How long an informational notice stays on screen.
pub const INFO_NOTICE_TTL: Duration = Duration::from_secs(4);
const MAX_LOG_ENTRIES: usize = 500;

pub struct MonitorOptions {
    pub wiki_base_url: String,
    pub filter: FilterParams,
    pub layout: LayoutConfig,
}

struct Banner {
    notice: Notice,
    shown_at: Instant,
}

/// TUI state for watching a crawl session grow
pub struct GraphMonitor {
    rx: mpsc::UnboundedReceiver<SessionUpdate>,
    commands: mpsc::UnboundedSender<ControllerCommand>,
    navigator: Box<dyn Navigator>,
    wiki_base_url: String,
    view: GraphViewModel,
    layout: LayoutConfig,
    sim: ForceSimulation,
    viewport: Viewport,
    state: SessionState,
    request: Option<CrawlRequest>,
    logs: Vec<(DateTime<Local>, NoticeLevel, String)>,
    banner: Option<Banner>,
    canvas_area: Rect,
    hover_cursor: Option<usize>,
    should_quit: bool,
}

impl GraphMonitor {
    pub fn new(
        rx: mpsc::UnboundedReceiver<SessionUpdate>,
        commands: mpsc::UnboundedSender<ControllerCommand>,
        navigator: Box<dyn Navigator>,
        options: MonitorOptions,
    ) -> Self {
        Self {
            rx,
            commands,
            navigator,
            wiki_base_url: options.wiki_base_url,
            view: GraphViewModel::new(options.filter, options.layout),
            layout: options.layout,
            sim: ForceSimulation::with_config(options.layout),
            viewport: Viewport::default(),
            state: SessionState::Idle,
            request: None,
            logs: Vec::new(),
            banner: None,
            canvas_area: Rect::default(),
            hover_cursor: None,
            should_quit: false,
        }
    }

    pub fn view(&self) -> &GraphViewModel {
        &self.view
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn banner(&self) -> Option<&Notice> {
        self.banner.as_ref().map(|b| &b.notice)
    }

    fn log(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.logs.push((Local::now(), level, message.into()));
        if self.logs.len() > MAX_LOG_ENTRIES {
            self.logs.drain(0..self.logs.len() - MAX_LOG_ENTRIES);
        }
    }

    fn send(&mut self, command: ControllerCommand) {
        if self.commands.send(command).is_err() {
            warn!("Controller is gone, command dropped");
            self.should_quit = true;
        }
    }

    /// Process incoming updates from the controller
    pub fn process_messages(&mut self, now: Instant) {
        while let Ok(update) = self.rx.try_recv() {
            match update {
                SessionUpdate::Started { request } => {
                    self.view.reset(now);
                    self.sim = ForceSimulation::with_config(self.layout);
                    self.banner = None;
                    self.hover_cursor = None;
                    self.log(NoticeLevel::Info, format!("Crawling {}", request));
                    self.request = Some(request);
                }
                SessionUpdate::State(state) => {
                    match state {
                        SessionState::Completed => {
                            let pages = self.view.snapshot().node_count();
                            self.log(NoticeLevel::Info, format!("Crawl complete: {} pages", pages));
                        }
                        SessionState::Cancelled => self.log(NoticeLevel::Info, "Crawl cancelled"),
                        _ => {}
                    }
                    self.state = state;
                }
                SessionUpdate::Graph {
                    snapshot,
                    progress,
                    total,
                } => {
                    self.view.set_snapshot(snapshot, now);
                    self.view.set_progress(progress, total);
                    self.sim.sync(self.view.subgraph());
                }
                SessionUpdate::Notice(notice) => {
                    self.log(notice.level, notice.message.clone());
                    self.banner = Some(Banner {
                        notice,
                        shown_at: now,
                    });
                }
            }
        }
    }

    /// Advance timers and the simulation by one frame.
    pub fn tick(&mut self, now: Instant) {
        if let Some(ref banner) = self.banner
            && banner.notice.level != NoticeLevel::Error
            && now.saturating_duration_since(banner.shown_at) >= INFO_NOTICE_TTL
        {
            self.banner = None;
        }

        if let Some(params) = self.view.poll_layout(now) {
            debug!("Reheating simulation for {} nodes", params.collision_radii.len());
            self.sim.apply(params);
        }
        self.sim.tick();
    }

    fn refiltered(&mut self) {
        self.sim.sync(self.view.subgraph());
        self.hover_cursor = None;
    }

    fn hover(&mut self, id: Option<String>) {
        match id {
            Some(id) if self.view.hovered() != Some(id.as_str()) => {
                self.view.hover_enter(&id);
            }
            Some(_) => {}
            None => {
                if self.view.hovered().is_some() {
                    self.view.hover_exit();
                }
            }
        }
    }

    fn cycle_hover(&mut self) {
        let count = self.view.subgraph().nodes.len();
        if count == 0 {
            return;
        }
        let next = self.hover_cursor.map(|i| (i + 1) % count).unwrap_or(0);
        self.hover_cursor = Some(next);
        let id = self.view.subgraph().nodes[next].id.clone();
        self.hover(Some(id));
    }

    fn open(&mut self, id: &str, now: Instant) {
        let url = format!("{}{}", self.wiki_base_url, id);
        if let Err(e) = self.navigator.open(&url) {
            let notice = Notice::error(format!("{:#}", e));
            self.log(notice.level, notice.message.clone());
            self.banner = Some(Banner {
                notice,
                shown_at: now,
            });
        } else {
            self.log(NoticeLevel::Info, format!("Opened {}", url));
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Char('c') => self.send(ControllerCommand::Cancel),
            KeyCode::Char('r') => self.send(ControllerCommand::Restart),
            KeyCode::Char('x') => self.banner = None,
            KeyCode::Char('d') => {
                let depth = self.view.cycle_depth_filter(now);
                self.log(NoticeLevel::Info, format!("Depth filter: {}", depth));
                self.refiltered();
            }
            KeyCode::Char(']') => {
                let cap = self.view.adjust_node_cap(1, now);
                self.log(NoticeLevel::Info, format!("Node cap: {}", cap));
                self.refiltered();
            }
            KeyCode::Char('[') => {
                let cap = self.view.adjust_node_cap(-1, now);
                self.log(NoticeLevel::Info, format!("Node cap: {}", cap));
                self.refiltered();
            }
            KeyCode::Char('+') | KeyCode::Char('=') => self.viewport.zoom_in(),
            KeyCode::Char('-') => self.viewport.zoom_out(),
            KeyCode::Char('0') => {
                self.viewport.reset();
                if let Some((x0, x1, y0, y1)) = self.sim.extent() {
                    self.viewport.center_x = (x0 + x1) / 2.0;
                    self.viewport.center_y = (y0 + y1) / 2.0;
                }
            }
            KeyCode::Left => self.viewport.pan(self.canvas_area, -1, 0),
            KeyCode::Right => self.viewport.pan(self.canvas_area, 1, 0),
            KeyCode::Up => self.viewport.pan(self.canvas_area, 0, 1),
            KeyCode::Down => self.viewport.pan(self.canvas_area, 0, -1),
            KeyCode::Tab => self.cycle_hover(),
            KeyCode::Enter => {
                if let Some(id) = self.view.hovered().map(str::to_string) {
                    self.open(&id, now);
                }
            }
            _ => {}
        }
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent, now: Instant) {
        let point = self
            .viewport
            .screen_to_world(self.canvas_area, mouse.column, mouse.row);
        let radius = self.viewport.cell_size() / 2.0;
        let target = point.and_then(|p| hit_test(&self.view, &self.sim, p, radius));

        match mouse.kind {
            MouseEventKind::Moved => self.hover(target),
            MouseEventKind::Down(MouseButton::Left) => {
                if let Some(id) = target {
                    self.open(&id, now);
                }
            }
            MouseEventKind::ScrollUp => self.viewport.zoom_in(),
            MouseEventKind::ScrollDown => self.viewport.zoom_out(),
            _ => {}
        }
    }

    pub fn render(&mut self, f: &mut Frame) {
        let size = f.area();

        let banner_height = if self.banner.is_some() { 3 } else { 0 };
        let vertical_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(10),
                Constraint::Length(banner_height),
                Constraint::Length(1),
            ])
            .split(size);

        let main_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
            .split(vertical_chunks[0]);

        let right_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(12), Constraint::Min(5)])
            .split(main_chunks[1]);

        self.render_canvas(f, main_chunks[0]);
        self.render_status(f, right_chunks[0]);
        self.render_logs(f, right_chunks[1]);
        if self.banner.is_some() {
            self.render_banner(f, vertical_chunks[1]);
        }
        self.render_hints(f, vertical_chunks[2]);
    }

    fn render_canvas(&mut self, f: &mut Frame, area: Rect) {
        let subgraph = self.view.subgraph();
        let title = format!(
            " Graph ({} of {} pages) ",
            subgraph.nodes.len(),
            self.view.snapshot().node_count()
        );
        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(Color::Cyan));

        self.canvas_area = block.inner(area);

        if subgraph.is_empty() {
            let message = match self.state {
                SessionState::Conflicted { .. } => "Crawler busy, waiting to retry...",
                SessionState::Failed(_) => "No graph received",
                _ => "Waiting for pages...",
            };
            let empty = Paragraph::new(message)
                .style(Style::default().fg(Color::DarkGray))
                .block(block);
            f.render_widget(empty, area);
            return;
        }

        render_graph(f, area, block, &self.view, &self.sim, &self.viewport);
    }

    fn state_style(&self) -> (String, Color) {
        let color = match self.state {
            SessionState::Idle => Color::DarkGray,
            SessionState::Requesting | SessionState::Streaming => Color::Yellow,
            SessionState::Conflicted { .. } => Color::Magenta,
            SessionState::Completed => Color::Green,
            SessionState::Failed(_) => Color::Red,
            SessionState::Cancelled => Color::Gray,
        };
        (self.state.to_string(), color)
    }

    fn render_status(&self, f: &mut Frame, area: Rect) {
        let (state, color) = self.state_style();
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Session ")
            .border_style(Style::default().fg(color));
        let inner = block.inner(area);
        f.render_widget(block, area);

        let label = |s: &'static str| Span::styled(s, Style::default().fg(Color::DarkGray));
        let (progress, total) = self.view.progress();
        let params = self.view.params();
        let subgraph = self.view.subgraph();

        let mut text = Vec::new();
        if let Some(ref request) = self.request {
            text.push(Line::from(vec![
                label("Page:     "),
                Span::styled(
                    request.page().replace('_', " "),
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                ),
            ]));
            text.push(Line::from(vec![
                label("Depth:    "),
                Span::raw(format!("{} (max {} pages)", request.depth(), request.max_pages())),
            ]));
        }
        text.push(Line::from(vec![
            label("State:    "),
            Span::styled(state, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        ]));
        text.push(Line::from(vec![
            label("Progress: "),
            Span::styled(
                format!("{}/{}", progress, total),
                Style::default().fg(Color::Yellow),
            ),
        ]));
        text.push(Line::from(vec![
            label("Shown:    "),
            Span::raw(format!(
                "{} nodes, {} edges",
                subgraph.nodes.len(),
                subgraph.edges.len()
            )),
        ]));
        text.push(Line::from(vec![
            label("Filter:   "),
            Span::raw(format!("depth {}, cap {}", params.depth, params.node_cap)),
        ]));
        text.push(Line::from(vec![
            label("Zoom:     "),
            Span::raw(format!("{:.2}x", self.viewport.zoom)),
        ]));
        if let Some(node) = self.view.hovered().and_then(|id| subgraph.node(id)) {
            text.push(Line::from(vec![
                label("Hover:    "),
                Span::styled(
                    format!("{} (depth {})", node.label, node.depth),
                    Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
                ),
            ]));
        }

        let paragraph = Paragraph::new(text).wrap(Wrap { trim: true });
        f.render_widget(paragraph, inner);
    }

    fn render_logs(&self, f: &mut Frame, area: Rect) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Notices ")
            .border_style(Style::default().fg(Color::Magenta));

        let inner = block.inner(area);
        f.render_widget(block, area);

        let height = inner.height as usize;
        let scroll_offset = self.logs.len().saturating_sub(height);

        let items: Vec<ListItem> = self
            .logs
            .iter()
            .skip(scroll_offset)
            .map(|(at, level, message)| {
                let (prefix, style) = match level {
                    NoticeLevel::Info => ("INFO ", Style::default().fg(Color::Blue)),
                    NoticeLevel::Warn => ("WARN ", Style::default().fg(Color::Yellow)),
                    NoticeLevel::Error => ("ERROR", Style::default().fg(Color::Red)),
                };
                ListItem::new(format!("{} [{}] {}", at.format("%H:%M:%S"), prefix, message))
                    .style(style)
            })
            .collect();

        f.render_widget(List::new(items), inner);
    }

    fn render_banner(&self, f: &mut Frame, area: Rect) {
        let Some(ref banner) = self.banner else {
            return;
        };
        let (title, color) = match banner.notice.level {
            NoticeLevel::Error => (" Error (x to dismiss) ", Color::Red),
            NoticeLevel::Warn => (" Warning ", Color::Yellow),
            NoticeLevel::Info => (" Notice ", Color::Blue),
        };
        let paragraph = Paragraph::new(banner.notice.message.clone())
            .style(Style::default().fg(color))
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(title)
                    .border_style(Style::default().fg(color)),
            );
        f.render_widget(paragraph, area);
    }

    fn render_hints(&self, f: &mut Frame, area: Rect) {
        let key_style = Style::default().fg(Color::Black).bg(Color::Gray);
        let key = |k: &'static str| Span::styled(k, key_style);
        let mut spans = vec![key(" q/ESC "), Span::raw(" Exit  ")];
        if self.state.is_live() {
            spans.extend([key(" c "), Span::raw(" Cancel  ")]);
        } else if self.request.is_some() {
            spans.extend([key(" r "), Span::raw(" Restart  ")]);
        }
        spans.extend([
            key(" Tab "),
            Span::raw(" Hover  "),
            key(" Enter "),
            Span::raw(" Open  "),
            key(" +/- "),
            Span::raw(" Zoom  "),
            key(" ←↑↓→ "),
            Span::raw(" Pan  "),
            key(" d "),
            Span::raw(" Depth  "),
            key(" [/] "),
            Span::raw(" Cap"),
        ]);

        let paragraph = Paragraph::new(Line::from(spans))
            .style(Style::default().bg(Color::Black).fg(Color::Gray));
        f.render_widget(paragraph, area);
    }
}

fn event_loop<B: Backend>(terminal: &mut Terminal<B>, monitor: &mut GraphMonitor) -> Result<()> {
    loop {
        let now = Instant::now();
        monitor.process_messages(now);
        monitor.tick(now);

        terminal.draw(|f| monitor.render(f))?;

        if monitor.should_quit() {
            break;
        }

        if event::poll(FRAME_INTERVAL)? {
            match event::read()? {
                Event::Key(key) => monitor.handle_key(key, Instant::now()),
                Event::Mouse(mouse) => monitor.handle_mouse(mouse, Instant::now()),
                _ => {}
            }
        }
    }
    Ok(())
}

/// Run the graph view (blocking function, should be run in separate thread).
///
/// Quitting sends `Shutdown` so the controller tears the session down.
pub fn run_graph_view(
    rx: mpsc::UnboundedReceiver<SessionUpdate>,
    commands: mpsc::UnboundedSender<ControllerCommand>,
    navigator: Box<dyn Navigator>,
    options: MonitorOptions,
) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut monitor = GraphMonitor::new(rx, commands.clone(), navigator, options);
    let result = event_loop(&mut terminal, &mut monitor);

    let _ = commands.send(ControllerCommand::Shutdown);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

/// Create the update and command channels that connect a controller to the view
#[allow(clippy::type_complexity)]
pub fn create_view_channels() -> (
    (mpsc::UnboundedSender<SessionUpdate>, mpsc::UnboundedReceiver<SessionUpdate>),
    (mpsc::UnboundedSender<ControllerCommand>, mpsc::UnboundedReceiver<ControllerCommand>),
) {
    (mpsc::unbounded_channel(), mpsc::unbounded_channel())
}
