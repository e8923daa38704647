//! Terminal viewer: renders the live investigation graph with pan, zoom,
//! selection, and expand/collapse
//!
//! The viewer is a pure consumer of engine snapshots: every keystroke maps
//! to either a viewport/expansion interaction (sent to the session) or a
//! local selection change. It never mutates graph data.

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use inquest_core::{
    EngineConfig, Interaction, Lane, NodeStatus, Payload, RuntimeConfig,
};
use inquest_graph::Snapshot;
use inquest_runtime::{drive, DemoFeed, FeedSource, ScriptFeed, SessionHandle, SessionRegistry};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect, Size},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Line as CanvasLine},
        Block, Borders, Paragraph, Wrap,
    },
    Frame, Terminal,
};
use std::io::{self, Stdout};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::info;

/// Pixels per terminal cell, used to map the abstract layout plane onto
/// character cells.
const CELL_W: f64 = 10.0;
const CELL_H: f64 = 20.0;

const PAN_STEP: f64 = 60.0;
const ZOOM_STEP: f64 = 1.2;

pub struct TuiOptions {
    pub symbol: String,
    pub script: Option<PathBuf>,
    pub frame_delay: Duration,
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

struct App {
    snapshot: Option<Snapshot>,
    /// Index into the snapshot's positions; purely local UI state.
    selected: usize,
    status: String,
    stream_closed: bool,
    should_quit: bool,
}

impl App {
    fn new() -> Self {
        Self {
            snapshot: None,
            selected: 0,
            status: "waiting for investigation stream".to_string(),
            stream_closed: false,
            should_quit: false,
        }
    }

    fn set_snapshot(&mut self, snapshot: Snapshot) {
        if !snapshot.positions.is_empty() {
            self.selected = self.selected.min(snapshot.positions.len() - 1);
        } else {
            self.selected = 0;
        }
        self.snapshot = Some(snapshot);
    }

    fn selected_id(&self) -> Option<inquest_core::NodeId> {
        self.snapshot
            .as_ref()
            .and_then(|s| s.positions.get(self.selected))
            .map(|p| p.node_id.clone())
    }

    fn select_next(&mut self) {
        if let Some(snapshot) = &self.snapshot {
            if !snapshot.positions.is_empty() {
                self.selected = (self.selected + 1) % snapshot.positions.len();
            }
        }
    }

    fn select_prev(&mut self) {
        if let Some(snapshot) = &self.snapshot {
            let len = snapshot.positions.len();
            if len > 0 {
                self.selected = (self.selected + len - 1) % len;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_tui(options: TuiOptions) -> anyhow::Result<()> {
    let registry = SessionRegistry::new(EngineConfig::default(), RuntimeConfig::default());

    // Spawn the playback that stands in for the live backend.
    let handle = match &options.script {
        Some(path) => {
            let feed = ScriptFeed::from_path(path, options.frame_delay)?;
            let handle = registry.open(feed.investigation_id())?;
            spawn_feed(feed, handle.clone());
            handle
        }
        None => {
            let feed = DemoFeed::new(&options.symbol, options.frame_delay);
            let handle = registry.open(feed.investigation_id())?;
            spawn_feed(feed, handle.clone());
            handle
        }
    };

    let snapshot_rx = handle.subscribe();
    handle.request_snapshot().await?;

    let mut terminal = setup_terminal()?;
    let result = run_loop(&mut terminal, &handle, snapshot_rx).await;
    restore_terminal(&mut terminal)?;
    result
}

fn spawn_feed<S: FeedSource + 'static>(feed: S, handle: SessionHandle) {
    tokio::spawn(async move {
        if let Err(e) = drive(feed, &handle).await {
            info!("playback stopped early: {}", e);
        }
    });
}

fn setup_terminal() -> anyhow::Result<Terminal<CrosstermBackend<Stdout>>> {
    terminal::enable_raw_mode()?;
    io::stdout().execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(io::stdout());
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
    terminal::disable_raw_mode()?;
    io::stdout().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    handle: &SessionHandle,
    mut snapshot_rx: broadcast::Receiver<Snapshot>,
) -> anyhow::Result<()> {
    let mut app = App::new();

    loop {
        terminal.draw(|f| draw(f, &app))?;

        // Short poll keeps the loop responsive to both keys and snapshots.
        if event::poll(Duration::from_millis(33))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    handle_key(key, &mut app, handle, terminal.size()?);
                }
            }
        }
        if app.should_quit {
            break;
        }

        loop {
            match snapshot_rx.try_recv() {
                Ok(snapshot) => {
                    app.status = describe(&snapshot);
                    app.set_snapshot(snapshot);
                }
                Err(broadcast::error::TryRecvError::Empty) => break,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    // The next snapshot supersedes everything missed.
                    app.status = format!("viewer lagged, skipped {n} revisions");
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    if !app.stream_closed {
                        app.status = "session closed — last state shown".to_string();
                        app.stream_closed = true;
                    }
                    break;
                }
            }
        }
    }
    Ok(())
}

fn describe(snapshot: &Snapshot) -> String {
    let c = snapshot.status_counts;
    let mut status = format!(
        "rev {} — {} nodes ({} done, {} running, {} pending, {} error)",
        snapshot.revision,
        snapshot.nodes.len(),
        c.completed,
        c.in_progress,
        c.pending,
        c.error
    );
    if let Some(diag) = snapshot.diagnostics.last() {
        status.push_str(&format!(" — {diag}"));
    }
    if snapshot.terminated {
        status.push_str(" — stream ended");
    }
    status
}

fn handle_key(key: KeyEvent, app: &mut App, handle: &SessionHandle, size: Size) {
    // Interactions are fire-and-forget: one that fails because the loop is
    // gone changes nothing, and the last snapshot stays browsable.
    let send = |interaction: Interaction| {
        let handle = handle.clone();
        tokio::spawn(async move {
            let _ = handle.interact(interaction).await;
        });
    };

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.should_quit = true;
        }

        KeyCode::Left | KeyCode::Char('h') => send(Interaction::Pan {
            dx: PAN_STEP,
            dy: 0.0,
        }),
        KeyCode::Right | KeyCode::Char('l') => send(Interaction::Pan {
            dx: -PAN_STEP,
            dy: 0.0,
        }),
        KeyCode::Up | KeyCode::Char('k') => send(Interaction::Pan {
            dx: 0.0,
            dy: PAN_STEP / 2.0,
        }),
        KeyCode::Down | KeyCode::Char('j') => send(Interaction::Pan {
            dx: 0.0,
            dy: -PAN_STEP / 2.0,
        }),

        KeyCode::Char('+') | KeyCode::Char('=') => send(Interaction::Zoom {
            factor: ZOOM_STEP,
            focal: Some(view_center(size)),
        }),
        KeyCode::Char('-') => send(Interaction::Zoom {
            factor: 1.0 / ZOOM_STEP,
            focal: Some(view_center(size)),
        }),

        KeyCode::Tab => app.select_next(),
        KeyCode::BackTab => app.select_prev(),

        KeyCode::Enter | KeyCode::Char(' ') => {
            if let Some(id) = app.selected_id() {
                send(Interaction::ToggleExpand { id });
            }
        }

        KeyCode::Char('r') => send(Interaction::ResetView),
        KeyCode::Char('R') => {
            let handle = handle.clone();
            tokio::spawn(async move {
                let _ = handle.reset().await;
            });
        }
        _ => {}
    }
}

/// Focal point for keyboard zoom: the middle of the graph pane, in the
/// abstract pixel space the viewport works in.
fn view_center(size: Size) -> (f64, f64) {
    let graph_cols = f64::from(size.width) * 0.7;
    (
        graph_cols * CELL_W / 2.0,
        f64::from(size.height) * CELL_H / 2.0,
    )
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn draw(f: &mut Frame, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(3)])
        .split(f.area());
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
        .split(rows[0]);

    draw_graph(f, cols[0], app);
    draw_details(f, cols[1], app);
    draw_footer(f, rows[1], app);
}

fn status_color(status: NodeStatus) -> Color {
    match status {
        NodeStatus::Pending => Color::DarkGray,
        NodeStatus::InProgress => Color::Yellow,
        NodeStatus::Completed => Color::Green,
        NodeStatus::Error => Color::Red,
    }
}

fn status_label(status: NodeStatus) -> &'static str {
    match status {
        NodeStatus::Pending => "pending",
        NodeStatus::InProgress => "in progress",
        NodeStatus::Completed => "completed",
        NodeStatus::Error => "error",
    }
}

fn lane_marker(lane: &Lane) -> &'static str {
    match lane {
        Lane::Main => "●",
        Lane::Thematic(_) => "◆",
        Lane::Validation => "▣",
        Lane::Final => "★",
    }
}

fn draw_graph(f: &mut Frame, area: Rect, app: &App) {
    let title = match app.snapshot.as_ref().and_then(|s| s.investigation_id.clone()) {
        Some(id) => format!(" investigation {id} "),
        None => " investigation ".to_string(),
    };
    let block = Block::default().borders(Borders::ALL).title(title);

    let Some(snapshot) = &app.snapshot else {
        f.render_widget(
            Paragraph::new("waiting for the first node to arrive...").block(block),
            area,
        );
        return;
    };

    let view = snapshot.view;
    let width_px = f64::from(area.width) * CELL_W;
    let height_px = f64::from(area.height) * CELL_H;
    // Visible world-rectangle under the current transform
    // (`screen = world * scale + translate`).
    let wx_min = (0.0 - view.translate_x) / view.scale;
    let wx_max = (width_px - view.translate_x) / view.scale;
    let wy_min = (0.0 - view.translate_y) / view.scale;
    let wy_max = (height_px - view.translate_y) / view.scale;

    let selected = app.selected;
    let canvas = Canvas::default()
        .block(block)
        .marker(Marker::Braille)
        .x_bounds([wx_min, wx_max])
        // Canvas y grows upward; the layout plane grows downward.
        .y_bounds([-wy_max, -wy_min])
        .paint(move |ctx| {
            for edge in &snapshot.edges {
                let (Some(from), Some(to)) = (
                    snapshot.position_of(&edge.from),
                    snapshot.position_of(&edge.to),
                ) else {
                    continue;
                };
                let color = match edge.kind {
                    inquest_core::EdgeKind::Structural => Color::Gray,
                    inquest_core::EdgeKind::CrossRef => Color::Magenta,
                };
                ctx.draw(&CanvasLine {
                    x1: from.x,
                    y1: -from.y,
                    x2: to.x,
                    y2: -to.y,
                    color,
                });
            }

            for (index, position) in snapshot.positions.iter().enumerate() {
                let Some(node) = snapshot.node(&position.node_id) else {
                    continue;
                };
                let expanded = snapshot.expanded.contains(&position.node_id);
                let mut style = Style::default().fg(status_color(node.status));
                if index == selected {
                    style = style.add_modifier(Modifier::REVERSED | Modifier::BOLD);
                }
                let marker = if expanded { "▾" } else { lane_marker(&position.lane) };
                let label = format!("{marker} {}", truncate(&node.label, 22));
                ctx.print(position.x, -position.y, Line::from(Span::styled(label, style)));

                if expanded {
                    // Grow in place: the summary rides just under the node
                    // and shifts nothing else.
                    for (row, line) in payload_summary(&node.payload, 3).into_iter().enumerate() {
                        ctx.print(
                            position.x,
                            -(position.y + (row as f64 + 1.0) * CELL_H / view.scale),
                            Line::from(Span::styled(
                                truncate(&line, 30),
                                Style::default().fg(Color::DarkGray),
                            )),
                        );
                    }
                }
            }
        });
    f.render_widget(canvas, area);
}

fn draw_details(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default().borders(Borders::ALL).title(" node ");
    let Some(snapshot) = &app.snapshot else {
        f.render_widget(Paragraph::new("").block(block), area);
        return;
    };
    let Some(position) = snapshot.positions.get(app.selected) else {
        f.render_widget(Paragraph::new("no node selected").block(block), area);
        return;
    };
    let Some(node) = snapshot.node(&position.node_id) else {
        return;
    };
    let expanded = snapshot.expanded.contains(&node.id);

    let mut lines = vec![
        Line::from(Span::styled(
            node.label.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            Span::raw(format!("{} · ", node.kind.label())),
            Span::styled(
                status_label(node.status),
                Style::default().fg(status_color(node.status)),
            ),
            Span::raw(format!(" · lane {} · level {}", position.lane, position.level)),
        ]),
        Line::from(""),
    ];
    if !node.description.is_empty() {
        lines.push(Line::from(node.description.clone()));
        lines.push(Line::from(""));
    }

    let limit = if expanded { usize::MAX } else { 4 };
    for entry in payload_summary(&node.payload, limit) {
        lines.push(Line::from(entry));
    }
    if !expanded {
        lines.push(Line::from(Span::styled(
            "(enter to expand)",
            Style::default().fg(Color::DarkGray),
        )));
    }

    f.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

fn draw_footer(f: &mut Frame, area: Rect, app: &App) {
    let help = "q quit · arrows pan · +/- zoom · tab select · enter expand · r view · R reset";
    let lines = vec![
        Line::from(app.status.clone()),
        Line::from(Span::styled(help, Style::default().fg(Color::DarkGray))),
    ];
    f.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::TOP)),
        area,
    );
}

/// Key/value listing of a payload, truncated to `limit` entries. Works for
/// every payload shape, typed or opaque.
fn payload_summary(payload: &Payload, limit: usize) -> Vec<String> {
    let fields = payload.fields();
    let total = fields.len();
    let mut lines: Vec<String> = fields
        .into_iter()
        .take(limit)
        .map(|(key, value)| format!("{key}: {value}"))
        .collect();
    if total > lines.len() {
        lines.push(format!("… {} more", total - lines.len()));
    }
    lines
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a long label indeed", 8), "a long …");
    }

    #[test]
    fn payload_summary_caps_entries() {
        let (payload, _) = Payload::decode(
            inquest_core::NodeKind::Spawn,
            &json!({"a": 1, "b": 2, "c": 3, "d": 4}),
        );
        let lines = payload_summary(&payload, 2);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "… 2 more");
    }
}
