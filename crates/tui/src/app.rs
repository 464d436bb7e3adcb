use std::{io, thread, time::Duration};

use anyhow::{Context, Result};
use chrono::Local;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Circle, Context as CanvasContext, Line as CanvasLine, Points},
        Block, Borders, Paragraph, Wrap,
    },
    Frame, Terminal,
};
use tokio::{spawn, sync::mpsc};
use tracing::{debug, error, info};
use ttr_planner_core::{
    board::{
        calibration,
        scene::{
            BLOCKED_COLOR, CALIBRATION_COLOR, CITY_MARKER_RADIUS, CITY_STROKE,
            TERMINAL_MARKER_RADIUS,
        },
        CalibrationPhase, MapExtent, Primitive, Rgb, SegmentStyle, StrokeKind, TicketItem,
        Viewport,
    },
    ApiError, AppConfig, BoardController, ClickOutcome, GameData, GameDataStore,
    InteractionMode, Point, SolutionSet, SolveOutcome, SolverClient,
};

const TICK_RATE: Duration = Duration::from_millis(250);
const SIDEBAR_WIDTH: u16 = 38;
const RESULTS_HEIGHT: u16 = 12;
const BLOCKED_HEIGHT: u16 = 8;
const STATUS_HEIGHT: u16 = 5;

#[derive(Debug, Clone)]
struct Theme {
    primary_fg: Color,
    accent: Color,
    accent_alt: Color,
    muted: Color,
    selection_bg: Color,
    selection_fg: Color,
    success: Color,
    track: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary_fg: Color::White,
            accent: Color::Cyan,
            accent_alt: Color::Blue,
            muted: Color::DarkGray,
            selection_bg: Color::DarkGray,
            selection_fg: Color::White,
            success: Color::Green,
            track: Color::Rgb(0x3a, 0x44, 0x5c),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Tickets,
    Blocked,
}

impl Focus {
    fn toggle(self) -> Self {
        match self {
            Focus::Tickets => Focus::Blocked,
            Focus::Blocked => Focus::Tickets,
        }
    }
}

enum AppEvent {
    Input(Event),
    Tick,
    DataLoaded(Result<GameData, ApiError>),
    Solved {
        seq: u64,
        result: Result<SolutionSet, ApiError>,
    },
}

/// Terminal front-end for the route planner.
pub struct PlannerApp {
    config: AppConfig,
    client: SolverClient,
    store: GameDataStore,
    board: BoardController,
    state: UiState,
    theme: Theme,
    viewport: Option<Viewport>,
    event_tx: Option<mpsc::Sender<AppEvent>>,
}

impl PlannerApp {
    pub fn new(
        config: AppConfig,
        client: SolverClient,
        store: GameDataStore,
        board: BoardController,
    ) -> Self {
        Self {
            config,
            client,
            store,
            board,
            state: UiState::default(),
            theme: Theme::default(),
            viewport: None,
            event_tx: None,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enter raw mode")?;
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
            .context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;
        terminal.hide_cursor()?;
        terminal.clear()?;

        let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(128);
        spawn_input_thread(event_tx.clone());
        self.event_tx = Some(event_tx);
        self.load_game_data();

        loop {
            terminal.draw(|frame| self.draw(frame))?;
            if self.state.should_quit {
                break;
            }

            let maybe_event = event_rx.recv().await;
            if !self.process_app_event(maybe_event) {
                break;
            }

            if self.state.should_quit {
                break;
            }
        }

        restore_terminal(&mut terminal)?;
        self.event_tx = None;
        Ok(())
    }

    fn load_game_data(&mut self) {
        let Some(sender) = self.event_tx.clone() else {
            return;
        };
        let client = self.client.clone();
        self.state.loading = true;
        self.state
            .set_status(format!("Loading game data from {}…", self.config.server_url));
        spawn(async move {
            let result = client.fetch_game_data().await;
            if sender.send(AppEvent::DataLoaded(result)).await.is_err() {
                debug!("App closed before game data arrived");
            }
        });
    }

    fn process_app_event(&mut self, maybe_event: Option<AppEvent>) -> bool {
        match maybe_event {
            Some(AppEvent::Input(event)) => {
                if let Err(err) = self.handle_input(event) {
                    self.state.set_status(format!("Error: {err}"));
                }
                true
            }
            Some(AppEvent::Tick) => true,
            Some(AppEvent::DataLoaded(result)) => {
                self.handle_data_loaded(result);
                true
            }
            Some(AppEvent::Solved { seq, result }) => {
                self.handle_solved(seq, result);
                true
            }
            None => false,
        }
    }

    fn handle_data_loaded(&mut self, result: Result<GameData, ApiError>) {
        self.state.loading = false;
        match result {
            Ok(data) => {
                let tickets = data.tickets().len();
                let segments = data.segments().len();
                let cities = data.cities().len();
                self.store.install(data);
                self.board.init();
                self.state.ticket_cursor = 0;
                self.state.blocked_cursor = 0;
                info!(tickets, segments, cities, "Game data ready");
                self.state.set_status(format!(
                    "Loaded {cities} cities, {segments} segments and {tickets} tickets"
                ));
            }
            Err(err) => {
                error!(%err, "Failed to load game data");
                self.state
                    .set_status(format!("Failed to load game data: {err} (r to retry)"));
            }
        }
    }

    fn handle_solved(&mut self, seq: u64, result: Result<SolutionSet, ApiError>) {
        if self.state.solving_seq == Some(seq) {
            self.state.solving_seq = None;
        }
        match self.board.finish_solve(seq, result) {
            SolveOutcome::Installed { alternatives: 0 } => {
                self.state.set_status("Solver found no route for these tickets");
            }
            SolveOutcome::Installed { alternatives } => {
                self.state
                    .set_status(format!("Found {alternatives} alternative(s)"));
            }
            SolveOutcome::Stale => {
                debug!(seq, "Ignoring superseded solve response");
            }
            SolveOutcome::Failed(err) => {
                error!(%err, "Solve request failed");
                self.state.set_status(format!("Solve failed: {err}"));
            }
        }
    }

    fn handle_input(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key),
            Event::Mouse(mouse) => {
                self.handle_mouse(mouse);
                Ok(())
            }
            // The viewport is recomputed from the new area on the next draw.
            _ => Ok(()),
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.state.should_quit = true;
            return Ok(());
        }
        match self.board.mode() {
            InteractionMode::Normal => self.handle_normal_key(key),
            InteractionMode::Calibrating => self.handle_calibration_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.state.should_quit = true,
            KeyCode::Tab | KeyCode::BackTab => self.state.focus = self.state.focus.toggle(),
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(-1),
            KeyCode::Char(' ') | KeyCode::Enter => self.activate_focused()?,
            KeyCode::Char('s') => self.request_solve()?,
            KeyCode::Char('c') => {
                self.board.clear()?;
                self.state.ticket_cursor = 0;
                self.state.blocked_cursor = 0;
                self.state.set_status("Selections cleared");
            }
            KeyCode::Left | KeyCode::Char('h') => self.cycle_alternative(-1)?,
            KeyCode::Right | KeyCode::Char('l') => self.cycle_alternative(1)?,
            KeyCode::Char(digit @ '1'..='9') => {
                let index = digit as usize - '1' as usize;
                self.show_alternative(index)?;
            }
            KeyCode::Char('K') => self.start_calibration()?,
            KeyCode::Char('r') if !self.board.is_loaded() && !self.state.loading => {
                self.load_game_data();
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_calibration_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Char('q') => self.state.should_quit = true,
            KeyCode::Esc => {
                let state = self.board.end_calibration()?;
                self.state.set_status(format!(
                    "Calibration ended with {}/{} cities captured",
                    state.cursor(),
                    state.total()
                ));
            }
            KeyCode::Char('u') | KeyCode::Backspace => match self.board.undo_calibration() {
                Some(city) => self.state.set_status(format!("Removed capture for {city}")),
                None => self.state.set_status("Nothing to undo"),
            },
            KeyCode::Char('y') => self.export_calibration()?,
            _ => {}
        }
        Ok(())
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        let Some(viewport) = self.viewport else {
            return;
        };
        let Some(at) = viewport.cell_to_map(mouse.column, mouse.row) else {
            if mouse.kind == MouseEventKind::Moved {
                self.state.hover = None;
            }
            return;
        };
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                match self.board.click(at, viewport.tolerance()) {
                    ClickOutcome::SegmentToggled { index, blocked } => {
                        let label = self.segment_label(index);
                        let verb = if blocked { "Blocked" } else { "Unblocked" };
                        self.state.set_status(format!("{verb} {label}"));
                        self.clamp_cursors();
                    }
                    ClickOutcome::Captured { city, complete } => {
                        let message = if complete {
                            format!("Captured {city}; all cities done, press y to export")
                        } else {
                            format!("Captured {city}")
                        };
                        self.state.set_status(message);
                    }
                    ClickOutcome::Ignored => {}
                }
            }
            MouseEventKind::Moved => {
                self.state.hover = self.board.hover(at, viewport.tolerance());
            }
            _ => {}
        }
    }

    fn move_cursor(&mut self, delta: isize) {
        match self.state.focus {
            Focus::Tickets => {
                let len = self.ticket_rows().len();
                self.state.ticket_cursor = step_cursor(self.state.ticket_cursor, delta, len);
            }
            Focus::Blocked => {
                let len = self.board.selection().blocked().len();
                self.state.blocked_cursor = step_cursor(self.state.blocked_cursor, delta, len);
            }
        }
    }

    fn clamp_cursors(&mut self) {
        let tickets = self.ticket_rows().len();
        let blocked = self.board.selection().blocked().len();
        self.state.ticket_cursor = step_cursor(self.state.ticket_cursor, 0, tickets);
        self.state.blocked_cursor = step_cursor(self.state.blocked_cursor, 0, blocked);
    }

    /// Long tickets first, then short, matching the panel layout.
    fn ticket_rows(&self) -> Vec<TicketItem> {
        let groups = self.board.ticket_groups();
        groups.long.into_iter().chain(groups.short).collect()
    }

    fn activate_focused(&mut self) -> Result<()> {
        match self.state.focus {
            Focus::Tickets => {
                let rows = self.ticket_rows();
                let Some(item) = rows.get(self.state.ticket_cursor) else {
                    return Ok(());
                };
                let selected = self.board.toggle_ticket(item.index)?;
                let verb = if selected { "Selected" } else { "Deselected" };
                self.state.set_status(format!(
                    "{verb} {} → {} ({} pts)",
                    item.from, item.to, item.points
                ));
            }
            Focus::Blocked => {
                if self.board.selection().blocked().is_empty() {
                    return Ok(());
                }
                let removed = self.board.remove_blocked_at(self.state.blocked_cursor)?;
                self.clamp_cursors();
                self.state
                    .set_status(format!("Unblocked {} → {}", removed.from, removed.to));
            }
        }
        Ok(())
    }

    fn request_solve(&mut self) -> Result<()> {
        let pending = self.board.begin_solve(self.client.num_alternatives())?;
        let Some(sender) = self.event_tx.clone() else {
            return Ok(());
        };
        let client = self.client.clone();
        self.state.solving_seq = Some(pending.seq);
        self.state.set_status(format!(
            "Solving for {} ticket(s)…",
            pending.request.tickets.len()
        ));
        spawn(async move {
            let result = client.solve(&pending.request).await;
            let event = AppEvent::Solved {
                seq: pending.seq,
                result,
            };
            if sender.send(event).await.is_err() {
                debug!(seq = pending.seq, "App closed before solve finished");
            }
        });
        Ok(())
    }

    fn cycle_alternative(&mut self, delta: isize) -> Result<()> {
        let count = self.board.solution_tabs().len();
        if count == 0 {
            return Ok(());
        }
        let current = self.board.selection().active_alternative() as isize;
        let next = (current + delta).rem_euclid(count as isize) as usize;
        self.show_alternative(next)
    }

    fn show_alternative(&mut self, index: usize) -> Result<()> {
        self.board.select_alternative(index)?;
        if let Some(details) = self.board.solution_details() {
            self.state.set_status(format!("Showing {}", details.label));
        }
        Ok(())
    }

    fn start_calibration(&mut self) -> Result<()> {
        let total = self.board.start_calibration()?;
        self.state.hover = None;
        self.state.set_status(format!(
            "Calibrating {total} cities: click each one on the map"
        ));
        Ok(())
    }

    fn export_calibration(&mut self) -> Result<()> {
        let Some(table) = self.board.calibration_table() else {
            self.state
                .set_status("Capture every city before exporting the table");
            return Ok(());
        };
        let path = calibration::write_export(&self.config.export_dir, &table)?;
        self.state
            .set_status(format!("Coordinates written to {}", path.display()));
        Ok(())
    }

    fn segment_label(&self, index: usize) -> String {
        self.store
            .snapshot()
            .and_then(|data| {
                data.segment(index)
                    .map(|segment| format!("{} → {}", segment.from, segment.to))
            })
            .unwrap_or_else(|| format!("segment #{index}"))
    }

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.size();
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(20)])
            .split(area);

        let show_results =
            self.board.selection_ui_visible() && self.board.selection().solution().is_some();
        let right_constraints = if show_results {
            vec![Constraint::Min(8), Constraint::Length(RESULTS_HEIGHT)]
        } else {
            vec![Constraint::Min(8)]
        };
        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints(right_constraints)
            .split(columns[1]);
        self.render_map(frame, right[0]);
        if show_results {
            self.render_results(frame, right[1]);
        }

        if self.board.selection_ui_visible() {
            let left = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Min(6),
                    Constraint::Length(BLOCKED_HEIGHT),
                    Constraint::Length(STATUS_HEIGHT),
                ])
                .split(columns[0]);
            self.render_tickets(frame, left[0]);
            self.render_blocked(frame, left[1]);
            self.render_status(frame, left[2]);
        } else {
            let left = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(6), Constraint::Length(STATUS_HEIGHT)])
                .split(columns[0]);
            self.render_calibration(frame, left[0]);
            self.render_status(frame, left[1]);
        }
    }

    fn panel_block(&self, title: String, focused: bool) -> Block<'static> {
        let border = if focused {
            Style::default().fg(self.theme.accent)
        } else {
            Style::default().fg(self.theme.muted)
        };
        Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title(title)
    }

    fn render_map(&mut self, frame: &mut Frame, area: Rect) {
        let title = match self.board.mode() {
            InteractionMode::Normal => "Map".to_string(),
            InteractionMode::Calibrating => "Map (calibrating)".to_string(),
        };
        let block = self.panel_block(title, false);
        let inner = block.inner(area);

        let Some(extent) = self.board.map_extent() else {
            self.viewport = None;
            let message = if self.state.loading {
                "Loading game data…"
            } else {
                "No game data loaded (r to retry)"
            };
            let paragraph = Paragraph::new(vec![Line::from(message)])
                .block(block)
                .alignment(Alignment::Center);
            frame.render_widget(paragraph, area);
            return;
        };

        let viewport = Viewport::new(inner.x, inner.y, inner.width, inner.height, extent);
        self.board.fit_to_viewport(&viewport);
        self.viewport = Some(viewport);
        // Braille packs two dots per column, used to thicken glow strokes.
        let dot = extent.width() / (f64::from(inner.width.max(1)) * 2.0);

        let interaction = self.board.interaction_layer();
        let solution = self.board.solution_layer();
        let theme = &self.theme;
        let canvas = Canvas::default()
            .block(block)
            .marker(Marker::Braille)
            .x_bounds([extent.min.x, extent.max.x])
            .y_bounds([extent.min.y, extent.max.y])
            .paint(|ctx| {
                paint_primitives(ctx, interaction.primitives(), extent, dot, theme);
                ctx.layer();
                paint_primitives(ctx, solution.primitives(), extent, dot, theme);
            });
        frame.render_widget(canvas, area);
    }

    fn render_tickets(&self, frame: &mut Frame, area: Rect) {
        let groups = self.board.ticket_groups();
        let focused = self.state.focus == Focus::Tickets;
        let selected = self.board.selection().selected_tickets().len();

        let mut lines = Vec::new();
        let mut cursor_line = 0;
        let mut row = 0;
        for (heading, items) in [("Long routes", &groups.long), ("Short routes", &groups.short)] {
            if items.is_empty() {
                continue;
            }
            lines.push(Line::from(Span::styled(
                heading,
                Style::default()
                    .fg(self.theme.accent_alt)
                    .add_modifier(Modifier::BOLD),
            )));
            for item in items {
                let at_cursor = row == self.state.ticket_cursor;
                if at_cursor {
                    cursor_line = lines.len();
                }
                lines.push(self.ticket_line(item, focused && at_cursor));
                row += 1;
            }
        }
        if lines.is_empty() {
            lines.push(Line::from(Span::styled(
                "No tickets",
                Style::default().fg(self.theme.muted),
            )));
        }

        let visible = area.height.saturating_sub(2) as usize;
        let offset = scroll_offset(cursor_line, visible);
        let block = self.panel_block(format!("Tickets ({selected} selected)"), focused);
        let paragraph = Paragraph::new(lines)
            .block(block)
            .scroll((offset as u16, 0));
        frame.render_widget(paragraph, area);
    }

    fn ticket_line(&self, item: &TicketItem, highlighted: bool) -> Line<'static> {
        let mark = if item.selected { "[x]" } else { "[ ]" };
        let mut style = Style::default().fg(self.theme.primary_fg);
        if item.selected {
            style = style.fg(self.theme.success);
        }
        if highlighted {
            style = style
                .bg(self.theme.selection_bg)
                .fg(self.theme.selection_fg)
                .add_modifier(Modifier::BOLD);
        }
        Line::from(vec![
            Span::styled(format!("{mark} {} → {}", item.from, item.to), style),
            Span::styled(
                format!("  {}", item.points),
                Style::default().fg(self.theme.muted),
            ),
        ])
    }

    fn render_blocked(&self, frame: &mut Frame, area: Rect) {
        let focused = self.state.focus == Focus::Blocked;
        let blocked = self.board.selection().blocked();
        let blocked_style = Style::default().fg(to_color(BLOCKED_COLOR));

        let lines: Vec<Line> = if blocked.is_empty() {
            vec![Line::from(Span::styled(
                "Click a track to block it",
                Style::default().fg(self.theme.muted),
            ))]
        } else {
            blocked
                .iter()
                .enumerate()
                .map(|(position, entry)| {
                    let style = if focused && position == self.state.blocked_cursor {
                        blocked_style
                            .bg(self.theme.selection_bg)
                            .add_modifier(Modifier::BOLD)
                    } else {
                        blocked_style
                    };
                    Line::from(Span::styled(
                        format!("✕ {} ↔ {}", entry.from, entry.to),
                        style,
                    ))
                })
                .collect()
        };

        let visible = area.height.saturating_sub(2) as usize;
        let offset = scroll_offset(self.state.blocked_cursor, visible);
        let block = self.panel_block(format!("Blocked ({})", blocked.len()), focused);
        let paragraph = Paragraph::new(lines)
            .block(block)
            .scroll((offset as u16, 0));
        frame.render_widget(paragraph, area);
    }

    fn render_results(&self, frame: &mut Frame, area: Rect) {
        let mut tab_spans = Vec::new();
        for (i, tab) in self.board.solution_tabs().iter().enumerate() {
            let color = to_color(tab.color);
            let style = if tab.active {
                Style::default()
                    .fg(Color::Black)
                    .bg(color)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(color)
            };
            tab_spans.push(Span::styled(format!(" {} {} ", i + 1, tab.label), style));
            tab_spans.push(Span::raw(" "));
        }

        let mut lines = vec![Line::from(tab_spans)];
        match self.board.solution_details() {
            Some(details) => {
                lines.push(Line::from(vec![
                    Span::raw(format!(
                        "Cars {}  Route pts {}  Ticket pts {}  ",
                        details.total_cars, details.route_points, details.ticket_points
                    )),
                    Span::styled(
                        format!("Total {}", details.grand_total),
                        Style::default()
                            .fg(self.theme.success)
                            .add_modifier(Modifier::BOLD),
                    ),
                ]));
                for edge in &details.edges {
                    lines.push(Line::from(vec![
                        Span::styled("■ ", Style::default().fg(to_color(edge.color))),
                        Span::raw(format!("{} → {}", edge.from, edge.to)),
                        Span::styled(
                            format!("  {}", edge.info()),
                            Style::default().fg(self.theme.muted),
                        ),
                    ]));
                }
            }
            None => lines.push(Line::from(Span::styled(
                "The solver returned no alternatives",
                Style::default().fg(self.theme.muted),
            ))),
        }

        let paragraph = Paragraph::new(lines)
            .block(self.panel_block("Results".to_string(), false))
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
    }

    fn render_calibration(&self, frame: &mut Frame, area: Rect) {
        let mut lines = Vec::new();
        if let Some(state) = self.board.calibration().state() {
            match (state.phase(), state.current_city()) {
                (CalibrationPhase::Walking, Some(city)) => {
                    lines.push(Line::from(vec![
                        Span::raw("Click "),
                        Span::styled(
                            city.to_string(),
                            Style::default()
                                .fg(to_color(CALIBRATION_COLOR))
                                .add_modifier(Modifier::BOLD),
                        ),
                    ]));
                    lines.push(Line::from(format!(
                        "{}/{} captured",
                        state.cursor(),
                        state.total()
                    )));
                }
                _ => {
                    lines.push(Line::from(Span::styled(
                        "All cities captured",
                        Style::default().fg(self.theme.success),
                    )));
                    lines.push(Line::from("Press y to export the table"));
                }
            }
            lines.push(Line::from(""));
            let entries: Vec<_> = state.entries().collect();
            for (name, (x, y)) in entries.into_iter().rev() {
                lines.push(Line::from(Span::styled(
                    format!("{name:<20} {x:>5} {y:>5}"),
                    Style::default().fg(self.theme.muted),
                )));
            }
        }
        let paragraph =
            Paragraph::new(lines).block(self.panel_block("Calibration".to_string(), true));
        frame.render_widget(paragraph, area);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let secondary = match (&self.state.hover, self.board.mode()) {
            (Some(city), _) => Line::from(vec![
                Span::raw("City: "),
                Span::styled(city.clone(), Style::default().fg(self.theme.accent)),
            ]),
            (None, InteractionMode::Normal) if self.state.solving_seq.is_some() => {
                Line::from(Span::styled("Solving…", Style::default().fg(self.theme.accent)))
            }
            (None, InteractionMode::Normal) => Line::from(Span::styled(
                "Tab focus · Space toggle · s solve · c clear · 1-9 alt · K calibrate · q quit",
                Style::default().fg(self.theme.muted),
            )),
            (None, InteractionMode::Calibrating) => Line::from(Span::styled(
                "click city · u undo · y export · Esc exit",
                Style::default().fg(self.theme.muted),
            )),
        };
        let paragraph = Paragraph::new(vec![Line::from(self.state.status.clone()), secondary])
            .block(self.panel_block("Status".to_string(), false))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }
}

fn paint_primitives(
    ctx: &mut CanvasContext,
    primitives: &[Primitive],
    extent: MapExtent,
    dot: f64,
    theme: &Theme,
) {
    for primitive in primitives {
        match primitive {
            Primitive::Segment { from, to, style, .. } => {
                let color = match style {
                    SegmentStyle::Transparent => theme.track,
                    SegmentStyle::Blocked => to_color(BLOCKED_COLOR),
                };
                draw_line(ctx, extent, *from, *to, color);
            }
            Primitive::CityMarker { name, at, terminal } => {
                let (x, y) = canvas_point(extent, *at);
                if *terminal {
                    ctx.draw(&Circle {
                        x,
                        y,
                        radius: CITY_MARKER_RADIUS.max(dot),
                        color: theme.accent,
                    });
                    ctx.print(
                        x,
                        y,
                        Span::styled(
                            name.clone(),
                            Style::default()
                                .fg(theme.accent)
                                .add_modifier(Modifier::BOLD),
                        ),
                    );
                } else {
                    ctx.draw(&Points {
                        coords: &[(x, y)],
                        color: to_color(CITY_STROKE),
                    });
                }
            }
            Primitive::Stroke {
                kind,
                from,
                to,
                color,
                opacity,
                ..
            } => match kind {
                StrokeKind::Glow => {
                    let glow = dim(*color, *opacity);
                    for offset in [-dot, dot] {
                        let (a, b) = shifted(*from, *to, offset);
                        draw_line(ctx, extent, a, b, glow);
                    }
                }
                StrokeKind::Solid => draw_line(ctx, extent, *from, *to, to_color(*color)),
            },
            Primitive::TerminalMarker { at, color, .. } => {
                let (x, y) = canvas_point(extent, *at);
                ctx.draw(&Circle {
                    x,
                    y,
                    radius: TERMINAL_MARKER_RADIUS.max(dot * 2.0),
                    color: to_color(*color),
                });
            }
            Primitive::CalibrationMarker { at, .. } => {
                let (x, y) = canvas_point(extent, *at);
                ctx.draw(&Circle {
                    x,
                    y,
                    radius: CITY_MARKER_RADIUS.max(dot),
                    color: to_color(CALIBRATION_COLOR),
                });
            }
            Primitive::CalibrationLabel { city, at } => {
                let (x, y) = canvas_point(extent, *at);
                ctx.print(
                    x,
                    y,
                    Span::styled(
                        city.clone(),
                        Style::default().fg(to_color(CALIBRATION_COLOR)),
                    ),
                );
            }
        }
    }
}

fn draw_line(ctx: &mut CanvasContext, extent: MapExtent, from: Point, to: Point, color: Color) {
    let (x1, y1) = canvas_point(extent, from);
    let (x2, y2) = canvas_point(extent, to);
    ctx.draw(&CanvasLine {
        x1,
        y1,
        x2,
        y2,
        color,
    });
}

/// Map coordinates grow downwards, canvas coordinates upwards.
fn canvas_point(extent: MapExtent, at: Point) -> (f64, f64) {
    (at.x, extent.min.y + extent.max.y - at.y)
}

/// Move a segment sideways by `offset` along its unit normal.
fn shifted(from: Point, to: Point, offset: f64) -> (Point, Point) {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let len = (dx * dx + dy * dy).sqrt();
    if len == 0.0 {
        return (from, to);
    }
    let nx = -dy / len * offset;
    let ny = dx / len * offset;
    (
        Point::new(from.x + nx, from.y + ny),
        Point::new(to.x + nx, to.y + ny),
    )
}

fn to_color(Rgb(r, g, b): Rgb) -> Color {
    Color::Rgb(r, g, b)
}

/// Blend towards black to fake opacity on a dark background.
fn dim(Rgb(r, g, b): Rgb, opacity: f64) -> Color {
    let scale = |channel: u8| (f64::from(channel) * opacity.clamp(0.0, 1.0)).round() as u8;
    Color::Rgb(scale(r), scale(g), scale(b))
}

fn step_cursor(cursor: usize, delta: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    (cursor as isize + delta).clamp(0, len as isize - 1) as usize
}

fn scroll_offset(cursor_line: usize, visible: usize) -> usize {
    if visible == 0 {
        return 0;
    }
    cursor_line.saturating_sub(visible - 1)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_input_thread(sender: mpsc::Sender<AppEvent>) {
    thread::spawn(move || loop {
        match event::poll(TICK_RATE) {
            Ok(true) => match event::read() {
                Ok(evt) => {
                    if sender.blocking_send(AppEvent::Input(evt)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            Ok(false) => {
                if sender.blocking_send(AppEvent::Tick).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    });
}

struct UiState {
    focus: Focus,
    ticket_cursor: usize,
    blocked_cursor: usize,
    status: String,
    hover: Option<String>,
    loading: bool,
    solving_seq: Option<u64>,
    should_quit: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            focus: Focus::Tickets,
            ticket_cursor: 0,
            blocked_cursor: 0,
            status: String::from("Starting…"),
            hover: None,
            loading: false,
            solving_seq: None,
            should_quit: false,
        }
    }
}

impl UiState {
    fn set_status(&mut self, message: impl Into<String>) {
        self.status = format!("{} {}", Local::now().format("%H:%M:%S"), message.into());
    }
}
