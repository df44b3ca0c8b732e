//! Fullscreen terminal renderer: one character cell per world cell, a
//! census header, and pause/speed/step controls.

use std::{
    io::{self, Stdout},
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use evolife_core::{Simulation, Surface};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::Paragraph,
};
use supports_color::{ColorLevel, Stream, on_cached};

use crate::RunOptions;

const MAX_STEPS_PER_FRAME: u32 = 240;
const MAX_SPEED: f32 = 8.0;

/// Run the interactive renderer until the user quits. Terminal state is
/// restored even when the event loop errors.
pub fn run(sim: &mut Simulation, options: RunOptions) -> Result<()> {
    let mut stdout = io::stdout();
    enable_raw_mode().context("failed to enable raw mode")?;
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to build terminal backend")?;
    terminal.hide_cursor().ok();

    let result = run_event_loop(&mut terminal, sim, options);

    terminal.show_cursor().ok();
    if let Err(err) = disable_raw_mode() {
        tracing::error!(?err, "failed to disable raw mode");
    }
    if let Err(err) = execute!(terminal.backend_mut(), LeaveAlternateScreen) {
        tracing::error!(?err, "failed to leave alternate screen");
    }

    result
}

fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    sim: &mut Simulation,
    options: RunOptions,
) -> Result<()> {
    let mut app = TerminalApp::new(sim, options);

    loop {
        let now = Instant::now();
        app.maybe_step_simulation(now);

        if now.duration_since(app.last_draw) >= app.draw_interval {
            terminal.draw(|frame| app.draw(frame))?;
            app.last_draw = now;
        }

        let timeout = app
            .draw_interval
            .saturating_sub(now.duration_since(app.last_draw));
        if event::poll(timeout).unwrap_or(false)
            && let Event::Key(key) = event::read()?
            && app.handle_key(key)
        {
            break;
        }
    }

    Ok(())
}

struct TerminalApp<'a> {
    sim: &'a mut Simulation,
    palette: Palette,
    steps_cap: u64,
    step_interval: Duration,
    draw_interval: Duration,
    speed_multiplier: f32,
    paused: bool,
    sim_accumulator: f32,
    last_tick: Instant,
    last_draw: Instant,
}

impl<'a> TerminalApp<'a> {
    fn new(sim: &'a mut Simulation, options: RunOptions) -> Self {
        let interval = Duration::from_secs_f32(1.0 / options.fps.max(1) as f32);
        let now = Instant::now();
        Self {
            sim,
            palette: Palette::detect(),
            steps_cap: options.steps,
            step_interval: interval,
            draw_interval: interval,
            speed_multiplier: 1.0,
            paused: false,
            sim_accumulator: 0.0,
            last_tick: now,
            last_draw: now,
        }
    }

    fn done(&self) -> bool {
        self.sim.steps() >= self.steps_cap
    }

    fn maybe_step_simulation(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_tick).as_secs_f32();
        self.last_tick = now;
        if self.paused || self.done() {
            self.sim_accumulator = 0.0;
            return;
        }

        self.sim_accumulator += elapsed * self.speed_multiplier;
        let interval = self.step_interval.as_secs_f32();
        let mut budget = MAX_STEPS_PER_FRAME;
        while self.sim_accumulator >= interval && budget > 0 && !self.done() {
            self.sim.step();
            self.sim_accumulator -= interval;
            budget -= 1;
        }
    }

    fn step_once(&mut self) {
        if !self.done() {
            self.sim.step();
        }
    }

    /// Returns `true` when the loop should exit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        match (key.code, key.modifiers) {
            (KeyCode::Esc, _)
            | (KeyCode::Char('q'), _)
            | (KeyCode::Char('Q'), _)
            | (KeyCode::Char('c'), KeyModifiers::CONTROL) => return true,
            (KeyCode::Char(' '), _) => {
                self.paused = !self.paused;
            }
            (KeyCode::Char('+') | KeyCode::Char('='), _) => {
                self.speed_multiplier = (self.speed_multiplier + 0.5).clamp(0.5, MAX_SPEED);
                self.paused = false;
            }
            (KeyCode::Char('-') | KeyCode::Char('_'), _) => {
                self.speed_multiplier = (self.speed_multiplier - 0.5).max(0.0);
                if self.speed_multiplier <= 0.0 {
                    self.paused = true;
                }
            }
            (KeyCode::Char('n'), _) => {
                self.step_once();
                self.paused = true;
            }
            _ => {}
        }
        false
    }

    fn status_line(&self) -> String {
        if self.done() {
            "done".to_string()
        } else if self.paused {
            "paused".to_string()
        } else {
            format!("x{:.1}", self.speed_multiplier)
        }
    }

    fn draw(&self, frame: &mut Frame<'_>) {
        render_frame(frame, self.sim, &self.palette, &self.status_line());
    }
}

/// Draw one frame: census header on the first row, the grid below.
pub fn render_frame(frame: &mut Frame<'_>, sim: &Simulation, palette: &Palette, status: &str) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0)])
        .split(frame.area());

    let census = sim.census();
    let header = Line::from(vec![
        Span::styled("EvoLife", palette.header_style()),
        Span::raw(format!(
            "  step {}  pop {}  births {}  deaths {}  energy {}  ",
            census.step, census.population, census.births, census.deaths, census.total_energy
        )),
        Span::styled(status.to_string(), palette.status_style()),
    ]);
    frame.render_widget(Paragraph::new(header), chunks[0]);

    let grid = chunks[1];
    let world = sim.world();
    let rows = world.height().min(grid.height as usize);
    let cols = world.width().min(grid.width as usize);
    let mut lines = Vec::with_capacity(rows);
    for y in 0..rows {
        let mut spans = Vec::with_capacity(cols);
        for x in 0..cols {
            let (glyph, style) = palette.surface_symbol(world.cell(x, y).surface);
            spans.push(Span::styled(glyph.to_string(), style));
        }
        lines.push(Line::from(spans));
    }
    frame.render_widget(Paragraph::new(Text::from(lines)), grid);
}

/// Glyph and color scheme, degraded when stdout reports no color support.
pub struct Palette {
    level: Option<ColorLevel>,
}

impl Palette {
    #[must_use]
    pub fn detect() -> Self {
        Self {
            level: on_cached(Stream::Stdout),
        }
    }

    /// A color-free palette, useful against test backends.
    #[must_use]
    pub const fn monochrome() -> Self {
        Self { level: None }
    }

    fn has_color(&self) -> bool {
        self.level.is_some()
    }

    fn header_style(&self) -> Style {
        let style = Style::default().add_modifier(Modifier::BOLD);
        if self.has_color() { style.fg(Color::Cyan) } else { style }
    }

    fn status_style(&self) -> Style {
        if self.has_color() {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        }
    }

    fn surface_symbol(&self, surface: Surface) -> (char, Style) {
        let (glyph, color) = match surface {
            Surface::Empty => (' ', None),
            Surface::Wall => ('#', Some(Color::DarkGray)),
            Surface::Bot(_) => ('B', Some(Color::Green)),
            Surface::Organic(_) => (',', Some(Color::Yellow)),
        };
        let mut style = Style::default();
        if self.has_color()
            && let Some(color) = color
        {
            style = style.fg(color);
        }
        (glyph, style)
    }
}
