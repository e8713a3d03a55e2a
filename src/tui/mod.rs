mod state;

use crate::cli::Cli;
use crate::model::{ClientEvent, SessionPhase};
use crate::orchestrator::{self, UiCommand};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use state::{apply_event, parse_hex_color, Screen, UiState};
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

pub async fn run(args: Cli) -> Result<()> {
    // Unbounded channels avoid backpressure between the UI thread and the
    // controller in the hot path.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<ClientEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    // TUI runs in a dedicated thread to keep all blocking I/O out of the
    // Tokio runtime.
    let ui_args = args.clone();
    let ui_handle = std::thread::spawn(move || run_threaded(ui_args, event_rx, cmd_tx));

    let res = orchestrator::run_controller(&args, event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    args: Cli,
    mut event_rx: UnboundedReceiver<ClientEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    // UiState is owned by the UI thread only; no cross-thread mutation.
    let mut state = UiState::from_args(&args);
    if args.connect_on_launch {
        state.nick = args.nick.clone().unwrap_or_default();
        state.own_color = args
            .color
            .as_deref()
            .and_then(parse_hex_color)
            .unwrap_or(Color::Cyan);
    }

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain events without blocking to keep the UI responsive.
        while let Ok(ev) = event_rx.try_recv() {
            apply_event(&mut state, ev);
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                if k.modifiers.contains(KeyModifiers::CONTROL) && k.code == KeyCode::Char('c') {
                    let _ = cmd_tx.send(UiCommand::Quit);
                    break Ok(());
                }
                match state.screen {
                    Screen::Register => {
                        if !handle_register_key(&mut state, &cmd_tx, k.code) {
                            break Ok(());
                        }
                    }
                    Screen::Chat => handle_chat_key(&mut state, &cmd_tx, k.code),
                }
            }
        }
    };

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();

    res
}

/// Returns false when the app should exit.
fn handle_register_key(
    state: &mut UiState,
    cmd_tx: &UnboundedSender<UiCommand>,
    code: KeyCode,
) -> bool {
    match code {
        KeyCode::Esc => {
            let _ = cmd_tx.send(UiCommand::Quit);
            return false;
        }
        KeyCode::Tab | KeyCode::Down => {
            state.focus = (state.focus + 1) % state.fields.len();
        }
        KeyCode::BackTab | KeyCode::Up => {
            state.focus = state
                .focus
                .checked_sub(1)
                .unwrap_or(state.fields.len() - 1);
        }
        KeyCode::Enter => {
            if connecting_in_flight(state) {
                state.info = "Already connecting…".to_string();
                return true;
            }
            match state.config_from_form() {
                Ok(cfg) => {
                    state.nick = cfg.nick.clone();
                    state.own_color = parse_hex_color(&cfg.color).unwrap_or(Color::Cyan);
                    state.info = format!("Connecting to {}:{}…", cfg.server, cfg.port);
                    let _ = cmd_tx.send(UiCommand::Connect(Box::new(cfg)));
                }
                Err(reason) => state.info = reason,
            }
        }
        KeyCode::Backspace => {
            state.fields[state.focus].value.pop();
        }
        KeyCode::Char(c) => {
            state.fields[state.focus].value.push(c);
        }
        _ => {}
    }
    true
}

/// A session is underway once submitted and until it reaches Active or
/// closes; re-submitting meanwhile would double-connect.
fn connecting_in_flight(state: &UiState) -> bool {
    matches!(
        state.phase,
        Some(SessionPhase::Connecting)
            | Some(SessionPhase::Registering)
            | Some(SessionPhase::Joining)
            | Some(SessionPhase::Active)
    )
}

fn handle_chat_key(state: &mut UiState, cmd_tx: &UnboundedSender<UiCommand>, code: KeyCode) {
    match code {
        KeyCode::Enter => {
            if let Some(text) = state.submit_input() {
                let _ = cmd_tx.send(UiCommand::Input(text));
            }
        }
        KeyCode::Backspace => {
            state.input.pop();
        }
        KeyCode::Char(c) => {
            state.input.push(c);
        }
        KeyCode::PageUp => {
            let max = state.lines.len().saturating_sub(1);
            state.scroll_from_bottom = (state.scroll_from_bottom + 5).min(max);
        }
        KeyCode::PageDown => {
            state.scroll_from_bottom = state.scroll_from_bottom.saturating_sub(5);
        }
        KeyCode::Up => {
            let max = state.lines.len().saturating_sub(1);
            state.scroll_from_bottom = (state.scroll_from_bottom + 1).min(max);
        }
        KeyCode::Down => {
            state.scroll_from_bottom = state.scroll_from_bottom.saturating_sub(1);
        }
        KeyCode::Esc => {
            state.scroll_from_bottom = 0;
        }
        _ => {}
    }
}

fn draw(area: Rect, f: &mut Frame, state: &UiState) {
    match state.screen {
        Screen::Register => draw_register(area, f, state),
        Screen::Chat => draw_chat(area, f, state),
    }
}

fn draw_register(area: Rect, f: &mut Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(state.fields.len() as u16 + 2),
            Constraint::Length(1),
            Constraint::Min(1),
        ])
        .split(area);

    let mut rows: Vec<Line> = Vec::with_capacity(state.fields.len());
    for (i, field) in state.fields.iter().enumerate() {
        let focused = i == state.focus;
        let marker = if field.required { "*" } else { " " };
        let label_style = if focused {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        let mut spans = vec![
            Span::styled(format!("{:<12}{} ", field.label, marker), label_style),
            Span::raw(field.value.clone()),
        ];
        if focused {
            spans.push(Span::styled("▏", Style::default().fg(Color::Yellow)));
        }
        rows.push(Line::from(spans));
    }
    let form = Paragraph::new(rows).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Register (Tab: next field, Enter: connect, Esc: quit) "),
    );
    f.render_widget(form, chunks[0]);

    let submit = if state.form_valid() {
        Line::from(Span::styled(
            "  [ Connect ]",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ))
    } else {
        Line::from(Span::styled(
            "  [ Connect ] (fill required * fields)",
            Style::default().fg(Color::DarkGray),
        ))
    };
    f.render_widget(Paragraph::new(submit), chunks[1]);

    draw_status(chunks[2], f, state);
}

fn draw_chat(area: Rect, f: &mut Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(area);

    // Visible window over the log: newest at the bottom unless scrolled.
    let inner_height = chunks[0].height.saturating_sub(2) as usize;
    let end = state.lines.len().saturating_sub(state.scroll_from_bottom);
    let start = end.saturating_sub(inner_height);
    let rows: Vec<Line> = state.lines[start..end]
        .iter()
        .map(|l| {
            Line::from(vec![
                Span::styled(l.stamp.clone(), Style::default().fg(Color::DarkGray)),
                Span::raw(" "),
                Span::styled(
                    format!("{}: ", l.name),
                    Style::default().fg(l.color).add_modifier(Modifier::BOLD),
                ),
                Span::raw(l.text.clone()),
            ])
        })
        .collect();
    let log = Paragraph::new(rows).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" {} — {} ", state.channel_label, state.nick)),
    );
    f.render_widget(log, chunks[0]);

    let input = Paragraph::new(Line::from(vec![
        Span::styled("> ", Style::default().fg(Color::Yellow)),
        Span::raw(state.input.clone()),
    ]))
    .block(Block::default().borders(Borders::ALL).title(" Message "));
    f.render_widget(input, chunks[1]);
    f.set_cursor_position((
        chunks[1].x + 3 + state.input.chars().count() as u16,
        chunks[1].y + 1,
    ));

    draw_status(chunks[2], f, state);
}

fn draw_status(area: Rect, f: &mut Frame, state: &UiState) {
    let phase = state
        .phase
        .map(|p| p.as_status_str())
        .unwrap_or("idle");
    let status = Line::from(vec![
        Span::styled(format!(" [{}] ", phase), Style::default().fg(Color::Cyan)),
        Span::styled(state.info.clone(), Style::default().fg(Color::Gray)),
    ]);
    f.render_widget(Paragraph::new(status), area);
}
