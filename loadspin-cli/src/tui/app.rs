// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! TUI Dashboard using ratatui.
//!
//! Polls a running instance's `/healthz` and `/apdex` and shows the current
//! score, its recent history and the connection status.

use std::collections::VecDeque;
use std::io::stdout;
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Gauge, Paragraph, Sparkline},
};

use crate::api::ApdexResponse;

/// Scores kept for the sparkline.
const HISTORY_LEN: usize = 120;

/// Bound on each poll request.
const POLL_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq)]
enum Connection {
    /// No poll has completed yet.
    Connecting,
    Healthy,
    Unreachable(String),
}

/// Dashboard state.
struct App {
    /// Base URL of the watched instance.
    url: String,
    /// Whether to quit the application.
    should_quit: bool,
    connection: Connection,
    /// Latest score.
    score: Option<f64>,
    /// Recent scores scaled to 0..=100.
    history: VecDeque<u64>,
    polls: u64,
}

impl App {
    fn new(url: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            should_quit: false,
            connection: Connection::Connecting,
            score: None,
            history: VecDeque::with_capacity(HISTORY_LEN),
            polls: 0,
        }
    }

    fn record(&mut self, score: f64) {
        if self.history.len() == HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back((score.clamp(0.0, 1.0) * 100.0).round() as u64);
        self.score = Some(score);
        self.connection = Connection::Healthy;
        self.polls = self.polls.wrapping_add(1);
    }

    fn fail(&mut self, reason: String) {
        self.connection = Connection::Unreachable(reason);
        self.polls = self.polls.wrapping_add(1);
    }

    async fn poll(&mut self, client: &reqwest::Client) {
        match fetch_score(client, &self.url).await {
            Ok(score) => self.record(score),
            Err(e) => self.fail(e.to_string()),
        }
    }
}

async fn fetch_score(client: &reqwest::Client, url: &str) -> Result<f64, reqwest::Error> {
    client
        .get(format!("{}/healthz", url))
        .send()
        .await?
        .error_for_status()?;

    let body: ApdexResponse = client
        .get(format!("{}/apdex", url))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    Ok(body.score)
}

fn score_color(score: f64) -> Color {
    match score {
        s if s >= 0.8 => Color::Green,
        s if s >= 0.5 => Color::Yellow,
        _ => Color::Red,
    }
}

/// Run the TUI dashboard.
pub async fn run_dashboard(url: &str, interval: Duration) -> Result<(), Box<dyn std::error::Error>> {
    let client = reqwest::Client::builder().timeout(POLL_TIMEOUT).build()?;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut app = App::new(url);
    let mut last_poll: Option<Instant> = None;

    // Main loop
    loop {
        if last_poll.map_or(true, |at| at.elapsed() >= interval) {
            app.poll(&client).await;
            last_poll = Some(Instant::now());
        }

        terminal.draw(|frame| render(frame, &app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
                        _ => {}
                    }
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}

fn render(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Length(5), // Score + connection
            Constraint::Min(6),    // History
            Constraint::Length(3), // Footer
        ])
        .split(frame.area());

    // Title
    let title = Paragraph::new(format!(" LOADSPIN  {} ", app.url))
        .style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        );
    frame.render_widget(title, main_layout[0]);

    let stats_layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(main_layout[1]);

    // Score gauge
    let score = app.score.unwrap_or(0.0);
    let label = app
        .score
        .map(|s| format!("{:.2}", s))
        .unwrap_or_else(|| "--".to_string());
    let gauge = Gauge::default()
        .block(Block::default().title(" Apdex ").borders(Borders::ALL))
        .gauge_style(Style::default().fg(score_color(score)))
        .ratio(score.clamp(0.0, 1.0))
        .label(label);
    frame.render_widget(gauge, stats_layout[0]);

    // Connection
    let status = match &app.connection {
        Connection::Connecting => Span::styled("CONNECTING", Style::default().fg(Color::DarkGray)),
        Connection::Healthy => Span::styled("HEALTHY", Style::default().fg(Color::Green)),
        Connection::Unreachable(_) => Span::styled("UNREACHABLE", Style::default().fg(Color::Red)),
    };
    let mut status_text = vec![
        Line::from(vec![Span::raw("Status: "), status]),
        Line::from(vec![
            Span::raw("Polls: "),
            Span::styled(app.polls.to_string(), Style::default().add_modifier(Modifier::BOLD)),
        ]),
    ];
    if let Connection::Unreachable(reason) = &app.connection {
        status_text.push(Line::from(Span::styled(
            reason.as_str(),
            Style::default().fg(Color::DarkGray),
        )));
    }
    let status_block = Paragraph::new(status_text)
        .block(Block::default().title(" Connection ").borders(Borders::ALL));
    frame.render_widget(status_block, stats_layout[1]);

    // History
    let history: Vec<u64> = app.history.iter().copied().collect();
    let sparkline = Sparkline::default()
        .block(
            Block::default()
                .title(" Score history ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Green)),
        )
        .data(&history)
        .max(100)
        .style(Style::default().fg(score_color(score)));
    frame.render_widget(sparkline, main_layout[2]);

    // Footer
    let footer = Paragraph::new(" Press 'q' to quit ")
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(footer, main_layout[3]);
}
