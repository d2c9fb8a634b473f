//! UI rendering for the TUI.

use super::app::{App, Mode};
use crate::controller::{LineSnapshot, RxStatus};
use crate::port::OutputLine;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io::{self, Stdout};

/// The terminal type the app draws on.
pub type Tui = Terminal<CrosstermBackend<Stdout>>;

/// DB-9 pin numbers.
const PIN_CD: u8 = 1;
const PIN_RX: u8 = 2;
const PIN_TX: u8 = 3;
const PIN_DSR: u8 = 6;
const PIN_CTS: u8 = 8;
const PIN_RI: u8 = 9;

const LAMP: &str = "●";

/// Set up the terminal for TUI rendering.
pub fn setup_terminal() -> io::Result<Tui> {
    crossterm::terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend)
}

/// Restore the terminal to normal mode.
pub fn restore_terminal(mut terminal: Tui) -> io::Result<()> {
    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        crossterm::terminal::LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Render the entire UI.
pub fn render(app: &App, frame: &mut Frame) {
    let size = frame.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Min(10),   // Body
            Constraint::Length(1), // Status bar
        ])
        .split(size);

    render_header(app, frame, chunks[0]);
    render_body(app, frame, chunks[1]);
    render_status_bar(app, frame, chunks[2]);

    if app.mode == Mode::Help {
        render_help_overlay(app, frame, size);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let (device, status, status_color) = match &app.connected {
        Some(device) => (device.as_str(), "Open", app.theme.lamp_on),
        None => ("no device", "Closed", app.theme.inactive),
    };

    let header = Line::from(vec![
        Span::styled(
            " RS-232 tester ",
            Style::default()
                .fg(app.theme.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | "),
        Span::styled(device, Style::default().fg(app.theme.fg)),
        Span::raw(" | "),
        Span::styled(status, Style::default().fg(status_color)),
        Span::raw(" | "),
        Span::styled(app.uptime_string(), Style::default().fg(app.theme.fg)),
    ]);

    let header_widget = Paragraph::new(header).style(Style::default().bg(app.theme.selection));
    frame.render_widget(header_widget, area);
}

fn render_body(app: &App, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(32), Constraint::Min(30)])
        .split(area);

    render_device_list(app, frame, chunks[0]);
    render_lamps(app, frame, chunks[1]);
}

fn render_device_list(app: &App, frame: &mut Frame, area: Rect) {
    let items: Vec<ListItem> = app
        .devices
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let is_open = app.connected.as_deref() == Some(entry.device.as_str());
            let style = if i == app.selected {
                Style::default()
                    .fg(app.theme.fg)
                    .bg(app.theme.selection)
                    .add_modifier(Modifier::BOLD)
            } else if is_open {
                Style::default().fg(app.theme.lamp_on)
            } else {
                Style::default().fg(app.theme.fg)
            };

            let prefix = if is_open {
                "● "
            } else if i == app.selected {
                "> "
            } else {
                "  "
            };

            ListItem::new(format!("{prefix}{}", entry.label)).style(style)
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(app.theme.border))
            .title(" Devices "),
    );

    frame.render_widget(list, area);
}

/// Color of an input or output lamp.
fn level_color(app: &App, level: bool) -> Color {
    if level {
        app.theme.lamp_on
    } else {
        app.theme.lamp_off
    }
}

/// Color of the RX lamp: green on match, yellow on mismatch, dim otherwise.
pub(crate) fn rx_color(app: &App, rx: RxStatus) -> Color {
    match rx {
        RxStatus::Match => app.theme.lamp_on,
        RxStatus::Mismatch => app.theme.lamp_warn,
        RxStatus::Silent => app.theme.lamp_off,
    }
}

fn lamp_line<'a>(color: Color, name: &'a str, pin: u8, detail: String, app: &App) -> Line<'a> {
    Line::from(vec![
        Span::styled(format!(" {LAMP} "), Style::default().fg(color)),
        Span::styled(
            format!("{name:<4}"),
            Style::default().fg(app.theme.fg).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!(" pin {pin}  "), Style::default().fg(app.theme.inactive)),
        Span::styled(detail, Style::default().fg(app.theme.fg)),
    ])
}

fn on_off(level: bool) -> String {
    if level { "on" } else { "off" }.to_string()
}

/// One lamp per line, in DB-9 pin order of the inputs and outputs.
pub(crate) fn lamp_lines<'a>(app: &App, snapshot: Option<&LineSnapshot>) -> Vec<Line<'a>> {
    let Some(s) = snapshot else {
        let dim = app.theme.lamp_off;
        return [
            ("CD", PIN_CD),
            ("DTR", OutputLine::Dtr.pin()),
            ("DSR", PIN_DSR),
            ("RTS", OutputLine::Rts.pin()),
            ("CTS", PIN_CTS),
            ("RI", PIN_RI),
            ("TX", PIN_TX),
            ("RX", PIN_RX),
        ]
        .into_iter()
        .map(|(name, pin)| lamp_line(dim, name, pin, "-".to_string(), app))
        .collect();
    };

    let tx_color = if s.tx_enabled {
        app.theme.lamp_output
    } else {
        app.theme.lamp_off
    };
    let tx_detail = if s.tx_enabled {
        format!("sending 0x{:02X}", app.config.polling.loopback_byte)
    } else {
        "off".to_string()
    };
    let rx_detail = match s.rx {
        RxStatus::Match => "loopback ok",
        RxStatus::Mismatch => "unexpected data",
        RxStatus::Silent => "nothing received",
    };

    let output_color = |level: bool| {
        if level {
            app.theme.lamp_output
        } else {
            app.theme.lamp_off
        }
    };

    vec![
        lamp_line(level_color(app, s.inputs.cd), "CD", PIN_CD, on_off(s.inputs.cd), app),
        lamp_line(output_color(s.dtr), "DTR", OutputLine::Dtr.pin(), on_off(s.dtr), app),
        lamp_line(level_color(app, s.inputs.dsr), "DSR", PIN_DSR, on_off(s.inputs.dsr), app),
        lamp_line(output_color(s.rts), "RTS", OutputLine::Rts.pin(), on_off(s.rts), app),
        lamp_line(level_color(app, s.inputs.cts), "CTS", PIN_CTS, on_off(s.inputs.cts), app),
        lamp_line(level_color(app, s.inputs.ri), "RI", PIN_RI, on_off(s.inputs.ri), app),
        lamp_line(tx_color, "TX", PIN_TX, tx_detail, app),
        lamp_line(rx_color(app, s.rx), "RX", PIN_RX, rx_detail.to_string(), app),
    ]
}

fn render_lamps(app: &App, frame: &mut Frame, area: Rect) {
    let mut lines = lamp_lines(app, app.snapshot.as_ref());
    if let Some(s) = &app.snapshot {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(" cycle {}", s.sequence),
            Style::default().fg(app.theme.inactive),
        )));
    }

    let widget = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(app.theme.border))
            .title(" Lines "),
    );
    frame.render_widget(widget, area);
}

fn render_status_bar(app: &App, frame: &mut Frame, area: Rect) {
    let status_text = app
        .status_message
        .clone()
        .unwrap_or_else(|| "Ready".to_string());
    let status_color = if app.status_is_error {
        app.theme.error_color
    } else {
        app.theme.fg
    };

    let keybinds = "Enter:open c:close d:DTR r:RTS t:TX s:scan ?:help q:quit";

    let status = Line::from(vec![
        Span::styled(format!(" {status_text} "), Style::default().fg(status_color)),
        Span::raw(" | "),
        Span::styled(keybinds, Style::default().fg(app.theme.inactive)),
    ]);

    let status_widget = Paragraph::new(status).style(Style::default().bg(app.theme.selection));
    frame.render_widget(status_widget, area);
}

fn render_help_overlay(app: &App, frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 70, area);
    frame.render_widget(Clear, popup_area);

    let help_text = vec![
        Line::from(Span::styled(
            "Keybindings",
            Style::default()
                .fg(app.theme.accent)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("  j/k, Up/Down  - Select device"),
        Line::from("  Enter / o     - Open selected device"),
        Line::from("  c             - Close device"),
        Line::from("  s / F5        - Rescan devices"),
        Line::from("  d             - Toggle DTR"),
        Line::from("  r             - Toggle RTS"),
        Line::from("  t             - Toggle TX loopback test"),
        Line::from("  ? / F1        - Show help"),
        Line::from("  q / Esc       - Quit"),
        Line::from(""),
        Line::from("RX lamp: green = test byte came back,"),
        Line::from("         yellow = other data, dim = nothing."),
        Line::from(""),
        Line::from(Span::styled(
            "Press Esc or F1 to close",
            Style::default().fg(app.theme.inactive),
        )),
    ];

    let help_widget = Paragraph::new(help_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(app.theme.accent))
                .title(" Help ")
                .style(Style::default().bg(app.theme.bg)),
        )
        .wrap(Wrap { trim: false });

    frame.render_widget(help_widget, popup_area);
}

/// Create a centered rectangle with the given percentage of the parent area.
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::port::{InputLines, MockPortRegistry};
    use ratatui::backend::TestBackend;
    use std::sync::{mpsc, Arc};

    fn app() -> App {
        let (tx, _rx) = mpsc::channel();
        App::new(Config::default(), Arc::new(MockPortRegistry::new()), tx).unwrap()
    }

    fn snapshot(rx: RxStatus) -> LineSnapshot {
        LineSnapshot {
            sequence: 12,
            inputs: InputLines {
                cd: true,
                dsr: false,
                cts: true,
                ri: false,
            },
            dtr: true,
            rts: false,
            tx_enabled: true,
            rx,
        }
    }

    fn lamp_color(line: &Line) -> Option<Color> {
        line.spans.first().and_then(|span| span.style.fg)
    }

    #[test]
    fn test_rx_lamp_colors() {
        let app = app();
        assert_eq!(rx_color(&app, RxStatus::Match), app.theme.lamp_on);
        assert_eq!(rx_color(&app, RxStatus::Mismatch), app.theme.lamp_warn);
        assert_eq!(rx_color(&app, RxStatus::Silent), app.theme.lamp_off);
    }

    #[test]
    fn test_lamp_lines_follow_snapshot() {
        let app = app();
        let s = snapshot(RxStatus::Mismatch);
        let lines = lamp_lines(&app, Some(&s));

        assert_eq!(lines.len(), 8);
        assert_eq!(lamp_color(&lines[0]), Some(app.theme.lamp_on)); // CD
        assert_eq!(lamp_color(&lines[2]), Some(app.theme.lamp_off)); // DSR
        assert_eq!(lamp_color(&lines[3]), Some(app.theme.lamp_off)); // RTS
        assert_eq!(lamp_color(&lines[7]), Some(app.theme.lamp_warn)); // RX
    }

    #[test]
    fn test_lamps_dim_without_session() {
        let app = app();
        let lines = lamp_lines(&app, None);
        assert!(lines
            .iter()
            .all(|l| lamp_color(l) == Some(app.theme.lamp_off)));
    }

    #[test]
    fn test_render_shows_lines_and_pins() {
        let mut app = app();
        app.set_devices(vec!["/dev/ttyS0".to_string()]);
        app.connected = Some("/dev/ttyS0".to_string());
        app.snapshot = Some(snapshot(RxStatus::Match));

        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
        terminal.draw(|frame| render(&app, frame)).unwrap();

        let buffer = terminal.backend().buffer();
        let text: String = buffer.content().iter().map(|c| c.symbol()).collect();
        for needle in ["CD", "DSR", "CTS", "RI", "DTR", "RTS", "pin 4", "loopback ok", "/dev/ttyS0", "cycle 12"] {
            assert!(text.contains(needle), "missing {needle}");
        }
    }
}
