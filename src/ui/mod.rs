use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap};
use ratatui::Frame;
use time::{macros::format_description, Date, OffsetDateTime};
use unicode_width::UnicodeWidthStr;

use crate::app::state::{AppState, OverlayState};
use crate::search::FieldMatch;

const NAME_COLUMN_MIN: u16 = 12;
const NAME_COLUMN_MAX: u16 = 48;

pub fn draw_app(frame: &mut Frame, state: &AppState, busy: bool, table_state: &mut TableState) {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(3),
        ])
        .split(frame.size());

    frame.render_widget(build_header(state, busy), vertical[0]);

    match state.empty_message() {
        Some(message) => {
            let paragraph = Paragraph::new(Line::from(Span::styled(
                message,
                Style::default()
                    .fg(Color::Gray)
                    .add_modifier(Modifier::ITALIC),
            )))
            .alignment(Alignment::Center)
            .block(Block::default().title("Due today").borders(Borders::ALL));
            frame.render_widget(paragraph, vertical[1]);
        }
        None => {
            let table = build_table(state);
            frame.render_stateful_widget(table, vertical[1], table_state);
        }
    }

    let status = build_status_line(state);
    let status_paragraph = Paragraph::new(status).style(Style::default().fg(Color::Gray));
    frame.render_widget(status_paragraph, vertical[2]);

    render_overlay(frame, state);
}

fn build_header(state: &AppState, busy: bool) -> Paragraph<'static> {
    let mut spans = vec![
        Span::styled(
            format_long_date(state.reference()),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(
            format!("{} due", state.store.due_rows().len()),
            Style::default().fg(Color::Gray),
        ),
    ];
    if busy {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            "⟳ fetching",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::ITALIC),
        ));
    } else if let Some(at) = state.last_loaded_at() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("synced {}", format_time_short(at)),
            Style::default().fg(Color::DarkGray),
        ));
    }
    Paragraph::new(Line::from(spans)).block(
        Block::default()
            .title("Revisit")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    )
}

fn build_table(state: &AppState) -> Table<'static> {
    let highlight_style = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);

    let name_width = state
        .rows()
        .iter()
        .map(|row| UnicodeWidthStr::width(row.name.text.as_str()))
        .max()
        .unwrap_or(0)
        .clamp(NAME_COLUMN_MIN as usize, NAME_COLUMN_MAX as usize) as u16;

    let rows = state.rows().iter().map(|row| {
        let name_style = if row.due.record.has_link() {
            Style::default().add_modifier(Modifier::UNDERLINED)
        } else {
            Style::default()
        };
        Row::new(vec![
            Cell::from(highlight_field(&row.name, name_style, highlight_style)),
            Cell::from(highlight_field(&row.date, Style::default(), highlight_style)),
            Cell::from(highlight_field(
                &row.revisions,
                Style::default(),
                highlight_style,
            )),
            Cell::from(Span::styled(
                row.due.interval.label(),
                Style::default().fg(Color::Green),
            )),
        ])
    });

    let header = Row::new(vec!["Program", "Date", "Revisions", "Due"]).style(
        Style::default()
            .fg(Color::Gray)
            .add_modifier(Modifier::BOLD),
    );

    Table::new(
        rows,
        [
            Constraint::Length(name_width),
            Constraint::Length(12),
            Constraint::Length(10),
            Constraint::Min(8),
        ],
    )
    .header(header)
    .block(Block::default().title("Due today").borders(Borders::ALL))
    .highlight_style(
        Style::default()
            .bg(Color::Blue)
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("▸ ")
}

fn highlight_field(field: &FieldMatch, base_style: Style, highlight_style: Style) -> Line<'static> {
    let spans: Vec<Span<'static>> = field
        .segments()
        .into_iter()
        .map(|(text, highlighted)| {
            let style = if highlighted {
                highlight_style
            } else {
                base_style
            };
            Span::styled(text.to_string(), style)
        })
        .collect();
    Line::from(spans)
}

fn build_status_line(state: &AppState) -> Text<'static> {
    let total = state.rows().len();
    let position = if state.is_empty() {
        "0/0".to_string()
    } else {
        format!("{}/{}", state.selected + 1, total)
    };

    let mut spans = vec![
        Span::raw(format!("Rows: {} ", state.store.all_rows().len())),
        Span::raw(" | Selected: "),
        Span::styled(position, Style::default().add_modifier(Modifier::BOLD)),
    ];

    let search = &state.search;
    if search.active || !search.query.is_empty() {
        let label_style = if search.active {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        spans.push(Span::raw(" | Search "));
        spans.push(Span::styled("/", label_style));
        if search.query.is_empty() {
            spans.push(Span::styled(
                "(type to search)",
                Style::default().fg(Color::DarkGray),
            ));
        } else {
            spans.push(Span::styled(
                search.query.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            ));
        }
        if search.active {
            spans.push(Span::styled(" ▌", Style::default().fg(Color::Cyan)));
        }
        if search.is_pending() {
            spans.push(Span::styled(" …", Style::default().fg(Color::DarkGray)));
        }
    }

    if let Some(error) = state.load_error() {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            format!("! {error}"),
            Style::default().fg(Color::Red),
        ));
    } else if let Some(message) = &state.status_message {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            message.clone(),
            Style::default().fg(Color::Cyan),
        ));
    }

    let keys = vec![
        Span::styled(
            "Keys: ",
            Style::default()
                .fg(Color::Gray)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            "←/→ day • t today • g pick date • / search • Esc clear • j/k move • Enter open • r reload • q quit",
            Style::default().fg(Color::DarkGray),
        ),
    ];

    Text::from(vec![Line::from(spans), Line::from(keys)])
}

fn render_overlay(frame: &mut Frame, state: &AppState) {
    let Some(OverlayState::DatePicker(picker)) = state.overlay() else {
        return;
    };
    let area = centered_rect(50, 30, frame.size());
    frame.render_widget(Clear, area);
    let mut input_display = picker.input.clone();
    input_display.push('▌');
    let mut lines = vec![
        Line::from(Span::styled(
            "Jump to date",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(input_display),
    ];
    if let Some(error) = &picker.error {
        lines.push(Line::from(Span::styled(
            error.clone(),
            Style::default().fg(Color::Red),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "DD-MM-YYYY • Enter to apply • Esc to cancel",
        Style::default().fg(Color::Gray),
    )));
    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .title("Date")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

pub fn format_long_date(date: Date) -> String {
    date.format(format_description!(
        "[weekday], [day] [month repr:long] [year]"
    ))
    .unwrap_or_else(|_| date.to_string())
}

fn format_time_short(dt: OffsetDateTime) -> String {
    dt.format(&format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_else(|_| dt.unix_timestamp().to_string())
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(vertical[1])[1]
}
