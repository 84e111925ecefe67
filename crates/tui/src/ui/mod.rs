pub mod components;
pub mod keymap;
pub mod screens;

mod terminal;
mod theme;

use engine::numeric;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};

use crate::app::{AppState, Mode, Prompt};

pub use terminal::{AppTerminal as Terminal, frame_area, restore_terminal, setup_terminal};
pub use theme::Theme;

fn regions(area: Rect) -> [Rect; 4] {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Info bar
            Constraint::Length(1), // Cursor row totals
            Constraint::Min(0),    // Grid + footer
            Constraint::Length(1), // Bottom bar / prompt
        ])
        .split(area);
    [layout[0], layout[1], layout[2], layout[3]]
}

/// Area the grid screen is drawn into.
pub fn grid_area(area: Rect) -> Rect {
    regions(area)[2]
}

pub fn render(frame: &mut Frame<'_>, state: &AppState) {
    let theme = Theme::default();
    let area = frame.area();
    let [info, summary, grid, bottom] = regions(area);

    render_info_bar(frame, info, state, &theme);
    if state.config_issues.is_empty() {
        render_summary(frame, summary, state, &theme);
        screens::grid::render(frame, grid, &state.table);
    } else {
        render_config_issues(frame, grid, state, &theme);
    }
    render_bottom_bar(frame, bottom, state, &theme);
    components::toast::render(frame, area, state.toast.as_ref());
}

fn render_info_bar(frame: &mut Frame<'_>, area: Rect, state: &AppState, theme: &Theme) {
    let table = &state.table;
    let (plan, branch) = table
        .key()
        .map(|k| (k.plan_id.to_string(), k.branch_id.to_string()))
        .unwrap_or_else(|| ("-".to_string(), "-".to_string()));
    let (status, status_style) = if !state.config_issues.is_empty() {
        ("CONFIG", Style::default().fg(theme.error))
    } else if table.is_saving() {
        ("SAVING", Style::default().fg(theme.warning))
    } else if !table.is_editable() {
        ("LOADING", Style::default().fg(theme.warning))
    } else if table.is_dirty() {
        ("EDITED", Style::default().fg(theme.accent))
    } else {
        ("OK", Style::default().fg(theme.positive))
    };
    let saved = state
        .last_saved
        .map(|dt| dt.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());

    let mut line = vec![
        Span::styled(
            state.title.as_str(),
            Style::default().fg(theme.text).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled("Plan", Style::default().fg(theme.dim)),
        Span::raw(format!(": {plan}  ")),
        Span::styled("Branch", Style::default().fg(theme.dim)),
        Span::raw(format!(": {branch}  ")),
        Span::styled("Saved", Style::default().fg(theme.dim)),
        Span::raw(format!(": {saved}  ")),
        Span::styled(status, status_style),
    ];
    if state.pending > 0 {
        line.push(Span::styled(
            format!("  ⟳ {}", state.pending),
            Style::default().fg(theme.dim),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(line)), area);
}

fn render_summary(frame: &mut Frame<'_>, area: Rect, state: &AppState, theme: &Theme) {
    let table = &state.table;
    let totals = table.totals();
    let decimals = table.spec().max_decimals;
    let mut line = Vec::new();

    if let Some(row) = table.rows().get(table.cursor().row) {
        line.push(Span::styled(row.label.as_str(), Style::default().fg(theme.text)));
        if let Some(unit) = &row.unit_label {
            line.push(Span::styled(format!(" ({unit})"), Style::default().fg(theme.dim)));
        }
        line.push(Span::raw(format!(
            "  total {}  amount {}  price {}",
            numeric::format(totals.row(&row.id), decimals),
            numeric::format_fixed(totals.row_amount(&row.id), 2),
            numeric::format_fixed(table.prices().unit_price(row), 2),
        )));
        let comment = table.grid().comment(&row.id);
        if !comment.is_empty() {
            line.push(Span::styled(format!("  “{comment}”"), Style::default().fg(theme.dim)));
        }
        line.push(Span::styled("  │  ", Style::default().fg(theme.border)));
    }
    line.push(Span::styled("Grand", Style::default().fg(theme.dim)));
    line.push(Span::raw(format!(
        " {}  amount {}",
        numeric::format(totals.grand, decimals),
        numeric::format_fixed(totals.grand_amount, 2),
    )));

    frame.render_widget(Paragraph::new(Line::from(line)), area);
}

fn render_config_issues(frame: &mut Frame<'_>, area: Rect, state: &AppState, theme: &Theme) {
    let mut lines = vec![Line::from(Span::styled(
        "The planner cannot contact the planning service until these are fixed:",
        Style::default().fg(theme.text),
    ))];
    lines.extend(state.config_issues.iter().map(|issue| {
        Line::from(Span::styled(
            format!("  • {issue}"),
            Style::default().fg(theme.error),
        ))
    }));
    let block = Block::default()
        .title("Configuration")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.error));
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

fn render_bottom_bar(frame: &mut Frame<'_>, area: Rect, state: &AppState, theme: &Theme) {
    use components::hints;

    let parts = match &state.mode {
        Mode::Prompt { kind, input } => {
            let label = match kind {
                Prompt::Price { .. } => "Unit price",
                Prompt::Comment { .. } => "Comment",
                Prompt::Branch => "Branch id",
            };
            let mut parts = vec![
                Span::styled(format!("{label}: "), Style::default().fg(theme.accent)),
                Span::styled(format!("{input}▏"), Style::default().fg(theme.text)),
                hints::hint_separator(theme),
            ];
            parts.extend(hints::hints_to_spans(&hints::prompt(), theme));
            parts
        }
        Mode::ConfirmReset => {
            let mut parts = vec![
                Span::styled(
                    "Clear every value, price and comment?",
                    Style::default().fg(theme.warning),
                ),
                hints::hint_separator(theme),
            ];
            parts.extend(hints::hints_to_spans(&hints::confirm(), theme));
            parts
        }
        Mode::Grid => {
            let mut parts = hints::hints_to_spans(&hints::grid(), theme);
            parts.push(hints::hint_separator(theme));
            parts.extend(hints::hints_to_spans(&hints::global(), theme));
            parts
        }
    };

    frame.render_widget(Paragraph::new(Line::from(parts)), area);
}
