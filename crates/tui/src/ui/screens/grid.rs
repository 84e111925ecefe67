use engine::{
    Bounds, CellPos, ColumnLayout, FrozenExtent, PlanTable, ViewportSync, numeric,
};
use ratatui::{
    Frame,
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
};

use crate::ui::theme::Theme;

pub const LABEL_WIDTH: u16 = 26;
const MIN_CELL_WIDTH: usize = 11;
const HEADER_ROWS: u16 = 1;

/// Terminal geometry of the scrollable body, in cells.
#[derive(Debug, Clone)]
pub struct GridGeometry {
    pub layout: ColumnLayout,
    pub container: Bounds,
    pub frozen: FrozenExtent,
}

/// Splits the grid area into body and the one-line totals footer.
pub fn split(area: Rect) -> (Rect, Rect) {
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(area);
    (parts[0], parts[1])
}

pub fn geometry(body: Rect, table: &PlanTable) -> GridGeometry {
    let widths = table
        .columns()
        .iter()
        .map(|column| (column.short_label.chars().count() + 2).max(MIN_CELL_WIDTH) as f64);
    GridGeometry {
        layout: ColumnLayout::new(widths, 1.0),
        container: Bounds::new(
            f64::from(body.x),
            f64::from(body.y),
            f64::from(body.width),
            f64::from(body.height),
        ),
        frozen: FrozenExtent {
            width: f64::from(LABEL_WIDTH.min(body.width)),
            height: f64::from(HEADER_ROWS),
        },
    }
}

/// Clips the horizontal range `[left, left + width)` to the visible region.
///
/// Returns the screen column, the number of leading characters hidden, and
/// the number of characters that fit.
fn clip(left: f64, width: f64, region_left: f64, region_right: f64) -> Option<(u16, usize, usize)> {
    let start = left.max(region_left);
    let end = (left + width).min(region_right);
    if end - start < 1.0 {
        return None;
    }
    Some((
        start.round() as u16,
        (start - left).round() as usize,
        (end - start).round() as usize,
    ))
}

fn put_clipped(
    buf: &mut Buffer,
    text: &str,
    left: f64,
    width: f64,
    y: u16,
    region: (f64, f64),
    style: Style,
) {
    let Some((x, skip, take)) = clip(left, width, region.0, region.1) else {
        return;
    };
    let cell = format!("{text:>w$} ", w = (width as usize).saturating_sub(1));
    let visible: String = cell.chars().skip(skip).take(take).collect();
    buf.set_stringn(x, y, visible, take, style);
}

fn truncate(label: &str, width: usize) -> String {
    if label.chars().count() <= width {
        return format!("{label:<width$}");
    }
    let mut out: String = label.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

pub fn render(frame: &mut Frame<'_>, area: Rect, table: &PlanTable) {
    let theme = Theme::default();
    let (body, footer) = split(area);
    let geo = geometry(body, table);
    let viewport: &ViewportSync = table.viewport();
    let region = (
        geo.container.left + geo.frozen.width,
        geo.container.right(),
    );
    let label_width = geo.frozen.width as usize;
    let max_decimals = table.spec().max_decimals;
    let cursor = table.cursor();
    let buf = frame.buffer_mut();

    let header_style = Style::default().fg(theme.accent).add_modifier(Modifier::BOLD);
    buf.set_stringn(
        body.x,
        body.y,
        truncate("Item", label_width),
        label_width,
        header_style,
    );

    for (col, column) in table.columns().iter().enumerate() {
        let (Some(offset), Some(width)) = (geo.layout.offset(col), geo.layout.width(col)) else {
            continue;
        };
        let left = region.0 + offset - viewport.scroll().left;
        put_clipped(buf, &column.short_label, left, width, body.y, region, header_style);
    }

    let body_top = geo.container.top + geo.frozen.height;
    for (row_idx, row) in table.rows().iter().enumerate() {
        let y = body_top + row_idx as f64 - viewport.scroll().top;
        if y < body_top || y + 1.0 > geo.container.bottom() {
            continue;
        }
        let y = y as u16;

        let marker = if table.grid().comment(&row.id).is_empty() { ' ' } else { '*' };
        let label = truncate(&format!("{marker}{}", row.label), label_width.saturating_sub(1));
        let label_style = if row_idx == cursor.row {
            Style::default().fg(theme.text).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme.text)
        };
        buf.set_stringn(body.x, y, label, label_width, label_style);

        for col in 0..table.columns().len() {
            let pos = CellPos::new(row_idx, col);
            let Some(content) = geo.layout.cell_bounds(pos) else {
                continue;
            };
            let screen = viewport.to_screen(content, geo.container, geo.frozen);
            let style = if pos == cursor && table.is_editable() {
                Style::default().fg(theme.background).bg(theme.accent)
            } else if table.is_enterable(pos) {
                Style::default().fg(theme.text)
            } else {
                Style::default().fg(theme.dim)
            };
            let value = table.grid().cell_at(row_idx, col);
            let text = if value.is_empty() && !table.is_editable() { "·" } else { value };
            put_clipped(buf, text, screen.left, screen.width, y, region, style);
        }
    }

    // Totals footer, kept aligned with the body through the footer offset.
    let footer_style = Style::default().fg(theme.accent);
    buf.set_stringn(
        footer.x,
        footer.y,
        truncate("Total", label_width),
        label_width,
        footer_style.add_modifier(Modifier::BOLD),
    );
    for (col, column) in table.columns().iter().enumerate() {
        let (Some(offset), Some(width)) = (geo.layout.offset(col), geo.layout.width(col)) else {
            continue;
        };
        let left = region.0 + offset - viewport.footer_offset();
        let total = numeric::format(table.totals().column(&column.id), max_decimals);
        put_clipped(buf, &total, left, width, footer.y, region, footer_style);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_inside_region_is_untouched() {
        assert_eq!(clip(30.0, 10.0, 26.0, 80.0), Some((30, 0, 10)));
    }

    #[test]
    fn clip_under_frozen_column_hides_leading_chars() {
        assert_eq!(clip(20.0, 10.0, 26.0, 80.0), Some((26, 6, 4)));
        assert_eq!(clip(10.0, 10.0, 26.0, 80.0), None);
    }

    #[test]
    fn clip_at_right_edge_keeps_what_fits() {
        assert_eq!(clip(75.0, 10.0, 26.0, 80.0), Some((75, 0, 5)));
    }

    #[test]
    fn labels_are_padded_or_ellipsized() {
        assert_eq!(truncate("Fuel", 6), "Fuel  ");
        assert_eq!(truncate("Fertilizer", 6), "Ferti…");
    }
}
