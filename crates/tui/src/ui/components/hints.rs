use ratatui::{style::Style, text::Span};

use crate::ui::theme::Theme;

/// A keyboard hint consisting of a key and its action.
#[derive(Debug, Clone)]
pub struct KeyHint {
    pub key: &'static str,
    pub action: &'static str,
}

impl KeyHint {
    pub const fn new(key: &'static str, action: &'static str) -> Self {
        Self { key, action }
    }
}

pub fn hints_to_spans(hints: &[KeyHint], theme: &Theme) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    for (i, hint) in hints.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw("  "));
        }
        spans.push(Span::styled(hint.key, Style::default().fg(theme.accent)));
        spans.push(Span::raw(format!(" {}", hint.action)));
    }
    spans
}

pub fn hint_separator(theme: &Theme) -> Span<'static> {
    Span::styled("  │  ", Style::default().fg(theme.border))
}

pub fn grid() -> Vec<KeyHint> {
    vec![
        KeyHint::new("←↑↓→", "move"),
        KeyHint::new("0-9.", "type"),
        KeyHint::new("Del", "clear"),
        KeyHint::new("p", "price"),
        KeyHint::new("c", "comment"),
        KeyHint::new("b", "branch"),
    ]
}

pub fn global() -> Vec<KeyHint> {
    vec![
        KeyHint::new("Ctrl+S", "save"),
        KeyHint::new("Ctrl+L", "reload"),
        KeyHint::new("Ctrl+X", "reset"),
        KeyHint::new("q", "quit"),
    ]
}

pub fn prompt() -> Vec<KeyHint> {
    vec![KeyHint::new("Enter", "apply"), KeyHint::new("Esc", "cancel")]
}

pub fn confirm() -> Vec<KeyHint> {
    vec![KeyHint::new("y", "clear everything"), KeyHint::new("n", "keep")]
}
