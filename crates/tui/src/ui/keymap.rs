use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use engine::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAction {
    Quit,
    Cancel,
    Submit,
    Save,
    Reload,
    Reset,
    Move(Direction),
    Backspace,
    Clear,
    EditPrice,
    EditComment,
    SwitchBranch,
    Input(char),
    None,
}

/// Maps a key press. With `text_entry` set (a prompt is open) every
/// printable key is input.
pub fn map_key(key: KeyEvent, text_entry: bool) -> AppAction {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') | KeyCode::Char('q') => AppAction::Quit,
            KeyCode::Char('s') => AppAction::Save,
            KeyCode::Char('l') => AppAction::Reload,
            KeyCode::Char('x') => AppAction::Reset,
            _ => AppAction::None,
        };
    }

    if text_entry {
        return match key.code {
            KeyCode::Esc => AppAction::Cancel,
            KeyCode::Enter => AppAction::Submit,
            KeyCode::Backspace => AppAction::Backspace,
            KeyCode::Char(ch) => AppAction::Input(ch),
            _ => AppAction::None,
        };
    }

    match key.code {
        KeyCode::Char('q') => AppAction::Quit,
        KeyCode::Char('p') => AppAction::EditPrice,
        KeyCode::Char('c') => AppAction::EditComment,
        KeyCode::Char('b') => AppAction::SwitchBranch,
        KeyCode::Esc => AppAction::Cancel,
        KeyCode::Up => AppAction::Move(Direction::Up),
        KeyCode::Down | KeyCode::Enter => AppAction::Move(Direction::Down),
        KeyCode::Left | KeyCode::BackTab => AppAction::Move(Direction::Left),
        KeyCode::Right | KeyCode::Tab => AppAction::Move(Direction::Right),
        KeyCode::Home => AppAction::Move(Direction::RowStart),
        KeyCode::End => AppAction::Move(Direction::RowEnd),
        KeyCode::Backspace => AppAction::Backspace,
        KeyCode::Delete => AppAction::Clear,
        KeyCode::Char(ch) => AppAction::Input(ch),
        _ => AppAction::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(ch: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL)
    }

    #[test]
    fn grid_keys() {
        assert_eq!(map_key(key(KeyCode::Char('7')), false), AppAction::Input('7'));
        assert_eq!(map_key(key(KeyCode::Char('q')), false), AppAction::Quit);
        assert_eq!(map_key(key(KeyCode::Tab), false), AppAction::Move(Direction::Right));
        assert_eq!(map_key(key(KeyCode::Enter), false), AppAction::Move(Direction::Down));
        assert_eq!(map_key(key(KeyCode::End), false), AppAction::Move(Direction::RowEnd));
        assert_eq!(map_key(key(KeyCode::Delete), false), AppAction::Clear);
    }

    #[test]
    fn prompts_take_letters_as_input() {
        assert_eq!(map_key(key(KeyCode::Char('q')), true), AppAction::Input('q'));
        assert_eq!(map_key(key(KeyCode::Char('p')), true), AppAction::Input('p'));
        assert_eq!(map_key(key(KeyCode::Enter), true), AppAction::Submit);
        assert_eq!(map_key(key(KeyCode::Up), true), AppAction::None);
    }

    #[test]
    fn control_chords_work_everywhere() {
        for text_entry in [false, true] {
            assert_eq!(map_key(ctrl('s'), text_entry), AppAction::Save);
            assert_eq!(map_key(ctrl('l'), text_entry), AppAction::Reload);
            assert_eq!(map_key(ctrl('x'), text_entry), AppAction::Reset);
            assert_eq!(map_key(ctrl('c'), text_entry), AppAction::Quit);
        }
    }
}
