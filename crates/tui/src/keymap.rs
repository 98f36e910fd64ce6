use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{DirectionKey, Msg};

/// Plain characters are always input; commands live on control and
/// function keys.
pub(crate) fn map_key_event(key: KeyEvent) -> Option<Msg> {
    match (key.modifiers, key.code) {
        (KeyModifiers::CONTROL, KeyCode::Char('c' | 'q')) => Some(Msg::Quit),
        (KeyModifiers::CONTROL, KeyCode::Char('o')) => Some(Msg::Logout),
        (KeyModifiers::CONTROL, KeyCode::Char('r')) => Some(Msg::Refresh),
        (_, KeyCode::F(1)) => Some(Msg::ToggleHelp),
        (_, KeyCode::F(2)) => Some(Msg::TogglePane),
        (_, KeyCode::Tab) => Some(Msg::NextField),
        (_, KeyCode::BackTab) => Some(Msg::PrevField),
        (_, KeyCode::Enter) => Some(Msg::Submit),
        (_, KeyCode::Esc) => Some(Msg::Back),
        (_, KeyCode::Backspace) => Some(Msg::Backspace),
        (_, KeyCode::Up) => Some(Msg::Navigate(DirectionKey::Up)),
        (_, KeyCode::Down) => Some(Msg::Navigate(DirectionKey::Down)),
        (_, KeyCode::Left) => Some(Msg::Navigate(DirectionKey::Left)),
        (_, KeyCode::Right) => Some(Msg::Navigate(DirectionKey::Right)),
        (KeyModifiers::NONE | KeyModifiers::SHIFT, KeyCode::Char(ch)) => Some(Msg::Input(ch)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    use super::map_key_event;
    use crate::app::{DirectionKey, Msg};

    #[test]
    fn keymap_supports_required_global_keys() {
        assert!(matches!(
            map_key_event(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Msg::Quit)
        ));
        assert!(matches!(
            map_key_event(KeyEvent::new(KeyCode::Char('o'), KeyModifiers::CONTROL)),
            Some(Msg::Logout)
        ));
        assert!(matches!(
            map_key_event(KeyEvent::new(KeyCode::F(1), KeyModifiers::NONE)),
            Some(Msg::ToggleHelp)
        ));
        assert!(matches!(
            map_key_event(KeyEvent::new(KeyCode::BackTab, KeyModifiers::SHIFT)),
            Some(Msg::PrevField)
        ));
    }

    #[test]
    fn plain_letters_are_text_input() {
        assert!(matches!(
            map_key_event(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE)),
            Some(Msg::Input('q'))
        ));
        assert!(matches!(
            map_key_event(KeyEvent::new(KeyCode::Char('A'), KeyModifiers::SHIFT)),
            Some(Msg::Input('A'))
        ));
        assert!(matches!(
            map_key_event(KeyEvent::new(KeyCode::Left, KeyModifiers::NONE)),
            Some(Msg::Navigate(DirectionKey::Left))
        ));
        assert!(map_key_event(KeyEvent::new(KeyCode::Char('x'), KeyModifiers::ALT)).is_none());
    }
}
