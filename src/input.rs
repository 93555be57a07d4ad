//! Key bindings.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Action from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    MoveLeft,
    MoveRight,
    RotateCw,
    RotateCcw,
    SoftDrop,
    HardDrop,
    Restart,
    Quit,
    None,
}

/// Map key event to game action. Arrows and WASD move and drop; Q/E rotate.
pub fn key_to_action(key: KeyEvent) -> Action {
    let KeyEvent { code, modifiers, .. } = key;
    if modifiers == KeyModifiers::CONTROL {
        return match code {
            KeyCode::Char('c') => Action::Quit,
            _ => Action::None,
        };
    }
    if !(modifiers.is_empty() || modifiers == KeyModifiers::SHIFT) {
        return Action::None;
    }
    match code {
        KeyCode::Esc => Action::Quit,
        KeyCode::Left => Action::MoveLeft,
        KeyCode::Right => Action::MoveRight,
        KeyCode::Down => Action::SoftDrop,
        KeyCode::Up => Action::HardDrop,
        KeyCode::Char(c) => match c.to_ascii_lowercase() {
            'a' => Action::MoveLeft,
            'd' => Action::MoveRight,
            'q' => Action::RotateCw,
            'e' => Action::RotateCcw,
            's' => Action::SoftDrop,
            'w' | ' ' => Action::HardDrop,
            'r' => Action::Restart,
            _ => Action::None,
        },
        _ => Action::None,
    }
}
