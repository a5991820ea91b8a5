//! Keyboard mapping

use winit::keyboard::KeyCode;

/// What a key press asks the demo to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    Quit,
    /// Select post effect by index
    SelectPostEffect(usize),
}

pub fn action_for_key(key: KeyCode) -> Option<InputAction> {
    match key {
        KeyCode::Escape => Some(InputAction::Quit),
        KeyCode::Digit1 => Some(InputAction::SelectPostEffect(0)),
        KeyCode::Digit2 => Some(InputAction::SelectPostEffect(1)),
        KeyCode::Digit3 => Some(InputAction::SelectPostEffect(2)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_select_post_effects() {
        assert_eq!(
            action_for_key(KeyCode::Digit2),
            Some(InputAction::SelectPostEffect(1))
        );
        assert_eq!(action_for_key(KeyCode::Escape), Some(InputAction::Quit));
        assert_eq!(action_for_key(KeyCode::Digit4), None);
        assert_eq!(action_for_key(KeyCode::KeyA), None);
    }
}
