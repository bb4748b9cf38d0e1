//! Per-window input state, folded from winit events and polled once per frame.

use std::collections::HashSet;

use winit::{
    event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
};

/// Pixels per scroll "line" when converting pixel deltas.
const PIXELS_PER_LINE: f32 = 20.0;

#[derive(Debug, Default, Clone)]
pub struct InputState {
    /// Keys currently held.
    pressed: HashSet<KeyCode>,
    /// Keys that went down this frame.
    down: HashSet<KeyCode>,
    /// Keys that went up this frame.
    up: HashSet<KeyCode>,

    pub left_down: bool,
    pub left_up: bool,
    pub right_down: bool,
    pub right_up: bool,
    pub left_held: bool,
    pub right_held: bool,

    /// Cursor position in physical pixels.
    pub position: [f32; 2],
    pub prev_position: [f32; 2],
    pub moved: bool,
    /// Scroll in lines this frame; positive is up.
    pub scroll: f32,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one window event. Returns `true` if it was an input event.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        repeat,
                        ..
                    },
                ..
            } => {
                if !*repeat {
                    self.on_key(*code, *state);
                }
                true
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.on_mouse_button(*button, *state);
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.on_cursor_moved(position.x as f32, position.y as f32);
                true
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32 / PIXELS_PER_LINE,
                };
                self.on_scroll(lines);
                true
            }
            WindowEvent::Focused(false) => {
                // Keys released while unfocused never arrive.
                self.pressed.clear();
                self.left_held = false;
                self.right_held = false;
                true
            }
            _ => false,
        }
    }

    pub fn on_key(&mut self, code: KeyCode, state: ElementState) {
        match state {
            ElementState::Pressed => {
                if self.pressed.insert(code) {
                    self.down.insert(code);
                }
            }
            ElementState::Released => {
                if self.pressed.remove(&code) {
                    self.up.insert(code);
                }
            }
        }
    }

    pub fn on_mouse_button(&mut self, button: MouseButton, state: ElementState) {
        let pressed = state.is_pressed();
        match button {
            MouseButton::Left => {
                self.left_down |= pressed;
                self.left_up |= !pressed;
                self.left_held = pressed;
            }
            MouseButton::Right => {
                self.right_down |= pressed;
                self.right_up |= !pressed;
                self.right_held = pressed;
            }
            _ => {}
        }
    }

    pub fn on_cursor_moved(&mut self, x: f32, y: f32) {
        if !self.moved {
            self.prev_position = self.position;
        }
        self.position = [x, y];
        self.moved = true;
    }

    pub fn on_scroll(&mut self, lines: f32) {
        self.scroll += lines;
    }

    pub fn is_key_pressed(&self, code: KeyCode) -> bool {
        self.pressed.contains(&code)
    }

    pub fn is_key_down(&self, code: KeyCode) -> bool {
        self.down.contains(&code)
    }

    pub fn is_key_up(&self, code: KeyCode) -> bool {
        self.up.contains(&code)
    }

    /// Cursor movement since the last frame.
    pub fn cursor_delta(&self) -> [f32; 2] {
        if self.moved {
            [
                self.position[0] - self.prev_position[0],
                self.position[1] - self.prev_position[1],
            ]
        } else {
            [0.0, 0.0]
        }
    }

    /// Clear per-frame edges; held state survives.
    pub fn reset_change_events(&mut self) {
        self.down.clear();
        self.up.clear();
        self.left_down = false;
        self.left_up = false;
        self.right_down = false;
        self.right_up = false;
        self.moved = false;
        self.scroll = 0.0;
        self.prev_position = self.position;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_edges_last_one_frame() {
        let mut input = InputState::new();
        input.on_key(KeyCode::Digit1, ElementState::Pressed);
        assert!(input.is_key_down(KeyCode::Digit1));
        assert!(input.is_key_pressed(KeyCode::Digit1));

        input.reset_change_events();
        assert!(!input.is_key_down(KeyCode::Digit1));
        assert!(input.is_key_pressed(KeyCode::Digit1));

        input.on_key(KeyCode::Digit1, ElementState::Released);
        assert!(input.is_key_up(KeyCode::Digit1));
        assert!(!input.is_key_pressed(KeyCode::Digit1));

        input.reset_change_events();
        assert!(!input.is_key_up(KeyCode::Digit1));
    }

    #[test]
    fn held_key_does_not_repeat_down() {
        let mut input = InputState::new();
        input.on_key(KeyCode::Escape, ElementState::Pressed);
        input.reset_change_events();
        input.on_key(KeyCode::Escape, ElementState::Pressed);
        assert!(!input.is_key_down(KeyCode::Escape));
    }

    #[test]
    fn release_without_press_is_ignored() {
        let mut input = InputState::new();
        input.on_key(KeyCode::Digit2, ElementState::Released);
        assert!(!input.is_key_up(KeyCode::Digit2));
    }

    #[test]
    fn mouse_click_within_one_frame() {
        let mut input = InputState::new();
        input.on_mouse_button(MouseButton::Left, ElementState::Pressed);
        input.on_mouse_button(MouseButton::Left, ElementState::Released);
        assert!(input.left_down && input.left_up);
        assert!(!input.left_held);
        assert!(!input.right_down);

        input.reset_change_events();
        assert!(!input.left_down && !input.left_up);
    }

    #[test]
    fn cursor_delta_spans_the_frame() {
        let mut input = InputState::new();
        input.on_cursor_moved(10.0, 10.0);
        input.reset_change_events();
        assert_eq!(input.cursor_delta(), [0.0, 0.0]);

        input.on_cursor_moved(12.0, 15.0);
        input.on_cursor_moved(20.0, 5.0);
        assert!(input.moved);
        assert_eq!(input.prev_position, [10.0, 10.0]);
        assert_eq!(input.cursor_delta(), [10.0, -5.0]);
    }

    #[test]
    fn scroll_accumulates_then_resets() {
        let mut input = InputState::new();
        input.on_scroll(1.0);
        input.on_scroll(0.5);
        assert_eq!(input.scroll, 1.5);
        input.reset_change_events();
        assert_eq!(input.scroll, 0.0);
    }
}
