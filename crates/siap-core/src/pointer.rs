//! Thin adapters from platform input to the unified [`PointerEvent`] stream.

use crate::signature::{ClientPoint, PointerEvent};

/// Translates one platform's input events into pointer events.
pub trait PointerAdapter {
    type Input;

    fn translate(&mut self, input: Self::Input) -> Option<PointerEvent>;
}

/// Mouse input as delivered by a windowing toolkit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MouseInput {
    Down(ClientPoint),
    Move(ClientPoint),
    Up,
    Leave,
}

/// Mouse adapter. Hover moves pass through; the surface ignores them while
/// no stroke is active. Leaving the surface ends the stroke.
#[derive(Debug, Default)]
pub struct MouseAdapter;

impl PointerAdapter for MouseAdapter {
    type Input = MouseInput;

    fn translate(&mut self, input: MouseInput) -> Option<PointerEvent> {
        Some(match input {
            MouseInput::Down(p) => PointerEvent::Begin(p),
            MouseInput::Move(p) => PointerEvent::Move(p),
            MouseInput::Up | MouseInput::Leave => PointerEvent::End,
        })
    }
}

/// Touch input carrying the active touch list.
#[derive(Debug, Clone, PartialEq)]
pub enum TouchInput {
    Start(Vec<ClientPoint>),
    Move(Vec<ClientPoint>),
    End,
    Cancel,
}

/// Touch adapter. Only the primary (first) touch draws.
#[derive(Debug, Default)]
pub struct TouchAdapter;

impl PointerAdapter for TouchAdapter {
    type Input = TouchInput;

    fn translate(&mut self, input: TouchInput) -> Option<PointerEvent> {
        match input {
            TouchInput::Start(touches) => touches.first().copied().map(PointerEvent::Begin),
            TouchInput::Move(touches) => touches.first().copied().map(PointerEvent::Move),
            TouchInput::End | TouchInput::Cancel => Some(PointerEvent::End),
        }
    }
}
