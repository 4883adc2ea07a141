//! Pointer event routing

use crate::geometry::Geometry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseEventKind {
    Press,
    Release,
    Motion,
}

/// Pointer event as reported by the display server, in root coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerEvent {
    pub kind: MouseEventKind,
    pub root_x: i32,
    pub root_y: i32,
    /// Button number, 0 for motion
    pub button: u8,
    /// Server timestamp in milliseconds
    pub time: u32,
}

/// Pointer event delivered to the mouse handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    pub kind: MouseEventKind,
    /// Window-local position
    pub x: i32,
    pub y: i32,
    pub root_x: i32,
    pub root_y: i32,
    pub button: u8,
    pub time: u32,
}

impl MouseEvent {
    pub fn from_pointer(event: &PointerEvent, geometry: &Geometry) -> Self {
        Self {
            kind: event.kind,
            x: event.root_x - geometry.x,
            y: event.root_y - geometry.y,
            root_x: event.root_x,
            root_y: event.root_y,
            button: event.button,
            time: event.time,
        }
    }
}

pub type MouseHandler = Box<dyn FnMut(&MouseEvent) + Send>;

/// Hands pointer events to the caller's handler
#[derive(Default)]
pub struct MouseRouter {
    handler: Option<MouseHandler>,
    hide_on_click: bool,
}

impl MouseRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_handler(&mut self, handler: Option<MouseHandler>) {
        self.handler = handler;
    }

    pub fn set_hide_on_click(&mut self, enabled: bool) {
        self.hide_on_click = enabled;
    }

    /// Whether the window should receive pointer input at all.
    /// When false the window is click-through.
    pub fn wants_input(&self) -> bool {
        self.handler.is_some() || self.hide_on_click
    }

    /// Deliver one event. Returns true when the event should hide the window.
    pub fn route(&mut self, event: &PointerEvent, geometry: &Geometry) -> bool {
        let local = MouseEvent::from_pointer(event, geometry);
        if let Some(handler) = self.handler.as_mut() {
            handler(&local);
        }
        self.hide_on_click && event.kind == MouseEventKind::Press
    }
}

impl std::fmt::Debug for MouseRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MouseRouter")
            .field("handler", &self.handler.is_some())
            .field("hide_on_click", &self.hide_on_click)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn press(root_x: i32, root_y: i32) -> PointerEvent {
        PointerEvent {
            kind: MouseEventKind::Press,
            root_x,
            root_y,
            button: 1,
            time: 42,
        }
    }

    #[test]
    fn test_translates_to_window_coordinates() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut router = MouseRouter::new();
        router.set_handler(Some(Box::new(move |e| sink.lock().unwrap().push(*e))));

        let geom = Geometry::new(100, 200, 50, 20);
        assert!(!router.route(&press(110, 215), &geom));

        let events = seen.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!((events[0].x, events[0].y), (10, 15));
        assert_eq!((events[0].root_x, events[0].root_y), (110, 215));
        assert_eq!(events[0].button, 1);
    }

    #[test]
    fn test_hide_on_click_only_for_presses() {
        let mut router = MouseRouter::new();
        assert!(!router.wants_input());
        router.set_hide_on_click(true);
        assert!(router.wants_input());

        let geom = Geometry::new(0, 0, 10, 10);
        assert!(router.route(&press(1, 1), &geom));

        let motion = PointerEvent {
            kind: MouseEventKind::Motion,
            button: 0,
            ..press(2, 2)
        };
        assert!(!router.route(&motion, &geom));
    }
}
