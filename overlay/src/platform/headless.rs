//! In-memory display backend
//!
//! Keeps the window state in memory and records every request in a shared
//! [`HeadlessLog`]. Useful for off-screen rendering and for exercising the
//! update thread without a display server.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tiny_skia::{Color, Pixmap};

use super::DisplayBackend;
use crate::error::{AosdError, Result};
use crate::geometry::{Geometry, ScreenInfo};
use crate::mouse::PointerEvent;
use crate::transparency::Transparency;

/// A frame pushed to the headless window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentedFrame {
    pub at: Instant,
    pub width: u32,
    pub height: u32,
    /// Top-left pixel, premultiplied RGBA
    pub first_pixel: [u8; 4],
}

/// Everything the headless window was asked to do
#[derive(Debug, Clone, Default)]
pub struct HeadlessLog {
    pub geometry: Geometry,
    pub geometry_changes: usize,
    pub mode: Transparency,
    pub captures: Vec<(Instant, Geometry)>,
    pub frames: Vec<PresentedFrame>,
    pub shows: Vec<Instant>,
    pub hides: Vec<Instant>,
    pub mapped: bool,
    pub input_enabled: bool,
    pub name: Option<(String, String)>,
    pub released: bool,
}

#[derive(Debug, Default)]
struct Shared {
    log: Mutex<HeadlessLog>,
    pointer: Mutex<VecDeque<PointerEvent>>,
    fail_present: Mutex<usize>,
}

/// Caller-side view of a [`HeadlessBackend`]
#[derive(Debug, Clone)]
pub struct HeadlessProbe {
    shared: Arc<Shared>,
}

impl HeadlessProbe {
    pub fn log(&self) -> MutexGuard<'_, HeadlessLog> {
        self.shared.log.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a pointer event for the next poll
    pub fn push_pointer(&self, event: PointerEvent) {
        self.shared
            .pointer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(event);
    }

    /// Make the next `count` presents fail
    pub fn fail_presents(&self, count: usize) {
        *self
            .shared
            .fail_present
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = count;
    }
}

#[derive(Debug)]
pub struct HeadlessBackend {
    screen: ScreenInfo,
    composite: bool,
    desktop: Color,
    shared: Arc<Shared>,
}

impl HeadlessBackend {
    pub fn new(screen: ScreenInfo) -> (Self, HeadlessProbe) {
        let shared = Arc::new(Shared::default());
        let backend = Self {
            screen,
            composite: false,
            desktop: Color::from_rgba8(32, 64, 96, 255),
            shared: Arc::clone(&shared),
        };
        (backend, HeadlessProbe { shared })
    }

    /// Pretend a compositing manager with an alpha visual is available
    pub fn with_composite(mut self, available: bool) -> Self {
        self.composite = available;
        self
    }

    /// Color returned by background captures
    pub fn with_desktop(mut self, color: Color) -> Self {
        self.desktop = color;
        self
    }

    fn log(&self) -> MutexGuard<'_, HeadlessLog> {
        self.shared.log.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DisplayBackend for HeadlessBackend {
    fn screen(&self) -> ScreenInfo {
        self.screen.clone()
    }

    fn set_transparency(&mut self, mode: Transparency) -> Result<()> {
        if mode.needs_alpha_visual() && !self.composite {
            return Err(AosdError::UnsupportedMode(mode));
        }
        self.log().mode = mode;
        Ok(())
    }

    fn set_geometry(&mut self, geometry: Geometry) -> Result<()> {
        let mut log = self.log();
        log.geometry = geometry;
        log.geometry_changes += 1;
        Ok(())
    }

    fn set_input_enabled(&mut self, enabled: bool) -> Result<()> {
        self.log().input_enabled = enabled;
        Ok(())
    }

    fn set_name(&mut self, name: &str, class: &str) -> Result<()> {
        self.log().name = Some((name.to_string(), class.to_string()));
        Ok(())
    }

    fn capture_background(&mut self, area: Geometry) -> Result<Pixmap> {
        let mut log = self.log();
        if log.mapped {
            return Err(AosdError::Backend("capture while window is mapped".into()));
        }
        log.captures.push((Instant::now(), area));
        let mut pixmap = Pixmap::new(area.width, area.height).ok_or_else(|| {
            AosdError::AllocationFailure(format!("{}x{} capture", area.width, area.height))
        })?;
        pixmap.fill(self.desktop);
        Ok(pixmap)
    }

    fn present(&mut self, frame: &Pixmap) -> Result<()> {
        {
            let mut failures = self
                .shared
                .fail_present
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            if *failures > 0 {
                *failures -= 1;
                return Err(AosdError::Backend("injected present failure".into()));
            }
        }

        let first_pixel = frame
            .pixel(0, 0)
            .map(|c| [c.red(), c.green(), c.blue(), c.alpha()])
            .unwrap_or_default();
        self.log().frames.push(PresentedFrame {
            at: Instant::now(),
            width: frame.width(),
            height: frame.height(),
            first_pixel,
        });
        Ok(())
    }

    fn show(&mut self) -> Result<()> {
        let mut log = self.log();
        log.mapped = true;
        log.shows.push(Instant::now());
        Ok(())
    }

    fn hide(&mut self) -> Result<()> {
        let mut log = self.log();
        log.mapped = false;
        log.hides.push(Instant::now());
        Ok(())
    }

    fn poll_pointer(&mut self) -> Result<Vec<PointerEvent>> {
        let mut queue = self
            .shared
            .pointer
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        Ok(queue.drain(..).collect())
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }
}

impl Drop for HeadlessBackend {
    fn drop(&mut self) {
        let mut log = self.log();
        log.mapped = false;
        log.released = true;
    }
}
