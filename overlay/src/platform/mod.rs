//! Display backends
//!
//! The overlay handle talks to the display server only through
//! [`DisplayBackend`]. Once the update thread runs, every call happens on
//! that thread, so implementations need `Send` but never `Sync`.

pub mod headless;

#[cfg(all(unix, not(target_os = "macos")))]
pub mod x11;

use tiny_skia::Pixmap;

use crate::error::Result;
use crate::geometry::{Geometry, ScreenInfo};
use crate::mouse::PointerEvent;
use crate::transparency::Transparency;

/// Trait that all display backends must implement
pub trait DisplayBackend: Send {
    /// Screen size and the outputs tiling it
    fn screen(&self) -> ScreenInfo;

    /// Reconfigure the window for a transparency mode.
    ///
    /// Fails with `UnsupportedMode` when the display cannot provide it, in
    /// which case the window keeps its current configuration.
    fn set_transparency(&mut self, mode: Transparency) -> Result<()>;

    /// Move and resize the window
    fn set_geometry(&mut self, geometry: Geometry) -> Result<()>;

    /// Accept pointer input, or let clicks pass through when disabled
    fn set_input_enabled(&mut self, enabled: bool) -> Result<()>;

    /// Set the window instance and class names
    fn set_name(&mut self, name: &str, class: &str) -> Result<()>;

    /// Copy the screen contents inside `area`. The window must be unmapped.
    fn capture_background(&mut self, area: Geometry) -> Result<Pixmap>;

    /// Push a composed frame to the window
    fn present(&mut self, frame: &Pixmap) -> Result<()>;

    /// Map the window
    fn show(&mut self) -> Result<()>;

    /// Unmap the window
    fn hide(&mut self) -> Result<()>;

    /// Drain pending pointer events without blocking
    fn poll_pointer(&mut self) -> Result<Vec<PointerEvent>>;

    /// Wait until the display has processed every request sent so far
    fn sync(&mut self) -> Result<()>;
}

/// Connect to the default display
#[cfg(all(unix, not(target_os = "macos")))]
pub fn connect_default() -> Result<Box<dyn DisplayBackend>> {
    Ok(Box::new(x11::X11Backend::connect(None)?))
}

#[cfg(not(all(unix, not(target_os = "macos"))))]
pub fn connect_default() -> Result<Box<dyn DisplayBackend>> {
    Err(crate::error::AosdError::DisplayUnavailable(
        "no display backend for this platform".into(),
    ))
}
