//! aosd: transparent fading on-screen display
//!
//! A borderless, always-on-top window that fades caller-drawn content in,
//! holds it and fades it out, without stealing focus.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                       osd                           │
//! │        Aosd handle, FlashOptions, lifecycle         │
//! │        (caller thread, blocking requests)           │
//! ├─────────────────────────────────────────────────────┤
//! │                     channel                         │
//! │     pending flags + payload, coalescing wake-up     │
//! │          acknowledgements and cycle ends            │
//! ├─────────────────────────────────────────────────────┤
//! │                      worker                         │
//! │   update thread: fade, transparency, render, mouse  │
//! ├─────────────────────────────────────────────────────┤
//! │                    platform/                        │
//! │                  x11, headless                      │
//! │            (display server plumbing)                │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! Drawing goes through a [`Renderer`] closure; [`TextRenderer`] provides
//! one for shaped text with a shadow and background.

mod channel;
pub mod color;
pub mod error;
pub mod fade;
pub mod geometry;
pub mod mouse;
mod osd;
pub mod platform;
pub mod render;
pub mod text;
pub mod transparency;
mod worker;

#[cfg(test)]
mod osd_tests;

use std::sync::OnceLock;

pub use color::{ColorError, parse_color};
pub use error::{AosdError, Result};
pub use fade::{FadePhase, FadeTiming};
pub use geometry::{Anchor, Coordinate, Geometry, OutputInfo, ScreenInfo};
pub use mouse::{MouseEvent, MouseEventKind};
pub use osd::{Aosd, FlashOptions};
pub use render::Renderer;
pub use text::{Alignment, FontSpec, TextRenderer, TextStyle};
pub use transparency::Transparency;
pub use worker::ReadyPredicate;

// Re-export tiny_skia types that appear in the public API
pub use tiny_skia::{Color, PixmapMut};

static INIT: OnceLock<()> = OnceLock::new();

/// One-time process setup. Loads the font database shared by every
/// [`TextRenderer`]. Safe to call repeatedly and from any thread;
/// [`Aosd::new`] calls it.
pub fn init() {
    INIT.get_or_init(|| {
        let fonts = text::font_system();
        tracing::info!(faces = fonts.db().len(), "aosd initialized");
    });
}
