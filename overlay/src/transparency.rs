//! Transparency strategies
//!
//! - `None`: the drawing is blended over an opaque black fill.
//! - `Fake`: the screen area behind the window is captured once per show
//!   cycle and the drawing is blended over that snapshot. Assumes the desktop
//!   below does not change while the overlay is up.
//! - `Composite`: the frame keeps its alpha channel and a compositing
//!   manager blends the window with whatever is below it.

use tiny_skia::{BlendMode, Color, FilterQuality, Pixmap, PixmapPaint, Transform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transparency {
    None,
    #[default]
    Fake,
    Composite,
}

impl Transparency {
    /// Mode from its numeric code (0 none, 1 fake, 2 composite)
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::None),
            1 => Some(Self::Fake),
            2 => Some(Self::Composite),
            _ => None,
        }
    }

    /// Whether each show cycle starts by capturing the screen behind the window
    pub fn needs_background(self) -> bool {
        self == Self::Fake
    }

    /// Whether the window needs a 32-bit visual with an alpha channel
    pub fn needs_alpha_visual(self) -> bool {
        self == Self::Composite
    }
}

/// Snapshot of the screen behind the window
#[derive(Debug, Default)]
pub struct Background {
    pixmap: Option<Pixmap>,
    valid: bool,
}

impl Background {
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Mark the snapshot stale; the surface is kept for reuse until replaced
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    pub fn store(&mut self, pixmap: Pixmap) {
        self.pixmap = Some(pixmap);
        self.valid = true;
    }

    pub fn pixmap(&self) -> Option<&Pixmap> {
        if self.valid {
            self.pixmap.as_ref()
        } else {
            None
        }
    }

    /// Drop the surface entirely
    pub fn release(&mut self) {
        self.pixmap = None;
        self.valid = false;
    }
}

/// Build the frame sent to the window: the mode's base plus the caller's
/// drawing at `opacity`
pub fn compose(
    mode: Transparency,
    background: &Background,
    layer: &Pixmap,
    opacity: u8,
    frame: &mut Pixmap,
) {
    match mode {
        Transparency::None => frame.fill(Color::BLACK),
        Transparency::Composite => frame.fill(Color::TRANSPARENT),
        Transparency::Fake => match background.pixmap() {
            Some(bg) if bg.width() == frame.width() && bg.height() == frame.height() => {
                frame.draw_pixmap(
                    0,
                    0,
                    bg.as_ref(),
                    &PixmapPaint {
                        blend_mode: BlendMode::Source,
                        ..PixmapPaint::default()
                    },
                    Transform::identity(),
                    None,
                );
            }
            _ => frame.fill(Color::BLACK),
        },
    }

    if opacity == 0 {
        return;
    }

    let paint = PixmapPaint {
        opacity: opacity as f32 / 255.0,
        blend_mode: BlendMode::SourceOver,
        quality: FilterQuality::Nearest,
    };
    frame.draw_pixmap(0, 0, layer.as_ref(), &paint, Transform::identity(), None);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, color: Color) -> Pixmap {
        let mut p = Pixmap::new(width, height).unwrap();
        p.fill(color);
        p
    }

    fn pixel(p: &Pixmap) -> [u8; 4] {
        let c = p.pixel(0, 0).unwrap();
        [c.red(), c.green(), c.blue(), c.alpha()]
    }

    #[test]
    fn test_none_mode_is_opaque() {
        let layer = solid(4, 4, Color::WHITE);
        let mut frame = Pixmap::new(4, 4).unwrap();
        compose(Transparency::None, &Background::default(), &layer, 128, &mut frame);
        let [r, _, _, a] = pixel(&frame);
        assert_eq!(a, 255);
        assert!((126..=130).contains(&r), "half white over black, got {r}");
    }

    #[test]
    fn test_composite_keeps_alpha() {
        let layer = solid(4, 4, Color::WHITE);
        let mut frame = Pixmap::new(4, 4).unwrap();
        compose(Transparency::Composite, &Background::default(), &layer, 0, &mut frame);
        assert_eq!(pixel(&frame), [0, 0, 0, 0]);

        compose(Transparency::Composite, &Background::default(), &layer, 255, &mut frame);
        assert_eq!(pixel(&frame), [255, 255, 255, 255]);
    }

    #[test]
    fn test_fake_mode_draws_over_snapshot() {
        let mut bg = Background::default();
        bg.store(solid(4, 4, Color::from_rgba8(0, 0, 200, 255)));
        let layer = Pixmap::new(4, 4).unwrap();
        let mut frame = Pixmap::new(4, 4).unwrap();

        compose(Transparency::Fake, &bg, &layer, 255, &mut frame);
        assert_eq!(pixel(&frame), [0, 0, 200, 255]);

        bg.invalidate();
        assert!(bg.pixmap().is_none());
        compose(Transparency::Fake, &bg, &layer, 255, &mut frame);
        assert_eq!(pixel(&frame), [0, 0, 0, 255]);
    }

    #[test]
    fn test_stale_size_snapshot_is_ignored() {
        let mut bg = Background::default();
        bg.store(solid(2, 2, Color::WHITE));
        let layer = Pixmap::new(4, 4).unwrap();
        let mut frame = Pixmap::new(4, 4).unwrap();
        compose(Transparency::Fake, &bg, &layer, 255, &mut frame);
        assert_eq!(pixel(&frame), [0, 0, 0, 255]);
    }

    #[test]
    fn test_mode_codes() {
        assert_eq!(Transparency::from_index(2), Some(Transparency::Composite));
        assert_eq!(Transparency::from_index(3), None);
        assert!(Transparency::Fake.needs_background());
        assert!(!Transparency::Composite.needs_background());
    }
}
