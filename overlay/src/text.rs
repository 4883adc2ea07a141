//! Text renderer using cosmic-text and tiny-skia
//!
//! Lays out a block of text and paints it with an optional background fill
//! and a drop shadow. Hand it to an overlay with
//! [`TextRenderer::into_renderer`].

use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use cosmic_text::{
    Align, Attrs, Buffer, Color as CosmicColor, Family, FontSystem, LayoutGlyph, Metrics,
    Shaping, Style, SwashCache, Weight, Wrap,
};
use tiny_skia::{Color, Paint, PixmapMut, Rect, Transform};
use tracing::debug;

use crate::error::Result;
use crate::geometry::{Anchor, Coordinate, ScreenInfo};
use crate::render::Renderer;

static FONT_SYSTEM: OnceLock<Mutex<FontSystem>> = OnceLock::new();

/// Shared font database, loaded on first use
pub(crate) fn font_system() -> MutexGuard<'static, FontSystem> {
    FONT_SYSTEM
        .get_or_init(|| {
            let fonts = FontSystem::new();
            debug!(faces = fonts.db().len(), "font database loaded");
            Mutex::new(fonts)
        })
        .lock()
        .unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

impl Alignment {
    /// Alignment from its numeric code (0 left, 1 center, 2 right)
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Left),
            1 => Some(Self::Center),
            2 => Some(Self::Right),
            _ => None,
        }
    }

    fn to_cosmic(self) -> Align {
        match self {
            Self::Left => Align::Left,
            Self::Center => Align::Center,
            Self::Right => Align::Right,
        }
    }
}

/// Font family, size and face, parsed from strings like `"Sans Bold 24"`
#[derive(Debug, Clone, PartialEq)]
pub struct FontSpec {
    /// Empty selects the default sans-serif face
    pub family: String,
    pub size: f32,
    pub bold: bool,
    pub italic: bool,
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            family: String::new(),
            size: 24.0,
            bold: false,
            italic: false,
        }
    }
}

impl FontSpec {
    pub fn parse(desc: &str) -> Self {
        let mut spec = Self::default();
        let mut words: Vec<&str> = desc.split_whitespace().collect();

        if let Some(size) = words.last().and_then(|w| w.parse::<f32>().ok())
            && size > 0.0
        {
            spec.size = size;
            words.pop();
        }
        while let Some(word) = words.last() {
            match word.to_ascii_lowercase().as_str() {
                "bold" => spec.bold = true,
                "italic" | "oblique" => spec.italic = true,
                "regular" | "normal" => {}
                _ => break,
            }
            words.pop();
        }
        spec.family = words.join(" ");
        spec
    }

    fn attrs(&self) -> Attrs<'_> {
        let family = if self.family.is_empty() {
            Family::SansSerif
        } else {
            Family::Name(&self.family)
        };
        let mut attrs = Attrs::new().family(family);
        if self.bold {
            attrs = attrs.weight(Weight::BOLD);
        }
        if self.italic {
            attrs = attrs.style(Style::Italic);
        }
        attrs
    }
}

/// Colors and spacing of rendered text
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub font: FontSpec,
    pub alignment: Alignment,
    /// Margin between the window edge and the text
    pub padding: u32,
    pub fore: Color,
    pub shadow: Color,
    pub shadow_offset: (i32, i32),
    /// Fill behind the text; fully transparent draws nothing
    pub back: Color,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font: FontSpec::default(),
            alignment: Alignment::Left,
            padding: 4,
            fore: Color::from_rgba8(0, 255, 0, 255),
            shadow: Color::from_rgba8(0, 0, 0, 127),
            shadow_offset: (1, 1),
            back: Color::TRANSPARENT,
        }
    }
}

impl TextStyle {
    /// Space taken by the shadow on each axis
    fn shadow_extent(&self) -> (u32, u32) {
        (
            self.shadow_offset.0.unsigned_abs(),
            self.shadow_offset.1.unsigned_abs(),
        )
    }
}

/// Shaped glyphs, one entry per visual line
struct Layout {
    lines: Vec<(f32, Vec<LayoutGlyph>)>,
    width: f32,
    height: f32,
}

pub struct TextRenderer {
    style: TextStyle,
    text: String,
    wrap_width: Option<f32>,
    swash_cache: SwashCache,
    layout: Option<Layout>,
}

impl TextRenderer {
    pub fn new(style: TextStyle) -> Self {
        Self {
            style,
            text: String::new(),
            wrap_width: None,
            swash_cache: SwashCache::new(),
            layout: None,
        }
    }

    /// Replace the text. Newlines start new lines.
    pub fn set_text(&mut self, text: &str) {
        if self.text != text {
            self.text = text.to_string();
            self.layout = None;
        }
    }

    /// Wrap lines at `width` pixels of text, or never for `None`
    pub fn set_wrap_width(&mut self, width: Option<f32>) {
        let width = width.filter(|w| *w > 0.0);
        if self.wrap_width != width {
            self.wrap_width = width;
            self.layout = None;
        }
    }

    /// Widest text that fits on an output (or the whole screen for `None`)
    /// once padding, shadow and the horizontal offset are taken into account.
    /// `None` when nothing fits.
    pub fn screen_wrap_width(
        &self,
        screen: &ScreenInfo,
        output: Option<usize>,
        anchor: Anchor,
        x_offset: i32,
    ) -> Result<Option<f32>> {
        let area = screen.area(output)?;
        let (shadow_x, _) = self.style.shadow_extent();
        let chrome = 2 * i64::from(self.style.padding) + i64::from(shadow_x);
        // Offsets push away from the anchored edge.
        let offset = match anchor.horizontal {
            Coordinate::Maximum => i64::from(x_offset),
            Coordinate::Minimum | Coordinate::Center => -i64::from(x_offset),
        };
        let width = i64::from(area.width) - chrome + offset;
        Ok((width > 0).then_some(width as f32))
    }

    fn ensure_layout(&mut self) -> &Layout {
        let layout = match self.layout.take() {
            Some(layout) => layout,
            None => self.shape(),
        };
        self.layout.insert(layout)
    }

    fn shape(&self) -> Layout {
        let font = &self.style.font;
        let mut fonts = font_system();
        let metrics = Metrics::new(font.size, (font.size * 1.2).ceil());
        let mut buffer = Buffer::new(&mut fonts, metrics);
        buffer.set_wrap(&mut fonts, Wrap::WordOrGlyph);
        buffer.set_size(&mut fonts, self.wrap_width, None);
        buffer.set_text(
            &mut fonts,
            &self.text,
            &font.attrs(),
            Shaping::Advanced,
            Some(self.style.alignment.to_cosmic()),
        );
        buffer.shape_until_scroll(&mut fonts, false);

        let mut layout = Layout {
            lines: Vec::new(),
            width: 0.0,
            height: 0.0,
        };
        for run in buffer.layout_runs() {
            layout.width = layout.width.max(run.line_w);
            layout.height = layout.height.max(run.line_top + run.line_height);
            layout.lines.push((run.line_y, run.glyphs.to_vec()));
        }
        debug!(
            lines = layout.lines.len(),
            width = layout.width,
            height = layout.height,
            "text shaped"
        );
        layout
    }

    /// Window size needed to show the text with padding and shadow
    pub fn size(&mut self) -> (u32, u32) {
        let padding = self.style.padding;
        let (shadow_x, shadow_y) = self.style.shadow_extent();
        let wrap_width = self.wrap_width;
        let layout = self.ensure_layout();
        let text_w = match wrap_width {
            Some(wrap) => layout.width.min(wrap),
            None => layout.width,
        };
        let width = text_w.ceil() as u32 + 2 * padding + shadow_x;
        let height = layout.height.ceil() as u32 + 2 * padding + shadow_y;
        (width.max(1), height.max(1))
    }

    /// Paint background, shadow and text into `pixmap`
    pub fn paint(&mut self, pixmap: &mut PixmapMut<'_>) {
        let style = self.style.clone();

        let (width, height) = (pixmap.width() as f32, pixmap.height() as f32);
        if style.back.alpha() > 0.0
            && let Some(rect) = Rect::from_xywh(0.0, 0.0, width, height)
        {
            let mut paint = Paint::default();
            paint.set_color(style.back);
            pixmap.fill_rect(rect, &paint, Transform::identity(), None);
        }

        let padding = style.padding as f32;
        let (dx, dy) = style.shadow_offset;
        // The text sits on the side opposite to the shadow.
        let text_x = padding + (-dx).max(0) as f32;
        let text_y = padding + (-dy).max(0) as f32;

        if (dx, dy) != (0, 0) && style.shadow.alpha() > 0.0 {
            self.draw_text(pixmap, text_x + dx as f32, text_y + dy as f32, style.shadow);
        }
        if style.fore.alpha() > 0.0 {
            self.draw_text(pixmap, text_x, text_y, style.fore);
        }
    }

    fn draw_text(&mut self, pixmap: &mut PixmapMut<'_>, x: f32, y: f32, color: Color) {
        let color = color.to_color_u8();
        let text_color = CosmicColor::rgba(color.red(), color.green(), color.blue(), color.alpha());

        self.ensure_layout();
        let Some(layout) = self.layout.as_ref() else {
            return;
        };
        let mut fonts = font_system();

        for (line_y, glyphs) in &layout.lines {
            for glyph in glyphs {
                let physical = glyph.physical((x, y + line_y), 1.0);
                let Some(image) = self
                    .swash_cache
                    .get_image(&mut fonts, physical.cache_key)
                    .as_ref()
                else {
                    continue;
                };
                draw_glyph_to_pixmap(
                    pixmap,
                    &image.data,
                    image.placement.width,
                    image.placement.height,
                    physical.x + image.placement.left,
                    physical.y - image.placement.top,
                    text_color,
                );
            }
        }
    }

    /// Wrap a shared text renderer as an overlay paint routine
    pub fn into_renderer(shared: Arc<Mutex<TextRenderer>>) -> Renderer {
        Box::new(move |pixmap: &mut PixmapMut<'_>| {
            shared
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .paint(pixmap);
        })
    }
}

impl std::fmt::Debug for TextRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextRenderer")
            .field("style", &self.style)
            .field("text", &self.text)
            .field("wrap_width", &self.wrap_width)
            .finish()
    }
}

/// Blend a glyph coverage mask onto a premultiplied pixmap
fn draw_glyph_to_pixmap(
    pixmap: &mut PixmapMut<'_>,
    glyph_data: &[u8],
    glyph_width: u32,
    glyph_height: u32,
    dest_x: i32,
    dest_y: i32,
    color: CosmicColor,
) {
    let pixmap_width = pixmap.width() as i32;
    let pixmap_height = pixmap.height() as i32;
    let data = pixmap.data_mut();

    for gy in 0..glyph_height as i32 {
        let py = dest_y + gy;
        if py < 0 || py >= pixmap_height {
            continue;
        }

        for gx in 0..glyph_width as i32 {
            let px = dest_x + gx;
            if px < 0 || px >= pixmap_width {
                continue;
            }

            let glyph_idx = (gy as u32 * glyph_width + gx as u32) as usize;
            let Some(&alpha) = glyph_data.get(glyph_idx) else {
                continue;
            };
            if alpha == 0 {
                continue;
            }

            let pixel_idx = ((py as u32 * pixmap_width as u32 + px as u32) * 4) as usize;
            if pixel_idx + 3 >= data.len() {
                continue;
            }

            let src_a = (alpha as u32 * color.a() as u32) / 255;
            let inv_a = 255 - src_a;

            data[pixel_idx] =
                ((color.r() as u32 * src_a + data[pixel_idx] as u32 * inv_a) / 255) as u8;
            data[pixel_idx + 1] =
                ((color.g() as u32 * src_a + data[pixel_idx + 1] as u32 * inv_a) / 255) as u8;
            data[pixel_idx + 2] =
                ((color.b() as u32 * src_a + data[pixel_idx + 2] as u32 * inv_a) / 255) as u8;
            data[pixel_idx + 3] = (src_a + (data[pixel_idx + 3] as u32 * inv_a) / 255) as u8;
        }
    }
}
