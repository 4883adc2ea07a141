//! Command-line options

use std::path::PathBuf;
use std::time::Duration;

use aosd::{
    Alignment, Anchor, FadeTiming, FontSpec, TextStyle, Transparency, color::ColorError,
    parse_color,
};
use clap::Parser;

const NOTES: &str = "\
Notes on command line parameters:
- Opacity values range over 0-255.
- Position 0-8 runs left to right, top to bottom: 0 is the top-left
  corner, 4 the center and 8 the bottom-right corner.
- Transparency: 0=none, 1=fake, 2=composite.
- Colors are #rgb, #rrggbb or a color name from rgb.txt.
- Timing parameters are in milliseconds, age and input timeout in seconds.
- A scrollback limit of 0 disables it.
- A wrap width of 0 wraps at the width of the selected output.
- Set AOSD_DEBUG=1 for debug logging; RUST_LOG overrides the filter.";

#[derive(Parser, Debug, Clone)]
#[command(
    name = "aosd_cat",
    version,
    about = "Displays UTF-8 text in a transparent OSD frame",
    after_help = NOTES
)]
pub struct Config {
    // Opacity
    #[arg(short = 'b', long, default_value_t = 0, help_heading = "Opacity")]
    pub back_opacity: u8,
    #[arg(short = 's', long, default_value_t = 127, help_heading = "Opacity")]
    pub shadow_opacity: u8,
    #[arg(short = 'r', long, default_value_t = 255, help_heading = "Opacity")]
    pub fore_opacity: u8,

    // Geometry
    /// Output index, -1 for the whole screen
    #[arg(
        short = 'O',
        long,
        default_value_t = -1,
        allow_negative_numbers = true,
        value_parser = clap::value_parser!(i32).range(-1..),
        help_heading = "Geometry"
    )]
    pub output: i32,
    /// Window position (0-8)
    #[arg(
        short = 'p',
        long,
        default_value_t = 0,
        value_parser = clap::value_parser!(u8).range(0..=8),
        help_heading = "Geometry"
    )]
    pub position: u8,
    #[arg(
        short = 'x',
        long,
        default_value_t = 0,
        allow_negative_numbers = true,
        help_heading = "Geometry"
    )]
    pub x_offset: i32,
    #[arg(
        short = 'y',
        long,
        default_value_t = 0,
        allow_negative_numbers = true,
        help_heading = "Geometry"
    )]
    pub y_offset: i32,
    #[arg(
        short = 'e',
        long,
        default_value_t = 1,
        allow_negative_numbers = true,
        help_heading = "Geometry"
    )]
    pub shadow_offset: i8,
    /// Margin from the edge to the contents
    #[arg(short = 'd', long, default_value_t = 4, help_heading = "Geometry")]
    pub padding: u8,

    // Appearance
    /// Transparency mode (0=none, 1=fake, 2=composite)
    #[arg(
        short = 't',
        long,
        default_value_t = 1,
        value_parser = clap::value_parser!(u8).range(0..=2),
        help_heading = "Appearance"
    )]
    pub transparency: u8,
    #[arg(
        short = 'n',
        long,
        default_value = "Times New Roman Italic 24",
        help_heading = "Appearance"
    )]
    pub font: String,
    /// Wrapping width in pixels
    #[arg(short = 'w', long, default_value_t = 0, help_heading = "Appearance")]
    pub width: u32,
    /// Text alignment (0=left, 1=center, 2=right)
    #[arg(
        short = 'A',
        long,
        default_value_t = 0,
        value_parser = clap::value_parser!(u8).range(0..=2),
        help_heading = "Appearance"
    )]
    pub alignment: u8,

    // Coloring
    #[arg(short = 'B', long, default_value = "black", help_heading = "Coloring")]
    pub back_color: String,
    #[arg(short = 'S', long, default_value = "black", help_heading = "Coloring")]
    pub shadow_color: String,
    #[arg(short = 'R', long, default_value = "green", help_heading = "Coloring")]
    pub fore_color: String,

    // Timing
    #[arg(short = 'f', long, default_value_t = 100, help_heading = "Timing")]
    pub fade_in: u64,
    /// Time shown at full opacity
    #[arg(short = 'u', long, default_value_t = 1000, help_heading = "Timing")]
    pub fade_full: u64,
    #[arg(short = 'o', long, default_value_t = 100, help_heading = "Timing")]
    pub fade_out: u64,

    // Scrollback
    /// Remove lines older than this many seconds
    #[arg(short = 'a', long, default_value_t = 0, help_heading = "Scrollback")]
    pub age: u64,
    /// Keep at most this many lines
    #[arg(short = 'l', long, default_value_t = 0, help_heading = "Scrollback")]
    pub lines: usize,

    /// Wait until the display is clear before showing the next line
    #[arg(short = 'W', long)]
    pub wait: bool,
    /// Reopen the input on EOF (ignored for stdin)
    #[arg(short = 'k', long)]
    pub keep_reading: bool,
    /// Input file, - for stdin
    #[arg(short = 'i', long, default_value = "-")]
    pub input: String,
    /// Stop reading after this many seconds without input, 0 waits forever
    #[arg(short = 'T', long, default_value_t = 0)]
    pub input_timeout: u64,
}

impl Config {
    /// `None` selects the whole screen
    pub fn output_index(&self) -> Option<usize> {
        usize::try_from(self.output).ok()
    }

    pub fn anchor(&self) -> Anchor {
        Anchor::from_index(self.position).unwrap_or(Anchor::TOP_LEFT)
    }

    pub fn transparency_mode(&self) -> Transparency {
        Transparency::from_index(self.transparency).unwrap_or_default()
    }

    pub fn timing(&self) -> FadeTiming {
        FadeTiming::from_millis(self.fade_in, self.fade_full, self.fade_out)
    }

    pub fn max_age(&self) -> Option<Duration> {
        (self.age > 0).then(|| Duration::from_secs(self.age))
    }

    pub fn input_timeout(&self) -> Option<Duration> {
        (self.input_timeout > 0).then(|| Duration::from_secs(self.input_timeout))
    }

    /// `None` reads stdin
    pub fn input_path(&self) -> Option<PathBuf> {
        (self.input != "-").then(|| PathBuf::from(&self.input))
    }

    pub fn wrap_width(&self) -> Option<f32> {
        (self.width > 0).then_some(self.width as f32)
    }

    pub fn text_style(&self) -> Result<TextStyle, ColorError> {
        let shadow = i32::from(self.shadow_offset);
        Ok(TextStyle {
            font: FontSpec::parse(&self.font),
            alignment: Alignment::from_index(self.alignment).unwrap_or_default(),
            padding: u32::from(self.padding),
            fore: parse_color(&self.fore_color, self.fore_opacity)?,
            shadow: parse_color(&self.shadow_color, self.shadow_opacity)?,
            shadow_offset: (shadow, shadow),
            back: parse_color(&self.back_color, self.back_opacity)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aosd::Coordinate;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["aosd_cat"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert_eq!(config.output_index(), None);
        assert_eq!(config.anchor(), Anchor::TOP_LEFT);
        assert_eq!(config.transparency_mode(), Transparency::Fake);
        assert_eq!(config.timing(), FadeTiming::from_millis(100, 1000, 100));
        assert_eq!(config.input_path(), None);
        assert_eq!(config.input_timeout(), None);
        assert!(!config.wait);

        let style = config.text_style().unwrap();
        assert_eq!(style.font.family, "Times New Roman");
        assert_eq!(style.back.alpha(), 0.0);
    }

    #[test]
    fn test_short_flags_and_negative_offsets() {
        let config = parse(&[
            "-p", "8", "-x", "-20", "-y", "15", "-O", "1", "-t", "2", "-W", "-i", "/tmp/feed",
        ]);
        assert_eq!(config.anchor().horizontal, Coordinate::Maximum);
        assert_eq!(config.anchor().vertical, Coordinate::Maximum);
        assert_eq!((config.x_offset, config.y_offset), (-20, 15));
        assert_eq!(config.output_index(), Some(1));
        assert_eq!(config.transparency_mode(), Transparency::Composite);
        assert!(config.wait);
        assert_eq!(config.input_path(), Some(PathBuf::from("/tmp/feed")));
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        for args in [
            &["aosd_cat", "-p", "9"][..],
            &["aosd_cat", "-t", "3"],
            &["aosd_cat", "-A", "5"],
            &["aosd_cat", "-O", "-2"],
            &["aosd_cat", "-b", "256"],
        ] {
            assert!(Config::try_parse_from(args).is_err(), "{args:?}");
        }
    }

    #[test]
    fn test_bad_color_reported() {
        let config = parse(&["-R", "#12345"]);
        assert!(matches!(
            config.text_style(),
            Err(ColorError::InvalidHex(_))
        ));
    }
}
