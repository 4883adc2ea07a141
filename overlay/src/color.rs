//! Color parsing for text styles
//!
//! Accepts `#rgb`, `#rrggbb` and the common rgb.txt color names
//! (case-insensitive, spaces ignored).

use phf::phf_map;
use thiserror::Error;
use tiny_skia::Color;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorError {
    #[error("empty color")]
    Empty,

    #[error("invalid hex color '{0}'")]
    InvalidHex(String),

    #[error("unknown color name '{0}'")]
    UnknownName(String),
}

static NAMED_COLORS: phf::Map<&'static str, [u8; 3]> = phf_map! {
    "black" => [0, 0, 0],
    "white" => [255, 255, 255],
    "red" => [255, 0, 0],
    "green" => [0, 255, 0],
    "blue" => [0, 0, 255],
    "yellow" => [255, 255, 0],
    "cyan" => [0, 255, 255],
    "magenta" => [255, 0, 255],
    "orange" => [255, 165, 0],
    "purple" => [160, 32, 240],
    "pink" => [255, 192, 203],
    "brown" => [165, 42, 42],
    "gold" => [255, 215, 0],
    "navy" => [0, 0, 128],
    "navyblue" => [0, 0, 128],
    "gray" => [190, 190, 190],
    "grey" => [190, 190, 190],
    "darkgray" => [169, 169, 169],
    "darkgrey" => [169, 169, 169],
    "lightgray" => [211, 211, 211],
    "lightgrey" => [211, 211, 211],
    "dimgray" => [105, 105, 105],
    "slategray" => [112, 128, 144],
    "darkred" => [139, 0, 0],
    "darkgreen" => [0, 100, 0],
    "darkblue" => [0, 0, 139],
    "lightblue" => [173, 216, 230],
    "lightgreen" => [144, 238, 144],
    "limegreen" => [50, 205, 50],
    "forestgreen" => [34, 139, 34],
    "seagreen" => [46, 139, 87],
    "skyblue" => [135, 206, 235],
    "steelblue" => [70, 130, 180],
    "royalblue" => [65, 105, 225],
    "dodgerblue" => [30, 144, 255],
    "turquoise" => [64, 224, 208],
    "violet" => [238, 130, 238],
    "orchid" => [218, 112, 214],
    "salmon" => [250, 128, 114],
    "tomato" => [255, 99, 71],
    "coral" => [255, 127, 80],
    "khaki" => [240, 230, 140],
    "beige" => [245, 245, 220],
    "ivory" => [255, 255, 240],
    "wheat" => [245, 222, 179],
    "tan" => [210, 180, 140],
    "chocolate" => [210, 105, 30],
    "firebrick" => [178, 34, 34],
    "maroon" => [176, 48, 96],
    "darkorange" => [255, 140, 0],
    "goldenrod" => [218, 165, 32],
};

fn hex_digit(c: u8) -> Option<u8> {
    (c as char).to_digit(16).map(|d| d as u8)
}

fn parse_hex(hex: &str) -> Option<[u8; 3]> {
    let digits: Vec<u8> = hex.bytes().map(hex_digit).collect::<Option<_>>()?;
    match digits.as_slice() {
        [r, g, b] => Some([r * 17, g * 17, b * 17]),
        [r1, r2, g1, g2, b1, b2] => Some([r1 * 16 + r2, g1 * 16 + g2, b1 * 16 + b2]),
        _ => None,
    }
}

/// Parse a color spec into RGB
pub fn parse_rgb(spec: &str) -> Result<[u8; 3], ColorError> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(ColorError::Empty);
    }
    if let Some(hex) = spec.strip_prefix('#') {
        return parse_hex(hex).ok_or_else(|| ColorError::InvalidHex(spec.to_string()));
    }

    let key: String = spec
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    NAMED_COLORS
        .get(key.as_str())
        .copied()
        .ok_or_else(|| ColorError::UnknownName(spec.to_string()))
}

/// Parse a color spec and apply an opacity
pub fn parse_color(spec: &str, opacity: u8) -> Result<Color, ColorError> {
    let [r, g, b] = parse_rgb(spec)?;
    Ok(color_from_rgba([r, g, b, opacity]))
}

/// Convert [u8; 4] RGBA array to tiny_skia Color
#[inline]
pub fn color_from_rgba(rgba: [u8; 4]) -> Color {
    Color::from_rgba8(rgba[0], rgba[1], rgba[2], rgba[3])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_forms() {
        assert_eq!(parse_rgb("#fff"), Ok([255, 255, 255]));
        assert_eq!(parse_rgb("#1a2B3c"), Ok([0x1a, 0x2b, 0x3c]));
        assert_eq!(parse_rgb("#0f0"), Ok([0, 255, 0]));
    }

    #[test]
    fn test_named_colors() {
        assert_eq!(parse_rgb("green"), Ok([0, 255, 0]));
        assert_eq!(parse_rgb("Navy Blue"), Ok([0, 0, 128]));
        assert_eq!(parse_rgb("  Black "), Ok([0, 0, 0]));
    }

    #[test]
    fn test_rejects_bad_specs() {
        assert_eq!(parse_rgb(""), Err(ColorError::Empty));
        assert!(matches!(parse_rgb("#12"), Err(ColorError::InvalidHex(_))));
        assert!(matches!(parse_rgb("#ggg"), Err(ColorError::InvalidHex(_))));
        assert!(matches!(
            parse_rgb("blurple"),
            Err(ColorError::UnknownName(_))
        ));
    }

    #[test]
    fn test_opacity_applied() {
        let c = parse_color("white", 128).unwrap().to_color_u8();
        assert_eq!((c.red(), c.green(), c.blue(), c.alpha()), (255, 255, 255, 128));
    }
}
