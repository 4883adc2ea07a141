//! Window geometry, display outputs and anchor placement

use crate::error::{AosdError, Result};

/// Position and size of the overlay window in root-window coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// True when the window would have no pixels to draw
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn same_size(&self, other: &Geometry) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Check if a point is within this rectangle
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x
            && x < self.x + self.width as i32
            && y >= self.y
            && y < self.y + self.height as i32
    }
}

/// Information about a connected display output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputInfo {
    /// Output name as reported by the display server
    pub name: String,
    /// Area covered by the output in root coordinates
    pub area: Geometry,
    /// Whether this is the primary output
    pub is_primary: bool,
}

/// Screen dimensions plus the outputs that tile it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScreenInfo {
    pub width: u32,
    pub height: u32,
    pub outputs: Vec<OutputInfo>,
}

impl ScreenInfo {
    /// Whole-screen area
    pub fn bounds(&self) -> Geometry {
        Geometry::new(0, 0, self.width, self.height)
    }

    /// Area to position against.
    ///
    /// `None` selects the whole screen. A screen reporting no outputs is
    /// treated as a single output at index 0.
    pub fn area(&self, output: Option<usize>) -> Result<Geometry> {
        match output {
            None => Ok(self.bounds()),
            Some(0) if self.outputs.is_empty() => Ok(self.bounds()),
            Some(index) => self
                .outputs
                .get(index)
                .map(|o| o.area)
                .ok_or(AosdError::InvalidOutput(index)),
        }
    }

    /// Index of the primary output, falling back to the first one
    pub fn primary_output(&self) -> Option<usize> {
        self.outputs
            .iter()
            .position(|o| o.is_primary)
            .or(if self.outputs.is_empty() { None } else { Some(0) })
    }
}

/// Placement of the window along one axis of the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Coordinate {
    /// Left or top edge
    #[default]
    Minimum,
    Center,
    /// Right or bottom edge
    Maximum,
}

impl Coordinate {
    fn from_index(index: u8) -> Self {
        match index {
            0 => Self::Minimum,
            1 => Self::Center,
            _ => Self::Maximum,
        }
    }

    fn index(self) -> u8 {
        match self {
            Self::Minimum => 0,
            Self::Center => 1,
            Self::Maximum => 2,
        }
    }

    /// Start coordinate of a span of `size` within `[origin, origin + extent)`
    fn place(self, origin: i32, extent: u32, size: u32) -> i32 {
        let free = extent as i32 - size as i32;
        match self {
            Self::Minimum => origin,
            Self::Center => origin + free / 2,
            Self::Maximum => origin + free,
        }
    }
}

/// One of the nine anchor points of an output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Anchor {
    pub horizontal: Coordinate,
    pub vertical: Coordinate,
}

impl Anchor {
    pub const TOP_LEFT: Self = Self::new(Coordinate::Minimum, Coordinate::Minimum);
    pub const CENTER: Self = Self::new(Coordinate::Center, Coordinate::Center);
    pub const BOTTOM_RIGHT: Self = Self::new(Coordinate::Maximum, Coordinate::Maximum);

    pub const fn new(horizontal: Coordinate, vertical: Coordinate) -> Self {
        Self {
            horizontal,
            vertical,
        }
    }

    /// Anchor from a grid index in `0..=8`, 0 being top-left and 8 bottom-right
    pub fn from_index(index: u8) -> Option<Self> {
        (index <= 8).then(|| {
            Self::new(
                Coordinate::from_index(index % 3),
                Coordinate::from_index(index / 3),
            )
        })
    }

    pub fn index(&self) -> u8 {
        self.vertical.index() * 3 + self.horizontal.index()
    }

    /// Place a `width`×`height` window inside `area`, then shift it by the offsets
    pub fn place(
        &self,
        area: Geometry,
        width: u32,
        height: u32,
        x_offset: i32,
        y_offset: i32,
    ) -> Geometry {
        Geometry {
            x: self.horizontal.place(area.x, area.width, width) + x_offset,
            y: self.vertical.place(area.y, area.height, height) + y_offset,
            width,
            height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dual_head() -> ScreenInfo {
        ScreenInfo {
            width: 3840,
            height: 1080,
            outputs: vec![
                OutputInfo {
                    name: "DP-1".into(),
                    area: Geometry::new(0, 0, 1920, 1080),
                    is_primary: false,
                },
                OutputInfo {
                    name: "HDMI-1".into(),
                    area: Geometry::new(1920, 0, 1920, 1080),
                    is_primary: true,
                },
            ],
        }
    }

    #[test]
    fn test_anchor_index_round_trips_grid() {
        let anchor = Anchor::from_index(5).unwrap();
        assert_eq!(anchor.horizontal, Coordinate::Maximum);
        assert_eq!(anchor.vertical, Coordinate::Center);
        assert_eq!(anchor.index(), 5);
        assert!(Anchor::from_index(9).is_none());
    }

    #[test]
    fn test_place_bottom_right_on_second_output() {
        let screen = dual_head();
        let area = screen.area(Some(1)).unwrap();
        let geom = Anchor::BOTTOM_RIGHT.place(area, 200, 50, -10, -20);
        assert_eq!(geom, Geometry::new(1920 + 1720 - 10, 1030 - 20, 200, 50));
    }

    #[test]
    fn test_place_center_whole_screen() {
        let screen = dual_head();
        let geom = Anchor::CENTER.place(screen.area(None).unwrap(), 200, 50, 0, 0);
        assert_eq!(geom, Geometry::new(1820, 515, 200, 50));
    }

    #[test]
    fn test_unknown_output_is_rejected() {
        let screen = dual_head();
        assert_eq!(screen.area(Some(2)), Err(AosdError::InvalidOutput(2)));
    }

    #[test]
    fn test_screen_without_outputs_accepts_index_zero() {
        let screen = ScreenInfo {
            width: 800,
            height: 600,
            outputs: Vec::new(),
        };
        assert_eq!(screen.area(Some(0)).unwrap(), Geometry::new(0, 0, 800, 600));
        assert_eq!(screen.primary_output(), None);
        assert_eq!(dual_head().primary_output(), Some(1));
    }

    #[test]
    fn test_contains_is_half_open() {
        let g = Geometry::new(10, 10, 5, 5);
        assert!(g.contains(10, 10));
        assert!(g.contains(14, 14));
        assert!(!g.contains(15, 10));
    }
}
