//! Collage layouts and shot timers.
//!
//! `CollageLayout` is the single table that decides both how many shots the
//! capture sequencer takes and how the compositor arranges them. Nothing else
//! in the crate is allowed to hardcode a shot count.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Named grid shape of the final collage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CollageLayout {
    #[default]
    #[serde(rename = "SINGLE")]
    Single,
    #[serde(rename = "GRID_2X2")]
    Grid2x2,
    #[serde(rename = "STRIP_3")]
    Strip3,
    #[serde(rename = "STRIP_4")]
    Strip4,
    #[serde(rename = "GRID_2X3")]
    Grid2x3,
    #[serde(rename = "GRID_3X3")]
    Grid3x3,
}

/// Grid geometry of a layout: (columns, rows, shots).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutSpec {
    pub cols: u32,
    pub rows: u32,
    pub shots: usize,
}

impl CollageLayout {
    /// All supported layouts, in menu order.
    pub const ALL: [CollageLayout; 6] = [
        CollageLayout::Single,
        CollageLayout::Grid2x2,
        CollageLayout::Strip3,
        CollageLayout::Strip4,
        CollageLayout::Grid2x3,
        CollageLayout::Grid3x3,
    ];

    pub const fn spec(self) -> LayoutSpec {
        let (cols, rows, shots) = match self {
            CollageLayout::Single => (1, 1, 1),
            CollageLayout::Grid2x2 => (2, 2, 4),
            CollageLayout::Strip3 => (1, 3, 3),
            CollageLayout::Strip4 => (1, 4, 4),
            // "Grid 6" is three columns over two rows
            CollageLayout::Grid2x3 => (3, 2, 6),
            CollageLayout::Grid3x3 => (3, 3, 9),
        };
        LayoutSpec { cols, rows, shots }
    }

    pub const fn cols(self) -> u32 {
        self.spec().cols
    }

    pub const fn rows(self) -> u32 {
        self.spec().rows
    }

    /// Number of frames a capture session must produce for this layout.
    pub const fn shots(self) -> usize {
        self.spec().shots
    }

    /// Grid cell of the i-th captured frame (row-major).
    pub fn cell(self, index: usize) -> (u32, u32) {
        let cols = self.cols() as usize;
        ((index % cols) as u32, (index / cols) as u32)
    }

    pub fn label(self) -> &'static str {
        match self {
            CollageLayout::Single => "Single",
            CollageLayout::Grid2x2 => "Grid 2x2",
            CollageLayout::Strip3 => "Strip 3",
            CollageLayout::Strip4 => "Strip 4",
            CollageLayout::Grid2x3 => "Grid 6",
            CollageLayout::Grid3x3 => "Grid 9",
        }
    }

    /// Kebab-case identifier used on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            CollageLayout::Single => "single",
            CollageLayout::Grid2x2 => "grid-2x2",
            CollageLayout::Strip3 => "strip-3",
            CollageLayout::Strip4 => "strip-4",
            CollageLayout::Grid2x3 => "grid-2x3",
            CollageLayout::Grid3x3 => "grid-3x3",
        }
    }
}

impl fmt::Display for CollageLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for enum-valued settings that arrive as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub kind: &'static str,
    pub input: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: '{}'", self.kind, self.input)
    }
}

impl std::error::Error for ParseError {}

/// Lowercase and fold `_`/space into `-` so `GRID_2X2`, `grid 2x2` and
/// `grid-2x2` all name the same thing.
pub(crate) fn normalize_name(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '_' || c == ' ' { '-' } else { c })
        .collect()
}

impl FromStr for CollageLayout {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = normalize_name(s);
        let layout = match name.as_str() {
            "single" | "1" => CollageLayout::Single,
            "grid-2x2" | "grid2x2" | "2x2" => CollageLayout::Grid2x2,
            "strip-3" | "strip3" => CollageLayout::Strip3,
            "strip-4" | "strip4" => CollageLayout::Strip4,
            "grid-2x3" | "grid2x3" | "grid-6" => CollageLayout::Grid2x3,
            "grid-3x3" | "grid3x3" | "grid-9" => CollageLayout::Grid3x3,
            _ => {
                return Err(ParseError {
                    kind: "layout",
                    input: s.to_string(),
                })
            }
        };
        Ok(layout)
    }
}

/// Per-shot countdown length. Only the three booth presets are valid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum TimerDuration {
    #[default]
    Three,
    Five,
    Ten,
}

impl TimerDuration {
    pub const ALL: [TimerDuration; 3] = [TimerDuration::Three, TimerDuration::Five, TimerDuration::Ten];

    pub const fn seconds(self) -> u32 {
        match self {
            TimerDuration::Three => 3,
            TimerDuration::Five => 5,
            TimerDuration::Ten => 10,
        }
    }

    pub fn duration(self) -> Duration {
        Duration::from_secs(self.seconds() as u64)
    }

    pub fn from_seconds(secs: u32) -> Option<Self> {
        match secs {
            3 => Some(TimerDuration::Three),
            5 => Some(TimerDuration::Five),
            10 => Some(TimerDuration::Ten),
            _ => None,
        }
    }
}

impl TryFrom<u32> for TimerDuration {
    type Error = ParseError;

    fn try_from(secs: u32) -> Result<Self, Self::Error> {
        TimerDuration::from_seconds(secs).ok_or_else(|| ParseError {
            kind: "timer",
            input: secs.to_string(),
        })
    }
}

impl From<TimerDuration> for u32 {
    fn from(t: TimerDuration) -> u32 {
        t.seconds()
    }
}

impl FromStr for TimerDuration {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().trim_end_matches('s');
        digits
            .parse::<u32>()
            .ok()
            .and_then(TimerDuration::from_seconds)
            .ok_or_else(|| ParseError {
                kind: "timer",
                input: s.to_string(),
            })
    }
}

impl fmt::Display for TimerDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.seconds())
    }
}
