//! Live-preview filters and export frame overlays.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::layout::{normalize_name, ParseError};

/// Decorative filter drawn over the live preview. Never reaches the export.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterSelection {
    #[default]
    None,
    FutureExplorer,
    Constellation,
    OrbitAura,
    Ticket,
}

impl FilterSelection {
    pub const ALL: [FilterSelection; 5] = [
        FilterSelection::None,
        FilterSelection::FutureExplorer,
        FilterSelection::Constellation,
        FilterSelection::OrbitAura,
        FilterSelection::Ticket,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FilterSelection::None => "Normal",
            FilterSelection::FutureExplorer => "Future",
            FilterSelection::Constellation => "Connect",
            FilterSelection::OrbitAura => "Aura",
            FilterSelection::Ticket => "Ticket",
        }
    }

    /// Whether the filter reads face detections at all.
    pub fn uses_faces(self) -> bool {
        matches!(self, FilterSelection::FutureExplorer | FilterSelection::Constellation)
    }
}

impl FromStr for FilterSelection {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_name(s).as_str() {
            "none" | "normal" => Ok(FilterSelection::None),
            "future-explorer" | "future" => Ok(FilterSelection::FutureExplorer),
            "constellation" | "connect" => Ok(FilterSelection::Constellation),
            "orbit-aura" | "aura" => Ok(FilterSelection::OrbitAura),
            "ticket" => Ok(FilterSelection::Ticket),
            _ => Err(ParseError {
                kind: "filter",
                input: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for FilterSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Full-canvas theme painted into the exported collage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FrameOverlay {
    #[default]
    None,
    Cockpit,
    Magazine,
}

impl FrameOverlay {
    pub const ALL: [FrameOverlay; 3] = [FrameOverlay::None, FrameOverlay::Cockpit, FrameOverlay::Magazine];

    pub fn label(self) -> &'static str {
        match self {
            FrameOverlay::None => "None",
            FrameOverlay::Cockpit => "Cockpit",
            FrameOverlay::Magazine => "Mag",
        }
    }
}

impl FromStr for FrameOverlay {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_name(s).as_str() {
            "none" => Ok(FrameOverlay::None),
            "cockpit" | "hud" => Ok(FrameOverlay::Cockpit),
            "magazine" | "mag" => Ok(FrameOverlay::Magazine),
            _ => Err(ParseError {
                kind: "overlay",
                input: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for FrameOverlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
