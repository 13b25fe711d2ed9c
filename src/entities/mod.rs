//! Entities module - plain data shared by capture, preview and compositing.
//!
//! Nothing here touches threads, clocks or pixels beyond holding them; the
//! engine in `core` owns all behavior.

pub mod detection;
pub mod frame;
pub mod layout;
pub mod modes;
pub mod sticker;

pub use detection::DetectionBox;
pub use frame::{CapturedFrame, ShotSet};
pub use layout::{CollageLayout, LayoutSpec, ParseError, TimerDuration};
pub use modes::{FilterSelection, FrameOverlay};
pub use sticker::{
    Caption, Decoration, Sticker, StickerId, StickerKind, StickerSet, CAPTION_MAX_CHARS, HIT_RADIUS,
    STICKER_PALETTE,
};
