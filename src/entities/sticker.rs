//! Stickers, captions and the per-session decoration state.
//!
//! Positions are normalized to the final canvas (0..1 on both axes) so the
//! decoration survives any change of layout or source resolution.
//!
//! # Hit testing
//!
//! A pointer hits a sticker when its normalized position lies strictly inside
//! `HIT_RADIUS` of the sticker center. Stickers are scanned in insertion
//! order and the first match wins.

use serde::{Deserialize, Serialize};

use super::modes::FrameOverlay;

/// Normalized hit radius around a sticker center.
pub const HIT_RADIUS: f32 = 0.05;

/// Longest caption accepted at input time, in characters.
pub const CAPTION_MAX_CHARS: usize = 30;

/// Curated sticker palette offered by the decoration panel.
pub const STICKER_PALETTE: [&str; 9] = ["👨‍🚀", "🚀", "🪐", "👽", "🎓", "✨", "LULUS!", "A+", "UNIVERSE"];

/// Stable sticker identifier, unique within a session.
pub type StickerId = u64;

/// Rendering style, derived from the tag length.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StickerKind {
    /// Short emoji-like glyph, filled only.
    Glyph,
    /// Longer text label, stroked then filled.
    Label,
}

impl StickerKind {
    pub fn of(tag: &str) -> Self {
        if tag.chars().count() > 3 {
            StickerKind::Label
        } else {
            StickerKind::Glyph
        }
    }

    /// Font size as a fraction of the canvas width.
    pub fn default_scale(self) -> f32 {
        match self {
            StickerKind::Glyph => 0.1,
            StickerKind::Label => 0.08,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sticker {
    pub id: StickerId,
    pub tag: String,
    pub x: f32,
    pub y: f32,
    pub scale: f32,
}

impl Sticker {
    pub fn kind(&self) -> StickerKind {
        StickerKind::of(&self.tag)
    }

    fn distance_to(&self, x: f32, y: f32) -> f32 {
        ((self.x - x).powi(2) + (self.y - y).powi(2)).sqrt()
    }
}

/// Ordered sticker collection. Insertion order is z-order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StickerSet {
    items: Vec<Sticker>,
    next_id: StickerId,
}

impl StickerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sticker at the canvas center with the kind's default scale.
    pub fn add(&mut self, tag: &str) -> StickerId {
        self.add_at(tag, 0.5, 0.5)
    }

    pub fn add_at(&mut self, tag: &str, x: f32, y: f32) -> StickerId {
        self.next_id += 1;
        let id = self.next_id;
        self.items.push(Sticker {
            id,
            tag: tag.to_string(),
            x: x.clamp(0.0, 1.0),
            y: y.clamp(0.0, 1.0),
            scale: StickerKind::of(tag).default_scale(),
        });
        id
    }

    pub fn get(&self, id: StickerId) -> Option<&Sticker> {
        self.items.iter().find(|s| s.id == id)
    }

    /// Move a sticker. Returns false if the id is unknown.
    pub fn set_position(&mut self, id: StickerId, x: f32, y: f32) -> bool {
        match self.items.iter_mut().find(|s| s.id == id) {
            Some(s) => {
                s.x = x.clamp(0.0, 1.0);
                s.y = y.clamp(0.0, 1.0);
                true
            }
            None => false,
        }
    }

    /// First sticker (insertion order) within `HIT_RADIUS` of the point.
    pub fn hit_test(&self, x: f32, y: f32) -> Option<StickerId> {
        self.items
            .iter()
            .find(|s| s.distance_to(x, y) < HIT_RADIUS)
            .map(|s| s.id)
    }

    pub fn clear(&mut self) {
        // Ids keep counting so a cleared sticker's id is never reused
        self.items.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sticker> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Single-line caption, bounded at `CAPTION_MAX_CHARS`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caption(String);

impl Caption {
    /// Accept user input, truncating to the character bound.
    pub fn new(text: &str) -> Self {
        let first_line = text.lines().next().unwrap_or("");
        Caption(first_line.chars().take(CAPTION_MAX_CHARS).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Text to render as typed, or `None` for an empty or whitespace-only
    /// caption.
    pub fn visible_text(&self) -> Option<&str> {
        (!self.0.trim().is_empty()).then_some(self.0.as_str())
    }
}

/// Everything the user adds on top of the captured frames.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Decoration {
    pub overlay: FrameOverlay,
    pub stickers: StickerSet,
    pub caption: Caption,
}

impl Decoration {
    pub fn set_caption(&mut self, text: &str) {
        self.caption = Caption::new(text);
    }

    pub fn reset(&mut self) {
        self.overlay = FrameOverlay::None;
        self.stickers.clear();
        self.caption = Caption::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_length() {
        assert_eq!(StickerKind::of("🚀"), StickerKind::Glyph);
        assert_eq!(StickerKind::of("A+"), StickerKind::Glyph);
        // man + ZWJ + rocket is three chars
        assert_eq!(StickerKind::of("👨‍🚀"), StickerKind::Glyph);
        assert_eq!(StickerKind::of("LULUS!"), StickerKind::Label);
        assert_eq!(StickerKind::of("UNIVERSE"), StickerKind::Label);
    }

    #[test]
    fn test_ids_unique_and_monotonic() {
        let mut set = StickerSet::new();
        let a = set.add("🚀");
        let b = set.add("🪐");
        set.clear();
        let c = set.add("✨");
        assert!(a < b && b < c);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_add_defaults() {
        let mut set = StickerSet::new();
        let id = set.add("UNIVERSE");
        let s = set.get(id).unwrap();
        assert_eq!((s.x, s.y), (0.5, 0.5));
        assert!((s.scale - 0.08).abs() < f32::EPSILON);
    }

    #[test]
    fn test_hit_radius() {
        let mut set = StickerSet::new();
        let id = set.add_at("🚀", 0.5, 0.5);
        assert_eq!(set.hit_test(0.53, 0.53), Some(id));
        assert_eq!(set.hit_test(0.56, 0.5), None);
        assert_eq!(set.hit_test(0.5, 0.4), None);
    }

    #[test]
    fn test_hit_overlap_prefers_insertion_order() {
        let mut set = StickerSet::new();
        let first = set.add_at("🚀", 0.50, 0.50);
        let _second = set.add_at("🪐", 0.51, 0.50);
        // Closer to the second, but the first is found first
        assert_eq!(set.hit_test(0.51, 0.50), Some(first));
    }

    #[test]
    fn test_position_clamped() {
        let mut set = StickerSet::new();
        let id = set.add("🚀");
        assert!(set.set_position(id, 1.4, -0.2));
        let s = set.get(id).unwrap();
        assert_eq!((s.x, s.y), (1.0, 0.0));
        assert!(!set.set_position(999, 0.1, 0.1));
    }

    #[test]
    fn test_caption_bound() {
        let long = "x".repeat(45);
        let c = Caption::new(&long);
        assert_eq!(c.as_str().chars().count(), CAPTION_MAX_CHARS);

        let emoji = "🚀".repeat(40);
        assert_eq!(Caption::new(&emoji).as_str().chars().count(), CAPTION_MAX_CHARS);
    }

    #[test]
    fn test_caption_blank() {
        assert_eq!(Caption::new("   ").visible_text(), None);
        assert_eq!(Caption::default().visible_text(), None);
        assert_eq!(Caption::new("  to the stars ").visible_text(), Some("  to the stars "));
        assert_eq!(Caption::new("line one\nline two").as_str(), "line one");
    }

    #[test]
    fn test_decoration_reset() {
        let mut d = Decoration::default();
        d.overlay = FrameOverlay::Cockpit;
        d.stickers.add("🚀");
        d.set_caption("hello");
        d.reset();
        assert_eq!(d.overlay, FrameOverlay::None);
        assert!(d.stickers.is_empty());
        assert_eq!(d.caption.visible_text(), None);
    }
}
