//! "Spin the planet" slot-machine picker.
//!
//! A spin performs `SPIN_PICKS` uniformly random picks from [`GAME_ITEMS`],
//! one every `SPIN_INTERVAL`. The last pick stays on screen after the spin
//! ends. Driven by `tick()` from the preview loop, like the player's
//! `update()`, so it owns no timer thread.

use std::time::{Duration, Instant};

use log::{debug, trace};

pub const SPIN_PICKS: u32 = 20;
pub const SPIN_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemCategory {
    Major,
    Campus,
    Quote,
}

impl ItemCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemCategory::Major => "MAJOR",
            ItemCategory::Campus => "CAMPUS",
            ItemCategory::Quote => "QUOTE",
        }
    }
}

impl std::fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GameItem {
    pub category: ItemCategory,
    pub text: &'static str,
}

const fn item(category: ItemCategory, text: &'static str) -> GameItem {
    GameItem { category, text }
}

/// Curated pick list.
pub const GAME_ITEMS: [GameItem; 12] = [
    item(ItemCategory::Major, "Teknik Informatika"),
    item(ItemCategory::Major, "Kedokteran"),
    item(ItemCategory::Major, "Psikologi"),
    item(ItemCategory::Major, "Ilmu Komunikasi"),
    item(ItemCategory::Major, "Desain Komunikasi Visual"),
    item(ItemCategory::Campus, "Universitas Indonesia"),
    item(ItemCategory::Campus, "ITB"),
    item(ItemCategory::Campus, "UGM"),
    item(ItemCategory::Quote, "Masa depan cerah menanti!"),
    item(ItemCategory::Quote, "Rejeki anak sholeh"),
    item(ItemCategory::Quote, "Lulus SNBT 2025!"),
    item(ItemCategory::Quote, "Semangat Pejuang Kampus!"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpinError {
    AlreadySpinning,
}

impl std::fmt::Display for SpinError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpinError::AlreadySpinning => write!(f, "A spin is already in progress"),
        }
    }
}

impl std::error::Error for SpinError {}

#[derive(Debug)]
struct Spin {
    picks_done: u32,
    next_pick: Instant,
}

/// Picker state: idle, spinning, or idle showing the last result.
#[derive(Debug)]
pub struct Randomizer {
    rng: fastrand::Rng,
    spin: Option<Spin>,
    current: Option<GameItem>,
}

impl Default for Randomizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Randomizer {
    pub fn new() -> Self {
        Self {
            rng: fastrand::Rng::new(),
            spin: None,
            current: None,
        }
    }

    /// Reproducible picks, for tests and `spin --seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: fastrand::Rng::with_seed(seed),
            spin: None,
            current: None,
        }
    }

    pub fn is_spinning(&self) -> bool {
        self.spin.is_some()
    }

    /// Latest pick, `None` before the first pick of a spin.
    pub fn current(&self) -> Option<GameItem> {
        self.current
    }

    /// Overlay is shown while spinning and after a result exists.
    pub fn is_visible(&self) -> bool {
        self.is_spinning() || self.current.is_some()
    }

    /// Start a spin. The first pick lands one interval after `now`.
    pub fn spin(&mut self, now: Instant) -> Result<(), SpinError> {
        if self.is_spinning() {
            debug!("Randomizer: spin rejected, already spinning");
            return Err(SpinError::AlreadySpinning);
        }
        self.current = None;
        self.spin = Some(Spin {
            picks_done: 0,
            next_pick: now + SPIN_INTERVAL,
        });
        debug!("Randomizer: spin started");
        Ok(())
    }

    /// Perform every pick that is due at `now`. Returns true if the
    /// displayed item changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut changed = false;
        while let Some(spin) = self.spin.as_mut() {
            if now < spin.next_pick {
                break;
            }
            let picked = GAME_ITEMS[self.rng.usize(..GAME_ITEMS.len())];
            spin.picks_done += 1;
            spin.next_pick += SPIN_INTERVAL;
            trace!("Randomizer: pick {} -> {}", spin.picks_done, picked.text);
            self.current = Some(picked);
            changed = true;

            if spin.picks_done >= SPIN_PICKS {
                self.spin = None;
                debug!("Randomizer: settled on {} ({})", picked.text, picked.category);
            }
        }
        changed
    }

    /// Run a whole spin to completion and return the final pick.
    pub fn spin_to_end(&mut self, now: Instant) -> Result<GameItem, SpinError> {
        self.spin(now)?;
        let end = now + SPIN_INTERVAL * SPIN_PICKS;
        self.tick(end);
        // SPIN_PICKS > 0, so the spin always produced a pick
        Ok(self.current.unwrap_or(GAME_ITEMS[0]))
    }
}
