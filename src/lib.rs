//! STARBOOTH - photo booth engine library
//!
//! Re-exports all modules for use by the binary target.

// Core engine (capture, preview, compositing, workers)
pub mod core;

// Drawing backend
pub mod render;

// App modules
pub mod cli;
pub mod config;
pub mod entities;

// Re-export commonly used types from core
pub use core::booth::{Booth, BoothOptions, Step};
pub use core::compositor::{ComposeError, Compositor};
pub use core::event_bus::{downcast_event, EventBus};
pub use core::sequencer::{CaptureError, CaptureSequencer, SequenceConfig};

// Re-export entities
pub use entities::{CapturedFrame, CollageLayout, Decoration, FilterSelection, FrameOverlay, ShotSet, TimerDuration};
