//! Booth engine - capture, preview, compositing, workers
//!
//! These modules drive a session end to end, independent of any UI.

pub mod booth;
pub mod compositor;
pub mod debounced_render;
pub mod detector;
pub mod event_bus;
pub mod export;
pub mod filters;
pub mod preview;
pub mod randomizer;
pub mod recomposer;
pub mod sequencer;
pub mod source;
pub mod workers;

// Re-exports for convenience
pub use booth::{Booth, BoothOptions, CaptureFailed, CompositeReady, Step, StepChanged};
pub use compositor::{ComposeError, Compositor};
pub use debounced_render::DebouncedRender;
pub use detector::{DetectError, DetectionAdapter, FaceDetector, NullDetector, ReplayDetector};
pub use event_bus::EventBus;
pub use export::ExportError;
pub use filters::FilterRenderer;
pub use preview::Preview;
pub use randomizer::{GameItem, Randomizer, SpinError};
pub use recomposer::{ComposeJob, Recomposer};
pub use sequencer::{
    CaptureError, CaptureSequencer, SequenceConfig, SequenceEvent, SequenceHandle, SequenceObserver, Sleeper,
};
pub use source::{FrameSource, ImageSequenceSource, LiveCanvas, Mirrored, SolidSource, SourceError};
pub use workers::Workers;
