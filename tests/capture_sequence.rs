//! Capture sequencing with a virtual clock.

use crossbeam_channel::unbounded;
use image::{Rgba, RgbaImage};
use std::sync::Arc;
use std::time::Duration;

use starbooth::core::sequencer::{
    CaptureError, CaptureSequencer, Cue, InstantSleeper, NoopObserver, SequenceConfig, SequenceEvent,
};
use starbooth::core::source::{FrameSource, ImageSequenceSource, Mirrored, SolidSource};
use starbooth::entities::{CollageLayout, TimerDuration};

fn colored(n: usize) -> Vec<RgbaImage> {
    (0..n)
        .map(|i| RgbaImage::from_pixel(6, 4, Rgba([i as u8 * 10, 0, 0, 255])))
        .collect()
}

#[test]
fn test_shot_count_for_every_layout_and_timer() {
    let seq = CaptureSequencer::new();
    for layout in CollageLayout::ALL {
        for timer in TimerDuration::ALL {
            let source = ImageSequenceSource::from_images(colored(layout.shots()));
            let sleeper = InstantSleeper::new();
            let cfg = SequenceConfig::new(layout, timer, true);
            let shots = seq.run(&cfg, &source, &NoopObserver, &sleeper).unwrap();
            assert_eq!(shots.len(), layout.shots(), "{} {}", layout, timer);
            assert_eq!(shots.layout(), layout);

            // Countdown per shot plus one pause between shots
            let n = layout.shots() as u32;
            let expected = Duration::from_secs(timer.seconds() as u64) * n + Duration::from_secs(1) * (n - 1);
            assert_eq!(sleeper.elapsed(), expected);
        }
    }
    assert!(!seq.is_running());
}

#[test]
fn test_frames_keep_capture_order() {
    let seq = CaptureSequencer::new();
    let source = ImageSequenceSource::from_images(colored(4));
    let cfg = SequenceConfig::new(CollageLayout::Grid2x2, TimerDuration::Three, false);
    let shots = seq.run(&cfg, &source, &NoopObserver, &InstantSleeper::new()).unwrap();
    let reds: Vec<u8> = shots.frames().iter().map(|f| f.image().get_pixel(0, 0)[0]).collect();
    assert_eq!(reds, vec![0, 10, 20, 30]);
}

#[test]
fn test_event_stream_for_one_shot() {
    let seq = CaptureSequencer::new();
    let (tx, rx) = unbounded();
    let cfg = SequenceConfig::new(CollageLayout::Single, TimerDuration::Three, true);
    let src = SolidSource::new(4, 4, Rgba([1, 1, 1, 255]));
    seq.run(&cfg, &src, &tx, &InstantSleeper::new()).unwrap();

    let events: Vec<SequenceEvent> = rx.try_iter().collect();
    let countdown: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            SequenceEvent::Countdown { remaining, .. } => Some(*remaining),
            _ => None,
        })
        .collect();
    assert_eq!(countdown, vec![3, 2, 1]);
    let beeps = events.iter().filter(|e| **e == SequenceEvent::Sound(Cue::Beep)).count();
    assert_eq!(beeps, 3);
    assert!(events.contains(&SequenceEvent::Sound(Cue::Shutter)));
    assert!(matches!(events.first(), Some(SequenceEvent::Started { shots: 1, .. })));
    assert_eq!(events.last(), Some(&SequenceEvent::Finished { shots: 1 }));
}

#[test]
fn test_muted_sequence_has_no_sound() {
    let seq = CaptureSequencer::new();
    let (tx, rx) = unbounded();
    let cfg = SequenceConfig::new(CollageLayout::Strip3, TimerDuration::Five, false);
    let src = SolidSource::new(4, 4, Rgba([1, 1, 1, 255]));
    seq.run(&cfg, &src, &tx, &InstantSleeper::new()).unwrap();
    assert!(!rx.try_iter().any(|e| matches!(e, SequenceEvent::Sound(_))));
}

#[test]
fn test_missing_frame_aborts_and_discards() {
    let seq = CaptureSequencer::new();
    // Two frames for a three-shot strip
    let source = ImageSequenceSource::from_images(colored(2)).play_once();
    let cfg = SequenceConfig::new(CollageLayout::Strip3, TimerDuration::Three, false);
    let (tx, rx) = unbounded();
    let err = seq.run(&cfg, &source, &tx, &InstantSleeper::new()).unwrap_err();
    assert_eq!(err, CaptureError::SourceUnavailable { shot: 3 });
    assert!(rx.try_iter().any(|e| matches!(e, SequenceEvent::Aborted { .. })));
    assert!(!seq.is_running());
}

#[test]
fn test_cancel_mid_countdown() {
    let seq = CaptureSequencer::new();
    let cfg = SequenceConfig::new(CollageLayout::Grid2x2, TimerDuration::Three, false);
    let src = SolidSource::new(4, 4, Rgba([1, 1, 1, 255]));
    let err = seq.run(&cfg, &src, &NoopObserver, &InstantSleeper::cancel_on(5)).unwrap_err();
    assert_eq!(err, CaptureError::Cancelled);
    assert!(!seq.is_running());
}

#[test]
fn test_second_sequence_rejected_while_running() {
    let seq = CaptureSequencer::new();
    let cfg = SequenceConfig::new(CollageLayout::Single, TimerDuration::Ten, false);
    let src: Arc<dyn FrameSource> = Arc::new(SolidSource::new(4, 4, Rgba([1, 1, 1, 255])));
    let handle = seq.spawn(cfg, Arc::clone(&src), Arc::new(NoopObserver)).unwrap();
    assert!(seq.is_running());

    let again = seq.run(&cfg, src.as_ref(), &NoopObserver, &InstantSleeper::new());
    assert_eq!(again.unwrap_err(), CaptureError::AlreadyRunning);
    assert!(matches!(
        seq.spawn(cfg, Arc::clone(&src), Arc::new(NoopObserver)),
        Err(CaptureError::AlreadyRunning)
    ));

    handle.cancel();
    assert_eq!(handle.join().unwrap_err(), CaptureError::Cancelled);
    assert!(!seq.is_running());
}

#[test]
fn test_mirrored_source_captures_mirrored_frames() {
    let mut raw = RgbaImage::from_pixel(4, 1, Rgba([0, 0, 0, 255]));
    raw.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
    let source = Mirrored::new(ImageSequenceSource::from_images(vec![raw]));
    let seq = CaptureSequencer::new();
    let cfg = SequenceConfig::new(CollageLayout::Single, TimerDuration::Three, false);
    let shots = seq.run(&cfg, &source, &NoopObserver, &InstantSleeper::new()).unwrap();
    assert_eq!(*shots.frames()[0].image().get_pixel(3, 0), Rgba([255, 0, 0, 255]));
}
