//! End-to-end collage scenarios through the public API.

use chrono::NaiveDate;
use image::{Rgba, RgbaImage};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Instant;

use starbooth::core::compositor::{canvas_size, cell_origin, DEFAULT_WATERMARK};
use starbooth::core::detector::DetectionAdapter;
use starbooth::core::export;
use starbooth::core::preview::Preview;
use starbooth::core::recomposer::Recomposer;
use starbooth::core::workers::Workers;
use starbooth::core::{Booth, BoothOptions, ComposeError, Compositor, Step};
use starbooth::entities::{CapturedFrame, CollageLayout, Decoration, FrameOverlay, ShotSet};
use starbooth::render::{hex, text};

const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);
const YELLOW: Rgba<u8> = Rgba([255, 255, 0, 255]);
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
}

fn rgby(w: u32, h: u32) -> Vec<CapturedFrame> {
    [RED, GREEN, BLUE, YELLOW]
        .iter()
        .map(|c| CapturedFrame::solid(w, h, *c))
        .collect()
}

#[test]
fn test_grid_2x2_places_frames_in_capture_order() {
    let (bw, bh) = (100, 80);
    let img = Compositor::default()
        .compose(&rgby(bw, bh), CollageLayout::Grid2x2, &Decoration::default(), date())
        .unwrap();
    assert_eq!(img.dimensions(), (320, 430));

    for (i, color) in [RED, GREEN, BLUE, YELLOW].iter().enumerate() {
        let (x, y) = cell_origin(CollageLayout::Grid2x2, i, bw, bh);
        assert_eq!(*img.get_pixel(x + bw / 2, y + bh / 2), *color, "cell {}", i);
        // 10px border centered on the cell edge
        assert_eq!(*img.get_pixel(x, y + bh / 2), WHITE, "left border {}", i);
        assert_eq!(*img.get_pixel(x + bw / 2, y + bh - 1), WHITE, "bottom border {}", i);
    }
    // Middle of the gap between the first two cells stays background
    assert_eq!(*img.get_pixel(160, 90), hex(0x050505));
}

#[test]
fn test_grid_2x2_footer_text_and_no_caption() {
    let scene = Compositor::default()
        .plan(&rgby(100, 80), CollageLayout::Grid2x2, &Decoration::default(), date())
        .unwrap();
    assert!(scene.find_text(DEFAULT_WATERMARK).is_some());
    assert!(scene.find_text("17 Oct 2026").is_some());
    // Watermark and date only: an empty caption adds nothing
    assert_eq!(scene.texts().count(), 2);
}

#[test]
fn test_compose_is_deterministic() {
    let mut deco = Decoration::default();
    deco.stickers.add_at("✨", 0.3, 0.3);
    deco.set_caption("class of 2025");
    let c = Compositor::default();
    let a = c.compose(&rgby(64, 48), CollageLayout::Grid2x2, &deco, date()).unwrap();
    let b = c.compose(&rgby(64, 48), CollageLayout::Grid2x2, &deco, date()).unwrap();
    assert_eq!(export::encode_png(&a).unwrap(), export::encode_png(&b).unwrap());
}

#[test]
fn test_every_layout_accepts_exactly_its_shot_count() {
    let c = Compositor::new("Test Night");
    for layout in CollageLayout::ALL {
        let n = layout.shots();
        let frames: Vec<_> = (0..n).map(|_| CapturedFrame::solid(20, 10, BLUE)).collect();
        let img = c.compose(&frames, layout, &Decoration::default(), date()).unwrap();
        assert_eq!(img.dimensions(), canvas_size(layout, 20, 10));

        let short = &frames[..n - 1];
        if n > 1 {
            assert!(matches!(
                c.compose(short, layout, &Decoration::default(), date()),
                Err(ComposeError::FrameCount { .. })
            ));
        }
        let mut long = frames.clone();
        long.push(CapturedFrame::solid(20, 10, BLUE));
        assert!(c.compose(&long, layout, &Decoration::default(), date()).is_err());
    }
}

#[test]
fn test_dragged_sticker_lands_at_pointer() {
    let workers = Arc::new(Workers::new(2, Arc::new(AtomicU64::new(0))));
    let preview = Preview::new(DetectionAdapter::new(None, Arc::clone(&workers)));
    let recomposer = Recomposer::new(Arc::new(Compositor::default()), workers, 100);
    let mut booth = Booth::new(preview, recomposer, BoothOptions::default()).with_date(date());

    booth.start();
    let now = Instant::now();
    let shots = ShotSet::from_frames(CollageLayout::Single, vec![CapturedFrame::solid(200, 150, RED)]).unwrap();
    booth.capture_complete(shots, now);
    assert_eq!(booth.step(), Step::Result);

    let id = booth.add_sticker("🚀", now);
    assert_eq!(booth.pointer_down(0.5, 0.5), Some(id));
    assert!(booth.pointer_move(0.2, 0.8, now));
    booth.pointer_up();

    let frames = booth.shots().unwrap().frames().to_vec();
    let scene = booth
        .compositor()
        .plan(&frames, CollageLayout::Single, booth.decoration(), date())
        .unwrap();
    let rocket = scene.find_text("🚀").unwrap();
    assert_eq!(rocket.x, 0.2 * scene.width as f32);
    assert_eq!(rocket.y, 0.8 * scene.height as f32);

    let img: Arc<RgbaImage> = booth.compose_now().unwrap().unwrap();
    assert_eq!(img.dimensions(), (scene.width, scene.height));
    assert!(booth.composite().is_some());

    // No fonts on this machine: nothing to see in the pixels
    if text::rasterize("🚀", &rocket.style, 0).is_blank() {
        return;
    }
    let bare = booth
        .compositor()
        .compose(&frames, CollageLayout::Single, &Decoration::default(), date())
        .unwrap();
    let changed_near = |cx: f32, cy: f32| -> usize {
        let r = rocket.style.size as i64;
        let mut n = 0;
        for y in (cy as i64 - r).max(0)..(cy as i64 + r).min(img.height() as i64) {
            for x in (cx as i64 - r).max(0)..(cx as i64 + r).min(img.width() as i64) {
                if img.get_pixel(x as u32, y as u32) != bare.get_pixel(x as u32, y as u32) {
                    n += 1;
                }
            }
        }
        n
    };
    let (w, h) = (scene.width as f32, scene.height as f32);
    assert!(changed_near(0.2 * w, 0.8 * h) > 0, "rocket not painted at its drop point");
    assert_eq!(changed_near(0.8 * w, 0.2 * h), 0);
}

#[test]
fn test_decorated_collage_is_opaque() {
    let mut deco = Decoration {
        overlay: FrameOverlay::Cockpit,
        ..Decoration::default()
    };
    deco.stickers.add_at("LULUS!", 0.5, 0.5);
    deco.stickers.add_at("🚀", 0.3, 0.3);
    deco.set_caption("to the stars");
    let frames = vec![CapturedFrame::solid(400, 300, hex(0x336699))];
    let img = Compositor::default()
        .compose(&frames, CollageLayout::Single, &deco, date())
        .unwrap();
    let translucent = img.pixels().filter(|p| p[3] < 255).count();
    assert_eq!(translucent, 0, "{} translucent pixels", translucent);
}

#[test]
fn test_download_writes_timestamped_png() {
    let dir = std::env::temp_dir().join(format!("starbooth-it-download-{}", std::process::id()));
    let img = Compositor::default()
        .compose(&rgby(10, 10), CollageLayout::Grid2x2, &Decoration::default(), date())
        .unwrap();
    let path = export::save_download(&img, &dir, 1_700_000_000_000).unwrap();
    assert_eq!(
        path.file_name().and_then(|n| n.to_str()),
        Some("universe-collage-1700000000000.png")
    );
    let back = image::open(&path).unwrap().to_rgba8();
    assert_eq!(back, img);
    let _ = std::fs::remove_dir_all(&dir);
}
