use starbooth::cli::{Args, Command, ComposeArgs, DecorationArgs, OutputArgs, PreviewArgs, ShootArgs, SpinArgs};
use starbooth::config::{self, BoothSettings, PathConfig};
use starbooth::core::compositor::{self, Compositor};
use starbooth::core::detector::{DetectionAdapter, FaceDetector, ReplayDetector};
use starbooth::core::export;
use starbooth::core::preview::Preview;
use starbooth::core::randomizer::{Randomizer, SPIN_INTERVAL};
use starbooth::core::recomposer::Recomposer;
use starbooth::core::sequencer::SequenceEvent;
use starbooth::core::source::ImageSequenceSource;
use starbooth::core::workers::Workers;
use starbooth::core::{Booth, BoothOptions, Step};
use starbooth::entities::{CapturedFrame, CollageLayout, Decoration};

use anyhow::{bail, Context, Result};
use clap::Parser;
use image::RgbaImage;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Preview pacing while a capture runs.
const FRAME_INTERVAL: Duration = Duration::from_millis(33);

fn main() -> Result<()> {
    // Parse command-line arguments first (needed for log setup)
    let args = Args::parse();

    // Create path configuration from CLI args and environment
    let path_config = PathConfig::from_env_and_cli(args.config_dir.clone());

    if let Err(e) = config::ensure_dirs(&path_config) {
        eprintln!("Warning: Failed to create application directories: {}", e);
    }

    init_logging(&args, &path_config)?;

    info!("starbooth {} starting...", env!("CARGO_PKG_VERSION"));
    debug!("Command-line args: {:?}", args);
    info!(
        "Config path: {}",
        config::config_file(config::SETTINGS_FILE, &path_config).display()
    );

    let settings = BoothSettings::load_default(&path_config)?;

    match args.command {
        Command::Layouts => run_layouts(),
        Command::Compose(a) => run_compose(a, &settings, &path_config),
        Command::Shoot(a) => run_shoot(a, &settings, &path_config),
        Command::Preview(a) => run_preview(a, &settings),
        Command::Spin(a) => run_spin(a),
    }
}

fn init_logging(args: &Args, path_config: &PathConfig) -> Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .clone()
            .unwrap_or_else(|| config::data_file(config::LOG_FILE, path_config));
        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .filter_module("cosmic_text", log::LevelFilter::Warn) // Font fallback spam
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Console logging (respects RUST_LOG if set)
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .filter_module("cosmic_text", log::LevelFilter::Warn)
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

/// Expand glob patterns in order. A pattern without matches is kept as a
/// literal path so the loader reports it by name.
fn expand_inputs(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for pattern in patterns {
        let mut matched: Vec<PathBuf> = glob::glob(pattern)
            .with_context(|| format!("Bad glob pattern: {}", pattern))?
            .filter_map(|entry| match entry {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!("Skipping unreadable path: {}", e);
                    None
                }
            })
            .collect();
        if matched.is_empty() {
            out.push(PathBuf::from(pattern));
        } else {
            matched.sort();
            out.append(&mut matched);
        }
    }
    Ok(out)
}

fn load_frames(paths: &[PathBuf]) -> Result<Vec<CapturedFrame>> {
    paths
        .par_iter()
        .map(|p| {
            let img = image::open(p).with_context(|| format!("Failed to load frame: {}", p.display()))?;
            Ok(CapturedFrame::new(img.to_rgba8()))
        })
        .collect()
}

fn decoration_from(args: &DecorationArgs) -> Decoration {
    let mut decoration = Decoration {
        overlay: args.overlay,
        ..Decoration::default()
    };
    for s in &args.stickers {
        decoration.stickers.add_at(&s.tag, s.x, s.y);
    }
    if let Some(caption) = &args.caption {
        decoration.set_caption(caption);
    }
    decoration
}

fn write_output(image: &RgbaImage, output: &OutputArgs, default_dir: PathBuf) -> Result<PathBuf> {
    let path = match (&output.output, &output.out_dir) {
        (Some(path), _) => {
            export::save_png(image, path)?;
            path.clone()
        }
        (None, dir) => {
            let dir = dir.clone().unwrap_or(default_dir);
            export::save_download(image, &dir, export::now_millis())?
        }
    };
    Ok(path)
}

fn run_layouts() -> Result<()> {
    println!("{:<10} {:>5} {:>6}  {}", "LAYOUT", "GRID", "SHOTS", "CANVAS @640x480");
    for layout in CollageLayout::ALL {
        let (w, h) = compositor::canvas_size(layout, 640, 480);
        println!(
            "{:<10} {:>5} {:>6}  {}x{}",
            layout.as_str(),
            format!("{}x{}", layout.cols(), layout.rows()),
            layout.shots(),
            w,
            h
        );
    }
    Ok(())
}

fn run_compose(args: ComposeArgs, settings: &BoothSettings, path_config: &PathConfig) -> Result<()> {
    let paths = expand_inputs(&args.frames)?;
    let frames = load_frames(&paths)?;
    info!("Composing {} frames as {}", frames.len(), args.layout);

    let decoration = decoration_from(&args.decoration);
    let date = args
        .decoration
        .date
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let compositor = Compositor::new(settings.event_title.clone());
    let image = compositor.compose(&frames, args.layout, &decoration, date)?;

    let path = write_output(&image, &args.output, settings.output_dir(path_config))?;
    println!("{}", path.display());
    Ok(())
}

fn build_booth(settings: &BoothSettings, detector: Option<Arc<dyn FaceDetector>>) -> Booth {
    let workers = Arc::new(Workers::with_default_threads());
    let mut preview = Preview::new(DetectionAdapter::new(detector, Arc::clone(&workers)));
    preview.set_detection(settings.detection);
    let recomposer = Recomposer::new(
        Arc::new(Compositor::new(settings.event_title.clone())),
        workers,
        settings.debounce_ms,
    );
    let options = BoothOptions {
        timer: settings.timer,
        sound: settings.sound,
        flash: settings.flash(),
    };
    Booth::new(preview, recomposer, options)
}

fn run_shoot(args: ShootArgs, settings: &BoothSettings, path_config: &PathConfig) -> Result<()> {
    let paths = expand_inputs(&args.source)?;
    let source = ImageSequenceSource::open(&paths)?;

    let mut booth = build_booth(settings, None);
    if let Some(date) = args.decoration.date {
        booth = booth.with_date(date);
    }
    booth.bus().subscribe(|e: &SequenceEvent| match e {
        SequenceEvent::Countdown { shot, remaining } => println!("shot {}: {}", shot, remaining),
        SequenceEvent::Snap { shot } => println!("shot {}: snap", shot),
        SequenceEvent::Aborted { reason } => eprintln!("capture aborted: {}", reason),
        _ => {}
    });

    booth.start();
    booth.select_layout(args.layout);
    booth.select_filter(args.filter);
    if let Some(timer) = args.timer {
        booth.select_timer(timer);
    }
    if args.mute && booth.sound() {
        booth.toggle_sound();
    }

    // The capture reads the live canvas, so fill it before starting
    if booth.preview_frame(&source).is_none() {
        bail!("Source produced no frames");
    }
    booth.start_capture()?;
    while booth.is_capturing() {
        booth.preview_frame(&source);
        booth.tick(Instant::now());
        thread::sleep(FRAME_INTERVAL);
    }
    if booth.step() != Step::Result {
        bail!("Capture did not complete");
    }

    let now = Instant::now();
    booth.set_overlay(args.decoration.overlay, now);
    for s in &args.decoration.stickers {
        booth.add_sticker_at(&s.tag, s.x, s.y, now);
    }
    if let Some(caption) = &args.decoration.caption {
        booth.set_caption(caption, now);
    }

    let Some(image) = booth.compose_now()? else {
        bail!("Nothing to compose");
    };
    let path = write_output(&image, &args.output, settings.output_dir(path_config))?;
    println!("{}", path.display());
    Ok(())
}

fn run_preview(args: PreviewArgs, settings: &BoothSettings) -> Result<()> {
    let paths = expand_inputs(&args.source)?;
    let source = ImageSequenceSource::open(&paths)?;
    let ticks = args.ticks.unwrap_or(source.len());

    let detector: Option<Arc<dyn FaceDetector>> = match &args.detections {
        Some(path) => Some(Arc::new(ReplayDetector::load(path)?)),
        None => None,
    };
    let workers = Arc::new(Workers::new(1, Arc::new(Default::default())));
    let mut preview = Preview::new(DetectionAdapter::new(detector, workers));
    preview.set_detection(settings.detection);

    let mut randomizer = match args.spin {
        Some(seed) => Randomizer::with_seed(seed),
        None => Randomizer::new(),
    };
    if args.spin.is_some() {
        let item = randomizer.spin_to_end(Instant::now())?;
        info!("Randomizer card: {} ({})", item.text, item.category);
    }

    for i in 0..ticks {
        let Some(frame) = preview.tick_blocking(&source, args.filter, &randomizer) else {
            break;
        };
        let path = args.out_dir.join(format!("preview-{:04}.png", i + 1));
        export::save_png(&frame, &path)?;
    }
    println!("{} frames -> {}", preview.frames(), args.out_dir.display());
    Ok(())
}

fn run_spin(args: SpinArgs) -> Result<()> {
    let mut randomizer = match args.seed {
        Some(seed) => Randomizer::with_seed(seed),
        None => Randomizer::new(),
    };

    let item = if args.quick {
        randomizer.spin_to_end(Instant::now())?
    } else {
        let start = Instant::now();
        randomizer.spin(start)?;
        let mut now = start;
        while randomizer.is_spinning() {
            now += SPIN_INTERVAL;
            thread::sleep(SPIN_INTERVAL);
            if randomizer.tick(now) {
                if let Some(pick) = randomizer.current() {
                    print!("\r\x1b[2K{}", pick.text);
                    let _ = std::io::Write::flush(&mut std::io::stdout());
                }
            }
        }
        println!();
        match randomizer.current() {
            Some(item) => item,
            None => bail!("Spin produced no result"),
        }
    };
    println!("{}: {}", item.category, item.text);
    Ok(())
}
