use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;

use crate::entities::{CollageLayout, FilterSelection, FrameOverlay, TimerDuration};

// Build version with backend info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Text:   cosmic-text 0.15\n",
    "Images: image 0.25 (PNG, JPEG)\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Photo booth: timed capture, preview filters and collage compositing
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging to file (default: starbooth.log in the data dir)
    #[arg(long = "log", value_name = "LOG_FILE", global = true)]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR", global = true)]
    pub config_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List collage layouts with their grid and shot count
    Layouts,
    /// Compose a collage from already captured frames
    Compose(ComposeArgs),
    /// Run a timed capture session against an image sequence, then compose
    Shoot(ShootArgs),
    /// Render filtered preview frames from an image sequence
    Preview(PreviewArgs),
    /// Spin the major/campus/quote randomizer
    Spin(SpinArgs),
}

/// Decoration shared by `compose` and `shoot`.
#[derive(ClapArgs, Debug, Clone)]
pub struct DecorationArgs {
    /// Frame overlay (none, cockpit, magazine)
    #[arg(long = "overlay", value_name = "OVERLAY", default_value = "none")]
    pub overlay: FrameOverlay,

    /// Sticker as TAG@X,Y in normalized canvas coordinates (repeatable)
    #[arg(short = 's', long = "sticker", value_name = "TAG@X,Y")]
    pub stickers: Vec<StickerArg>,

    /// Caption in the footer (first line, up to 30 characters)
    #[arg(long = "caption", value_name = "TEXT")]
    pub caption: Option<String>,

    /// Footer date as YYYY-MM-DD (default: today)
    #[arg(long = "date", value_name = "DATE")]
    pub date: Option<chrono::NaiveDate>,
}

/// Where a composite is written.
#[derive(ClapArgs, Debug, Clone)]
pub struct OutputArgs {
    /// Exact output PNG path
    #[arg(short = 'o', long = "output", value_name = "FILE", conflicts_with = "out_dir")]
    pub output: Option<PathBuf>,

    /// Output folder; the file gets the timestamped download name
    #[arg(long = "out-dir", value_name = "DIR")]
    pub out_dir: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
pub struct ComposeArgs {
    /// Collage layout (single, grid-2x2, strip-3, strip-4, grid-2x3, grid-3x3)
    #[arg(short = 'l', long = "layout", value_name = "LAYOUT")]
    pub layout: CollageLayout,

    /// Captured frames in capture order (glob patterns allowed)
    #[arg(value_name = "FRAME", required = true)]
    pub frames: Vec<String>,

    #[command(flatten)]
    pub decoration: DecorationArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(ClapArgs, Debug)]
pub struct ShootArgs {
    /// Collage layout (decides the number of shots)
    #[arg(short = 'l', long = "layout", value_name = "LAYOUT", default_value = "single")]
    pub layout: CollageLayout,

    /// Camera stand-in: image files played in order (glob patterns allowed)
    #[arg(long = "source", value_name = "PATTERN", required = true)]
    pub source: Vec<String>,

    /// Countdown seconds per shot (3, 5, 10). Default from settings.
    #[arg(short = 't', long = "timer", value_name = "SECS")]
    pub timer: Option<TimerDuration>,

    /// Silence countdown and shutter cues
    #[arg(long = "mute")]
    pub mute: bool,

    /// Preview filter shown during the countdown
    #[arg(long = "filter", value_name = "FILTER", default_value = "none")]
    pub filter: FilterSelection,

    #[command(flatten)]
    pub decoration: DecorationArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(ClapArgs, Debug)]
pub struct PreviewArgs {
    /// Camera stand-in: image files played in order (glob patterns allowed)
    #[arg(long = "source", value_name = "PATTERN", required = true)]
    pub source: Vec<String>,

    /// Filter (none, future-explorer, constellation, orbit-aura, ticket)
    #[arg(short = 'f', long = "filter", value_name = "FILTER", default_value = "none")]
    pub filter: FilterSelection,

    /// JSON face boxes replayed per frame
    #[arg(short = 'd', long = "detections", value_name = "FILE")]
    pub detections: Option<PathBuf>,

    /// Number of frames to render (default: one pass over the source)
    #[arg(short = 'n', long = "ticks", value_name = "N")]
    pub ticks: Option<usize>,

    /// Show a finished randomizer pick using this seed
    #[arg(long = "spin", value_name = "SEED")]
    pub spin: Option<u64>,

    /// Folder for preview-NNNN.png frames
    #[arg(long = "out-dir", value_name = "DIR")]
    pub out_dir: PathBuf,
}

#[derive(ClapArgs, Debug)]
pub struct SpinArgs {
    /// Seed for a reproducible result
    #[arg(long = "seed", value_name = "N")]
    pub seed: Option<u64>,

    /// Print the result only, skipping the animation
    #[arg(short = 'q', long = "quick")]
    pub quick: bool,
}

/// `TAG@X,Y`, e.g. `🚀@0.2,0.8`. The tag may itself contain `@`.
#[derive(Debug, Clone, PartialEq)]
pub struct StickerArg {
    pub tag: String,
    pub x: f32,
    pub y: f32,
}

impl FromStr for StickerArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tag, pos) = s
            .rsplit_once('@')
            .ok_or_else(|| format!("expected TAG@X,Y, got '{}'", s))?;
        let (x, y) = pos
            .split_once(',')
            .ok_or_else(|| format!("expected X,Y after '@', got '{}'", pos))?;
        let coord = |v: &str| -> Result<f32, String> {
            let n: f32 = v.trim().parse().map_err(|_| format!("bad coordinate '{}'", v))?;
            if !(0.0..=1.0).contains(&n) {
                return Err(format!("coordinate {} outside 0..1", n));
            }
            Ok(n)
        };
        if tag.is_empty() {
            return Err("empty sticker tag".to_string());
        }
        Ok(Self {
            tag: tag.to_string(),
            x: coord(x)?,
            y: coord(y)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sticker_arg() {
        let s: StickerArg = "🚀@0.2,0.8".parse().unwrap();
        assert_eq!(s.tag, "🚀");
        assert_eq!((s.x, s.y), (0.2, 0.8));

        let label: StickerArg = "A+@0.5, 0.5".parse().unwrap();
        assert_eq!(label.tag, "A+");

        assert!("🚀".parse::<StickerArg>().is_err());
        assert!("🚀@0.2".parse::<StickerArg>().is_err());
        assert!("🚀@1.5,0.2".parse::<StickerArg>().is_err());
        assert!("@0.2,0.2".parse::<StickerArg>().is_err());
    }

    #[test]
    fn test_parse_compose() {
        let args = Args::try_parse_from([
            "starbooth", "-vv", "compose", "-l", "grid-2x2", "a.png", "b.png", "c.png", "d.png",
            "--overlay", "cockpit", "--sticker", "🚀@0.2,0.8", "--caption", "hi",
        ])
        .unwrap();
        assert_eq!(args.verbosity, 2);
        let Command::Compose(c) = args.command else {
            panic!("expected compose");
        };
        assert_eq!(c.layout, CollageLayout::Grid2x2);
        assert_eq!(c.frames.len(), 4);
        assert_eq!(c.decoration.overlay, FrameOverlay::Cockpit);
        assert_eq!(c.decoration.stickers.len(), 1);
    }

    #[test]
    fn test_parse_shoot_timer() {
        let args = Args::try_parse_from(["starbooth", "shoot", "--source", "cam/*.png", "-t", "5", "--mute"])
            .unwrap();
        let Command::Shoot(s) = args.command else {
            panic!("expected shoot");
        };
        assert_eq!(s.timer, Some(TimerDuration::Five));
        assert!(s.mute);
        assert!(Args::try_parse_from(["starbooth", "shoot", "--source", "x", "-t", "4"]).is_err());
    }

    #[test]
    fn test_log_flag_optional_value() {
        let args = Args::try_parse_from(["starbooth", "layouts", "--log"]).unwrap();
        assert_eq!(args.log_file, Some(None));
        let args = Args::try_parse_from(["starbooth", "--log", "x.log", "layouts"]).unwrap();
        assert_eq!(args.log_file, Some(Some(PathBuf::from("x.log"))));
    }
}
