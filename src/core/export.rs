//! PNG export of the final composite.

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use log::info;
use std::path::{Path, PathBuf};

pub const FILE_PREFIX: &str = "universe-collage-";

#[derive(Debug)]
pub enum ExportError {
    Encode(String),
    Io { path: PathBuf, source: std::io::Error },
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::Encode(e) => write!(f, "PNG encode error: {}", e),
            ExportError::Io { path, source } => write!(f, "Cannot write {}: {}", path.display(), source),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Io { source, .. } => Some(source),
            ExportError::Encode(_) => None,
        }
    }
}

/// `universe-collage-<unix millis>.png`
pub fn export_filename(unix_millis: i64) -> String {
    format!("{}{}.png", FILE_PREFIX, unix_millis)
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Lossless PNG bytes.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ExportError> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(image.as_raw(), image.width(), image.height(), ExtendedColorType::Rgba8)
        .map_err(|e| ExportError::Encode(e.to_string()))?;
    Ok(out)
}

/// Write `image` to `path` as PNG.
pub fn save_png(image: &RgbaImage, path: &Path) -> Result<(), ExportError> {
    let bytes = encode_png(image)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| ExportError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, bytes).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Saved {} ({}x{})", path.display(), image.width(), image.height());
    Ok(())
}

/// Save into `dir` under the timestamped download name.
pub fn save_download(image: &RgbaImage, dir: &Path, unix_millis: i64) -> Result<PathBuf, ExportError> {
    let path = dir.join(export_filename(unix_millis));
    save_png(image, &path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_filename() {
        assert_eq!(export_filename(1760659200123), "universe-collage-1760659200123.png");
    }

    #[test]
    fn test_png_is_lossless() {
        let mut img = RgbaImage::from_pixel(5, 4, Rgba([10, 20, 30, 255]));
        img.put_pixel(2, 1, Rgba([255, 0, 128, 77]));
        let bytes = encode_png(&img).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
        let back = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(back, img);
    }

    #[test]
    fn test_save_download() {
        let dir = std::env::temp_dir().join(format!("starbooth-export-{}", std::process::id()));
        let img = RgbaImage::from_pixel(3, 3, Rgba([1, 1, 1, 255]));
        let path = save_download(&img, &dir, 42).unwrap();
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("universe-collage-42.png"));
        assert!(path.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
