//! Local frame sources for the daemon and tests.
//!
//! Real camera acquisition lives outside this crate. `FileSource` stands in
//! for it with either:
//! - still images read from a local file or directory (cycled), or
//! - a synthetic NV12 stream for `stub://` paths.
//!
//! Frames are handed out one at a time; at most one is in flight, and the
//! source tracks that through each frame's release hook.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::frame::{Frame, PixelFormat};

const SYNTHETIC_WIDTH: u32 = 640;
const SYNTHETIC_HEIGHT: u32 = 480;

/// Configuration for a local file source.
#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Image file, directory of images, or `stub://<name>`.
    pub path: String,
    /// Target frame rate (frames per second).
    pub target_fps: u32,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: "stub://camera".to_string(),
            target_fps: 10,
        }
    }
}

/// Local frame source.
pub struct FileSource {
    backend: FileBackend,
    frames_captured: u64,
    released: Arc<AtomicU64>,
    path: String,
}

enum FileBackend {
    Synthetic(SyntheticSource),
    Stills(StillImageSource),
}

impl FileSource {
    pub fn new(config: FileConfig) -> Result<Self> {
        if config.path.trim().is_empty() {
            return Err(anyhow!("frame source path must not be empty"));
        }
        if config.target_fps == 0 {
            return Err(anyhow!("target_fps must be >= 1"));
        }
        let backend = if config.path.starts_with("stub://") {
            FileBackend::Synthetic(SyntheticSource::new())
        } else if config.path.contains("://") {
            return Err(anyhow!(
                "frame source only supports local paths or stub:// (got {})",
                config.path
            ));
        } else {
            FileBackend::Stills(StillImageSource::open(Path::new(&config.path))?)
        };
        log::info!("FileSource: opened {}", config.path);
        Ok(Self {
            backend,
            frames_captured: 0,
            released: Arc::new(AtomicU64::new(0)),
            path: config.path,
        })
    }

    /// Capture the next frame. The returned frame reports back when dropped.
    pub fn next_frame(&mut self) -> Result<Frame> {
        let frame = match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame(),
            FileBackend::Stills(source) => source.next_frame()?,
        };
        self.frames_captured += 1;
        let released = self.released.clone();
        Ok(frame.with_release(move || {
            released.fetch_add(1, Ordering::SeqCst);
        }))
    }

    /// Frames handed out but not yet returned.
    pub fn in_flight(&self) -> u64 {
        self.frames_captured
            .saturating_sub(self.released.load(Ordering::SeqCst))
    }

    pub fn stats(&self) -> FileStats {
        FileStats {
            frames_captured: self.frames_captured,
            frames_released: self.released.load(Ordering::SeqCst),
            path: self.path.clone(),
        }
    }
}

/// Statistics for a file source.
#[derive(Clone, Debug)]
pub struct FileStats {
    pub frames_captured: u64,
    pub frames_released: u64,
    pub path: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://)
// ----------------------------------------------------------------------------

struct SyntheticSource {
    frame_count: u64,
}

impl SyntheticSource {
    fn new() -> Self {
        Self { frame_count: 0 }
    }

    fn next_frame(&mut self) -> Frame {
        self.frame_count += 1;
        let w = SYNTHETIC_WIDTH as usize;
        let h = SYNTHETIC_HEIGHT as usize;
        let mut pixels = vec![128u8; w * h + w * h / 2];
        for (i, luma) in pixels[..w * h].iter_mut().enumerate() {
            *luma = ((i as u64 + self.frame_count) % 256) as u8;
        }
        Frame::new(pixels, SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT, PixelFormat::Nv12)
    }
}

// ----------------------------------------------------------------------------
// Still images
// ----------------------------------------------------------------------------

struct StillImageSource {
    paths: Vec<PathBuf>,
    cursor: usize,
}

impl StillImageSource {
    fn open(path: &Path) -> Result<Self> {
        let paths = if path.is_dir() {
            let mut paths: Vec<PathBuf> = std::fs::read_dir(path)
                .with_context(|| format!("failed to list {}", path.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| is_image_path(p))
                .collect();
            paths.sort();
            paths
        } else {
            vec![path.to_path_buf()]
        };
        if paths.is_empty() {
            return Err(anyhow!("no images found under {}", path.display()));
        }
        Ok(Self { paths, cursor: 0 })
    }

    fn next_frame(&mut self) -> Result<Frame> {
        let path = &self.paths[self.cursor % self.paths.len()];
        self.cursor = self.cursor.wrapping_add(1);
        let image = image::open(path)
            .with_context(|| format!("failed to decode image {}", path.display()))?
            .to_rgb8();
        let (width, height) = image.dimensions();
        Ok(Frame::new(
            image.into_raw(),
            width,
            height,
            PixelFormat::Rgb24,
        ))
    }
}

fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_source_tracks_release() -> Result<()> {
        let mut source = FileSource::new(FileConfig::default())?;
        let frame = source.next_frame()?;
        assert_eq!(frame.format(), PixelFormat::Nv12);
        assert_eq!(source.in_flight(), 1);
        drop(frame);
        assert_eq!(source.in_flight(), 0);
        assert_eq!(source.stats().frames_released, 1);
        Ok(())
    }

    #[test]
    fn rejects_remote_urls() {
        let config = FileConfig {
            path: "rtsp://camera".to_string(),
            target_fps: 10,
        };
        assert!(FileSource::new(config).is_err());
    }

    #[test]
    fn reads_png_from_directory() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let image = image::RgbImage::from_pixel(4, 2, image::Rgb([10, 20, 30]));
        image.save(dir.path().join("a.png"))?;
        std::fs::write(dir.path().join("notes.txt"), "ignored")?;

        let mut source = FileSource::new(FileConfig {
            path: dir.path().display().to_string(),
            target_fps: 5,
        })?;
        let frame = source.next_frame()?;
        assert_eq!((frame.width(), frame.height()), (4, 2));
        assert_eq!(&frame.data()[..3], &[10, 20, 30]);
        Ok(())
    }
}
