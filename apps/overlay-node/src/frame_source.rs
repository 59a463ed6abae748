//! Minimal on-disk [`VideoSource`]: loops over pre-encoded JPEG frame files
//! in a directory at a fixed cadence.
//!
//! Decoding a real video container (mp4, etc.) into JPEG chunks is an
//! external collaborator out of scope for this project; this is the
//! simplest thing that can feed the origin emitter for local testing and
//! for deployments that already produce a directory of numbered JPEG
//! frames (e.g. via a separate `ffmpeg -f image2` pipeline).

use std::path::PathBuf;
use std::time::Duration;

use overlay_core::VideoSource;

pub struct DirectoryFrameSource {
    frame_paths: Vec<PathBuf>,
    next_index: usize,
    frame_interval: Duration,
}

impl DirectoryFrameSource {
    /// Builds a source from every `*.jpg`/`*.jpeg` file in `dir`, sorted by
    /// filename so a `0001.jpg, 0002.jpg, ...` naming scheme plays in order.
    pub fn open(dir: &std::path::Path, fps: f64) -> std::io::Result<Self> {
        let mut frame_paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                matches!(
                    path.extension().and_then(|e| e.to_str()),
                    Some("jpg") | Some("jpeg")
                )
            })
            .collect();
        frame_paths.sort();

        if frame_paths.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no .jpg frames found in {}", dir.display()),
            ));
        }

        Ok(Self {
            frame_paths,
            next_index: 0,
            frame_interval: Duration::from_secs_f64(1.0 / fps.max(1.0)),
        })
    }
}

#[async_trait::async_trait]
impl VideoSource for DirectoryFrameSource {
    async fn next_frame(&mut self) -> std::io::Result<Vec<u8>> {
        tokio::time::sleep(self.frame_interval).await;
        let path = &self.frame_paths[self.next_index];
        self.next_index = (self.next_index + 1) % self.frame_paths.len();
        tokio::fs::read(path).await
    }
}
