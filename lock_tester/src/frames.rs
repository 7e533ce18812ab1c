// A frame source that plays back an ordered directory of still images, standing in
// for a live camera.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use waldo_lock::Frame;

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "webp"];

pub struct DirectorySource {
    paths: Vec<PathBuf>,
    next: usize,
}

impl DirectorySource {
    pub fn open(dir: &Path) -> Result<Self> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
            if path.is_file() && is_image {
                paths.push(path);
            }
        }
        if paths.is_empty() {
            bail!("no image frames found in {}", dir.display());
        }
        paths.sort();
        Ok(Self { paths, next: 0 })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Dimensions of the first frame, used as the default view size.
    pub fn probe_dimensions(&self) -> Result<(u32, u32)> {
        let first = &self.paths[0];
        image::image_dimensions(first).with_context(|| format!("probing {}", first.display()))
    }
}

impl Iterator for DirectorySource {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.paths.get(self.next)?;
        let frame_id = self.next as u64;
        self.next += 1;
        Some(
            image::open(path)
                .with_context(|| format!("decoding {}", path.display()))
                .map(|img| Frame::from_rgba(frame_id, img.to_rgba8())),
        )
    }
}
