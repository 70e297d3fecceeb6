//! Background video catalogue.
//!
//! Backgrounds live as plain video files in one directory and are referred
//! to by file name or by path.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::core::ffmpeg::MediaInfo;
use crate::core::{CoreError, CoreResult, TimeSec};

/// File extensions accepted as background videos
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv"];

fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            VIDEO_EXTENSIONS
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Lists background videos directly inside `dir`, sorted by file name.
///
/// The directory is created when missing, so a fresh install lists nothing
/// instead of failing.
pub fn list_background_videos(dir: &Path) -> CoreResult<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;

    let mut videos = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unreadable background entry");
                continue;
            }
        };
        if entry.file_type().is_file() && is_video_file(entry.path()) {
            videos.push(entry.into_path());
        }
    }

    videos.sort();
    Ok(videos)
}

/// Resolves a background reference to an existing file.
///
/// An existing path is used as-is; otherwise the reference is looked up
/// inside `background_dir`.
pub fn resolve_background(reference: &Path, background_dir: &Path) -> CoreResult<PathBuf> {
    if reference.as_os_str().is_empty() {
        return Err(CoreError::BackgroundNotFound("(empty)".to_string()));
    }
    if reference.is_file() {
        return Ok(reference.to_path_buf());
    }

    let in_dir = background_dir.join(reference);
    if in_dir.is_file() {
        return Ok(in_dir);
    }

    Err(CoreError::BackgroundNotFound(
        reference.display().to_string(),
    ))
}

/// A background that probed as a usable video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundClip {
    pub path: PathBuf,
    pub duration_sec: TimeSec,
    pub width: u32,
    pub height: u32,
}

impl BackgroundClip {
    /// Accepts probe results with a video stream and a positive duration
    pub fn from_media(path: &Path, media: &MediaInfo) -> CoreResult<Self> {
        let video = media.video.as_ref().ok_or_else(|| {
            CoreError::InvalidInput(format!(
                "Background has no video stream: {}",
                path.display()
            ))
        })?;
        if !media.duration_sec.is_finite() || media.duration_sec <= 0.0 {
            return Err(CoreError::InvalidInput(format!(
                "Background has no usable duration ({}): {}",
                media.duration_sec,
                path.display()
            )));
        }
        if video.width == 0 || video.height == 0 {
            return Err(CoreError::InvalidInput(format!(
                "Background has empty frames: {}",
                path.display()
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            duration_sec: media.duration_sec,
            width: video.width,
            height: video.height,
        })
    }
}
