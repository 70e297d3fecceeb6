//! FFmpeg Detection Module
//!
//! Finds the ffmpeg/ffprobe pair used by every media stage. A configured
//! binary or directory wins; otherwise PATH is searched, then the usual
//! package-manager install directories.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{FFmpegError, FFmpegResult};
use crate::core::process::tool_command;

/// Located ffmpeg/ffprobe pair
#[derive(Debug, Clone)]
pub struct FFmpegInfo {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    /// Version token from `ffmpeg -version`
    pub version: String,
}

#[cfg(target_os = "windows")]
const EXE_SUFFIX: &str = ".exe";
#[cfg(not(target_os = "windows"))]
const EXE_SUFFIX: &str = "";

fn executable_name(tool: &str) -> String {
    format!("{}{}", tool, EXE_SUFFIX)
}

/// Locates FFmpeg, preferring `configured`.
///
/// `configured` may be the ffmpeg binary or its directory. ffprobe is taken
/// from the same directory when present, else searched like ffmpeg.
pub fn detect_ffmpeg(configured: Option<&Path>) -> FFmpegResult<FFmpegInfo> {
    let ffmpeg_path = match configured {
        Some(path) if path.is_dir() => existing(path.join(executable_name("ffmpeg")))?,
        Some(path) => existing(path.to_path_buf())?,
        None => find_tool("ffmpeg")?,
    };

    let sibling_probe = ffmpeg_path
        .parent()
        .map(|dir| dir.join(executable_name("ffprobe")))
        .filter(|p| p.is_file());
    let ffprobe_path = match sibling_probe {
        Some(path) => path,
        None => find_tool("ffprobe")?,
    };

    let version = ffmpeg_version(&ffmpeg_path)?;
    info!(
        ffmpeg = %ffmpeg_path.display(),
        ffprobe = %ffprobe_path.display(),
        %version,
        "Using FFmpeg"
    );

    Ok(FFmpegInfo {
        ffmpeg_path,
        ffprobe_path,
        version,
    })
}

fn existing(path: PathBuf) -> FFmpegResult<PathBuf> {
    if path.is_file() {
        Ok(path)
    } else {
        debug!(path = %path.display(), "Configured FFmpeg path does not exist");
        Err(FFmpegError::NotFound)
    }
}

/// First `tool` executable on PATH or in a common install directory
fn find_tool(tool: &str) -> FFmpegResult<PathBuf> {
    let name = executable_name(tool);
    let path_dirs = std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).collect::<Vec<_>>())
        .unwrap_or_default();

    path_dirs
        .into_iter()
        .chain(common_install_dirs())
        .map(|dir| dir.join(&name))
        .find(|candidate| candidate.is_file())
        .inspect(|found| debug!(tool, path = %found.display(), "Found tool"))
        .ok_or(FFmpegError::NotFound)
}

/// Package-manager locations that are often missing from PATH
fn common_install_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    #[cfg(target_os = "windows")]
    {
        dirs.push(PathBuf::from(r"C:\ffmpeg\bin"));
        dirs.push(PathBuf::from(r"C:\Program Files\ffmpeg\bin"));
        if let Some(profile) = std::env::var_os("USERPROFILE") {
            dirs.push(PathBuf::from(profile).join("scoop").join("shims"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        dirs.push(PathBuf::from("/opt/homebrew/bin"));
        dirs.push(PathBuf::from("/usr/local/bin"));
    }

    #[cfg(target_os = "linux")]
    {
        dirs.push(PathBuf::from("/usr/bin"));
        dirs.push(PathBuf::from("/usr/local/bin"));
        dirs.push(PathBuf::from("/snap/bin"));
    }

    dirs
}

fn ffmpeg_version(ffmpeg_path: &Path) -> FFmpegResult<String> {
    let output = tool_command(ffmpeg_path)
        .arg("-version")
        .output()
        .map_err(FFmpegError::ProcessError)?;

    if !output.status.success() {
        return Err(FFmpegError::ExecutionFailed(format!(
            "{} -version exited with {}",
            ffmpeg_path.display(),
            output.status
        )));
    }

    parse_version_line(&String::from_utf8_lossy(&output.stdout))
}

/// Version token from "ffmpeg version X ...", or the whole first line
fn parse_version_line(output: &str) -> FFmpegResult<String> {
    let first_line = output
        .lines()
        .next()
        .filter(|line| !line.trim().is_empty())
        .ok_or_else(|| FFmpegError::ParseError("Empty ffmpeg -version output".to_string()))?;

    Ok(first_line
        .strip_prefix("ffmpeg version ")
        .and_then(|rest| rest.split_whitespace().next())
        .unwrap_or(first_line)
        .to_string())
}
