use super::exif;
use crate::error::{Result, RoofDeskError};
use roofdesk_common::MediaKind;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct MediaFile {
    pub path: PathBuf,
    pub file_name: String,
    pub kind: MediaKind,
    /// EXIF capture time for photos
    pub taken_at: Option<String>,
}

impl MediaFile {
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }
}

const PHOTO_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "heic", "webp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm"];
const VOICE_EXTENSIONS: &[&str] = &["m4a", "mp3", "wav", "ogg"];

/// Media kind from a file extension (case-insensitive)
pub fn media_kind(ext: &str) -> Option<MediaKind> {
    let ext = ext.to_lowercase();
    if PHOTO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Photo)
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Video)
    } else if VOICE_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Voice)
    } else {
        None
    }
}

/// Describe a single file, rejecting unsupported extensions
pub fn media_file(path: &Path) -> Result<MediaFile> {
    if !path.is_file() {
        return Err(RoofDeskError::FileNotFound(path.display().to_string()));
    }
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_default();
    let kind = media_kind(&ext)
        .ok_or_else(|| RoofDeskError::Validation(format!("unsupported media type: {}", path.display())))?;
    Ok(describe(path, kind))
}

fn describe(path: &Path, kind: MediaKind) -> MediaFile {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let taken_at = match kind {
        MediaKind::Photo => exif::extract_date(path).ok(),
        _ => None,
    };
    MediaFile {
        path: path.to_path_buf(),
        file_name,
        kind,
        taken_at,
    }
}

pub fn scan_folder(folder: &Path, recursive: bool) -> Result<Vec<MediaFile>> {
    if !folder.is_dir() {
        return Err(RoofDeskError::FolderNotFound(folder.display().to_string()));
    }

    let mut media = Vec::new();

    for entry in WalkDir::new(folder)
        .max_depth(if recursive { usize::MAX } else { 1 })
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()))
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        if let Some(kind) = path.extension().and_then(|e| media_kind(&e.to_string_lossy())) {
            media.push(describe(path, kind));
        }
    }

    // ファイル名でソート
    media.sort_by(|a, b| a.file_name.cmp(&b.file_name).then_with(|| a.path.cmp(&b.path)));

    Ok(media)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}
