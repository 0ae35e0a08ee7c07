use crate::cluster::PhotoRecord;
use crate::timestamps::{TimestampError, TimestampReader};
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Extensions recognised as images when no configuration overrides them.
pub const DEFAULT_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "tiff", "tif", "png", "bmp", "heic"];

pub fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect()
}

/// Result of reading the images that sit directly inside a folder.
#[derive(Debug, Default)]
pub struct ScanSummary {
    /// Records with a usable timestamp, ascending by timestamp then name.
    pub records: Vec<PhotoRecord>,
    /// Files that matched an image extension but had no usable timestamp.
    pub skipped: Vec<TimestampError>,
}

impl ScanSummary {
    pub fn image_files(&self) -> usize {
        self.records.len() + self.skipped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Lists the image files directly inside `folder`, sorted by name.
/// Subdirectories are never descended into.
pub fn list_image_files(folder: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(error) => {
                warn!(%error, "skipping unreadable directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| has_image_extension(path, extensions))
        .collect();
    files.sort();
    files
}

/// True when `folder` directly contains at least one image file.
pub fn has_image_files(folder: &Path, extensions: &[String]) -> bool {
    !list_image_files(folder, extensions).is_empty()
}

/// Reads a capture timestamp for every image in `folder`.
///
/// Files whose timestamp cannot be read are logged and collected in
/// [`ScanSummary::skipped`]; they never stop the scan.
pub fn scan<R>(
    folder: &Path,
    extensions: &[String],
    reader: &R,
    progress_bar: &ProgressBar,
) -> ScanSummary
where
    R: TimestampReader + ?Sized,
{
    let files = list_image_files(folder, extensions);
    progress_bar.set_length(files.len() as u64);

    let mut summary = ScanSummary::default();
    for path in files {
        progress_bar.inc(1);
        if let Some(record) = handle_file(&path, reader, progress_bar, &mut summary.skipped) {
            summary.records.push(record);
        }
    }

    summary.records.sort_by(|left, right| {
        left.timestamp
            .cmp(&right.timestamp)
            .then_with(|| left.name.cmp(&right.name))
    });
    summary
}

fn handle_file<R>(
    path: &Path,
    reader: &R,
    progress_bar: &ProgressBar,
    skipped: &mut Vec<TimestampError>,
) -> Option<PhotoRecord>
where
    R: TimestampReader + ?Sized,
{
    let name = path.file_name()?.to_string_lossy().into_owned();
    progress_bar.set_message(format!("Reading: {}", name));
    match reader.read_timestamp(path) {
        Ok(timestamp) => {
            debug!(file = %name, %timestamp, "read capture timestamp");
            Some(PhotoRecord::new(name, timestamp))
        }
        Err(error) => {
            warn!(%error, "skipping file without usable timestamp");
            skipped.push(error);
            None
        }
    }
}

pub fn has_image_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            extensions
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}
