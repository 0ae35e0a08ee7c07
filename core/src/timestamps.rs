use exif::{In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use time::macros::format_description;
use time::PrimitiveDateTime;

/// Produces the capture instant of an image file.
pub trait TimestampReader {
    fn read_timestamp(&self, path: &Path) -> Result<PrimitiveDateTime, TimestampError>;
}

#[derive(Debug, Error)]
pub enum TimestampError {
    #[error("no capture timestamp in {}", path.display())]
    MissingMetadata { path: PathBuf },
    #[error("cannot read {}: {source}", path.display())]
    UnreadableFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid timestamp metadata in {}: {message}", path.display())]
    ParseError { path: PathBuf, message: String },
}

impl TimestampError {
    pub fn path(&self) -> &Path {
        match self {
            Self::MissingMetadata { path }
            | Self::UnreadableFile { path, .. }
            | Self::ParseError { path, .. } => path,
        }
    }
}

/// Reads `DateTimeOriginal`, falling back to `DateTimeDigitized` and then to
/// the IFD0 `DateTime` tag.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExifTimestampReader;

const TIMESTAMP_TAGS: [Tag; 3] = [Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime];

impl TimestampReader for ExifTimestampReader {
    fn read_timestamp(&self, path: &Path) -> Result<PrimitiveDateTime, TimestampError> {
        let file = File::open(path).map_err(|source| TimestampError::UnreadableFile {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = BufReader::new(file);
        let exif = Reader::new()
            .read_from_container(&mut reader)
            .map_err(|error| classify_exif_error(path, error))?;

        let field = TIMESTAMP_TAGS
            .iter()
            .find_map(|tag| exif.get_field(*tag, In::PRIMARY))
            .ok_or_else(|| TimestampError::MissingMetadata {
                path: path.to_path_buf(),
            })?;

        let raw = match &field.value {
            Value::Ascii(values) => values.first().map(|bytes| bytes.as_slice()),
            _ => None,
        }
        .ok_or_else(|| TimestampError::ParseError {
            path: path.to_path_buf(),
            message: format!("{} is not an ASCII value", field.tag),
        })?;

        parse_exif_datetime(raw).map_err(|message| TimestampError::ParseError {
            path: path.to_path_buf(),
            message,
        })
    }
}

fn classify_exif_error(path: &Path, error: exif::Error) -> TimestampError {
    match error {
        exif::Error::Io(source) => TimestampError::UnreadableFile {
            path: path.to_path_buf(),
            source,
        },
        exif::Error::NotFound(_) => TimestampError::MissingMetadata {
            path: path.to_path_buf(),
        },
        other => TimestampError::ParseError {
            path: path.to_path_buf(),
            message: other.to_string(),
        },
    }
}

/// Parses the `YYYY:MM:DD HH:MM:SS` form cameras write, ignoring trailing
/// NUL padding and whitespace.
pub fn parse_exif_datetime(raw: &[u8]) -> Result<PrimitiveDateTime, String> {
    let text = std::str::from_utf8(raw).map_err(|error| error.to_string())?;
    let text = text.trim_end_matches('\0').trim();
    let format = format_description!("[year]:[month]:[day] [hour]:[minute]:[second]");
    PrimitiveDateTime::parse(text, &format)
        .map_err(|error| format!("cannot parse {:?}: {}", text, error))
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use std::fs;
    use tempfile::tempdir;
    use time::macros::datetime;

    #[test]
    fn parses_camera_format_with_padding() {
        let parsed = parse_exif_datetime(b"2023:07:14 18:05:09\0").unwrap();
        assert_eq!(parsed, datetime!(2023-07-14 18:05:09));
    }

    #[test]
    fn rejects_malformed_datetime() {
        assert!(parse_exif_datetime(b"2023-07-14T18:05:09").is_err());
        assert!(parse_exif_datetime(b"    :  :     :  :  ").is_err());
    }

    #[test]
    fn reads_datetime_from_jpeg() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("IMG_0001.jpg");
        write_jpeg_with_datetime(&path, "2024:05:01 10:00:03");
        let timestamp = ExifTimestampReader.read_timestamp(&path).unwrap();
        assert_eq!(timestamp, datetime!(2024-05-01 10:00:03));
    }

    #[test]
    fn missing_file_is_unreadable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone.jpg");
        let error = ExifTimestampReader.read_timestamp(&path).unwrap_err();
        assert!(matches!(error, TimestampError::UnreadableFile { .. }));
        assert_eq!(error.path(), path.as_path());
    }

    #[test]
    fn jpeg_without_exif_has_no_metadata() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bare.jpg");
        write_jpeg_without_exif(&path);
        let error = ExifTimestampReader.read_timestamp(&path).unwrap_err();
        assert!(matches!(error, TimestampError::MissingMetadata { .. }));
    }

    #[test]
    fn non_image_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.jpg");
        fs::write(&path, b"definitely not an image").unwrap();
        let error = ExifTimestampReader.read_timestamp(&path).unwrap_err();
        assert!(matches!(error, TimestampError::ParseError { .. }));
    }
}
