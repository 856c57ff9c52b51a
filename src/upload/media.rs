use std::path::{Path, PathBuf};

use bytes::Bytes;
use reqwest::Body;
use reqwest::multipart::Part;
use tokio_util::io::ReaderStream;

use crate::api::error::ClientError;

#[derive(Debug, Clone)]
enum Source {
    Path(PathBuf),
    Memory(Bytes),
}

/// A media file that can be sent any number of times.
///
/// Files on disk are streamed from a fresh handle per request, so retries
/// never hold the whole video in memory.
#[derive(Debug, Clone)]
pub struct MediaFile {
    name: String,
    mime: String,
    size: u64,
    source: Source,
}

impl MediaFile {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|source| ClientError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        Ok(Self {
            mime: mime_for(&name).to_string(),
            name,
            size: metadata.len(),
            source: Source::Path(path.to_path_buf()),
        })
    }

    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let name = name.into();
        let bytes = bytes.into();
        Self {
            mime: mime_for(&name).to_string(),
            name,
            size: bytes.len() as u64,
            source: Source::Memory(bytes),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Build a multipart part carrying the file contents.
    pub async fn to_part(&self) -> Result<Part, ClientError> {
        let part = match &self.source {
            Source::Memory(bytes) => Part::stream_with_length(Body::from(bytes.clone()), self.size),
            Source::Path(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .map_err(|source| ClientError::Io {
                        path: path.clone(),
                        source,
                    })?;
                Part::stream_with_length(Body::wrap_stream(ReaderStream::new(file)), self.size)
            }
        };

        Ok(part.file_name(self.name.clone()).mime_str(&self.mime)?)
    }
}

fn mime_for(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_from_extension() {
        assert_eq!(mime_for("clip.MOV"), "video/quicktime");
        assert_eq!(mime_for("photo.jpeg"), "image/jpeg");
        assert_eq!(mime_for("noext"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_open_reads_size_without_loading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.mp4");
        let file = std::fs::File::create(&path).unwrap();
        file.set_len(300 * 1024 * 1024).unwrap();

        let media = MediaFile::open(&path).await.unwrap();
        assert_eq!(media.size(), 300 * 1024 * 1024);
        assert_eq!(media.name(), "big.mp4");
        assert_eq!(media.mime(), "video/mp4");
    }

    #[tokio::test]
    async fn test_open_missing_file_is_io_error() {
        let err = MediaFile::open("/definitely/not/here.mp4").await.unwrap_err();
        assert!(matches!(err, ClientError::Io { .. }));
    }
}
