//! The bundled, filesystem-backed [`MediaSource`]. `file_name` is
//! resolved relative to `library.root`, and a byte range seeks into
//! the file before streaming the rest.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use daap_core::provider::{ByteRange, MediaSource, MediaStream};
use daap_core::{Error, Item, Result};
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, SeekFrom};
use tokio_util::io::ReaderStream;

/// Artwork lives alongside an item under the same stem, trying the
/// common image extensions in order. `None` if nothing matches.
pub(crate) fn artwork_candidate(item_path: &Path) -> Option<PathBuf> {
    let stem = item_path.file_stem()?;
    for ext in ["jpg", "jpeg", "png"] {
        let candidate = item_path.with_file_name(stem).with_extension(ext);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

pub struct LocalFileProvider {
    root: PathBuf,
}

impl LocalFileProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, file_name: &str) -> Result<PathBuf> {
        // `Path::starts_with` compares components, not resolved paths, so
        // it would accept `../../etc/passwd` under a root whose own
        // components happen to prefix-match; reject any parent-dir
        // component up front instead of trusting it.
        if Path::new(file_name)
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(Error::BadQueryArg("file_name escapes library root"));
        }
        Ok(self.root.join(file_name))
    }

    /// Artwork lives alongside the item under the same stem, trying the
    /// common image extensions in order. `None` if nothing matches.
    fn find_artwork(&self, item_path: &Path) -> Option<PathBuf> {
        artwork_candidate(item_path)
    }

    async fn open_ranged(&self, path: &Path, byte_range: Option<ByteRange>) -> Result<(File, u64, u64)> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| Error::NotFound(format!("{}: {e}", path.display())))?;
        let total_size = metadata.len();

        let mut file = File::open(path)
            .await
            .map_err(|e| Error::NotFound(format!("{}: {e}", path.display())))?;

        let served_len = match byte_range {
            None => total_size,
            Some((start, end)) => {
                if start >= total_size {
                    return Err(Error::BadRange(format!(
                        "range start {start} beyond file size {total_size}"
                    )));
                }
                file.seek(SeekFrom::Start(start))
                    .await
                    .map_err(|e| Error::Internal(e.to_string()))?;
                end.unwrap_or(total_size).min(total_size) - start
            }
        };

        Ok((file, total_size, served_len))
    }
}

#[async_trait]
impl MediaSource for LocalFileProvider {
    async fn open_item(&self, item: &Item, byte_range: Option<ByteRange>) -> Result<MediaStream> {
        let path = self.resolve(&item.file_name)?;
        let (file, total_size, served_len) = self.open_ranged(&path, byte_range).await?;
        let stream = ReaderStream::new(file_take(file, served_len));

        Ok(MediaStream {
            mime_type: item.file_type.clone(),
            total_size,
            body: Box::pin(stream),
        })
    }

    async fn open_artwork(&self, item: &Item) -> Result<MediaStream> {
        if !item.has_artwork {
            return Err(Error::NotFound(format!("no artwork for item {}", item.id)));
        }
        let item_path = self.resolve(&item.file_name)?;
        let artwork_path = self
            .find_artwork(&item_path)
            .ok_or_else(|| Error::NotFound(format!("no artwork file for item {}", item.id)))?;
        let (file, total_size, served_len) = self.open_ranged(&artwork_path, None).await?;
        let mime_type = match artwork_path.extension().and_then(|e| e.to_str()) {
            Some("png") => "image/png",
            _ => "image/jpeg",
        }
        .to_string();

        Ok(MediaStream {
            mime_type,
            total_size,
            body: Box::pin(ReaderStream::new(file_take(file, served_len))),
        })
    }
}

fn file_take(file: File, len: u64) -> tokio::io::Take<File> {
    tokio::io::AsyncReadExt::take(file, len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_accepts_a_plain_file_name_under_root() {
        let provider = LocalFileProvider::new("/var/music");
        let resolved = provider.resolve("song.mp3").unwrap();
        assert_eq!(resolved, PathBuf::from("/var/music/song.mp3"));
    }

    #[test]
    fn resolve_rejects_a_parent_dir_escape() {
        let provider = LocalFileProvider::new("/var/music");
        assert!(matches!(
            provider.resolve("../../etc/passwd").unwrap_err(),
            Error::BadQueryArg(_)
        ));
    }
}
