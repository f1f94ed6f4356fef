use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::error::Result;
use crate::model::Item;

/// A half-open or fully-bounded byte range, as parsed from an HTTP
/// `Range` header: `(start, end_exclusive)`. `None` end means "to EOF".
pub type ByteRange = (u64, Option<u64>);

pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// The bytes, MIME type and declared total size of a streamed response.
/// `total_size` is always the *full* item size, even when `body` only
/// covers `byte_range` — callers need it to build a correct
/// `Content-Range` header.
pub struct MediaStream {
    pub mime_type: String,
    pub total_size: u64,
    pub body: ByteStream,
}

/// Supplies the actual media bytes behind an [`Item`]. `daap-core` only
/// knows the library's metadata tree; fetching the file (or proxying
/// some other backend) is the host application's job.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn open_item(&self, item: &Item, byte_range: Option<ByteRange>) -> Result<MediaStream>;

    async fn open_artwork(&self, item: &Item) -> Result<MediaStream>;
}
