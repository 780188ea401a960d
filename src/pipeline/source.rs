//! Gzip-compressed line source
//!
//! The returned stream owns the underlying reader, so the file handle is
//! released as soon as the stream is exhausted or dropped.

use async_compression::tokio::bufread::GzipDecoder;
use async_stream::stream;
use futures::Stream;
use std::io;
use std::path::Path;
use std::pin::Pin;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use super::PipelineError;

pub type LineStream = Pin<Box<dyn Stream<Item = io::Result<String>> + Send>>;

const READ_BUFFER: usize = 8192;

/// Open a `.gz` file and stream its decompressed lines.
pub async fn open(path: impl AsRef<Path>) -> Result<LineStream, PipelineError> {
    let path = path.as_ref();
    let file = File::open(path).await.map_err(|source| PipelineError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(gzip_lines(file))
}

/// Stream the lines of a gzip stream read from `reader`.
///
/// Invalid UTF-8 is replaced rather than rejected. A corrupt or truncated
/// stream yields one `Err` and then ends.
pub fn gzip_lines<R>(reader: R) -> LineStream
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let decoder = GzipDecoder::new(BufReader::with_capacity(READ_BUFFER, reader));
    plain_lines(decoder)
}

/// Stream the lines of an already-decompressed reader.
pub fn plain_lines<R>(reader: R) -> LineStream
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let mut reader = BufReader::with_capacity(READ_BUFFER, reader);
    Box::pin(stream! {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => yield Ok(decode_line(&buf)),
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    })
}

fn decode_line(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    text.trim_end_matches(['\n', '\r']).to_string()
}
