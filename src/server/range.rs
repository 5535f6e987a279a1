//! Byte-range serving of random-access sources
//!
//! Honours a single `Range: bytes=...` request so players can seek. The body
//! is streamed in fixed-size chunks, each read at an explicit offset on the
//! blocking pool.

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use futures::stream;

use super::error::ServerError;
use crate::source::RandomAccessSource;

/// Size of one streamed body chunk
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Outcome of interpreting a `Range` header against a source size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// Serve everything with 200
    Full,
    /// Serve `start..=end` with 206
    Partial { start: u64, end: u64 },
    /// Answer 416
    Unsatisfiable,
}

impl ByteRange {
    /// Interpret a `Range` header.
    ///
    /// Only a single `bytes=` range is honoured. Missing, multi-range or
    /// malformed headers fall back to the full body.
    pub fn parse(header: Option<&str>, size: u64) -> Self {
        let range_set = match header.and_then(|h| h.trim().strip_prefix("bytes=")) {
            Some(range_set) if !range_set.contains(',') => range_set.trim(),
            _ => return ByteRange::Full,
        };
        let (first, last) = match range_set.split_once('-') {
            Some(parts) => parts,
            None => return ByteRange::Full,
        };

        if first.is_empty() {
            // Suffix form: the last `n` bytes
            return match last.parse::<u64>() {
                Ok(0) => ByteRange::Unsatisfiable,
                Ok(_) if size == 0 => ByteRange::Unsatisfiable,
                Ok(n) => ByteRange::Partial {
                    start: size.saturating_sub(n),
                    end: size - 1,
                },
                Err(_) => ByteRange::Full,
            };
        }

        let start = match first.parse::<u64>() {
            Ok(start) => start,
            Err(_) => return ByteRange::Full,
        };
        let end = if last.is_empty() {
            u64::MAX
        } else {
            match last.parse::<u64>() {
                Ok(end) if end >= start => end,
                _ => return ByteRange::Full,
            }
        };

        if start >= size {
            ByteRange::Unsatisfiable
        } else {
            ByteRange::Partial {
                start,
                end: end.min(size - 1),
            }
        }
    }
}

/// Build the response for `source`, honouring the request's `Range` header
pub fn serve_source(
    source: Arc<dyn RandomAccessSource>,
    request_headers: &HeaderMap,
    content_type: &str,
    filename: Option<&str>,
) -> Result<Response, ServerError> {
    let size = source.size();
    let range = request_headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok());

    let (status, start, len) = match ByteRange::parse(range, size) {
        ByteRange::Full => (StatusCode::OK, 0, size),
        ByteRange::Partial { start, end } => (StatusCode::PARTIAL_CONTENT, start, end - start + 1),
        ByteRange::Unsatisfiable => return Err(ServerError::RangeNotSatisfiable { size }),
    };

    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    headers.insert(header::CONTENT_TYPE, header_value(content_type)?);
    if status == StatusCode::PARTIAL_CONTENT {
        headers.insert(
            header::CONTENT_RANGE,
            header_value(&format!("bytes {}-{}/{}", start, start + len - 1, size))?,
        );
    }
    if let Some(name) = filename {
        headers.insert(
            header::CONTENT_DISPOSITION,
            header_value(&format!("inline; filename=\"{}\"", name))?,
        );
    }

    Ok((status, headers, chunked_body(source, start, len)).into_response())
}

fn header_value(value: &str) -> Result<HeaderValue, ServerError> {
    HeaderValue::from_str(value).map_err(|e| ServerError::Internal {
        reason: format!("invalid header value '{}': {}", value, e),
    })
}

type ChunkState = (Arc<dyn RandomAccessSource>, u64, u64);

/// Stream `len` bytes of `source` starting at `start`
fn chunked_body(source: Arc<dyn RandomAccessSource>, start: u64, len: u64) -> Body {
    let chunks = stream::try_unfold((source, start, len), next_chunk);
    Body::from_stream(chunks)
}

async fn next_chunk(
    (source, offset, remaining): ChunkState,
) -> std::io::Result<Option<(Bytes, ChunkState)>> {
    if remaining == 0 {
        return Ok(None);
    }

    let chunk_len = remaining.min(CHUNK_SIZE as u64) as usize;
    let reader = Arc::clone(&source);
    let chunk = tokio::task::spawn_blocking(move || {
        let mut buf = vec![0u8; chunk_len];
        reader.read_at(&mut buf, offset).map(|_| buf)
    })
    .await
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?
    .map_err(|e| {
        tracing::error!(offset, "Stream read failed: {}", e);
        std::io::Error::from(e)
    })?;

    let next = (source, offset + chunk_len as u64, remaining - chunk_len as u64);
    Ok(Some((Bytes::from(chunk), next)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_header_is_full() {
        assert_eq!(ByteRange::parse(None, 15), ByteRange::Full);
    }

    #[test]
    fn test_closed_range() {
        assert_eq!(
            ByteRange::parse(Some("bytes=3-8"), 15),
            ByteRange::Partial { start: 3, end: 8 }
        );
        assert_eq!(
            ByteRange::parse(Some("bytes=0-0"), 15),
            ByteRange::Partial { start: 0, end: 0 }
        );
    }

    #[test]
    fn test_end_clamped_to_size() {
        assert_eq!(
            ByteRange::parse(Some("bytes=10-99"), 15),
            ByteRange::Partial { start: 10, end: 14 }
        );
    }

    #[test]
    fn test_open_range() {
        assert_eq!(
            ByteRange::parse(Some("bytes=12-"), 15),
            ByteRange::Partial { start: 12, end: 14 }
        );
    }

    #[test]
    fn test_suffix_range() {
        assert_eq!(
            ByteRange::parse(Some("bytes=-4"), 15),
            ByteRange::Partial { start: 11, end: 14 }
        );
        assert_eq!(
            ByteRange::parse(Some("bytes=-100"), 15),
            ByteRange::Partial { start: 0, end: 14 }
        );
        assert_eq!(ByteRange::parse(Some("bytes=-0"), 15), ByteRange::Unsatisfiable);
        assert_eq!(ByteRange::parse(Some("bytes=-5"), 0), ByteRange::Unsatisfiable);
    }

    #[test]
    fn test_unsatisfiable() {
        assert_eq!(ByteRange::parse(Some("bytes=15-"), 15), ByteRange::Unsatisfiable);
        assert_eq!(ByteRange::parse(Some("bytes=20-30"), 15), ByteRange::Unsatisfiable);
        assert_eq!(ByteRange::parse(Some("bytes=0-"), 0), ByteRange::Unsatisfiable);
    }

    #[test]
    fn test_ignored_forms() {
        for header in [
            "items=0-5",
            "bytes=0-1,4-5",
            "bytes=abc",
            "bytes=5-2",
            "bytes=x-3",
            "bytes=-y",
        ] {
            assert_eq!(ByteRange::parse(Some(header), 15), ByteRange::Full, "{}", header);
        }
    }
}
