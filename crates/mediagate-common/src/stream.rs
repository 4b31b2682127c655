//! Boxed byte streams passed between byte sources and HTTP bodies.

use std::io;
use std::pin::Pin;

use bytes::Bytes;
use futures::{stream, Stream, StreamExt};

/// An owned, sendable stream of byte chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + 'static>>;

/// Truncate a stream after `limit` bytes, splitting the chunk that crosses
/// the boundary. The inner stream is dropped as soon as the limit is hit.
pub fn take_bytes(inner: ByteStream, limit: u64) -> ByteStream {
    let state = (Some(inner), limit);
    Box::pin(stream::unfold(state, |(inner, remaining)| async move {
        let mut inner = inner?;
        if remaining == 0 {
            return None;
        }
        match inner.next().await? {
            Ok(mut chunk) => {
                let len = chunk.len() as u64;
                if len >= remaining {
                    chunk.truncate(remaining as usize);
                    Some((Ok(chunk), (None, 0)))
                } else {
                    Some((Ok(chunk), (Some(inner), remaining - len)))
                }
            }
            Err(e) => Some((Err(e), (None, 0))),
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(parts: &[&'static [u8]]) -> ByteStream {
        let items: Vec<io::Result<Bytes>> = parts.iter().map(|p| Ok(Bytes::from_static(p))).collect();
        Box::pin(stream::iter(items))
    }

    async fn collect(s: ByteStream) -> Vec<u8> {
        s.map(|c| c.unwrap().to_vec()).concat().await
    }

    #[tokio::test]
    async fn splits_crossing_chunk() {
        let out = collect(take_bytes(chunks(&[b"abcd", b"efgh", b"ijkl"]), 6)).await;
        assert_eq!(out, b"abcdef");
    }

    #[tokio::test]
    async fn shorter_source_ends_early() {
        let out = collect(take_bytes(chunks(&[b"abc"]), 10)).await;
        assert_eq!(out, b"abc");
    }

    #[tokio::test]
    async fn zero_limit_is_empty() {
        let out = collect(take_bytes(chunks(&[b"abc"]), 0)).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn error_ends_stream() {
        let items: Vec<io::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"ab")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
            Ok(Bytes::from_static(b"cd")),
        ];
        let mut s = take_bytes(Box::pin(stream::iter(items)), 100);
        assert_eq!(s.next().await.unwrap().unwrap(), Bytes::from_static(b"ab"));
        assert!(s.next().await.unwrap().is_err());
        assert!(s.next().await.is_none());
    }
}
