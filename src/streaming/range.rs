//! HTTP `Range` header handling shared by the direct and remote paths.

/// An inclusive byte span `start..=end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// The whole of a non-empty resource.
    pub fn full(size: u64) -> Option<Self> {
        (size > 0).then(|| Self { start: 0, end: size - 1 })
    }

    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` value for a resource of `size` bytes.
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

/// Parse HTTP Range header.
///
/// Supports formats:
/// - bytes=0-499
/// - bytes=500-
/// - bytes=-500 (last 500 bytes)
///
/// Multiple ranges are not supported.
pub fn parse_range_header(header: &str, file_size: u64) -> Option<ByteRange> {
    let header = header.trim().strip_prefix("bytes=")?;

    let parts: Vec<&str> = header.split('-').collect();
    if parts.len() != 2 || file_size == 0 {
        return None;
    }

    let start = parts[0].trim();
    let end = parts[1].trim();

    match (start.is_empty(), end.is_empty()) {
        // bytes=-500 (last 500 bytes)
        (true, false) => {
            let suffix_len: u64 = end.parse().ok()?;
            if suffix_len == 0 {
                return None;
            }
            let start = file_size.saturating_sub(suffix_len);
            Some(ByteRange { start, end: file_size - 1 })
        }
        // bytes=500- (from 500 to end)
        (false, true) => {
            let start: u64 = start.parse().ok()?;
            if start >= file_size {
                return None;
            }
            Some(ByteRange { start, end: file_size - 1 })
        }
        // bytes=0-499
        (false, false) => {
            let start: u64 = start.parse().ok()?;
            let end: u64 = end.parse().ok()?;
            if start >= file_size {
                return None;
            }
            let end = end.min(file_size - 1);
            if start > end {
                return None;
            }
            Some(ByteRange { start, end })
        }
        // bytes=- (invalid)
        (true, true) => None,
    }
}

/// Range to serve for a request that carried a `Range` header.
///
/// Malformed and unsatisfiable headers fall back to the whole resource
/// rather than a 416. `None` only for an empty resource.
pub fn resolve_range(header: &str, file_size: u64) -> Option<ByteRange> {
    parse_range_header(header, file_size).or_else(|| {
        tracing::debug!(range = %header, size = file_size, "Unusable Range header, serving whole resource");
        ByteRange::full(file_size)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: u64, end: u64) -> Option<ByteRange> {
        Some(ByteRange { start, end })
    }

    #[test]
    fn parses_forms() {
        assert_eq!(parse_range_header("bytes=0-499", 1000), range(0, 499));
        assert_eq!(parse_range_header("bytes=500-", 1000), range(500, 999));
        assert_eq!(parse_range_header("bytes=-100", 1000), range(900, 999));
        assert_eq!(parse_range_header("bytes=900-5000", 1000), range(900, 999));
    }

    #[test]
    fn rejects_invalid() {
        assert_eq!(parse_range_header("bytes=1000-", 1000), None);
        assert_eq!(parse_range_header("bytes=5-1", 1000), None);
        assert_eq!(parse_range_header("bytes=-", 1000), None);
        assert_eq!(parse_range_header("bytes=-0", 1000), None);
        assert_eq!(parse_range_header("items=0-1", 1000), None);
        assert_eq!(parse_range_header("bytes=0-1,5-6", 1000), None);
        assert_eq!(parse_range_header("bytes=0-1", 0), None);
    }

    #[test]
    fn resolve_falls_back_to_full() {
        assert_eq!(resolve_range("bytes=abc", 10), range(0, 9));
        assert_eq!(resolve_range("bytes=50-", 10), range(0, 9));
        assert_eq!(resolve_range("bytes=2-3", 10), range(2, 3));
        assert_eq!(resolve_range("bytes=0-", 0), None);
    }

    #[test]
    fn length_and_header() {
        let r = ByteRange { start: 10, end: 19 };
        assert_eq!(r.length(), 10);
        assert_eq!(r.content_range(100), "bytes 10-19/100");
    }
}
