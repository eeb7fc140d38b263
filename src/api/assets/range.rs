//! `Range: bytes=...` parsing

/// Inclusive byte span within a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the `Content-Range` header
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

/// Outcome of interpreting a Range header against a file size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeRequest {
    /// Serve this span with 206
    Satisfiable(ByteRange),
    /// Well-formed but outside the file: 416
    Unsatisfiable,
    /// Malformed or unsupported (e.g. multi-range): serve the whole file
    Ignored,
}

/// Parse a single-span range header.
///
/// Supports `bytes=start-end`, `bytes=start-` and the suffix form
/// `bytes=-len`. The end is clamped to the last byte of the file.
pub fn parse_range(header: &str, size: u64) -> RangeRequest {
    let Some(ranges) = header.trim().strip_prefix("bytes=") else {
        return RangeRequest::Ignored;
    };
    if ranges.contains(',') {
        return RangeRequest::Ignored;
    }
    let Some((start, end)) = ranges.split_once('-') else {
        return RangeRequest::Ignored;
    };
    let (start, end) = (start.trim(), end.trim());

    if start.is_empty() {
        // Suffix range: the last `len` bytes
        let Ok(len) = end.parse::<u64>() else {
            return RangeRequest::Ignored;
        };
        if len == 0 || size == 0 {
            return RangeRequest::Unsatisfiable;
        }
        return RangeRequest::Satisfiable(ByteRange {
            start: size.saturating_sub(len),
            end: size - 1,
        });
    }

    let Ok(start) = start.parse::<u64>() else {
        return RangeRequest::Ignored;
    };
    let end = if end.is_empty() {
        None
    } else {
        match end.parse::<u64>() {
            Ok(end) if end >= start => Some(end),
            _ => return RangeRequest::Ignored,
        }
    };

    if start >= size {
        return RangeRequest::Unsatisfiable;
    }

    let last = size - 1;
    RangeRequest::Satisfiable(ByteRange {
        start,
        end: end.map_or(last, |end| end.min(last)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start: u64, end: u64) -> RangeRequest {
        RangeRequest::Satisfiable(ByteRange { start, end })
    }

    #[test]
    fn test_explicit_span() {
        let range = parse_range("bytes=0-99", 1000);
        assert_eq!(range, span(0, 99));
        if let RangeRequest::Satisfiable(r) = range {
            assert_eq!(r.len(), 100);
            assert_eq!(r.content_range(1000), "bytes 0-99/1000");
        }
    }

    #[test]
    fn test_open_ended_span_runs_to_last_byte() {
        assert_eq!(parse_range("bytes=500-", 1000), span(500, 999));
    }

    #[test]
    fn test_end_is_clamped() {
        assert_eq!(parse_range("bytes=900-5000", 1000), span(900, 999));
    }

    #[test]
    fn test_suffix_span() {
        assert_eq!(parse_range("bytes=-100", 1000), span(900, 999));
        assert_eq!(parse_range("bytes=-5000", 1000), span(0, 999));
    }

    #[test]
    fn test_start_past_end_of_file() {
        assert_eq!(parse_range("bytes=1000-", 1000), RangeRequest::Unsatisfiable);
        assert_eq!(parse_range("bytes=0-", 0), RangeRequest::Unsatisfiable);
        assert_eq!(parse_range("bytes=-0", 1000), RangeRequest::Unsatisfiable);
    }

    #[test]
    fn test_malformed_headers_are_ignored() {
        assert_eq!(parse_range("items=0-1", 1000), RangeRequest::Ignored);
        assert_eq!(parse_range("bytes=abc-", 1000), RangeRequest::Ignored);
        assert_eq!(parse_range("bytes=50-10", 1000), RangeRequest::Ignored);
        assert_eq!(parse_range("bytes=0-1,5-6", 1000), RangeRequest::Ignored);
        assert_eq!(parse_range("bytes=42", 1000), RangeRequest::Ignored);
    }
}
