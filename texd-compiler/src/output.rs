//! Bounded capture of compiler output.
//!
//! Pipes are always read to EOF so the child never blocks on a full pipe,
//! but only the most recent bytes are kept.

use tokio::io::{AsyncRead, AsyncReadExt};

/// Bytes kept per pipe. TeX engines report errors at the end of their
/// output, so the tail is what matters.
pub const PIPE_CAPTURE_LIMIT: usize = 64 * 1024;

/// Upper bound on the diagnostic text attached to a failed compile.
pub const MAX_DIAGNOSTIC_BYTES: usize = 4 * 1024;

const READ_CHUNK: usize = 8 * 1024;

/// Marker prepended when [`clip_tail`] drops leading text.
pub const TRUNCATION_MARKER: &str = "[...]\n";

/// The retained tail of one output stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedPipe {
    /// Last [`PIPE_CAPTURE_LIMIT`] bytes, or fewer.
    pub tail: Vec<u8>,
    /// Total bytes the stream produced.
    pub total_bytes: u64,
}

impl CapturedPipe {
    #[must_use]
    pub fn was_truncated(&self) -> bool {
        self.total_bytes > self.tail.len() as u64
    }
}

/// Read `pipe` to EOF, keeping at most `limit` trailing bytes.
pub async fn drain_tail<R: AsyncRead + Unpin>(pipe: Option<R>, limit: usize) -> CapturedPipe {
    let mut captured = CapturedPipe::default();
    let Some(mut pipe) = pipe else {
        return captured;
    };

    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                captured.total_bytes += n as u64;
                captured.tail.extend_from_slice(&chunk[..n]);
                // Compact lazily so each byte is moved a bounded number of times.
                if captured.tail.len() > limit.saturating_mul(2).max(READ_CHUNK) {
                    let excess = captured.tail.len() - limit;
                    captured.tail.drain(..excess);
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "compiler pipe closed with error");
                break;
            }
        }
    }
    if captured.tail.len() > limit {
        let excess = captured.tail.len() - limit;
        captured.tail.drain(..excess);
    }
    captured
}

/// Keep the last `max_bytes` of `text`, cut on a char boundary, with a
/// leading [`TRUNCATION_MARKER`] when anything was dropped.
#[must_use]
pub fn clip_tail(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_owned();
    }
    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("{TRUNCATION_MARKER}{}", &text[start..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn short_stream_is_kept_whole() {
        let captured = drain_tail(Some(&b"This is XeTeX\n"[..]), 64).await;
        assert_eq!(captured.tail, b"This is XeTeX\n");
        assert_eq!(captured.total_bytes, 14);
        assert!(!captured.was_truncated());
    }

    #[tokio::test]
    async fn long_stream_keeps_only_the_tail() {
        let mut data = vec![b'x'; 200_000];
        data.extend_from_slice(b"! Emergency stop.");

        let captured = drain_tail(Some(&data[..]), 1024).await;

        assert_eq!(captured.tail.len(), 1024);
        assert!(captured.tail.ends_with(b"! Emergency stop."));
        assert_eq!(captured.total_bytes, data.len() as u64);
        assert!(captured.was_truncated());
    }

    #[tokio::test]
    async fn absent_pipe_is_empty() {
        let captured = drain_tail(None::<&[u8]>, 1024).await;
        assert_eq!(captured, CapturedPipe::default());
    }

    #[test]
    fn clip_tail_leaves_short_text_alone() {
        assert_eq!(clip_tail("! Undefined control sequence.", 100), "! Undefined control sequence.");
    }

    #[test]
    fn clip_tail_keeps_the_end_and_marks_the_cut() {
        let text = format!("{}END", "a".repeat(10_000));
        let clipped = clip_tail(&text, 100);
        assert!(clipped.starts_with(TRUNCATION_MARKER));
        assert!(clipped.ends_with("END"));
        assert_eq!(clipped.len(), TRUNCATION_MARKER.len() + 100);
    }

    #[test]
    fn clip_tail_never_splits_a_char() {
        let text = "é".repeat(100);
        let clipped = clip_tail(&text, 51);
        assert!(clipped.len() <= TRUNCATION_MARKER.len() + 51);
        assert!(clipped.trim_start_matches(TRUNCATION_MARKER).chars().all(|c| c == 'é'));
    }
}
