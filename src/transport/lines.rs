//! Byte stream → line stream.

use super::{LineStream, UpstreamError};
use bytes::{Bytes, BytesMut};
use futures::{stream, Stream, StreamExt};

struct LineState<S> {
    input: S,
    buf: BytesMut,
    /// Bytes of `buf` already known to contain no `\n`.
    scanned: usize,
    eof: bool,
    failed: bool,
}

/// Split a chunked body into lines.
///
/// - chunks are buffered as bytes, so a multi-byte UTF-8 sequence split across
///   two chunks is reassembled before decoding
/// - `\n` terminates a line, a trailing `\r` is dropped
/// - blank lines are skipped
/// - an unterminated final line is still yielded at EOF
/// - the first transport error is yielded once, then the stream ends
pub fn decode_lines<S>(input: S) -> LineStream
where
    S: Stream<Item = Result<Bytes, UpstreamError>> + Send + 'static,
{
    let state = LineState {
        input: Box::pin(input),
        buf: BytesMut::new(),
        scanned: 0,
        eof: false,
        failed: false,
    };

    let lines = stream::unfold(state, |mut st| async move {
        if st.failed {
            return None;
        }
        loop {
            if let Some(pos) = st.buf[st.scanned..].iter().position(|b| *b == b'\n') {
                let idx = st.scanned + pos;
                let raw = st.buf.split_to(idx + 1);
                st.scanned = 0;
                if let Some(line) = to_line(&raw[..idx]) {
                    return Some((Ok(line), st));
                }
                continue;
            }
            st.scanned = st.buf.len();

            if st.eof {
                let raw = st.buf.split();
                st.scanned = 0;
                return to_line(&raw).map(|line| (Ok(line), st));
            }

            match st.input.next().await {
                Some(Ok(bytes)) => st.buf.extend_from_slice(&bytes),
                Some(Err(e)) => {
                    st.failed = true;
                    st.buf.clear();
                    return Some((Err(e), st));
                }
                None => st.eof = true,
            }
        }
    });

    Box::pin(lines)
}

fn to_line(raw: &[u8]) -> Option<String> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    let line = String::from_utf8_lossy(raw);
    if line.trim().is_empty() {
        None
    } else {
        Some(line.into_owned())
    }
}
