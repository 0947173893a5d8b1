//! Server-sent event parsing for the device-cloud event feed.
//!
//! The feed is a long-lived `text/event-stream` response. Each block is
//! terminated by a blank line and carries an `event:` name plus a `data:`
//! JSON envelope; lines starting with `:` are keepalive comments (the cloud
//! sends `:ok` on connect).
//!
//! - [`drain_frames`] -- pull complete frames out of a text buffer
//! - [`event_stream`] -- turn a `reqwest::Response` into an [`EventStream`]

use crate::provider::EventStream;
use crate::rest::from_reqwest;
use crate::types::CloudEvent;

/// One complete SSE block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Extract complete frames from a raw SSE byte buffer.
///
/// The buffer is drained in-place: consumed bytes are removed and any
/// trailing partial block remains for the next call. Blocks are decoded as
/// UTF-8 only once complete, so a character split across network chunks
/// survives intact. Multiple `data:` lines in one block are joined with
/// `\n`. Blocks without data (comments, bare `event:` lines) are dropped.
pub(crate) fn drain_frames(buffer: &mut Vec<u8>) -> Vec<SseFrame> {
    normalize_crlf(buffer);
    let mut frames = Vec::new();

    while let Some(pos) = buffer.windows(2).position(|w| w == b"\n\n") {
        let block: Vec<u8> = buffer.drain(..pos).collect();
        buffer.drain(..2);

        let block = String::from_utf8_lossy(&block);
        let mut event = None;
        let mut data: Vec<&str> = Vec::new();
        for line in block.lines() {
            if line.starts_with(':') {
                continue;
            }
            if let Some(name) = line.strip_prefix("event:") {
                event = Some(name.trim().to_owned());
            } else if let Some(d) = line.strip_prefix("data:") {
                data.push(d.trim());
            }
        }

        if !data.is_empty() {
            frames.push(SseFrame {
                event,
                data: data.join("\n"),
            });
        }
    }

    frames
}

/// Rewrite `\r\n` to `\n`. A trailing `\r` is kept: its `\n` may still be
/// in flight.
fn normalize_crlf(buffer: &mut Vec<u8>) {
    if !buffer.contains(&b'\r') {
        return;
    }
    let mut out = Vec::with_capacity(buffer.len());
    for (i, &b) in buffer.iter().enumerate() {
        if b == b'\r' && buffer.get(i + 1) == Some(&b'\n') {
            continue;
        }
        out.push(b);
    }
    *buffer = out;
}

fn frame_to_event(frame: SseFrame) -> CloudEvent {
    CloudEvent::from_frame(frame.event.unwrap_or_else(|| "message".to_owned()), &frame.data)
}

/// Build an [`EventStream`] from an accepted `reqwest::Response`.
///
/// The stream:
/// 1. Buffers incoming chunks and yields one event per complete frame
/// 2. Flushes a trailing partial frame when the body closes, then ends
/// 3. Yields a single `Err` and ends if reading the body fails
pub(crate) fn event_stream(response: reqwest::Response) -> EventStream {
    let stream = async_stream::stream! {
        let mut response = response;
        let mut buffer: Vec<u8> = Vec::new();

        loop {
            match response.chunk().await {
                Ok(Some(bytes)) => {
                    buffer.extend_from_slice(&bytes);
                    for frame in drain_frames(&mut buffer) {
                        yield Ok(frame_to_event(frame));
                    }
                }
                Ok(None) => {
                    if buffer.iter().any(|b| !b.is_ascii_whitespace()) {
                        buffer.extend_from_slice(b"\n\n");
                        for frame in drain_frames(&mut buffer) {
                            yield Ok(frame_to_event(frame));
                        }
                    }
                    break;
                }
                Err(e) => {
                    yield Err(from_reqwest(e));
                    break;
                }
            }
        }
    };

    Box::pin(stream)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_single_event() {
        let mut buf = b"event: temp\ndata: {\"data\":\"21\"}\n\n".to_vec();
        let frames = drain_frames(&mut buf);
        assert_eq!(
            frames,
            vec![SseFrame {
                event: Some("temp".into()),
                data: "{\"data\":\"21\"}".into()
            }]
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn keepalive_comment_is_skipped() {
        let mut buf = b":ok\n\nevent: a\ndata: 1\n\n".to_vec();
        let frames = drain_frames(&mut buf);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("a"));
    }

    #[test]
    fn partial_frame_stays_in_buffer() {
        let mut buf = b"event: a\ndata: 1\n\nevent: b\ndata: 2".to_vec();
        let frames = drain_frames(&mut buf);
        assert_eq!(frames.len(), 1);
        assert_eq!(buf, b"event: b\ndata: 2");

        buf.extend_from_slice(b"\n\n");
        let frames = drain_frames(&mut buf);
        assert_eq!(frames[0].event.as_deref(), Some("b"));
        assert!(buf.is_empty());
    }

    #[test]
    fn crlf_delimiters_are_accepted() {
        let mut buf = b"event: a\r\ndata: 1\r\n\r\n".to_vec();
        let frames = drain_frames(&mut buf);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "1");
    }

    #[test]
    fn multiple_data_lines_are_joined() {
        let mut buf = b"event: a\ndata: x\ndata: y\n\n".to_vec();
        let frames = drain_frames(&mut buf);
        assert_eq!(frames[0].data, "x\ny");
    }

    #[test]
    fn multibyte_char_split_across_chunks() {
        let frame = "event: t\ndata: caf\u{e9}\n\n".as_bytes();
        let split = frame.iter().position(|&b| b == 0xC3).unwrap() + 1;

        let mut buf = frame[..split].to_vec();
        assert!(drain_frames(&mut buf).is_empty());
        buf.extend_from_slice(&frame[split..]);
        let frames = drain_frames(&mut buf);
        assert_eq!(frames[0].data, "caf\u{e9}");
    }

    #[test]
    fn crlf_split_across_chunks() {
        let mut buf = b"event: a\r\ndata: 1\r\n\r".to_vec();
        assert!(drain_frames(&mut buf).is_empty());
        buf.extend_from_slice(b"\n");
        assert_eq!(drain_frames(&mut buf)[0].data, "1");
    }

    #[test]
    fn event_without_name_defaults_to_message() {
        let ev = frame_to_event(SseFrame {
            event: None,
            data: "{}".into(),
        });
        assert_eq!(ev.name, "message");
    }
}
