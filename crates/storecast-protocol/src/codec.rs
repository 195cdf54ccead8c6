//! Codec for encoding and decoding event-stream frames.
//!
//! Encoding follows the `text/event-stream` format: optional `event:` and
//! `id:` fields, one `data:` field per payload line, and a blank line as the
//! frame terminator. The decoder is incremental and accepts both `\n` and
//! `\r\n` line endings.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::frames::Frame;

/// Maximum encoded frame size (1 MiB).
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame exceeds maximum size.
    #[error("Frame size {0} exceeds maximum {MAX_FRAME_SIZE}")]
    FrameTooLarge(usize),

    /// A single-line field contained a line break.
    #[error("Field '{0}' must not contain line breaks")]
    MultilineField(&'static str),

    /// Frame bytes were not valid UTF-8.
    #[error("Frame is not valid UTF-8")]
    InvalidUtf8,
}

/// Encode a frame to bytes.
///
/// # Errors
///
/// Returns an error if a single-line field contains a line break or the
/// frame is too large.
pub fn encode(frame: &Frame) -> Result<Bytes, ProtocolError> {
    let mut buf = BytesMut::new();
    encode_into(frame, &mut buf)?;
    Ok(buf.freeze())
}

/// Encode a frame into an existing buffer.
///
/// Nothing is written if encoding fails.
///
/// # Errors
///
/// Returns an error if a single-line field contains a line break or the
/// frame is too large.
pub fn encode_into(frame: &Frame, buf: &mut BytesMut) -> Result<(), ProtocolError> {
    let start = buf.len();

    match frame {
        Frame::Event { event, id, data } => {
            let event = event.as_deref().map(|e| single_line("event", e)).transpose()?;
            let id = id.as_deref().map(|i| single_line("id", i)).transpose()?;
            if let Some(event) = event {
                put_field(buf, "event", event);
            }
            if let Some(id) = id {
                put_field(buf, "id", id);
            }
            for line in lines(data) {
                put_field(buf, "data", line);
            }
        }
        Frame::Comment(text) => {
            for line in lines(text) {
                buf.put_slice(b": ");
                buf.put_slice(line.as_bytes());
                buf.put_u8(b'\n');
            }
        }
    }
    buf.put_u8(b'\n');

    let size = buf.len() - start;
    if size > MAX_FRAME_SIZE {
        buf.truncate(start);
        return Err(ProtocolError::FrameTooLarge(size));
    }
    Ok(())
}

/// Size in bytes of the frame `encode` produces for an unnamed event
/// carrying `data`.
#[must_use]
pub fn data_frame_len(data: &str) -> usize {
    lines(data).map(|line| field_len("data", line)).sum::<usize>() + 1
}

fn field_len(name: &str, value: &str) -> usize {
    name.len() + 2 + value.len() + 1
}

fn single_line<'a>(name: &'static str, value: &'a str) -> Result<&'a str, ProtocolError> {
    if value.contains(|c: char| c == '\n' || c == '\r') {
        Err(ProtocolError::MultilineField(name))
    } else {
        Ok(value)
    }
}

fn lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n').map(|line| line.strip_suffix('\r').unwrap_or(line))
}

fn put_field(buf: &mut BytesMut, name: &str, value: &str) {
    buf.put_slice(name.as_bytes());
    buf.put_slice(b": ");
    buf.put_slice(value.as_bytes());
    buf.put_u8(b'\n');
}

/// Try to decode a frame from a buffer, advancing it if successful.
///
/// Returns `Ok(Some(frame))` if a complete frame was decoded,
/// `Ok(None)` if more data is needed, or `Err` on protocol error.
/// Blocks that carry no field (stray blank lines) are skipped.
///
/// # Errors
///
/// Returns an error if a frame is not UTF-8 or grows beyond
/// [`MAX_FRAME_SIZE`] without terminating.
pub fn decode_from(buf: &mut BytesMut) -> Result<Option<Frame>, ProtocolError> {
    loop {
        let Some(end) = find_frame_end(buf) else {
            if buf.len() > MAX_FRAME_SIZE {
                return Err(ProtocolError::FrameTooLarge(buf.len()));
            }
            return Ok(None);
        };

        let raw = buf.split_to(end);
        let text = std::str::from_utf8(&raw).map_err(|_| ProtocolError::InvalidUtf8)?;
        if let Some(frame) = parse_block(text) {
            return Ok(Some(frame));
        }
    }
}

/// Find the index just past the blank line that ends the first frame.
fn find_frame_end(buf: &[u8]) -> Option<usize> {
    let mut line_start = 0;
    for (i, &byte) in buf.iter().enumerate() {
        if byte == b'\n' {
            let line = &buf[line_start..i];
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.is_empty() {
                return Some(i + 1);
            }
            line_start = i + 1;
        }
    }
    None
}

fn parse_block(text: &str) -> Option<Frame> {
    let mut event = None;
    let mut id = None;
    let mut data: Option<Vec<&str>> = None;
    let mut comments: Vec<&str> = Vec::new();

    for line in lines(text).filter(|l| !l.is_empty()) {
        if let Some(comment) = line.strip_prefix(':') {
            comments.push(comment.strip_prefix(' ').unwrap_or(comment));
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => data.get_or_insert_with(Vec::new).push(value),
            "event" => event = Some(value.to_string()),
            "id" => id = Some(value.to_string()),
            // `retry` and unknown fields carry nothing we model.
            _ => {}
        }
    }

    if data.is_some() || event.is_some() || id.is_some() {
        Some(Frame::Event {
            event,
            id,
            data: data.map(|lines| lines.join("\n")).unwrap_or_default(),
        })
    } else if !comments.is_empty() {
        Some(Frame::Comment(comments.join("\n")))
    } else {
        None
    }
}
