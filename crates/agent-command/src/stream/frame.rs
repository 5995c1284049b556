//! Outer request frames.
//!
//! ```text
//! [utf "<BEGIN REQUEST>"][utf host][i32 port][i32 length][length bytes][utf "<END REQUEST>"]
//! ```
//!
//! `utf` strings carry a big-endian `u16` byte length followed by UTF-8. The
//! body is a request encoded by [`crate::protocol::encode_request`]. Its
//! declared length is trusted: a short declaration leaves the remaining body
//! bytes to be read as the end token, which is how a garbled frame can still
//! resynchronise on the next one.

use std::io::{self, Read};

use crate::protocol::{
    DecodeError, EncodeError, Request, RequestTarget, decode_request, encode_request,
};

use super::errors::StreamError;

/// Token that opens every frame.
pub const BEGIN_REQUEST_TOKEN: &str = "<BEGIN REQUEST>";
/// Token that closes every frame.
pub const END_REQUEST_TOKEN: &str = "<END REQUEST>";

const BEGIN_FIELD: &str = "begin token";
const END_FIELD: &str = "end token";

/// A fully consumed frame.
pub(super) struct RawFrame {
    pub(super) request: Result<Request, DecodeError>,
    pub(super) end_token: Option<String>,
}

/// Encodes `request`, including its target, as one outer frame.
///
/// # Errors
///
/// Fails when the request has no type or a field exceeds its length prefix.
pub fn encode_request_frame(request: &Request) -> Result<Vec<u8>, EncodeError> {
    let body = encode_request(request)?;
    let body_length = i32::try_from(body.len()).map_err(|_| EncodeError::TooLong {
        field: "request body",
        length: body.len(),
        max: usize::try_from(i32::MAX).unwrap_or(usize::MAX),
    })?;

    let mut frame = Vec::with_capacity(body.len() + 64);
    put_utf(&mut frame, BEGIN_FIELD, BEGIN_REQUEST_TOKEN)?;
    put_utf(&mut frame, "target host", request.target().host())?;
    frame.extend_from_slice(&wire::encode_i32(i32::from(request.target().port())));
    frame.extend_from_slice(&wire::encode_i32(body_length));
    frame.extend_from_slice(&body);
    put_utf(&mut frame, END_FIELD, END_REQUEST_TOKEN)?;
    Ok(frame)
}

/// Decodes exactly one well-formed frame held in memory.
///
/// Unlike [`super::ProcessOutputStreamReader`], a mismatched end token is an
/// error here.
///
/// # Errors
///
/// Returns the first [`StreamError`] the frame triggers.
pub fn decode_request_frame(bytes: &[u8]) -> Result<Request, StreamError> {
    let mut reader = bytes;
    let frame = read_frame(&mut reader)?.ok_or(StreamError::EndOfStream { field: BEGIN_FIELD })?;
    if let Some(token) = frame.end_token {
        return Err(end_token_mismatch(&token));
    }
    frame.request.map_err(StreamError::Decode)
}

/// Reads the next frame.
///
/// Returns `Ok(None)` on a clean end of stream before the first byte of the
/// begin token.
pub(super) fn read_frame<R: Read>(reader: &mut R) -> Result<Option<RawFrame>, StreamError> {
    let Some(begin) = read_leading_utf(reader)? else {
        return Ok(None);
    };
    if begin != BEGIN_REQUEST_TOKEN {
        return Err(StreamError::protocol(format!(
            "expected '{BEGIN_REQUEST_TOKEN}', found '{}'",
            begin.escape_debug()
        )));
    }

    let host = read_utf(reader, "target host")?;
    let raw_port = read_i32(reader, "target port")?;
    let port = u16::try_from(raw_port)
        .map_err(|_| StreamError::protocol(format!("target port {raw_port} out of range")))?;
    let raw_length = read_i32(reader, "request length")?;
    let length = u64::try_from(raw_length)
        .map_err(|_| StreamError::protocol(format!("negative request length {raw_length}")))?;
    let body = read_body(reader, length)?;
    let end = read_utf(reader, END_FIELD)?;

    Ok(Some(RawFrame {
        request: decode_request(&body, RequestTarget::new(host, port)),
        end_token: (end != END_REQUEST_TOKEN).then_some(end),
    }))
}

pub(super) fn end_token_mismatch(found: &str) -> StreamError {
    StreamError::protocol(format!(
        "expected '{END_REQUEST_TOKEN}', found '{}'",
        found.escape_debug()
    ))
}

fn read_body<R: Read>(reader: &mut R, length: u64) -> Result<Vec<u8>, StreamError> {
    let mut body = Vec::new();
    let read = reader
        .take(length)
        .read_to_end(&mut body)
        .map_err(|source| StreamError::io("request body", source))?;
    if u64::try_from(read).ok() != Some(length) {
        return Err(StreamError::EndOfStream {
            field: "request body",
        });
    }
    Ok(body)
}

/// Reads the begin token, distinguishing a clean end of stream.
fn read_leading_utf<R: Read>(reader: &mut R) -> Result<Option<String>, StreamError> {
    let mut header = [0_u8; 2];
    let (first, second) = header.split_at_mut(1);
    loop {
        match reader.read(first) {
            Ok(0) => return Ok(None),
            Ok(_) => break,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(source) => return Err(StreamError::io(BEGIN_FIELD, source)),
        }
    }
    reader
        .read_exact(second)
        .map_err(|source| StreamError::io(BEGIN_FIELD, source))?;
    read_utf_body(reader, BEGIN_FIELD, wire::decode_u16(header)).map(Some)
}

fn read_utf<R: Read>(reader: &mut R, field: &'static str) -> Result<String, StreamError> {
    let mut header = [0_u8; 2];
    reader
        .read_exact(&mut header)
        .map_err(|source| StreamError::io(field, source))?;
    read_utf_body(reader, field, wire::decode_u16(header))
}

fn read_utf_body<R: Read>(
    reader: &mut R,
    field: &'static str,
    length: u16,
) -> Result<String, StreamError> {
    let mut bytes = vec![0_u8; usize::from(length)];
    reader
        .read_exact(&mut bytes)
        .map_err(|source| StreamError::io(field, source))?;
    String::from_utf8(bytes)
        .map_err(|error| StreamError::protocol(format!("{field} is not valid UTF-8: {error}")))
}

fn read_i32<R: Read>(reader: &mut R, field: &'static str) -> Result<i32, StreamError> {
    let mut bytes = [0_u8; 4];
    reader
        .read_exact(&mut bytes)
        .map_err(|source| StreamError::io(field, source))?;
    Ok(wire::decode_i32(bytes))
}

fn put_utf(frame: &mut Vec<u8>, field: &'static str, value: &str) -> Result<(), EncodeError> {
    let length = u16::try_from(value.len()).map_err(|_| EncodeError::TooLong {
        field,
        length: value.len(),
        max: usize::from(u16::MAX),
    })?;
    frame.extend_from_slice(&wire::encode_u16(length));
    frame.extend_from_slice(value.as_bytes());
    Ok(())
}

#[expect(clippy::big_endian_bytes, reason = "frame fields are big-endian")]
mod wire {
    pub(super) const fn encode_i32(value: i32) -> [u8; 4] {
        value.to_be_bytes()
    }

    pub(super) const fn decode_i32(bytes: [u8; 4]) -> i32 {
        i32::from_be_bytes(bytes)
    }

    pub(super) const fn encode_u16(value: u16) -> [u8; 2] {
        value.to_be_bytes()
    }

    pub(super) const fn decode_u16(bytes: [u8; 2]) -> u16 {
        u16::from_be_bytes(bytes)
    }
}
