//! Length-prefixed framing for IPC payloads.
//!
//! Every payload travels as `[u32 length][payload]` with the length in
//! big-endian order. Payloads larger than [`MAX_FRAME_BYTES`] are refused in
//! both directions.

use std::io::{self, Read, Write};

use crate::IpcError;

/// Largest payload accepted on an IPC connection.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

const HEADER_BYTES: usize = 4;

/// Reads one frame.
///
/// Returns `Ok(None)` when the peer closes the connection cleanly before the
/// first header byte.
///
/// # Errors
///
/// Returns [`IpcError::FrameTooLarge`] for oversized frames and
/// [`IpcError::Closed`] when the stream ends mid-frame.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>, IpcError> {
    let mut header = [0_u8; HEADER_BYTES];
    if !read_header(reader, &mut header)? {
        return Ok(None);
    }

    let length = decode_length(header)?;
    if length > MAX_FRAME_BYTES {
        return Err(IpcError::FrameTooLarge {
            length,
            max: MAX_FRAME_BYTES,
        });
    }

    let mut payload = vec![0_u8; length];
    reader.read_exact(&mut payload).map_err(|source| {
        if source.kind() == io::ErrorKind::UnexpectedEof {
            IpcError::Closed
        } else {
            IpcError::Read { source }
        }
    })?;
    Ok(Some(payload))
}

/// Writes one frame and flushes the writer.
///
/// # Errors
///
/// Returns [`IpcError::FrameTooLarge`] for oversized payloads and
/// [`IpcError::Write`] when the writer fails.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<(), IpcError> {
    let header = encode_length(payload.len())?;
    writer
        .write_all(&header)
        .and_then(|()| writer.write_all(payload))
        .and_then(|()| writer.flush())
        .map_err(|source| IpcError::Write { source })
}

fn read_header<R: Read>(reader: &mut R, header: &mut [u8; HEADER_BYTES]) -> Result<bool, IpcError> {
    let mut filled = 0;
    while let Some(remaining) = header.get_mut(filled..).filter(|rest| !rest.is_empty()) {
        match reader.read(remaining) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => return Err(IpcError::Closed),
            Ok(read) => filled += read,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(source) => return Err(IpcError::Read { source }),
        }
    }
    Ok(true)
}

#[expect(clippy::big_endian_bytes, reason = "IPC frames use network byte order")]
fn decode_length(header: [u8; HEADER_BYTES]) -> Result<usize, IpcError> {
    let raw = u32::from_be_bytes(header);
    usize::try_from(raw).map_err(|_| IpcError::FrameTooLarge {
        length: usize::MAX,
        max: MAX_FRAME_BYTES,
    })
}

#[expect(clippy::big_endian_bytes, reason = "IPC frames use network byte order")]
fn encode_length(length: usize) -> Result<[u8; HEADER_BYTES], IpcError> {
    if length > MAX_FRAME_BYTES {
        return Err(IpcError::FrameTooLarge {
            length,
            max: MAX_FRAME_BYTES,
        });
    }
    let value = u32::try_from(length).map_err(|_| IpcError::FrameTooLarge {
        length,
        max: MAX_FRAME_BYTES,
    })?;
    Ok(value.to_be_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn frames_carry_their_payload() {
        let mut wire = Vec::new();
        write_frame(&mut wire, b"<SERVER STARTED>").expect("write frame");
        write_frame(&mut wire, b"").expect("write empty frame");

        let mut reader = Cursor::new(wire);
        let first = read_frame(&mut reader).expect("read frame");
        let second = read_frame(&mut reader).expect("read empty frame");
        let end = read_frame(&mut reader).expect("clean end");

        assert_eq!(first.as_deref(), Some(&b"<SERVER STARTED>"[..]));
        assert_eq!(second.as_deref(), Some(&b""[..]));
        assert!(end.is_none());
    }

    #[test]
    fn header_is_big_endian() {
        let mut wire = Vec::new();
        write_frame(&mut wire, b"abc").expect("write frame");
        assert_eq!(wire, vec![0, 0, 0, 3, b'a', b'b', b'c']);
    }

    #[test]
    fn partial_header_reports_closed_connection() {
        let mut reader = Cursor::new(vec![0_u8, 0]);
        let error = read_frame(&mut reader).expect_err("partial header");
        assert!(matches!(error, IpcError::Closed));
    }

    #[test]
    fn truncated_payload_reports_closed_connection() {
        let mut reader = Cursor::new(vec![0_u8, 0, 0, 5, b'a']);
        let error = read_frame(&mut reader).expect_err("truncated payload");
        assert!(matches!(error, IpcError::Closed));
    }

    #[test]
    fn oversized_frames_are_refused() {
        let mut reader = Cursor::new(vec![0xff_u8, 0xff, 0xff, 0xff]);
        let error = read_frame(&mut reader).expect_err("oversized frame");
        assert!(matches!(error, IpcError::FrameTooLarge { .. }));

        let payload = vec![0_u8; MAX_FRAME_BYTES + 1];
        let mut sink = Vec::new();
        let write_error = write_frame(&mut sink, &payload).expect_err("oversized write");
        assert!(matches!(write_error, IpcError::FrameTooLarge { .. }));
        assert!(sink.is_empty());
    }
}
