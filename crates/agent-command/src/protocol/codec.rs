//! Binary encoding of requests and responses.
//!
//! Integers are big-endian `i32` values and strings are raw UTF-8 preceded by
//! their byte length:
//!
//! ```text
//! request  := [typeLen][type][count] { [nameLen][valueLen][name][value] } * count
//! response := [typeLen][type]
//! ```
//!
//! The request target is not part of the body; it travels in the outer frame
//! and is supplied to [`decode_request`] by the caller.

use std::collections::BTreeMap;
use std::str::FromStr;

use super::errors::{DecodeError, EncodeError};
use super::request::{Request, RequestTarget, RequestType};
use super::response::{Response, ResponseType};

const LENGTH_BYTES: usize = 4;
const MIN_PARAMETER_BYTES: usize = 2 * LENGTH_BYTES;

/// Encodes a request body.
///
/// # Errors
///
/// Fails when the request has no type or a field exceeds `i32::MAX` bytes.
pub fn encode_request(request: &Request) -> Result<Vec<u8>, EncodeError> {
    let request_type = request
        .request_type()
        .ok_or(EncodeError::MissingRequestType)?;
    let mut buffer = Vec::new();
    put_string(&mut buffer, "request type", request_type.wire_name())?;
    put_length(&mut buffer, "parameter count", request.parameters().len())?;
    for (name, value) in request.parameters() {
        put_length(&mut buffer, "parameter name", name.len())?;
        put_length(&mut buffer, "parameter value", value.len())?;
        buffer.extend_from_slice(name.as_bytes());
        buffer.extend_from_slice(value.as_bytes());
    }
    Ok(buffer)
}

/// Decodes a request body addressed to `target`.
///
/// Decoding is all-or-nothing and ignores bytes after the last parameter.
///
/// # Errors
///
/// Returns a [`DecodeError`] for truncated input, negative lengths, an
/// unknown request type, an implausible parameter count or invalid UTF-8.
pub fn decode_request(bytes: &[u8], target: RequestTarget) -> Result<Request, DecodeError> {
    let mut cursor = Cursor::new(bytes);
    let type_length = cursor.read_length("request type length")?;
    let type_name = cursor.read_string(type_length, "request type")?;
    let request_type = RequestType::from_str(type_name).map_err(|_| {
        DecodeError::UnknownRequestType {
            name: type_name.to_owned(),
        }
    })?;

    let count = cursor.read_parameter_count()?;
    let mut parameters = BTreeMap::new();
    for _ in 0..count {
        let name_length = cursor.read_length("parameter name length")?;
        let value_length = cursor.read_length("parameter value length")?;
        let name = cursor.read_string(name_length, "parameter name")?;
        let value = cursor.read_string(value_length, "parameter value")?;
        parameters.insert(name.to_owned(), value.to_owned());
    }

    Ok(Request::from_parts(Some(request_type), target, parameters))
}

/// Encodes a response.
#[must_use]
pub fn encode_response(response: Response) -> Vec<u8> {
    let name = response.response_type().wire_name();
    let mut buffer = Vec::with_capacity(LENGTH_BYTES + name.len());
    // Type names are short ASCII literals, so the length always fits.
    let length = i32::try_from(name.len()).unwrap_or(i32::MAX);
    buffer.extend_from_slice(&encode_i32(length));
    buffer.extend_from_slice(name.as_bytes());
    buffer
}

/// Decodes a response, failing closed on short or unknown input.
///
/// # Errors
///
/// Returns a [`DecodeError`] when the input is truncated, the length is
/// negative or the type name is unknown.
pub fn decode_response(bytes: &[u8]) -> Result<Response, DecodeError> {
    let mut cursor = Cursor::new(bytes);
    let length = cursor.read_length("response type length")?;
    let name = cursor.read_string(length, "response type")?;
    ResponseType::from_str(name)
        .map(Response::new)
        .map_err(|_| DecodeError::UnknownResponseType {
            name: name.to_owned(),
        })
}

fn put_string(buffer: &mut Vec<u8>, field: &'static str, value: &str) -> Result<(), EncodeError> {
    put_length(buffer, field, value.len())?;
    buffer.extend_from_slice(value.as_bytes());
    Ok(())
}

fn put_length(buffer: &mut Vec<u8>, field: &'static str, length: usize) -> Result<(), EncodeError> {
    let value = i32::try_from(length).map_err(|_| EncodeError::TooLong {
        field,
        length,
        max: usize::try_from(i32::MAX).unwrap_or(usize::MAX),
    })?;
    buffer.extend_from_slice(&encode_i32(value));
    Ok(())
}

#[expect(clippy::big_endian_bytes, reason = "the command channel wire format is big-endian")]
const fn encode_i32(value: i32) -> [u8; LENGTH_BYTES] {
    value.to_be_bytes()
}

#[expect(clippy::big_endian_bytes, reason = "the command channel wire format is big-endian")]
const fn decode_i32(bytes: [u8; LENGTH_BYTES]) -> i32 {
    i32::from_be_bytes(bytes)
}

/// Bounds-checked reader over a request or response body.
struct Cursor<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> Cursor<'a> {
    const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    const fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.position)
    }

    fn take(&mut self, length: usize, field: &'static str) -> Result<&'a [u8], DecodeError> {
        let truncated = || DecodeError::Truncated {
            field,
            needed: length,
            available: self.remaining(),
        };
        let end = self.position.checked_add(length).ok_or_else(truncated)?;
        let slice = self.bytes.get(self.position..end).ok_or_else(truncated)?;
        self.position = end;
        Ok(slice)
    }

    fn read_i32(&mut self, field: &'static str) -> Result<i32, DecodeError> {
        let slice = self.take(LENGTH_BYTES, field)?;
        let mut raw = [0_u8; LENGTH_BYTES];
        raw.copy_from_slice(slice);
        Ok(decode_i32(raw))
    }

    fn read_length(&mut self, field: &'static str) -> Result<usize, DecodeError> {
        let length = self.read_i32(field)?;
        usize::try_from(length).map_err(|_| DecodeError::NegativeLength { field, length })
    }

    fn read_string(&mut self, length: usize, field: &'static str) -> Result<&'a str, DecodeError> {
        let slice = self.take(length, field)?;
        std::str::from_utf8(slice).map_err(|source| DecodeError::InvalidUtf8 { field, source })
    }

    fn read_parameter_count(&mut self) -> Result<usize, DecodeError> {
        let count = self.read_i32("parameter count")?;
        let remaining = self.remaining();
        usize::try_from(count)
            .ok()
            .filter(|parameters| {
                parameters
                    .checked_mul(MIN_PARAMETER_BYTES)
                    .is_some_and(|needed| needed <= remaining)
            })
            .ok_or(DecodeError::ParameterCount { count, remaining })
    }
}
