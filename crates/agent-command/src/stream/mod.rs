//! Framed requests carried over a byte stream.

mod errors;
mod frame;
mod reader;

#[cfg(test)]
mod tests;

pub use self::errors::StreamError;
pub use self::frame::{
    BEGIN_REQUEST_TOKEN, END_REQUEST_TOKEN, decode_request_frame, encode_request_frame,
};
pub use self::reader::{ErrorListener, ProcessOutputStreamReader, RequestListener};

const STREAM_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::stream");
