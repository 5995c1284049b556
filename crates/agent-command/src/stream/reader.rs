//! Background reader for request frames written to a process's output.

use std::io::{self, BufReader, Read};
use std::thread;

use tracing::{debug, warn};

use super::STREAM_TARGET;
use super::errors::StreamError;
use super::frame::{end_token_mismatch, read_frame};
use crate::protocol::Request;

/// Receives requests decoded by a [`ProcessOutputStreamReader`].
pub trait RequestListener {
    /// Called once per delivered request, on the reader's thread.
    fn request_received(&mut self, request: Request);
}

/// Receives errors raised by a [`ProcessOutputStreamReader`].
pub trait ErrorListener {
    /// Called once per error, on the reader's thread.
    fn error_occurred(&mut self, error: StreamError);
}

impl<F: FnMut(Request)> RequestListener for F {
    fn request_received(&mut self, request: Request) {
        self(request);
    }
}

impl<F: FnMut(StreamError)> ErrorListener for F {
    fn error_occurred(&mut self, error: StreamError) {
        self(error);
    }
}

/// Parses consecutive request frames from a byte stream.
///
/// The reader keeps going after malformed frames, trying the next begin
/// token, and stops only at a clean end of stream or an I/O failure.
/// A request whose end token is wrong is still delivered after the mismatch
/// is reported; a request whose end token is cut off by the end of the stream
/// is not.
#[derive(Debug)]
pub struct ProcessOutputStreamReader<R> {
    reader: BufReader<R>,
}

impl<R: Read> ProcessOutputStreamReader<R> {
    /// Wraps `reader` in a buffered frame reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    /// Reads frames until the stream ends, invoking the listeners inline.
    pub fn run<L, E>(&mut self, requests: &mut L, errors: &mut E)
    where
        L: RequestListener + ?Sized,
        E: ErrorListener + ?Sized,
    {
        loop {
            match read_frame(&mut self.reader) {
                Ok(None) => {
                    debug!(target: STREAM_TARGET, "request stream closed");
                    return;
                }
                Ok(Some(frame)) => {
                    if let Some(token) = frame.end_token {
                        errors.error_occurred(end_token_mismatch(&token));
                    }
                    match frame.request {
                        Ok(request) => requests.request_received(request),
                        Err(error) => errors.error_occurred(StreamError::Decode(error)),
                    }
                }
                Err(error) => {
                    let fatal = error.is_fatal();
                    warn!(target: STREAM_TARGET, error = %error, "malformed request frame");
                    errors.error_occurred(error);
                    if fatal {
                        return;
                    }
                }
            }
        }
    }
}

impl<R: Read + Send + 'static> ProcessOutputStreamReader<R> {
    /// Runs the reader on a dedicated, named thread.
    ///
    /// # Errors
    ///
    /// Returns the error raised when the thread cannot be spawned.
    pub fn spawn<L, E>(mut self, mut requests: L, mut errors: E) -> io::Result<thread::JoinHandle<()>>
    where
        L: RequestListener + Send + 'static,
        E: ErrorListener + Send + 'static,
    {
        thread::Builder::new()
            .name("process-output-reader".to_owned())
            .spawn(move || self.run(&mut requests, &mut errors))
    }
}
