//! Unit tests for outer frames and the stream reader.

use std::io::{self, Read};
use std::sync::mpsc;

use rstest::{fixture, rstest};

use super::*;
use crate::protocol::{Request, RequestTarget, RequestType, encode_request};

struct Captured {
    requests: Vec<Request>,
    errors: Vec<StreamError>,
}

fn parse(bytes: &[u8]) -> Captured {
    let mut requests = Vec::new();
    let mut errors = Vec::new();
    ProcessOutputStreamReader::new(bytes).run(
        &mut |request: Request| requests.push(request),
        &mut |error: StreamError| errors.push(error),
    );
    Captured { requests, errors }
}

#[derive(Default)]
struct FrameBuilder {
    bytes: Vec<u8>,
}

impl FrameBuilder {
    fn utf(mut self, value: &str) -> Self {
        let length = u16::try_from(value.len()).expect("short string");
        self.bytes.extend_from_slice(&length.to_be_bytes());
        self.bytes.extend_from_slice(value.as_bytes());
        self
    }

    fn int(mut self, value: i32) -> Self {
        self.bytes.extend_from_slice(&value.to_be_bytes());
        self
    }

    fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    fn body(self, body: &[u8]) -> Self {
        let length = i32::try_from(body.len()).expect("short body");
        self.int(length).raw(body)
    }

    fn header(self, target: &RequestTarget) -> Self {
        self.utf(BEGIN_REQUEST_TOKEN)
            .utf(target.host())
            .int(i32::from(target.port()))
    }

    fn build(self) -> Vec<u8> {
        self.bytes
    }
}

#[fixture]
fn target() -> RequestTarget {
    RequestTarget::new("127.0.0.1", 12_222)
}

#[fixture]
fn request(target: RequestTarget) -> Request {
    Request::new(RequestType::ResponseExpected, target)
}

fn body_of(request: &Request) -> Vec<u8> {
    encode_request(request).expect("encode body")
}

fn type_only_body(type_name: &str) -> Vec<u8> {
    FrameBuilder::default()
        .int(i32::try_from(type_name.len()).expect("short type"))
        .raw(type_name.as_bytes())
        .int(0)
        .build()
}

#[test]
fn empty_stream_is_a_clean_end() {
    let captured = parse(&[]);
    assert!(captured.requests.is_empty());
    assert!(captured.errors.is_empty());
}

#[rstest]
#[case::no_parameters(&[])]
#[case::one_parameter(&[("param", "value")])]
#[case::many_parameters(&[("a", "1"), ("b", "2"), ("receiver", "com.example.Receiver")])]
fn well_formed_frames_are_delivered(request: Request, #[case] parameters: &[(&str, &str)]) {
    let mut expected = request;
    for (name, value) in parameters {
        expected.set_parameter(*name, *value);
    }
    let bytes = encode_request_frame(&expected).expect("encode frame");

    let captured = parse(&bytes);

    assert!(captured.errors.is_empty(), "errors: {:?}", captured.errors);
    assert_eq!(captured.requests, vec![expected]);
}

#[rstest]
fn bad_begin_token_is_a_protocol_error(request: Request) {
    let bytes = FrameBuilder::default()
        .utf("<BEGIN REQ>")
        .utf(request.target().host())
        .int(12_222)
        .body(&body_of(&request))
        .utf(END_REQUEST_TOKEN)
        .build();

    let captured = parse(&bytes);

    assert!(captured.requests.is_empty());
    assert!(matches!(
        captured.errors.first(),
        Some(StreamError::Protocol { .. })
    ));
}

#[test]
fn end_of_stream_at_host_is_reported() {
    let bytes = FrameBuilder::default().utf(BEGIN_REQUEST_TOKEN).build();
    let captured = parse(&bytes);
    assert!(captured.requests.is_empty());
    assert!(matches!(
        captured.errors.as_slice(),
        [StreamError::EndOfStream {
            field: "target host"
        }]
    ));
}

#[test]
fn end_of_stream_at_port_is_reported() {
    let bytes = FrameBuilder::default()
        .utf(BEGIN_REQUEST_TOKEN)
        .utf("127.0.0.1")
        .raw(&[0, 0])
        .build();
    let captured = parse(&bytes);
    assert!(captured.requests.is_empty());
    assert!(matches!(
        captured.errors.as_slice(),
        [StreamError::EndOfStream {
            field: "target port"
        }]
    ));
}

#[rstest]
#[case::too_large(200_000)]
#[case::negative(-1)]
fn out_of_range_ports_are_protocol_errors(request: Request, #[case] port: i32) {
    let bytes = FrameBuilder::default()
        .utf(BEGIN_REQUEST_TOKEN)
        .utf("127.0.0.1")
        .int(port)
        .body(&body_of(&request))
        .utf(END_REQUEST_TOKEN)
        .build();

    let captured = parse(&bytes);

    assert!(captured.requests.is_empty());
    assert!(matches!(
        captured.errors.first(),
        Some(StreamError::Protocol { .. })
    ));
}

#[rstest]
fn negative_body_length_is_a_protocol_error(target: RequestTarget) {
    let bytes = FrameBuilder::default().header(&target).int(-4).build();
    let captured = parse(&bytes);
    assert!(captured.requests.is_empty());
    assert!(matches!(
        captured.errors.first(),
        Some(StreamError::Protocol { .. })
    ));
}

#[rstest]
#[case::missing_type(type_only_body(""))]
#[case::unknown_type(type_only_body("BadType"))]
#[case::empty_body(Vec::new())]
#[case::missing_parameters(FrameBuilder::default().int(17).raw(b"RESPONSE_EXPECTED").int(1).raw(b"bad").build())]
fn undecodable_bodies_are_reported(target: RequestTarget, #[case] body: Vec<u8>) {
    let bytes = FrameBuilder::default()
        .header(&target)
        .body(&body)
        .utf(END_REQUEST_TOKEN)
        .build();

    let captured = parse(&bytes);

    assert!(captured.requests.is_empty());
    assert!(matches!(
        captured.errors.as_slice(),
        [StreamError::Decode(_)]
    ));
}

#[rstest]
fn body_length_cut_short_by_end_of_stream_is_reported(request: Request) {
    let bytes = FrameBuilder::default()
        .header(request.target())
        .int(64)
        .raw(&body_of(&request))
        .build();
    let captured = parse(&bytes);
    assert!(captured.requests.is_empty());
    assert!(matches!(
        captured.errors.as_slice(),
        [StreamError::EndOfStream {
            field: "request body"
        }]
    ));
}

#[rstest]
fn missing_end_token_drops_the_request(request: Request) {
    let bytes = FrameBuilder::default()
        .header(request.target())
        .body(&body_of(&request))
        .build();

    let captured = parse(&bytes);

    assert!(captured.requests.is_empty());
    assert!(matches!(
        captured.errors.as_slice(),
        [StreamError::EndOfStream { field: "end token" }]
    ));
}

#[rstest]
fn corrupted_end_token_still_delivers_every_request(request: Request) {
    let second = Request::new(RequestType::Ping, RequestTarget::new("localhost", 123))
        .with_parameter("hello", "world");
    let mut bytes = encode_request_frame(&request).expect("first frame");
    bytes.extend(
        FrameBuilder::default()
            .header(second.target())
            .body(&body_of(&second))
            .utf("<END REQ>")
            .build(),
    );
    bytes.extend(encode_request_frame(&request).expect("third frame"));

    let captured = parse(&bytes);

    assert_eq!(captured.requests, vec![request.clone(), second, request]);
    assert!(
        captured
            .errors
            .iter()
            .any(|error| matches!(error, StreamError::Protocol { .. }))
    );
}

#[rstest]
fn short_declared_length_resynchronises_on_the_next_frame(target: RequestTarget) {
    // The first body declares a parameter but a count of zero, and its
    // declared length stops just before a parameter name that happens to be
    // an encoded end token.
    let encoded_end = FrameBuilder::default().utf(END_REQUEST_TOKEN).build();
    let first_body = FrameBuilder::default()
        .int(17)
        .raw(b"RESPONSE_EXPECTED")
        .int(0)
        .int(i32::try_from(encoded_end.len()).expect("short token"))
        .int(0)
        .raw(&encoded_end)
        .build();
    let declared = first_body.len() - encoded_end.len();
    let second = Request::new(
        RequestType::NoResponseExpected,
        RequestTarget::new("localhost", 123),
    )
    .with_parameter("hello", "world");

    let mut bytes = FrameBuilder::default()
        .header(&target)
        .int(i32::try_from(declared).expect("short body"))
        .raw(&first_body)
        .build();
    bytes.extend(encode_request_frame(&second).expect("second frame"));

    let captured = parse(&bytes);

    assert_eq!(captured.requests.len(), 2);
    let first = captured.requests.first().expect("first request");
    assert_eq!(first.request_type(), Some(RequestType::ResponseExpected));
    assert_eq!(first.target(), &target);
    assert!(first.parameters().is_empty());
    assert_eq!(captured.requests.get(1), Some(&second));
}

#[rstest]
fn trailing_garbage_keeps_earlier_requests(request: Request) {
    let mut bytes = encode_request_frame(&request).expect("frame");
    bytes.extend_from_slice(b"garbage!");

    let captured = parse(&bytes);

    assert_eq!(captured.requests, vec![request]);
}

struct FailingReader;

impl Read for FailingReader {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::other("pipe broke"))
    }
}

#[test]
fn io_failures_stop_the_reader() {
    let mut requests = Vec::new();
    let mut errors = Vec::new();
    ProcessOutputStreamReader::new(FailingReader).run(
        &mut |request: Request| requests.push(request),
        &mut |error: StreamError| errors.push(error),
    );
    assert!(requests.is_empty());
    assert_eq!(errors.len(), 1);
    assert!(errors.first().is_some_and(StreamError::is_fatal));
}

#[rstest]
fn spawned_reader_delivers_on_its_own_thread(request: Request) {
    let bytes = encode_request_frame(&request).expect("frame");
    let (sender, received) = mpsc::channel();

    let handle = ProcessOutputStreamReader::new(io::Cursor::new(bytes))
        .spawn(
            move |delivered: Request| {
                let name = std::thread::current().name().map(str::to_owned);
                sender.send((delivered, name)).expect("send request");
            },
            |_: StreamError| {},
        )
        .expect("spawn reader");
    handle.join().expect("reader thread");

    let (delivered, thread_name) = received.recv().expect("delivered request");
    assert!(received.try_recv().is_err());
    assert_eq!(delivered, request);
    assert_eq!(thread_name.as_deref(), Some("process-output-reader"));
}

#[rstest]
fn single_frames_decode_from_memory(request: Request) {
    let expected = request.with_receiver("com.example.Receiver");
    let bytes = encode_request_frame(&expected).expect("frame");
    assert_eq!(decode_request_frame(&bytes).expect("decode frame"), expected);
}

#[rstest]
fn in_memory_frames_reject_bad_end_tokens(request: Request) {
    let bytes = FrameBuilder::default()
        .header(request.target())
        .body(&body_of(&request))
        .utf("<END>")
        .build();
    let error = decode_request_frame(&bytes).expect_err("bad end token");
    assert!(matches!(error, StreamError::Protocol { .. }));
}

#[test]
fn empty_in_memory_frames_are_rejected() {
    let error = decode_request_frame(&[]).expect_err("no frame");
    assert!(matches!(error, StreamError::EndOfStream { .. }));
}
