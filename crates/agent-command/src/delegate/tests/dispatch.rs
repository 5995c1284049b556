//! Steady-state dispatch of request frames.

use std::sync::Arc;

use mockall::predicate::eq;
use rstest::{fixture, rstest};

use super::{MockReceiver, MockStorage};
use crate::auth::{AuthToken, SecureStorage};
use crate::delegate::RequestDispatcher;
use crate::protocol::{
    ACTION_PARAMETER, AUTH_TOKEN_PARAMETER, CLIENT_TOKEN_PARAMETER, Request, RequestTarget,
    RequestType, Response, ResponseType,
};
use crate::receiver::ReceiverRegistry;
use crate::stream::encode_request_frame;

const RECEIVER: &str = "com.example.MyReceiver";

#[fixture]
fn request() -> Request {
    Request::new(
        RequestType::ResponseExpected,
        RequestTarget::new("127.0.0.1", 12_000),
    )
    .with_receiver(RECEIVER)
}

fn dispatcher_with(receiver: MockReceiver, storage: Option<MockStorage>) -> RequestDispatcher {
    let registry = ReceiverRegistry::new();
    registry
        .register(RECEIVER, Arc::new(receiver))
        .expect("register receiver");
    RequestDispatcher::new(
        Arc::new(registry),
        storage.map(|storage| Arc::new(storage) as Arc<dyn SecureStorage>),
    )
}

fn receiver_returning(response: Response) -> MockReceiver {
    let mut receiver = MockReceiver::new();
    receiver
        .expect_receive()
        .once()
        .return_const(response);
    receiver
}

fn frame(request: &Request) -> Vec<u8> {
    encode_request_frame(request).expect("encode frame")
}

#[rstest]
fn registered_receivers_answer(request: Request) {
    let mut receiver = MockReceiver::new();
    receiver
        .expect_receive()
        .withf(|request| request.parameter("param") == Some("value"))
        .once()
        .return_const(Response::ok());
    let dispatcher = dispatcher_with(receiver, None);

    let response = dispatcher.dispatch(&frame(&request.with_parameter("param", "value")));

    assert_eq!(response.response_type(), ResponseType::Ok);
}

#[rstest]
fn receiver_responses_are_passed_through(request: Request) {
    let dispatcher = dispatcher_with(receiver_returning(Response::error()), None);
    assert_eq!(
        dispatcher.dispatch(&frame(&request)).response_type(),
        ResponseType::Error
    );
}

#[rstest]
#[case::empty(Vec::new())]
#[case::garbage(b"not a frame".to_vec())]
fn undecodable_payloads_are_errors(#[case] payload: Vec<u8>) {
    let dispatcher = dispatcher_with(MockReceiver::new(), None);
    assert_eq!(
        dispatcher.dispatch(&payload).response_type(),
        ResponseType::Error
    );
}

#[rstest]
#[case::missing(None)]
#[case::blank(Some("  "))]
fn requests_without_a_receiver_name_are_errors(#[case] receiver: Option<&str>) {
    let mut request = Request::new(RequestType::Ping, RequestTarget::new("localhost", 1));
    if let Some(name) = receiver {
        request = request.with_receiver(name);
    }
    let dispatcher = dispatcher_with(MockReceiver::new(), None);

    assert_eq!(
        dispatcher.dispatch(&frame(&request)).response_type(),
        ResponseType::Error
    );
}

#[test]
fn untyped_requests_are_errors() {
    let request = Request::untyped(RequestTarget::new("localhost", 1)).with_receiver(RECEIVER);
    let dispatcher = dispatcher_with(MockReceiver::new(), None);

    assert_eq!(
        dispatcher.dispatch_request(&request).response_type(),
        ResponseType::Error
    );
}

#[rstest]
fn unknown_receivers_are_errors(request: Request) {
    let dispatcher = dispatcher_with(MockReceiver::new(), None);
    let request = request.with_receiver("com.example.Unknown");

    assert_eq!(
        dispatcher.dispatch(&frame(&request)).response_type(),
        ResponseType::Error
    );
}

fn authenticated(request: Request, client_token: &str) -> Request {
    request
        .with_parameter(AUTH_TOKEN_PARAMETER, "TXlBdXRoVG9rZW4=")
        .with_parameter(CLIENT_TOKEN_PARAMETER, client_token)
        .with_parameter(ACTION_PARAMETER, "DoSomething")
}

fn storage_accepting_only(expected: AuthToken) -> MockStorage {
    let mut storage = MockStorage::new();
    storage
        .expect_verify_token()
        .with(mockall::predicate::always(), eq("DoSomething"))
        .once()
        .returning(move |token, _| Ok(token == &expected));
    storage
}

fn stored_token() -> AuthToken {
    AuthToken::new(b"MyAuthToken".to_vec(), b"MyClientToken".to_vec())
}

#[rstest]
fn verified_tokens_reach_the_receiver(request: Request) {
    let dispatcher = dispatcher_with(
        receiver_returning(Response::ok()),
        Some(storage_accepting_only(stored_token())),
    );

    let response = dispatcher.dispatch(&frame(&authenticated(request, "TXlDbGllbnRUb2tlbg==")));

    assert_eq!(response.response_type(), ResponseType::Ok);
}

#[rstest]
fn mismatched_tokens_are_rejected(request: Request) {
    let dispatcher = dispatcher_with(
        MockReceiver::new(),
        Some(storage_accepting_only(stored_token())),
    );

    // "d3JvbmdUb2tlbg==" is "wrongToken".
    let response = dispatcher.dispatch(&frame(&authenticated(request, "d3JvbmdUb2tlbg==")));

    assert_eq!(response.response_type(), ResponseType::AuthFailed);
}

#[rstest]
fn tokens_without_storage_are_rejected(request: Request) {
    let dispatcher = dispatcher_with(MockReceiver::new(), None);

    let response = dispatcher.dispatch(&frame(&authenticated(request, "TXlDbGllbnRUb2tlbg==")));

    assert_eq!(response.response_type(), ResponseType::AuthFailed);
}

#[rstest]
fn requests_without_tokens_skip_verification(request: Request) {
    let dispatcher = dispatcher_with(
        receiver_returning(Response::ok()),
        Some(MockStorage::new()),
    );

    let response = dispatcher.dispatch(&frame(&request));

    assert_eq!(response.response_type(), ResponseType::Ok);
}
