//! Unit tests for the receiver registry.

use std::sync::Arc;

use rstest::{fixture, rstest};

use super::*;
use crate::protocol::{RequestTarget, RequestType, ResponseType};

struct FixedReceiver(Response);

impl RequestReceiver for FixedReceiver {
    fn receive(&self, _request: &Request) -> Response {
        self.0
    }
}

#[fixture]
fn registry() -> ReceiverRegistry {
    let registry = ReceiverRegistry::new();
    registry
        .register("com.example.Ok", Arc::new(FixedReceiver(Response::ok())))
        .expect("register receiver");
    registry
}

#[rstest]
fn registered_receivers_are_found(registry: ReceiverRegistry) {
    let receiver = registry.receiver("com.example.Ok").expect("receiver");
    let request = Request::new(RequestType::Ping, RequestTarget::new("localhost", 1));
    assert_eq!(receiver.receive(&request).response_type(), ResponseType::Ok);
    assert_eq!(registry.len(), 1);
}

#[rstest]
fn unknown_names_are_absent(registry: ReceiverRegistry) {
    assert!(registry.receiver("com.example.Missing").is_none());
}

#[rstest]
fn duplicate_names_are_rejected(registry: ReceiverRegistry) {
    let error = registry
        .register("com.example.Ok", Arc::new(FixedReceiver(Response::error())))
        .expect_err("duplicate");
    assert_eq!(
        error,
        RegistryError::Duplicate {
            name: String::from("com.example.Ok")
        }
    );
    let receiver = registry.receiver("com.example.Ok").expect("original kept");
    let request = Request::new(RequestType::Ping, RequestTarget::new("localhost", 1));
    assert_eq!(receiver.receive(&request).response_type(), ResponseType::Ok);
}

#[rstest]
#[case("")]
#[case("   ")]
fn blank_names_are_rejected(registry: ReceiverRegistry, #[case] name: &str) {
    let error = registry
        .register(name, Arc::new(FixedReceiver(Response::ok())))
        .expect_err("blank name");
    assert_eq!(error, RegistryError::BlankName);
}

#[rstest]
fn unregistered_receivers_disappear(registry: ReceiverRegistry) {
    assert!(registry.unregister("com.example.Ok").is_some());
    assert!(registry.receiver("com.example.Ok").is_none());
    assert!(registry.is_empty());
    assert!(registry.unregister("com.example.Ok").is_none());
}

#[rstest]
fn debug_lists_names(registry: ReceiverRegistry) {
    assert!(format!("{registry:?}").contains("com.example.Ok"));
}
