//! Unit tests for the command channel delegate.

mod dispatch;

use mockall::mock;

use crate::auth::{AuthToken, SecureStorage, StorageError};
use crate::protocol::{Request, Response};
use crate::receiver::RequestReceiver;

mock! {
    pub Receiver {}
    impl RequestReceiver for Receiver {
        fn receive(&self, request: &Request) -> Response;
    }
}

mock! {
    pub Storage {}
    impl SecureStorage for Storage {
        fn verify_token(&self, token: &AuthToken, action: &str) -> Result<bool, StorageError>;
    }
}
