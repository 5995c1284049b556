//! Requests, responses and their binary encoding.

mod codec;
mod errors;
mod request;
mod response;


pub use self::codec::{decode_request, decode_response, encode_request, encode_response};
pub use self::errors::{DecodeError, EncodeError};
pub use self::request::{
    ACTION_PARAMETER, AUTH_TOKEN_PARAMETER, CLIENT_TOKEN_PARAMETER, RECEIVER_PARAMETER, Request,
    RequestTarget, RequestType,
};
pub use self::response::{Response, ResponseType};
