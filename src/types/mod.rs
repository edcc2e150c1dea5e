//! Request and response data model.

pub mod message;
pub mod request;
pub mod response;

pub use message::{Message, MessageRole};
pub use request::CompletionRequest;
pub use response::{Choice, CompletionResponse, Usage};
