//! The message service boundary.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::errors::ServiceError;
use crate::stream::StreamEvent;
use crate::types::{Message, MessageRequest};

/// A live sequence of response events.
///
/// Pull with `StreamExt::next`; an `Err` item is the stream-level error.
/// Dropping the stream releases it.
pub type EventStream = BoxStream<'static, Result<StreamEvent, ServiceError>>;

/// Trait for services that answer model requests.
///
/// Implementations handle transport, retries and authentication; callers
/// only see complete responses or event streams.
#[async_trait]
pub trait MessageService: Send + Sync {
    /// Send a request and wait for the complete response.
    async fn create(&self, request: &MessageRequest) -> Result<Message, ServiceError>;

    /// Send a request and return the response as a live event stream.
    async fn create_stream(&self, request: &MessageRequest) -> Result<EventStream, ServiceError>;
}
