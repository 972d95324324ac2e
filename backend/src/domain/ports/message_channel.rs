//! Ports for the durable, at-least-once edit request and response queues.
//!
//! Publishing and consuming are separate seams: request handlers only
//! publish, and the single consumer task per process only pulls responses.
//! Every delivery must be settled explicitly.

use async_trait::async_trait;

use crate::domain::EditRequestMessage;

use super::define_port_error;

define_port_error! {
    /// Errors surfaced by message channel adapters.
    pub enum MessageChannelError {
        /// Broker is unreachable.
        Unavailable { message: String } => "message channel is unavailable: {message}",
        /// Broker refused or failed to persist the message.
        Rejected { message: String } => "message channel rejected the message: {message}",
        /// The subscription ended and will yield no more deliveries.
        Closed => "message channel subscription closed",
    }
}

/// How a consumed delivery is settled with the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    /// Processed; remove from the queue.
    Ack,
    /// Unprocessable; remove from the queue without redelivery.
    Drop,
    /// Processing failed transiently; redeliver later.
    Requeue,
}

impl Disposition {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ack => "ack",
            Self::Drop => "drop",
            Self::Requeue => "requeue",
        }
    }
}

/// Publish edit requests durably.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EditRequestPublisher: Send + Sync {
    /// Returns once the broker has persisted the message.
    async fn publish(&self, message: &EditRequestMessage) -> Result<(), MessageChannelError>;
}

/// Settles one delivery. Consumed on use.
#[async_trait]
pub trait DeliverySettler: Send {
    async fn settle(self: Box<Self>, disposition: Disposition) -> Result<(), MessageChannelError>;
}

/// One response payload pulled from the response queue.
pub struct ResponseDelivery {
    pub payload: Vec<u8>,
    pub settler: Box<dyn DeliverySettler>,
}

impl std::fmt::Debug for ResponseDelivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseDelivery")
            .field("payload_len", &self.payload.len())
            .finish_non_exhaustive()
    }
}

/// Pull edit responses one at a time.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EditResponseSource: Send {
    /// Wait for the next delivery. `Ok(None)` means the source is exhausted.
    async fn next_delivery(&mut self) -> Result<Option<ResponseDelivery>, MessageChannelError>;
}
