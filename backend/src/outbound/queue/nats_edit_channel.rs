//! NATS JetStream edit channel.
//!
//! One stream captures both edit subjects so requests and responses survive
//! restarts on either side. Responses are read through a durable pull
//! consumer with explicit acknowledgement, shared by every replica.

use std::time::Duration;

use async_nats::HeaderMap;
use async_nats::jetstream::{self, AckKind, consumer, stream};
use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::domain::EditRequestMessage;
use crate::domain::ports::{
    DeliverySettler, Disposition, EditRequestPublisher, EditResponseSource, MessageChannelError,
    ResponseDelivery,
};

pub const CORRELATION_ID_HEADER: &str = "Correlation-Id";
pub const REPLY_SUBJECT_HEADER: &str = "Reply-Subject";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Redelivery delay for responses the ledger could not apply.
const REQUEUE_DELAY: Duration = Duration::from_secs(5);

/// Subjects and names for the edit stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NatsChannelConfig {
    pub request_subject: String,
    pub response_subject: String,
    pub stream_name: String,
    pub consumer_name: String,
}

#[derive(Clone)]
pub struct NatsEditChannel {
    jetstream: jetstream::Context,
    config: NatsChannelConfig,
}

impl NatsEditChannel {
    /// Connect and make sure the edit stream exists.
    pub async fn connect(
        url: &str,
        config: NatsChannelConfig,
    ) -> Result<Self, MessageChannelError> {
        info!(%url, "connecting to NATS");
        let client = timeout(CONNECT_TIMEOUT, async_nats::connect(url))
            .await
            .map_err(|_| {
                MessageChannelError::unavailable(format!("timed out connecting to {url}"))
            })?
            .map_err(|err| MessageChannelError::unavailable(err.to_string()))?;
        let jetstream = jetstream::new(client);

        jetstream
            .get_or_create_stream(stream::Config {
                name: config.stream_name.clone(),
                subjects: vec![
                    config.request_subject.clone(),
                    config.response_subject.clone(),
                ],
                ..Default::default()
            })
            .await
            .map_err(|err| MessageChannelError::unavailable(err.to_string()))?;
        info!(stream = %config.stream_name, "edit stream ready");

        Ok(Self { jetstream, config })
    }

    /// Open the durable response consumer.
    pub async fn response_source(&self) -> Result<NatsResponseSource, MessageChannelError> {
        let stream = self
            .jetstream
            .get_stream(&self.config.stream_name)
            .await
            .map_err(|err| MessageChannelError::unavailable(err.to_string()))?;
        let consumer = stream
            .get_or_create_consumer(
                &self.config.consumer_name,
                consumer::pull::Config {
                    durable_name: Some(self.config.consumer_name.clone()),
                    filter_subject: self.config.response_subject.clone(),
                    ack_policy: consumer::AckPolicy::Explicit,
                    ..Default::default()
                },
            )
            .await
            .map_err(|err| MessageChannelError::unavailable(err.to_string()))?;
        let messages = consumer
            .messages()
            .await
            .map_err(|err| MessageChannelError::unavailable(err.to_string()))?;
        Ok(NatsResponseSource { messages })
    }
}

fn request_headers(message: &EditRequestMessage, reply_subject: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        CORRELATION_ID_HEADER,
        message.correlation_id.to_string().as_str(),
    );
    headers.insert(REPLY_SUBJECT_HEADER, reply_subject);
    headers
}

#[async_trait]
impl EditRequestPublisher for NatsEditChannel {
    async fn publish(&self, message: &EditRequestMessage) -> Result<(), MessageChannelError> {
        let payload = serde_json::to_vec(message)
            .map_err(|err| MessageChannelError::rejected(err.to_string()))?;
        let headers = request_headers(message, &self.config.response_subject);

        let ack = self
            .jetstream
            .publish_with_headers(
                self.config.request_subject.clone(),
                headers,
                payload.into(),
            )
            .await
            .map_err(|err| MessageChannelError::unavailable(err.to_string()))?;
        ack.await
            .map_err(|err| MessageChannelError::rejected(err.to_string()))?;
        debug!(
            correlation_id = %message.correlation_id,
            subject = %self.config.request_subject,
            "edit request persisted"
        );
        Ok(())
    }
}

/// Pull-based stream of edit responses.
pub struct NatsResponseSource {
    messages: consumer::pull::Stream,
}

#[async_trait]
impl EditResponseSource for NatsResponseSource {
    async fn next_delivery(&mut self) -> Result<Option<ResponseDelivery>, MessageChannelError> {
        match self.messages.next().await {
            None => Ok(None),
            Some(Err(err)) => Err(MessageChannelError::unavailable(err.to_string())),
            Some(Ok(message)) => Ok(Some(ResponseDelivery {
                payload: message.payload.to_vec(),
                settler: Box::new(JetStreamSettler { message }),
            })),
        }
    }
}

struct JetStreamSettler {
    message: jetstream::Message,
}

fn ack_kind(disposition: Disposition) -> AckKind {
    match disposition {
        Disposition::Ack => AckKind::Ack,
        Disposition::Drop => AckKind::Term,
        Disposition::Requeue => AckKind::Nak(Some(REQUEUE_DELAY)),
    }
}

#[async_trait]
impl DeliverySettler for JetStreamSettler {
    async fn settle(self: Box<Self>, disposition: Disposition) -> Result<(), MessageChannelError> {
        self.message
            .ack_with(ack_kind(disposition))
            .await
            .map_err(|err| MessageChannelError::unavailable(err.to_string()))
    }
}
