//! Message channel adapters for edit requests and responses.

mod nats_edit_channel;

pub use nats_edit_channel::{
    CORRELATION_ID_HEADER, NatsChannelConfig, NatsEditChannel, NatsResponseSource,
    REPLY_SUBJECT_HEADER,
};
