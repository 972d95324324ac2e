//! Message channel doubles: a recording publisher and a scripted response
//! source whose settlements tests can inspect.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::EditRequestMessage;
use crate::domain::ports::{
    DeliverySettler, Disposition, EditRequestPublisher, EditResponseSource, MessageChannelError,
    ResponseDelivery,
};

use super::lock;

#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<EditRequestMessage>>,
    tap: Mutex<Option<mpsc::UnboundedSender<EditRequestMessage>>>,
    offline: AtomicBool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<EditRequestMessage> {
        lock(&self.published, "published").clone()
    }

    /// Receive a copy of every message published from now on.
    pub fn tap(&self) -> mpsc::UnboundedReceiver<EditRequestMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        *lock(&self.tap, "tap") = Some(tx);
        rx
    }
}

#[async_trait]
impl EditRequestPublisher for RecordingPublisher {
    async fn publish(&self, message: &EditRequestMessage) -> Result<(), MessageChannelError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(MessageChannelError::unavailable("broker offline"));
        }
        lock(&self.published, "published").push(message.clone());
        if let Some(tap) = lock(&self.tap, "tap").as_ref() {
            let _ = tap.send(message.clone());
        }
        Ok(())
    }
}

type Settlements = Arc<Mutex<Vec<(usize, Disposition)>>>;

/// Yields a fixed list of payloads, then reports exhaustion.
pub struct ScriptedResponseSource {
    pending: VecDeque<(usize, Vec<u8>)>,
    settlements: Settlements,
}

impl ScriptedResponseSource {
    pub fn new(payloads: Vec<Vec<u8>>) -> Self {
        Self {
            pending: payloads.into_iter().enumerate().collect(),
            settlements: Arc::default(),
        }
    }

    /// Handle that reads `(delivery index, disposition)` pairs.
    pub fn settlements(&self) -> Settlements {
        Arc::clone(&self.settlements)
    }
}

#[async_trait]
impl EditResponseSource for ScriptedResponseSource {
    async fn next_delivery(&mut self) -> Result<Option<ResponseDelivery>, MessageChannelError> {
        let Some((index, payload)) = self.pending.pop_front() else {
            return Ok(None);
        };
        Ok(Some(ResponseDelivery {
            payload,
            settler: Box::new(RecordingSettler {
                index,
                settlements: Arc::clone(&self.settlements),
            }),
        }))
    }
}

struct RecordingSettler {
    index: usize,
    settlements: Settlements,
}

#[async_trait]
impl DeliverySettler for RecordingSettler {
    async fn settle(self: Box<Self>, disposition: Disposition) -> Result<(), MessageChannelError> {
        lock(&self.settlements, "settlements").push((self.index, disposition));
        Ok(())
    }
}
