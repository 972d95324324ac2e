//! Long-lived response consumer.
//!
//! A pump task pulls deliveries from the response source and hands them to
//! the finalize loop over a bounded channel. The channel capacity bounds how
//! far the pump runs ahead of ledger writes; a full channel stalls the pump,
//! which in turn leaves messages with the broker.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::EditOrchestrator;
use crate::domain::ports::{
    Disposition, EditResponseSource, MessageChannelError, ResponseDelivery,
};

/// Count of settled deliveries by disposition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerReport {
    pub acked: u64,
    pub dropped: u64,
    pub requeued: u64,
}

impl ConsumerReport {
    fn record(&mut self, disposition: Disposition) {
        match disposition {
            Disposition::Ack => self.acked += 1,
            Disposition::Drop => self.dropped += 1,
            Disposition::Requeue => self.requeued += 1,
        }
    }
}

/// Feeds edit responses from a message source into [`EditOrchestrator`].
pub struct EditResponseConsumer {
    orchestrator: Arc<EditOrchestrator>,
    buffer: usize,
}

impl EditResponseConsumer {
    pub fn new(orchestrator: Arc<EditOrchestrator>, buffer: usize) -> Self {
        Self {
            orchestrator,
            buffer: buffer.max(1),
        }
    }

    /// Consume until `source` is exhausted or fails.
    ///
    /// Deliveries already handed to the finalize loop are settled before this
    /// returns. A source failure is returned after that drain.
    pub async fn run<S>(self, source: S) -> Result<ConsumerReport, MessageChannelError>
    where
        S: EditResponseSource + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<ResponseDelivery>(self.buffer);
        let pump = tokio::spawn(pump(source, tx));

        let mut report = ConsumerReport::default();
        while let Some(delivery) = rx.recv().await {
            let ResponseDelivery { payload, settler } = delivery;
            let disposition = self.orchestrator.on_response(&payload).await;
            match settler.settle(disposition).await {
                Ok(()) => debug!(disposition = disposition.as_str(), "edit response settled"),
                Err(err) => warn!(
                    disposition = disposition.as_str(),
                    error = %err,
                    "failed to settle edit response; broker will redeliver"
                ),
            }
            report.record(disposition);
        }

        let outcome = match pump.await {
            Ok(outcome) => outcome,
            Err(err) => Err(MessageChannelError::unavailable(format!(
                "response pump task failed: {err}"
            ))),
        };
        info!(
            acked = report.acked,
            dropped = report.dropped,
            requeued = report.requeued,
            "edit response consumer stopped"
        );
        outcome.map(|()| report)
    }
}

async fn pump<S>(
    mut source: S,
    tx: mpsc::Sender<ResponseDelivery>,
) -> Result<(), MessageChannelError>
where
    S: EditResponseSource,
{
    loop {
        match source.next_delivery().await {
            Ok(Some(delivery)) => {
                if tx.send(delivery).await.is_err() {
                    debug!("finalize loop gone; stopping response pump");
                    return Ok(());
                }
            }
            Ok(None) => return Ok(()),
            Err(err) => {
                warn!(error = %err, "edit response source failed");
                return Err(err);
            }
        }
    }
}
