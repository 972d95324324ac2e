//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod group_ledger;
mod ledger_error;
mod message_channel;
mod object_store;
mod photo_ledger;

#[cfg(test)]
pub use group_ledger::MockGroupLedger;
pub use group_ledger::GroupLedger;
pub use ledger_error::LedgerError;
#[cfg(test)]
pub use message_channel::{MockEditRequestPublisher, MockEditResponseSource};
pub use message_channel::{
    DeliverySettler, Disposition, EditRequestPublisher, EditResponseSource, MessageChannelError,
    ResponseDelivery,
};
#[cfg(test)]
pub use object_store::MockObjectStore;
pub use object_store::{ObjectStore, ObjectStoreError};
#[cfg(test)]
pub use photo_ledger::MockPhotoLedger;
pub use photo_ledger::{EditLookup, PhotoLedger, PhotoUsage};
