//! Test utilities for the photoshare crate.
//!
//! Stateful in-memory doubles for every port, plus a clock tests can move.
//! Only compiled when running tests.

use std::sync::{Mutex, MutexGuard};

pub mod clock;
pub mod ledger;
pub mod message_channel;
pub mod object_store;

pub use clock::MutableClock;
pub use ledger::InMemoryLedger;
pub use message_channel::{RecordingPublisher, ScriptedResponseSource};
pub use object_store::RecordingObjectStore;

pub(crate) fn lock<'a, T>(mutex: &'a Mutex<T>, name: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(_) => panic!("{name} mutex poisoned"),
    }
}
