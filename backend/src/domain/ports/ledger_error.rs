//! Error shared by the group and photo ledger ports.

use super::define_port_error;

define_port_error! {
    /// Errors raised by ledger adapters.
    pub enum LedgerError {
        /// Ledger connection could not be established.
        Connection { message: String } => "ledger connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "ledger query failed: {message}",
        /// A uniqueness constraint rejected the write.
        Conflict { message: String } => "ledger write conflicted: {message}",
    }
}
