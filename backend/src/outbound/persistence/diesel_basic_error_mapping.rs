//! Diesel and pool error mapping onto [`LedgerError`].

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use crate::domain::ports::LedgerError;

use super::pool::PoolError;

pub(crate) fn map_pool_error(error: PoolError) -> LedgerError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            LedgerError::connection(message)
        }
    }
}

/// Unique violations become [`LedgerError::Conflict`] so callers can retry
/// with fresh values; dropped connections become connection errors.
pub(crate) fn map_diesel_error(error: DieselError) -> LedgerError {
    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::NotFound => LedgerError::query("record not found"),
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            LedgerError::conflict(info.constraint_name().unwrap_or("unique constraint"))
        }
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            LedgerError::connection("database connection error")
        }
        DieselError::QueryBuilderError(_) => LedgerError::query("database query error"),
        _ => LedgerError::query("database error"),
    }
}

impl From<DieselError> for LedgerError {
    fn from(error: DieselError) -> Self {
        map_diesel_error(error)
    }
}

/// Rows that no longer satisfy domain validation surface as query errors.
pub(crate) fn corrupt_row(table: &str, err: impl std::fmt::Display) -> LedgerError {
    LedgerError::query(format!("invalid {table} row: {err}"))
}

#[cfg(test)]
mod tests {
    //! Regression coverage for ledger error mapping.

    use diesel::result::DatabaseErrorInformation;
    use rstest::rstest;

    use super::*;

    struct Info(Option<&'static str>);

    impl DatabaseErrorInformation for Info {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint"
        }
        fn details(&self) -> Option<&str> {
            None
        }
        fn hint(&self) -> Option<&str> {
            None
        }
        fn table_name(&self) -> Option<&str> {
            Some("groups")
        }
        fn column_name(&self) -> Option<&str> {
            None
        }
        fn constraint_name(&self) -> Option<&str> {
            self.0
        }
        fn statement_position(&self) -> Option<i32> {
            None
        }
    }

    #[rstest]
    fn pool_errors_are_connection_errors() {
        let err = map_pool_error(PoolError::checkout("connection refused"));
        assert!(matches!(err, LedgerError::Connection { .. }));
        assert!(err.to_string().contains("connection refused"));
    }

    #[rstest]
    #[case(Some("groups_share_code_key"), "groups_share_code_key")]
    #[case(None, "unique constraint")]
    fn unique_violations_are_conflicts(
        #[case] constraint: Option<&'static str>,
        #[case] expected: &str,
    ) {
        let err = map_diesel_error(DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new(Info(constraint)),
        ));
        assert_eq!(err, LedgerError::conflict(expected));
    }

    #[rstest]
    fn closed_connections_are_connection_errors() {
        let err = map_diesel_error(DieselError::DatabaseError(
            DatabaseErrorKind::ClosedConnection,
            Box::new(Info(None)),
        ));
        assert!(matches!(err, LedgerError::Connection { .. }));
    }

    #[rstest]
    fn not_found_is_a_query_error() {
        let err = map_diesel_error(DieselError::NotFound);
        assert_eq!(err, LedgerError::query("record not found"));
    }

    #[rstest]
    fn corrupt_rows_name_their_table() {
        let err = corrupt_row("photos", "negative size");
        assert_eq!(err.to_string(), "ledger query failed: invalid photos row: negative size");
    }
}
