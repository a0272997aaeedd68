use salon_loyalty_core::LedgerError;

/// SQLSTATE codes that are worth retrying: serialization failure, deadlock,
/// admin shutdown, crash shutdown, cannot connect now.
const TRANSIENT_SQLSTATES: &[&str] = &["40001", "40P01", "57P01", "57P02", "57P03"];

/// Classify a `sqlx` error as transient (retryable) or permanent.
#[must_use]
pub fn map_sqlx_error(err: sqlx::Error) -> LedgerError {
    let transient = match &err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db) => db
            .code()
            .is_some_and(|code| TRANSIENT_SQLSTATES.iter().any(|known| *known == code)),
        _ => false,
    };

    if transient {
        tracing::warn!(error = %err, "Transient database error");
        LedgerError::TransientStoreFailure(err.to_string())
    } else {
        LedgerError::Storage(err.to_string())
    }
}
