use handoff_core::AppError;

/// Maps a `sqlx` failure to the error taxonomy.
///
/// Connectivity failures become [`AppError::StorageUnavailable`]; anything
/// else is [`AppError::Internal`].
pub(crate) fn sqlx_error(context: &str, error: sqlx::Error) -> AppError {
    match error {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => AppError::StorageUnavailable(format!("{context}: {error}")),
        other => AppError::Internal(format!("{context}: {other}")),
    }
}

/// Maps a `redis` failure to the error taxonomy.
pub(crate) fn redis_error(context: &str, error: &redis::RedisError) -> AppError {
    if error.is_io_error()
        || error.is_connection_refusal()
        || error.is_connection_dropped()
        || error.is_timeout()
    {
        return AppError::StorageUnavailable(format!("{context}: {error}"));
    }

    AppError::Internal(format!("{context}: {error}"))
}
