use std::time::Duration;

#[derive(Debug)]
pub enum ApplicationError {
    NotFound,
    BadRequest(String),
    Validation(String),
    Unauthorized,
    InvalidToken,
    TooManyRequests { retry_after: Duration },
    Conflict,
    Timeout,
    InternalError(String),
    DatabaseError(String),
    CacheError(String),
    CorruptData(String),
}
