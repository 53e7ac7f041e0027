/// Errors from clock management operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClockError {
    #[error("reference clock already registered: {0}")]
    AlreadyRegistered(String),

    #[error("unknown reference clock: {0}")]
    UnknownClock(String),
}
