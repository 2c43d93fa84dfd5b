use chrono::{DateTime, FixedOffset, NaiveDate};

/// Errors raised by the position report steps.
#[derive(Debug, thiserror::Error)]
pub enum PositionError {
    #[error("expected all power trades for {day} to have {expected} periods")]
    InvalidTrades {
        day: DateTime<FixedOffset>,
        expected: usize,
    },

    #[error("no settlement day can be derived for {0}")]
    InvalidDate(NaiveDate),

    #[error("trade service failed: {0}")]
    Service(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
