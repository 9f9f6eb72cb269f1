use thiserror::Error;

/// Errors surfaced at the boundaries a caller controls directly.
///
/// Nothing inside a tick cycle returns this type: a failing callback or end
/// condition is isolated and logged instead.
#[derive(Error, Debug)]
pub enum ClockError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Config error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClockError>;

pub(crate) fn ensure_positive_step(step: i64) -> Result<i64> {
    if step > 0 {
        Ok(step)
    } else {
        Err(ClockError::InvalidArgument(format!(
            "step must be positive, got {}",
            step
        )))
    }
}

pub(crate) fn ensure_non_negative(name: &str, value: i64) -> Result<i64> {
    if value >= 0 {
        Ok(value)
    } else {
        Err(ClockError::InvalidArgument(format!(
            "{} must not be negative, got {}",
            name, value
        )))
    }
}
