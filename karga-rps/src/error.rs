use thiserror::Error;

/// Errors that abort a load test before the first request is scheduled.
///
/// Failures of individual requests never surface here, they are counted
/// as [`Outcome::Failure`](crate::Outcome::Failure) instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to build http transport: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("requests per second must be a finite number greater than zero, got {0}")]
    InvalidRate(f64),

    #[error("test duration must be at least one second")]
    ZeroDuration,

    #[error("request timeout must be greater than zero")]
    ZeroRequestTimeout,

    #[error("invalid target url {url:?}: {reason}")]
    InvalidTarget { url: String, reason: String },

    #[error("unsupported target scheme {0:?}, expected http or https")]
    UnsupportedScheme(String),

    #[error("invalid http method {0:?}")]
    InvalidMethod(String),

    #[error("invalid request header {0:?}, expected `Name: value`")]
    InvalidHeader(String),
}

/// The pacer's wait was cancelled before a permit became available.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("scheduling interrupted while waiting for a permit")]
pub struct Interrupted;

pub type Result<T> = std::result::Result<T, Error>;
