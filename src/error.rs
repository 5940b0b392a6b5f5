use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
    #[error("detector unavailable: {0}")]
    DetectorUnavailable(String),
    #[error("detector error: {0}")]
    Detector(String),
    #[error("invalid strategy configuration: {0}")]
    InvalidStrategy(String),
    #[error("strategy returned {actual} verdicts for {expected} slots")]
    VerdictCount { expected: usize, actual: usize },
    #[error("state lock poisoned")]
    StateLock,
}
