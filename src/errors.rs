/// Domain-specific error types for the evaluation engine.
/// All external failures must be handled. The engine must:
/// - Isolate per-Task failures from the rest of the cycle
/// - Halt safely only on genuine state corruption
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("transient fetch error: {0}")]
    TransientFetch(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("empty forecast")]
    EmptyForecast,

    #[error("invalid brackets: {0}")]
    InvalidBrackets(String),

    #[error("numeric error: {0}")]
    Numeric(String),

    #[error("stale input: {0}")]
    StaleInput(String),

    #[error("config invalid: {0}")]
    ConfigInvalid(String),

    #[error("already running")]
    AlreadyRunning,

    #[error("not running")]
    NotRunning,

    #[error("cancelled")]
    Cancelled,

    #[error("io error: {0}")]
    Io(String),

    #[error("channel closed: {0}")]
    ChannelClosed(String),

    #[error("state corruption: {0}")]
    StateCorruption(String),
}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        EngineError::TransientFetch(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::InvalidResponse(e.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Io(e.to_string())
    }
}

impl From<csv::Error> for EngineError {
    fn from(e: csv::Error) -> Self {
        EngineError::Io(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
