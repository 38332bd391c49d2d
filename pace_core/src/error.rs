use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PaceError {
    #[error("{what} out of range: {value} (allowed {min}..={max})")]
    OutOfRange {
        what: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("batched command addresses {got} channels; the head has {max}")]
    ChannelCount { got: usize, max: usize },
    #[error("positions and volumes disagree at channel {channel}")]
    MisalignedChannels { channel: usize },
    #[error("{component} failed during {operation}: {detail}")]
    Hardware {
        component: &'static str,
        operation: &'static str,
        detail: String,
    },
    #[error("reader plate pool exhausted after {rounds} service rounds")]
    ReaderPoolExhausted { rounds: usize },
    #[error("reader returned no data for protocol {protocol}")]
    MissingReading { protocol: String },
    #[error("background task `{task}` panicked: {message}")]
    TaskPanicked { task: String, message: String },
    #[error("lock poisoned: {0}")]
    Poisoned(&'static str),
    #[error("configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("missing liquid handler")]
    MissingRobot,
    #[error("missing plate reader")]
    MissingReader,
    #[error("missing pumps")]
    MissingPumps,
    #[error("missing shaker")]
    MissingShaker,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
