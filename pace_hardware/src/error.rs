use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("command `{program}` exited with status {status:?}")]
    CommandFailed {
        program: String,
        status: Option<i32>,
    },
    #[error("simulated fault injected into {operation}")]
    Injected { operation: &'static str },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
