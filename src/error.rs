use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("{}:{line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: u64,
        message: String,
    },
    #[error("corrupt graph file {} at offset {offset}: {message}", path.display())]
    CorruptFile {
        path: PathBuf,
        offset: u64,
        message: String,
    },
    #[error("graph integrity check failed: {0} violations")]
    Integrity(usize),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl EngineError {
    pub fn parse(path: impl Into<PathBuf>, line: u64, message: impl Into<String>) -> Self {
        EngineError::Parse {
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}
