use std::fmt;

use lfq_dsa::StorageError;

#[derive(Debug)]
pub enum LfqError {
    /// Engine construction failed.
    Storage(StorageError),
    Config(String),
    Io(std::io::Error),
    /// The named thread could not be pinned to `core`.
    Affinity { name: String, core: usize },
    Spawn(std::io::Error),
    /// A bounded backoff gave up.
    RetriesExhausted { attempts: u64 },
    ThreadPanicked(String),
}

pub type Result<T> = std::result::Result<T, LfqError>;

impl fmt::Display for LfqError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LfqError::Storage(e) => write!(f, "engine construction failed: {}", e),
            LfqError::Config(msg) => write!(f, "invalid configuration: {}", msg),
            LfqError::Io(e) => write!(f, "i/o error: {}", e),
            LfqError::Affinity { name, core } => {
                write!(f, "failed to pin thread '{}' to core {}", name, core)
            }
            LfqError::Spawn(e) => write!(f, "failed to spawn thread: {}", e),
            LfqError::RetriesExhausted { attempts } => {
                write!(f, "gave up after {} attempts", attempts)
            }
            LfqError::ThreadPanicked(name) => write!(f, "thread '{}' panicked", name),
        }
    }
}

impl std::error::Error for LfqError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LfqError::Storage(e) => Some(e),
            LfqError::Io(e) | LfqError::Spawn(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for LfqError {
    fn from(e: StorageError) -> Self {
        LfqError::Storage(e)
    }
}

impl From<std::io::Error> for LfqError {
    fn from(e: std::io::Error) -> Self {
        LfqError::Io(e)
    }
}

impl From<toml::de::Error> for LfqError {
    fn from(e: toml::de::Error) -> Self {
        LfqError::Config(e.to_string())
    }
}
