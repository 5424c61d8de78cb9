use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskqError {
    /// A 0-based priority level outside `[0, max]` was addressed.
    #[error("priority level {level} out of range [0, {max}]")]
    OutOfRange { level: i64, max: usize },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TaskqError>;
