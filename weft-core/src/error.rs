/// Weft-specific error type with actionable variants.
#[derive(Debug)]
pub enum WeftError {
    /// Underlying sqlx error (prepare, execute, fetch or decode).
    Sqlx(sqlx::Error),
    /// The clause model could not be rendered (e.g. `IN` given a scalar).
    Compile(String),
    /// `insert_batch` was called with no rows.
    EmptyBatch,
    /// An insert or update had no present field to write.
    NothingToWrite,
    /// A bulk write without a WHERE clause was refused.
    UnsafeOperation(&'static str),
}

impl std::fmt::Display for WeftError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlx(err) => write!(f, "sqlx error: {}", err),
            Self::Compile(message) => write!(f, "cannot compile query: {}", message),
            Self::EmptyBatch => write!(f, "batch insert requires at least one row"),
            Self::NothingToWrite => write!(f, "no present field to write"),
            Self::UnsafeOperation(operation) => {
                write!(f, "refusing {} without filters", operation)
            }
        }
    }
}

impl std::error::Error for WeftError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Sqlx(err) => Some(err),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for WeftError {
    fn from(err: sqlx::Error) -> Self {
        Self::Sqlx(err)
    }
}

impl WeftError {
    pub(crate) fn compile(message: impl Into<String>) -> Self {
        Self::Compile(message.into())
    }
}

/// Result alias for Weft operations.
pub type WeftResult<T> = Result<T, WeftError>;
