use thiserror::Error;

/// Failure classes for the attendance pipeline.
///
/// Store reads/writes surface as `Fetch` or `NotFound`, malformed input is
/// rejected as `Validation` before it reaches aggregation, and export
/// generation failures come back as `Render`. None of these are fatal to a
/// running session; the CLI reports them and moves on.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to reach the attendance store: {0}")]
    Fetch(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("report generation failed: {0}")]
    Render(String),
}

impl Error {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn render(message: impl Into<String>) -> Self {
        Error::Render(message.into())
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::not_found("record", "<queried>"),
            other => Error::Fetch(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
