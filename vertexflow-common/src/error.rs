use thiserror::Error;

pub type VertexFlowResult<T> = Result<T, VertexFlowError>;

#[derive(Debug, Error)]
pub enum VertexFlowError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Raised by a vertex computation; the engine turns it into an aborted job.
    #[error("compute error: {0}")]
    Compute(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl VertexFlowError {
    pub fn compute(msg: impl Into<String>) -> Self {
        Self::Compute(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}
