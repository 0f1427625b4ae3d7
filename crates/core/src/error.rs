use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no drawing surface registered with id `{0}`")]
    SurfaceNotFound(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("git: {0}")]
    Git(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
