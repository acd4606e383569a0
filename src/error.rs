use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("Path not found: {0}")]
    NotFound(PathBuf),
    #[error("Invalid search pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("OS watch descriptor limit reached")]
    ResourceExhausted,
    #[error("Failed to start file system watcher: {0}")]
    Watch(#[source] notify::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to initialize tracing: {0}")]
    TracingInit(String),
}

impl From<notify::Error> for Error {
    fn from(err: notify::Error) -> Self {
        match &err.kind {
            notify::ErrorKind::MaxFilesWatch => Error::ResourceExhausted,
            notify::ErrorKind::PathNotFound => {
                let path = err.paths.first().cloned().unwrap_or_default();
                Error::NotFound(path)
            }
            notify::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::PermissionDenied => {
                let path = err.paths.first().cloned().unwrap_or_default();
                Error::PermissionDenied(path)
            }
            _ => Error::Watch(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
