use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("{0} is not inside a git work tree; --mine and --uncommitted need version control")]
    NotARepository(PathBuf),

    #[error("author filtering requested but no identity is configured (set --author or git user.email)")]
    MissingIdentity,

    #[error("unknown console method `{0}`")]
    UnknownMethod(String),

    #[error("failed reading {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed writing {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type SweepResult<T> = std::result::Result<T, SweepError>;
