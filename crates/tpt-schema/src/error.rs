use thiserror::Error;

/// The closed set of error kinds TPT can surface, one variant per row of the
/// error-handling table. Every fallible operation in `tpt-core` returns
/// `Result<T, Error>`; binaries convert to `anyhow::Error` at the edge.
#[derive(Error, Debug)]
pub enum Error {
    #[error("package not found: {0}")]
    PackageNotFound(String),

    #[error("'{package_name}' was found in multiple sources: {}", choices.join(", "))]
    MultipleSourcesFound {
        package_name: String,
        choices: Vec<String>,
    },

    #[error("'{package_name}' was not found; clone '{repo_url}' instead?")]
    ConfirmGitClone {
        package_name: String,
        repo_url: String,
    },

    #[error("unsupported package format: {0}")]
    UnsupportedFormat(String),

    #[error("checksum verification failed for {file}: expected {expected}, got {actual}")]
    VerificationFailed {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("download failed: {0}")]
    Download(String),

    #[error("system command '{command}' failed:\n{stderr}")]
    SystemCommand { command: String, stderr: String },

    #[error("required external tool not found: {0}")]
    MissingDependency(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("the user cancelled the operation")]
    UserCancelled,

    #[error("critical: {0}")]
    Critical(String),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
