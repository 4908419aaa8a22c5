use std::path::PathBuf;

/// Errors that abort a run. Everything else is absorbed and logged.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("application binary not found: {}", .0.display())]
    BinaryNotFound(PathBuf),

    #[error("failed to launch {}: {source}", path.display())]
    LaunchFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to prepare artifact directory {}: {source}", path.display())]
    ArtifactDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {message}", path.display())]
    Config { path: PathBuf, message: String },
}
