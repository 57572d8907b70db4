/// Error types shared by the build and serve binaries.
///
/// Parsing and rendering never fail; these cover snapshot persistence only.
/// Binary crates define their own `AppError` and wrap `CommonError` via `#[from]`.
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CommonError {
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to replace {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
