use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RadishError {
    #[error("no radish descriptor found")]
    DescriptorNotFound,
    #[error("descriptor {} is not accessible: {source}", .path.display())]
    DescriptorInaccessible {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unsupported JAVA_VERSION_MAJOR: {0}")]
    UnsupportedJavaVersion(String),
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
