use std::path::PathBuf;

/// Errors raised while turning a user command into a relayed invocation.
///
/// Every variant is fatal to the command: the relayed process is never started.
#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("flag {flag} requires a value")]
    MissingValue { flag: String },

    #[error("malformed mount specification {spec:?}: {reason}")]
    MalformedMount { spec: String, reason: String },

    #[error("malformed address {0:?}: no host component")]
    MalformedAddress(String),

    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("repairing permissions of {}: {source}", path.display())]
    MountRepair {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, TranslateError>;
