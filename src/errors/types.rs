use thiserror::Error;

#[derive(Debug, Error)]
pub enum FuzzError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Harness error: {0}")]
    Harness(String),

    #[error("Harness output error: {0}")]
    HarnessOutput(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Pattern error: {0}")]
    Pattern(String),

    #[error("Scanner error: {0}")]
    Scanner(String),

    #[error("Route error: {0}")]
    Route(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FuzzError {
    /// Process exit code used by the binary when a command fails with this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            FuzzError::Config(_) | FuzzError::Yaml(_) => 2,
            FuzzError::Harness(_) | FuzzError::HarnessOutput(_) | FuzzError::Timeout(_) => 3,
            FuzzError::Database(_) => 4,
            _ => 1,
        }
    }
}

impl From<rusqlite::Error> for FuzzError {
    fn from(e: rusqlite::Error) -> Self {
        FuzzError::Database(e.to_string())
    }
}

impl From<regex::Error> for FuzzError {
    fn from(e: regex::Error) -> Self {
        FuzzError::Pattern(e.to_string())
    }
}
