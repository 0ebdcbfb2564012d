use closeout_store::StoreError;

/// Stage of a request at which an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Workspace allocation
    Allocate,
    /// Upload of a submitted file
    Upload,
    /// Report composition
    Compose,
    /// Upload of the composed report
    Publish,
    /// Share-link resolution
    Share,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allocate => "allocate",
            Self::Upload => "upload",
            Self::Compose => "compose",
            Self::Publish => "publish",
            Self::Share => "share",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FormsError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no free workspace slot for {base} after {attempts} attempts")]
    AllocationExhausted { base: String, attempts: u32 },

    #[error("{path} is occupied by a file, not a workspace folder")]
    WorkspaceOccupied { path: String },

    #[error("authentication failed during {stage}: {message}")]
    Auth { stage: Stage, message: String },

    #[error("no shared link available for {path}: {reason}")]
    LinkUnavailable { path: String, reason: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{stage} failed: {source}")]
    Store {
        stage: Stage,
        #[source]
        source: StoreError,
    },
}

impl FormsError {
    /// Wraps a store error that could not be recovered at `stage`.
    ///
    /// Authentication failures keep their own variant so they propagate unchanged.
    pub fn from_store(stage: Stage, error: StoreError) -> Self {
        match error {
            StoreError::Auth(message) => Self::Auth { stage, message },
            source => Self::Store { stage, source },
        }
    }

    /// The stage at which the error occurred, if it belongs to one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::InvalidInput(_) => None,
            Self::AllocationExhausted { .. } | Self::WorkspaceOccupied { .. } => {
                Some(Stage::Allocate)
            }
            Self::Auth { stage, .. } | Self::Store { stage, .. } => Some(*stage),
            Self::LinkUnavailable { .. } => Some(Stage::Share),
            Self::Configuration(_) => Some(Stage::Compose),
        }
    }
}

pub type FormsResult<T> = std::result::Result<T, FormsError>;
