//! Error handling for testlog ingestion.
//!
//! Only hard failures are represented here. Recoverable input defects (bad
//! durations) and duplicate test names are handled in place and reported as
//! diagnostics, never as errors. Any `IngestError` out of `save` means the
//! whole batch was rolled back and may be retried as a unit.

use std::fmt;

/// Error category for testlog errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Transport decoding of an artifact payload failed.
    Decode,
    /// The persistence layer failed or a transaction could not commit.
    Storage,
    /// The content store could not write or read a payload.
    ContentStore,
    Config,
    Validation,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Decode => write!(f, "decode"),
            ErrorCategory::Storage => write!(f, "storage"),
            ErrorCategory::ContentStore => write!(f, "content_store"),
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::Unknown => write!(f, "unknown"),
        }
    }
}

type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Ingestion error with category and context
#[derive(Debug)]
pub struct IngestError {
    message: String,
    category: ErrorCategory,
    source: Option<BoxedSource>,
    context: Vec<(String, String)>,
}

impl IngestError {
    pub fn new(message: impl Into<String>, category: ErrorCategory) -> Self {
        Self {
            message: message.into(),
            category,
            source: None,
            context: Vec::new(),
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        category: ErrorCategory,
        source: impl Into<BoxedSource>,
    ) -> Self {
        Self {
            message: message.into(),
            category,
            source: Some(source.into()),
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.push((key.into(), value.into()));
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    pub fn context(&self) -> &[(String, String)] {
        &self.context
    }

    pub fn is_storage_error(&self) -> bool {
        self.category == ErrorCategory::Storage
    }

    pub fn is_decode_error(&self) -> bool {
        self.category == ErrorCategory::Decode
    }
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)?;

        if !self.context.is_empty() {
            write!(f, " (")?;
            for (i, (key, value)) in self.context.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}={}", key, value)?;
            }
            write!(f, ")")?;
        }

        if let Some(source) = &self.source {
            write!(f, "\nCaused by: {}", source)?;
        }

        Ok(())
    }
}

impl std::error::Error for IngestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Result type alias for testlog errors
pub type Result<T> = std::result::Result<T, IngestError>;

/// Extension for tagging adapter (`anyhow`) failures with a category.
pub trait ResultExt<T> {
    fn categorize(self, category: ErrorCategory, message: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for anyhow::Result<T> {
    fn categorize(self, category: ErrorCategory, message: impl Into<String>) -> Result<T> {
        self.map_err(|err| IngestError::with_source(message, category, err))
    }
}

pub fn storage_error(message: impl Into<String>) -> IngestError {
    IngestError::new(message, ErrorCategory::Storage)
}

pub fn decode_error(message: impl Into<String>) -> IngestError {
    IngestError::new(message, ErrorCategory::Decode)
}

pub fn validation_error(message: impl Into<String>) -> IngestError {
    IngestError::new(message, ErrorCategory::Validation)
}

pub fn config_error(message: impl Into<String>) -> IngestError {
    IngestError::new(message, ErrorCategory::Config)
}

/// Convert anyhow errors to testlog errors
impl From<anyhow::Error> for IngestError {
    fn from(err: anyhow::Error) -> Self {
        IngestError::with_source(err.to_string(), ErrorCategory::Unknown, err)
    }
}
