use thiserror::Error;

/// Result type alias using the structured error facility
pub type Result<T> = std::result::Result<T, ExError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable code usable for programmatic handling, log
/// filtering and test assertions. Only `Deadlock` is retryable; the
/// transaction manager retries it transparently and every other kind
/// propagates immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExErrorKind {
    /// Pool exhaustion, network failure, unreachable or unopenable database
    Connection,
    /// Serialization conflict or lock cycle aborted by the database
    Deadlock,
    /// Bad data rejected by a database constraint
    ConstraintViolation,
    /// Logical absence of a key; returned as a value, never raised for reads
    NotFound,
    /// An operation exceeded its time budget
    Timeout,
    /// Caller supplied data that fails validation before any write
    InvalidInput,
    /// A structured column could not be encoded or decoded
    Serialization,
    /// Any other storage failure
    Persistence,
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::Connection => "ERR_CONNECTION",
            ExErrorKind::Deadlock => "ERR_DEADLOCK",
            ExErrorKind::ConstraintViolation => "ERR_CONSTRAINT_VIOLATION",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::Timeout => "ERR_TIMEOUT",
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    /// Whether a failed unit of work may be re-run from scratch
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExErrorKind::Deadlock)
    }
}

/// Canonical structured error type
///
/// Carries a classification kind plus optional context for debugging:
/// the operation, the record key, the chunk a batch failure belongs to and
/// the number of attempts made before giving up.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity_id: Option<String>,
    chunk_index: Option<usize>,
    attempts: Option<u32>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity_id: None,
            chunk_index: None,
            attempts: None,
            message: String::new(),
            source: None,
        }
    }

    /// Shorthand for a `NotFound` error on a record key
    pub fn not_found(op: &str, entity_id: impl Into<String>) -> Self {
        Self::new(ExErrorKind::NotFound)
            .with_op(op)
            .with_entity_id(entity_id)
            .with_message("Record is not indexed")
    }

    /// Shorthand for an `InvalidInput` error
    pub fn invalid_input(op: &str, message: impl Into<String>) -> Self {
        Self::new(ExErrorKind::InvalidInput)
            .with_op(op)
            .with_message(message)
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add record key context
    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Add the index of the batch chunk the error belongs to
    pub fn with_chunk_index(mut self, chunk_index: usize) -> Self {
        self.chunk_index = Some(chunk_index);
        self
    }

    /// Add the number of attempts made
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn is_deadlock(&self) -> bool {
        self.kind == ExErrorKind::Deadlock
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ExErrorKind::NotFound
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    pub fn chunk_index(&self) -> Option<usize> {
        self.chunk_index
    }

    pub fn attempts(&self) -> Option<u32> {
        self.attempts
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(entity_id) = &self.entity_id {
            write!(f, " (uri: {})", entity_id)?;
        }
        if let Some(chunk_index) = self.chunk_index {
            write!(f, " (chunk: {})", chunk_index)?;
        }
        if let Some(attempts) = self.attempts {
            write!(f, " (attempts: {})", attempts)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Validation failures for indexed records
///
/// Raised before any database work, so an invalid record never produces a
/// partial write.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("Record URI is empty")]
    EmptyUri,

    #[error("Malformed record URI: {uri}")]
    MalformedUri { uri: String },

    #[error("Record {uri} has no content fingerprint")]
    MissingCid { uri: String },

    #[error("Record {uri} is missing required field '{field}'")]
    MissingField { uri: String, field: &'static str },

    #[error("Record {uri} has invalid value for '{field}': {reason}")]
    InvalidField {
        uri: String,
        field: &'static str,
        reason: String,
    },

    #[error("Unknown {field} value: {value}")]
    UnknownVariant { field: &'static str, value: String },
}

impl From<RecordError> for ExError {
    fn from(err: RecordError) -> Self {
        let message = err.to_string();
        let base = ExError::new(ExErrorKind::InvalidInput)
            .with_op("validate_record")
            .with_message(message);

        match err {
            RecordError::EmptyUri | RecordError::UnknownVariant { .. } => base,
            RecordError::MalformedUri { uri }
            | RecordError::MissingCid { uri }
            | RecordError::MissingField { uri, .. }
            | RecordError::InvalidField { uri, .. } => base.with_entity_id(uri),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_deadlock_is_retryable() {
        assert!(ExErrorKind::Deadlock.is_retryable());
        assert!(!ExErrorKind::Connection.is_retryable());
        assert!(!ExErrorKind::ConstraintViolation.is_retryable());
        assert!(!ExErrorKind::Timeout.is_retryable());
    }

    #[test]
    fn test_display_includes_context() {
        let err = ExError::new(ExErrorKind::Deadlock)
            .with_op("batch_upsert")
            .with_chunk_index(2)
            .with_attempts(3)
            .with_message("deadlock detected");

        let rendered = err.to_string();
        assert!(rendered.starts_with("[ERR_DEADLOCK]"));
        assert!(rendered.contains("batch_upsert"));
        assert!(rendered.contains("(chunk: 2)"));
        assert!(rendered.contains("(attempts: 3)"));
    }

    #[test]
    fn test_source_chain_is_exposed() {
        let cause = ExError::new(ExErrorKind::Connection).with_message("pool closed");
        let err = ExError::new(ExErrorKind::Persistence).with_source(cause);

        let source = std::error::Error::source(&err).expect("source");
        assert!(source.to_string().contains("pool closed"));
        assert_eq!(
            err.source_error().map(|e| e.kind()),
            Some(ExErrorKind::Connection)
        );
    }
}
