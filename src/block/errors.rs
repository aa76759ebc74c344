//! Block error types
//!
//! Error codes:
//! - SF_INVALID_BLOCK_NAME (FATAL)
//! - SF_DUPLICATE_BLOCK_NAME (FATAL)
//! - SF_BLOCK_NAME_CONFLICT (FATAL)
//! - SF_UNKNOWN_DEFAULT_KEY (FATAL)
//! - SF_MALFORMED_DECLARATION (FATAL)
//! - SF_VALIDATION_FAILED (REJECT)
//! - SF_REDISPLAY_CONTRACT (FATAL)
//!
//! Construction errors are raised while a block tree is assembled, never while
//! values flow through it. Validation errors are data problems. Contract
//! violations are caller misuse and must not be downgraded.

use indexmap::IndexMap;
use std::fmt;

/// Severity levels for block errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Submitted value rejected, the caller may redisplay and retry
    Reject,
    /// Programming or definition error
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Error codes for block construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockErrorCode {
    /// Child name is not a valid identifier
    SfInvalidBlockName,
    /// The same name was supplied twice as a local addition
    SfDuplicateBlockName,
    /// Block instance already carries a different name
    SfBlockNameConflict,
    /// Default mapping names a child that does not exist
    SfUnknownDefaultKey,
    /// Declaration document could not be turned into a block
    SfMalformedDeclaration,
}

impl BlockErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            BlockErrorCode::SfInvalidBlockName => "SF_INVALID_BLOCK_NAME",
            BlockErrorCode::SfDuplicateBlockName => "SF_DUPLICATE_BLOCK_NAME",
            BlockErrorCode::SfBlockNameConflict => "SF_BLOCK_NAME_CONFLICT",
            BlockErrorCode::SfUnknownDefaultKey => "SF_UNKNOWN_DEFAULT_KEY",
            BlockErrorCode::SfMalformedDeclaration => "SF_MALFORMED_DECLARATION",
        }
    }

    /// Construction errors are always fatal
    pub fn severity(&self) -> Severity {
        Severity::Fatal
    }
}

impl fmt::Display for BlockErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Block construction error with full context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockError {
    code: BlockErrorCode,
    message: String,
    block_name: Option<String>,
}

impl BlockError {
    /// Create an invalid identifier error
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            code: BlockErrorCode::SfInvalidBlockName,
            message: format!("Block name '{}' is invalid: {}", name, reason.into()),
            block_name: Some(name),
        }
    }

    /// Create a duplicate addition error
    pub fn duplicate_name(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            code: BlockErrorCode::SfDuplicateBlockName,
            message: format!("Block name '{}' supplied more than once", name),
            block_name: Some(name),
        }
    }

    /// Create a set-once name conflict error
    pub fn name_conflict(existing: impl Into<String>, requested: impl Into<String>) -> Self {
        let existing = existing.into();
        Self {
            code: BlockErrorCode::SfBlockNameConflict,
            message: format!(
                "Block already named '{}' cannot be renamed to '{}'",
                existing,
                requested.into()
            ),
            block_name: Some(existing),
        }
    }

    /// Create an unknown default key error
    pub fn unknown_default_key(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            code: BlockErrorCode::SfUnknownDefaultKey,
            message: format!("Default value names unknown child block '{}'", name),
            block_name: Some(name),
        }
    }

    /// Create an error for a malformed declaration document
    pub fn malformed_declaration(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            code: BlockErrorCode::SfMalformedDeclaration,
            message: format!("Malformed block declaration '{}': {}", path.into(), reason.into()),
            block_name: None,
        }
    }

    /// Returns the error code
    pub fn code(&self) -> BlockErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the offending block name if applicable
    pub fn block_name(&self) -> Option<&str> {
        self.block_name.as_deref()
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for BlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code.severity(), self.code.code(), self.message)
    }
}

impl std::error::Error for BlockError {}

/// Result type for block construction
pub type BlockResult<T> = Result<T, BlockError>;

/// Errors attached to one child. A list so a child may surface several.
pub type ErrorList = Vec<ValidationError>;

/// Structured payload of an aggregate error, keyed by child name in registry order
pub type ErrorParams = IndexMap<String, ErrorList>;

/// Validation failure raised by `Block::clean`
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Raised by a single (leaf) block
    Child {
        message: String,
        /// Machine-readable reason, e.g. "required", "max_length"
        code: &'static str,
    },
    /// Raised by a struct block; one entry per failing child
    Aggregate { message: String, params: ErrorParams },
}

impl ValidationError {
    /// Create a per-child error with the generic "invalid" code
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_code(message, "invalid")
    }

    pub fn with_code(message: impl Into<String>, code: &'static str) -> Self {
        ValidationError::Child {
            message: message.into(),
            code,
        }
    }

    /// "This field is required."
    pub fn required() -> Self {
        Self::with_code("This field is required.", "required")
    }

    /// Create the aggregate error for a struct block.
    ///
    /// The message is fixed; presentation layers read `params()` instead.
    pub fn aggregate(params: ErrorParams) -> Self {
        ValidationError::Aggregate {
            message: "Validation error in StructBlock".into(),
            params,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ValidationError::Child { message, .. } => message,
            ValidationError::Aggregate { message, .. } => message,
        }
    }

    /// Machine-readable code; aggregates report "aggregate"
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::Child { code, .. } => code,
            ValidationError::Aggregate { .. } => "aggregate",
        }
    }

    /// Returns the per-child payload if this is an aggregate error
    pub fn params(&self) -> Option<&ErrorParams> {
        match self {
            ValidationError::Aggregate { params, .. } => Some(params),
            ValidationError::Child { .. } => None,
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, ValidationError::Aggregate { .. })
    }

    pub fn severity(&self) -> Severity {
        Severity::Reject
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Child { message, code } => {
                write!(f, "[{}] SF_VALIDATION_FAILED ({}): {}", self.severity(), code, message)
            }
            ValidationError::Aggregate { message, params } => {
                write!(f, "[{}] SF_VALIDATION_FAILED: {}", self.severity(), message)?;
                let names: Vec<&str> = params.keys().map(String::as_str).collect();
                write!(f, " [children: {}]", names.join(", "))
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Result type for validation
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Fatal misuse of the redisplay path.
///
/// A struct block expects exactly one aggregate error per `clean()` call when
/// redistributing errors to its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractViolation {
    message: String,
    received: usize,
}

impl ContractViolation {
    pub fn multiple_errors(received: usize) -> Self {
        Self {
            message: format!(
                "StructBlock form context unexpectedly received {} errors, expected one aggregate",
                received
            ),
            received,
        }
    }

    pub fn not_aggregate(message: impl Into<String>) -> Self {
        Self {
            message: format!(
                "StructBlock form context received a non-aggregate error: {}",
                message.into()
            ),
            received: 1,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Number of errors presented to the redisplay path
    pub fn received(&self) -> usize {
        self.received
    }

    pub fn severity(&self) -> Severity {
        Severity::Fatal
    }
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] SF_REDISPLAY_CONTRACT: {}", self.severity(), self.message)
    }
}

impl std::error::Error for ContractViolation {}
