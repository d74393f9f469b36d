//! # Error Handling for Tile Pyramid Generation
//!
//! This module provides the error type shared by every stage of the tile
//! pipeline, from source loading through slicing, descriptor writing, the
//! on-disk store and the generation queue.
//!
//! ## Architecture
//!
//! - **Error Types**: one enum, [`TileError`], whose variants follow the
//!   pipeline's failure taxonomy (source, render, output, batch, concurrency)
//! - **Error Context**: [`ErrorContext`] carries a timestamp, the operation
//!   being performed, free-form context, severity and key/value metadata
//! - **Error Traits**: [`Retryable`] tells callers (the queue, the CLI)
//!   whether trying again can help
//!
//! ## Failure Scope
//!
//! Every variant except `Config` is scoped to a single floor. A batch never
//! aborts because of one of them: the orchestrator records it against the
//! floor and moves on.
//!
//! ## Usage
//!
//! ```rust
//! use floorplan_tiles::error::{TileError, Retryable};
//!
//! let error = TileError::output_write("floor-3/floor-3_files/0/0_0.png", "disk full")
//!     .with_operation("slice level 0")
//!     .with_metadata("floor_id", "3");
//!
//! assert_eq!(error.category(), "output_write");
//! assert!(error.is_retryable());
//! ```

use std::{error::Error as StdError, fmt, path::Path, time::SystemTime};

use tile_scale::cpu::ScaleError;

/// Severity levels for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, e.g. a skipped floor
    Info,
    /// Warnings that may indicate potential issues
    Warning,
    /// Errors that fail one floor
    Error,
    /// Errors that make the whole run pointless (bad configuration)
    Fatal,
}

/// Core error context containing metadata about when and where an error occurred
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// When the error occurred
    pub timestamp: SystemTime,
    /// The operation being performed when the error occurred
    pub operation: Option<String>,
    /// Additional context about the error
    pub context: Option<String>,
    /// Error severity level
    pub severity: ErrorSeverity,
    /// Additional metadata as key-value pairs
    pub metadata: std::collections::HashMap<String, String>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            timestamp: SystemTime::now(),
            operation: None,
            context: None,
            severity: ErrorSeverity::Error,
            metadata: std::collections::HashMap::new(),
        }
    }
}

impl ErrorContext {
    /// Create a new error context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context with a given severity
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }
}

/// Base error type for the tile pyramid engine
#[derive(Debug)]
pub enum TileError {
    /// Source file does not exist
    SourceNotFound { path: String, context: ErrorContext },
    /// Source exists but cannot be decoded (corrupt, unsupported format or page)
    SourceUnreadable {
        path: String,
        reason: String,
        context: ErrorContext,
    },
    /// Rasterizing a document page failed
    RenderFailure {
        path: String,
        reason: String,
        context: ErrorContext,
    },
    /// Resampling a pyramid level failed
    Resampling {
        level: u32,
        source: ScaleError,
        context: ErrorContext,
    },
    /// Writing a tile, descriptor or directory failed (disk full, permissions)
    OutputWriteFailure {
        path: String,
        reason: String,
        context: ErrorContext,
    },
    /// Generated tree did not validate before commit
    IncompletePyramid {
        expected_tiles: u64,
        found_tiles: u64,
        context: ErrorContext,
    },
    /// One or more floors of a batch failed
    PartialGenerationFailure {
        failed_floors: Vec<u32>,
        total_floors: usize,
        context: ErrorContext,
    },
    /// A generation for the same floor is already running
    ConcurrentGenerationConflict { floor_id: u32, context: ErrorContext },
    /// Malformed or out-of-range configuration
    Config {
        field: String,
        value: String,
        reason: String,
        context: ErrorContext,
    },
    /// Descriptor file exists but cannot be parsed
    InvalidDescriptor {
        path: String,
        reason: String,
        context: ErrorContext,
    },
    /// Requested tile path is absolute, contains `..` or escapes the floor directory
    InvalidTilePath {
        floor_id: u32,
        requested: String,
        context: ErrorContext,
    },
    /// Requested tile file does not exist
    TileNotFound {
        floor_id: u32,
        requested: String,
        context: ErrorContext,
    },
    /// I/O errors not covered by a more specific variant
    Io {
        operation: String,
        path: String,
        source: std::io::Error,
        context: ErrorContext,
    },
}

impl TileError {
    /// Create a source-not-found error
    pub fn source_not_found(path: impl AsRef<Path>) -> Self {
        Self::SourceNotFound {
            path: path.as_ref().display().to_string(),
            context: ErrorContext::new().with_severity(ErrorSeverity::Warning),
        }
    }

    /// Create a source-unreadable error
    pub fn source_unreadable(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::SourceUnreadable {
            path: path.as_ref().display().to_string(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a render failure
    pub fn render_failure(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::RenderFailure {
            path: path.as_ref().display().to_string(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a resampling error for `level`
    pub fn resampling(level: u32, source: ScaleError) -> Self {
        Self::Resampling {
            level,
            source,
            context: ErrorContext::new(),
        }
    }

    /// Create an output write failure
    pub fn output_write(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::OutputWriteFailure {
            path: path.as_ref().display().to_string(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create an incomplete-pyramid error
    pub fn incomplete_pyramid(expected_tiles: u64, found_tiles: u64) -> Self {
        Self::IncompletePyramid {
            expected_tiles,
            found_tiles,
            context: ErrorContext::new(),
        }
    }

    /// Create a partial batch failure
    pub fn partial_generation(failed_floors: Vec<u32>, total_floors: usize) -> Self {
        Self::PartialGenerationFailure {
            failed_floors,
            total_floors,
            context: ErrorContext::new().with_severity(ErrorSeverity::Warning),
        }
    }

    /// Create a concurrent generation conflict
    pub fn concurrent_generation(floor_id: u32) -> Self {
        Self::ConcurrentGenerationConflict {
            floor_id,
            context: ErrorContext::new().with_severity(ErrorSeverity::Warning),
        }
    }

    /// Create a configuration error
    pub fn config(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Config {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
            context: ErrorContext::new().with_severity(ErrorSeverity::Fatal),
        }
    }

    /// Create an invalid-descriptor error
    pub fn invalid_descriptor(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            path: path.as_ref().display().to_string(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create an invalid tile path error
    pub fn invalid_tile_path(floor_id: u32, requested: impl Into<String>) -> Self {
        Self::InvalidTilePath {
            floor_id,
            requested: requested.into(),
            context: ErrorContext::new().with_severity(ErrorSeverity::Warning),
        }
    }

    /// Create a tile-not-found error
    pub fn tile_not_found(floor_id: u32, requested: impl Into<String>) -> Self {
        Self::TileNotFound {
            floor_id,
            requested: requested.into(),
            context: ErrorContext::new().with_severity(ErrorSeverity::Info),
        }
    }

    /// Create an I/O error tied to a path
    pub fn io_at(operation: impl Into<String>, path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: path.as_ref().display().to_string(),
            source,
            context: ErrorContext::new(),
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context_mut().context = Some(context.into());
        self
    }

    /// Add operation context
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.context_mut().operation = Some(operation.into());
        self
    }

    /// Set severity
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.context_mut().severity = severity;
        self
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context_mut().metadata.insert(key.into(), value.into());
        self
    }

    /// Get the error context
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::SourceNotFound { context, .. } => context,
            Self::SourceUnreadable { context, .. } => context,
            Self::RenderFailure { context, .. } => context,
            Self::Resampling { context, .. } => context,
            Self::OutputWriteFailure { context, .. } => context,
            Self::IncompletePyramid { context, .. } => context,
            Self::PartialGenerationFailure { context, .. } => context,
            Self::ConcurrentGenerationConflict { context, .. } => context,
            Self::Config { context, .. } => context,
            Self::InvalidDescriptor { context, .. } => context,
            Self::InvalidTilePath { context, .. } => context,
            Self::TileNotFound { context, .. } => context,
            Self::Io { context, .. } => context,
        }
    }

    /// Get mutable reference to error context
    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Self::SourceNotFound { context, .. } => context,
            Self::SourceUnreadable { context, .. } => context,
            Self::RenderFailure { context, .. } => context,
            Self::Resampling { context, .. } => context,
            Self::OutputWriteFailure { context, .. } => context,
            Self::IncompletePyramid { context, .. } => context,
            Self::PartialGenerationFailure { context, .. } => context,
            Self::ConcurrentGenerationConflict { context, .. } => context,
            Self::Config { context, .. } => context,
            Self::InvalidDescriptor { context, .. } => context,
            Self::InvalidTilePath { context, .. } => context,
            Self::TileNotFound { context, .. } => context,
            Self::Io { context, .. } => context,
        }
    }

    /// Get the error category as a string
    pub fn category(&self) -> &'static str {
        match self {
            Self::SourceNotFound { .. } => "source_not_found",
            Self::SourceUnreadable { .. } => "source_unreadable",
            Self::RenderFailure { .. } => "render_failure",
            Self::Resampling { .. } => "resampling",
            Self::OutputWriteFailure { .. } => "output_write",
            Self::IncompletePyramid { .. } => "incomplete_pyramid",
            Self::PartialGenerationFailure { .. } => "partial_generation",
            Self::ConcurrentGenerationConflict { .. } => "concurrent_generation",
            Self::Config { .. } => "config",
            Self::InvalidDescriptor { .. } => "invalid_descriptor",
            Self::InvalidTilePath { .. } => "invalid_tile_path",
            Self::TileNotFound { .. } => "tile_not_found",
            Self::Io { .. } => "io",
        }
    }

    /// Severity recorded in the context
    pub fn severity(&self) -> ErrorSeverity {
        self.context().severity
    }
}

impl fmt::Display for TileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TileError::SourceNotFound { path, .. } => {
                write!(f, "Source file not found: {}", path)
            }
            TileError::SourceUnreadable { path, reason, .. } => {
                write!(f, "Cannot read source '{}': {}", path, reason)
            }
            TileError::RenderFailure { path, reason, .. } => {
                write!(f, "Failed to render '{}': {}", path, reason)
            }
            TileError::Resampling { level, source, .. } => {
                write!(f, "Resampling level {} failed: {}", level, source)
            }
            TileError::OutputWriteFailure { path, reason, .. } => {
                write!(f, "Failed to write '{}': {}", path, reason)
            }
            TileError::IncompletePyramid {
                expected_tiles,
                found_tiles,
                ..
            } => {
                write!(
                    f,
                    "Pyramid incomplete: expected {} tiles, found {}",
                    expected_tiles, found_tiles
                )
            }
            TileError::PartialGenerationFailure {
                failed_floors,
                total_floors,
                ..
            } => {
                write!(
                    f,
                    "{} of {} floors failed: {:?}",
                    failed_floors.len(),
                    total_floors,
                    failed_floors
                )
            }
            TileError::ConcurrentGenerationConflict { floor_id, .. } => {
                write!(f, "Tile generation already in progress for floor {}", floor_id)
            }
            TileError::Config {
                field,
                value,
                reason,
                ..
            } => {
                write!(
                    f,
                    "Configuration error in '{}': {} (value: {})",
                    field, reason, value
                )
            }
            TileError::InvalidDescriptor { path, reason, .. } => {
                write!(f, "Invalid descriptor '{}': {}", path, reason)
            }
            TileError::InvalidTilePath {
                floor_id, requested, ..
            } => {
                write!(f, "Invalid tile path for floor {}: {}", floor_id, requested)
            }
            TileError::TileNotFound {
                floor_id, requested, ..
            } => {
                write!(f, "Tile file not found for floor {}: {}", floor_id, requested)
            }
            TileError::Io {
                operation,
                path,
                source,
                ..
            } => {
                write!(
                    f,
                    "I/O error during {} on '{}': {}",
                    operation, path, source
                )
            }
        }
    }
}

impl StdError for TileError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Resampling { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type alias using our custom error type
pub type TileResult<T> = Result<T, TileError>;

/// Trait for errors that can be retried
pub trait Retryable {
    /// Check if this error can be retried
    fn is_retryable(&self) -> bool;

    /// Get the recommended retry delay in milliseconds
    fn retry_delay_ms(&self) -> Option<u64> {
        None
    }
}

impl Retryable for TileError {
    fn is_retryable(&self) -> bool {
        matches!(
                self,
                Self::OutputWriteFailure { .. }
                    | Self::ConcurrentGenerationConflict { .. }
                    | Self::IncompletePyramid { .. }
                    | Self::Io { .. }
            )
    }

    fn retry_delay_ms(&self) -> Option<u64> {
        match self {
            Self::ConcurrentGenerationConflict { .. } => Some(5000),
            Self::OutputWriteFailure { .. } => Some(1000),
            Self::Io { .. } => Some(100),
            _ => None,
        }
    }
}

/// Error classification utilities
pub mod classify {
    use super::*;

    /// Errors caused by the source file itself; retrying with the same input will not help
    pub fn is_source_problem(error: &TileError) -> bool {
        matches!(
            error,
            TileError::SourceNotFound { .. }
                | TileError::SourceUnreadable { .. }
                | TileError::RenderFailure { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = TileError::config("tile_size", "0", "must be greater than 0");
        assert_eq!(error.category(), "config");
        assert!(!error.is_retryable());
        assert!(!classify::is_source_problem(&error));
    }

    #[test]
    fn test_error_with_context() {
        let error = TileError::render_failure("plans/floor-2.pdf", "page 0 missing")
            .with_context("rendering at 300 dpi")
            .with_operation("load source")
            .with_metadata("floor_id", "2");

        assert_eq!(error.category(), "render_failure");
        assert_eq!(error.context().operation.as_deref(), Some("load source"));
        assert_eq!(error.context().context.as_deref(), Some("rendering at 300 dpi"));
        assert_eq!(
            error.context().metadata.get("floor_id").map(String::as_str),
            Some("2")
        );
        assert!(classify::is_source_problem(&error));
    }

    #[test]
    fn test_retry_classification() {
        let conflict = TileError::concurrent_generation(7);
        assert!(conflict.is_retryable());
        assert_eq!(conflict.retry_delay_ms(), Some(5000));

        let missing = TileError::source_not_found("nowhere.png");
        assert!(!missing.is_retryable());
        assert_eq!(missing.severity(), ErrorSeverity::Warning);
    }

    #[test]
    fn test_display_messages() {
        let err = TileError::invalid_tile_path(4, "../floor-5/floor-5.dzi");
        assert_eq!(
            err.to_string(),
            "Invalid tile path for floor 4: ../floor-5/floor-5.dzi"
        );

        let partial = TileError::partial_generation(vec![2, 5], 6);
        assert_eq!(partial.to_string(), "2 of 6 floors failed: [2, 5]");
    }

    #[test]
    fn test_io_source_is_exposed() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = TileError::io_at("create level dir", "/tiles/floor-1", io);
        assert!(StdError::source(&err).is_some());
        assert!(err.to_string().contains("/tiles/floor-1"));
    }
}
