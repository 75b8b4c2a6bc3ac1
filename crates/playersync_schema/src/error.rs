//! Error types for the migration engine.

use crate::version::SchemaVersion;

/// Errors raised while registering or applying schema migrations.
///
/// These describe schema/version problems, not corrupt bytes. None of them
/// are retryable: a missing path needs more steps registered, and a failed
/// step will fail again on the same input.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// A step was registered whose target is not strictly newer than its source
    #[error("invalid migration step {from} -> {to}: target version must be newer than source version")]
    InvalidStep {
        from: SchemaVersion,
        to: SchemaVersion,
    },
    /// No chain of registered steps connects the two versions
    #[error("no migration path found from {from} to {to}")]
    NoPath {
        from: SchemaVersion,
        to: SchemaVersion,
    },
    /// A transform on the path returned an error
    #[error("migration step {from} -> {to} failed: {source}")]
    StepFailed {
        from: SchemaVersion,
        to: SchemaVersion,
        #[source]
        source: anyhow::Error,
    },
}

impl MigrationError {
    /// The `(from, to)` pair the error refers to.
    pub fn versions(&self) -> (&SchemaVersion, &SchemaVersion) {
        match self {
            Self::InvalidStep { from, to }
            | Self::NoPath { from, to }
            | Self::StepFailed { from, to, .. } => (from, to),
        }
    }
}

/// Convenience alias for migration results.
pub type Result<T> = std::result::Result<T, MigrationError>;
