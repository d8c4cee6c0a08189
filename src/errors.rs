//! Error Types
//!
//! This module defines the error types used throughout the variant cache.
//!
//! # Overview
//!
//! The main error type [`VariantError`] covers:
//! - Program compilation failures reported by a [`ProgramCompiler`]
//! - Contract violations on the [`ProgramCache`] (unknown keys, double resolution)
//! - Scheduler lifecycle errors (submitting after shutdown, worker spawn failures)
//! - Shader template errors
//!
//! Nothing in this module crosses the render-loop boundary:
//! [`VariantSelector::resolve`] always yields a usable result.
//!
//! [`ProgramCompiler`]: crate::compiler::ProgramCompiler
//! [`ProgramCache`]: crate::variants::ProgramCache
//! [`VariantSelector::resolve`]: crate::variants::VariantSelector::resolve

use thiserror::Error;

use crate::variants::VariantKey;

/// The main error type for the variant cache.
#[derive(Error, Debug)]
pub enum VariantError {
    // ========================================================================
    // Compilation Errors
    // ========================================================================
    /// A stage program for `key` failed to compile.
    ///
    /// Compilation failures are never retried; any failed key reachable by the
    /// enumerator is fatal to startup.
    #[error("Failed to compile variant {key}: {reason}")]
    Compilation {
        /// Variant that owns the failed job
        key: VariantKey,
        /// Compiler diagnostic, prefixed with the failing stage
        reason: String,
    },

    /// Shader template configuration or rendering error.
    #[error("Shader template error: {0}")]
    Template(String),

    // ========================================================================
    // Cache Contract Errors
    // ========================================================================
    /// A key was never registered with the cache.
    #[error("Variant {0} was never registered with the program cache")]
    UnknownKey(VariantKey),

    /// A key (or one of its stage slots) was resolved twice.
    #[error("Variant {0} was already resolved; each variant compiles exactly once")]
    AlreadyResolved(VariantKey),

    // ========================================================================
    // Scheduler Errors
    // ========================================================================
    /// The scheduler was aborted or shut down and no longer accepts jobs.
    #[error("Compilation scheduler is stopped")]
    SchedulerStopped,

    /// A background compile worker could not be started.
    #[error("Failed to spawn compile worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}

// ============================================================================
// Convenient conversion implementations
// ============================================================================

impl From<minijinja::Error> for VariantError {
    fn from(err: minijinja::Error) -> Self {
        VariantError::Template(err.to_string())
    }
}

/// Alias for `Result<T, VariantError>`.
pub type Result<T> = std::result::Result<T, VariantError>;
