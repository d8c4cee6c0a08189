//! Variant Cache Settings
//!
//! Configuration for the enumerated compile jobs and the background scheduler.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tessel::settings::VariantCacheSettings;
//!
//! // Defaults: one worker per available core, strict lookups in debug builds.
//! let settings = VariantCacheSettings::default();
//!
//! // Two workers, a WGSL template, and lenient lookups.
//! let settings = VariantCacheSettings {
//!     worker_count: 2,
//!     source_name: "tessellation.wgsl".into(),
//!     strict_lookups: false,
//!     ..Default::default()
//! };
//! ```

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

/// Settings consumed by [`TessellationPrograms`](crate::variants::TessellationPrograms).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantCacheSettings {
    /// Background compile workers. `0` uses the available parallelism.
    pub worker_count: usize,

    /// Source identifier handed to the compiler with every job.
    pub source_name: String,

    /// Entry point of the subdivision stage program.
    pub subdivision_entry_point: String,
    /// Target profile of the subdivision stage program.
    pub subdivision_profile: String,

    /// Entry point of the evaluation stage program.
    pub evaluation_entry_point: String,
    /// Target profile of the evaluation stage program.
    pub evaluation_profile: String,

    /// Panic on lookups of failed or unregistered variants instead of
    /// falling back to the non-tessellated path.
    ///
    /// Defaults to `true` in debug builds.
    pub strict_lookups: bool,
}

impl Default for VariantCacheSettings {
    fn default() -> Self {
        Self {
            worker_count: 0,
            source_name: "SilhouetteTessellation11.hlsl".to_string(),
            subdivision_entry_point: "HS_PNTriangles".to_string(),
            subdivision_profile: "hs_5_0".to_string(),
            evaluation_entry_point: "DS_PNTriangles".to_string(),
            evaluation_profile: "ds_5_0".to_string(),
            strict_lookups: cfg!(debug_assertions),
        }
    }
}

impl VariantCacheSettings {
    /// Worker count with `0` resolved against the machine.
    #[must_use]
    pub fn effective_worker_count(&self) -> usize {
        if self.worker_count > 0 {
            return self.worker_count;
        }
        std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
    }
}
