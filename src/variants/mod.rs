//! Tessellation variant cache
//!
//! - flags: feature flags, variant keys, macro sets
//! - toggles: live GUI toggle state
//! - enumerator: the full set of reachable variants and their compile jobs
//! - cache: key → compiled stage pair
//! - scheduler: background compilation and progress
//! - selector: per-frame key derivation and lookup
//! - programs: device-lifetime owner tying the above together

pub mod cache;
pub mod enumerator;
pub mod flags;
pub mod programs;
pub mod scheduler;
pub mod selector;
pub mod toggles;

pub use cache::{CompiledVariant, ProgramCache, StageJoin, VariantStatus};
pub use enumerator::{PendingJob, PipelineStage, StageProgram, VARIANT_COUNT, VariantEnumerator};
pub use flags::{FeatureFlags, MacroSet, VariantKey, flags_to_macro_tokens};
pub use programs::TessellationPrograms;
pub use scheduler::{CompilationScheduler, CompileProgress};
pub use selector::{ResolvedVariant, VariantSelector};
pub use toggles::{ControlAvailability, TessellationTechnique, ToggleState};
