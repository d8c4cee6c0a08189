#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod compiler;
pub mod errors;
pub mod settings;
pub mod variants;

pub use compiler::{CompileError, CompileRequest, ProgramCompiler, ShaderTemplates, TemplateCompiler};
pub use errors::{Result, VariantError};
pub use settings::VariantCacheSettings;
pub use variants::{
    CompilationScheduler, CompileProgress, CompiledVariant, FeatureFlags, ProgramCache,
    ResolvedVariant, TessellationPrograms, TessellationTechnique, ToggleState, VariantEnumerator,
    VariantKey, VariantSelector, VariantStatus,
};
