//! Program compiler seam.
//!
//! The scheduler never talks to a graphics API directly. Every job is handed
//! to a [`ProgramCompiler`], which turns a stage entry point plus a macro set
//! into an opaque program handle.
//!
//! | Implementation | Program | Source |
//! |----------------|---------|--------|
//! | [`TemplateCompiler`] | any `P` | minijinja template → backend closure |
//! | `WgpuProgramCompiler` (feature `wgpu`) | `wgpu::ShaderModule` | minijinja template → WGSL |

pub mod templates;
#[cfg(feature = "wgpu")]
pub mod wgpu_backend;

use std::marker::PhantomData;

use thiserror::Error;

use crate::variants::{MacroSet, PendingJob, PipelineStage, VariantKey};

pub use templates::{GeneratedSource, ShaderTemplates};
#[cfg(feature = "wgpu")]
pub use wgpu_backend::WgpuProgramCompiler;

/// Diagnostic returned by a failed compile call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct CompileError {
    message: String,
}

impl CompileError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<crate::errors::VariantError> for CompileError {
    fn from(err: crate::errors::VariantError) -> Self {
        Self::new(err.to_string())
    }
}

/// Everything a compiler needs for one stage of one variant.
#[derive(Debug, Clone, Copy)]
pub struct CompileRequest<'a> {
    pub key: VariantKey,
    pub stage: PipelineStage,
    pub entry_point: &'a str,
    pub profile: &'a str,
    pub source: &'a str,
    pub macros: &'a MacroSet,
}

impl<'a> From<&'a PendingJob> for CompileRequest<'a> {
    fn from(job: &'a PendingJob) -> Self {
        Self {
            key: job.key,
            stage: job.stage,
            entry_point: &job.entry_point,
            profile: &job.profile,
            source: &job.source,
            macros: &job.macros,
        }
    }
}

/// The native compile call wrapped by the scheduler.
///
/// Called concurrently from every compile worker.
pub trait ProgramCompiler: Send + Sync + 'static {
    /// Compiled artifact for a single stage.
    type Program: Send + Sync + 'static;

    fn compile(&self, request: &CompileRequest<'_>) -> Result<Self::Program, CompileError>;
}

/// Renders the job's template and hands the generated text to a backend.
pub struct TemplateCompiler<F, P> {
    templates: ShaderTemplates,
    backend: F,
    _program: PhantomData<fn() -> P>,
}

impl<F, P> TemplateCompiler<F, P>
where
    F: Fn(&CompileRequest<'_>, &GeneratedSource) -> Result<P, CompileError>,
{
    #[must_use]
    pub fn new(templates: ShaderTemplates, backend: F) -> Self {
        Self {
            templates,
            backend,
            _program: PhantomData,
        }
    }

    #[must_use]
    pub fn templates(&self) -> &ShaderTemplates {
        &self.templates
    }
}

impl<F, P> ProgramCompiler for TemplateCompiler<F, P>
where
    F: Fn(&CompileRequest<'_>, &GeneratedSource) -> Result<P, CompileError> + Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    type Program = P;

    fn compile(&self, request: &CompileRequest<'_>) -> Result<P, CompileError> {
        let generated = self.templates.render(request)?;
        (self.backend)(request, &generated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variants::{FeatureFlags, VariantEnumerator};

    #[test]
    fn test_template_compiler_passes_rendered_source() {
        let mut templates = ShaderTemplates::new().unwrap();
        templates
            .add_template(
                "tess",
                "{$ if PHONG $}phong{$ else $}pn{$ endif $}:{{ entry_point }}",
            )
            .unwrap();

        let compiler = TemplateCompiler::new(templates, |_req: &CompileRequest<'_>, src: &GeneratedSource| {
            Ok::<_, CompileError>(src.text().to_string())
        });

        let mut job = VariantEnumerator::default().jobs_for(VariantKey::from(FeatureFlags::PHONG))[0].clone();
        job.source = "tess".into();

        let program = compiler.compile(&CompileRequest::from(&job)).unwrap();
        assert_eq!(program, "phong:HS_PNTriangles");
    }

    #[test]
    fn test_template_compiler_reports_missing_template() {
        let templates = ShaderTemplates::new().unwrap();
        let compiler = TemplateCompiler::new(templates, |_req: &CompileRequest<'_>, _src: &GeneratedSource| {
            Ok::<_, CompileError>(())
        });

        let job = VariantEnumerator::default().jobs_for(VariantKey::from(FeatureFlags::PNTRI))[1].clone();
        let err = compiler.compile(&CompileRequest::from(&job)).unwrap_err();
        assert!(err.message().contains("SilhouetteTessellation11.hlsl"), "{err}");
    }
}
