//! `wgpu` backend: renders each stage template to WGSL and creates a shader
//! module from it.
//!
//! `create_shader_module` reports WGSL errors through the device, not its
//! return value. Each module is created inside a validation error scope that
//! is popped on the calling worker, so the diagnostic lands in the failed
//! variant's reason.

use super::{CompileError, CompileRequest, ProgramCompiler, ShaderTemplates};

/// Compiles stage templates into `wgpu::ShaderModule`s.
pub struct WgpuProgramCompiler {
    device: wgpu::Device,
    templates: ShaderTemplates,
}

impl WgpuProgramCompiler {
    #[must_use]
    pub fn new(device: wgpu::Device, templates: ShaderTemplates) -> Self {
        Self { device, templates }
    }
}

impl ProgramCompiler for WgpuProgramCompiler {
    type Program = wgpu::ShaderModule;

    fn compile(&self, request: &CompileRequest<'_>) -> Result<wgpu::ShaderModule, CompileError> {
        let generated = self.templates.render(request)?;

        let label = format!(
            "Tessellation {} [{}] {:08x}",
            request.stage,
            request.key,
            request.macros.compute_hash() as u32
        );

        let scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&label),
            source: wgpu::ShaderSource::Wgsl(generated.into_text().into()),
        });
        let captured = pollster::block_on(scope.pop());

        scope_result(&label, captured)?;
        Ok(module)
    }
}

/// Maps a popped validation scope to a compile outcome.
fn scope_result(label: &str, captured: Option<wgpu::Error>) -> Result<(), CompileError> {
    match captured {
        Some(err) => Err(CompileError::new(format!("{label}: {err}"))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variants::{FeatureFlags, VariantEnumerator, VariantKey};

    const VALID_WGSL: &str = "@fragment fn {{ entry_point }}() {}\n";
    const INVALID_WGSL: &str = "@fragment fn {{ entry_point }}() { let x: f32 = ; }\n";

    fn request_device() -> Option<wgpu::Device> {
        let instance = wgpu::Instance::default();
        let adapter =
            pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))
                .ok()?;
        let (device, _queue) =
            pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor::default())).ok()?;
        Some(device)
    }

    fn compiler_with(device: wgpu::Device, source: &str) -> WgpuProgramCompiler {
        let mut templates = ShaderTemplates::new().unwrap();
        templates
            .add_template("SilhouetteTessellation11.hlsl", source)
            .unwrap();
        WgpuProgramCompiler::new(device, templates)
    }

    #[test]
    fn test_validation_error_becomes_reason() {
        let captured = wgpu::Error::Validation {
            source: Box::new(std::io::Error::other("naga")),
            description: "expected expression, found ';'".to_string(),
        };

        let err = scope_result("Tessellation evaluation [PNTRI]", Some(captured)).unwrap_err();
        assert_eq!(
            err.message(),
            "Tessellation evaluation [PNTRI]: expected expression, found ';'"
        );
        assert!(scope_result("Tessellation evaluation [PNTRI]", None).is_ok());
    }

    #[test]
    fn test_invalid_wgsl_fails_with_diagnostic() {
        let Some(device) = request_device() else {
            eprintln!("skipping: no wgpu adapter available");
            return;
        };
        let compiler = compiler_with(device, INVALID_WGSL);
        let jobs = VariantEnumerator::default().jobs_for(VariantKey::from(FeatureFlags::PNTRI));

        let err = compiler.compile(&CompileRequest::from(&jobs[0])).unwrap_err();
        assert!(err.message().starts_with("Tessellation subdivision [PNTRI]"));
        assert!(err.message().len() > "Tessellation subdivision [PNTRI]".len());
    }

    #[test]
    fn test_valid_wgsl_compiles() {
        let Some(device) = request_device() else {
            eprintln!("skipping: no wgpu adapter available");
            return;
        };
        let compiler = compiler_with(device, VALID_WGSL);
        let jobs = VariantEnumerator::default().jobs_for(VariantKey::from(FeatureFlags::PHONG));

        assert!(compiler.compile(&CompileRequest::from(&jobs[1])).is_ok());
    }
}
