//! Warms up every tessellation variant from an in-memory template and prints
//! progress the way a HUD would, then resolves a few toggle states.
//!
//! ```text
//! RUST_LOG=info cargo run --example warmup
//! ```

use std::thread;
use std::time::Duration;

use tessel::compiler::{CompileRequest, GeneratedSource};
use tessel::{
    CompileError, ShaderTemplates, TemplateCompiler, TessellationPrograms, TessellationTechnique,
    ToggleState, VariantCacheSettings, VariantSelector,
};

const STAGE_TEMPLATE: &str = "\
// {{ stage }} stage, profile {{ profile }}
$$ if PNTRI
// pn-triangle control points
$$ elif PHONG
// phong projection
$$ endif
$$ if SS_ADAPT
// screen-space edge factors
$$ endif
$$ if DIST_ADAPT
// distance factors
$$ endif
$$ if RES_ADAPT
// resolution factors
$$ endif
$$ if ORIENT_ADAPT
// silhouette factors
$$ endif
$$ if BF_CULL
// back-face patch cull
$$ endif
$$ if FRUST_CULL
// frustum patch cull
$$ endif
fn {{ entry_point }}() {}
";

fn main() -> tessel::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = VariantCacheSettings {
        worker_count: 4,
        source_name: "tessellation.wgsl".to_string(),
        strict_lookups: false,
        ..Default::default()
    };

    let mut templates = ShaderTemplates::new()?;
    templates.add_template(settings.source_name.as_str(), STAGE_TEMPLATE)?;

    // Stand-in for a native compile call: pretend each stage takes a moment.
    let compiler = TemplateCompiler::new(
        templates,
        |_request: &CompileRequest<'_>, source: &GeneratedSource| {
            thread::sleep(Duration::from_millis(5));
            Ok::<_, CompileError>(source.hash())
        },
    );

    let mut programs = TessellationPrograms::new(compiler, &settings)?;

    let toggles = ToggleState {
        technique: TessellationTechnique::Phong,
        back_face_cull: true,
        distance_adaptive: true,
        resolution_adaptive: true,
        ..Default::default()
    };

    while !programs.is_ready() {
        // A frame during warm-up: draw untessellated, show progress.
        let resolved = programs.resolve(&toggles);
        println!("{} (tessellated: {})", programs.progress(), resolved.is_tessellated());
        if programs.progress().is_drained() {
            break;
        }
        thread::sleep(Duration::from_millis(50));
    }
    programs.check_failures()?;

    for technique in [
        TessellationTechnique::Disabled,
        TessellationTechnique::PnTriangles,
        TessellationTechnique::Phong,
    ] {
        let state = ToggleState { technique, ..toggles };
        let key = VariantSelector::derive_key(&state);
        match programs.resolve(&state).variant() {
            Some(variant) => println!(
                "{technique:?}: key {} -> subdivision {:032x}, evaluation {:032x}",
                key.unwrap_or_default(),
                variant.subdivision(),
                variant.evaluation()
            ),
            None => println!("{technique:?}: no tessellation program"),
        }
        println!("  controls enabled: {:?}", state.controls());
    }

    programs.shutdown();
    Ok(())
}
