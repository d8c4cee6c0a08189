//! Shader Template Rendering
//!
//! Stage sources are minijinja templates. Each job's macro set is exposed as
//! template variables (`{$ if PHONG $}`), alongside `entry_point`, `profile`,
//! `stage` and `variant_bits`.
//!
//! Block statements use `{$ … $}` so they do not collide with shading-language
//! braces; `$$` starts a line statement.

use std::collections::BTreeMap;

use minijinja::syntax::SyntaxConfig;
use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;
use xxhash_rust::xxh3::xxh3_128;

use super::CompileRequest;
use crate::errors::{Result, VariantError};

/// Rendered stage source plus its content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSource {
    text: String,
    hash: u128,
}

impl GeneratedSource {
    #[must_use]
    pub fn new(text: String) -> Self {
        let hash = xxh3_128(text.as_bytes());
        Self { text, hash }
    }

    #[inline]
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// xxh3-128 of the generated text.
    #[inline]
    #[must_use]
    pub fn hash(&self) -> u128 {
        self.hash
    }

    #[must_use]
    pub fn into_text(self) -> String {
        self.text
    }
}

#[derive(Serialize)]
struct StageContext<'a> {
    #[serde(flatten)]
    defines: BTreeMap<String, String>,
    entry_point: &'a str,
    profile: &'a str,
    stage: String,
    variant_bits: u32,
}

/// Named stage-source templates.
pub struct ShaderTemplates {
    env: Environment<'static>,
}

impl ShaderTemplates {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();

        let syntax = SyntaxConfig::builder()
            .block_delimiters("{$", "$}")
            .variable_delimiters("{{", "}}")
            .line_statement_prefix("$$")
            .build()?;

        env.set_syntax(syntax);
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_undefined_behavior(UndefinedBehavior::SemiStrict);

        Ok(Self { env })
    }

    /// Registers (or replaces) a template under `name`.
    pub fn add_template(&mut self, name: impl Into<String>, source: impl Into<String>) -> Result<()> {
        self.env.add_template_owned(name.into(), source.into())?;
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.env.get_template(name).is_ok()
    }

    /// Renders the template named by `request.source` for one stage.
    pub fn render(&self, request: &CompileRequest<'_>) -> Result<GeneratedSource> {
        let template = self
            .env
            .get_template(request.source)
            .map_err(|e| VariantError::Template(format!("{}: {e}", request.source)))?;

        let ctx = StageContext {
            defines: request.macros.to_map(),
            entry_point: request.entry_point,
            profile: request.profile,
            stage: request.stage.to_string(),
            variant_bits: request.key.bits(),
        };

        let text = template.render(&ctx)?;
        Ok(GeneratedSource::new(text))
    }
}
