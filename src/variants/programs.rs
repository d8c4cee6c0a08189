//! Device-lifetime owner of the tessellation variant cache.
//!
//! [`TessellationPrograms`] is created once per device. Construction
//! enumerates every variant, registers it with the [`ProgramCache`] and hands
//! all jobs to the [`CompilationScheduler`]; it returns before any compile
//! finishes. Dropping it (or calling [`shutdown`]) aborts outstanding work,
//! joins the workers and only then releases the compiled programs.
//!
//! ```rust,ignore
//! let programs = TessellationPrograms::new(compiler, &settings)?;
//!
//! // Every frame:
//! if programs.is_ready() {
//!     match programs.resolve(&toggles) {
//!         ResolvedVariant::Tessellated(variant) => { /* bind both stages */ }
//!         ResolvedVariant::NoProgram => { /* plain pipeline */ }
//!     }
//! } else {
//!     hud.show_progress(programs.progress());
//! }
//! ```
//!
//! [`shutdown`]: TessellationPrograms::shutdown

use std::sync::Arc;

use super::cache::ProgramCache;
use super::enumerator::VariantEnumerator;
use super::scheduler::{CompilationScheduler, CompileProgress};
use super::selector::{ResolvedVariant, VariantSelector};
use super::toggles::ToggleState;
use crate::compiler::ProgramCompiler;
use crate::errors::{Result, VariantError};
use crate::settings::VariantCacheSettings;

pub struct TessellationPrograms<C: ProgramCompiler> {
    cache: Arc<ProgramCache<C::Program>>,
    scheduler: CompilationScheduler<C>,
    selector: VariantSelector,
}

impl<C: ProgramCompiler> TessellationPrograms<C> {
    /// Registers every variant and starts compiling in the background.
    pub fn new(compiler: C, settings: &VariantCacheSettings) -> Result<Self> {
        let enumerator = VariantEnumerator::from_settings(settings);
        let cache = Arc::new(ProgramCache::new());

        let keys = VariantEnumerator::enumerate();
        for &key in &keys {
            cache.ensure(key);
        }

        let scheduler = CompilationScheduler::new(
            compiler,
            Arc::clone(&cache),
            settings.effective_worker_count(),
        )?;
        scheduler.submit(enumerator.jobs())?;

        log::info!(
            "Tessellation programs: {} variants registered from {}",
            keys.len(),
            settings.source_name
        );

        Ok(Self {
            cache,
            scheduler,
            selector: VariantSelector::new(settings.strict_lookups),
        })
    }

    /// This frame's variant for `toggles`. Never blocks.
    #[must_use]
    pub fn resolve(&self, toggles: &ToggleState) -> ResolvedVariant<C::Program> {
        self.selector.resolve(toggles, &self.cache)
    }

    #[must_use]
    pub fn progress(&self) -> CompileProgress {
        self.scheduler.poll_progress()
    }

    /// Every job has reported and every variant is `Ready`.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.scheduler.is_drained() && self.cache.all_ready()
    }

    /// Errors with the first failed variant. Any failure is fatal to startup.
    pub fn check_failures(&self) -> Result<()> {
        match self.cache.failures().into_iter().next() {
            Some((key, reason)) => Err(VariantError::Compilation {
                key,
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<ProgramCache<C::Program>> {
        &self.cache
    }

    /// Blocks until every job has reported. For tools and tests.
    pub fn wait_until_compiled(&mut self) -> Result<()> {
        self.scheduler.wait_drained();
        self.check_failures()
    }

    /// Aborts compilation, joins the workers and releases every program.
    /// Idempotent.
    pub fn shutdown(&mut self) {
        self.scheduler.shutdown();
        self.cache.teardown();
    }
}

impl<C: ProgramCompiler> Drop for TessellationPrograms<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
