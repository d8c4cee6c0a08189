//! Per-frame variant selection.
//!
//! [`VariantSelector::resolve`] never fails and never waits: it returns either
//! a compiled stage pair or [`ResolvedVariant::NoProgram`], in which case the
//! render path draws with the non-tessellated pipeline.

use std::sync::Arc;

use super::cache::{CompiledVariant, ProgramCache, VariantStatus};
use super::flags::{FeatureFlags, VariantKey};
use super::toggles::{TessellationTechnique, ToggleState};

/// What the render path should draw with this frame.
pub enum ResolvedVariant<P> {
    /// Use the non-tessellating pipeline configuration.
    NoProgram,
    Tessellated(Arc<CompiledVariant<P>>),
}

impl<P> ResolvedVariant<P> {
    #[inline]
    #[must_use]
    pub fn is_tessellated(&self) -> bool {
        matches!(self, Self::Tessellated(_))
    }

    #[must_use]
    pub fn variant(&self) -> Option<&CompiledVariant<P>> {
        match self {
            Self::Tessellated(variant) => Some(variant.as_ref()),
            Self::NoProgram => None,
        }
    }
}

impl<P> std::fmt::Debug for ResolvedVariant<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoProgram => f.write_str("NoProgram"),
            Self::Tessellated(variant) => f.debug_tuple("Tessellated").field(variant).finish(),
        }
    }
}

/// Maps toggle state to a [`VariantKey`] and looks it up.
#[derive(Debug, Clone, Copy)]
pub struct VariantSelector {
    strict: bool,
}

impl Default for VariantSelector {
    fn default() -> Self {
        Self::new(cfg!(debug_assertions))
    }
}

impl VariantSelector {
    /// With `strict`, failed or unregistered lookups panic instead of
    /// degrading to [`ResolvedVariant::NoProgram`].
    #[must_use]
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    /// Key for the given toggles, or `None` when tessellation is disabled.
    ///
    /// Screen-space adaptivity suppresses distance and resolution adaptivity.
    #[must_use]
    pub fn derive_key(toggles: &ToggleState) -> Option<VariantKey> {
        let mut flags = match toggles.technique {
            TessellationTechnique::Disabled => return None,
            TessellationTechnique::PnTriangles => FeatureFlags::PNTRI,
            TessellationTechnique::Phong => FeatureFlags::PHONG,
        };

        if toggles.screen_space_adaptive {
            flags |= FeatureFlags::SS_ADAPT;
        } else {
            flags.set(FeatureFlags::DIST_ADAPT, toggles.distance_adaptive);
            flags.set(FeatureFlags::RES_ADAPT, toggles.resolution_adaptive);
        }

        flags.set(FeatureFlags::ORIENT_ADAPT, toggles.orientation_adaptive);
        flags.set(FeatureFlags::BF_CULL, toggles.back_face_cull);
        flags.set(FeatureFlags::FRUST_CULL, toggles.frustum_cull);

        Some(VariantKey::from(flags))
    }

    /// Resolves this frame's variant. Pending variants draw untessellated.
    pub fn resolve<P>(&self, toggles: &ToggleState, cache: &ProgramCache<P>) -> ResolvedVariant<P> {
        let Some(key) = Self::derive_key(toggles) else {
            return ResolvedVariant::NoProgram;
        };

        match cache.lookup(key) {
            VariantStatus::Ready(variant) => ResolvedVariant::Tessellated(variant),
            VariantStatus::Pending => {
                log::trace!("Variant {key} still compiling, drawing untessellated");
                ResolvedVariant::NoProgram
            }
            VariantStatus::Failed(reason) => {
                log::error!("Variant {key} failed to compile: {reason}");
                assert!(!self.strict, "resolved failed variant {key}: {reason}");
                ResolvedVariant::NoProgram
            }
            VariantStatus::Unknown => {
                log::error!("Variant {key} was never enumerated; toggles {toggles:?}");
                assert!(!self.strict, "resolved unregistered variant {key}");
                ResolvedVariant::NoProgram
            }
        }
    }
}
