//! Variant Enumeration
//!
//! Produces the exhaustive set of keys the UI can reach, and the compile jobs
//! for each of them.
//!
//! The toggle space factors into independent sub-choices:
//!
//! | Choice | Options |
//! |--------|---------|
//! | Orientation adaptivity | off, `ORIENT_ADAPT` |
//! | Technique | `PNTRI`, `PHONG` |
//! | Culling | none, `BF_CULL`, `FRUST_CULL`, both |
//! | Adaptivity | none, `SS_ADAPT`, `DIST_ADAPT`, `DIST_ADAPT \| RES_ADAPT`, `RES_ADAPT` |
//!
//! Screen-space adaptivity excludes distance and resolution adaptivity, so the
//! adaptivity choice has five states rather than sixteen. That gives
//! 2 × 2 × 4 × 5 = 80 keys and two jobs (one per stage) for each.

use std::fmt;
use std::sync::Arc;

use super::flags::{FeatureFlags, MacroSet, VariantKey};
use crate::settings::VariantCacheSettings;

/// Number of keys produced by [`VariantEnumerator::enumerate`].
pub const VARIANT_COUNT: usize = 80;

const ORIENTATION: [FeatureFlags; 2] = [FeatureFlags::empty(), FeatureFlags::ORIENT_ADAPT];

const TECHNIQUE: [FeatureFlags; 2] = [FeatureFlags::PNTRI, FeatureFlags::PHONG];

const CULLING: [FeatureFlags; 4] = [
    FeatureFlags::empty(),
    FeatureFlags::BF_CULL,
    FeatureFlags::FRUST_CULL,
    FeatureFlags::BF_CULL.union(FeatureFlags::FRUST_CULL),
];

const ADAPTIVITY: [FeatureFlags; 5] = [
    FeatureFlags::empty(),
    FeatureFlags::SS_ADAPT,
    FeatureFlags::DIST_ADAPT,
    FeatureFlags::DIST_ADAPT.union(FeatureFlags::RES_ADAPT),
    FeatureFlags::RES_ADAPT,
];

// ─── Pipeline Stages ─────────────────────────────────────────────────────────

/// The two programmable stages that make up a tessellation variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    /// Patch subdivision / control stage.
    Subdivision,
    /// Evaluation / displacement stage.
    Evaluation,
}

impl PipelineStage {
    pub const ALL: [Self; 2] = [Self::Subdivision, Self::Evaluation];

    /// Slot index inside a variant's stage pair.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Subdivision => 0,
            Self::Evaluation => 1,
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subdivision => f.write_str("subdivision"),
            Self::Evaluation => f.write_str("evaluation"),
        }
    }
}

/// Entry point and target profile for one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageProgram {
    pub entry_point: Arc<str>,
    pub profile: Arc<str>,
}

// ─── Pending Jobs ────────────────────────────────────────────────────────────

/// One unit of compilation work: a single stage of a single variant.
#[derive(Debug, Clone)]
pub struct PendingJob {
    pub key: VariantKey,
    pub stage: PipelineStage,
    pub entry_point: Arc<str>,
    pub profile: Arc<str>,
    pub source: Arc<str>,
    pub macros: MacroSet,
}

// ─── Enumerator ──────────────────────────────────────────────────────────────

/// Generates every variant key the application can request at runtime.
#[derive(Debug, Clone)]
pub struct VariantEnumerator {
    source: Arc<str>,
    stages: [StageProgram; 2],
}

impl Default for VariantEnumerator {
    fn default() -> Self {
        Self::from_settings(&VariantCacheSettings::default())
    }
}

impl VariantEnumerator {
    #[must_use]
    pub fn from_settings(settings: &VariantCacheSettings) -> Self {
        Self {
            source: Arc::from(settings.source_name.as_str()),
            stages: [
                StageProgram {
                    entry_point: Arc::from(settings.subdivision_entry_point.as_str()),
                    profile: Arc::from(settings.subdivision_profile.as_str()),
                },
                StageProgram {
                    entry_point: Arc::from(settings.evaluation_entry_point.as_str()),
                    profile: Arc::from(settings.evaluation_profile.as_str()),
                },
            ],
        }
    }

    /// All reachable keys, in a stable order.
    #[must_use]
    pub fn enumerate() -> Vec<VariantKey> {
        let mut keys = Vec::with_capacity(VARIANT_COUNT);
        for orientation in ORIENTATION {
            for technique in TECHNIQUE {
                for culling in CULLING {
                    let common = technique | culling | orientation;
                    for adaptivity in ADAPTIVITY {
                        keys.push(VariantKey::from(common | adaptivity));
                    }
                }
            }
        }
        keys
    }

    /// Entry point and profile configured for `stage`.
    #[inline]
    #[must_use]
    pub fn stage_program(&self, stage: PipelineStage) -> &StageProgram {
        &self.stages[stage.index()]
    }

    /// The stage-pair jobs for a single key.
    #[must_use]
    pub fn jobs_for(&self, key: VariantKey) -> [PendingJob; 2] {
        let macros = MacroSet::from_flags(key.flags());
        PipelineStage::ALL.map(|stage| {
            let program = self.stage_program(stage);
            PendingJob {
                key,
                stage,
                entry_point: Arc::clone(&program.entry_point),
                profile: Arc::clone(&program.profile),
                source: Arc::clone(&self.source),
                macros: macros.clone(),
            }
        })
    }

    /// Jobs for every enumerated key, stage pairs adjacent.
    #[must_use]
    pub fn jobs(&self) -> Vec<PendingJob> {
        Self::enumerate()
            .into_iter()
            .flat_map(|key| self.jobs_for(key))
            .collect()
    }
}
