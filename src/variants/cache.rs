//! Program Cache
//!
//! Central owner of every compiled tessellation variant. Entries are keyed by
//! [`VariantKey`] and move through a one-way state machine:
//!
//! ```text
//! Pending { subdivision: ?, evaluation: ? } ──both stages──▶ Ready(CompiledVariant)
//!                  │
//!                  └──────────any stage fails──────────────▶ Failed(reason)
//! ```
//!
//! # Concurrency
//!
//! The map sits behind a `parking_lot::RwLock`. Render-loop lookups only take
//! the read lock; scheduler completions take the write lock for the duration
//! of a slot update, never for the compile itself. A stage join and its
//! `Ready` transition happen under one write lock, so readers see either a
//! pending entry or a complete stage pair.
//!
//! Reports arriving after [`ProgramCache::teardown`] are discarded with a
//! warning.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::enumerator::PipelineStage;
use super::flags::VariantKey;
use crate::errors::{Result, VariantError};

// ─── Compiled Variant ────────────────────────────────────────────────────────

/// Compiled programs for both pipeline stages of one variant.
pub struct CompiledVariant<P> {
    subdivision: Arc<P>,
    evaluation: Arc<P>,
}

impl<P> CompiledVariant<P> {
    #[must_use]
    pub fn new(subdivision: P, evaluation: P) -> Self {
        Self {
            subdivision: Arc::new(subdivision),
            evaluation: Arc::new(evaluation),
        }
    }

    #[inline]
    #[must_use]
    pub fn subdivision(&self) -> &P {
        &self.subdivision
    }

    #[inline]
    #[must_use]
    pub fn evaluation(&self) -> &P {
        &self.evaluation
    }

    #[inline]
    #[must_use]
    pub fn stage(&self, stage: PipelineStage) -> &P {
        match stage {
            PipelineStage::Subdivision => &self.subdivision,
            PipelineStage::Evaluation => &self.evaluation,
        }
    }
}

impl<P> fmt::Debug for CompiledVariant<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledVariant")
            .field("subdivision", &Arc::as_ptr(&self.subdivision))
            .field("evaluation", &Arc::as_ptr(&self.evaluation))
            .finish()
    }
}

// ─── Entry State ─────────────────────────────────────────────────────────────

/// Result of a cache lookup.
pub enum VariantStatus<P> {
    Ready(Arc<CompiledVariant<P>>),
    Pending,
    Failed(Arc<str>),
    /// The key was never registered.
    Unknown,
}

impl<P> VariantStatus<P> {
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

impl<P> fmt::Debug for VariantStatus<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(variant) => f.debug_tuple("Ready").field(variant).finish(),
            Self::Pending => f.write_str("Pending"),
            Self::Failed(reason) => f.debug_tuple("Failed").field(reason).finish(),
            Self::Unknown => f.write_str("Unknown"),
        }
    }
}

enum EntryState<P> {
    /// Two-slot join, indexed by [`PipelineStage::index`].
    Pending([Option<P>; 2]),
    Ready(Arc<CompiledVariant<P>>),
    Failed(Arc<str>),
}

struct CacheEntry<P> {
    key: VariantKey,
    state: EntryState<P>,
}

impl<P> CacheEntry<P> {
    fn pending(key: VariantKey) -> Self {
        Self {
            key,
            state: EntryState::Pending([None, None]),
        }
    }
}

/// Outcome of a single stage report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageJoin {
    /// The other stage has not reported yet.
    Waiting,
    /// Both stages are present; the key is now `Ready`.
    Completed,
    /// The key had already failed; the report was dropped.
    Discarded,
}

// ─── Program Cache ───────────────────────────────────────────────────────────

/// Thread-safe map from [`VariantKey`] to compiled stage pairs.
pub struct ProgramCache<P> {
    entries: RwLock<FxHashMap<VariantKey, CacheEntry<P>>>,
    torn_down: AtomicBool,
}

impl<P> Default for ProgramCache<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> ProgramCache<P> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(FxHashMap::default()),
            torn_down: AtomicBool::new(false),
        }
    }

    // ── Registration ─────────────────────────────────────────────────────────

    /// Registers `key` as `Pending` if absent. Existing entries are untouched.
    pub fn ensure(&self, key: VariantKey) {
        if self.is_torn_down() {
            log::warn!("ProgramCache: ensure({key}) after teardown, ignoring");
            return;
        }
        if self.entries.read().contains_key(&key) {
            return;
        }
        self.entries
            .write()
            .entry(key)
            .or_insert_with(|| CacheEntry::pending(key));
    }

    // ── Lookup (render path, read-only) ──────────────────────────────────────

    /// Current state of `key`. Never waits on compilation.
    #[must_use]
    pub fn lookup(&self, key: VariantKey) -> VariantStatus<P> {
        let entries = self.entries.read();
        match entries.get(&key).map(|entry| &entry.state) {
            Some(EntryState::Ready(variant)) => VariantStatus::Ready(Arc::clone(variant)),
            Some(EntryState::Pending(_)) => VariantStatus::Pending,
            Some(EntryState::Failed(reason)) => VariantStatus::Failed(Arc::clone(reason)),
            None => VariantStatus::Unknown,
        }
    }

    /// `true` iff every registered entry is `Ready`.
    #[must_use]
    pub fn all_ready(&self) -> bool {
        self.entries
            .read()
            .values()
            .all(|entry| matches!(entry.state, EntryState::Ready(_)))
    }

    /// Failed keys with their diagnostics, sorted by key.
    #[must_use]
    pub fn failures(&self) -> Vec<(VariantKey, Arc<str>)> {
        let mut failures: Vec<_> = self
            .entries
            .read()
            .values()
            .filter_map(|entry| match &entry.state {
                EntryState::Failed(reason) => Some((entry.key, Arc::clone(reason))),
                _ => None,
            })
            .collect();
        failures.sort_by_key(|(key, _)| *key);
        failures
    }

    /// Number of registered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Number of `Ready` entries.
    #[must_use]
    pub fn ready_count(&self) -> usize {
        self.entries
            .read()
            .values()
            .filter(|entry| matches!(entry.state, EntryState::Ready(_)))
            .count()
    }

    #[inline]
    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    // ── Completion (scheduler side) ──────────────────────────────────────────

    /// Transitions `key` from `Pending` to `Ready` with a complete stage pair.
    pub fn mark_ready(&self, key: VariantKey, variant: CompiledVariant<P>) -> Result<()> {
        let mut entries = self.entries.write();
        if self.late_report(key, "mark_ready") {
            return Ok(());
        }
        let entry = entries.get_mut(&key).ok_or(VariantError::UnknownKey(key))?;
        match entry.state {
            EntryState::Pending(_) => {
                entry.state = EntryState::Ready(Arc::new(variant));
                Ok(())
            }
            _ => Err(VariantError::AlreadyResolved(key)),
        }
    }

    /// Transitions `key` from `Pending` to `Failed`.
    pub fn mark_failed(&self, key: VariantKey, reason: impl Into<Arc<str>>) -> Result<()> {
        let mut entries = self.entries.write();
        if self.late_report(key, "mark_failed") {
            return Ok(());
        }
        let entry = entries.get_mut(&key).ok_or(VariantError::UnknownKey(key))?;
        match entry.state {
            EntryState::Pending(_) => {
                entry.state = EntryState::Failed(reason.into());
                Ok(())
            }
            _ => Err(VariantError::AlreadyResolved(key)),
        }
    }

    /// Stores one stage's program. The key becomes `Ready` once both stages
    /// have reported.
    pub fn mark_stage_ready(
        &self,
        key: VariantKey,
        stage: PipelineStage,
        program: P,
    ) -> Result<StageJoin> {
        let mut entries = self.entries.write();
        if self.late_report(key, "mark_stage_ready") {
            return Ok(StageJoin::Discarded);
        }
        let entry = entries.get_mut(&key).ok_or(VariantError::UnknownKey(key))?;

        let slots = match &mut entry.state {
            EntryState::Pending(slots) => slots,
            EntryState::Failed(_) => return Ok(StageJoin::Discarded),
            EntryState::Ready(_) => return Err(VariantError::AlreadyResolved(key)),
        };

        let slot = &mut slots[stage.index()];
        if slot.is_some() {
            return Err(VariantError::AlreadyResolved(key));
        }
        *slot = Some(program);

        if slots.iter().any(Option::is_none) {
            return Ok(StageJoin::Waiting);
        }
        if let [Some(subdivision), Some(evaluation)] = std::mem::take(slots) {
            entry.state = EntryState::Ready(Arc::new(CompiledVariant::new(subdivision, evaluation)));
        }
        Ok(StageJoin::Completed)
    }

    /// Records a stage failure. Any stage failing fails the whole key; a
    /// second failure on an already failed key is dropped.
    pub fn mark_stage_failed(
        &self,
        key: VariantKey,
        stage: PipelineStage,
        reason: &str,
    ) -> Result<StageJoin> {
        let mut entries = self.entries.write();
        if self.late_report(key, "mark_stage_failed") {
            return Ok(StageJoin::Discarded);
        }
        let entry = entries.get_mut(&key).ok_or(VariantError::UnknownKey(key))?;
        match entry.state {
            EntryState::Pending(_) => {
                entry.state = EntryState::Failed(Arc::from(format!("{stage} stage: {reason}")));
                Ok(StageJoin::Completed)
            }
            EntryState::Failed(_) => Ok(StageJoin::Discarded),
            EntryState::Ready(_) => Err(VariantError::AlreadyResolved(key)),
        }
    }

    // ── Teardown ─────────────────────────────────────────────────────────────

    /// Releases every compiled program and clears all entries.
    ///
    /// Call only after the scheduler has been aborted and drained. A second
    /// call is a no-op.
    pub fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::AcqRel) {
            log::debug!("ProgramCache: teardown already performed");
            return;
        }
        let released = {
            let mut entries = self.entries.write();
            let count = entries.len();
            entries.clear();
            entries.shrink_to_fit();
            count
        };
        log::info!("ProgramCache torn down, {released} variants released");
    }

    fn late_report(&self, key: VariantKey, operation: &str) -> bool {
        let late = self.is_torn_down();
        if late {
            log::warn!("ProgramCache: {operation}({key}) after teardown, discarding");
        }
        late
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variants::flags::FeatureFlags;

    fn key(flags: FeatureFlags) -> VariantKey {
        VariantKey::from(flags)
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let cache = ProgramCache::<u32>::new();
        let k = key(FeatureFlags::PNTRI);

        cache.ensure(k);
        cache.ensure(k);
        assert_eq!(cache.len(), 1);
        assert!(matches!(cache.lookup(k), VariantStatus::Pending));
    }

    #[test]
    fn test_lookup_unknown() {
        let cache = ProgramCache::<u32>::new();
        assert!(matches!(
            cache.lookup(key(FeatureFlags::PHONG)),
            VariantStatus::Unknown
        ));
    }

    #[test]
    fn test_stage_join_requires_both_stages() {
        let cache = ProgramCache::<u32>::new();
        let k = key(FeatureFlags::PHONG | FeatureFlags::BF_CULL);
        cache.ensure(k);

        let join = cache.mark_stage_ready(k, PipelineStage::Evaluation, 2).unwrap();
        assert_eq!(join, StageJoin::Waiting);
        assert!(matches!(cache.lookup(k), VariantStatus::Pending));
        assert!(!cache.all_ready());

        let join = cache.mark_stage_ready(k, PipelineStage::Subdivision, 1).unwrap();
        assert_eq!(join, StageJoin::Completed);

        match cache.lookup(k) {
            VariantStatus::Ready(variant) => {
                assert_eq!(*variant.subdivision(), 1);
                assert_eq!(*variant.evaluation(), 2);
            }
            other => panic!("expected Ready, got {other:?}"),
        }
        assert!(cache.all_ready());
    }

    #[test]
    fn test_duplicate_stage_report_is_rejected() {
        let cache = ProgramCache::<u32>::new();
        let k = key(FeatureFlags::PNTRI);
        cache.ensure(k);

        cache.mark_stage_ready(k, PipelineStage::Subdivision, 1).unwrap();
        let err = cache.mark_stage_ready(k, PipelineStage::Subdivision, 9);
        assert!(matches!(err, Err(VariantError::AlreadyResolved(_))));
    }

    #[test]
    fn test_stage_failure_fails_key() {
        let cache = ProgramCache::<u32>::new();
        let k = key(FeatureFlags::PNTRI | FeatureFlags::SS_ADAPT);
        cache.ensure(k);

        cache.mark_stage_ready(k, PipelineStage::Subdivision, 1).unwrap();
        cache
            .mark_stage_failed(k, PipelineStage::Evaluation, "syntax error")
            .unwrap();

        match cache.lookup(k) {
            VariantStatus::Failed(reason) => {
                assert_eq!(&*reason, "evaluation stage: syntax error");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        assert!(!cache.all_ready());
        assert_eq!(cache.failures().len(), 1);

        // The other stage may still report; it is dropped.
        let join = cache
            .mark_stage_failed(k, PipelineStage::Subdivision, "again")
            .unwrap();
        assert_eq!(join, StageJoin::Discarded);
    }

    #[test]
    fn test_resolving_twice_is_a_contract_violation() {
        let cache = ProgramCache::<u32>::new();
        let k = key(FeatureFlags::PHONG);
        cache.ensure(k);

        cache.mark_ready(k, CompiledVariant::new(1, 2)).unwrap();
        assert!(matches!(
            cache.mark_ready(k, CompiledVariant::new(3, 4)),
            Err(VariantError::AlreadyResolved(_))
        ));
        assert!(matches!(
            cache.mark_failed(k, "late"),
            Err(VariantError::AlreadyResolved(_))
        ));
    }

    #[test]
    fn test_reports_for_unregistered_keys_are_errors() {
        let cache = ProgramCache::<u32>::new();
        let k = key(FeatureFlags::PHONG);
        assert!(matches!(
            cache.mark_stage_ready(k, PipelineStage::Subdivision, 1),
            Err(VariantError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_ensure_keeps_ready_identity() {
        let cache = ProgramCache::<u32>::new();
        let k = key(FeatureFlags::PHONG);
        cache.ensure(k);
        cache.mark_ready(k, CompiledVariant::new(1, 2)).unwrap();

        let VariantStatus::Ready(before) = cache.lookup(k) else {
            panic!("expected Ready");
        };
        cache.ensure(k);
        let VariantStatus::Ready(after) = cache.lookup(k) else {
            panic!("expected Ready");
        };
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn test_teardown_is_idempotent_and_discards_late_reports() {
        let cache = ProgramCache::<u32>::new();
        let k = key(FeatureFlags::PNTRI);
        cache.ensure(k);

        cache.teardown();
        assert!(cache.is_empty());
        assert!(cache.is_torn_down());

        cache.teardown();
        assert!(cache.is_empty());

        let join = cache.mark_stage_ready(k, PipelineStage::Subdivision, 1).unwrap();
        assert_eq!(join, StageJoin::Discarded);
        assert!(cache.mark_failed(k, "late").is_ok());
        assert!(matches!(cache.lookup(k), VariantStatus::Unknown));
    }
}
