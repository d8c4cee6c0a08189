//! Feature flags, variant keys and macro sets.
//!
//! A [`VariantKey`] is the [`FeatureFlags`] bit pattern used verbatim. The key
//! type carries no validation: mutual exclusion between `PHONG` and `PNTRI`
//! is enforced by the enumerator and the selector.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use bitflags::bitflags;
use smallvec::SmallVec;

bitflags! {
    /// Orthogonal tessellation toggles. Bit values are stable for the process.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct FeatureFlags: u32 {
        /// Tessellate towards a desired screen-space primitive size.
        const SS_ADAPT     = 1 << 0;
        /// Tessellate based on distance to the camera.
        const DIST_ADAPT   = 1 << 1;
        /// Tessellate based on the target screen resolution.
        const RES_ADAPT    = 1 << 2;
        /// Tessellate based on surface orientation relative to the view.
        const ORIENT_ADAPT = 1 << 3;
        /// Cull back-facing patches before tessellation.
        const BF_CULL      = 1 << 5;
        /// Cull patches outside the view frustum before tessellation.
        const FRUST_CULL   = 1 << 6;
        /// Phong displacement technique.
        const PHONG        = 1 << 7;
        /// PN-triangle displacement technique.
        const PNTRI        = 1 << 8;
    }
}

impl FeatureFlags {
    /// Both displacement techniques.
    pub const TECHNIQUES: Self = Self::PHONG.union(Self::PNTRI);
}

/// Cache key for one tessellation variant: the flag bits, verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct VariantKey(u32);

impl VariantKey {
    /// The "tessellation disabled" key. Never registered with the cache.
    pub const NONE: Self = Self(0);

    #[inline]
    #[must_use]
    pub const fn from_flags(flags: FeatureFlags) -> Self {
        Self(flags.bits())
    }

    #[inline]
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn flags(self) -> FeatureFlags {
        FeatureFlags::from_bits_retain(self.0)
    }

    #[inline]
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl From<FeatureFlags> for VariantKey {
    fn from(flags: FeatureFlags) -> Self {
        Self::from_flags(flags)
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            return f.write_str("NONE");
        }
        let mut first = true;
        for (name, _) in self.flags().iter_names() {
            if !first {
                f.write_str(" | ")?;
            }
            f.write_str(name)?;
            first = false;
        }
        let unknown = self.0 & !FeatureFlags::all().bits();
        if unknown != 0 {
            if !first {
                f.write_str(" | ")?;
            }
            write!(f, "{unknown:#x}")?;
        }
        Ok(())
    }
}

/// Translates flags into compiler macro tokens, one per set bit, in ascending
/// bit order.
#[must_use]
pub fn flags_to_macro_tokens(flags: FeatureFlags) -> SmallVec<[&'static str; 8]> {
    flags.iter_names().map(|(name, _)| name).collect()
}

/// Ordered set of macro definitions passed to the shading-source compiler.
///
/// Every token is defined with the value `1`. Two sets built from the same
/// flags are identical and hash identically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroSet {
    tokens: SmallVec<[&'static str; 8]>,
}

impl MacroSet {
    /// Value assigned to every defined token.
    pub const DEFINED: &'static str = "1";

    #[must_use]
    pub fn from_flags(flags: FeatureFlags) -> Self {
        Self {
            tokens: flags_to_macro_tokens(flags),
        }
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| *t == token)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tokens.iter().copied()
    }

    /// `(name, value)` pairs, as handed to a compiler's define list.
    pub fn definitions(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.iter().map(|token| (token, Self::DEFINED))
    }

    /// Converts to a `BTreeMap` (for template rendering).
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.definitions()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// Content hash, used in shader module labels.
    #[must_use]
    pub fn compute_hash(&self) -> u64 {
        use std::hash::BuildHasher;

        rustc_hash::FxBuildHasher.hash_one(self)
    }
}

impl Hash for MacroSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tokens.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_values_are_stable() {
        assert_eq!(FeatureFlags::SS_ADAPT.bits(), 1);
        assert_eq!(FeatureFlags::DIST_ADAPT.bits(), 2);
        assert_eq!(FeatureFlags::RES_ADAPT.bits(), 4);
        assert_eq!(FeatureFlags::ORIENT_ADAPT.bits(), 8);
        assert_eq!(FeatureFlags::BF_CULL.bits(), 32);
        assert_eq!(FeatureFlags::FRUST_CULL.bits(), 64);
        assert_eq!(FeatureFlags::PHONG.bits(), 128);
        assert_eq!(FeatureFlags::PNTRI.bits(), 256);
    }

    #[test]
    fn test_key_is_bit_pattern() {
        let flags = FeatureFlags::PHONG | FeatureFlags::BF_CULL;
        let key = VariantKey::from(flags);
        assert_eq!(key.bits(), 128 | 32);
        assert_eq!(key.flags(), flags);
        assert_eq!(key, VariantKey::from_flags(FeatureFlags::BF_CULL | FeatureFlags::PHONG));
        assert!(VariantKey::NONE.is_none());
        assert!(!key.is_none());
    }

    #[test]
    fn test_key_display() {
        let key = VariantKey::from(FeatureFlags::PNTRI | FeatureFlags::DIST_ADAPT);
        assert_eq!(key.to_string(), "DIST_ADAPT | PNTRI");
        assert_eq!(VariantKey::NONE.to_string(), "NONE");
    }

    #[test]
    fn test_macro_tokens_follow_bit_order() {
        let flags = FeatureFlags::PNTRI
            | FeatureFlags::FRUST_CULL
            | FeatureFlags::SS_ADAPT
            | FeatureFlags::ORIENT_ADAPT;
        let tokens = flags_to_macro_tokens(flags);
        assert_eq!(
            tokens.as_slice(),
            &["SS_ADAPT", "ORIENT_ADAPT", "FRUST_CULL", "PNTRI"]
        );
        assert!(flags_to_macro_tokens(FeatureFlags::empty()).is_empty());
    }

    #[test]
    fn test_macro_set_map_and_hash() {
        let a = MacroSet::from_flags(FeatureFlags::PHONG | FeatureFlags::RES_ADAPT);
        let b = MacroSet::from_flags(FeatureFlags::RES_ADAPT | FeatureFlags::PHONG);
        assert_eq!(a, b);
        assert_eq!(a.compute_hash(), b.compute_hash());

        let map = a.to_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("PHONG").map(String::as_str), Some("1"));
        assert!(a.contains("RES_ADAPT"));
        assert!(!a.contains("PNTRI"));
    }
}
