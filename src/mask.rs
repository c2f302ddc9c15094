//! Typed permission masks and the algebra that folds them
//!
//! A [`Mask`] carries, for every [`PermissionKind`], an allow bit and an
//! explicit deny bit. Resolution folds the masks found on a path and its
//! ancestors into one mask and projects it to an allow-only [`EffectiveMask`].
//!
//! Bit packing only happens at the persistence boundary ([`Mask::bits`] and
//! [`Mask::from_bits`]).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{
    kind_by_name, kind_name, ALL_EXTENDED_BITS, BASIC_KINDS, EXECUTE, NO_EXECUTE, NO_READ,
    NO_WRITE, READ, SIMPLE_EXECUTE, SIMPLE_READ, SIMPLE_WRITE, WRITE,
};
use crate::error::{PermissionError, Result};
use crate::model::Sid;

/// A kind of access that can be granted or denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionKind {
    Read,
    Write,
    Execute,
}

impl PermissionKind {
    pub const ALL: [PermissionKind; 3] = [PermissionKind::Read, PermissionKind::Write, PermissionKind::Execute];

    #[inline]
    const fn index(self) -> usize {
        match self {
            PermissionKind::Read => 0,
            PermissionKind::Write => 1,
            PermissionKind::Execute => 2,
        }
    }

    #[inline]
    const fn allow_bit(self) -> u64 {
        match self {
            PermissionKind::Read => READ,
            PermissionKind::Write => WRITE,
            PermissionKind::Execute => EXECUTE,
        }
    }

    #[inline]
    const fn deny_bit(self) -> u64 {
        match self {
            PermissionKind::Read => NO_READ,
            PermissionKind::Write => NO_WRITE,
            PermissionKind::Execute => NO_EXECUTE,
        }
    }

    #[inline]
    const fn simple_bit(self) -> u8 {
        match self {
            PermissionKind::Read => SIMPLE_READ,
            PermissionKind::Write => SIMPLE_WRITE,
            PermissionKind::Execute => SIMPLE_EXECUTE,
        }
    }
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(kind_name(*self))
    }
}

/// Allow and deny bits for one permission kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Decision {
    pub allow: bool,
    pub deny: bool,
}

impl Decision {
    pub const UNDECIDED: Decision = Decision { allow: false, deny: false };
    pub const ALLOW: Decision = Decision { allow: true, deny: false };
    pub const DENY: Decision = Decision { allow: false, deny: true };

    /// At least one of the two bits is set
    #[inline]
    pub fn is_decided(self) -> bool {
        self.allow || self.deny
    }

    /// Allowed once deny has been applied
    #[inline]
    pub fn is_allowed(self) -> bool {
        self.allow && !self.deny
    }

    #[inline]
    fn union(self, other: Decision) -> Decision {
        Decision { allow: self.allow || other.allow, deny: self.deny || other.deny }
    }
}

/// Extended mask: one [`Decision`] per permission kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u64", into = "u64")]
pub struct Mask {
    decisions: [Decision; 3],
}

impl Mask {
    pub const EMPTY: Mask = Mask { decisions: [Decision::UNDECIDED; 3] };
    pub const ALLOW_READ: Mask = Mask::EMPTY.with(PermissionKind::Read, Decision::ALLOW);
    pub const DENY_READ: Mask = Mask::EMPTY.with(PermissionKind::Read, Decision::DENY);
    pub const ALLOW_WRITE: Mask = Mask::EMPTY.with(PermissionKind::Write, Decision::ALLOW);
    pub const DENY_WRITE: Mask = Mask::EMPTY.with(PermissionKind::Write, Decision::DENY);
    pub const ALLOW_ALL: Mask = Mask { decisions: [Decision::ALLOW; 3] };
    pub const DENY_ALL: Mask = Mask { decisions: [Decision::DENY; 3] };

    /// Copy of this mask with `kind` set to `decision`
    #[inline]
    pub const fn with(mut self, kind: PermissionKind, decision: Decision) -> Mask {
        self.decisions[kind.index()] = decision;
        self
    }

    #[inline]
    pub fn with_allow(self, kind: PermissionKind) -> Mask {
        self.with(kind, Decision::ALLOW)
    }

    #[inline]
    pub fn with_deny(self, kind: PermissionKind) -> Mask {
        self.with(kind, Decision::DENY)
    }

    #[inline]
    pub fn decision(&self, kind: PermissionKind) -> Decision {
        self.decisions[kind.index()]
    }

    /// True when the explicit deny bit for `kind` is set
    #[inline]
    pub fn denies(&self, kind: PermissionKind) -> bool {
        self.decision(kind).deny
    }

    /// True when `kind` is allowed by this mask's own bits
    #[inline]
    pub fn allows(&self, kind: PermissionKind) -> bool {
        self.decision(kind).is_allowed()
    }

    /// Every basic kind is decided, so nothing is left to inherit
    pub fn is_complete(&self) -> bool {
        BASIC_KINDS.iter().all(|k| self.decision(*k).is_decided())
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.iter().all(|d| !d.is_decided())
    }

    /// True when any kind carries a deny bit
    pub fn has_any_deny(&self) -> bool {
        self.decisions.iter().any(|d| d.deny)
    }

    /// Per-kind union of allow and deny bits
    pub fn union(&self, other: &Mask) -> Mask {
        let mut out = *self;
        for kind in PermissionKind::ALL {
            out.decisions[kind.index()] = self.decision(kind).union(other.decision(kind));
        }
        out
    }

    /// Packed representation used by the record store
    pub fn bits(&self) -> u64 {
        PermissionKind::ALL.iter().fold(0, |acc, k| {
            let d = self.decision(*k);
            acc | if d.allow { k.allow_bit() } else { 0 } | if d.deny { k.deny_bit() } else { 0 }
        })
    }

    /// Unpack a stored mask. Unknown bits are ignored.
    pub fn from_bits(bits: u64) -> Mask {
        let bits = bits & ALL_EXTENDED_BITS;
        let mut m = Mask::EMPTY;
        for kind in PermissionKind::ALL {
            m.decisions[kind.index()] = Decision {
                allow: bits & kind.allow_bit() != 0,
                deny: bits & kind.deny_bit() != 0,
            };
        }
        m
    }

    /// Build a mask from kind names, e.g. `from_names(&["read"], &["write"])`
    pub fn from_names<S: AsRef<str>>(allow: &[S], deny: &[S]) -> Result<Mask> {
        let lookup = |n: &S| {
            kind_by_name(n.as_ref())
                .ok_or_else(|| PermissionError::InvalidMask(format!("unknown permission kind '{}'", n.as_ref())))
        };
        let mut m = Mask::EMPTY;
        for n in allow {
            let k = lookup(n)?;
            m.decisions[k.index()].allow = true;
        }
        for n in deny {
            let k = lookup(n)?;
            m.decisions[k.index()].deny = true;
        }
        Ok(m)
    }
}

impl From<u64> for Mask {
    fn from(bits: u64) -> Self {
        Mask::from_bits(bits)
    }
}

impl From<Mask> for u64 {
    fn from(m: Mask) -> Self {
        m.bits()
    }
}

/// Allow-only mask exposed outside the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct EffectiveMask(u8);

impl EffectiveMask {
    pub const NONE: EffectiveMask = EffectiveMask(0);
    pub const READ: EffectiveMask = EffectiveMask(SIMPLE_READ);
    pub const WRITE: EffectiveMask = EffectiveMask(SIMPLE_WRITE);
    pub const ALL: EffectiveMask = EffectiveMask(SIMPLE_READ | SIMPLE_WRITE | SIMPLE_EXECUTE);

    #[inline]
    pub fn bits(&self) -> u8 {
        self.0
    }

    #[inline]
    pub fn allows(&self, kind: PermissionKind) -> bool {
        self.0 & kind.simple_bit() != 0
    }

    pub fn allows_all(&self, kinds: &[PermissionKind]) -> bool {
        kinds.iter().all(|k| self.allows(*k))
    }

    /// Copy of this mask with `kind` removed
    #[inline]
    pub fn without(self, kind: PermissionKind) -> EffectiveMask {
        EffectiveMask(self.0 & !kind.simple_bit())
    }

    /// First of `kinds` this mask does not allow
    pub fn first_missing(&self, kinds: &[PermissionKind]) -> Option<PermissionKind> {
        kinds.iter().copied().find(|k| !self.allows(*k))
    }

    pub fn kinds(&self) -> Vec<PermissionKind> {
        PermissionKind::ALL.into_iter().filter(|k| self.allows(*k)).collect()
    }
}

impl fmt::Display for EffectiveMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.kinds().iter().map(|k| k.to_string().to_uppercase()).collect();
        if parts.is_empty() {
            f.write_str("NONE")
        } else {
            f.write_str(&parts.join("+"))
        }
    }
}

/// Fold two masks found on the same path for different sids.
///
/// The most recently folded sid wins outright: the accumulator is dropped.
/// Callers order grants so group sids fold before the user sid, which makes
/// a user grant override every group grant on the same path.
#[inline]
pub fn merge_item_mask(_accumulated: Mask, next: Mask) -> Mask {
    next
}

/// Fold a parent's mask into a child's.
///
/// A complete child is returned unchanged. An incomplete child takes the
/// parent's bits for every kind on top of its own; partial overrides are not
/// supported. Deny still wins over allow at projection time.
pub fn merge_parent_mask(child: Mask, parent: Mask) -> Mask {
    if child.is_complete() {
        return child;
    }
    child.union(&parent)
}

/// Apply deny bits and drop them.
pub fn project_to_effective(mask: Mask) -> EffectiveMask {
    EffectiveMask(
        PermissionKind::ALL
            .iter()
            .filter(|k| mask.decision(**k).is_allowed())
            .fold(0u8, |acc, k| acc | k.simple_bit()),
    )
}

/// Fold the masks of several sids on one path: groups by name, then users,
/// each through [`merge_item_mask`].
pub fn fold_item_masks<'a, I>(entries: I) -> Mask
where
    I: IntoIterator<Item = (&'a Sid, Mask)>,
{
    let mut entries: Vec<(&Sid, Mask)> = entries.into_iter().collect();
    entries.sort_by(|(a, _), (b, _)| (!a.is_group(), &a.name).cmp(&(!b.is_group(), &b.name)));
    entries.into_iter().fold(Mask::EMPTY, |acc, (_, m)| merge_item_mask(acc, m))
}
