//! Permission tags and permission sets.
//!
//! # Responsibilities
//! - Represent a single grantable capability as a small integer tag
//! - Provide cheap set operations (bitset) for required/granted checks
//!
//! # Design Decisions
//! - Permissions are application-defined constants (`Permission::new(1)`)
//! - Values above 127 are reserved for future grants by convention
//! - An empty required set is a subset of everything, so it always passes

use serde::{Deserialize, Serialize};
use std::fmt;

const WORDS: usize = 4;

/// A single grantable capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(u8);

impl Permission {
    /// First value of the range reserved for future grants.
    pub const RESERVED_START: u8 = 128;

    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    pub const fn is_reserved(self) -> bool {
        self.0 >= Self::RESERVED_START
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "perm:{}", self.0)
    }
}

/// A set of permissions backed by a 256-bit bitset.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PermissionSet {
    bits: [u64; WORDS],
}

impl PermissionSet {
    pub const fn empty() -> Self {
        Self { bits: [0; WORDS] }
    }

    /// Build a set from a slice; usable in `const` contexts.
    pub const fn from_slice(permissions: &[Permission]) -> Self {
        let mut bits = [0u64; WORDS];
        let mut i = 0;
        while i < permissions.len() {
            let v = permissions[i].0 as usize;
            bits[v / 64] |= 1u64 << (v % 64);
            i += 1;
        }
        Self { bits }
    }

    pub fn insert(&mut self, permission: Permission) {
        let v = permission.0 as usize;
        self.bits[v / 64] |= 1u64 << (v % 64);
    }

    pub fn remove(&mut self, permission: Permission) {
        let v = permission.0 as usize;
        self.bits[v / 64] &= !(1u64 << (v % 64));
    }

    pub fn contains(&self, permission: Permission) -> bool {
        let v = permission.0 as usize;
        self.bits[v / 64] & (1u64 << (v % 64)) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|w| *w == 0)
    }

    pub fn len(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// True if every permission in `self` is also in `other`.
    pub fn is_subset(&self, other: &PermissionSet) -> bool {
        self.bits
            .iter()
            .zip(other.bits.iter())
            .all(|(mine, theirs)| mine & !theirs == 0)
    }

    /// Permissions in `self` that are missing from `granted`.
    pub fn missing_from(&self, granted: &PermissionSet) -> PermissionSet {
        let mut bits = [0u64; WORDS];
        for (i, word) in bits.iter_mut().enumerate() {
            *word = self.bits[i] & !granted.bits[i];
        }
        PermissionSet { bits }
    }

    /// Iterate in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        (0..=u8::MAX)
            .map(Permission)
            .filter(move |p| self.contains(*p))
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        let mut set = PermissionSet::empty();
        for p in iter {
            set.insert(p);
        }
        set
    }
}

impl<const N: usize> From<[Permission; N]> for PermissionSet {
    fn from(permissions: [Permission; N]) -> Self {
        PermissionSet::from_slice(&permissions)
    }
}

impl fmt::Debug for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|p| p.0)).finish()
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<String> = self.iter().map(|p| p.0.to_string()).collect();
        write!(f, "{{{}}}", values.join(", "))
    }
}

impl Serialize for PermissionSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for PermissionSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let values = Vec::<Permission>::deserialize(deserializer)?;
        Ok(values.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P1: Permission = Permission::new(1);
    const P2: Permission = Permission::new(2);
    const HIGH: Permission = Permission::new(200);

    #[test]
    fn empty_required_set_always_passes() {
        let required = PermissionSet::empty();
        assert!(required.is_subset(&PermissionSet::empty()));
        assert!(required.is_subset(&PermissionSet::from([P1])));
    }

    #[test]
    fn subset_checks() {
        let required = PermissionSet::from([P1]);
        assert!(!required.is_subset(&PermissionSet::from([P2])));
        assert!(required.is_subset(&PermissionSet::from([P1, P2])));
        assert_eq!(required.missing_from(&PermissionSet::from([P2])), required);
    }

    #[test]
    fn bits_across_words() {
        let mut set = PermissionSet::from([P1, HIGH]);
        assert!(set.contains(HIGH));
        assert!(HIGH.is_reserved());
        assert_eq!(set.len(), 2);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![P1, HIGH]);

        set.remove(HIGH);
        assert!(!set.contains(HIGH));
        assert_eq!(set.to_string(), "{1}");
    }

    #[test]
    fn deserializes_from_list() {
        let set: PermissionSet = serde_json::from_str("[10, 1, 2]").unwrap();
        assert_eq!(set, PermissionSet::from([P1, P2, Permission::new(10)]));
        assert_eq!(serde_json::to_string(&set).unwrap(), "[1,2,10]");
    }
}
