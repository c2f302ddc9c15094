//! Permission bit layout and kind names

use crate::mask::PermissionKind;

// Extended mask bits (persisted layout)
pub const READ: u64 = 1;
pub const NO_READ: u64 = 1 << 1;
pub const WRITE: u64 = 1 << 2;
pub const NO_WRITE: u64 = 1 << 3;
pub const EXECUTE: u64 = 1 << 4;
pub const NO_EXECUTE: u64 = 1 << 5;

pub const ALL_EXTENDED_BITS: u64 = READ | NO_READ | WRITE | NO_WRITE | EXECUTE | NO_EXECUTE;

// Effective (allow-only) mask bits
pub const SIMPLE_READ: u8 = 1;
pub const SIMPLE_WRITE: u8 = 1 << 1;
pub const SIMPLE_EXECUTE: u8 = 1 << 2;

/// Kinds that must all be decided for a mask to stop inheriting from its parent
pub const BASIC_KINDS: &[PermissionKind] = &[PermissionKind::Read, PermissionKind::Write];

// Kind name mappings
const KINDS: &[(&str, PermissionKind)] = &[
    ("read", PermissionKind::Read),
    ("write", PermissionKind::Write),
    ("execute", PermissionKind::Execute),
];

/// Look up a permission kind by its lowercase name
pub fn kind_by_name(name: &str) -> Option<PermissionKind> {
    KINDS
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| *v)
}

/// Name of a permission kind
pub fn kind_name(kind: PermissionKind) -> &'static str {
    KINDS
        .iter()
        .find(|(_, v)| *v == kind)
        .map(|(n, _)| *n)
        .unwrap_or("unknown")
}
