//! Grant key encoding for LMDB storage.
//!
//! Keys are laid out as: [root_id: u64 BE][path][0x00][path type][sid kind][sid name]
//! - The 0x00 terminator keeps every grant of one exact path contiguous
//! - `[root_id][path][delimiter]` prefixes the whole subtree below a path
//! - Paths and names must not contain 0x00

use crate::model::{PathType, Sid, SidKind};

const TERMINATOR: u8 = 0;

#[inline]
fn type_byte(t: PathType) -> u8 {
    match t {
        PathType::File => b'F',
        PathType::Folder => b'D',
    }
}

#[inline]
fn kind_byte(k: SidKind) -> u8 {
    match k {
        SidKind::User => b'U',
        SidKind::Group => b'G',
    }
}

/// Prefix covering every grant of one root
#[inline]
pub fn root_prefix(root_id: u64) -> [u8; 8] {
    root_id.to_be_bytes()
}

/// Prefix covering every grant on exactly `path`, any type and sid
pub fn path_prefix(root_id: u64, path: &str) -> Vec<u8> {
    let mut k = Vec::with_capacity(8 + path.len() + 1);
    k.extend_from_slice(&root_id.to_be_bytes());
    k.extend_from_slice(path.as_bytes());
    k.push(TERMINATOR);
    k
}

/// Prefix covering every grant on exactly `path` with `path_type`
pub fn item_prefix(root_id: u64, path: &str, path_type: PathType) -> Vec<u8> {
    let mut k = path_prefix(root_id, path);
    k.push(type_byte(path_type));
    k
}

/// Prefix covering every grant strictly below `path`
pub fn subtree_prefix(root_id: u64, path: &str, delim: char) -> Vec<u8> {
    let mut k = Vec::with_capacity(8 + path.len() + 1);
    k.extend_from_slice(&root_id.to_be_bytes());
    if !path.is_empty() {
        k.extend_from_slice(path.as_bytes());
        let mut buf = [0u8; 4];
        k.extend_from_slice(delim.encode_utf8(&mut buf).as_bytes());
    }
    k
}

/// Full key of one grant
pub fn grant_key(root_id: u64, path: &str, path_type: PathType, sid: &Sid) -> Vec<u8> {
    let mut k = item_prefix(root_id, path, path_type);
    k.push(kind_byte(sid.kind));
    k.extend_from_slice(sid.name.as_bytes());
    k
}

/// Borrowed view of a decoded grant key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantKey<'a> {
    pub root_id: u64,
    pub path: &'a str,
    pub path_type: PathType,
    pub sid_kind: SidKind,
    pub sid_name: &'a str,
}

impl GrantKey<'_> {
    pub fn sid(&self) -> Sid {
        Sid { kind: self.sid_kind, name: self.sid_name.to_string() }
    }
}

/// Decode a grant key, `None` if the bytes are not a well-formed key
pub fn parse_grant_key(bytes: &[u8]) -> Option<GrantKey<'_>> {
    if bytes.len() < 8 {
        return None;
    }
    let root_id = u64::from_be_bytes(bytes[..8].try_into().ok()?);
    let rest = &bytes[8..];
    let term = rest.iter().position(|b| *b == TERMINATOR)?;
    let path = std::str::from_utf8(&rest[..term]).ok()?;
    let tail = &rest[term + 1..];
    if tail.len() < 2 {
        return None;
    }
    let path_type = match tail[0] {
        b'F' => PathType::File,
        b'D' => PathType::Folder,
        _ => return None,
    };
    let sid_kind = match tail[1] {
        b'U' => SidKind::User,
        b'G' => SidKind::Group,
        _ => return None,
    };
    let sid_name = std::str::from_utf8(&tail[2..]).ok()?;
    Some(GrantKey { root_id, path, path_type, sid_kind, sid_name })
}

/// True when the text can be embedded in a key
#[inline]
pub fn is_key_safe(s: &str) -> bool {
    !s.as_bytes().contains(&TERMINATOR)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_and_parse() {
        let key = grant_key(7, "bucket/data/file.txt", PathType::File, &Sid::user("bob"));
        let parsed = parse_grant_key(&key).unwrap();
        assert_eq!(parsed.root_id, 7);
        assert_eq!(parsed.path, "bucket/data/file.txt");
        assert_eq!(parsed.path_type, PathType::File);
        assert_eq!(parsed.sid(), Sid::user("bob"));
    }

    #[test]
    fn test_exact_prefix_does_not_match_siblings() {
        let key = grant_key(1, "data2", PathType::Folder, &Sid::group("g"));
        assert!(!key.starts_with(&path_prefix(1, "data")));
        assert!(key.starts_with(&path_prefix(1, "data2")));
    }

    #[test]
    fn test_subtree_prefix() {
        let nested = grant_key(1, "data/raw/x", PathType::File, &Sid::user("u"));
        let exact = grant_key(1, "data", PathType::Folder, &Sid::user("u"));
        let sibling = grant_key(1, "database", PathType::Folder, &Sid::user("u"));
        let pfx = subtree_prefix(1, "data", '/');
        assert!(nested.starts_with(&pfx));
        assert!(!exact.starts_with(&pfx));
        assert!(!sibling.starts_with(&pfx));
    }

    #[test]
    fn test_empty_path_subtree_is_root() {
        assert_eq!(subtree_prefix(3, "", '/'), root_prefix(3).to_vec());
    }

    #[test]
    fn test_roots_are_isolated() {
        let key = grant_key(2, "a", PathType::File, &Sid::user("u"));
        assert!(!key.starts_with(&root_prefix(1)));
    }

    #[test]
    fn test_malformed() {
        assert!(parse_grant_key(&[0, 1, 2]).is_none());
        let mut key = path_prefix(1, "a");
        key.push(b'X');
        key.push(b'U');
        assert!(parse_grant_key(&key).is_none());
    }

    #[test]
    fn test_key_safe() {
        assert!(is_key_safe("data/raw"));
        assert!(!is_key_safe("bad\0path"));
    }
}
