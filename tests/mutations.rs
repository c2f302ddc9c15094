//! Grant writes and propagation on move, copy and delete

mod common;

use common::{bob, root, setup};
use storage_acl::{GrantRequest, Mask, PathType, PermissionError, Sid, StorageRoot};

use PathType::{File, Folder};

fn paths(fx: &common::Fixture, p: &str) -> Vec<String> {
    fx.store.item_grants(1, p, Folder).unwrap().into_iter().map(|g| g.path).collect()
}

// ============================================================================
// Grants
// ============================================================================

#[test]
fn grant_replaces_previous_mask() {
    let fx = setup();
    fx.mutations.grant(&root(), "data", Folder, Sid::user("bob"), Mask::ALLOW_READ).unwrap();
    fx.mutations.grant(&root(), "data", Folder, Sid::user("bob"), Mask::DENY_READ).unwrap();

    let grants = fx.mutations.list_grants(&root(), "data", Folder).unwrap();
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].mask, Mask::DENY_READ);
    assert_eq!(grants[0].path, "bucket/data");
}

#[test]
fn list_grants_returns_every_sid() {
    let fx = setup();
    fx.mutations.grant(&root(), "data", Folder, Sid::user("bob"), Mask::ALLOW_READ).unwrap();
    fx.mutations.grant(&root(), "data", Folder, Sid::group("scientists"), Mask::ALLOW_WRITE).unwrap();
    fx.mutations.grant(&root(), "data", File, Sid::user("carol"), Mask::ALLOW_WRITE).unwrap();

    let mut sids: Vec<Sid> = fx.mutations.list_grants(&root(), "data", Folder).unwrap().into_iter().map(|g| g.sid).collect();
    sids.sort();
    assert_eq!(sids, vec![Sid::user("bob"), Sid::group("scientists")]);
}

#[test]
fn batch_grant_is_all_or_nothing() {
    let fx = setup();
    let requests = vec![
        GrantRequest::new("a", Folder, Sid::user("bob"), Mask::ALLOW_READ),
        GrantRequest::new("b", Folder, Sid::user(""), Mask::ALLOW_READ),
    ];
    let err = fx.mutations.batch_grant(&root(), requests).unwrap_err();
    assert!(matches!(err, PermissionError::InvalidSid(_)));
    assert!(fx.store.is_empty().unwrap());

    let requests = vec![
        GrantRequest::new("a", Folder, Sid::user("bob"), Mask::ALLOW_READ),
        GrantRequest::new("b", File, Sid::group("scientists"), Mask::ALLOW_WRITE),
    ];
    fx.mutations.batch_grant(&root(), requests).unwrap();
    assert_eq!(fx.store.len().unwrap(), 2);
}

#[test]
fn unsafe_path_is_rejected() {
    let fx = setup();
    let err = fx.mutations.grant(&root(), "bad\0path", File, Sid::user("bob"), Mask::ALLOW_READ).unwrap_err();
    assert!(matches!(err, PermissionError::InvalidPath(_)));
}

#[test]
fn batch_revoke_counts_existing_rows() {
    let fx = setup();
    fx.mutations.grant(&root(), "a", Folder, Sid::user("bob"), Mask::ALLOW_READ).unwrap();
    fx.mutations.grant(&root(), "b", File, Sid::user("bob"), Mask::ALLOW_READ).unwrap();

    let n = fx
        .mutations
        .batch_revoke(
            &root(),
            &[
                ("a".to_string(), Folder, Sid::user("bob")),
                ("b".to_string(), File, Sid::user("bob")),
                ("c".to_string(), File, Sid::user("bob")),
            ],
        )
        .unwrap();
    assert_eq!(n, 2);
    assert!(fx.store.is_empty().unwrap());
}

// ============================================================================
// Move and copy
// ============================================================================

#[test]
fn move_carries_grants_and_subtree() {
    let fx = setup();
    fx.mutations.grant(&root(), "a/b", Folder, Sid::user("bob"), Mask::ALLOW_READ).unwrap();
    fx.mutations.grant(&root(), "a/b/x.txt", File, Sid::user("bob"), Mask::DENY_READ).unwrap();
    fx.mutations.grant(&root(), "a/bb", Folder, Sid::user("bob"), Mask::ALLOW_WRITE).unwrap();

    let n = fx.mutations.on_item_moved(&root(), "a/b", "a/c", Folder).unwrap();
    assert_eq!(n, 2);

    let mut moved = paths(&fx, "bucket/a");
    moved.sort();
    assert_eq!(moved, vec!["bucket/a/bb", "bucket/a/c", "bucket/a/c/x.txt"]);
    assert!(fx.resolver.is_read_allowed(&bob(), &root(), "a/c/y.txt", File));
    assert!(!fx.resolver.is_read_allowed(&bob(), &root(), "a/c/x.txt", File));
    assert!(!fx.resolver.is_read_allowed(&bob(), &root(), "a/b/y.txt", File));
}

#[test]
fn move_of_a_file_only_moves_that_file() {
    let fx = setup();
    fx.mutations.grant(&root(), "a", File, Sid::user("bob"), Mask::ALLOW_READ).unwrap();
    fx.mutations.grant(&root(), "a/x", File, Sid::user("bob"), Mask::ALLOW_READ).unwrap();

    assert_eq!(fx.mutations.on_item_moved(&root(), "a", "z", File).unwrap(), 1);
    assert!(fx.resolver.is_read_allowed(&bob(), &root(), "z", File));
    assert!(fx.resolver.is_read_allowed(&bob(), &root(), "a/x", File));
}

#[test]
fn move_onto_itself_is_a_no_op() {
    let fx = setup();
    fx.mutations.grant(&root(), "a", Folder, Sid::user("bob"), Mask::ALLOW_READ).unwrap();
    assert_eq!(fx.mutations.on_item_moved(&root(), "a", "/a/", Folder).unwrap(), 0);
    assert_eq!(fx.store.len().unwrap(), 1);
}

#[test]
fn move_into_own_subtree_is_rejected() {
    let fx = setup();
    fx.mutations.grant(&root(), "a", Folder, Sid::user("bob"), Mask::ALLOW_READ).unwrap();
    fx.mutations.grant(&root(), "a/x", File, Sid::user("bob"), Mask::DENY_WRITE).unwrap();

    let err = fx.mutations.on_item_moved(&root(), "a", "a/b", Folder).unwrap_err();
    assert!(matches!(err, PermissionError::InvalidPath(_)));
    let err = fx.mutations.on_item_copied(&root(), "a", "a/b/c", Folder).unwrap_err();
    assert!(matches!(err, PermissionError::InvalidPath(_)));
    assert_eq!(fx.store.len().unwrap(), 2);
    assert!(fx.resolver.is_read_allowed(&bob(), &root(), "a/y", File));

    // a sibling sharing the name prefix is not a subtree
    assert_eq!(fx.mutations.on_item_moved(&root(), "a", "ab", Folder).unwrap(), 2);
    assert!(fx.resolver.is_read_allowed(&bob(), &root(), "ab/y", File));
}

#[test]
fn dot_segments_are_rejected_on_relocation() {
    let fx = setup();
    fx.mutations.grant(&root(), "a", Folder, Sid::user("bob"), Mask::ALLOW_READ).unwrap();

    let err = fx.mutations.on_item_moved(&root(), "a", "b/../c", Folder).unwrap_err();
    assert!(matches!(err, PermissionError::InvalidPath(_)));
    assert_eq!(fx.mutations.list_grants(&root(), "a", Folder).unwrap().len(), 1);
}

#[test]
fn copy_keeps_originals() {
    let fx = setup();
    fx.mutations.grant(&root(), "a/b", Folder, Sid::user("bob"), Mask::ALLOW_READ).unwrap();
    fx.mutations.grant(&root(), "a/b/x", File, Sid::group("scientists"), Mask::ALLOW_WRITE).unwrap();

    assert_eq!(fx.mutations.on_item_copied(&root(), "a/b", "c", Folder).unwrap(), 2);
    assert_eq!(fx.store.len().unwrap(), 4);
    assert!(fx.resolver.is_write_allowed(&bob(), &root(), "c/x", File));
    assert!(fx.resolver.is_write_allowed(&bob(), &root(), "a/b/x", File));
}

// ============================================================================
// Delete
// ============================================================================

#[test]
fn delete_drops_item_and_subtree() {
    let fx = setup();
    fx.mutations.grant(&root(), "a", Folder, Sid::user("bob"), Mask::ALLOW_READ).unwrap();
    fx.mutations.grant(&root(), "a/x", File, Sid::user("bob"), Mask::ALLOW_READ).unwrap();
    fx.mutations.grant(&root(), "ab", Folder, Sid::user("bob"), Mask::ALLOW_READ).unwrap();

    assert_eq!(fx.mutations.on_item_deleted(&root(), "a", Folder, false).unwrap(), 2);
    assert_eq!(paths(&fx, ""), vec!["bucket/ab"]);
}

#[test]
fn soft_delete_in_versioned_root_keeps_grants() {
    let fx = setup();
    let versioned = root().versioned(true);
    fx.mutations.grant(&versioned, "a", Folder, Sid::user("bob"), Mask::ALLOW_READ).unwrap();

    assert_eq!(fx.mutations.on_item_deleted(&versioned, "a", Folder, false).unwrap(), 0);
    assert_eq!(fx.store.len().unwrap(), 1);
    assert_eq!(fx.mutations.on_item_deleted(&versioned, "a", Folder, true).unwrap(), 1);
    assert!(fx.store.is_empty().unwrap());
}

#[test]
fn deleting_a_root_leaves_other_roots() {
    let fx = setup();
    let other = StorageRoot::new(2, "alice", "other");
    fx.mutations.grant(&root(), "a", Folder, Sid::user("bob"), Mask::ALLOW_READ).unwrap();
    fx.mutations.grant(&root(), "b", File, Sid::user("bob"), Mask::ALLOW_READ).unwrap();
    fx.mutations.grant(&other, "a", Folder, Sid::user("bob"), Mask::ALLOW_READ).unwrap();

    assert_eq!(fx.mutations.on_root_deleted(&root()).unwrap(), 2);
    assert_eq!(fx.store.len().unwrap(), 1);
    assert!(fx.resolver.is_read_allowed(&bob(), &other, "a/x", File));
}
