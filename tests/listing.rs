//! Listing decisions and per-item mask decoration

mod common;

use common::{bob, root, setup};
use storage_acl::{project_to_effective, EffectiveMask, Mask, PathType, PermissionKind, Session, Sid, StorageItem};

use PathType::{File, Folder};

fn items() -> Vec<StorageItem> {
    vec![
        StorageItem::file("data/other.txt", 10),
        StorageItem::file("data/secret.txt", 20),
        StorageItem::folder("data/sub"),
    ]
}

fn masks(items: &[StorageItem]) -> Vec<(&str, Option<EffectiveMask>)> {
    items.iter().map(|it| (it.path.as_str(), it.mask)).collect()
}

#[test]
fn readable_folder_stamps_every_item() {
    let fx = setup();
    fx.mutations.grant(&root(), "data", Folder, Sid::group("scientists"), Mask::ALLOW_READ).unwrap();
    fx.mutations.grant(&root(), "data/secret.txt", File, Sid::user("bob"), Mask::DENY_READ).unwrap();
    fx.mutations.grant(&root(), "data/sub", Folder, Sid::user("bob"), Mask::ALLOW_WRITE).unwrap();

    assert!(fx.resolver.is_listing_allowed(&bob(), &root(), "data"));
    let listed = fx.resolver.decorate_listing(&bob(), &root(), "data", items()).unwrap();
    let read_write = project_to_effective(Mask::ALLOW_READ.with_allow(PermissionKind::Write));
    assert_eq!(
        masks(&listed),
        vec![
            ("data/other.txt", Some(EffectiveMask::READ)),
            ("data/secret.txt", Some(EffectiveMask::NONE)),
            ("data/sub", Some(read_write)),
        ]
    );
}

#[test]
fn unreadable_folder_shows_only_readable_children() {
    let fx = setup();
    fx.mutations.grant(&root(), "data/secret.txt", File, Sid::user("bob"), Mask::ALLOW_READ).unwrap();

    assert!(!fx.resolver.is_read_allowed(&bob(), &root(), "data", Folder));
    assert!(fx.resolver.is_listing_allowed(&bob(), &root(), "data"));
    let listed = fx.resolver.decorate_listing(&bob(), &root(), "data", items()).unwrap();
    assert_eq!(masks(&listed), vec![("data/secret.txt", Some(EffectiveMask::READ))]);
}

#[test]
fn child_type_must_match() {
    let fx = setup();
    // a folder grant does not make the file of the same name listable
    fx.mutations.grant(&root(), "data/secret.txt", Folder, Sid::user("bob"), Mask::ALLOW_READ).unwrap();

    let listed = fx.resolver.decorate_listing(&bob(), &root(), "data", items()).unwrap();
    assert!(listed.is_empty());
}

#[test]
fn grandchildren_do_not_open_a_listing() {
    let fx = setup();
    fx.mutations.grant(&root(), "data/sub/deep.txt", File, Sid::user("bob"), Mask::ALLOW_READ).unwrap();

    assert!(!fx.resolver.is_listing_allowed(&bob(), &root(), "data"));
    let err = fx.resolver.decorate_listing(&bob(), &root(), "data", items()).unwrap_err();
    assert!(err.is_denied());
}

#[test]
fn nothing_readable_is_denied() {
    let fx = setup();
    let err = fx.resolver.decorate_listing(&bob(), &root(), "data", items()).unwrap_err();
    assert!(err.is_denied());
    assert_eq!(err.to_string(), "access denied: read on 'data'");
}

#[test]
fn owner_sees_everything() {
    let fx = setup();
    let listed = fx.resolver.decorate_listing(&Session::user("alice"), &root(), "data", items()).unwrap();
    assert!(listed.iter().all(|it| it.mask == Some(EffectiveMask::ALL)));
    assert_eq!(listed.len(), 3);
}

#[test]
fn anonymous_listing_is_denied() {
    let fx = setup();
    assert!(!fx.resolver.is_listing_allowed(&Session::anonymous(), &root(), ""));
    assert!(fx.resolver.decorate_listing(&Session::anonymous(), &root(), "", items()).is_err());
}
