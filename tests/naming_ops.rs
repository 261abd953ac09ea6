// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Exercise naming-node metadata operations over loopback TCP.
// Author: Lukas Bower
#![forbid(unsafe_code)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use combfs::{CommandProxy, FsError, NamingNode, RegistrationProxy, ServiceProxy, StorageProxy};
use combfs_wire::Path;

fn ephemeral() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
}

fn start_naming() -> (NamingNode, ServiceProxy, RegistrationProxy) {
    let node = NamingNode::start_on(ephemeral(), ephemeral()).expect("start naming node");
    let service = ServiceProxy::new(node.service_addr().expect("service addr"));
    let registration = RegistrationProxy::new(node.registration_addr().expect("registration addr"));
    (node, service, registration)
}

/// Storage/command proxies pointing at a port nothing listens on. The
/// registration call itself never contacts them, so they are enough to
/// populate the namespace.
fn dead_storage(port: u16) -> (StorageProxy, CommandProxy) {
    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port);
    (StorageProxy::new(addr), CommandProxy::new(addr))
}

fn path(s: &str) -> Path {
    s.parse().expect("valid path")
}

#[test]
fn directories_create_list_and_reject_missing_parents() {
    let (node, service, _registration) = start_naming();

    assert!(service.create_directory(&path("/d")).expect("create /d"));
    assert!(!service.create_directory(&path("/d")).expect("recreate /d"));
    assert!(matches!(
        service.create_directory(&path("/d/e/f")),
        Err(FsError::NotFound(_))
    ));
    assert!(service.create_directory(&path("/d/e")).expect("create /d/e"));
    assert_eq!(service.list(&path("/d")).expect("list /d"), vec!["e"]);

    node.stop();
}

#[test]
fn is_directory_distinguishes_the_three_outcomes() {
    let (node, service, registration) = start_naming();
    let (storage, command) = dead_storage(1);
    registration
        .register(&storage, &command, &[path("/f")])
        .expect("register");

    assert!(service.is_directory(&Path::root()).expect("root"));
    assert!(!service.is_directory(&path("/f")).expect("file"));
    assert!(matches!(
        service.is_directory(&path("/ghost")),
        Err(FsError::NotFound(_))
    ));

    node.stop();
}

#[test]
fn list_rejects_files_and_unknown_paths() {
    let (node, service, registration) = start_naming();
    let (storage, command) = dead_storage(1);
    registration
        .register(&storage, &command, &[path("/f")])
        .expect("register");

    assert!(matches!(service.list(&path("/f")), Err(FsError::NotFound(_))));
    assert!(matches!(
        service.list(&path("/ghost")),
        Err(FsError::NotFound(_))
    ));

    node.stop();
}

#[test]
fn registration_reports_duplicates_and_merges_the_tree() {
    let (node, service, registration) = start_naming();
    let (s1, c1) = dead_storage(1);
    let (s2, c2) = dead_storage(2);

    let dups = registration
        .register(&s1, &c1, &[path("/a"), path("/b")])
        .expect("first register");
    assert!(dups.is_empty());

    let dups = registration
        .register(&s2, &c2, &[path("/a"), path("/c")])
        .expect("second register");
    assert_eq!(dups, vec![path("/a")]);

    let listed = service.list(&Path::root()).expect("list root");
    assert_eq!(listed, vec!["a", "b", "c"]);

    node.stop();
}

#[test]
fn duplicate_storage_registration_is_an_illegal_state() {
    let (node, _service, registration) = start_naming();
    let (storage, command) = dead_storage(1);
    registration
        .register(&storage, &command, &[])
        .expect("first register");
    assert!(matches!(
        registration.register(&storage, &command, &[]),
        Err(FsError::State(_))
    ));
    node.stop();
}

#[test]
fn create_file_requires_a_registered_storage_and_a_parent() {
    let (node, service, registration) = start_naming();

    // No storage node yet: nothing can host the file.
    assert!(matches!(
        service.create_file(&path("/f")),
        Err(FsError::State(_))
    ));

    let (storage, command) = dead_storage(1);
    registration
        .register(&storage, &command, &[])
        .expect("register");

    assert!(!service.create_file(&Path::root()).expect("root create"));
    assert!(matches!(
        service.create_file(&path("/a/b/c")),
        Err(FsError::NotFound(_))
    ));
    // The chosen storage node is unreachable: the remote create surfaces as
    // a transport error and the namespace stays unchanged.
    assert!(matches!(
        service.create_file(&path("/f")),
        Err(FsError::Rpc(_))
    ));
    assert!(matches!(
        service.is_directory(&path("/f")),
        Err(FsError::NotFound(_))
    ));

    node.stop();
}

#[test]
fn get_storage_returns_the_primary_for_files_only() {
    let (node, service, registration) = start_naming();
    let (storage, command) = dead_storage(1);
    registration
        .register(&storage, &command, &[path("/f")])
        .expect("register");

    let primary = service.get_storage(&path("/f")).expect("get storage");
    assert_eq!(primary, storage);

    assert!(matches!(
        service.get_storage(&Path::root()),
        Err(FsError::NotFound(_))
    ));
    assert!(matches!(
        service.get_storage(&path("/ghost")),
        Err(FsError::NotFound(_))
    ));

    node.stop();
}

#[test]
fn delete_of_root_is_refused_and_unknown_paths_fail() {
    let (node, service, _registration) = start_naming();
    assert!(!service.delete(&Path::root()).expect("delete root"));
    assert!(matches!(
        service.delete(&path("/ghost")),
        Err(FsError::NotFound(_))
    ));
    node.stop();
}

#[test]
fn delete_fails_while_a_replica_is_unreachable() {
    let (node, service, registration) = start_naming();
    let (storage, command) = dead_storage(1);
    registration
        .register(&storage, &command, &[path("/f")])
        .expect("register");

    // The only replica is unreachable, so the namespace must keep the file.
    assert!(!service.delete(&path("/f")).expect("delete attempt"));
    assert!(!service.is_directory(&path("/f")).expect("still a file"));

    node.stop();
}

#[test]
fn empty_directories_delete_without_any_storage_involvement() {
    let (node, service, _registration) = start_naming();
    assert!(service.create_directory(&path("/d")).expect("create"));
    assert!(service.delete(&path("/d")).expect("delete"));
    assert!(matches!(
        service.is_directory(&path("/d")),
        Err(FsError::NotFound(_))
    ));
    node.stop();
}
