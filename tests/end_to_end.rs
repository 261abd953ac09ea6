// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: End-to-end client scenarios across naming and storage nodes.
// Author: Lukas Bower
#![forbid(unsafe_code)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use serial_test::serial;
use tempfile::tempdir;

use combfs::{FsError, NamingNode, ServiceProxy, StorageNode};
use combfs_wire::Path;
use net_constants::{NAMING_REGISTRATION_PORT, NAMING_SERVICE_PORT};

fn ephemeral() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
}

fn path(s: &str) -> Path {
    s.parse().expect("valid path")
}

struct Cluster {
    naming: NamingNode,
    storage: StorageNode,
    service: ServiceProxy,
    root: tempfile::TempDir,
}

/// One naming node plus one empty storage node on system-assigned ports.
fn bootstrap() -> Cluster {
    let naming = NamingNode::start_on(ephemeral(), ephemeral()).expect("start naming node");
    let root = tempdir().expect("tempdir");
    let storage = StorageNode::start(
        root.path(),
        "127.0.0.1",
        naming.registration_addr().expect("registration addr"),
    )
    .expect("start storage node");
    let service = ServiceProxy::new(naming.service_addr().expect("service addr"));
    Cluster {
        naming,
        storage,
        service,
        root,
    }
}

impl Cluster {
    fn shutdown(self) {
        self.storage.stop();
        self.naming.stop();
    }
}

#[test]
fn bootstrap_and_create_a_file() {
    let cluster = bootstrap();
    let service = &cluster.service;

    assert!(service.create_file(&path("/hello.txt")).expect("create"));
    assert!(!service.create_file(&path("/hello.txt")).expect("recreate"));
    assert!(!service.is_directory(&path("/hello.txt")).expect("kind"));
    assert_eq!(
        service.list(&Path::root()).expect("list"),
        vec!["hello.txt"]
    );

    // A freshly created file is empty on its chosen storage node.
    let storage = service.get_storage(&path("/hello.txt")).expect("storage");
    assert_eq!(storage.size(&path("/hello.txt")).expect("size"), 0);
    assert!(cluster.root.path().join("hello.txt").is_file());

    cluster.shutdown();
}

#[test]
fn read_modify_read_through_the_returned_proxy() {
    let cluster = bootstrap();
    let service = &cluster.service;

    assert!(service.create_file(&path("/hello.txt")).expect("create"));
    let storage = service.get_storage(&path("/hello.txt")).expect("storage");

    storage
        .write(&path("/hello.txt"), 0, &[0x48, 0x69])
        .expect("write");
    assert_eq!(
        storage.read(&path("/hello.txt"), 0, 2).expect("read"),
        vec![0x48, 0x69]
    );
    assert_eq!(storage.size(&path("/hello.txt")).expect("size"), 2);

    cluster.shutdown();
}

#[test]
fn delete_propagates_to_the_storage_node() {
    let cluster = bootstrap();
    let service = &cluster.service;

    assert!(service.create_file(&path("/hello.txt")).expect("create"));
    assert!(service.delete(&path("/hello.txt")).expect("delete"));
    assert!(matches!(
        service.is_directory(&path("/hello.txt")),
        Err(FsError::NotFound(_))
    ));
    assert!(!cluster.root.path().join("hello.txt").exists());

    cluster.shutdown();
}

#[test]
fn directory_delete_purges_every_descendant() {
    let cluster = bootstrap();
    let service = &cluster.service;

    assert!(service.create_directory(&path("/dir")).expect("mkdir"));
    assert!(service.create_file(&path("/dir/a")).expect("create a"));
    assert!(service.create_file(&path("/dir/b")).expect("create b"));

    assert!(service.delete(&path("/dir")).expect("delete dir"));
    assert!(matches!(
        service.is_directory(&path("/dir")),
        Err(FsError::NotFound(_))
    ));
    // Descendants left the namespace with their parent.
    assert!(matches!(
        service.is_directory(&path("/dir/a")),
        Err(FsError::NotFound(_))
    ));
    assert!(service.list(&Path::root()).expect("list").is_empty());
    assert!(!cluster.root.path().join("dir").exists());

    cluster.shutdown();
}

#[test]
fn files_survive_in_the_namespace_across_storage_restart_scenarios() {
    let cluster = bootstrap();
    let service = &cluster.service;

    assert!(service.create_file(&path("/keep")).expect("create"));
    // Stopping the storage node leaves the namespace entry behind; the next
    // data call against it is a transport failure, not a missing file.
    cluster.storage.stop();
    let storage = service.get_storage(&path("/keep")).expect("storage");
    assert!(matches!(
        storage.size(&path("/keep")),
        Err(FsError::Rpc(_))
    ));

    cluster.naming.stop();
}

#[test]
#[serial]
fn the_well_known_ports_serve_bootstrap_proxies() {
    let naming = match NamingNode::start() {
        Ok(node) => node,
        // Another process owns the well-known ports; nothing to verify here.
        Err(FsError::Rpc(_)) => return,
        Err(err) => panic!("unexpected startup failure: {err}"),
    };
    assert_eq!(
        naming.service_addr().expect("service addr").port(),
        NAMING_SERVICE_PORT
    );
    assert_eq!(
        naming.registration_addr().expect("registration addr").port(),
        NAMING_REGISTRATION_PORT
    );

    let service = ServiceProxy::new(SocketAddr::new(
        IpAddr::V4(Ipv4Addr::LOCALHOST),
        NAMING_SERVICE_PORT,
    ));
    assert!(service.list(&Path::root()).expect("list").is_empty());

    naming.stop();
}
