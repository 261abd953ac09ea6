// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Exercise storage-node startup, registration cleanup, and file I/O.
// Author: Lukas Bower
#![forbid(unsafe_code)]

use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tempfile::tempdir;

use combfs::{FsError, NamingNode, StorageNode};
use combfs_wire::Path;

fn ephemeral() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
}

fn path(s: &str) -> Path {
    s.parse().expect("valid path")
}

fn start_naming() -> NamingNode {
    NamingNode::start_on(ephemeral(), ephemeral()).expect("start naming node")
}

fn registration_addr(node: &NamingNode) -> SocketAddr {
    node.registration_addr().expect("registration addr")
}

#[test]
fn startup_requires_an_existing_root_directory() {
    let naming = start_naming();
    let dir = tempdir().expect("tempdir");
    let missing = dir.path().join("absent");
    assert!(matches!(
        StorageNode::start(&missing, "127.0.0.1", registration_addr(&naming)),
        Err(FsError::NotFound(_))
    ));
    naming.stop();
}

#[test]
fn an_empty_root_registers_no_files() {
    let naming = start_naming();
    let dir = tempdir().expect("tempdir");
    let node = StorageNode::start(dir.path(), "127.0.0.1", registration_addr(&naming))
        .expect("start storage node");
    assert!(node.data_addr().is_some());
    assert!(node.command_addr().is_some());
    node.stop();
    naming.stop();
}

#[test]
fn duplicate_files_are_deleted_locally_and_empty_directories_pruned() {
    let naming = start_naming();

    let first = tempdir().expect("tempdir");
    fs::create_dir_all(first.path().join("shared")).expect("mkdir");
    fs::write(first.path().join("shared/a"), b"one").expect("seed");
    fs::write(first.path().join("b"), b"two").expect("seed");
    let s1 = StorageNode::start(first.path(), "127.0.0.1", registration_addr(&naming))
        .expect("start first node");

    let second = tempdir().expect("tempdir");
    fs::create_dir_all(second.path().join("shared")).expect("mkdir");
    fs::write(second.path().join("shared/a"), b"one again").expect("seed");
    fs::write(second.path().join("c"), b"three").expect("seed");
    let s2 = StorageNode::start(second.path(), "127.0.0.1", registration_addr(&naming))
        .expect("start second node");

    // The duplicate was removed from the second node's disk, and the
    // directory it left behind was pruned away.
    assert!(!second.path().join("shared/a").exists());
    assert!(!second.path().join("shared").exists());
    assert!(second.path().join("c").exists());
    // The first node keeps its copy.
    assert!(first.path().join("shared/a").exists());

    s2.stop();
    s1.stop();
    naming.stop();
}

#[test]
fn data_plane_serves_size_read_and_write() {
    let naming = start_naming();
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("blob"), b"0123456789").expect("seed");
    let node = StorageNode::start(dir.path(), "127.0.0.1", registration_addr(&naming))
        .expect("start storage node");
    let data = node.storage_proxy();

    assert_eq!(data.size(&path("/blob")).expect("size"), 10);
    assert_eq!(data.read(&path("/blob"), 2, 3).expect("read"), b"234");
    // Zero-length read at the end of the file succeeds.
    assert_eq!(
        data.read(&path("/blob"), 10, 0).expect("read at eof"),
        Vec::<u8>::new()
    );
    assert!(matches!(
        data.read(&path("/blob"), 8, 3),
        Err(FsError::Bounds(_))
    ));

    data.write(&path("/blob"), 10, b"...").expect("append");
    assert_eq!(data.size(&path("/blob")).expect("size"), 13);
    assert!(matches!(
        data.size(&path("/ghost")),
        Err(FsError::NotFound(_))
    ));

    node.stop();
    naming.stop();
}

#[test]
fn control_plane_creates_and_deletes() {
    let naming = start_naming();
    let dir = tempdir().expect("tempdir");
    let node = StorageNode::start(dir.path(), "127.0.0.1", registration_addr(&naming))
        .expect("start storage node");
    let command = node.command_proxy();

    assert!(command.create(&path("/x/y")).expect("create"));
    assert!(!command.create(&path("/x/y")).expect("recreate"));
    assert!(dir.path().join("x/y").is_file());

    assert!(!command.delete(&Path::root()).expect("delete root"));
    assert!(command.delete(&path("/x")).expect("delete tree"));
    assert!(!dir.path().join("x").exists());

    node.stop();
    naming.stop();
}
