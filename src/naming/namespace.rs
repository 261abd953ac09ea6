// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: In-memory directory tree and storage bookkeeping for the naming node.
// Author: Lukas Bower

//! Namespace state.
//!
//! The naming node's authoritative view: which paths are files, which are
//! directories, which storage nodes hold each file, and how to reach every
//! storage node's control plane. All methods here are pure bookkeeping;
//! remote fan-out happens in the layer above, under the same lock that
//! guards this structure.

use std::collections::{HashMap, HashSet};

use combfs_wire::{Path, ProxyRef};

use crate::error::FsError;

/// Per-file placement: the chosen primary plus every replica holding a copy.
/// `replicas` always contains `primary`.
#[derive(Debug, Clone)]
pub(crate) struct FileEntry {
    pub primary: ProxyRef,
    pub replicas: HashSet<ProxyRef>,
}

impl FileEntry {
    fn solo(storage: ProxyRef) -> Self {
        let mut replicas = HashSet::new();
        replicas.insert(storage);
        Self {
            primary: storage,
            replicas,
        }
    }
}

/// The directory tree plus storage registration maps.
#[derive(Debug, Default)]
pub(crate) struct Namespace {
    files: HashMap<Path, FileEntry>,
    directories: HashSet<Path>,
    /// Data-plane reference → control-plane reference, one entry per
    /// registered storage node, never removed.
    commands: HashMap<ProxyRef, ProxyRef>,
}

impl Namespace {
    pub fn new() -> Self {
        let mut directories = HashSet::new();
        directories.insert(Path::root());
        Self {
            files: HashMap::new(),
            directories,
            commands: HashMap::new(),
        }
    }

    pub fn is_file(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    pub fn is_directory(&self, path: &Path) -> bool {
        self.directories.contains(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.is_file(path) || self.is_directory(path)
    }

    pub fn file_entry(&self, path: &Path) -> Option<&FileEntry> {
        self.files.get(path)
    }

    pub fn command_for(&self, storage: &ProxyRef) -> Option<ProxyRef> {
        self.commands.get(storage).copied()
    }

    pub fn storage_count(&self) -> usize {
        self.commands.len()
    }

    /// The `index`-th registered storage node, in map order. The caller
    /// draws `index` uniformly to pick a primary.
    pub fn nth_storage(&self, index: usize) -> Option<(ProxyRef, ProxyRef)> {
        self.commands
            .iter()
            .nth(index)
            .map(|(data, command)| (*data, *command))
    }

    /// Names of the immediate children of `dir`, files and subdirectories
    /// together, sorted for stable replies.
    pub fn children(&self, dir: &Path) -> Vec<String> {
        let parent = Some(dir.clone());
        let mut names: Vec<String> = self
            .files
            .keys()
            .chain(self.directories.iter())
            .filter(|path| path.parent() == parent)
            .filter_map(|path| path.last().map(str::to_owned))
            .collect();
        names.sort();
        names
    }

    /// Record a file accepted during registration or creation, inserting
    /// any missing ancestor directories.
    pub fn insert_file(&mut self, path: Path, storage: ProxyRef) {
        let mut ancestor = path.parent();
        while let Some(dir) = ancestor {
            if dir.is_root() {
                break;
            }
            ancestor = dir.parent();
            self.directories.insert(dir);
        }
        self.files.insert(path, FileEntry::solo(storage));
    }

    pub fn insert_directory(&mut self, path: Path) {
        self.directories.insert(path);
    }

    pub fn remove_file(&mut self, path: &Path) {
        self.files.remove(path);
    }

    /// Every storage node holding a file strictly underneath `dir`.
    pub fn owners_under(&self, dir: &Path) -> HashSet<ProxyRef> {
        self.files
            .iter()
            .filter(|(path, _)| dir.is_strict_prefix_of(path))
            .flat_map(|(_, entry)| entry.replicas.iter().copied())
            .collect()
    }

    /// Drop `dir` and every descendant file and directory entry.
    pub fn purge_subtree(&mut self, dir: &Path) {
        self.files.retain(|path, _| !dir.is_strict_prefix_of(path));
        self.directories
            .retain(|path| path != dir && !dir.is_strict_prefix_of(path));
    }

    /// Accept a storage node's registration: record its command reference
    /// and absorb its file list, returning the paths rejected as duplicates.
    pub fn register(
        &mut self,
        storage: ProxyRef,
        command: ProxyRef,
        files: Vec<Path>,
    ) -> Result<Vec<Path>, FsError> {
        if self.commands.contains_key(&storage) {
            return Err(FsError::State(format!(
                "storage node {storage} is already registered"
            )));
        }
        self.commands.insert(storage, command);

        let mut duplicates = Vec::new();
        for path in files {
            if path.is_root() {
                continue;
            }
            if self.contains(&path) {
                duplicates.push(path);
            } else {
                self.insert_file(path, storage);
            }
        }
        Ok(duplicates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> Path {
        s.parse().expect("valid path")
    }

    fn storage(port: u16) -> ProxyRef {
        ProxyRef::new(
            combfs_wire::InterfaceId::Storage,
            std::net::SocketAddr::from(([127, 0, 0, 1], port)),
        )
    }

    fn command(port: u16) -> ProxyRef {
        ProxyRef::new(
            combfs_wire::InterfaceId::Command,
            std::net::SocketAddr::from(([127, 0, 0, 1], port)),
        )
    }

    #[test]
    fn starts_with_only_the_root_directory() {
        let ns = Namespace::new();
        assert!(ns.is_directory(&Path::root()));
        assert!(!ns.is_file(&Path::root()));
        assert!(ns.children(&Path::root()).is_empty());
    }

    #[test]
    fn register_absorbs_files_and_creates_ancestors() {
        let mut ns = Namespace::new();
        let dups = ns
            .register(storage(1), command(1), vec![path("/a/b/c"), path("/d")])
            .expect("register");
        assert!(dups.is_empty());
        assert!(ns.is_file(&path("/a/b/c")));
        assert!(ns.is_directory(&path("/a")));
        assert!(ns.is_directory(&path("/a/b")));
        assert!(ns.is_file(&path("/d")));
        assert_eq!(
            ns.file_entry(&path("/d")).expect("entry").primary,
            storage(1)
        );
    }

    #[test]
    fn register_reports_duplicates_without_reassigning_them() {
        let mut ns = Namespace::new();
        ns.register(storage(1), command(1), vec![path("/a"), path("/b")])
            .expect("first register");
        let dups = ns
            .register(storage(2), command(2), vec![path("/a"), path("/c")])
            .expect("second register");
        assert_eq!(dups, vec![path("/a")]);
        assert_eq!(
            ns.file_entry(&path("/a")).expect("entry").primary,
            storage(1)
        );
        assert_eq!(
            ns.file_entry(&path("/c")).expect("entry").primary,
            storage(2)
        );
    }

    #[test]
    fn register_rejects_a_known_storage_reference() {
        let mut ns = Namespace::new();
        ns.register(storage(1), command(1), vec![])
            .expect("first register");
        assert!(matches!(
            ns.register(storage(1), command(1), vec![]),
            Err(FsError::State(_))
        ));
    }

    #[test]
    fn register_initializes_replicas_with_the_registrant() {
        let mut ns = Namespace::new();
        ns.register(storage(1), command(1), vec![path("/a")])
            .expect("register");
        let entry = ns.file_entry(&path("/a")).expect("entry");
        assert!(entry.replicas.contains(&entry.primary));
        assert_eq!(entry.replicas.len(), 1);
    }

    #[test]
    fn children_are_immediate_only_and_sorted() {
        let mut ns = Namespace::new();
        ns.register(
            storage(1),
            command(1),
            vec![path("/b"), path("/a/x"), path("/a/y/z")],
        )
        .expect("register");
        assert_eq!(ns.children(&Path::root()), vec!["a", "b"]);
        assert_eq!(ns.children(&path("/a")), vec!["x", "y"]);
        assert_eq!(ns.children(&path("/a/y")), vec!["z"]);
    }

    #[test]
    fn owners_under_uses_strict_descendants() {
        let mut ns = Namespace::new();
        ns.register(storage(1), command(1), vec![path("/dir/a")])
            .expect("register one");
        ns.register(storage(2), command(2), vec![path("/dir/sub/b"), path("/other")])
            .expect("register two");
        let owners = ns.owners_under(&path("/dir"));
        assert_eq!(owners.len(), 2);
        assert!(owners.contains(&storage(1)));
        assert!(owners.contains(&storage(2)));
        // A file is not its own strict descendant.
        assert!(ns.owners_under(&path("/other")).is_empty());
    }

    #[test]
    fn purge_subtree_removes_all_descendant_entries() {
        let mut ns = Namespace::new();
        ns.register(
            storage(1),
            command(1),
            vec![path("/dir/a"), path("/dir/sub/b"), path("/keep")],
        )
        .expect("register");
        ns.purge_subtree(&path("/dir"));
        assert!(!ns.contains(&path("/dir")));
        assert!(!ns.contains(&path("/dir/a")));
        assert!(!ns.contains(&path("/dir/sub")));
        assert!(!ns.contains(&path("/dir/sub/b")));
        assert!(ns.is_file(&path("/keep")));
    }
}
