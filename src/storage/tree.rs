// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Serialized file operations over one storage node's local root.
// Author: Lukas Bower

//! The local tree.
//!
//! A storage node keeps no in-memory index: the filesystem under its root
//! is authoritative. One mutex serializes every operation, which is all the
//! contract asks for.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path as StdPath, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::warn;

use combfs_wire::Path;

use crate::error::FsError;

pub(crate) struct LocalTree {
    root: PathBuf,
    lock: Mutex<()>,
}

impl LocalTree {
    /// Open an existing directory as the served root.
    pub fn open(root: PathBuf) -> Result<Self, FsError> {
        match fs::metadata(&root) {
            Ok(meta) if meta.is_dir() => Ok(Self {
                root,
                lock: Mutex::new(()),
            }),
            Ok(_) => Err(FsError::NotFound(format!(
                "storage root {} is not a directory",
                root.display()
            ))),
            Err(_) => Err(FsError::NotFound(format!(
                "storage root {} does not exist",
                root.display()
            ))),
        }
    }

    pub fn root(&self) -> &StdPath {
        &self.root
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Length of the regular file at `path`.
    pub fn size(&self, path: &Path) -> Result<u64, FsError> {
        let _tree = self.guard();
        let meta = self.file_metadata(path)?;
        Ok(meta.len())
    }

    /// Exactly `length` bytes starting at `offset`. Reading past the end of
    /// the file, even by one byte, is a bounds error; a zero-length read at
    /// the end is not.
    pub fn read(&self, path: &Path, offset: u64, length: u64) -> Result<Vec<u8>, FsError> {
        let _tree = self.guard();
        let meta = self.file_metadata(path)?;
        let end = offset
            .checked_add(length)
            .ok_or_else(|| bounds(path, offset, length))?;
        if end > meta.len() {
            return Err(bounds(path, offset, length));
        }
        let mut file = File::open(path.to_local(&self.root))?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; length as usize];
        file.read_exact(&mut buf).map_err(|err| {
            // The size check above raced a concurrent truncation; a short
            // read is still a bounds failure to the caller.
            if err.kind() == std::io::ErrorKind::UnexpectedEof {
                bounds(path, offset, length)
            } else {
                FsError::from(err)
            }
        })?;
        Ok(buf)
    }

    /// Overwrite from `offset`, extending the file as needed. Empty data is
    /// a no-op (the existence checks still apply).
    pub fn write(&self, path: &Path, offset: u64, data: &[u8]) -> Result<(), FsError> {
        let _tree = self.guard();
        self.file_metadata(path)?;
        if data.is_empty() {
            return Ok(());
        }
        let mut file = OpenOptions::new()
            .write(true)
            .open(path.to_local(&self.root))?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        Ok(())
    }

    /// Create an empty regular file, making any missing parents. A regular
    /// file squatting on the parent chain is removed first, matching what
    /// clients expect after a namespace teardown.
    pub fn create(&self, path: &Path) -> bool {
        let _tree = self.guard();
        if path.is_root() {
            return false;
        }
        let local = path.to_local(&self.root);
        if local.exists() {
            return false;
        }
        if let Some(parent) = path.parent() {
            let mut ancestor = self.root.clone();
            for component in &parent {
                ancestor.push(component);
                if ancestor.is_file() {
                    if let Err(err) = fs::remove_file(&ancestor) {
                        warn!(
                            "cannot clear blocking file {}: {err}",
                            ancestor.display()
                        );
                        return false;
                    }
                    break;
                }
            }
            if let Err(err) = fs::create_dir_all(parent.to_local(&self.root)) {
                warn!("cannot create parents for {path}: {err}");
                return false;
            }
        }
        match OpenOptions::new().write(true).create_new(true).open(&local) {
            Ok(_) => true,
            Err(err) => {
                warn!("cannot create {path}: {err}");
                false
            }
        }
    }

    /// Remove a file (one unlink) or a directory tree (post-order). Root is
    /// never deletable.
    pub fn delete(&self, path: &Path) -> bool {
        let _tree = self.guard();
        if path.is_root() {
            return false;
        }
        let local = path.to_local(&self.root);
        let meta = match fs::symlink_metadata(&local) {
            Ok(meta) => meta,
            Err(_) => return false,
        };
        let removed = if meta.is_dir() {
            fs::remove_dir_all(&local)
        } else {
            fs::remove_file(&local)
        };
        match removed {
            Ok(()) => true,
            Err(err) => {
                warn!("cannot delete {path}: {err}");
                false
            }
        }
    }

    /// Every regular file under the root, as namespace paths.
    pub fn scan(&self) -> Result<Vec<Path>, FsError> {
        let _tree = self.guard();
        let mut found = Vec::new();
        scan_dir(&self.root, &Path::root(), &mut found)?;
        Ok(found)
    }

    /// Remove directories left empty after duplicate cleanup, bottom-up.
    /// The root itself always stays.
    pub fn prune_empty_directories(&self) {
        let _tree = self.guard();
        prune_dir(&self.root, true);
    }

    fn file_metadata(&self, path: &Path) -> Result<fs::Metadata, FsError> {
        let local = path.to_local(&self.root);
        let meta = fs::metadata(&local)
            .map_err(|_| FsError::NotFound(format!("{path} does not exist")))?;
        if meta.is_dir() {
            return Err(FsError::NotFound(format!("{path} is a directory")));
        }
        Ok(meta)
    }
}

fn bounds(path: &Path, offset: u64, length: u64) -> FsError {
    FsError::Bounds(format!(
        "range {offset}+{length} does not fit inside {path}"
    ))
}

fn scan_dir(dir: &StdPath, relative: &Path, found: &mut Vec<Path>) -> Result<(), FsError> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            warn!("skipping non-utf8 name under {}", dir.display());
            continue;
        };
        let child = match relative.child(name) {
            Ok(child) => child,
            Err(err) => {
                warn!("skipping unservable name {name:?} under {}: {err}", dir.display());
                continue;
            }
        };
        if entry.file_type()?.is_dir() {
            scan_dir(&entry.path(), &child, found)?;
        } else {
            found.push(child);
        }
    }
    Ok(())
}

/// Post-order sweep; returns whether `dir` itself was removed.
fn prune_dir(dir: &StdPath, is_root: bool) -> bool {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!("cannot prune {}: {err}", dir.display());
            return false;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            prune_dir(&path, false);
        }
    }
    if is_root {
        return false;
    }
    let now_empty = fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false);
    if now_empty && fs::remove_dir(dir).is_ok() {
        return true;
    }
    false
}
