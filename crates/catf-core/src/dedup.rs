//! Suppression of byte-identical leaves.
//!
//! The same library or resource is often embedded in several packages; when
//! it changes, every copy shows up as a leaf. Only the first is kept.

use std::collections::HashMap;
use std::collections::HashSet;
use std::fs;
use std::fs::File;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use sha2::Digest;
use sha2::Sha256;
use tracing::debug;

use crate::Result;
use crate::types::LeafDifference;

type FileDigest = [u8; 32];

/// Drops every leaf whose two files are byte-identical to the corresponding
/// files of an earlier kept leaf. Order is preserved and the first occurrence
/// always survives.
///
/// Only pairs of regular files take part. A leaf with a missing side, a
/// directory, a symlink or an unreadable file is never a duplicate.
#[must_use]
pub fn filter_duplicates(leaves: Vec<LeafDifference>) -> Vec<LeafDifference> {
    let mut digests: HashMap<PathBuf, FileDigest> = HashMap::new();
    let mut seen: HashSet<(FileDigest, FileDigest)> = HashSet::new();
    let mut kept = Vec::with_capacity(leaves.len());

    for leaf in leaves {
        let first = cached_digest(&mut digests, &leaf.pair.first);
        let second = cached_digest(&mut digests, &leaf.pair.second);
        match (first, second) {
            (Some(first), Some(second)) if !seen.insert((first, second)) => {
                debug!(path = %leaf.logical_path, "duplicate leaf dropped");
            }
            _ => kept.push(leaf),
        }
    }
    kept
}

fn cached_digest(cache: &mut HashMap<PathBuf, FileDigest>, path: &Path) -> Option<FileDigest> {
    if let Some(digest) = cache.get(path) {
        return Some(*digest);
    }
    let is_file = fs::symlink_metadata(path).is_ok_and(|meta| meta.file_type().is_file());
    if !is_file {
        return None;
    }
    match digest_file(path) {
        Ok(digest) => {
            cache.insert(path.to_path_buf(), digest);
            Some(digest)
        }
        Err(err) => {
            debug!(path = %path.display(), error = %err, "could not hash file");
            None
        }
    }
}

fn digest_file(path: &Path) -> Result<FileDigest> {
    let mut hasher = Sha256::new();
    let mut file = File::open(path)?;
    io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize().into())
}
