//! Structural diff of two extracted trees.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fs;
use std::fs::File;
use std::io;
use std::io::BufReader;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;

use walkdir::WalkDir;

use super::system::SNIFF_LEN;
use super::system::looks_like_text;
use crate::Result;
use crate::types::FilePair;

/// Files above this size are compared byte-for-byte only.
const NORMALIZE_LIMIT: u64 = 64 * 1024 * 1024;

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, PartialEq, Eq)]
enum Node {
    File(u64),
    Dir,
    Symlink(PathBuf),
}

/// Lists the file pairs that differ between two trees, sorted by relative
/// path.
///
/// Symlinks are never followed and compare equal when their targets match.
/// A path present on one side only is reported with the would-be location on
/// the other side. Differences consisting only of whitespace or blank lines
/// are ignored.
///
/// # Errors
///
/// Returns an error if either tree cannot be walked or a file cannot be read.
pub fn diff_trees(first: &Path, second: &Path) -> Result<Vec<FilePair>> {
    let left = scan(first)?;
    let right = scan(second)?;
    let paths: BTreeSet<&PathBuf> = left.keys().chain(right.keys()).collect();

    let mut differing = Vec::new();
    for relative in paths {
        let a = first.join(relative);
        let b = second.join(relative);
        let same = match (left.get(relative), right.get(relative)) {
            (Some(Node::Dir), Some(Node::Dir) | None) | (None, Some(Node::Dir)) => true,
            (Some(Node::Symlink(x)), Some(Node::Symlink(y))) => x == y,
            (Some(Node::File(x)), Some(Node::File(y))) => same_content(&a, &b, *x, *y)?,
            _ => false,
        };
        if !same {
            differing.push(FilePair::new(a, b));
        }
    }
    Ok(differing)
}

fn scan(root: &Path) -> Result<BTreeMap<PathBuf, Node>> {
    let mut nodes = BTreeMap::new();
    if !root.exists() {
        return Ok(nodes);
    }
    for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(io::Error::other)?
            .to_path_buf();
        let file_type = entry.file_type();
        let node = if file_type.is_dir() {
            Node::Dir
        } else if file_type.is_symlink() {
            Node::Symlink(fs::read_link(entry.path())?)
        } else {
            Node::File(entry.metadata().map_err(io::Error::from)?.len())
        };
        nodes.insert(relative, node);
    }
    Ok(nodes)
}

fn same_content(a: &Path, b: &Path, size_a: u64, size_b: u64) -> Result<bool> {
    if size_a == size_b && same_bytes(a, b)? {
        return Ok(true);
    }
    if size_a > NORMALIZE_LIMIT || size_b > NORMALIZE_LIMIT {
        return Ok(false);
    }
    if !is_text(a)? || !is_text(b)? {
        return Ok(false);
    }
    Ok(normalized(&fs::read(a)?) == normalized(&fs::read(b)?))
}

/// Compares two files of equal length chunk by chunk.
fn same_bytes(a: &Path, b: &Path) -> Result<bool> {
    let mut left = BufReader::with_capacity(CHUNK_SIZE, File::open(a)?);
    let mut right = BufReader::with_capacity(CHUNK_SIZE, File::open(b)?);
    let mut buf_a = vec![0u8; CHUNK_SIZE];
    let mut buf_b = vec![0u8; CHUNK_SIZE];
    loop {
        let read = fill(&mut left, &mut buf_a)?;
        if fill(&mut right, &mut buf_b)? != read || buf_a[..read] != buf_b[..read] {
            return Ok(false);
        }
        if read == 0 {
            return Ok(true);
        }
    }
}

/// Reads until `buf` is full or the input ends.
fn fill(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

fn is_text(path: &Path) -> Result<bool> {
    let mut head = Vec::new();
    File::open(path)?.take(SNIFF_LEN as u64).read_to_end(&mut head)?;
    Ok(head.is_empty() || looks_like_text(&head))
}

/// Lines with all whitespace removed, blank lines dropped.
fn normalized(data: &[u8]) -> Vec<Vec<u8>> {
    data.split(|&b| b == b'\n')
        .map(|line| {
            line.iter()
                .copied()
                .filter(|b| !b.is_ascii_whitespace())
                .collect::<Vec<u8>>()
        })
        .filter(|line| !line.is_empty())
        .collect()
}
