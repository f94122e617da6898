//! On-disk staging locations for extracted containers.
//!
//! Layout: `<root>/<namespace>/<logical path segments>/<artifact name>`, one
//! directory per side. A sibling `.<artifact name>.complete` marker records a
//! finished extraction; only marked locations are reused by later runs.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::debug;

use crate::Result;
use crate::types::ArtifactPair;
use crate::types::LogicalPath;

/// Namespace of the top-level artifacts' own extraction.
pub const ROOT_NAMESPACE: &str = "target-files";

const SCRATCH_NAMESPACE: &str = "scratch";

/// The two staging directories of one extraction step.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StagingPair {
    /// Directory for the first artifact's side.
    pub first: PathBuf,
    /// Directory for the second artifact's side.
    pub second: PathBuf,
}

impl StagingPair {
    /// Returns `true` when both sides carry a completion marker.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        marker(&self.first).is_file() && marker(&self.second).is_file()
    }

    /// Empties both sides and drops their markers.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be removed or recreated.
    pub fn reset(&self) -> Result<()> {
        for side in [&self.first, &self.second] {
            let done = marker(side);
            if done.exists() {
                fs::remove_file(&done)?;
            }
            if side.exists() {
                fs::remove_dir_all(side)?;
            }
            fs::create_dir_all(side)?;
        }
        Ok(())
    }

    /// Marks both sides as fully extracted.
    ///
    /// # Errors
    ///
    /// Returns an error if a marker cannot be written.
    pub fn mark_complete(&self) -> Result<()> {
        for side in [&self.first, &self.second] {
            fs::write(marker(side), b"")?;
        }
        Ok(())
    }
}

fn marker(side: &Path) -> PathBuf {
    let name = side
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    side.with_file_name(format!(".{name}.complete"))
}

/// Allocator of staging locations for one run.
#[derive(Debug)]
pub struct StagingArea {
    root: PathBuf,
    names: [String; 2],
    force_clean: bool,
    claimed: Mutex<HashSet<PathBuf>>,
}

impl StagingArea {
    /// Creates the staging area for an artifact pair.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, artifacts: &ArtifactPair, force_clean: bool) -> Self {
        let [first, second] = artifacts.names();
        Self {
            root: root.into(),
            names: [first.to_string(), second.to_string()],
            force_clean,
            claimed: Mutex::new(HashSet::new()),
        }
    }

    /// Staging root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Identifying names of the two artifacts.
    #[must_use]
    pub fn names(&self) -> [&str; 2] {
        [&self.names[0], &self.names[1]]
    }

    /// Creates the root, wiping it first when a clean run was requested.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be removed or created.
    pub fn prepare(&self) -> Result<()> {
        if self.force_clean && self.root.exists() {
            debug!(root = %self.root.display(), "removing previous staging area");
            fs::remove_dir_all(&self.root)?;
        }
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// Where the container at `logical` is staged within `namespace`.
    #[must_use]
    pub fn location(&self, namespace: &str, logical: &LogicalPath) -> StagingPair {
        let mut base = self.root.join(namespace);
        for segment in logical.segments().filter(|s| *s != "." && *s != "..") {
            // Keep logical segments from landing inside a side directory.
            if self.names.iter().any(|name| name == segment) {
                base.push(format!("{segment}~"));
            } else {
                base.push(segment);
            }
        }
        StagingPair {
            first: base.join(&self.names[0]),
            second: base.join(&self.names[1]),
        }
    }

    /// Claims the location for `logical`, or returns `None` if it was already
    /// claimed during this run.
    ///
    /// # Errors
    ///
    /// Returns an error if the claim registry is poisoned.
    pub fn claim(&self, namespace: &str, logical: &LogicalPath) -> Result<Option<StagingPair>> {
        let location = self.location(namespace, logical);
        let mut claimed = self
            .claimed
            .lock()
            .map_err(|_| io::Error::other("staging registry poisoned"))?;
        if claimed.insert(location.first.clone()) {
            Ok(Some(location))
        } else {
            Ok(None)
        }
    }

    /// A fresh, empty scratch directory for `purpose`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be recreated.
    pub fn scratch(&self, purpose: &str) -> Result<PathBuf> {
        let dir = self.root.join(SCRATCH_NAMESPACE).join(purpose);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}
